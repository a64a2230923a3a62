//! Notifier that keeps messages in memory.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::domain::ports::{Notifier, NotifyError};

/// A message the mock accepted.
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub category: String,
    pub message: String,
    pub context: Value,
}

/// Notifier that records messages in memory.
#[derive(Default)]
pub struct MockNotifier {
    sent: Mutex<Vec<SentNotification>>,
    failing: bool,
}

impl MockNotifier {
    /// Notifier that accepts every message.
    pub fn new() -> Self {
        Self::default()
    }

    /// A notifier whose every delivery fails.
    pub fn failing() -> Self {
        Self {
            sent: Mutex::default(),
            failing: true,
        }
    }

    /// Messages accepted so far.
    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.lock().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, category: &str, message: &str, context: &Value) -> Result<(), NotifyError> {
        if self.failing {
            return Err(NotifyError::Delivery("mock delivery failure".to_string()));
        }
        self.sent.lock().await.push(SentNotification {
            category: category.to_string(),
            message: message.to_string(),
            context: context.clone(),
        });
        Ok(())
    }
}
