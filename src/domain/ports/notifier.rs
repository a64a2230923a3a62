use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Failure to deliver a notification.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("Notification channel is not configured")]
    NotConfigured,

    #[error("Notification delivery failed: {0}")]
    Delivery(String),
}

/// Fire-and-forget notification sink.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Post `message` under `category` with structured `context`.
    async fn notify(&self, category: &str, message: &str, context: &Value) -> Result<(), NotifyError>;
}
