//! Team chat webhook notifier.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};

use crate::domain::models::NotificationsConfig;
use crate::domain::ports::{Notifier, NotifyError};

/// Chat platforms with a known incoming-webhook payload shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChatPlatform {
    Generic,
    Slack,
    Mattermost,
    GoogleChat,
}

impl ChatPlatform {
    /// Unknown platform names fall back to the generic payload.
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "slack" => Self::Slack,
            "mattermost" => Self::Mattermost,
            "google_chat" | "google-chat" => Self::GoogleChat,
            _ => Self::Generic,
        }
    }

    fn payload(self, category: &str, message: &str, context: &Value) -> Value {
        match self {
            Self::Slack | Self::Mattermost | Self::GoogleChat => json!({ "text": message }),
            Self::Generic => json!({
                "type": category,
                "message": message,
                "context": context,
            }),
        }
    }
}

/// Posts notifications to an incoming chat webhook.
pub struct TeamChatNotifier {
    http: Client,
    webhook_url: Option<String>,
    platform: ChatPlatform,
    categories: Vec<String>,
}

impl TeamChatNotifier {
    /// Build the notifier, failing when no webhook url is configured.
    pub fn new(config: &NotificationsConfig) -> Result<Self, NotifyError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        Ok(Self {
            http,
            webhook_url: config.team_chat_webhook_url.clone().filter(|u| !u.is_empty()),
            platform: ChatPlatform::parse(&config.platform),
            categories: config.categories.clone(),
        })
    }

    fn category_enabled(&self, category: &str) -> bool {
        self.categories.is_empty() || self.categories.iter().any(|c| c == category)
    }
}

#[async_trait]
impl Notifier for TeamChatNotifier {
    async fn notify(&self, category: &str, message: &str, context: &Value) -> Result<(), NotifyError> {
        let Some(url) = &self.webhook_url else {
            return Err(NotifyError::NotConfigured);
        };

        // The context may narrow the category (e.g. alert → infrastructure).
        let effective = context.get("category").and_then(Value::as_str).unwrap_or(category);
        if !self.category_enabled(effective) {
            tracing::debug!(category = effective, "notification category disabled");
            return Ok(());
        }

        let response = self
            .http
            .post(url)
            .json(&self.platform.payload(category, message, context))
            .send()
            .await
            .map_err(|e| NotifyError::Delivery(e.to_string()))?;

        if !response.status().is_success() {
            return Err(NotifyError::Delivery(format!("chat webhook returned {}", response.status())));
        }

        Ok(())
    }
}
