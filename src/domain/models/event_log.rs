//! Webhook delivery log used for idempotency checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::routing::RoutingResult;

/// Write-once record of an accepted delivery, unique per
/// `(project_id, idempotency_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebhookEventLogEntry {
    /// GitLab delivery UUID
    pub idempotency_key: String,
    pub project_id: i64,
    pub event_type: String,
    /// Routed intent name
    pub intent: String,
    pub mr_iid: Option<i64>,
    pub commit_sha: Option<String>,
    pub received_at: DateTime<Utc>,
}

impl WebhookEventLogEntry {
    /// Log entry for a routed event under `idempotency_key`.
    pub fn from_routing(idempotency_key: &str, routing: &RoutingResult) -> Self {
        Self {
            idempotency_key: idempotency_key.to_string(),
            project_id: routing.event.project().project_id,
            event_type: routing.event.event_type().to_string(),
            intent: routing.intent.as_str().to_string(),
            mr_iid: routing.event.mr_iid(),
            commit_sha: routing.event.commit_sha().map(str::to_string),
            received_at: Utc::now(),
        }
    }
}
