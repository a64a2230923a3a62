use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::WebhookEventLogEntry;

/// Append-only log of routed events.
#[async_trait]
pub trait EventLogRepository: Send + Sync {
    /// Whether a delivery with this key was already accepted for the project
    async fn exists(&self, project_id: i64, idempotency_key: &str) -> DomainResult<bool>;

    /// Record an accepted delivery.
    ///
    /// Returns `false` when the `(project_id, idempotency_key)` pair is
    /// already present; storage enforces the uniqueness.
    async fn record(&self, entry: &WebhookEventLogEntry) -> DomainResult<bool>;
}
