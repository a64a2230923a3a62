use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::errors::DomainResult;
use crate::domain::models::{AlertEvent, AlertType};

/// Persistence for alert lifecycles and the onset of sustained conditions.
#[async_trait]
pub trait AlertRepository: Send + Sync {
    /// The active alert of `alert_type`, if one is open.
    async fn find_active(&self, alert_type: AlertType) -> DomainResult<Option<AlertEvent>>;

    /// Insert a new active alert. Returns `false` when an active alert of the
    /// same type already exists.
    async fn insert(&self, alert: &AlertEvent) -> DomainResult<bool>;

    /// Persist status, message, context and notification timestamps.
    async fn update(&self, alert: &AlertEvent) -> DomainResult<()>;

    /// Record that the condition behind `alert_type` holds at `at`, keeping
    /// an earlier onset if one is stored. Returns the stored onset.
    async fn observe(&self, alert_type: AlertType, at: DateTime<Utc>) -> DomainResult<DateTime<Utc>>;

    /// Forget the onset of `alert_type` once its condition clears.
    async fn clear_observation(&self, alert_type: AlertType) -> DomainResult<()>;

    /// Newest first
    async fn list(&self, active_only: bool, limit: i64) -> DomainResult<Vec<AlertEvent>>;
}
