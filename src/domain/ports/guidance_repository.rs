use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::GuidanceEntry;

/// Persistence for project guidance entries.
#[async_trait]
pub trait GuidanceRepository: Send + Sync {
    /// Store a new entry
    async fn insert(&self, entry: &GuidanceEntry) -> DomainResult<()>;

    /// Active entries for a project, newest first
    async fn list_active(&self, project_id: i64) -> DomainResult<Vec<GuidanceEntry>>;
}
