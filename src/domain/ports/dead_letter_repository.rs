use async_trait::async_trait;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{DeadLetterEntry, Task, TaskTransition};

/// Filters for listing dead letters
#[derive(Default, Debug, Clone)]
pub struct DeadLetterFilters {
    /// Only entries that are neither retried nor dismissed
    pub open_only: bool,
    /// Internal project id
    pub project_id: Option<i64>,
    /// Maximum number of entries
    pub limit: Option<i64>,
}

/// Repository port for dead letter persistence
#[async_trait]
pub trait DeadLetterRepository: Send + Sync {
    /// Store a new entry.
    async fn insert(&self, entry: &DeadLetterEntry) -> DomainResult<()>;

    /// Entry by its own id.
    async fn get(&self, id: Uuid) -> DomainResult<Option<DeadLetterEntry>>;

    /// Entry recorded for the failed task `task_id`.
    async fn find_by_task(&self, task_id: Uuid) -> DomainResult<Option<DeadLetterEntry>>;

    /// Persist the retry or dismiss flags of `entry`.
    ///
    /// Only succeeds while the stored row is still open, so two concurrent
    /// resolutions cannot both win; the loser gets `ConcurrencyConflict`.
    async fn save_resolution(&self, entry: &DeadLetterEntry) -> DomainResult<()>;

    /// Mark `entry` retried and insert its replacement `task`, already moved
    /// to `Queued` by `transition`, in one transaction.
    ///
    /// A resolved entry yields `ConcurrencyConflict`. On any failure the
    /// entry stays open and no task or queue row is written.
    async fn resolve_with_retry(
        &self,
        entry: &DeadLetterEntry,
        task: &Task,
        transition: &TaskTransition,
    ) -> DomainResult<()>;

    /// Entries matching `filters`, newest first.
    async fn list(&self, filters: DeadLetterFilters) -> DomainResult<Vec<DeadLetterEntry>>;
}
