use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{Task, TaskStatus, TaskTransition, TaskType};

/// Filters for querying tasks
#[derive(Default, Debug, Clone)]
pub struct TaskFilters {
    pub status: Option<TaskStatus>,
    pub project_id: Option<i64>,
    pub mr_iid: Option<i64>,
    pub task_type: Option<TaskType>,
    /// Maximum rows, newest first
    pub limit: Option<i64>,
}

/// A finished task as seen by health checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FinishedTaskSample {
    pub task_id: Uuid,
    pub status: TaskStatus,
    /// Failure reason joined with dead letter details, lowercased
    pub error_text: Option<String>,
    pub completed_at: DateTime<Utc>,
}

impl FinishedTaskSample {
    /// Whether the task ended failed.
    pub fn is_failed(&self) -> bool {
        self.status == TaskStatus::Failed
    }

    /// Whether the error text contains any of `patterns`.
    pub fn error_matches(&self, patterns: &[&str]) -> bool {
        self.error_text
            .as_deref()
            .is_some_and(|text| patterns.iter().any(|p| text.contains(p)))
    }
}

/// Repository port for task persistence operations
#[async_trait]
pub trait TaskRepository: Send + Sync {
    /// Insert a new task
    async fn insert(&self, task: &Task) -> DomainResult<()>;

    /// Insert a task already moved to `Queued` by `transition`, with its
    /// audit row and work queue entry, in one transaction.
    ///
    /// Either all three rows exist afterwards or none do.
    async fn insert_queued(&self, task: &Task, transition: &TaskTransition) -> DomainResult<()>;

    /// Get a task by ID
    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>>;

    /// Persist non-status fields (pipeline, comment, metadata, result).
    ///
    /// Status only changes through [`TaskRepository::apply_transition`].
    async fn update_details(&self, task: &Task) -> DomainResult<()>;

    /// Persist a transition already applied to `task` together with its
    /// audit row.
    ///
    /// The row is only written while its stored status still equals
    /// `transition.from_status`; otherwise `ConcurrencyConflict` is returned
    /// and nothing changes.
    async fn apply_transition(&self, task: &Task, transition: &TaskTransition) -> DomainResult<()>;

    /// Atomically mark every queued or running task of a merge request as
    /// superseded, writing audit rows. Returns the tasks as they are after
    /// the change.
    async fn supersede_in_flight(&self, project_id: i64, mr_iid: i64) -> DomainResult<Vec<Task>>;

    /// Whether a queued or running task exists for this merge request and commit.
    async fn has_in_flight_commit(&self, project_id: i64, mr_iid: i64, commit_sha: &str) -> DomainResult<bool>;

    /// List tasks with optional filters, newest first
    async fn list(&self, filters: TaskFilters) -> DomainResult<Vec<Task>>;

    /// Audit trail of a task, oldest first
    async fn transitions(&self, task_id: Uuid) -> DomainResult<Vec<TaskTransition>>;

    /// Placeholder note left by the most recent other review of this merge request.
    async fn find_previous_review_comment(
        &self,
        project_id: i64,
        mr_iid: i64,
        exclude_task: Uuid,
    ) -> DomainResult<Option<i64>>;

    /// Count tasks currently in any of `statuses`
    async fn count_by_status(&self, statuses: &[TaskStatus]) -> DomainResult<u64>;

    /// Most recently finished (completed or failed) tasks, newest first
    async fn recent_finished(&self, limit: i64) -> DomainResult<Vec<FinishedTaskSample>>;

    /// Tasks finished (completed or failed) at or after `since`, newest first
    async fn finished_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<FinishedTaskSample>>;
}
