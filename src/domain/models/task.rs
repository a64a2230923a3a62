//! Task domain model.
//!
//! A task is one unit of work created from an accepted webhook event. Its
//! status only moves along the transitions listed in
//! [`TaskStatus::valid_transitions`]; every transition yields an audit record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use super::routing::Intent;
use crate::domain::errors::{DomainError, DomainResult};

/// Status of a task in the dispatch pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    /// Persisted, not yet on a queue
    Received,
    /// Waiting on a priority queue
    Queued,
    /// Handed to the runner (or executing server-side)
    Running,
    /// Finished with a result
    Completed,
    /// Failed permanently; see `error_reason`
    Failed,
    /// Overtaken by a newer event for the same merge request
    Superseded,
}

impl Default for TaskStatus {
    fn default() -> Self {
        Self::Received
    }
}

impl TaskStatus {
    /// Stored and displayed name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Received => "received",
            Self::Queued => "queued",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Superseded => "superseded",
        }
    }

    /// Parse a stored name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "received" => Some(Self::Received),
            "queued" => Some(Self::Queued),
            "running" => Some(Self::Running),
            "completed" | "complete" => Some(Self::Completed),
            "failed" => Some(Self::Failed),
            "superseded" => Some(Self::Superseded),
            _ => None,
        }
    }

    /// Check if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Superseded)
    }

    /// Queued or running: the states that hold a merge request's single slot.
    pub fn is_in_flight(&self) -> bool {
        matches!(self, Self::Queued | Self::Running)
    }

    /// Valid transitions from this status.
    pub fn valid_transitions(&self) -> Vec<TaskStatus> {
        match self {
            Self::Received => vec![Self::Queued],
            Self::Queued => vec![Self::Running, Self::Failed, Self::Superseded],
            Self::Running => vec![Self::Completed, Self::Failed, Self::Superseded],
            Self::Completed | Self::Failed | Self::Superseded => vec![],
        }
    }

    /// Whether `new_status` is reachable in one step.
    pub fn can_transition_to(&self, new_status: Self) -> bool {
        self.valid_transitions().contains(&new_status)
    }
}

impl std::fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Priority level for tasks. Each level has its own work queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskPriority {
    /// Background work such as feature development
    Low = 1,
    /// Reviews and answers
    Normal = 2,
    /// Explicitly requested reviews
    High = 3,
}

impl Default for TaskPriority {
    fn default() -> Self {
        Self::Normal
    }
}

impl TaskPriority {
    /// Every priority, highest first.
    pub const ALL: [TaskPriority; 3] = [Self::High, Self::Normal, Self::Low];

    /// Stored and displayed name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }

    /// Parse a stored name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "low" => Some(Self::Low),
            "normal" => Some(Self::Normal),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    /// Name of the work queue serving this priority.
    pub fn queue_name(&self) -> &'static str {
        self.as_str()
    }
}

/// Kind of work a task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskType {
    /// Merge request review
    CodeReview,
    /// Answer on an issue or merge request thread
    IssueDiscussion,
    /// Implement an issue
    FeatureDev,
    UiAdjustment,
    SecurityAudit,
    DeepAnalysis,
    PrdCreation,
}

/// Where a task executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Executed by an external CI-triggered runner
    Runner,
    /// Executed inline by the dispatcher
    Server,
}

impl TaskType {
    /// Stored and displayed name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CodeReview => "code_review",
            Self::IssueDiscussion => "issue_discussion",
            Self::FeatureDev => "feature_dev",
            Self::UiAdjustment => "ui_adjustment",
            Self::SecurityAudit => "security_audit",
            Self::DeepAnalysis => "deep_analysis",
            Self::PrdCreation => "prd_creation",
        }
    }

    /// Parse a stored name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "code_review" => Some(Self::CodeReview),
            "issue_discussion" => Some(Self::IssueDiscussion),
            "feature_dev" => Some(Self::FeatureDev),
            "ui_adjustment" => Some(Self::UiAdjustment),
            "security_audit" => Some(Self::SecurityAudit),
            "deep_analysis" => Some(Self::DeepAnalysis),
            "prd_creation" => Some(Self::PrdCreation),
            _ => None,
        }
    }

    /// Where tasks of this type run.
    pub fn execution_mode(&self) -> ExecutionMode {
        match self {
            Self::PrdCreation => ExecutionMode::Server,
            _ => ExecutionMode::Runner,
        }
    }

    /// Review-style tasks that get a placeholder note on their merge request.
    pub fn posts_placeholder(&self) -> bool {
        matches!(self, Self::CodeReview | Self::SecurityAudit)
    }
}

impl std::fmt::Display for TaskType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a task entered the system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskOrigin {
    /// Routed from a GitLab webhook
    Webhook,
    Conversation,
    /// Created from the CLI
    Manual,
}

impl Default for TaskOrigin {
    fn default() -> Self {
        Self::Webhook
    }
}

impl TaskOrigin {
    /// Stored and displayed name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Webhook => "webhook",
            Self::Conversation => "conversation",
            Self::Manual => "manual",
        }
    }

    /// Parse a stored name.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "webhook" => Some(Self::Webhook),
            "conversation" => Some(Self::Conversation),
            "manual" => Some(Self::Manual),
            _ => None,
        }
    }
}

/// Dispatch context carried alongside a task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskMetadata {
    /// Question of an `@ai ask` command
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question: Option<String>,
    /// Review strategy chosen at dispatch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    /// Overrides read from the repository config file
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub repo_config: BTreeMap<String, serde_json::Value>,
    /// Title for server-side issue creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Body for server-side issue creation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Immutable audit record of one status change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskTransition {
    /// Task that changed
    pub task_id: Uuid,
    /// Status before the change
    pub from_status: TaskStatus,
    /// Status after the change
    pub to_status: TaskStatus,
    /// When the change happened
    pub transitioned_at: DateTime<Utc>,
}

/// A unit of work tracked through the dispatch state machine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    /// Task id
    pub id: Uuid,
    /// Internal project id
    pub project_id: i64,
    /// Numeric GitLab project id
    pub gitlab_project_id: i64,
    /// Kind of work
    pub task_type: TaskType,
    /// How the task entered the system
    pub origin: TaskOrigin,
    /// Queue the task is dispatched from
    pub priority: TaskPriority,
    /// Current state
    pub status: TaskStatus,
    /// Intent the routing assigned
    pub intent: Option<Intent>,
    /// Merge request the task belongs to
    pub mr_iid: Option<i64>,
    /// Issue the task belongs to
    pub issue_iid: Option<i64>,
    /// Head commit the task was created for
    pub commit_sha: Option<String>,
    /// CI pipeline running the task
    pub pipeline_id: Option<i64>,
    /// Placeholder note posted on the merge request
    pub comment_id: Option<i64>,
    /// Dispatch retries used before the task settled
    pub retry_count: Option<u32>,
    /// Failure code of a failed task
    pub error_reason: Option<String>,
    /// Dispatch context
    #[serde(default)]
    pub metadata: TaskMetadata,
    /// Opaque payload reported by the runner
    pub result: Option<serde_json::Value>,
    /// Set on entering `Running`
    pub started_at: Option<DateTime<Utc>>,
    /// Set on entering a terminal state
    pub completed_at: Option<DateTime<Utc>>,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last write
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Create a task in the `Received` state.
    pub fn new(project_id: i64, gitlab_project_id: i64, task_type: TaskType, priority: TaskPriority) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            project_id,
            gitlab_project_id,
            task_type,
            origin: TaskOrigin::Webhook,
            priority,
            status: TaskStatus::Received,
            intent: None,
            mr_iid: None,
            issue_iid: None,
            commit_sha: None,
            pipeline_id: None,
            comment_id: None,
            retry_count: None,
            error_reason: None,
            metadata: TaskMetadata::default(),
            result: None,
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the origin.
    pub fn with_origin(mut self, origin: TaskOrigin) -> Self {
        self.origin = origin;
        self
    }

    /// Record the routing intent.
    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    /// Attach a merge request.
    pub fn with_merge_request(mut self, mr_iid: Option<i64>) -> Self {
        self.mr_iid = mr_iid;
        self
    }

    /// Attach an issue.
    pub fn with_issue(mut self, issue_iid: Option<i64>) -> Self {
        self.issue_iid = issue_iid;
        self
    }

    /// Record the head commit.
    pub fn with_commit(mut self, sha: Option<String>) -> Self {
        self.commit_sha = sha;
        self
    }

    /// Replace the dispatch context.
    pub fn with_metadata(mut self, metadata: TaskMetadata) -> Self {
        self.metadata = metadata;
        self
    }

    /// Check if task is terminal.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// Whether the current status may move to `new_status`.
    pub fn can_transition_to(&self, new_status: TaskStatus) -> bool {
        self.status.can_transition_to(new_status)
    }

    /// Move to `new_status`, stamping timestamps and the failure reason.
    ///
    /// Returns the audit record to persist with the change. Leaving a
    /// terminal state is always an error.
    pub fn transition_to(
        &mut self,
        new_status: TaskStatus,
        reason: Option<&str>,
    ) -> DomainResult<TaskTransition> {
        if !self.can_transition_to(new_status) {
            let reason = if self.is_terminal() {
                format!("task {} is already in terminal state", self.id)
            } else {
                "transition not permitted".to_string()
            };
            return Err(DomainError::InvalidStateTransition {
                from: self.status.as_str().to_string(),
                to: new_status.as_str().to_string(),
                reason,
            });
        }

        let now = Utc::now();
        let from_status = self.status;
        self.status = new_status;
        self.updated_at = now;

        match new_status {
            TaskStatus::Running => self.started_at = Some(now),
            TaskStatus::Failed => {
                self.completed_at = Some(now);
                self.error_reason = reason.map(str::to_string);
            }
            TaskStatus::Completed | TaskStatus::Superseded => self.completed_at = Some(now),
            TaskStatus::Received | TaskStatus::Queued => {}
        }

        Ok(TaskTransition {
            task_id: self.id,
            from_status,
            to_status: new_status,
            transitioned_at: now,
        })
    }

    /// Fresh `Received` copy of this task for an operator retry.
    pub fn clone_for_retry(&self) -> Self {
        let mut task = Task::new(self.project_id, self.gitlab_project_id, self.task_type, self.priority)
            .with_origin(self.origin)
            .with_merge_request(self.mr_iid)
            .with_issue(self.issue_iid)
            .with_commit(self.commit_sha.clone());
        task.intent = self.intent;
        task.metadata = TaskMetadata {
            question: self.metadata.question.clone(),
            title: self.metadata.title.clone(),
            description: self.metadata.description.clone(),
            ..TaskMetadata::default()
        };
        task
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task() -> Task {
        Task::new(1, 100, TaskType::CodeReview, TaskPriority::Normal)
    }

    #[test]
    fn test_task_creation() {
        let task = task();
        assert_eq!(task.status, TaskStatus::Received);
        assert_eq!(task.origin, TaskOrigin::Webhook);
        assert!(task.retry_count.is_none());
        assert!(task.started_at.is_none());
    }

    #[test]
    fn test_lifecycle_transitions() {
        let mut task = task();
        let audit = task.transition_to(TaskStatus::Queued, None).unwrap();
        assert_eq!(audit.from_status, TaskStatus::Received);
        assert_eq!(audit.to_status, TaskStatus::Queued);

        task.transition_to(TaskStatus::Running, None).unwrap();
        assert!(task.started_at.is_some());

        task.transition_to(TaskStatus::Completed, None).unwrap();
        assert!(task.completed_at.is_some());
        assert!(task.is_terminal());
    }

    #[test]
    fn test_failed_records_reason() {
        let mut task = task();
        task.transition_to(TaskStatus::Queued, None).unwrap();
        task.transition_to(TaskStatus::Failed, Some("missing_trigger_token")).unwrap();
        assert_eq!(task.error_reason.as_deref(), Some("missing_trigger_token"));
    }

    #[test]
    fn test_terminal_states_reject_transitions() {
        for terminal in [TaskStatus::Completed, TaskStatus::Failed, TaskStatus::Superseded] {
            let mut task = task();
            task.status = terminal;
            for target in [TaskStatus::Queued, TaskStatus::Running, TaskStatus::Completed, TaskStatus::Failed] {
                let err = task.transition_to(target, None).unwrap_err();
                assert!(matches!(err, DomainError::InvalidStateTransition { .. }));
            }
            assert_eq!(task.status, terminal);
        }
    }

    #[test]
    fn test_received_cannot_skip_queue() {
        let mut task = task();
        assert!(task.transition_to(TaskStatus::Running, None).is_err());
        assert!(task.transition_to(TaskStatus::Superseded, None).is_err());
    }

    #[test]
    fn test_clone_for_retry_resets_state() {
        let mut original = task()
            .with_merge_request(Some(42))
            .with_commit(Some("abc".to_string()));
        original.retry_count = Some(3);
        original.error_reason = Some("max_retries_exceeded".to_string());
        original.status = TaskStatus::Failed;
        original.pipeline_id = Some(9);

        let retry = original.clone_for_retry();
        assert_ne!(retry.id, original.id);
        assert_eq!(retry.status, TaskStatus::Received);
        assert_eq!(retry.mr_iid, Some(42));
        assert_eq!(retry.commit_sha.as_deref(), Some("abc"));
        assert!(retry.retry_count.is_none());
        assert!(retry.error_reason.is_none());
        assert!(retry.pipeline_id.is_none());
    }

    #[test]
    fn test_priority_queue_names() {
        assert_eq!(TaskPriority::High.queue_name(), "high");
        assert_eq!(TaskPriority::from_str("LOW"), Some(TaskPriority::Low));
    }
}
