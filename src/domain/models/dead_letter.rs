//! Dead letter entries for permanently failed tasks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::task::Task;
use crate::domain::errors::{DomainError, DomainResult};

/// One execution attempt made before the task was dead-lettered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptRecord {
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub error: String,
}

impl AttemptRecord {
    /// Attempt `attempt` failed with `error` just now.
    pub fn new(attempt: u32, error: impl Into<String>) -> Self {
        Self { attempt, timestamp: Utc::now(), error: error.into() }
    }
}

/// Snapshot of a permanently failed task plus operator resolution state.
///
/// `retried` and `dismissed` are mutually exclusive and each can be set once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetterEntry {
    pub id: Uuid,
    pub task_id: Uuid,
    /// Task as it was when it failed
    pub task_record: Task,
    /// Short error code reported by the runner
    pub failure_reason: String,
    pub error_details: Option<String>,
    pub attempts: Vec<AttemptRecord>,
    /// When the failed task was first queued
    pub originally_queued_at: Option<DateTime<Utc>>,
    pub dead_lettered_at: DateTime<Utc>,
    pub dismissed: bool,
    pub dismissed_at: Option<DateTime<Utc>>,
    pub dismissed_by: Option<String>,
    pub retried: bool,
    pub retried_at: Option<DateTime<Utc>>,
    pub retried_by: Option<String>,
    /// Task created by the retry
    pub retried_task_id: Option<Uuid>,
}

impl DeadLetterEntry {
    /// Park `task` after it failed for `failure_reason`.
    pub fn new(
        task: &Task,
        failure_reason: impl Into<String>,
        error_details: Option<String>,
        attempts: Vec<AttemptRecord>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            task_id: task.id,
            task_record: task.clone(),
            failure_reason: failure_reason.into(),
            error_details,
            attempts,
            originally_queued_at: Some(task.created_at),
            dead_lettered_at: Utc::now(),
            dismissed: false,
            dismissed_at: None,
            dismissed_by: None,
            retried: false,
            retried_at: None,
            retried_by: None,
            retried_task_id: None,
        }
    }

    /// Neither retried nor dismissed.
    pub fn is_open(&self) -> bool {
        !self.retried && !self.dismissed
    }

    /// Guard shared by retry: fails if the entry was already resolved either way.
    pub fn ensure_retryable(&self) -> DomainResult<()> {
        if self.retried {
            return Err(DomainError::LogicError(format!(
                "dead letter entry {} has already been retried",
                self.id
            )));
        }
        if self.dismissed {
            return Err(DomainError::LogicError(format!(
                "cannot retry dismissed dead letter entry {}",
                self.id
            )));
        }
        Ok(())
    }

    /// Error unless the entry is still open.
    pub fn ensure_dismissable(&self) -> DomainResult<()> {
        if self.dismissed {
            return Err(DomainError::LogicError(format!(
                "dead letter entry {} has already been dismissed",
                self.id
            )));
        }
        if self.retried {
            return Err(DomainError::LogicError(format!(
                "cannot dismiss retried dead letter entry {}",
                self.id
            )));
        }
        Ok(())
    }

    /// Resolve as retried by `actor` with `new_task_id`.
    pub fn mark_retried(&mut self, actor: &str, new_task_id: Uuid) -> DomainResult<()> {
        self.ensure_retryable()?;
        self.retried = true;
        self.retried_at = Some(Utc::now());
        self.retried_by = Some(actor.to_string());
        self.retried_task_id = Some(new_task_id);
        Ok(())
    }

    /// Resolve as dismissed by `actor`.
    pub fn mark_dismissed(&mut self, actor: &str) -> DomainResult<()> {
        self.ensure_dismissable()?;
        self.dismissed = true;
        self.dismissed_at = Some(Utc::now());
        self.dismissed_by = Some(actor.to_string());
        Ok(())
    }
}
