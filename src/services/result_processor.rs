//! Applies runner reports to running tasks.

use std::sync::Arc;

use serde_json::Value;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AttemptRecord, Task, TaskStatus, TaskType};
use crate::domain::ports::TaskRepository;
use crate::services::completion_notifier::CompletionNotifier;
use crate::services::failure_handler::{FailureHandler, FailureOutcome};

/// What the runner reported for a task.
#[derive(Debug, Clone, PartialEq)]
pub enum RunnerReport {
    /// Runner finished with a result payload
    Completed {
        result: Value,
    },
    /// Runner gave up after its own retries
    Failed {
        error: String,
        error_message: Option<String>,
        attempts: Vec<AttemptRecord>,
    },
}

/// What a runner report did to its task.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    /// Task completed with the reported result
    Completed,
    /// Task failed; `reason` is the stored failure code
    Failed { reason: String },
    /// Task was superseded while the runner worked; report dropped
    Discarded,
    /// Task is not running and cannot take a report
    NotRunning(TaskStatus),
}

/// Top-level keys a successful result must carry for `task_type`.
pub fn required_result_keys(task_type: TaskType) -> &'static [&'static str] {
    match task_type {
        TaskType::CodeReview | TaskType::SecurityAudit => &["summary"],
        TaskType::FeatureDev | TaskType::UiAdjustment => &["branch"],
        TaskType::IssueDiscussion | TaskType::DeepAnalysis | TaskType::PrdCreation => &[],
    }
}

fn missing_keys(task_type: TaskType, result: &Value) -> Vec<&'static str> {
    let object = result.as_object();
    required_result_keys(task_type)
        .iter()
        .copied()
        .filter(|key| !object.is_some_and(|o| o.contains_key(*key)))
        .collect()
}

/// Applies runner reports to running tasks.
pub struct ResultProcessor {
    tasks: Arc<dyn TaskRepository>,
    failures: Arc<FailureHandler>,
    notifier: Arc<CompletionNotifier>,
}

impl ResultProcessor {
    /// Processor routing failures through `failures`.
    pub fn new(tasks: Arc<dyn TaskRepository>, failures: Arc<FailureHandler>, notifier: Arc<CompletionNotifier>) -> Self {
        Self {
            tasks,
            failures,
            notifier,
        }
    }

    /// Apply `report` to `task`.
    ///
    /// Only a `Running` task accepts a report. A success lacking the keys its
    /// task type requires is treated as a failure.
    pub async fn handle(&self, task: Task, report: RunnerReport) -> DomainResult<ReportOutcome> {
        match task.status {
            TaskStatus::Running => {}
            TaskStatus::Superseded => {
                tracing::info!(task_id = %task.id, "result for superseded task discarded");
                return Ok(ReportOutcome::Discarded);
            }
            status => {
                tracing::warn!(task_id = %task.id, status = status.as_str(), "result for task that is not running");
                return Ok(ReportOutcome::NotRunning(status));
            }
        }

        match report {
            RunnerReport::Completed { result } => self.complete(task, result).await,
            RunnerReport::Failed {
                error,
                error_message,
                attempts,
            } => self.fail(task, &error, error_message, attempts).await,
        }
    }

    /// Validate `result` and finish the running task with it.
    pub async fn complete(&self, mut task: Task, result: Value) -> DomainResult<ReportOutcome> {
        let missing = missing_keys(task.task_type, &result);
        if !missing.is_empty() {
            let details = format!("result is missing required keys: {}", missing.join(", "));
            tracing::warn!(task_id = %task.id, task_type = task.task_type.as_str(), %details, "result rejected");
            return self.fail(task, "schema_validation_failed", Some(details), Vec::new()).await;
        }

        let transition = task.transition_to(TaskStatus::Completed, None)?;
        task.result = Some(result);
        match self.tasks.apply_transition(&task, &transition).await {
            Ok(()) => {}
            Err(DomainError::ConcurrencyConflict { .. }) => return self.current_outcome(&task).await,
            Err(e) => return Err(e),
        }

        tracing::info!(task_id = %task.id, task_type = task.task_type.as_str(), "task completed");
        self.notifier.notify(&task).await.log("completion_notification");
        Ok(ReportOutcome::Completed)
    }

    async fn fail(
        &self,
        task: Task,
        reason: &str,
        details: Option<String>,
        attempts: Vec<AttemptRecord>,
    ) -> DomainResult<ReportOutcome> {
        match self.failures.handle_permanent_failure(task, reason, details, attempts).await? {
            FailureOutcome::DeadLettered(_) => Ok(ReportOutcome::Failed {
                reason: reason.to_string(),
            }),
            FailureOutcome::AlreadyTerminal(TaskStatus::Superseded) => Ok(ReportOutcome::Discarded),
            FailureOutcome::AlreadyTerminal(status) => Ok(ReportOutcome::NotRunning(status)),
        }
    }

    /// Outcome for a task whose row moved on between load and write.
    async fn current_outcome(&self, task: &Task) -> DomainResult<ReportOutcome> {
        let current = self.tasks.get(task.id).await?.ok_or(DomainError::TaskNotFound(task.id))?;
        Ok(match current.status {
            TaskStatus::Superseded => ReportOutcome::Discarded,
            status => ReportOutcome::NotRunning(status),
        })
    }
}
