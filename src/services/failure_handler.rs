//! Permanent failure handling: fail the task, dead-letter it, explain why.

use std::sync::Arc;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AttemptRecord, DeadLetterEntry, EffectOutcome, Task, TaskStatus};
use crate::domain::ports::{DeadLetterRepository, GitLabApi, TaskRepository};
use crate::services::comments::failure_comment;
use crate::services::completion_notifier::CompletionNotifier;

/// What a permanent failure did.
#[derive(Debug, Clone, PartialEq)]
pub enum FailureOutcome {
    /// Task moved to `Failed` and snapshotted into this entry
    DeadLettered(DeadLetterEntry),
    /// Task was already terminal; nothing changed
    AlreadyTerminal(TaskStatus),
}

/// Fails tasks for good: status, dead letter, GitLab comment and notification.
pub struct FailureHandler {
    tasks: Arc<dyn TaskRepository>,
    dead_letters: Arc<dyn DeadLetterRepository>,
    gitlab: Arc<dyn GitLabApi>,
    notifier: Arc<CompletionNotifier>,
}

impl FailureHandler {
    /// Handler over the given collaborators.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        dead_letters: Arc<dyn DeadLetterRepository>,
        gitlab: Arc<dyn GitLabApi>,
        notifier: Arc<CompletionNotifier>,
    ) -> Self {
        Self {
            tasks,
            dead_letters,
            gitlab,
            notifier,
        }
    }

    /// Fail `task` with `reason` and create its dead letter entry.
    ///
    /// Terminal tasks are left untouched. If the stored task changed under
    /// us and is now terminal, that also counts as already handled.
    pub async fn handle_permanent_failure(
        &self,
        mut task: Task,
        reason: &str,
        error_details: Option<String>,
        attempts: Vec<AttemptRecord>,
    ) -> DomainResult<FailureOutcome> {
        if task.is_terminal() {
            tracing::debug!(task_id = %task.id, status = task.status.as_str(), reason, "failure ignored for terminal task");
            return Ok(FailureOutcome::AlreadyTerminal(task.status));
        }

        let transition = task.transition_to(TaskStatus::Failed, Some(reason)).inspect_err(|e| {
            tracing::error!(task_id = %task.id, error = %e, "cannot fail task");
        })?;

        match self.tasks.apply_transition(&task, &transition).await {
            Ok(()) => {}
            Err(DomainError::ConcurrencyConflict { .. }) => {
                let current = self.tasks.get(task.id).await?.ok_or(DomainError::TaskNotFound(task.id))?;
                if current.is_terminal() {
                    tracing::debug!(task_id = %task.id, status = current.status.as_str(), "task finished concurrently");
                    return Ok(FailureOutcome::AlreadyTerminal(current.status));
                }
                return Err(DomainError::ConcurrencyConflict {
                    entity: "task".to_string(),
                    id: task.id.to_string(),
                });
            }
            Err(e) => return Err(e),
        }

        let entry = DeadLetterEntry::new(&task, reason, error_details, attempts);
        self.dead_letters.insert(&entry).await?;
        tracing::warn!(
            task_id = %task.id,
            dead_letter_id = %entry.id,
            reason,
            attempts = entry.attempts.len(),
            "task dead-lettered"
        );

        self.post_failure_comment(&task, reason, entry.error_details.as_deref())
            .await
            .log("failure_comment");
        self.notifier.notify(&task).await.log("failure_notification");

        Ok(FailureOutcome::DeadLettered(entry))
    }

    async fn post_failure_comment(&self, task: &Task, reason: &str, details: Option<&str>) -> EffectOutcome {
        let body = failure_comment(reason, details);
        let project = task.gitlab_project_id;

        match (task.mr_iid, task.comment_id, task.issue_iid) {
            (Some(mr), Some(note), _) => self.gitlab.update_mr_note(project, mr, note, &body).await.into(),
            (Some(mr), None, _) => self.gitlab.create_mr_note(project, mr, &body).await.map(|_| ()).into(),
            (None, _, Some(issue)) => self.gitlab.create_issue_note(project, issue, &body).await.map(|_| ()).into(),
            (None, _, None) => EffectOutcome::skipped("task has no merge request or issue"),
        }
    }
}
