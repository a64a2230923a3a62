//! Operator actions on dead-lettered tasks.

use std::sync::Arc;

use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{DeadLetterEntry, Task, TaskStatus};
use crate::domain::ports::{DeadLetterFilters, DeadLetterRepository};

/// Lists, retries and dismisses dead letter entries.
pub struct DeadLetterService {
    dead_letters: Arc<dyn DeadLetterRepository>,
}

impl DeadLetterService {
    /// Service over `dead_letters`.
    pub fn new(dead_letters: Arc<dyn DeadLetterRepository>) -> Self {
        Self { dead_letters }
    }

    async fn load(&self, entry_id: Uuid) -> DomainResult<DeadLetterEntry> {
        self.dead_letters
            .get(entry_id)
            .await?
            .ok_or(DomainError::DeadLetterNotFound(entry_id))
    }

    /// Entries matching `filters`, newest first.
    pub async fn list(&self, filters: DeadLetterFilters) -> DomainResult<Vec<DeadLetterEntry>> {
        self.dead_letters.list(filters).await
    }

    /// One entry, or `DeadLetterNotFound`.
    pub async fn get(&self, entry_id: Uuid) -> DomainResult<DeadLetterEntry> {
        self.load(entry_id).await
    }

    /// Re-dispatch a fresh copy of the snapshotted task.
    ///
    /// The entry is marked retried in the same transaction that queues the
    /// new task. A concurrent retry or dismiss loses with
    /// `ConcurrencyConflict`, and a failed write leaves the entry open.
    pub async fn retry(&self, entry_id: Uuid, actor: &str) -> DomainResult<(DeadLetterEntry, Task)> {
        let mut entry = self.load(entry_id).await?;
        let mut task = entry.task_record.clone_for_retry();

        entry.mark_retried(actor, task.id)?;
        let transition = task.transition_to(TaskStatus::Queued, None)?;
        self.dead_letters.resolve_with_retry(&entry, &task, &transition).await?;

        tracing::info!(
            dead_letter_id = %entry.id,
            original_task_id = %entry.task_id,
            new_task_id = %task.id,
            actor,
            "dead letter retried"
        );
        Ok((entry, task))
    }

    /// Close the entry without re-dispatching.
    pub async fn dismiss(&self, entry_id: Uuid, actor: &str) -> DomainResult<DeadLetterEntry> {
        let mut entry = self.load(entry_id).await?;
        entry.mark_dismissed(actor)?;
        self.dead_letters.save_resolution(&entry).await?;
        tracing::info!(dead_letter_id = %entry.id, task_id = %entry.task_id, actor, "dead letter dismissed");
        Ok(entry)
    }
}
