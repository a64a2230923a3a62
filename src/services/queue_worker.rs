//! Polls one priority queue and dispatches its tasks, retrying failed
//! dispatches with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use backoff::backoff::Backoff;
use backoff::ExponentialBackoffBuilder;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AttemptRecord, TaskPriority, WorkerConfig};
use crate::domain::ports::{TaskRepository, WorkQueue};
use crate::services::failure_handler::FailureHandler;
use crate::services::task_dispatcher::{DispatchError, DispatchOutcome, TaskDispatcher};

/// What happened to one claimed queue entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkOutcome {
    /// The dispatcher accepted the task, possibly as a skip
    Dispatched(DispatchOutcome),
    /// Every attempt failed; the task was handed to the failure handler
    DeadLettered { reason: String, attempts: usize },
}

/// Worker bound to one priority queue.
pub struct QueueWorker {
    priority: TaskPriority,
    queue: Arc<dyn WorkQueue>,
    tasks: Arc<dyn TaskRepository>,
    dispatcher: Arc<TaskDispatcher>,
    failures: Arc<FailureHandler>,
    config: WorkerConfig,
}

impl QueueWorker {
    /// Worker draining the `priority` queue.
    pub fn new(
        priority: TaskPriority,
        queue: Arc<dyn WorkQueue>,
        tasks: Arc<dyn TaskRepository>,
        dispatcher: Arc<TaskDispatcher>,
        failures: Arc<FailureHandler>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            priority,
            queue,
            tasks,
            dispatcher,
            failures,
            config,
        }
    }

    /// Run until a shutdown signal arrives.
    pub fn start(self: Arc<Self>, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let idle = Duration::from_millis(self.config.poll_interval_ms);
            tracing::info!(queue = self.priority.queue_name(), "queue worker started");

            loop {
                let drained = match self.poll_once().await {
                    Ok(Some(_)) => false,
                    Ok(None) => true,
                    Err(e) => {
                        tracing::error!(queue = self.priority.queue_name(), error = %e, "queue poll failed");
                        true
                    }
                };

                if drained {
                    tokio::select! {
                        _ = shutdown_rx.recv() => break,
                        () = tokio::time::sleep(idle) => {}
                    }
                } else if !matches!(shutdown_rx.try_recv(), Err(broadcast::error::TryRecvError::Empty)) {
                    break;
                }
            }

            tracing::info!(queue = self.priority.queue_name(), "queue worker stopped");
        })
    }

    /// Claim and process the next task; `None` when the queue is empty.
    ///
    /// The entry is acknowledged only once processing settles. If
    /// processing errors or the worker dies first, the claim expires and the
    /// entry is picked up again.
    pub async fn poll_once(&self) -> DomainResult<Option<WorkOutcome>> {
        let Some(task_id) = self.queue.dequeue(self.priority).await? else {
            return Ok(None);
        };
        let outcome = self.process(task_id).await?;
        self.queue.ack(task_id).await?;
        Ok(Some(outcome))
    }

    /// Dispatch `task_id` with retries, dead-lettering it when every attempt
    /// fails.
    pub async fn process(&self, task_id: Uuid) -> DomainResult<WorkOutcome> {
        let max_attempts = self.config.max_attempts.max(1);
        let mut backoff = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.config.initial_backoff_ms))
            .with_max_interval(Duration::from_millis(self.config.max_backoff_ms))
            .with_max_elapsed_time(None)
            .build();
        let mut attempts = Vec::new();
        let mut last_error: Option<DispatchError> = None;

        for attempt in 1..=max_attempts {
            match self.dispatcher.dispatch(task_id).await {
                Ok(outcome) => {
                    tracing::debug!(%task_id, attempt, ?outcome, "task dispatched");
                    return Ok(WorkOutcome::Dispatched(outcome));
                }
                Err(e) => {
                    tracing::warn!(%task_id, attempt, max_attempts, error = %e, "dispatch attempt failed");
                    attempts.push(AttemptRecord::new(attempt, e.to_string()));
                    let give_up = e.is_invalid_request();
                    last_error = Some(e);
                    if give_up {
                        break;
                    }
                    if attempt < max_attempts {
                        let delay = backoff.next_backoff().unwrap_or(backoff.max_interval);
                        tokio::time::sleep(delay).await;
                    }
                }
            }
        }

        let reason = match &last_error {
            Some(e) if e.is_invalid_request() => "invalid_request",
            _ => "max_retries_exceeded",
        };
        let details = last_error.map(|e| e.to_string());

        let Some(mut task) = self.tasks.get(task_id).await? else {
            tracing::warn!(%task_id, "task vanished before it could be dead-lettered");
            return Ok(WorkOutcome::Dispatched(DispatchOutcome::Skipped));
        };
        task.retry_count = Some(u32::try_from(attempts.len().saturating_sub(1)).unwrap_or(u32::MAX));
        self.tasks.update_details(&task).await?;

        let count = attempts.len();
        self.failures.handle_permanent_failure(task, reason, details, attempts).await?;
        Ok(WorkOutcome::DeadLettered {
            reason: reason.to_string(),
            attempts: count,
        })
    }
}
