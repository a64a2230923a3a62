//! Duplicate suppression and latest-wins superseding.
//!
//! Three independent guards run in order:
//!
//! 1. Delivery UUID: a key already logged for the project is a replay.
//! 2. Commit SHA: an in-flight task for the same MR and commit is a
//!    duplicate delivery of the same change.
//! 3. Superseding: a merge request change marks every in-flight task of that
//!    MR as superseded, so at most one review per MR is ever active.
//!
//! Callers must serialize calls per `(project_id, mr_iid)`; see
//! [`crate::services::webhook_intake`].

use std::sync::Arc;

use serde::Serialize;

use crate::domain::errors::DomainResult;
use crate::domain::models::{RoutingResult, Task, WebhookEventLogEntry};
use crate::domain::ports::{EventLogRepository, TaskRepository};

/// Verdict of the duplicate guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DedupOutcome {
    /// Proceed to dispatch
    Accept,
    /// Delivery UUID already seen for this project
    DuplicateUuid,
    /// Same MR and commit already in flight
    DuplicateCommit,
}

impl DedupOutcome {
    /// Stable name used in logs and responses.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Accept => "accept",
            Self::DuplicateUuid => "duplicate_uuid",
            Self::DuplicateCommit => "duplicate_commit",
        }
    }
}

/// Decision for one routed event.
#[derive(Debug, Clone)]
pub struct DeduplicationResult {
    /// Guard verdict
    pub outcome: DedupOutcome,
    /// Tasks this event superseded, as persisted
    pub superseded: Vec<Task>,
}

impl DeduplicationResult {
    fn rejected(outcome: DedupOutcome) -> Self {
        Self { outcome, superseded: Vec::new() }
    }

    /// Whether the event may be dispatched.
    pub fn is_accepted(&self) -> bool {
        self.outcome == DedupOutcome::Accept
    }

    /// Number of in-flight tasks this event superseded.
    pub fn superseded_count(&self) -> usize {
        self.superseded.len()
    }
}

/// Runs the UUID, commit and superseding guards for routed events.
pub struct EventDeduplicator {
    tasks: Arc<dyn TaskRepository>,
    event_log: Arc<dyn EventLogRepository>,
}

impl EventDeduplicator {
    /// Deduplicator over the task store and the delivery log.
    pub fn new(tasks: Arc<dyn TaskRepository>, event_log: Arc<dyn EventLogRepository>) -> Self {
        Self { tasks, event_log }
    }

    /// Decide whether `routing` should proceed to dispatch.
    ///
    /// A `None` key skips the UUID guard and the event log entirely.
    pub async fn process(
        &self,
        idempotency_key: Option<&str>,
        routing: &RoutingResult,
    ) -> DomainResult<DeduplicationResult> {
        let event = &routing.event;
        let project_id = event.project().project_id;

        if let Some(key) = idempotency_key {
            if self.event_log.exists(project_id, key).await? {
                tracing::info!(key, project_id, event_type = event.event_type(), "duplicate delivery UUID");
                return Ok(DeduplicationResult::rejected(DedupOutcome::DuplicateUuid));
            }
        }

        let mr_iid = event.mr_iid();
        let change = event.is_merge_request_change();

        if let (true, Some(mr_iid), Some(sha)) = (change, mr_iid, event.commit_sha()) {
            if self.tasks.has_in_flight_commit(project_id, mr_iid, sha).await? {
                tracing::info!(project_id, mr_iid, commit_sha = sha, "duplicate commit already in flight");
                return Ok(DeduplicationResult::rejected(DedupOutcome::DuplicateCommit));
            }
        }

        let superseded = match (change, mr_iid) {
            (true, Some(mr_iid)) => {
                let superseded = self.tasks.supersede_in_flight(project_id, mr_iid).await?;
                if !superseded.is_empty() {
                    tracing::info!(project_id, mr_iid, superseded_count = superseded.len(), "superseded in-flight tasks");
                }
                superseded
            }
            _ => Vec::new(),
        };

        if let Some(key) = idempotency_key {
            let entry = WebhookEventLogEntry::from_routing(key, routing);
            if !self.event_log.record(&entry).await? {
                // Lost the race against a concurrent delivery of the same key.
                tracing::warn!(key, project_id, "concurrent duplicate delivery UUID");
                return Ok(DeduplicationResult { outcome: DedupOutcome::DuplicateUuid, superseded });
            }
        }

        Ok(DeduplicationResult { outcome: DedupOutcome::Accept, superseded })
    }
}
