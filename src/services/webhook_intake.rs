//! Synchronous ingestion path: parse, route, deduplicate, dispatch.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::domain::errors::DomainResult;
use crate::domain::models::{EffectOutcome, Intent, Project, RoutingResult, Task};
use crate::domain::ports::GitLabApi;
use crate::services::comments::help_comment;
use crate::services::event_deduplicator::EventDeduplicator;
use crate::services::event_parser::EventContext;
use crate::services::intent_router::IntentRouter;
use crate::services::task_dispatch_service::TaskDispatchService;

/// Coarse verdict on a delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntakeStatus {
    /// Routed and, for dispatchable intents, queued
    Accepted,
    /// Rejected by the UUID or commit guard
    Duplicate,
    /// Unparseable, unrouted or from a disabled project
    Ignored,
}

/// Body returned to GitLab for a webhook delivery.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntakeResponse {
    pub status: IntakeStatus,
    pub event_type: String,
    pub project_id: i64,
    /// Routed intent, absent when the event was ignored
    pub intent: Option<Intent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// In-flight tasks superseded by this event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub superseded_count: Option<usize>,
    /// Task created for the event
    #[serde(skip_serializing_if = "Option::is_none")]
    pub task_id: Option<Uuid>,
}

impl IntakeResponse {
    fn new(status: IntakeStatus, event_type: &str, project_id: i64) -> Self {
        Self {
            status,
            event_type: event_type.to_string(),
            project_id,
            intent: None,
            reason: None,
            superseded_count: None,
            task_id: None,
        }
    }

    /// Response for a delivery that produced no event.
    pub fn ignored(event_type: &str, project_id: i64, reason: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.into()),
            ..Self::new(IntakeStatus::Ignored, event_type, project_id)
        }
    }
}

/// One async lock per `(project_id, mr_iid)`.
///
/// Entries nobody holds are pruned on the next acquisition.
#[derive(Default)]
pub struct MergeUnitLocks {
    locks: Mutex<HashMap<(i64, i64), Arc<Mutex<()>>>>,
}

impl MergeUnitLocks {
    /// Wait for the lock of one merge request.
    pub async fn acquire(&self, project_id: i64, mr_iid: i64) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
            locks.entry((project_id, mr_iid)).or_default().clone()
        };
        lock.lock_owned().await
    }

    /// Locks currently tracked.
    pub async fn len(&self) -> usize {
        self.locks.lock().await.len()
    }
}

/// Parse, route, deduplicate and dispatch one webhook delivery.
pub struct WebhookIntake {
    router: IntentRouter,
    deduplicator: EventDeduplicator,
    dispatch: Arc<TaskDispatchService>,
    gitlab: Arc<dyn GitLabApi>,
    locks: MergeUnitLocks,
}

impl WebhookIntake {
    /// Intake pipeline over the given stages.
    pub fn new(
        router: IntentRouter,
        deduplicator: EventDeduplicator,
        dispatch: Arc<TaskDispatchService>,
        gitlab: Arc<dyn GitLabApi>,
    ) -> Self {
        Self {
            router,
            deduplicator,
            dispatch,
            gitlab,
            locks: MergeUnitLocks::default(),
        }
    }

    /// Process one delivery for `project`. `event_type` is the internal
    /// name (`merge_request`, `note`, `issue`, `push`).
    pub async fn handle(
        &self,
        project: &Project,
        event_type: &str,
        payload: &Value,
        idempotency_key: Option<&str>,
    ) -> DomainResult<IntakeResponse> {
        let context = EventContext::from_gitlab_payload(event_type, project.reference(), payload);
        let Some(routing) = self.router.route_context(&context) else {
            tracing::debug!(project_id = project.id, event_type, "event produced no routing result");
            return Ok(IntakeResponse::new(IntakeStatus::Accepted, event_type, project.id));
        };

        let mut response = IntakeResponse {
            intent: Some(routing.intent),
            ..IntakeResponse::new(IntakeStatus::Accepted, event_type, project.id)
        };

        let guard = match routing.event.mr_iid() {
            Some(mr_iid) => Some(self.locks.acquire(project.id, mr_iid).await),
            None => None,
        };

        let dedup = self.deduplicator.process(idempotency_key, &routing).await?;
        let task = if dedup.is_accepted() {
            self.dispatch.dispatch(&routing).await?
        } else {
            None
        };
        drop(guard);

        for superseded in &dedup.superseded {
            self.cancel_pipeline(superseded).await.log("cancel_superseded_pipeline");
        }

        if routing.event.is_merge_request_change() {
            response.superseded_count = Some(dedup.superseded_count());
        }

        if !dedup.is_accepted() {
            tracing::info!(
                project_id = project.id,
                event_type,
                outcome = dedup.outcome.as_str(),
                "duplicate event rejected"
            );
            response.status = IntakeStatus::Duplicate;
            response.reason = Some(dedup.outcome.as_str().to_string());
            return Ok(response);
        }

        if routing.intent == Intent::HelpResponse {
            self.post_help(&routing).await.log("help_response");
        }

        response.task_id = task.map(|t| t.id);
        tracing::info!(
            project_id = project.id,
            event_type,
            intent = routing.intent.as_str(),
            task_id = ?response.task_id,
            "webhook accepted"
        );
        Ok(response)
    }

    async fn cancel_pipeline(&self, task: &Task) -> EffectOutcome {
        let Some(pipeline_id) = task.pipeline_id else {
            return EffectOutcome::skipped("superseded task had no pipeline");
        };
        tracing::info!(task_id = %task.id, pipeline_id, "cancelling pipeline of superseded task");
        self.gitlab.cancel_pipeline(task.gitlab_project_id, pipeline_id).await.into()
    }

    async fn post_help(&self, routing: &RoutingResult) -> EffectOutcome {
        let Some(mr_iid) = routing.event.mr_iid() else {
            return EffectOutcome::skipped("help response needs a merge request");
        };
        let body = help_comment(routing.command.as_deref());
        self.gitlab
            .create_mr_note(routing.event.project().gitlab_project_id, mr_iid, &body)
            .await
            .map(|_| ())
            .into()
    }
}
