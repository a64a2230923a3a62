//! Turns accepted routing results into queued tasks.

use std::sync::Arc;

use crate::domain::errors::DomainResult;
use crate::domain::models::{RoutingResult, Task, TaskMetadata, TaskOrigin, TaskStatus};
use crate::domain::ports::TaskRepository;

/// Creates tasks from routing results and queues them for the workers.
pub struct TaskDispatchService {
    tasks: Arc<dyn TaskRepository>,
}

impl TaskDispatchService {
    /// Service writing through `tasks`, which also owns the work queue rows.
    pub fn new(tasks: Arc<dyn TaskRepository>) -> Self {
        Self { tasks }
    }

    /// Create and enqueue the task for `routing`.
    ///
    /// Returns `None` for intents that never produce a task.
    pub async fn dispatch(&self, routing: &RoutingResult) -> DomainResult<Option<Task>> {
        let Some(task_type) = routing.intent.task_type() else {
            tracing::debug!(intent = routing.intent.as_str(), "non-dispatchable intent");
            return Ok(None);
        };

        let event = &routing.event;
        let project = event.project();
        let task = Task::new(project.project_id, project.gitlab_project_id, task_type, routing.priority)
            .with_origin(TaskOrigin::Webhook)
            .with_intent(routing.intent)
            .with_merge_request(event.mr_iid())
            .with_issue(event.issue_iid())
            .with_commit(event.commit_sha().map(str::to_string))
            .with_metadata(TaskMetadata {
                question: routing.question.clone(),
                ..TaskMetadata::default()
            });

        let task = self.submit(task).await?;
        tracing::info!(
            task_id = %task.id,
            task_type = task.task_type.as_str(),
            priority = task.priority.as_str(),
            intent = routing.intent.as_str(),
            "dispatched task"
        );
        Ok(Some(task))
    }

    /// Move a `Received` task to `Queued` and persist it together with its
    /// entry on the queue matching its priority.
    ///
    /// Nothing is stored when any of the writes fails.
    pub async fn submit(&self, mut task: Task) -> DomainResult<Task> {
        let transition = task.transition_to(TaskStatus::Queued, None)?;
        self.tasks.insert_queued(&task, &transition).await?;
        tracing::debug!(task_id = %task.id, from = "received", to = "queued", "task transition");
        Ok(task)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteTaskRepository, SqliteWorkQueue};
    use crate::domain::models::{
        DomainEvent, Intent, IssueLabelChanged, MergeRequestEvent, NoteOnMergeRequest, ProjectRef, TaskPriority,
        TaskType,
    };

    use crate::domain::ports::WorkQueue;

    fn service_on(pool: sqlx::SqlitePool) -> (TaskDispatchService, Arc<SqliteTaskRepository>, Arc<SqliteWorkQueue>) {
        let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let queue = Arc::new(SqliteWorkQueue::new(pool));
        (TaskDispatchService::new(tasks.clone()), tasks, queue)
    }

    async fn service() -> (TaskDispatchService, Arc<SqliteTaskRepository>, Arc<SqliteWorkQueue>) {
        service_on(create_migrated_test_pool().await.unwrap())
    }

    fn mr_event() -> DomainEvent {
        DomainEvent::MergeRequestUpdated(MergeRequestEvent {
            project: ProjectRef::new(1, 100),
            mr_iid: 42,
            source_branch: Some("feature".to_string()),
            target_branch: Some("main".to_string()),
            author_id: Some(3),
            last_commit_sha: Some("abc".to_string()),
        })
    }

    #[tokio::test]
    async fn test_dispatch_creates_queued_task_with_context() {
        let (service, tasks, queue) = service().await;
        let routing = RoutingResult::new(Intent::AutoReview, TaskPriority::Normal, mr_event());

        let task = service.dispatch(&routing).await.unwrap().unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.task_type, TaskType::CodeReview);
        assert_eq!(task.origin, TaskOrigin::Webhook);
        assert_eq!(task.mr_iid, Some(42));
        assert_eq!(task.commit_sha.as_deref(), Some("abc"));
        assert_eq!(task.gitlab_project_id, 100);

        let stored = tasks.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Queued);

        let audit = tasks.transitions(task.id).await.unwrap();
        assert_eq!(audit.len(), 1);
        assert_eq!(audit[0].from_status, TaskStatus::Received);
        assert_eq!(audit[0].to_status, TaskStatus::Queued);

        assert_eq!(queue.dequeue(TaskPriority::Normal).await.unwrap(), Some(task.id));
    }

    #[tokio::test]
    async fn test_priority_selects_queue() {
        let (service, _tasks, queue) = service().await;
        let note = DomainEvent::NoteOnMr(NoteOnMergeRequest {
            project: ProjectRef::new(1, 100),
            mr_iid: 42,
            note: "@ai review".to_string(),
            author_id: Some(3),
        });
        let high = service
            .dispatch(&RoutingResult::new(Intent::OnDemandReview, TaskPriority::High, note))
            .await
            .unwrap()
            .unwrap();

        let label = DomainEvent::IssueLabelChanged(IssueLabelChanged {
            project: ProjectRef::new(1, 100),
            issue_iid: 7,
            action: None,
            author_id: None,
            labels: vec!["ai::develop".to_string()],
        });
        let low = service
            .dispatch(&RoutingResult::new(Intent::FeatureDev, TaskPriority::Low, label))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(low.task_type, TaskType::FeatureDev);
        assert_eq!(low.issue_iid, Some(7));

        assert_eq!(queue.depth(TaskPriority::Normal).await.unwrap(), 0);
        assert_eq!(queue.dequeue(TaskPriority::High).await.unwrap(), Some(high.id));
        assert_eq!(queue.dequeue(TaskPriority::Low).await.unwrap(), Some(low.id));
    }

    #[tokio::test]
    async fn test_non_dispatchable_intents_create_nothing() {
        let (service, tasks, queue) = service().await;
        for intent in [Intent::AcceptanceTracking, Intent::HelpResponse] {
            let routing = RoutingResult::new(intent, TaskPriority::Normal, mr_event());
            assert!(service.dispatch(&routing).await.unwrap().is_none());
        }
        assert!(tasks.list(Default::default()).await.unwrap().is_empty());
        assert_eq!(queue.depth(TaskPriority::Normal).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ask_question_is_carried_on_metadata() {
        let (service, _tasks, _queue) = service().await;
        let note = DomainEvent::NoteOnMr(NoteOnMergeRequest {
            project: ProjectRef::new(1, 100),
            mr_iid: 42,
            note: r#"@ai ask "why?""#.to_string(),
            author_id: Some(3),
        });
        let routing = RoutingResult::new(Intent::AskCommand, TaskPriority::Normal, note).with_question("why?");
        let task = service.dispatch(&routing).await.unwrap().unwrap();
        assert_eq!(task.metadata.question.as_deref(), Some("why?"));
        assert_eq!(task.intent, Some(Intent::AskCommand));
    }

    #[tokio::test]
    async fn test_failed_enqueue_leaves_no_task_behind() {
        let pool = create_migrated_test_pool().await.unwrap();
        sqlx::query("CREATE TRIGGER reject_enqueue BEFORE INSERT ON work_queue BEGIN SELECT RAISE(ABORT, 'queue down'); END")
            .execute(&pool)
            .await
            .unwrap();
        let (service, tasks, queue) = service_on(pool);

        let routing = RoutingResult::new(Intent::AutoReview, TaskPriority::Normal, mr_event());
        assert!(service.dispatch(&routing).await.is_err());

        // No orphaned Queued row that would block the commit from being reviewed again.
        assert!(tasks.list(Default::default()).await.unwrap().is_empty());
        assert!(!tasks.has_in_flight_commit(1, 42, "abc").await.unwrap());
        assert_eq!(queue.depth(TaskPriority::Normal).await.unwrap(), 0);
    }
}
