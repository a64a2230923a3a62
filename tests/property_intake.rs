use std::sync::Arc;

use mergeward::adapters::sqlite::{create_migrated_test_pool, SqliteEventLogRepository, SqliteTaskRepository};
use mergeward::domain::models::{
    DomainEvent, Intent, MergeRequestEvent, ProjectRef, RoutingResult, Task, TaskPriority, TaskStatus, TaskType,
};
use mergeward::domain::ports::TaskRepository;
use mergeward::services::{DedupOutcome, EventContext, EventDeduplicator, EventParser, TaskDispatchService};
use proptest::prelude::*;
use proptest::test_runner::TestCaseError;

const KNOWN_MR_ACTIONS: [&str; 3] = ["open", "update", "merge"];

fn mr_change(project_id: i64, mr_iid: i64, sha: &str) -> RoutingResult {
    RoutingResult::new(
        Intent::AutoReview,
        TaskPriority::Normal,
        DomainEvent::MergeRequestUpdated(MergeRequestEvent {
            project: ProjectRef::new(project_id, project_id * 100),
            mr_iid,
            source_branch: Some("feature".to_string()),
            target_branch: Some("main".to_string()),
            author_id: Some(3),
            last_commit_sha: Some(sha.to_string()),
        }),
    )
}

fn fail(e: impl std::fmt::Display) -> TestCaseError {
    TestCaseError::fail(e.to_string())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Property: only open, update and merge produce a merge request event
    ///
    /// Any other action string, however close to a known one, parses to
    /// nothing rather than an error or a guessed event.
    #[test]
    fn prop_unrecognized_mr_action_is_ignored(
        action in "[a-zA-Z_ ]{0,16}",
        mr_iid in 1i64..100_000,
    ) {
        prop_assume!(!KNOWN_MR_ACTIONS.contains(&action.as_str()));

        let context = EventContext {
            event_type: "merge_request".to_string(),
            project_id: 1,
            gitlab_project_id: 100,
            action: Some(action.clone()),
            merge_request_iid: Some(mr_iid),
            last_commit_sha: Some("abc".to_string()),
            ..EventContext::default()
        };
        prop_assert_eq!(EventParser::parse(&context), None, "action {:?}", action);
    }

    /// Property: unknown event types never parse
    #[test]
    fn prop_unknown_event_type_is_ignored(event_type in "[a-z_]{1,20}") {
        prop_assume!(!["merge_request", "note", "issue", "push"].contains(&event_type.as_str()));

        let context = EventContext {
            event_type,
            project_id: 1,
            gitlab_project_id: 100,
            action: Some("open".to_string()),
            merge_request_iid: Some(1),
            ..EventContext::default()
        };
        prop_assert_eq!(EventParser::parse(&context), None);
    }

    /// Property: a delivery UUID is a duplicate only within its own project
    ///
    /// Replaying a key in the project that first saw it is rejected, while
    /// the same key arriving for any other project is accepted once.
    #[test]
    fn prop_delivery_uuid_is_scoped_per_project(
        key in "[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}",
        first in 1i64..1_000,
        second in 1i64..1_000,
    ) {
        prop_assume!(first != second);

        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = create_migrated_test_pool().await.map_err(fail)?;
            let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
            let dedup = EventDeduplicator::new(tasks, Arc::new(SqliteEventLogRepository::new(pool)));

            let accepted = dedup.process(Some(&key), &mr_change(first, 1, "a")).await.map_err(fail)?;
            prop_assert!(accepted.is_accepted());

            let elsewhere = dedup.process(Some(&key), &mr_change(second, 1, "a")).await.map_err(fail)?;
            prop_assert!(elsewhere.is_accepted());

            for project_id in [first, second] {
                let replay = dedup.process(Some(&key), &mr_change(project_id, 1, "b")).await.map_err(fail)?;
                prop_assert_eq!(replay.outcome, DedupOutcome::DuplicateUuid);
            }
            Ok::<(), TestCaseError>(())
        })?;
    }

    /// Property: a merge request change supersedes exactly the in-flight
    /// tasks of that merge request
    ///
    /// Queued and running tasks of the MR are counted; tasks of other MRs
    /// and finished tasks of the same MR are left alone.
    #[test]
    fn prop_superseded_count_equals_in_flight(
        queued in 0usize..4,
        running in 0usize..4,
        unrelated in 0usize..3,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let pool = create_migrated_test_pool().await.map_err(fail)?;
            let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
            let submit = TaskDispatchService::new(tasks.clone());
            let dedup = EventDeduplicator::new(tasks.clone(), Arc::new(SqliteEventLogRepository::new(pool)));

            let review = |mr_iid: i64, n: usize| {
                Task::new(1, 100, TaskType::CodeReview, TaskPriority::Normal)
                    .with_merge_request(Some(mr_iid))
                    .with_commit(Some(format!("sha-{n}")))
            };

            for n in 0..queued {
                submit.submit(review(42, n)).await.map_err(fail)?;
            }
            for n in 0..running {
                let mut task = submit.submit(review(42, queued + n)).await.map_err(fail)?;
                let transition = task.transition_to(TaskStatus::Running, None).map_err(fail)?;
                tasks.apply_transition(&task, &transition).await.map_err(fail)?;
            }
            for n in 0..unrelated {
                submit.submit(review(7, n)).await.map_err(fail)?;
            }
            let mut finished = submit.submit(review(42, 99)).await.map_err(fail)?;
            for status in [TaskStatus::Running, TaskStatus::Completed] {
                let transition = finished.transition_to(status, None).map_err(fail)?;
                tasks.apply_transition(&finished, &transition).await.map_err(fail)?;
            }

            let result = dedup.process(None, &mr_change(1, 42, "fresh")).await.map_err(fail)?;
            prop_assert!(result.is_accepted());
            prop_assert_eq!(result.superseded_count(), queued + running);
            prop_assert!(result.superseded.iter().all(|t| t.status == TaskStatus::Superseded));

            let in_flight = tasks
                .count_by_status(&[TaskStatus::Queued, TaskStatus::Running])
                .await
                .map_err(fail)?;
            prop_assert_eq!(in_flight, u64::try_from(unrelated).unwrap());
            Ok::<(), TestCaseError>(())
        })?;
    }
}
