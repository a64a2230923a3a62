//! Dead letter creation, retry and dismissal across the wired engine.

mod common;

use serde_json::json;

use common::{harness, merge_request, task_id, Harness, WEBHOOK_SECRET};
use mergeward::domain::models::{DeadLetterEntry, TaskPriority, TaskStatus};
use mergeward::domain::ports::{DeadLetterFilters, DeadLetterRepository, TaskRepository, WorkQueue};
use mergeward::services::{DispatchOutcome, WorkOutcome};
use mergeward::DomainError;

/// Accept a review for `iid` and fail its pipeline trigger.
async fn dead_lettered_review(h: &Harness, iid: i64) -> DeadLetterEntry {
    h.gitlab.fail("trigger_pipeline", 500).await;
    let (_, body) = h
        .webhook(WEBHOOK_SECRET, "Merge Request Hook", Some(format!("d-{iid}").as_str()), &merge_request(iid, "open", "sha"))
        .await;
    let id = task_id(&body);

    let outcome = h.worker(TaskPriority::Normal).poll_once().await.unwrap().unwrap();
    assert_eq!(
        outcome,
        WorkOutcome::Dispatched(DispatchOutcome::Failed {
            reason: "pipeline_trigger_failed".into()
        })
    );
    h.repos.dead_letters.find_by_task(id).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_trigger_failure_dead_letters_task() {
    let h = harness().await;
    let entry = dead_lettered_review(&h, 42).await;

    assert_eq!(entry.failure_reason, "pipeline_trigger_failed");
    assert!(entry.error_details.as_deref().unwrap_or_default().contains("500"));
    assert!(entry.is_open());

    let task = h.repos.tasks.get(entry.task_id).await.unwrap().unwrap();
    assert_eq!(task.status, TaskStatus::Failed);
    assert_eq!(task.error_reason.as_deref(), Some("pipeline_trigger_failed"));

    // The merge request is told about the failure.
    assert_eq!(h.gitlab.notes().await.len(), 1);

    let open = h
        .repos
        .dead_letters
        .list(DeadLetterFilters {
            open_only: true,
            ..DeadLetterFilters::default()
        })
        .await
        .unwrap();
    assert_eq!(open.len(), 1);
}

#[tokio::test]
async fn test_runner_failure_report_keeps_attempt_history() {
    let h = harness().await;
    let (_, body) = h
        .webhook(WEBHOOK_SECRET, "Merge Request Hook", Some("d-1"), &merge_request(5, "open", "abc"))
        .await;
    let id = task_id(&body);
    h.worker(TaskPriority::Normal).poll_once().await.unwrap();
    let token = h.gitlab.triggers().await[0].variable("MERGEWARD_TOKEN").unwrap().to_string();

    let (status, body) = h
        .report(
            id,
            &token,
            &json!({
                "status": "failed",
                "error": "agent_timeout",
                "error_message": "runner gave up after 3 tries",
                "attempts": [
                    {"attempt": 1, "error": "timeout"},
                    {"attempt": 2, "error": "timeout"},
                    {"attempt": 3, "error": "timeout"}
                ]
            }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["status"], "failed");
    assert_eq!(body["reason"], "agent_timeout");

    let entry = h.repos.dead_letters.find_by_task(id).await.unwrap().unwrap();
    assert_eq!(entry.failure_reason, "agent_timeout");
    assert_eq!(entry.attempts.len(), 3);
    assert_eq!(entry.task_record.mr_iid, Some(5));
}

#[tokio::test]
async fn test_retry_requeues_a_fresh_copy() {
    let h = harness().await;
    let entry = dead_lettered_review(&h, 42).await;
    let service = h.repos.dead_letter_service();

    let (resolved, task) = service.retry(entry.id, "ops").await.unwrap();
    assert!(resolved.retried);
    assert_eq!(resolved.retried_by.as_deref(), Some("ops"));
    assert_eq!(resolved.retried_task_id, Some(task.id));

    assert_ne!(task.id, entry.task_id);
    assert_eq!(task.mr_iid, Some(42));
    assert_eq!(task.status, TaskStatus::Queued);
    assert_eq!(h.repos.queue.dequeue(TaskPriority::Normal).await.unwrap(), Some(task.id));

    assert!(service.retry(entry.id, "ops").await.is_err());
    assert!(service.dismiss(entry.id, "ops").await.is_err());
}

#[tokio::test]
async fn test_dismissed_entry_cannot_be_retried() {
    let h = harness().await;
    let entry = dead_lettered_review(&h, 42).await;
    let service = h.repos.dead_letter_service();

    let dismissed = service.dismiss(entry.id, "ops").await.unwrap();
    assert!(dismissed.dismissed);
    assert!(service.retry(entry.id, "ops").await.is_err());

    let open = service
        .list(DeadLetterFilters {
            open_only: true,
            ..DeadLetterFilters::default()
        })
        .await
        .unwrap();
    assert!(open.is_empty());
}

#[tokio::test]
async fn test_concurrent_retry_and_dismiss_resolve_once() {
    let h = harness().await;
    let entry = dead_lettered_review(&h, 42).await;
    let retrying = h.repos.dead_letter_service();
    let dismissing = h.repos.dead_letter_service();

    let (retried, dismissed) = tokio::join!(retrying.retry(entry.id, "alice"), dismissing.dismiss(entry.id, "bob"));
    assert_eq!(u8::from(retried.is_ok()) + u8::from(dismissed.is_ok()), 1);

    let stored = h.repos.dead_letters.get(entry.id).await.unwrap().unwrap();
    assert_ne!(stored.retried, stored.dismissed);
    if let Err(e) = retried {
        assert!(matches!(e, DomainError::ConcurrencyConflict { .. } | DomainError::LogicError(_)));
        // The losing retry must not leave a task behind.
        assert_eq!(h.repos.queue.dequeue(TaskPriority::Normal).await.unwrap(), None);
    }
}
