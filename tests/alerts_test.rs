mod common;

use chrono::Utc;

use common::{harness, merge_request, WEBHOOK_SECRET};
use mergeward::domain::models::{AlertStatus, AlertType, TaskPriority};
use mergeward::domain::ports::AlertRepository;

#[tokio::test]
async fn test_queue_depth_alert_opens_once_and_recovers() {
    let h = harness().await;
    for iid in 1..=3 {
        let (status, _) = h
            .webhook(
                WEBHOOK_SECRET,
                "Merge Request Hook",
                Some(format!("d-{iid}").as_str()),
                &merge_request(iid, "open", "sha"),
            )
            .await;
        assert_eq!(status, 200);
    }

    let changed = h.alerts.evaluate_all(Utc::now()).await;
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].alert_type, AlertType::QueueDepth);
    assert_eq!(changed[0].context["queue_depth"], 3);

    // Still firing: no second row and no second notification.
    assert!(h.alerts.evaluate_all(Utc::now()).await.is_empty());
    assert_eq!(h.repos.alerts.list(true, 10).await.unwrap().len(), 1);
    assert_eq!(h.notifier.sent().await.len(), 1);

    let stored = h.repos.alerts.find_active(AlertType::QueueDepth).await.unwrap().unwrap();
    assert!(stored.notified_at.is_some());

    // Draining the queue clears the condition.
    while h.worker(TaskPriority::Normal).poll_once().await.unwrap().is_some() {}
    let changed = h.alerts.evaluate_all(Utc::now()).await;
    assert_eq!(changed.len(), 1);
    assert_eq!(changed[0].status, AlertStatus::Resolved);
    assert!(changed[0].recovery_notified_at.is_some());

    let sent = h.notifier.sent().await;
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].category, "alert");
    assert!(sent[1].message.contains("resolved"));
    assert!(h.repos.alerts.find_active(AlertType::QueueDepth).await.unwrap().is_none());
}

#[tokio::test]
async fn test_quiet_system_raises_nothing() {
    let h = harness().await;
    assert!(h.alerts.evaluate_all(Utc::now()).await.is_empty());
    assert!(h.notifier.sent().await.is_empty());
}
