//! Periodic operational health checks.
//!
//! Each rule inspects one condition and the service turns its answer into
//! alert state: open and notify on first detection, resolve and notify on
//! recovery, nothing otherwise. At most one active alert exists per type.
//! Sustained rules only fire once their condition has held continuously for
//! the rule's minimum duration. The first-observed time is stored with the
//! alerts, so separate `alerts check` runs share it, and it is forgotten the
//! moment the condition clears.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::domain::errors::DomainResult;
use crate::domain::models::{AlertEvent, AlertType, AlertsConfig, EffectOutcome, TaskStatus};
use crate::domain::ports::{AlertRepository, HostProbe, Notifier, NotifyError, TaskRepository};

/// Error text fragments that identify an upstream API failure.
pub const API_ERROR_PATTERNS: &[&str] = &[
    "api error",
    "api_error",
    "500",
    "502",
    "503",
    "529",
    "timeout",
    "connection refused",
    "overloaded",
];

/// Error text fragments that identify a credential failure.
pub const AUTH_ERROR_PATTERNS: &[&str] = &["401", "unauthorized", "authentication", "api_key", "invalid_api_key"];

/// What a rule observed on one run.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    /// Condition holds
    Firing { message: String, context: Value },
    /// Condition does not hold
    Clear,
    /// Leave any existing alert as it is
    Unchanged,
}

impl Condition {
    fn firing(message: impl Into<String>, context: Value) -> Self {
        Self::Firing {
            message: message.into(),
            context,
        }
    }
}

/// One health condition checked on every alert run.
#[async_trait]
pub trait AlertRule: Send + Sync {
    /// Alert this rule opens and resolves.
    fn alert_type(&self) -> AlertType;

    /// Minimum time the condition must hold before the alert opens.
    fn sustain(&self) -> Option<chrono::Duration> {
        None
    }

    /// Observe the condition at `now`.
    async fn evaluate(&self, now: DateTime<Utc>) -> DomainResult<Condition>;
}

/// Three or more of the latest finished tasks failed in a row with API errors.
pub struct ApiOutageRule {
    tasks: Arc<dyn TaskRepository>,
}

#[async_trait]
impl AlertRule for ApiOutageRule {
    fn alert_type(&self) -> AlertType {
        AlertType::ApiOutage
    }

    async fn evaluate(&self, _now: DateTime<Utc>) -> DomainResult<Condition> {
        let recent = self.tasks.recent_finished(5).await?;
        let consecutive = recent
            .iter()
            .take_while(|t| t.is_failed() && t.error_matches(API_ERROR_PATTERNS))
            .count();

        Ok(match consecutive {
            0 => Condition::Clear,
            n if n >= 3 => Condition::firing(
                format!("API outage detected: {n} consecutive task failures with API errors."),
                json!({"consecutive_failures": n}),
            ),
            _ => Condition::Unchanged,
        })
    }
}

/// More than 20% of at least five tasks finished in the last hour failed.
pub struct HighFailureRateRule {
    tasks: Arc<dyn TaskRepository>,
}

#[async_trait]
impl AlertRule for HighFailureRateRule {
    fn alert_type(&self) -> AlertType {
        AlertType::HighFailureRate
    }

    #[allow(clippy::cast_precision_loss)]
    async fn evaluate(&self, now: DateTime<Utc>) -> DomainResult<Condition> {
        let window = self.tasks.finished_since(now - chrono::Duration::hours(1)).await?;
        let total = window.len();
        if total < 5 {
            return Ok(Condition::Clear);
        }

        let failed = window.iter().filter(|t| t.is_failed()).count();
        let rate = failed as f64 / total as f64;
        if rate <= 0.20 {
            return Ok(Condition::Clear);
        }

        let percent = (rate * 1000.0).round() / 10.0;
        Ok(Condition::firing(
            format!("High failure rate detected: {percent}% of tasks failing in the last hour ({failed}/{total})."),
            json!({"failure_rate": rate, "failed_count": failed, "total_count": total}),
        ))
    }
}

/// Too many received or queued tasks.
pub struct QueueDepthRule {
    tasks: Arc<dyn TaskRepository>,
    threshold: u64,
}

#[async_trait]
impl AlertRule for QueueDepthRule {
    fn alert_type(&self) -> AlertType {
        AlertType::QueueDepth
    }

    async fn evaluate(&self, _now: DateTime<Utc>) -> DomainResult<Condition> {
        let depth = self
            .tasks
            .count_by_status(&[TaskStatus::Received, TaskStatus::Queued])
            .await?;
        if depth <= self.threshold {
            return Ok(Condition::Clear);
        }
        Ok(Condition::firing(
            format!("Queue depth growing: {depth} tasks pending (threshold: {}).", self.threshold),
            json!({"queue_depth": depth, "threshold": self.threshold}),
        ))
    }
}

/// Two or more auth failures in the last 30 minutes.
pub struct AuthFailureRule {
    tasks: Arc<dyn TaskRepository>,
}

#[async_trait]
impl AlertRule for AuthFailureRule {
    fn alert_type(&self) -> AlertType {
        AlertType::AuthFailure
    }

    async fn evaluate(&self, now: DateTime<Utc>) -> DomainResult<Condition> {
        let window = self.tasks.finished_since(now - chrono::Duration::minutes(30)).await?;
        let failures = window
            .iter()
            .filter(|t| t.is_failed() && t.error_matches(AUTH_ERROR_PATTERNS))
            .count();

        Ok(match failures {
            0 => Condition::Clear,
            n if n >= 2 => Condition::firing(
                format!(
                    "Authentication failure detected: {n} tasks failed with auth errors in the last 30 minutes. \
                     Check the API credentials."
                ),
                json!({"auth_failure_count": n}),
            ),
            _ => Condition::Unchanged,
        })
    }
}

/// Threshold rule over a host reading. An unavailable reading leaves the
/// alert untouched.
pub struct HostReadingRule {
    alert_type: AlertType,
    probe: Arc<dyn HostProbe>,
    threshold: f64,
    sustain: Option<chrono::Duration>,
}

impl HostReadingRule {
    /// Disk usage above 80%, no sustain.
    pub fn disk(probe: Arc<dyn HostProbe>) -> Self {
        Self {
            alert_type: AlertType::DiskUsage,
            probe,
            threshold: 80.0,
            sustain: None,
        }
    }

    /// CPU above 90% for five minutes.
    pub fn cpu(probe: Arc<dyn HostProbe>) -> Self {
        Self {
            alert_type: AlertType::CpuUsage,
            probe,
            threshold: 90.0,
            sustain: Some(chrono::Duration::minutes(5)),
        }
    }

    /// Memory above 85% for five minutes.
    pub fn memory(probe: Arc<dyn HostProbe>) -> Self {
        Self {
            alert_type: AlertType::MemoryUsage,
            probe,
            threshold: 85.0,
            sustain: Some(chrono::Duration::minutes(5)),
        }
    }

    async fn reading(&self) -> Option<f64> {
        match self.alert_type {
            AlertType::CpuUsage => self.probe.cpu_percent().await,
            AlertType::MemoryUsage => self.probe.memory_percent().await,
            _ => self.probe.disk_percent().await,
        }
    }

    /// Disk fires at the threshold, CPU and memory only above it.
    fn exceeds(&self, value: f64) -> bool {
        if self.alert_type == AlertType::DiskUsage {
            value >= self.threshold
        } else {
            value > self.threshold
        }
    }
}

#[async_trait]
impl AlertRule for HostReadingRule {
    fn alert_type(&self) -> AlertType {
        self.alert_type
    }

    fn sustain(&self) -> Option<chrono::Duration> {
        self.sustain
    }

    async fn evaluate(&self, _now: DateTime<Utc>) -> DomainResult<Condition> {
        let Some(value) = self.reading().await else {
            return Ok(Condition::Unchanged);
        };
        if !self.exceeds(value) {
            return Ok(Condition::Clear);
        }

        let rounded = (value * 10.0).round() / 10.0;
        let subject = match self.alert_type {
            AlertType::CpuUsage => "CPU usage",
            AlertType::MemoryUsage => "Memory usage",
            _ => "Disk usage",
        };
        Ok(Condition::firing(
            format!("{subject} at {rounded}% (threshold: {}%).", self.threshold),
            json!({"percent": rounded, "threshold": self.threshold}),
        ))
    }
}

/// Container reported unhealthy for two minutes.
pub struct ContainerHealthRule {
    probe: Arc<dyn HostProbe>,
}

#[async_trait]
impl AlertRule for ContainerHealthRule {
    fn alert_type(&self) -> AlertType {
        AlertType::ContainerHealth
    }

    fn sustain(&self) -> Option<chrono::Duration> {
        Some(chrono::Duration::minutes(2))
    }

    async fn evaluate(&self, _now: DateTime<Utc>) -> DomainResult<Condition> {
        Ok(match self.probe.container_healthy().await {
            None => Condition::Unchanged,
            Some(true) => Condition::Clear,
            Some(false) => Condition::firing("Container unhealthy.", json!({})),
        })
    }
}

/// Built-in rules in evaluation order.
pub fn default_rules(
    tasks: &Arc<dyn TaskRepository>,
    probe: &Arc<dyn HostProbe>,
    config: &AlertsConfig,
) -> Vec<Arc<dyn AlertRule>> {
    vec![
        Arc::new(ApiOutageRule { tasks: tasks.clone() }),
        Arc::new(HighFailureRateRule { tasks: tasks.clone() }),
        Arc::new(QueueDepthRule {
            tasks: tasks.clone(),
            threshold: config.queue_depth_threshold,
        }),
        Arc::new(AuthFailureRule { tasks: tasks.clone() }),
        Arc::new(HostReadingRule::disk(probe.clone())),
        Arc::new(ContainerHealthRule { probe: probe.clone() }),
        Arc::new(HostReadingRule::cpu(probe.clone())),
        Arc::new(HostReadingRule::memory(probe.clone())),
    ]
}

/// Evaluates alert rules and drives alert lifecycles.
pub struct AlertService {
    rules: Vec<Arc<dyn AlertRule>>,
    alerts: Arc<dyn AlertRepository>,
    notifier: Arc<dyn Notifier>,
}

impl AlertService {
    /// Service with the built-in rule set.
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        alerts: Arc<dyn AlertRepository>,
        probe: Arc<dyn HostProbe>,
        notifier: Arc<dyn Notifier>,
        config: &AlertsConfig,
    ) -> Self {
        Self::with_rules(default_rules(&tasks, &probe, config), alerts, notifier)
    }

    /// Service with a custom rule set.
    pub fn with_rules(
        rules: Vec<Arc<dyn AlertRule>>,
        alerts: Arc<dyn AlertRepository>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            rules,
            alerts,
            notifier,
        }
    }

    /// Stored alerts, newest first.
    pub async fn list(&self, active_only: bool, limit: i64) -> DomainResult<Vec<AlertEvent>> {
        self.alerts.list(active_only, limit).await
    }

    /// Run every rule once. Returns the alerts opened or resolved.
    pub async fn evaluate_all(&self, now: DateTime<Utc>) -> Vec<AlertEvent> {
        let mut changed = Vec::new();
        for rule in &self.rules {
            match self.evaluate_rule(rule.as_ref(), now).await {
                Ok(Some(alert)) => changed.push(alert),
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(alert_type = rule.alert_type().as_str(), error = %e, "alert check failed");
                }
            }
        }
        changed
    }

    async fn evaluate_rule(&self, rule: &dyn AlertRule, now: DateTime<Utc>) -> DomainResult<Option<AlertEvent>> {
        let alert_type = rule.alert_type();
        match rule.evaluate(now).await? {
            Condition::Unchanged => Ok(None),
            Condition::Clear => {
                if rule.sustain().is_some() {
                    self.alerts.clear_observation(alert_type).await?;
                }
                self.resolve(alert_type, now).await
            }
            Condition::Firing { mut message, mut context } => {
                if let Some(minimum) = rule.sustain() {
                    let held = now - self.alerts.observe(alert_type, now).await?;
                    if held < minimum {
                        return Ok(None);
                    }
                    let minutes = held.num_minutes();
                    message = format!("{} Sustained for {minutes} minutes.", message.trim_end());
                    if let Value::Object(map) = &mut context {
                        map.insert("duration_minutes".to_string(), json!(minutes));
                    }
                }
                self.open(alert_type, message, context, now).await
            }
        }
    }

    async fn open(
        &self,
        alert_type: AlertType,
        message: String,
        context: Value,
        now: DateTime<Utc>,
    ) -> DomainResult<Option<AlertEvent>> {
        if self.alerts.find_active(alert_type).await?.is_some() {
            return Ok(None);
        }

        let mut alert = AlertEvent::open(alert_type, message, context, now);
        if !self.alerts.insert(&alert).await? {
            return Ok(None);
        }
        tracing::warn!(
            alert_type = alert_type.as_str(),
            severity = alert.severity.as_str(),
            message = %alert.message,
            "alert raised"
        );

        let context = json!({
            "category": "alert",
            "urgency": alert.severity.as_str(),
            "alert_type": alert_type.as_str(),
        });
        if self.send(&alert.message, &context).await.is_done() {
            alert.notified_at = Some(Utc::now());
            self.alerts.update(&alert).await?;
        }
        Ok(Some(alert))
    }

    async fn resolve(&self, alert_type: AlertType, now: DateTime<Utc>) -> DomainResult<Option<AlertEvent>> {
        let Some(mut alert) = self.alerts.find_active(alert_type).await? else {
            return Ok(None);
        };
        alert.resolve(now);
        self.alerts.update(&alert).await?;
        tracing::info!(alert_type = alert_type.as_str(), "alert resolved");

        let message = format!("✅ {} resolved.", alert_type.label());
        let context = json!({
            "category": "alert",
            "urgency": "info",
            "alert_type": alert_type.as_str(),
        });
        if self.send(&message, &context).await.is_done() {
            alert.recovery_notified_at = Some(Utc::now());
            self.alerts.update(&alert).await?;
        }
        Ok(Some(alert))
    }

    async fn send(&self, message: &str, context: &Value) -> EffectOutcome {
        let outcome = match self.notifier.notify("alert", message, context).await {
            Ok(()) => EffectOutcome::Done,
            Err(NotifyError::NotConfigured) => EffectOutcome::skipped("notifications not configured"),
            Err(e) => EffectOutcome::failed(e.to_string()),
        };
        outcome.clone().log("alert_notification");
        outcome
    }

    /// Evaluate every `interval` until a shutdown signal arrives.
    pub fn start(self: Arc<Self>, interval: Duration, mut shutdown_rx: broadcast::Receiver<()>) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            tracing::info!(interval_secs = interval.as_secs(), "alert loop started");

            loop {
                tokio::select! {
                    _ = shutdown_rx.recv() => break,
                    _ = ticker.tick() => {
                        let changed = self.evaluate_all(Utc::now()).await;
                        if !changed.is_empty() {
                            tracing::debug!(changed = changed.len(), "alert state changed");
                        }
                    }
                }
            }

            tracing::info!("alert loop stopped");
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{HostReadings, MockHostProbe, MockNotifier};
    use crate::adapters::sqlite::{create_migrated_test_pool, SqliteAlertRepository, SqliteTaskRepository};
    use crate::domain::models::{AlertStatus, Task, TaskPriority, TaskType};
    use crate::domain::errors::DomainError;

    struct Fixture {
        service: AlertService,
        tasks: Arc<SqliteTaskRepository>,
        alerts: Arc<SqliteAlertRepository>,
        probe: Arc<MockHostProbe>,
        notifier: Arc<MockNotifier>,
    }

    async fn fixture_with(notifier: MockNotifier) -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let alerts = Arc::new(SqliteAlertRepository::new(pool));
        let probe = Arc::new(MockHostProbe::default());
        let notifier = Arc::new(notifier);
        let config = AlertsConfig {
            queue_depth_threshold: 2,
            ..AlertsConfig::default()
        };
        Fixture {
            service: AlertService::new(tasks.clone(), alerts.clone(), probe.clone(), notifier.clone(), &config),
            tasks,
            alerts,
            probe,
            notifier,
        }
    }

    async fn fixture() -> Fixture {
        fixture_with(MockNotifier::new()).await
    }

    async fn finished(f: &Fixture, failure: Option<&str>) {
        let mut task = Task::new(1, 100, TaskType::CodeReview, TaskPriority::Normal);
        f.tasks.insert(&task).await.unwrap();
        for status in [TaskStatus::Queued, TaskStatus::Running] {
            let t = task.transition_to(status, None).unwrap();
            f.tasks.apply_transition(&task, &t).await.unwrap();
        }
        let t = match failure {
            Some(reason) => task.transition_to(TaskStatus::Failed, Some(reason)).unwrap(),
            None => task.transition_to(TaskStatus::Completed, None).unwrap(),
        };
        f.tasks.apply_transition(&task, &t).await.unwrap();
        // Keep completion order distinct for newest-first queries.
        tokio::time::sleep(Duration::from_millis(5)).await;
    }

    async fn active(f: &Fixture, alert_type: AlertType) -> Option<AlertEvent> {
        f.alerts.find_active(alert_type).await.unwrap()
    }

    #[tokio::test]
    async fn test_api_outage_opens_once_and_recovers() {
        let f = fixture().await;
        for _ in 0..3 {
            finished(&f, Some("api_error")).await;
        }

        let changed = f.service.evaluate_all(Utc::now()).await;
        assert_eq!(changed.len(), 1);
        let alert = active(&f, AlertType::ApiOutage).await.unwrap();
        assert!(alert.notified_at.is_some());
        assert_eq!(alert.context["consecutive_failures"], 3);

        assert!(f.service.evaluate_all(Utc::now()).await.is_empty());
        assert_eq!(f.alerts.list(false, 10).await.unwrap().len(), 1);
        assert_eq!(f.notifier.sent().await.len(), 1);

        finished(&f, None).await;
        let changed = f.service.evaluate_all(Utc::now()).await;
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].status, AlertStatus::Resolved);
        assert!(changed[0].recovery_notified_at.is_some());

        let sent = f.notifier.sent().await;
        assert_eq!(sent[1].message, "✅ API outage resolved.");
        assert_eq!(sent[1].context["urgency"], "info");
        assert_eq!(sent[0].context["urgency"], "high");
        assert_eq!(sent[0].context["alert_type"], "api_outage");
    }

    #[tokio::test]
    async fn test_two_api_errors_do_not_open_outage() {
        let f = fixture().await;
        finished(&f, Some("api_error")).await;
        finished(&f, Some("timeout")).await;
        f.service.evaluate_all(Utc::now()).await;
        assert!(active(&f, AlertType::ApiOutage).await.is_none());
    }

    #[tokio::test]
    async fn test_high_failure_rate_needs_five_samples() {
        let f = fixture().await;
        for _ in 0..4 {
            finished(&f, Some("context_exceeded")).await;
        }
        f.service.evaluate_all(Utc::now()).await;
        assert!(active(&f, AlertType::HighFailureRate).await.is_none());

        finished(&f, None).await;
        f.service.evaluate_all(Utc::now()).await;
        let alert = active(&f, AlertType::HighFailureRate).await.unwrap();
        assert_eq!(alert.context["failed_count"], 4);
        assert_eq!(alert.context["total_count"], 5);
    }

    #[tokio::test]
    async fn test_auth_failures() {
        let f = fixture().await;
        finished(&f, Some("401 unauthorized")).await;
        f.service.evaluate_all(Utc::now()).await;
        assert!(active(&f, AlertType::AuthFailure).await.is_none());

        finished(&f, Some("invalid_api_key")).await;
        f.service.evaluate_all(Utc::now()).await;
        assert!(active(&f, AlertType::AuthFailure).await.is_some());
    }

    #[tokio::test]
    async fn test_queue_depth() {
        let f = fixture().await;
        for _ in 0..3 {
            let task = Task::new(1, 100, TaskType::CodeReview, TaskPriority::Normal);
            f.tasks.insert(&task).await.unwrap();
        }
        f.service.evaluate_all(Utc::now()).await;
        let alert = active(&f, AlertType::QueueDepth).await.unwrap();
        assert_eq!(alert.context["queue_depth"], 3);
        assert_eq!(alert.severity.as_str(), "medium");
    }

    #[tokio::test]
    async fn test_disk_fires_at_threshold_and_missing_reading_is_ignored() {
        let f = fixture().await;
        f.probe
            .set(HostReadings {
                disk_percent: Some(80.0),
                ..HostReadings::default()
            })
            .await;
        f.service.evaluate_all(Utc::now()).await;
        assert!(active(&f, AlertType::DiskUsage).await.is_some());

        f.probe.set(HostReadings::default()).await;
        f.service.evaluate_all(Utc::now()).await;
        assert!(active(&f, AlertType::DiskUsage).await.is_some());

        f.probe
            .set(HostReadings {
                disk_percent: Some(40.0),
                ..HostReadings::default()
            })
            .await;
        f.service.evaluate_all(Utc::now()).await;
        assert!(active(&f, AlertType::DiskUsage).await.is_none());
    }

    #[tokio::test]
    async fn test_cpu_must_be_sustained() {
        let f = fixture().await;
        let high = HostReadings {
            cpu_percent: Some(95.0),
            ..HostReadings::default()
        };
        f.probe.set(high).await;
        let start = Utc::now();

        f.service.evaluate_all(start).await;
        f.service.evaluate_all(start + chrono::Duration::minutes(4)).await;
        assert!(active(&f, AlertType::CpuUsage).await.is_none());

        f.service.evaluate_all(start + chrono::Duration::minutes(5)).await;
        let alert = active(&f, AlertType::CpuUsage).await.unwrap();
        assert_eq!(alert.context["duration_minutes"], 5);
        assert!(alert.message.contains("95"));
    }

    #[tokio::test]
    async fn test_sustained_timer_survives_separate_runs() {
        let f = fixture().await;
        f.probe
            .set(HostReadings {
                memory_percent: Some(97.0),
                ..HostReadings::default()
            })
            .await;
        let start = Utc::now();

        // Each `alerts check` builds its own service over the same database.
        let run = || {
            AlertService::new(
                f.tasks.clone(),
                f.alerts.clone(),
                f.probe.clone(),
                f.notifier.clone(),
                &AlertsConfig::default(),
            )
        };
        run().evaluate_all(start).await;
        run().evaluate_all(start + chrono::Duration::minutes(2)).await;
        assert!(active(&f, AlertType::MemoryUsage).await.is_none());

        run().evaluate_all(start + chrono::Duration::minutes(5)).await;
        let alert = active(&f, AlertType::MemoryUsage).await.unwrap();
        assert_eq!(alert.context["duration_minutes"], 5);
    }

    #[tokio::test]
    async fn test_sustained_timer_resets_when_condition_clears() {
        let f = fixture().await;
        let unhealthy = HostReadings {
            container_healthy: Some(false),
            ..HostReadings::default()
        };
        let start = Utc::now();

        f.probe.set(unhealthy).await;
        f.service.evaluate_all(start).await;
        f.probe
            .set(HostReadings {
                container_healthy: Some(true),
                ..HostReadings::default()
            })
            .await;
        f.service.evaluate_all(start + chrono::Duration::minutes(1)).await;
        f.probe.set(unhealthy).await;
        f.service.evaluate_all(start + chrono::Duration::minutes(2)).await;
        f.service.evaluate_all(start + chrono::Duration::minutes(3)).await;
        assert!(active(&f, AlertType::ContainerHealth).await.is_none());

        f.service.evaluate_all(start + chrono::Duration::minutes(4)).await;
        assert!(active(&f, AlertType::ContainerHealth).await.is_some());
    }

    #[tokio::test]
    async fn test_failed_notification_leaves_notified_at_unset() {
        let f = fixture_with(MockNotifier::failing()).await;
        f.probe
            .set(HostReadings {
                disk_percent: Some(99.0),
                ..HostReadings::default()
            })
            .await;
        let changed = f.service.evaluate_all(Utc::now()).await;
        assert_eq!(changed.len(), 1);
        assert!(active(&f, AlertType::DiskUsage).await.unwrap().notified_at.is_none());
    }

    struct BrokenRule;

    #[async_trait]
    impl AlertRule for BrokenRule {
        fn alert_type(&self) -> AlertType {
            AlertType::ApiOutage
        }

        async fn evaluate(&self, _now: DateTime<Utc>) -> DomainResult<Condition> {
            Err(DomainError::DatabaseError("boom".into()))
        }
    }

    #[tokio::test]
    async fn test_failing_rule_does_not_stop_others() {
        let f = fixture().await;
        let probe: Arc<dyn HostProbe> = f.probe.clone();
        f.probe
            .set(HostReadings {
                disk_percent: Some(90.0),
                ..HostReadings::default()
            })
            .await;
        let service = AlertService::with_rules(
            vec![Arc::new(BrokenRule), Arc::new(HostReadingRule::disk(probe))],
            f.alerts.clone(),
            f.notifier.clone(),
        );
        let changed = service.evaluate_all(Utc::now()).await;
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].alert_type, AlertType::DiskUsage);
    }
}
