//! Operational alert records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Condition a health check watches for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertType {
    /// Runner failures look like an upstream API outage
    ApiOutage,
    /// Too many recent tasks failed
    HighFailureRate,
    /// Work queues are backing up
    QueueDepth,
    /// Runner credentials are being rejected
    AuthFailure,
    DiskUsage,
    /// Container health endpoint reports unhealthy
    ContainerHealth,
    CpuUsage,
    MemoryUsage,
}

impl AlertType {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ApiOutage => "api_outage",
            Self::HighFailureRate => "high_failure_rate",
            Self::QueueDepth => "queue_depth",
            Self::AuthFailure => "auth_failure",
            Self::DiskUsage => "disk_usage",
            Self::ContainerHealth => "container_health",
            Self::CpuUsage => "cpu_usage",
            Self::MemoryUsage => "memory_usage",
        }
    }

    /// Inverse of `as_str`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "api_outage" => Some(Self::ApiOutage),
            "high_failure_rate" => Some(Self::HighFailureRate),
            "queue_depth" => Some(Self::QueueDepth),
            "auth_failure" => Some(Self::AuthFailure),
            "disk_usage" => Some(Self::DiskUsage),
            "container_health" => Some(Self::ContainerHealth),
            "cpu_usage" => Some(Self::CpuUsage),
            "memory_usage" => Some(Self::MemoryUsage),
            _ => None,
        }
    }

    /// Human label used in recovery notifications.
    pub fn label(&self) -> &'static str {
        match self {
            Self::ApiOutage => "API outage",
            Self::HighFailureRate => "High failure rate",
            Self::QueueDepth => "Queue depth",
            Self::AuthFailure => "Auth failure",
            Self::DiskUsage => "Disk usage",
            Self::ContainerHealth => "Container health",
            Self::CpuUsage => "High CPU usage",
            Self::MemoryUsage => "High memory usage",
        }
    }

    /// Severity is fixed per alert type.
    pub fn severity(&self) -> AlertSeverity {
        match self {
            Self::ApiOutage | Self::AuthFailure | Self::ContainerHealth | Self::CpuUsage | Self::MemoryUsage => {
                AlertSeverity::High
            }
            Self::HighFailureRate | Self::QueueDepth | Self::DiskUsage => AlertSeverity::Medium,
        }
    }
}

/// How urgently an alert needs attention.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertSeverity {
    High,
    Medium,
    Info,
}

impl AlertSeverity {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::High => "high",
            Self::Medium => "medium",
            Self::Info => "info",
        }
    }

    /// Inverse of `as_str`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "high" => Some(Self::High),
            "medium" => Some(Self::Medium),
            "info" => Some(Self::Info),
            _ => None,
        }
    }
}

/// Lifecycle of an alert row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertStatus {
    /// Open; at most one per type
    Active,
    /// Condition cleared
    Resolved,
}

impl AlertStatus {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Resolved => "resolved",
        }
    }

    /// Inverse of `as_str`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "active" => Some(Self::Active),
            "resolved" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// An alert raised by a health check. At most one `Active` row exists per type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub id: Uuid,
    pub alert_type: AlertType,
    pub status: AlertStatus,
    pub severity: AlertSeverity,
    pub message: String,
    /// Readings that made the rule fire
    pub context: serde_json::Value,
    pub detected_at: DateTime<Utc>,
    pub notified_at: Option<DateTime<Utc>>,
    pub resolved_at: Option<DateTime<Utc>>,
    /// When the recovery message went out
    pub recovery_notified_at: Option<DateTime<Utc>>,
}

impl AlertEvent {
    /// New active alert detected at `now`.
    pub fn open(alert_type: AlertType, message: impl Into<String>, context: serde_json::Value, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            alert_type,
            status: AlertStatus::Active,
            severity: alert_type.severity(),
            message: message.into(),
            context,
            detected_at: now,
            notified_at: None,
            resolved_at: None,
            recovery_notified_at: None,
        }
    }

    /// Whether the alert is still open.
    pub fn is_active(&self) -> bool {
        self.status == AlertStatus::Active
    }

    /// Mark resolved at `now`.
    pub fn resolve(&mut self, now: DateTime<Utc>) {
        self.status = AlertStatus::Resolved;
        self.resolved_at = Some(now);
    }
}
