//! Project guidance entries injected into runner executions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Kind of stored project guidance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GuidanceKind {
    /// Recurring review finding worth checking for
    ReviewPattern,
    /// Code health signal from earlier analysis
    HealthSignal,
}

impl GuidanceKind {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ReviewPattern => "review_pattern",
            Self::HealthSignal => "health_signal",
        }
    }

    /// Inverse of `as_str`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "review_pattern" => Some(Self::ReviewPattern),
            "health_signal" => Some(Self::HealthSignal),
            _ => None,
        }
    }
}

/// Guidance text attached to a project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuidanceEntry {
    pub id: Uuid,
    pub project_id: i64,
    pub kind: GuidanceKind,
    pub content: String,
    pub active: bool,
    pub created_at: DateTime<Utc>,
}

impl GuidanceEntry {
    /// New entry created now.
    pub fn new(project_id: i64, kind: GuidanceKind, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            project_id,
            kind,
            content: content.into(),
            active: true,
            created_at: Utc::now(),
        }
    }
}
