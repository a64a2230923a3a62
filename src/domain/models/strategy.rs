//! Review strategies and the runner skills they load.

use serde::{Deserialize, Serialize};

/// Review focus chosen from the changed files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ReviewStrategy {
    FrontendReview,
    BackendReview,
    /// Both frontend and backend files changed
    MixedReview,
    SecurityAudit,
}

impl ReviewStrategy {
    /// Kebab-case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrontendReview => "frontend-review",
            Self::BackendReview => "backend-review",
            Self::MixedReview => "mixed-review",
            Self::SecurityAudit => "security-audit",
        }
    }

    /// Inverse of `as_str`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "frontend-review" => Some(Self::FrontendReview),
            "backend-review" => Some(Self::BackendReview),
            "mixed-review" => Some(Self::MixedReview),
            "security-audit" => Some(Self::SecurityAudit),
            _ => None,
        }
    }

    /// Runner skills loaded for this strategy.
    pub fn skills(&self) -> &'static [&'static str] {
        match self {
            Self::FrontendReview => &["frontend-review"],
            Self::BackendReview => &["backend-review"],
            Self::MixedReview => &["frontend-review", "backend-review"],
            Self::SecurityAudit => &["security-audit"],
        }
    }
}

impl std::fmt::Display for ReviewStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
