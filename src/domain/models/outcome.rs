//! Result of a best-effort side effect.

use std::fmt;

/// Outcome of an action whose failure must never affect task or alert state.
///
/// Callers inspect it for logging only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EffectOutcome {
    /// Effect happened
    Done,
    /// Not attempted, with the reason
    Skipped(String),
    /// Attempted and failed, with the error
    Failed(String),
}

impl EffectOutcome {
    /// Skipped with `reason`.
    pub fn skipped(reason: impl Into<String>) -> Self {
        Self::Skipped(reason.into())
    }

    /// Failed with the rendered `reason`.
    pub fn failed(reason: impl fmt::Display) -> Self {
        Self::Failed(reason.to_string())
    }

    /// Whether the effect happened.
    pub fn is_done(&self) -> bool {
        matches!(self, Self::Done)
    }

    /// Log the outcome under `effect` and discard it.
    pub fn log(self, effect: &str) {
        match self {
            Self::Done => tracing::debug!(effect, "side effect completed"),
            Self::Skipped(reason) => tracing::debug!(effect, %reason, "side effect skipped"),
            Self::Failed(reason) => tracing::warn!(effect, %reason, "side effect failed"),
        }
    }
}

impl<E: fmt::Display> From<Result<(), E>> for EffectOutcome {
    fn from(result: Result<(), E>) -> Self {
        match result {
            Ok(()) => Self::Done,
            Err(e) => Self::failed(e),
        }
    }
}
