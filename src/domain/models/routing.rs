//! Routing decisions produced by the intent router.

use serde::{Deserialize, Serialize};

use super::event::DomainEvent;
use super::task::{TaskPriority, TaskType};

/// What kind of work an event implies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Review a newly opened merge request
    AutoReview,
    /// Merged merge request; recorded but not dispatched
    AcceptanceTracking,
    /// `@ai review` on a merge request
    OnDemandReview,
    /// `@ai improve` on a merge request
    Improve,
    /// `@ai ask "..."` question
    AskCommand,
    /// Unrecognized `@ai` command
    HelpResponse,
    /// `@ai` mention on an issue
    IssueDiscussion,
    /// Issue labelled for automated development
    FeatureDev,
    /// Review of commits pushed to a merge request branch
    IncrementalReview,
}

impl Intent {
    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AutoReview => "auto_review",
            Self::AcceptanceTracking => "acceptance_tracking",
            Self::OnDemandReview => "on_demand_review",
            Self::Improve => "improve",
            Self::AskCommand => "ask_command",
            Self::HelpResponse => "help_response",
            Self::IssueDiscussion => "issue_discussion",
            Self::FeatureDev => "feature_dev",
            Self::IncrementalReview => "incremental_review",
        }
    }

    /// Inverse of `as_str`.
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "auto_review" => Some(Self::AutoReview),
            "acceptance_tracking" => Some(Self::AcceptanceTracking),
            "on_demand_review" => Some(Self::OnDemandReview),
            "improve" => Some(Self::Improve),
            "ask_command" => Some(Self::AskCommand),
            "help_response" => Some(Self::HelpResponse),
            "issue_discussion" => Some(Self::IssueDiscussion),
            "feature_dev" => Some(Self::FeatureDev),
            "incremental_review" => Some(Self::IncrementalReview),
            _ => None,
        }
    }

    /// Task type created for this intent, `None` for intents that never
    /// produce a task.
    pub fn task_type(&self) -> Option<TaskType> {
        match self {
            Self::AutoReview | Self::OnDemandReview | Self::IncrementalReview | Self::Improve => {
                Some(TaskType::CodeReview)
            }
            Self::AskCommand | Self::IssueDiscussion => Some(TaskType::IssueDiscussion),
            Self::FeatureDev => Some(TaskType::FeatureDev),
            Self::AcceptanceTracking | Self::HelpResponse => None,
        }
    }

    /// Whether this intent produces a task.
    pub fn is_dispatchable(&self) -> bool {
        self.task_type().is_some()
    }
}

impl std::fmt::Display for Intent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of routing one event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoutingResult {
    pub intent: Intent,
    pub priority: TaskPriority,
    pub event: DomainEvent,
    /// Question text of an `@ai ask "..."` command
    #[serde(default)]
    pub question: Option<String>,
    /// Unrecognized command echoed back by the help response
    #[serde(default)]
    pub command: Option<String>,
}

impl RoutingResult {
    /// Routing without question or command text.
    pub fn new(intent: Intent, priority: TaskPriority, event: DomainEvent) -> Self {
        Self { intent, priority, event, question: None, command: None }
    }

    /// Attach the asked question.
    pub fn with_question(mut self, question: impl Into<String>) -> Self {
        self.question = Some(question.into());
        self
    }

    /// Attach the unrecognized command.
    pub fn with_command(mut self, command: impl Into<String>) -> Self {
        self.command = Some(command.into());
        self
    }
}
