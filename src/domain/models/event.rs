//! Webhook domain events.
//!
//! A `DomainEvent` is the strongly-typed form of an inbound GitLab webhook
//! after normalization. Events are immutable once parsed.

use serde::{Deserialize, Serialize};

/// Internal and remote identifiers of the project an event belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ProjectRef {
    /// Local project id
    pub project_id: i64,
    /// GitLab project id
    pub gitlab_project_id: i64,
}

impl ProjectRef {
    /// Pair the two ids.
    pub fn new(project_id: i64, gitlab_project_id: i64) -> Self {
        Self { project_id, gitlab_project_id }
    }
}

/// Fields shared by the merge request open/update/merge variants.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestEvent {
    /// Project the event belongs to
    pub project: ProjectRef,
    /// Merge request iid within the project
    pub mr_iid: i64,
    /// Branch being merged
    pub source_branch: Option<String>,
    /// Branch merged into
    pub target_branch: Option<String>,
    /// GitLab user who triggered the event
    pub author_id: Option<i64>,
    /// Head commit of the merge request
    pub last_commit_sha: Option<String>,
}

/// Comment on a merge request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteOnMergeRequest {
    /// Project the event belongs to
    pub project: ProjectRef,
    /// Merge request iid within the project
    pub mr_iid: i64,
    /// Comment body
    pub note: String,
    /// GitLab user who triggered the event
    pub author_id: Option<i64>,
}

/// Comment on an issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteOnIssue {
    /// Project the event belongs to
    pub project: ProjectRef,
    /// Issue iid within the project
    pub issue_iid: i64,
    /// Comment body
    pub note: String,
    /// GitLab user who triggered the event
    pub author_id: Option<i64>,
}

/// Issue event carrying the issue's current labels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueLabelChanged {
    /// Project the event belongs to
    pub project: ProjectRef,
    /// Issue iid within the project
    pub issue_iid: i64,
    /// GitLab action, e.g. `update`
    pub action: Option<String>,
    /// GitLab user who triggered the event
    pub author_id: Option<i64>,
    /// Label titles after the change
    pub labels: Vec<String>,
}

impl IssueLabelChanged {
    /// Whether the issue now carries `label`.
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

/// Push of one or more commits to a branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushToBranch {
    /// Project the event belongs to
    pub project: ProjectRef,
    /// Full ref as delivered, e.g. `refs/heads/main`
    pub git_ref: String,
    /// Branch name with the `refs/heads/` prefix removed
    pub branch: String,
    /// Branch head before the push
    pub before_sha: Option<String>,
    /// Branch head after the push
    pub after_sha: Option<String>,
    /// GitLab user who pushed
    pub user_id: Option<i64>,
    /// Commits in the push
    pub total_commits_count: u32,
}

/// Closed set of webhook events the engine understands.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DomainEvent {
    /// Merge request opened
    MergeRequestOpened(MergeRequestEvent),
    /// New commits or edits on an open merge request
    MergeRequestUpdated(MergeRequestEvent),
    /// Merge request merged
    MergeRequestMerged(MergeRequestEvent),
    /// Comment on a merge request
    NoteOnMr(NoteOnMergeRequest),
    /// Comment on an issue
    NoteOnIssue(NoteOnIssue),
    /// Issue labels changed
    IssueLabelChanged(IssueLabelChanged),
    /// Commits pushed to a branch
    PushToBranch(PushToBranch),
}

/// Discriminant of a [`DomainEvent`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    MergeRequestOpened,
    MergeRequestUpdated,
    MergeRequestMerged,
    NoteOnMr,
    NoteOnIssue,
    IssueLabelChanged,
    PushToBranch,
}

impl EventKind {
    /// Every kind, in declaration order.
    pub const ALL: [EventKind; 7] = [
        Self::MergeRequestOpened,
        Self::MergeRequestUpdated,
        Self::MergeRequestMerged,
        Self::NoteOnMr,
        Self::NoteOnIssue,
        Self::IssueLabelChanged,
        Self::PushToBranch,
    ];

    /// Stable snake_case name.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MergeRequestOpened => "merge_request_opened",
            Self::MergeRequestUpdated => "merge_request_updated",
            Self::MergeRequestMerged => "merge_request_merged",
            Self::NoteOnMr => "note_on_mr",
            Self::NoteOnIssue => "note_on_issue",
            Self::IssueLabelChanged => "issue_label_changed",
            Self::PushToBranch => "push_to_branch",
        }
    }
}

impl DomainEvent {
    /// Discriminant of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::MergeRequestOpened(_) => EventKind::MergeRequestOpened,
            Self::MergeRequestUpdated(_) => EventKind::MergeRequestUpdated,
            Self::MergeRequestMerged(_) => EventKind::MergeRequestMerged,
            Self::NoteOnMr(_) => EventKind::NoteOnMr,
            Self::NoteOnIssue(_) => EventKind::NoteOnIssue,
            Self::IssueLabelChanged(_) => EventKind::IssueLabelChanged,
            Self::PushToBranch(_) => EventKind::PushToBranch,
        }
    }

    /// Webhook event type this variant was parsed from.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::MergeRequestOpened(_) | Self::MergeRequestUpdated(_) | Self::MergeRequestMerged(_) => {
                "merge_request"
            }
            Self::NoteOnMr(_) | Self::NoteOnIssue(_) => "note",
            Self::IssueLabelChanged(_) => "issue",
            Self::PushToBranch(_) => "push",
        }
    }

    /// Project the event belongs to.
    pub fn project(&self) -> ProjectRef {
        match self {
            Self::MergeRequestOpened(e) | Self::MergeRequestUpdated(e) | Self::MergeRequestMerged(e) => e.project,
            Self::NoteOnMr(e) => e.project,
            Self::NoteOnIssue(e) => e.project,
            Self::IssueLabelChanged(e) => e.project,
            Self::PushToBranch(e) => e.project,
        }
    }

    /// Author of the event (push events report the pushing user).
    pub fn author_id(&self) -> Option<i64> {
        match self {
            Self::MergeRequestOpened(e) | Self::MergeRequestUpdated(e) | Self::MergeRequestMerged(e) => e.author_id,
            Self::NoteOnMr(e) => e.author_id,
            Self::NoteOnIssue(e) => e.author_id,
            Self::IssueLabelChanged(e) => e.author_id,
            Self::PushToBranch(e) => e.user_id,
        }
    }

    /// Merge request the event concerns, if any.
    pub fn mr_iid(&self) -> Option<i64> {
        match self {
            Self::MergeRequestOpened(e) | Self::MergeRequestUpdated(e) | Self::MergeRequestMerged(e) => Some(e.mr_iid),
            Self::NoteOnMr(e) => Some(e.mr_iid),
            Self::NoteOnIssue(_) | Self::IssueLabelChanged(_) | Self::PushToBranch(_) => None,
        }
    }

    /// Issue the event concerns, if any.
    pub fn issue_iid(&self) -> Option<i64> {
        match self {
            Self::NoteOnIssue(e) => Some(e.issue_iid),
            Self::IssueLabelChanged(e) => Some(e.issue_iid),
            _ => None,
        }
    }

    /// Commit the event refers to: the MR head for merge request events,
    /// the new tip for pushes.
    pub fn commit_sha(&self) -> Option<&str> {
        match self {
            Self::MergeRequestOpened(e) | Self::MergeRequestUpdated(e) | Self::MergeRequestMerged(e) => {
                e.last_commit_sha.as_deref()
            }
            Self::PushToBranch(e) => e.after_sha.as_deref(),
            Self::NoteOnMr(_) | Self::NoteOnIssue(_) | Self::IssueLabelChanged(_) => None,
        }
    }

    /// Merge request opened or updated. These are the only events that
    /// supersede in-flight work for their merge request.
    pub fn is_merge_request_change(&self) -> bool {
        matches!(self, Self::MergeRequestOpened(_) | Self::MergeRequestUpdated(_))
    }

    /// Source branch, when the event carries one.
    pub fn source_branch(&self) -> Option<&str> {
        match self {
            Self::MergeRequestOpened(e) | Self::MergeRequestUpdated(e) | Self::MergeRequestMerged(e) => {
                e.source_branch.as_deref()
            }
            Self::PushToBranch(e) => Some(e.branch.as_str()),
            _ => None,
        }
    }
}
