//! Webhook payload normalization and parsing into [`DomainEvent`]s.
//!
//! Parsing is pure: the same context always yields the same event, and a
//! missing required field yields `None` rather than an error.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::models::{
    DomainEvent, IssueLabelChanged, MergeRequestEvent, NoteOnIssue, NoteOnMergeRequest, ProjectRef,
    PushToBranch,
};

/// Map the `X-Gitlab-Event` header to an internal event type.
pub fn event_type_from_header(header: &str) -> Option<&'static str> {
    match header {
        "Merge Request Hook" => Some("merge_request"),
        "Note Hook" => Some("note"),
        "Issue Hook" => Some("issue"),
        "Push Hook" => Some("push"),
        _ => None,
    }
}

/// Flat view of a webhook delivery with the fields the parser needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventContext {
    /// Normalized event type, e.g. `merge_request`
    pub event_type: String,
    /// Local project id
    pub project_id: i64,
    pub gitlab_project_id: i64,
    #[serde(default)]
    pub action: Option<String>,
    #[serde(default)]
    pub merge_request_iid: Option<i64>,
    #[serde(default)]
    pub issue_iid: Option<i64>,
    #[serde(default)]
    pub source_branch: Option<String>,
    #[serde(default)]
    pub target_branch: Option<String>,
    #[serde(default)]
    pub author_id: Option<i64>,
    #[serde(default)]
    pub last_commit_sha: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    /// `MergeRequest` or `Issue` for note events
    #[serde(default)]
    pub noteable_type: Option<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// Pushed ref, e.g. `refs/heads/main`
    #[serde(default, rename = "ref")]
    pub git_ref: Option<String>,
    #[serde(default)]
    pub before: Option<String>,
    #[serde(default)]
    pub after: Option<String>,
    #[serde(default)]
    pub user_id: Option<i64>,
    #[serde(default)]
    pub total_commits_count: u32,
}

fn int(value: Option<&Value>) -> Option<i64> {
    match value? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text(value: Option<&Value>) -> Option<String> {
    value.and_then(Value::as_str).map(str::to_string)
}

impl EventContext {
    /// Extract the context from a raw GitLab webhook payload.
    pub fn from_gitlab_payload(event_type: &str, project: ProjectRef, payload: &Value) -> Self {
        let mut context = Self {
            event_type: event_type.to_string(),
            project_id: project.project_id,
            gitlab_project_id: project.gitlab_project_id,
            ..Self::default()
        };
        let attrs = payload.get("object_attributes");
        let attr = |key: &str| attrs.and_then(|a| a.get(key));

        match event_type {
            "merge_request" => {
                context.merge_request_iid = int(attr("iid"));
                context.action = text(attr("action"));
                context.source_branch = text(attr("source_branch"));
                context.target_branch = text(attr("target_branch"));
                context.author_id = int(attr("author_id"));
                context.last_commit_sha = text(attr("last_commit").and_then(|c| c.get("id")));
            }
            "note" => {
                context.note = text(attr("note"));
                context.noteable_type = text(attr("noteable_type"));
                context.author_id = int(attr("author_id"));
                context.merge_request_iid = int(payload.get("merge_request").and_then(|m| m.get("iid")));
                context.issue_iid = int(payload.get("issue").and_then(|i| i.get("iid")));
            }
            "issue" => {
                context.issue_iid = int(attr("iid"));
                context.action = text(attr("action"));
                context.author_id = int(attr("author_id"));
                context.labels = payload
                    .get("labels")
                    .and_then(Value::as_array)
                    .map(|labels| {
                        labels
                            .iter()
                            .filter_map(|l| l.get("title").and_then(Value::as_str))
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default();
            }
            "push" => {
                context.git_ref = text(payload.get("ref"));
                context.before = text(payload.get("before"));
                context.after = text(payload.get("after"));
                context.user_id = int(payload.get("user_id"));
                context.total_commits_count = int(payload.get("total_commits_count"))
                    .and_then(|n| u32::try_from(n).ok())
                    .unwrap_or(0);
            }
            _ => {}
        }

        context
    }

    fn project(&self) -> ProjectRef {
        ProjectRef::new(self.project_id, self.gitlab_project_id)
    }
}

fn non_empty(value: Option<&String>) -> Option<String> {
    value.filter(|v| !v.is_empty()).cloned()
}

/// Converts normalized contexts into domain events.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventParser;

impl EventParser {
    /// Event for `context`, or `None` when the type, action or a required field
    /// is not recognized.
    pub fn parse(context: &EventContext) -> Option<DomainEvent> {
        match context.event_type.as_str() {
            "merge_request" => Self::parse_merge_request(context),
            "note" => Self::parse_note(context),
            "issue" => Self::parse_issue(context),
            "push" => Self::parse_push(context),
            _ => None,
        }
    }

    fn parse_merge_request(context: &EventContext) -> Option<DomainEvent> {
        let mr_iid = context.merge_request_iid?;
        let event = MergeRequestEvent {
            project: context.project(),
            mr_iid,
            source_branch: non_empty(context.source_branch.as_ref()),
            target_branch: non_empty(context.target_branch.as_ref()),
            author_id: context.author_id,
            last_commit_sha: non_empty(context.last_commit_sha.as_ref()),
        };

        match context.action.as_deref()? {
            "open" => Some(DomainEvent::MergeRequestOpened(event)),
            "update" => Some(DomainEvent::MergeRequestUpdated(event)),
            "merge" => Some(DomainEvent::MergeRequestMerged(event)),
            _ => None,
        }
    }

    fn parse_note(context: &EventContext) -> Option<DomainEvent> {
        let note = context.note.clone().unwrap_or_default();

        match context.noteable_type.as_deref()? {
            "MergeRequest" => Some(DomainEvent::NoteOnMr(NoteOnMergeRequest {
                project: context.project(),
                mr_iid: context.merge_request_iid?,
                note,
                author_id: context.author_id,
            })),
            "Issue" => Some(DomainEvent::NoteOnIssue(NoteOnIssue {
                project: context.project(),
                issue_iid: context.issue_iid?,
                note,
                author_id: context.author_id,
            })),
            _ => None,
        }
    }

    fn parse_issue(context: &EventContext) -> Option<DomainEvent> {
        Some(DomainEvent::IssueLabelChanged(IssueLabelChanged {
            project: context.project(),
            issue_iid: context.issue_iid?,
            action: context.action.clone(),
            author_id: context.author_id,
            labels: context.labels.clone(),
        }))
    }

    fn parse_push(context: &EventContext) -> Option<DomainEvent> {
        let git_ref = non_empty(context.git_ref.as_ref())?;
        let branch = git_ref.strip_prefix("refs/heads/").unwrap_or(&git_ref).to_string();

        Some(DomainEvent::PushToBranch(PushToBranch {
            project: context.project(),
            branch,
            git_ref,
            before_sha: non_empty(context.before.as_ref()),
            after_sha: non_empty(context.after.as_ref()),
            user_id: context.user_id,
            total_commits_count: context.total_commits_count,
        }))
    }
}
