//! Intent classification for parsed webhook events.
//!
//! The router holds an ordered list of classifiers built once at startup.
//! Classifiers are consulted by descending priority, ties in registration
//! order; the first one that supports an event decides its routing.

use std::sync::{Arc, LazyLock};

use regex::Regex;

use crate::domain::models::{DomainEvent, EventKind, Intent, RoutingResult, TaskPriority};
use crate::services::event_parser::{EventContext, EventParser};

static AI_MENTION: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)@ai\b").expect("valid regex"));
static ASK_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)@ai\s+ask\s+"([^"]+)""#).expect("valid regex"));
static REVIEW_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@ai\s+review\b").expect("valid regex"));
static IMPROVE_COMMAND: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)@ai\s+improve\b").expect("valid regex"));
static ANY_COMMAND: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)@ai\s+(\S+)").expect("valid regex"));

/// Label that requests feature development on an issue.
pub const FEATURE_DEV_LABEL: &str = "ai::develop";

/// Whether `text` mentions `@ai` as a whole word.
pub fn contains_ai_mention(text: &str) -> bool {
    AI_MENTION.is_match(text)
}

/// Maps one family of events to a routing decision.
pub trait IntentClassifier: Send + Sync {
    /// Name used in routing logs.
    fn name(&self) -> &'static str;

    /// Higher runs first.
    fn priority(&self) -> i32;

    /// Whether this classifier handles `kind`.
    fn supports(&self, kind: EventKind) -> bool;

    /// `None` discards the event.
    fn classify(&self, event: &DomainEvent) -> Option<RoutingResult>;
}

/// Merge request opened or updated: automatic review.
pub struct MergeRequestChangeClassifier;

impl IntentClassifier for MergeRequestChangeClassifier {
    fn name(&self) -> &'static str {
        "merge_request_change"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn supports(&self, kind: EventKind) -> bool {
        matches!(kind, EventKind::MergeRequestOpened | EventKind::MergeRequestUpdated)
    }

    fn classify(&self, event: &DomainEvent) -> Option<RoutingResult> {
        Some(RoutingResult::new(Intent::AutoReview, TaskPriority::Normal, event.clone()))
    }
}

/// Merge request merged: acceptance tracking, never a task.
pub struct MergeRequestMergedClassifier;

impl IntentClassifier for MergeRequestMergedClassifier {
    fn name(&self) -> &'static str {
        "merge_request_merged"
    }

    fn priority(&self) -> i32 {
        100
    }

    fn supports(&self, kind: EventKind) -> bool {
        kind == EventKind::MergeRequestMerged
    }

    fn classify(&self, event: &DomainEvent) -> Option<RoutingResult> {
        Some(RoutingResult::new(Intent::AcceptanceTracking, TaskPriority::Normal, event.clone()))
    }
}

/// `@ai` commands on merge request notes.
pub struct MergeRequestNoteClassifier;

impl MergeRequestNoteClassifier {
    fn unrecognized_command(note: &str) -> String {
        ANY_COMMAND
            .captures(note)
            .and_then(|c| c.get(1))
            .map_or_else(|| "@ai".to_string(), |word| format!("@ai {}", word.as_str()))
    }
}

impl IntentClassifier for MergeRequestNoteClassifier {
    fn name(&self) -> &'static str {
        "merge_request_note"
    }

    fn priority(&self) -> i32 {
        90
    }

    fn supports(&self, kind: EventKind) -> bool {
        kind == EventKind::NoteOnMr
    }

    fn classify(&self, event: &DomainEvent) -> Option<RoutingResult> {
        let DomainEvent::NoteOnMr(note) = event else {
            return None;
        };
        let text = note.note.as_str();

        if !contains_ai_mention(text) {
            return None;
        }

        if let Some(question) = ASK_COMMAND.captures(text).and_then(|c| c.get(1)) {
            return Some(
                RoutingResult::new(Intent::AskCommand, TaskPriority::Normal, event.clone())
                    .with_question(question.as_str()),
            );
        }

        if REVIEW_COMMAND.is_match(text) {
            return Some(RoutingResult::new(Intent::OnDemandReview, TaskPriority::High, event.clone()));
        }

        if IMPROVE_COMMAND.is_match(text) {
            return Some(RoutingResult::new(Intent::Improve, TaskPriority::Normal, event.clone()));
        }

        Some(
            RoutingResult::new(Intent::HelpResponse, TaskPriority::Normal, event.clone())
                .with_command(Self::unrecognized_command(text)),
        )
    }
}

/// Any `@ai` mention on an issue starts a discussion.
pub struct IssueNoteClassifier;

impl IntentClassifier for IssueNoteClassifier {
    fn name(&self) -> &'static str {
        "issue_note"
    }

    fn priority(&self) -> i32 {
        80
    }

    fn supports(&self, kind: EventKind) -> bool {
        kind == EventKind::NoteOnIssue
    }

    fn classify(&self, event: &DomainEvent) -> Option<RoutingResult> {
        let DomainEvent::NoteOnIssue(note) = event else {
            return None;
        };
        contains_ai_mention(&note.note)
            .then(|| RoutingResult::new(Intent::IssueDiscussion, TaskPriority::Normal, event.clone()))
    }
}

/// The `ai::develop` label requests feature development.
pub struct IssueLabelClassifier;

impl IntentClassifier for IssueLabelClassifier {
    fn name(&self) -> &'static str {
        "issue_label"
    }

    fn priority(&self) -> i32 {
        70
    }

    fn supports(&self, kind: EventKind) -> bool {
        kind == EventKind::IssueLabelChanged
    }

    fn classify(&self, event: &DomainEvent) -> Option<RoutingResult> {
        let DomainEvent::IssueLabelChanged(issue) = event else {
            return None;
        };
        issue
            .has_label(FEATURE_DEV_LABEL)
            .then(|| RoutingResult::new(Intent::FeatureDev, TaskPriority::Low, event.clone()))
    }
}

/// Pushes get an incremental review.
pub struct PushClassifier;

impl IntentClassifier for PushClassifier {
    fn name(&self) -> &'static str {
        "push"
    }

    fn priority(&self) -> i32 {
        60
    }

    fn supports(&self, kind: EventKind) -> bool {
        kind == EventKind::PushToBranch
    }

    fn classify(&self, event: &DomainEvent) -> Option<RoutingResult> {
        Some(RoutingResult::new(Intent::IncrementalReview, TaskPriority::Normal, event.clone()))
    }
}

/// Routes domain events to intents.
#[derive(Clone)]
pub struct IntentRouter {
    classifiers: Vec<Arc<dyn IntentClassifier>>,
    bot_account_id: Option<i64>,
}

impl IntentRouter {
    /// Router with the built-in classifiers.
    pub fn new(bot_account_id: Option<i64>) -> Self {
        Self::with_classifiers(
            bot_account_id,
            vec![
                Arc::new(MergeRequestChangeClassifier),
                Arc::new(MergeRequestMergedClassifier),
                Arc::new(MergeRequestNoteClassifier),
                Arc::new(IssueNoteClassifier),
                Arc::new(IssueLabelClassifier),
                Arc::new(PushClassifier),
            ],
        )
    }

    /// Router over exactly `classifiers`, highest priority first.
    pub fn with_classifiers(bot_account_id: Option<i64>, mut classifiers: Vec<Arc<dyn IntentClassifier>>) -> Self {
        // Stable sort keeps registration order among equal priorities.
        classifiers.sort_by_key(|c| std::cmp::Reverse(c.priority()));
        Self { classifiers, bot_account_id }
    }

    /// Event kinds no registered classifier handles.
    pub fn uncovered_kinds(&self) -> Vec<EventKind> {
        EventKind::ALL
            .into_iter()
            .filter(|kind| !self.classifiers.iter().any(|c| c.supports(*kind)))
            .collect()
    }

    /// Parse and route a normalized context.
    pub fn route_context(&self, context: &EventContext) -> Option<RoutingResult> {
        let Some(event) = EventParser::parse(context) else {
            tracing::debug!(event_type = %context.event_type, "could not parse event");
            return None;
        };
        self.route(&event)
    }

    /// Intent and priority for `event`, or `None` when nothing applies.
    pub fn route(&self, event: &DomainEvent) -> Option<RoutingResult> {
        if self.is_bot_note(event) {
            tracing::info!(
                event_kind = event.kind().as_str(),
                project_id = event.project().project_id,
                "discarding bot-authored note"
            );
            return None;
        }

        let classifier = self.classifiers.iter().find(|c| c.supports(event.kind()))?;
        let result = classifier.classify(event);
        tracing::debug!(
            classifier = classifier.name(),
            intent = result.as_ref().map(|r| r.intent.as_str()),
            "event classified"
        );
        result
    }

    /// Only notes are filtered: bot-authored merge requests still get reviewed.
    fn is_bot_note(&self, event: &DomainEvent) -> bool {
        let Some(bot) = self.bot_account_id else {
            return false;
        };
        match event {
            DomainEvent::NoteOnMr(note) => note.author_id == Some(bot),
            DomainEvent::NoteOnIssue(note) => note.author_id == Some(bot),
            DomainEvent::MergeRequestOpened(_)
            | DomainEvent::MergeRequestUpdated(_)
            | DomainEvent::MergeRequestMerged(_)
            | DomainEvent::IssueLabelChanged(_)
            | DomainEvent::PushToBranch(_) => false,
        }
    }
}

impl Default for IntentRouter {
    fn default() -> Self {
        Self::new(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{
        IssueLabelChanged, MergeRequestEvent, NoteOnIssue, NoteOnMergeRequest, ProjectRef, PushToBranch,
    };

    const BOT: i64 = 999;

    fn router() -> IntentRouter {
        IntentRouter::new(Some(BOT))
    }

    fn mr_note(text: &str, author: i64) -> DomainEvent {
        DomainEvent::NoteOnMr(NoteOnMergeRequest {
            project: ProjectRef::new(1, 100),
            mr_iid: 42,
            note: text.to_string(),
            author_id: Some(author),
        })
    }

    fn issue_note(text: &str, author: i64) -> DomainEvent {
        DomainEvent::NoteOnIssue(NoteOnIssue {
            project: ProjectRef::new(1, 100),
            issue_iid: 5,
            note: text.to_string(),
            author_id: Some(author),
        })
    }

    fn mr(author: i64) -> MergeRequestEvent {
        MergeRequestEvent {
            project: ProjectRef::new(1, 100),
            mr_iid: 42,
            source_branch: Some("feature".to_string()),
            target_branch: Some("main".to_string()),
            author_id: Some(author),
            last_commit_sha: Some("abc".to_string()),
        }
    }

    fn labels(labels: &[&str]) -> DomainEvent {
        DomainEvent::IssueLabelChanged(IssueLabelChanged {
            project: ProjectRef::new(1, 100),
            issue_iid: 5,
            action: Some("update".to_string()),
            author_id: Some(3),
            labels: labels.iter().map(|l| l.to_string()).collect(),
        })
    }

    fn route(event: DomainEvent) -> Option<(Intent, TaskPriority)> {
        router().route(&event).map(|r| (r.intent, r.priority))
    }

    #[test]
    fn test_every_event_kind_is_covered() {
        assert!(router().uncovered_kinds().is_empty());
    }

    #[test]
    fn test_merge_request_events() {
        assert_eq!(
            route(DomainEvent::MergeRequestOpened(mr(3))),
            Some((Intent::AutoReview, TaskPriority::Normal))
        );
        assert_eq!(
            route(DomainEvent::MergeRequestUpdated(mr(3))),
            Some((Intent::AutoReview, TaskPriority::Normal))
        );
        assert_eq!(
            route(DomainEvent::MergeRequestMerged(mr(3))),
            Some((Intent::AcceptanceTracking, TaskPriority::Normal))
        );
    }

    #[test]
    fn test_bot_authored_merge_requests_are_still_reviewed() {
        assert_eq!(
            route(DomainEvent::MergeRequestOpened(mr(BOT))),
            Some((Intent::AutoReview, TaskPriority::Normal))
        );
    }

    #[test]
    fn test_bot_notes_are_discarded() {
        assert_eq!(route(mr_note("@ai review", BOT)), None);
        assert_eq!(route(issue_note("@ai please look", BOT)), None);
    }

    #[test]
    fn test_review_mention_inside_free_text() {
        assert_eq!(
            route(mr_note("Hey, can you please @ai review this MR? Thanks!", 3)),
            Some((Intent::OnDemandReview, TaskPriority::High))
        );
    }

    #[test]
    fn test_mr_note_commands() {
        assert_eq!(route(mr_note("@ai improve", 3)), Some((Intent::Improve, TaskPriority::Normal)));
        assert_eq!(route(mr_note("@AI Review", 3)), Some((Intent::OnDemandReview, TaskPriority::High)));

        let ask = router()
            .route(&mr_note(r#"@ai ask "why is this async?""#, 3))
            .unwrap();
        assert_eq!(ask.intent, Intent::AskCommand);
        assert_eq!(ask.question.as_deref(), Some("why is this async?"));
    }

    #[test]
    fn test_help_response_for_unknown_or_bare_mentions() {
        let help = router().route(&mr_note("@ai summarize please", 3)).unwrap();
        assert_eq!(help.intent, Intent::HelpResponse);
        assert_eq!(help.command.as_deref(), Some("@ai summarize"));

        let bare = router().route(&mr_note("thanks @ai", 3)).unwrap();
        assert_eq!(bare.intent, Intent::HelpResponse);
        assert_eq!(bare.command.as_deref(), Some("@ai"));

        // "reviewer" is not the review command.
        let partial = router().route(&mr_note("@ai reviewer", 3)).unwrap();
        assert_eq!(partial.intent, Intent::HelpResponse);
    }

    #[test]
    fn test_notes_without_mention_are_discarded() {
        assert_eq!(route(mr_note("LGTM", 3)), None);
        assert_eq!(route(mr_note("ping @aiden", 3)), None);
        assert_eq!(route(issue_note("no mention here", 3)), None);
    }

    #[test]
    fn test_issue_note_mention() {
        assert_eq!(
            route(issue_note("@ai what do you think?", 3)),
            Some((Intent::IssueDiscussion, TaskPriority::Normal))
        );
    }

    #[test]
    fn test_issue_labels() {
        assert_eq!(route(labels(&["backend", "ai::develop"])), Some((Intent::FeatureDev, TaskPriority::Low)));
        assert_eq!(route(labels(&["backend", "bug"])), None);
        assert_eq!(route(labels(&[])), None);
    }

    #[test]
    fn test_push_is_incremental_review() {
        let push = DomainEvent::PushToBranch(PushToBranch {
            project: ProjectRef::new(1, 100),
            git_ref: "refs/heads/main".to_string(),
            branch: "main".to_string(),
            before_sha: None,
            after_sha: Some("bbb".to_string()),
            user_id: Some(BOT),
            total_commits_count: 1,
        });
        assert_eq!(route(push), Some((Intent::IncrementalReview, TaskPriority::Normal)));
    }

    struct Override;

    impl IntentClassifier for Override {
        fn name(&self) -> &'static str {
            "override"
        }

        fn priority(&self) -> i32 {
            100
        }

        fn supports(&self, kind: EventKind) -> bool {
            kind == EventKind::PushToBranch
        }

        fn classify(&self, _event: &DomainEvent) -> Option<RoutingResult> {
            None
        }
    }

    #[test]
    fn test_priority_order_then_registration_order() {
        let router = IntentRouter::with_classifiers(None, vec![Arc::new(PushClassifier), Arc::new(Override)]);
        let push = DomainEvent::PushToBranch(PushToBranch {
            project: ProjectRef::new(1, 100),
            git_ref: "refs/heads/main".to_string(),
            branch: "main".to_string(),
            before_sha: None,
            after_sha: None,
            user_id: None,
            total_commits_count: 0,
        });
        // Override has the higher priority despite registering later.
        assert_eq!(router.route(&push), None);

        let router = IntentRouter::with_classifiers(None, vec![Arc::new(MergeRequestMergedClassifier)]);
        assert!(router.uncovered_kinds().contains(&EventKind::PushToBranch));
    }
}
