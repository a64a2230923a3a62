//! Note bodies posted on GitLab and chat messages sent about tasks.

use std::borrow::Cow;

use serde_json::Value;

use crate::domain::models::{Task, TaskStatus, TaskType};

/// Note posted when a review starts.
pub const PLACEHOLDER_BODY: &str = "🤖 AI Review in progress…";
/// Replaces the previous review note when a re-review starts.
pub const PLACEHOLDER_REREVIEW_BODY: &str = "🤖 AI Review in progress… (re-reviewing after new commits)";

/// Operator-facing explanation for a failure reason code.
pub fn failure_reason_message(code: &str) -> Cow<'static, str> {
    let message = match code {
        "max_retries_exceeded" => {
            "The service encountered repeated errors and could not complete after multiple retries."
        }
        "invalid_request" => "The request was invalid and could not be processed.",
        "context_exceeded" => {
            "The merge request may be too large for analysis. Consider splitting it into smaller MRs."
        }
        "scheduling_timeout" => "The task could not be scheduled for execution within the time limit.",
        "expired" => {
            "The task expired while waiting in the queue due to service unavailability. \
             Push a new commit to trigger a fresh review."
        }
        "pipeline_trigger_failed" => "Failed to trigger the CI pipeline for execution.",
        "missing_trigger_token" => "The CI trigger token is not configured for this project.",
        "schema_validation_failed" => "The runner returned a result that could not be validated.",
        other => return Cow::Owned(format!("An unexpected error occurred ({other}).")),
    };
    Cow::Borrowed(message)
}

/// Note body telling the author a task failed with `code`.
pub fn failure_comment(code: &str, details: Option<&str>) -> String {
    let mut body = format!("🤖 AI review failed — {}", failure_reason_message(code));
    if let Some(details) = details.filter(|d| !d.trim().is_empty()) {
        body.push_str("\n\n<details>\n<summary>Error details</summary>\n\n```\n");
        body.push_str(details.trim());
        body.push_str("\n```\n\n</details>");
    }
    body
}

/// Reply to an `@ai` mention that is not a known command.
pub fn help_comment(command: Option<&str>) -> String {
    let command = command.unwrap_or("@ai");
    format!(
        "🤖 I didn't recognize `{command}`. Available commands:\n\n\
         - `@ai review` – review this merge request\n\
         - `@ai improve` – suggest improvements\n\
         - `@ai ask \"<question>\"` – ask a question about the changes"
    )
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Chat category for a finished task.
pub fn completion_category(task: &Task) -> &'static str {
    if task.status == TaskStatus::Failed {
        "task_failed"
    } else {
        "task_completed"
    }
}

/// One-line chat message for a finished task.
pub fn completion_message(task: &Task, project_name: &str) -> String {
    if task.status == TaskStatus::Failed {
        let label = capitalize(&task.task_type.as_str().replace('_', " "));
        let mr = task.mr_iid.map(|iid| format!(" MR !{iid}")).unwrap_or_default();
        let reason = task.error_reason.as_deref().unwrap_or("max retries exceeded");
        return format!("❌ {label} failed for **{project_name}**{mr} — {reason}");
    }

    let result = task.result.as_ref().unwrap_or(&Value::Null);
    let title = |fallback: &str| {
        result
            .get("title")
            .or_else(|| result.get("mr_title"))
            .and_then(Value::as_str)
            .unwrap_or(fallback)
            .to_string()
    };
    let mr = task.mr_iid.map(|iid| iid.to_string()).unwrap_or_default();

    match task.task_type {
        TaskType::CodeReview | TaskType::SecurityAudit => {
            let summary = result.get("summary");
            let risk = summary
                .and_then(|s| s.get("risk_level"))
                .and_then(Value::as_str)
                .unwrap_or("unknown");
            let findings = summary
                .and_then(|s| s.get("total_findings"))
                .and_then(Value::as_u64)
                .unwrap_or(0);
            let emoji = match risk {
                "critical" | "high" => "🔴",
                "medium" => "🟡",
                "low" => "🟢",
                _ => "⚪",
            };
            format!(
                "🤖 Review complete on **{project_name}** MR !{mr} — {emoji} {} risk, {findings} findings",
                capitalize(risk)
            )
        }
        TaskType::FeatureDev => {
            let files = result.get("files_changed").and_then(Value::as_array).map_or(0, Vec::len);
            format!("🤖 Feature branch created for **{project_name}** — MR !{mr} '{}' ({files} files)", title("Feature"))
        }
        TaskType::UiAdjustment => {
            format!("🤖 UI fix for **{project_name}** — MR !{mr} '{}'", title("UI fix"))
        }
        TaskType::PrdCreation => {
            let issue = result
                .get("issue_iid")
                .and_then(Value::as_i64)
                .or(task.issue_iid)
                .map(|iid| iid.to_string())
                .unwrap_or_default();
            format!("🤖 PRD created for **{project_name}** — Issue #{issue} '{}'", title("PRD"))
        }
        TaskType::IssueDiscussion | TaskType::DeepAnalysis => {
            format!("🤖 Task #{} completed for **{project_name}**", task.id)
        }
    }
}
