//! Team chat message for finished tasks.

use std::sync::Arc;

use serde_json::json;

use crate::domain::models::{EffectOutcome, Task};
use crate::domain::ports::{Notifier, NotifyError, ProjectRepository};
use crate::services::comments::{completion_category, completion_message};

/// Sends the team chat message for a finished task.
pub struct CompletionNotifier {
    projects: Arc<dyn ProjectRepository>,
    notifier: Arc<dyn Notifier>,
}

impl CompletionNotifier {
    /// Notifier that names projects through `projects`.
    pub fn new(projects: Arc<dyn ProjectRepository>, notifier: Arc<dyn Notifier>) -> Self {
        Self { projects, notifier }
    }

    /// Report `task` to the team chat. Never fails the caller.
    pub async fn notify(&self, task: &Task) -> EffectOutcome {
        let project_name = match self.projects.get(task.project_id).await {
            Ok(Some(project)) => project.name,
            Ok(None) => "unknown".to_string(),
            Err(e) => return EffectOutcome::failed(e),
        };

        let category = completion_category(task);
        let context = json!({
            "category": category,
            "urgency": if category == "task_failed" { "high" } else { "info" },
            "task_id": task.id,
            "project": project_name,
        });

        match self.notifier.notify(category, &completion_message(task, &project_name), &context).await {
            Ok(()) => EffectOutcome::Done,
            Err(NotifyError::NotConfigured) => EffectOutcome::skipped("notifications not configured"),
            Err(e) => EffectOutcome::failed(e),
        }
    }
}
