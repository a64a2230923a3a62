//! Dead letter queue CLI commands.

use anyhow::Result;
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::context::Repositories;
use crate::cli::output::{list_table, output, render_list, truncate, ActionOutput, CommandOutput};
use crate::domain::models::{Config, DeadLetterEntry};
use crate::domain::ports::DeadLetterFilters;

/// Dead letter queue operations
#[derive(Args, Debug)]
pub struct DlqArgs {
    #[command(subcommand)]
    pub command: DlqCommands,
}

/// Dead letter subcommands
#[derive(Subcommand, Debug)]
pub enum DlqCommands {
    /// List dead letter entries (open ones unless --all)
    List {
        /// Include retried and dismissed entries
        #[arg(short, long)]
        all: bool,
        /// Filter by internal project id
        #[arg(short, long)]
        project: Option<i64>,
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
    /// Show one entry with its attempt history
    Show { id: Uuid },
    /// Re-dispatch a copy of the failed task
    Retry {
        id: Uuid,
        /// Who is retrying
        #[arg(long, env = "USER", default_value = "cli")]
        actor: String,
    },
    /// Close an entry without retrying
    Dismiss {
        id: Uuid,
        /// Who is dismissing
        #[arg(long, env = "USER", default_value = "cli")]
        actor: String,
    },
}

/// One dead letter entry as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct DeadLetterOutput {
    pub id: String,
    pub task_id: String,
    pub project_id: i64,
    pub task_type: String,
    pub failure_reason: String,
    pub error_details: Option<String>,
    pub attempts: usize,
    pub state: &'static str,
    pub dead_lettered_at: String,
    pub resolved_by: Option<String>,
    pub retried_task_id: Option<String>,
}

fn state(entry: &DeadLetterEntry) -> &'static str {
    if entry.retried {
        "retried"
    } else if entry.dismissed {
        "dismissed"
    } else {
        "open"
    }
}

impl From<&DeadLetterEntry> for DeadLetterOutput {
    fn from(e: &DeadLetterEntry) -> Self {
        Self {
            id: e.id.to_string(),
            task_id: e.task_id.to_string(),
            project_id: e.task_record.project_id,
            task_type: e.task_record.task_type.as_str().to_string(),
            failure_reason: e.failure_reason.clone(),
            error_details: e.error_details.clone(),
            attempts: e.attempts.len(),
            state: state(e),
            dead_lettered_at: e.dead_lettered_at.to_rfc3339(),
            resolved_by: e.retried_by.clone().or_else(|| e.dismissed_by.clone()),
            retried_task_id: e.retried_task_id.map(|id| id.to_string()),
        }
    }
}

/// Output of `dlq list`.
#[derive(Debug, Serialize)]
pub struct DeadLetterListOutput {
    pub entries: Vec<DeadLetterOutput>,
    pub total: usize,
}

impl CommandOutput for DeadLetterListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "task", "project", "type", "reason", "attempts", "state"]);
        for e in &self.entries {
            table.add_row(vec![
                e.id[..8].to_string(),
                e.task_id[..8].to_string(),
                e.project_id.to_string(),
                e.task_type.clone(),
                truncate(&e.failure_reason, 32),
                e.attempts.to_string(),
                e.state.to_string(),
            ]);
        }
        render_list("dead letter", &table, self.total)
    }
}

/// One recorded dispatch attempt.
#[derive(Debug, Serialize)]
pub struct AttemptOutput {
    pub attempt: u32,
    pub timestamp: String,
    pub error: String,
}

/// Output of `dlq show`.
#[derive(Debug, Serialize)]
pub struct DeadLetterDetailOutput {
    pub entry: DeadLetterOutput,
    pub attempt_history: Vec<AttemptOutput>,
}

impl CommandOutput for DeadLetterDetailOutput {
    fn to_human(&self) -> String {
        let e = &self.entry;
        let mut lines = vec![
            format!("Dead letter: {}", e.id),
            format!("Task: {} ({})", e.task_id, e.task_type),
            format!("Project: {}", e.project_id),
            format!("Reason: {}", e.failure_reason),
            format!("State: {}", e.state),
            format!("Dead-lettered: {}", e.dead_lettered_at),
        ];
        if let Some(details) = &e.error_details {
            lines.push(format!("Details: {details}"));
        }
        if let Some(actor) = &e.resolved_by {
            lines.push(format!("Resolved by: {actor}"));
        }
        if let Some(task) = &e.retried_task_id {
            lines.push(format!("Retried as: {task}"));
        }
        if !self.attempt_history.is_empty() {
            lines.push("\nAttempts:".to_string());
            for a in &self.attempt_history {
                lines.push(format!("  #{} {} {}", a.attempt, a.timestamp, a.error));
            }
        }
        lines.join("\n")
    }
}

/// Run a `dlq` subcommand.
pub async fn execute(args: DlqArgs, json_mode: bool, config: &Config) -> Result<()> {
    let repos = Repositories::open(&config.database).await?;
    let service = repos.dead_letter_service();

    match args.command {
        DlqCommands::List { all, project, limit } => {
            let entries = service
                .list(DeadLetterFilters {
                    open_only: !all,
                    project_id: project,
                    limit: Some(limit),
                })
                .await?;
            let out = DeadLetterListOutput {
                total: entries.len(),
                entries: entries.iter().map(DeadLetterOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        DlqCommands::Show { id } => {
            let entry = service.get(id).await?;
            let out = DeadLetterDetailOutput {
                entry: DeadLetterOutput::from(&entry),
                attempt_history: entry
                    .attempts
                    .iter()
                    .map(|a| AttemptOutput {
                        attempt: a.attempt,
                        timestamp: a.timestamp.to_rfc3339(),
                        error: a.error.clone(),
                    })
                    .collect(),
            };
            output(&out, json_mode);
        }

        DlqCommands::Retry { id, actor } => {
            let (entry, task) = service.retry(id, &actor).await?;
            let out = ActionOutput {
                success: true,
                message: format!("Dead letter {} retried as task {}", entry.id, task.id),
                id: Some(task.id.to_string()),
            };
            output(&out, json_mode);
        }

        DlqCommands::Dismiss { id, actor } => {
            let entry = service.dismiss(id, &actor).await?;
            let out = ActionOutput {
                success: true,
                message: format!("Dead letter {} dismissed", entry.id),
                id: Some(entry.id.to_string()),
            };
            output(&out, json_mode);
        }
    }

    repos.pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::models::{AttemptRecord, Task, TaskPriority, TaskType};

    fn entry() -> DeadLetterEntry {
        let task = Task::new(4, 100, TaskType::CodeReview, TaskPriority::Normal);
        DeadLetterEntry::new(
            &task,
            "pipeline_failed",
            Some("exit 1".to_string()),
            vec![AttemptRecord::new(1, "timeout")],
        )
    }

    #[test]
    fn test_entry_state_labels() {
        let mut e = entry();
        assert_eq!(state(&e), "open");
        e.mark_dismissed("ops").unwrap();
        assert_eq!(state(&e), "dismissed");

        let out = DeadLetterOutput::from(&e);
        assert_eq!(out.resolved_by.as_deref(), Some("ops"));
        assert_eq!(out.attempts, 1);
        assert_eq!(out.project_id, 4);
    }
}
