//! Task CLI commands.

use anyhow::{anyhow, Context, Result};
use clap::{Args, Subcommand};
use serde::Serialize;
use uuid::Uuid;

use crate::cli::context::Repositories;
use crate::cli::output::{list_table, output, render_list, CommandOutput};
use crate::domain::models::{Config, Task, TaskStatus, TaskTransition, TaskType};
use crate::domain::ports::{TaskFilters, TaskRepository};

/// Inspect dispatched tasks
#[derive(Args, Debug)]
pub struct TaskArgs {
    #[command(subcommand)]
    pub command: TaskCommands,
}

/// Task subcommands
#[derive(Subcommand, Debug)]
pub enum TaskCommands {
    /// List tasks, newest first
    List {
        /// Filter by status (received, queued, running, completed, failed, superseded)
        #[arg(short, long)]
        status: Option<String>,
        /// Filter by internal project id
        #[arg(short, long)]
        project: Option<i64>,
        /// Filter by merge request iid
        #[arg(long)]
        mr: Option<i64>,
        /// Filter by task type
        #[arg(short = 't', long = "type")]
        task_type: Option<String>,
        /// Maximum number of tasks to display
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
    /// Show a task and its state transitions
    Show {
        /// Task ID
        id: Uuid,
    },
}

/// One task as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct TaskOutput {
    pub id: String,
    pub project_id: i64,
    pub task_type: String,
    pub priority: String,
    pub status: String,
    pub intent: Option<String>,
    pub mr_iid: Option<i64>,
    pub issue_iid: Option<i64>,
    pub commit_sha: Option<String>,
    pub pipeline_id: Option<i64>,
    pub error_reason: Option<String>,
    pub created_at: String,
    pub completed_at: Option<String>,
}

impl From<&Task> for TaskOutput {
    fn from(task: &Task) -> Self {
        Self {
            id: task.id.to_string(),
            project_id: task.project_id,
            task_type: task.task_type.as_str().to_string(),
            priority: task.priority.as_str().to_string(),
            status: task.status.as_str().to_string(),
            intent: task.intent.map(|i| i.as_str().to_string()),
            mr_iid: task.mr_iid,
            issue_iid: task.issue_iid,
            commit_sha: task.commit_sha.clone(),
            pipeline_id: task.pipeline_id,
            error_reason: task.error_reason.clone(),
            created_at: task.created_at.to_rfc3339(),
            completed_at: task.completed_at.map(|t| t.to_rfc3339()),
        }
    }
}

fn target(task: &TaskOutput) -> String {
    match (task.mr_iid, task.issue_iid) {
        (Some(mr), _) => format!("!{mr}"),
        (None, Some(issue)) => format!("#{issue}"),
        (None, None) => "-".to_string(),
    }
}

/// Output of `task list`.
#[derive(Debug, Serialize)]
pub struct TaskListOutput {
    pub tasks: Vec<TaskOutput>,
    pub total: usize,
}

impl CommandOutput for TaskListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "project", "type", "priority", "status", "target", "created"]);
        for task in &self.tasks {
            table.add_row(vec![
                task.id[..8].to_string(),
                task.project_id.to_string(),
                task.task_type.clone(),
                task.priority.clone(),
                task.status.clone(),
                target(task),
                task.created_at.get(..19).unwrap_or(&task.created_at).replace('T', " "),
            ]);
        }
        render_list("task", &table, self.total)
    }
}

/// One audited status change.
#[derive(Debug, Serialize)]
pub struct TransitionOutput {
    pub from: String,
    pub to: String,
    pub at: String,
}

impl From<&TaskTransition> for TransitionOutput {
    fn from(t: &TaskTransition) -> Self {
        Self {
            from: t.from_status.as_str().to_string(),
            to: t.to_status.as_str().to_string(),
            at: t.transitioned_at.to_rfc3339(),
        }
    }
}

/// Output of `task show`.
#[derive(Debug, Serialize)]
pub struct TaskDetailOutput {
    pub task: TaskOutput,
    pub transitions: Vec<TransitionOutput>,
}

impl CommandOutput for TaskDetailOutput {
    fn to_human(&self) -> String {
        let task = &self.task;
        let mut lines = vec![
            format!("Task: {}", task.id),
            format!("Type: {} ({} priority)", task.task_type, task.priority),
            format!("Status: {}", task.status),
            format!("Project: {}", task.project_id),
            format!("Target: {}", target(task)),
        ];
        if let Some(intent) = &task.intent {
            lines.push(format!("Intent: {intent}"));
        }
        if let Some(sha) = &task.commit_sha {
            lines.push(format!("Commit: {sha}"));
        }
        if let Some(pipeline) = task.pipeline_id {
            lines.push(format!("Pipeline: {pipeline}"));
        }
        if let Some(reason) = &task.error_reason {
            lines.push(format!("Error: {reason}"));
        }
        lines.push(format!("Created: {}", task.created_at));
        if let Some(done) = &task.completed_at {
            lines.push(format!("Completed: {done}"));
        }

        if !self.transitions.is_empty() {
            lines.push("\nTransitions:".to_string());
            for t in &self.transitions {
                lines.push(format!("  {} {} -> {}", t.at, t.from, t.to));
            }
        }
        lines.join("\n")
    }
}

fn parse_filters(
    status: Option<String>,
    project: Option<i64>,
    mr: Option<i64>,
    task_type: Option<String>,
    limit: i64,
) -> Result<TaskFilters> {
    let status = status
        .map(|s| TaskStatus::from_str(&s).ok_or_else(|| anyhow!("Invalid status: {s}")))
        .transpose()?;
    let task_type = task_type
        .map(|t| TaskType::from_str(&t).ok_or_else(|| anyhow!("Invalid task type: {t}")))
        .transpose()?;
    Ok(TaskFilters {
        status,
        project_id: project,
        mr_iid: mr,
        task_type,
        limit: Some(limit),
    })
}

/// Run a `task` subcommand.
pub async fn execute(args: TaskArgs, json_mode: bool, config: &Config) -> Result<()> {
    let repos = Repositories::open(&config.database).await?;
    let tasks = repos.tasks.clone();

    match args.command {
        TaskCommands::List {
            status,
            project,
            mr,
            task_type,
            limit,
        } => {
            let filters = parse_filters(status, project, mr, task_type, limit)?;
            let found = tasks.list(filters).await?;
            let out = TaskListOutput {
                total: found.len(),
                tasks: found.iter().map(TaskOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        TaskCommands::Show { id } => {
            let task = tasks
                .get(id)
                .await?
                .with_context(|| format!("Task not found: {id}"))?;
            let transitions = tasks.transitions(id).await?;
            let out = TaskDetailOutput {
                task: TaskOutput::from(&task),
                transitions: transitions.iter().map(TransitionOutput::from).collect(),
            };
            output(&out, json_mode);
        }
    }

    repos.pool.close().await;
    Ok(())
}
