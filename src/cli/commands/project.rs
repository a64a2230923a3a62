//! Project CLI commands.

use anyhow::{anyhow, Result};
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::Repositories;
use crate::cli::output::{list_table, output, render_list, ActionOutput, CommandOutput};
use crate::domain::models::{Config, NewProject, Project};
use crate::domain::ports::ProjectRepository;

/// Registered GitLab projects
#[derive(Args, Debug)]
pub struct ProjectArgs {
    #[command(subcommand)]
    pub command: ProjectCommands,
}

/// Project subcommands
#[derive(Subcommand, Debug)]
pub enum ProjectCommands {
    /// Register a GitLab project
    Add {
        /// Numeric GitLab project id
        gitlab_project_id: i64,
        /// Display name
        name: String,
        /// Secret GitLab sends in the X-Gitlab-Token header
        #[arg(long)]
        webhook_secret: Option<String>,
        /// Pipeline trigger token for runner jobs
        #[arg(long)]
        trigger_token: Option<String>,
    },
    /// List registered projects
    List,
    /// Accept webhooks for a project again
    Enable { id: i64 },
    /// Reject webhooks for a project
    Disable { id: i64 },
}

/// One project as printed by the CLI. Secrets are reported as present or
/// absent only.
#[derive(Debug, Serialize)]
pub struct ProjectOutput {
    pub id: i64,
    pub gitlab_project_id: i64,
    pub name: String,
    pub enabled: bool,
    pub has_webhook_secret: bool,
    pub has_trigger_token: bool,
    pub created_at: String,
}

impl From<&Project> for ProjectOutput {
    fn from(p: &Project) -> Self {
        Self {
            id: p.id,
            gitlab_project_id: p.gitlab_project_id,
            name: p.name.clone(),
            enabled: p.enabled,
            has_webhook_secret: p.webhook_secret.is_some(),
            has_trigger_token: p.ci_trigger_token.is_some(),
            created_at: p.created_at.to_rfc3339(),
        }
    }
}

/// Output of `project list`.
#[derive(Debug, Serialize)]
pub struct ProjectListOutput {
    pub projects: Vec<ProjectOutput>,
    pub total: usize,
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

impl CommandOutput for ProjectListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["id", "gitlab id", "name", "enabled", "webhook", "trigger"]);
        for p in &self.projects {
            table.add_row(vec![
                p.id.to_string(),
                p.gitlab_project_id.to_string(),
                p.name.clone(),
                yes_no(p.enabled).to_string(),
                yes_no(p.has_webhook_secret).to_string(),
                yes_no(p.has_trigger_token).to_string(),
            ]);
        }
        render_list("project", &table, self.total)
    }
}

async fn toggle(projects: &dyn ProjectRepository, id: i64, enabled: bool, json_mode: bool) -> Result<()> {
    let project = projects
        .get(id)
        .await?
        .ok_or_else(|| anyhow!("Project not found: {id}"))?;
    projects.set_enabled(id, enabled).await?;
    let out = ActionOutput {
        success: true,
        message: format!("Project {} {}", project.name, if enabled { "enabled" } else { "disabled" }),
        id: Some(id.to_string()),
    };
    output(&out, json_mode);
    Ok(())
}

/// Run a `project` subcommand.
pub async fn execute(args: ProjectArgs, json_mode: bool, config: &Config) -> Result<()> {
    let repos = Repositories::open(&config.database).await?;
    let projects = repos.projects.clone();

    match args.command {
        ProjectCommands::Add {
            gitlab_project_id,
            name,
            webhook_secret,
            trigger_token,
        } => {
            let project = projects
                .create(NewProject {
                    gitlab_project_id,
                    name,
                    webhook_secret,
                    ci_trigger_token: trigger_token,
                })
                .await?;
            let out = ActionOutput {
                success: true,
                message: format!("Project registered: {} (id {})", project.name, project.id),
                id: Some(project.id.to_string()),
            };
            output(&out, json_mode);
        }

        ProjectCommands::List => {
            let all = projects.list().await?;
            let out = ProjectListOutput {
                total: all.len(),
                projects: all.iter().map(ProjectOutput::from).collect(),
            };
            output(&out, json_mode);
        }

        ProjectCommands::Enable { id } => toggle(projects.as_ref(), id, true, json_mode).await?,
        ProjectCommands::Disable { id } => toggle(projects.as_ref(), id, false, json_mode).await?,
    }

    repos.pool.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_list_output_hides_secrets() {
        let project = Project {
            id: 3,
            gitlab_project_id: 100,
            name: "shop".into(),
            enabled: false,
            webhook_secret: Some("hook-secret".into()),
            ci_trigger_token: None,
            created_at: Utc::now(),
        };
        let out = ProjectListOutput {
            projects: vec![ProjectOutput::from(&project)],
            total: 1,
        };

        let human = out.to_human();
        assert!(human.starts_with("1 project"));
        assert!(human.contains("shop"));
        assert!(!human.contains("hook-secret"));

        let json = serde_json::to_value(&out.projects[0]).unwrap();
        assert_eq!(json["has_webhook_secret"], true);
        assert_eq!(json["has_trigger_token"], false);
        assert!(json.get("webhook_secret").is_none());
    }
}
