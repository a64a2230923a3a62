//! Alert CLI commands.

use anyhow::Result;
use chrono::Utc;
use clap::{Args, Subcommand};
use serde::Serialize;

use crate::cli::context::{Externals, Repositories};
use crate::cli::output::{list_table, output, render_list, truncate, CommandOutput};
use crate::domain::models::{AlertEvent, Config};
use crate::domain::ports::AlertRepository;
use crate::services::AlertService;

/// Health alerts
#[derive(Args, Debug)]
pub struct AlertsArgs {
    #[command(subcommand)]
    pub command: AlertsCommands,
}

/// Alert subcommands
#[derive(Subcommand, Debug)]
pub enum AlertsCommands {
    /// Run every health check once, opening or resolving alerts
    Check,
    /// List recorded alerts
    List {
        /// Only alerts that are still active
        #[arg(short, long)]
        active: bool,
        #[arg(short, long, default_value = "50")]
        limit: i64,
    },
}

/// One alert as printed by the CLI.
#[derive(Debug, Serialize)]
pub struct AlertOutput {
    pub id: String,
    pub alert_type: String,
    pub severity: String,
    pub status: String,
    pub message: String,
    pub context: serde_json::Value,
    pub detected_at: String,
    pub resolved_at: Option<String>,
    pub notified: bool,
}

impl From<&AlertEvent> for AlertOutput {
    fn from(a: &AlertEvent) -> Self {
        Self {
            id: a.id.to_string(),
            alert_type: a.alert_type.as_str().to_string(),
            severity: a.severity.as_str().to_string(),
            status: a.status.as_str().to_string(),
            message: a.message.clone(),
            context: a.context.clone(),
            detected_at: a.detected_at.to_rfc3339(),
            resolved_at: a.resolved_at.map(|t| t.to_rfc3339()),
            notified: a.notified_at.is_some(),
        }
    }
}

/// Output of `alerts list`.
#[derive(Debug, Serialize)]
pub struct AlertListOutput {
    pub alerts: Vec<AlertOutput>,
    pub total: usize,
}

impl CommandOutput for AlertListOutput {
    fn to_human(&self) -> String {
        let mut table = list_table(&["type", "severity", "status", "detected", "message"]);
        for a in &self.alerts {
            table.add_row(vec![
                a.alert_type.clone(),
                a.severity.clone(),
                a.status.clone(),
                a.detected_at.get(..19).unwrap_or(&a.detected_at).replace('T', " "),
                truncate(&a.message, 60),
            ]);
        }
        render_list("alert", &table, self.total)
    }
}

/// Output of `alerts check`: what changed and how many remain active.
#[derive(Debug, Serialize)]
pub struct CheckOutput {
    pub changed: Vec<AlertOutput>,
    pub active: usize,
}

impl CommandOutput for CheckOutput {
    fn to_human(&self) -> String {
        let mut lines = Vec::new();
        if self.changed.is_empty() {
            lines.push("No alert changes.".to_string());
        }
        for a in &self.changed {
            lines.push(format!("[{}] {}: {}", a.status, a.alert_type, a.message));
        }
        lines.push(format!("{} active alert(s).", self.active));
        lines.join("\n")
    }
}

/// Run an `alerts` subcommand.
pub async fn execute(args: AlertsArgs, json_mode: bool, config: &Config) -> Result<()> {
    let repos = Repositories::open(&config.database).await?;

    match args.command {
        AlertsCommands::Check => {
            let externals = Externals::from_config(config)?;
            let service = AlertService::new(
                repos.tasks.clone(),
                repos.alerts.clone(),
                externals.probe,
                externals.notifier,
                &config.alerts,
            );
            let changed = service.evaluate_all(Utc::now()).await;
            let active = service.list(true, i64::MAX).await?.len();
            let out = CheckOutput {
                changed: changed.iter().map(AlertOutput::from).collect(),
                active,
            };
            output(&out, json_mode);
        }

        AlertsCommands::List { active, limit } => {
            let alerts = repos.alerts.list(active, limit).await?;
            let out = AlertListOutput {
                total: alerts.len(),
                alerts: alerts.iter().map(AlertOutput::from).collect(),
            };
            output(&out, json_mode);
        }
    }

    repos.pool.close().await;
    Ok(())
}
