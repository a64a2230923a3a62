//! Command-line interface.

pub mod commands;
pub mod context;
pub mod output;

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use crate::domain::models::Config;
use crate::infrastructure::config::ConfigLoader;

pub use context::{Engine, Repositories};

/// Command line interface.
#[derive(Parser)]
#[command(name = "mergeward")]
#[command(about = "Mergeward - GitLab webhook dispatch engine", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Subcommand to run
    #[command(subcommand)]
    pub command: Commands,

    /// Output in JSON format
    #[arg(short, long, global = true)]
    pub json: bool,

    /// Configuration file (defaults to .mergeward/config.yaml)
    #[arg(short, long, global = true, env = "MERGEWARD_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Run the webhook server, queue workers and alert loop
    Serve(commands::serve::ServeArgs),
    /// Apply pending database migrations
    Migrate,
    /// Registered GitLab projects
    Project(commands::project::ProjectArgs),
    /// Inspect dispatched tasks
    Task(commands::task::TaskArgs),
    /// Dead letter queue operations
    Dlq(commands::dlq::DlqArgs),
    /// Health alerts
    Alerts(commands::alerts::AlertsArgs),
}

/// Load configuration from `path`, or the default hierarchy when absent.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    match path {
        Some(path) => ConfigLoader::load_from_file(path),
        None => ConfigLoader::load(),
    }
}

/// Print `err` in the selected format and exit non-zero.
pub fn handle_error(err: anyhow::Error, json_mode: bool) -> ! {
    if json_mode {
        let body = serde_json::json!({
            "success": false,
            "error": format!("{err:#}"),
        });
        println!("{}", serde_json::to_string_pretty(&body).unwrap_or_default());
    } else {
        eprintln!("Error: {err:#}");
    }
    std::process::exit(1);
}
