//! Mergeward CLI entry point.

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use mergeward::cli::commands::{alerts, dlq, migrate, project, serve, task};
use mergeward::cli::{handle_error, load_config, Cli, Commands};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // `serve` installs the configured logger; everything else logs warnings to stderr.
    if !matches!(cli.command, Commands::Serve(_)) {
        tracing_subscriber::registry()
            .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .init();
    }

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(err) => handle_error(err, cli.json),
    };

    let result = match cli.command {
        Commands::Serve(args) => serve::execute(args, config).await,
        Commands::Migrate => migrate::execute(cli.json, &config).await,
        Commands::Project(args) => project::execute(args, cli.json, &config).await,
        Commands::Task(args) => task::execute(args, cli.json, &config).await,
        Commands::Dlq(args) => dlq::execute(args, cli.json, &config).await,
        Commands::Alerts(args) => alerts::execute(args, cli.json, &config).await,
    };

    if let Err(err) = result {
        handle_error(err, cli.json);
    }
}
