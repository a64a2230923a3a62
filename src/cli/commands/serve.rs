//! `mergeward serve`

use anyhow::{Context, Result};
use clap::Args;
use futures::future;
use tokio::sync::broadcast;

use crate::adapters::http::{HttpServer, HttpServerConfig};
use crate::cli::context::{Engine, Externals, Repositories};
use crate::domain::models::Config;
use crate::infrastructure::logging::{LogConfig, LoggerImpl};

/// Run the webhook server, queue workers and alert loop
#[derive(Args, Debug)]
pub struct ServeArgs {
    /// Override the listen port
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Override the listen host
    #[arg(long)]
    pub host: Option<String>,

    /// Accept webhooks without starting queue workers
    #[arg(long)]
    pub no_workers: bool,
}

/// Serve until Ctrl-C or SIGTERM, then stop workers and the alert loop.
pub async fn execute(args: ServeArgs, mut config: Config) -> Result<()> {
    let _logger = LoggerImpl::init(&LogConfig::from(&config.logging)).context("Failed to initialize logging")?;

    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(host) = args.host {
        config.server.host = host;
    }

    let repos = Repositories::open(&config.database).await?;
    let engine = Engine::build(&config, &repos, Externals::from_config(&config)?)?;

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    let mut handles = Vec::new();
    if args.no_workers {
        tracing::warn!("queue workers disabled; tasks will stay queued");
    } else {
        for worker in &engine.workers {
            handles.push(worker.clone().start(shutdown_tx.subscribe()));
        }
    }
    handles.push(engine.alerts.clone().start(engine.alert_interval, shutdown_tx.subscribe()));

    let server = HttpServer::new(engine.state, HttpServerConfig::from(&config.server));
    let mut server_shutdown = shutdown_tx.subscribe();
    let mut server_handle = tokio::spawn(server.serve_with_shutdown(async move {
        let _ = server_shutdown.recv().await;
    }));

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        workers = handles.len().saturating_sub(1),
        "mergeward started"
    );

    let stopped_early = tokio::select! {
        joined = &mut server_handle => Some(joined),
        result = tokio::signal::ctrl_c() => {
            if let Err(e) = result {
                tracing::warn!(error = %e, "failed to listen for ctrl-c");
            }
            tracing::info!("shutdown requested");
            None
        }
        () = wait_for_terminate() => {
            tracing::info!("terminate signal received");
            None
        }
    };

    let _ = shutdown_tx.send(());
    let joined = match stopped_early {
        Some(joined) => joined,
        None => server_handle.await,
    };
    let server_result = joined.context("HTTP server task panicked")?;
    for joined in future::join_all(handles).await {
        if let Err(e) = joined {
            tracing::error!(error = %e, "background task panicked");
        }
    }
    repos.pool.close().await;
    tracing::info!("mergeward stopped");
    server_result
}

#[cfg(unix)]
async fn wait_for_terminate() {
    use tokio::signal::unix::{signal, SignalKind};
    match signal(SignalKind::terminate()) {
        Ok(mut stream) => {
            stream.recv().await;
        }
        Err(e) => {
            tracing::warn!(error = %e, "SIGTERM handler unavailable");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_terminate() {
    std::future::pending::<()>().await;
}
