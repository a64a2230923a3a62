use std::future::Future;
use std::net::SocketAddr;

use anyhow::Context;
use axum::response::Json;
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;

use super::{results, webhook, AppState};
use crate::domain::models::ServerConfig;

/// Bind address of the HTTP server.
#[derive(Debug, Clone)]
pub struct HttpServerConfig {
    pub host: String,
    pub port: u16,
}

impl From<&ServerConfig> for HttpServerConfig {
    fn from(config: &ServerConfig) -> Self {
        Self {
            host: config.host.clone(),
            port: config.port,
        }
    }
}

/// Axum server serving the intake router.
pub struct HttpServer {
    config: HttpServerConfig,
    state: AppState,
}

/// Routes for webhooks, runner results and health.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/webhook", post(webhook::receive))
        .route("/api/v1/tasks/{id}/result", post(results::receive))
        .route("/health", get(health_check))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
}

async fn health_check() -> Json<Value> {
    Json(json!({"status": "healthy"}))
}

impl HttpServer {
    /// Server over `state` bound per `config`.
    pub fn new(state: AppState, config: HttpServerConfig) -> Self {
        Self { config, state }
    }

    /// Serve until `shutdown` resolves.
    pub async fn serve_with_shutdown<F>(self, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr: SocketAddr = format!("{}:{}", self.config.host, self.config.port)
            .parse()
            .with_context(|| format!("invalid listen address {}:{}", self.config.host, self.config.port))?;
        let listener = TcpListener::bind(addr)
            .await
            .with_context(|| format!("failed to bind {addr}"))?;

        tracing::info!(%addr, "HTTP server listening");
        axum::serve(listener, build_router(self.state))
            .with_graceful_shutdown(shutdown)
            .await?;
        tracing::info!("HTTP server stopped");
        Ok(())
    }
}
