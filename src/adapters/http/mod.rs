//! HTTP surface: GitLab webhook intake, runner result callback and health.

pub mod results;
pub mod server;
pub mod webhook;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::Serialize;

use crate::domain::errors::DomainError;
use crate::domain::ports::{ProjectRepository, TaskRepository};
use crate::services::{ResultProcessor, TaskTokenService, WebhookIntake};

pub use server::{HttpServer, HttpServerConfig};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub projects: Arc<dyn ProjectRepository>,
    pub tasks: Arc<dyn TaskRepository>,
    pub intake: Arc<WebhookIntake>,
    pub results: Arc<ResultProcessor>,
    pub tokens: TaskTokenService,
}

/// JSON error body with its HTTP status.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

/// Handler error rendered as `{error, code}` with a status.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    body: ErrorResponse,
}

impl ApiError {
    /// Error with an explicit status and code.
    pub fn new(status: StatusCode, code: &str, error: impl Into<String>) -> Self {
        Self {
            status,
            body: ErrorResponse {
                error: error.into(),
                code: code.to_string(),
            },
        }
    }

    /// 401 with code `UNAUTHORIZED`.
    pub fn unauthorized(error: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", error)
    }
}

impl From<DomainError> for ApiError {
    fn from(err: DomainError) -> Self {
        match err {
            DomainError::TaskNotFound(_) | DomainError::ProjectNotFound(_) => {
                Self::new(StatusCode::NOT_FOUND, "NOT_FOUND", err.to_string())
            }
            DomainError::ValidationFailed(_) => Self::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID", err.to_string()),
            _ => {
                tracing::error!(error = %err, "request failed");
                Self::new(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", err.to_string())
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.body)).into_response()
    }
}
