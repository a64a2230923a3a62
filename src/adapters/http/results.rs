//! `POST /api/v1/tasks/{id}/result`, the runner callback.

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use super::{ApiError, AppState};
use crate::domain::errors::DomainError;
use crate::domain::models::AttemptRecord;
use crate::services::result_processor::{ReportOutcome, RunnerReport};

/// One attempt in a runner failure report.
#[derive(Debug, Deserialize)]
pub struct ReportedAttempt {
    pub attempt: u32,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    pub error: String,
}

impl From<ReportedAttempt> for AttemptRecord {
    fn from(a: ReportedAttempt) -> Self {
        let mut record = AttemptRecord::new(a.attempt, a.error);
        if let Some(timestamp) = a.timestamp {
            record.timestamp = timestamp;
        }
        record
    }
}

/// Body posted by the runner when a task finishes.
#[derive(Debug, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ResultRequest {
    /// Task succeeded
    Completed {
        result: Value,
    },
    /// Task failed
    Failed {
        error: String,
        #[serde(default)]
        error_message: Option<String>,
        #[serde(default)]
        attempts: Vec<ReportedAttempt>,
    },
}

impl From<ResultRequest> for RunnerReport {
    fn from(request: ResultRequest) -> Self {
        match request {
            ResultRequest::Completed { result } => RunnerReport::Completed { result },
            ResultRequest::Failed {
                error,
                error_message,
                attempts,
            } => RunnerReport::Failed {
                error,
                error_message,
                attempts: attempts.into_iter().map(AttemptRecord::from).collect(),
            },
        }
    }
}

/// Reply to a runner result.
#[derive(Debug, Serialize, PartialEq)]
pub struct ResultResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

fn bearer(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::trim)
}

/// Accept a runner result for the task in the path.
pub async fn receive(
    State(state): State<AppState>,
    Path(task_id): Path<Uuid>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<ResultResponse>, ApiError> {
    let token = bearer(&headers).ok_or_else(|| ApiError::unauthorized("missing bearer token"))?;
    if let Err(e) = state.tokens.validate(token, task_id) {
        tracing::warn!(%task_id, error = %e, "result callback rejected");
        return Err(ApiError::unauthorized(e.to_string()));
    }

    let task = state
        .tasks
        .get(task_id)
        .await?
        .ok_or(DomainError::TaskNotFound(task_id))?;

    let request: ResultRequest = serde_json::from_slice(&body)
        .map_err(|e| ApiError::new(StatusCode::UNPROCESSABLE_ENTITY, "INVALID_RESULT", e.to_string()))?;

    let response = match state.results.handle(task, request.into()).await? {
        ReportOutcome::Completed => ResultResponse {
            status: "completed",
            reason: None,
        },
        ReportOutcome::Failed { reason } => ResultResponse {
            status: "failed",
            reason: Some(reason),
        },
        ReportOutcome::Discarded => ResultResponse {
            status: "discarded",
            reason: Some("task_superseded".to_string()),
        },
        ReportOutcome::NotRunning(status) => {
            return Err(ApiError::new(
                StatusCode::CONFLICT,
                "TASK_NOT_RUNNING",
                format!("task is {}", status.as_str()),
            ));
        }
    };
    Ok(Json(response))
}
