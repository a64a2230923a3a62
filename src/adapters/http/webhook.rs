//! `POST /webhook`

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::Json;
use serde_json::Value;

use super::{ApiError, AppState};
use crate::services::event_parser::event_type_from_header;
use crate::services::webhook_intake::IntakeResponse;

/// Shared secret header.
pub const TOKEN_HEADER: &str = "x-gitlab-token";
/// Event type header.
pub const EVENT_HEADER: &str = "x-gitlab-event";
/// Delivery id header.
pub const UUID_HEADER: &str = "x-gitlab-event-uuid";

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok()).filter(|v| !v.is_empty())
}

/// Authenticate and process one GitLab webhook delivery.
pub async fn receive(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<(StatusCode, Json<IntakeResponse>), ApiError> {
    let token = header(&headers, TOKEN_HEADER).ok_or_else(|| ApiError::unauthorized("missing webhook token"))?;
    let project = state
        .projects
        .find_by_webhook_secret(token)
        .await?
        .ok_or_else(|| ApiError::unauthorized("unknown webhook token"))?;
    if !project.enabled {
        tracing::info!(project_id = project.id, "webhook for disabled project rejected");
        return Err(ApiError::new(StatusCode::FORBIDDEN, "PROJECT_DISABLED", "project is disabled"));
    }

    let Some(raw_event) = header(&headers, EVENT_HEADER) else {
        return Ok((
            StatusCode::BAD_REQUEST,
            Json(IntakeResponse::ignored("", project.id, "missing_event_header")),
        ));
    };
    let Some(event_type) = event_type_from_header(raw_event) else {
        tracing::debug!(project_id = project.id, event = raw_event, "unsupported webhook event");
        return Ok((
            StatusCode::OK,
            Json(IntakeResponse::ignored(raw_event, project.id, "unsupported_event")),
        ));
    };

    let payload: Value = serde_json::from_slice(&body)
        .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, "INVALID_PAYLOAD", e.to_string()))?;
    let idempotency_key = header(&headers, UUID_HEADER);

    let response = state.intake.handle(&project, event_type, &payload, idempotency_key).await?;
    Ok((StatusCode::OK, Json(response)))
}
