//! SQLite implementation of the AlertRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::{parse_datetime, parse_enum, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AlertEvent, AlertSeverity, AlertStatus, AlertType};
use crate::domain::ports::AlertRepository;

/// SQLite-backed alert store.
#[derive(Clone)]
pub struct SqliteAlertRepository {
    pool: SqlitePool,
}

impl SqliteAlertRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AlertRepository for SqliteAlertRepository {
    async fn find_active(&self, alert_type: AlertType) -> DomainResult<Option<AlertEvent>> {
        let row: Option<AlertRow> = sqlx::query_as(
            "SELECT * FROM alert_events WHERE alert_type = ? AND status = 'active'",
        )
        .bind(alert_type.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(AlertEvent::try_from).transpose()
    }

    async fn insert(&self, alert: &AlertEvent) -> DomainResult<bool> {
        let context_json = serde_json::to_string(&alert.context)?;

        // The partial unique index turns a second active row into a no-op.
        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO alert_events (id, alert_type, status, severity, message, context,
               detected_at, notified_at, resolved_at, recovery_notified_at)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(alert.id.to_string())
        .bind(alert.alert_type.as_str())
        .bind(alert.status.as_str())
        .bind(alert.severity.as_str())
        .bind(&alert.message)
        .bind(&context_json)
        .bind(alert.detected_at.to_rfc3339())
        .bind(alert.notified_at.map(|t| t.to_rfc3339()))
        .bind(alert.resolved_at.map(|t| t.to_rfc3339()))
        .bind(alert.recovery_notified_at.map(|t| t.to_rfc3339()))
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn update(&self, alert: &AlertEvent) -> DomainResult<()> {
        let context_json = serde_json::to_string(&alert.context)?;

        let result = sqlx::query(
            r#"UPDATE alert_events SET status = ?, message = ?, context = ?, notified_at = ?,
               resolved_at = ?, recovery_notified_at = ?
               WHERE id = ?"#,
        )
        .bind(alert.status.as_str())
        .bind(&alert.message)
        .bind(&context_json)
        .bind(alert.notified_at.map(|t| t.to_rfc3339()))
        .bind(alert.resolved_at.map(|t| t.to_rfc3339()))
        .bind(alert.recovery_notified_at.map(|t| t.to_rfc3339()))
        .bind(alert.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ValidationFailed(format!("alert {} does not exist", alert.id)));
        }

        Ok(())
    }

    async fn observe(&self, alert_type: AlertType, at: DateTime<Utc>) -> DomainResult<DateTime<Utc>> {
        // A no-op update on conflict lets RETURNING hand back the stored onset.
        let (first,): (String,) = sqlx::query_as(
            r#"INSERT INTO alert_observations (alert_type, first_observed_at) VALUES (?, ?)
               ON CONFLICT(alert_type) DO UPDATE SET first_observed_at = first_observed_at
               RETURNING first_observed_at"#,
        )
        .bind(alert_type.as_str())
        .bind(at.to_rfc3339())
        .fetch_one(&self.pool)
        .await?;

        parse_datetime(&first)
    }

    async fn clear_observation(&self, alert_type: AlertType) -> DomainResult<()> {
        sqlx::query("DELETE FROM alert_observations WHERE alert_type = ?")
            .bind(alert_type.as_str())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn list(&self, active_only: bool, limit: i64) -> DomainResult<Vec<AlertEvent>> {
        let query = if active_only {
            "SELECT * FROM alert_events WHERE status = 'active' ORDER BY detected_at DESC LIMIT ?"
        } else {
            "SELECT * FROM alert_events ORDER BY detected_at DESC LIMIT ?"
        };

        let rows: Vec<AlertRow> = sqlx::query_as(query).bind(limit).fetch_all(&self.pool).await?;
        rows.into_iter().map(AlertEvent::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct AlertRow {
    id: String,
    alert_type: String,
    status: String,
    severity: String,
    message: String,
    context: Option<String>,
    detected_at: String,
    notified_at: Option<String>,
    resolved_at: Option<String>,
    recovery_notified_at: Option<String>,
}

impl TryFrom<AlertRow> for AlertEvent {
    type Error = DomainError;

    fn try_from(row: AlertRow) -> Result<Self, Self::Error> {
        let context = row
            .context
            .map(|s| serde_json::from_str(&s))
            .transpose()?
            .unwrap_or(serde_json::Value::Null);

        Ok(AlertEvent {
            id: parse_uuid(&row.id)?,
            alert_type: parse_enum("alert_type", &row.alert_type, AlertType::from_str)?,
            status: parse_enum("status", &row.status, AlertStatus::from_str)?,
            severity: parse_enum("severity", &row.severity, AlertSeverity::from_str)?,
            message: row.message,
            context,
            detected_at: parse_datetime(&row.detected_at)?,
            notified_at: parse_optional_datetime(row.notified_at)?,
            resolved_at: parse_optional_datetime(row.resolved_at)?,
            recovery_notified_at: parse_optional_datetime(row.recovery_notified_at)?,
        })
    }
}
