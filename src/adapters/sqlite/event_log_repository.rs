//! SQLite implementation of the EventLogRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use crate::domain::errors::DomainResult;
use crate::domain::models::WebhookEventLogEntry;
use crate::domain::ports::EventLogRepository;

/// SQLite-backed event log.
#[derive(Clone)]
pub struct SqliteEventLogRepository {
    pool: SqlitePool,
}

impl SqliteEventLogRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventLogRepository for SqliteEventLogRepository {
    async fn exists(&self, project_id: i64, idempotency_key: &str) -> DomainResult<bool> {
        let row: Option<(i64,)> = sqlx::query_as(
            "SELECT 1 FROM webhook_events WHERE project_id = ? AND idempotency_key = ?",
        )
        .bind(project_id)
        .bind(idempotency_key)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.is_some())
    }

    async fn record(&self, entry: &WebhookEventLogEntry) -> DomainResult<bool> {
        let result = sqlx::query(
            r#"INSERT OR IGNORE INTO webhook_events
               (project_id, idempotency_key, event_type, intent, mr_iid, commit_sha, received_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.project_id)
        .bind(&entry.idempotency_key)
        .bind(&entry.event_type)
        .bind(&entry.intent)
        .bind(entry.mr_iid)
        .bind(&entry.commit_sha)
        .bind(entry.received_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
