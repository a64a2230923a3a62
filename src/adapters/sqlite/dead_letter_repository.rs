//! SQLite implementation of the DeadLetterRepository.

use async_trait::async_trait;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::task_repository::insert_queued_on;
use super::{parse_datetime, parse_optional_datetime, parse_optional_uuid, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{AttemptRecord, DeadLetterEntry, Task, TaskTransition};
use crate::domain::ports::{DeadLetterFilters, DeadLetterRepository};

/// SQLite-backed dead letter queue.
#[derive(Clone)]
pub struct SqliteDeadLetterRepository {
    pool: SqlitePool,
}

impl SqliteDeadLetterRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl DeadLetterRepository for SqliteDeadLetterRepository {
    async fn insert(&self, entry: &DeadLetterEntry) -> DomainResult<()> {
        let task_json = serde_json::to_string(&entry.task_record)?;
        let attempts_json = serde_json::to_string(&entry.attempts)?;

        sqlx::query(
            r#"INSERT INTO dead_letters (id, task_id, project_id, task_record, failure_reason,
               error_details, attempts, originally_queued_at, dead_lettered_at,
               dismissed, dismissed_at, dismissed_by, retried, retried_at, retried_by, retried_task_id)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(entry.id.to_string())
        .bind(entry.task_id.to_string())
        .bind(entry.task_record.project_id)
        .bind(&task_json)
        .bind(&entry.failure_reason)
        .bind(&entry.error_details)
        .bind(&attempts_json)
        .bind(entry.originally_queued_at.map(|t| t.to_rfc3339()))
        .bind(entry.dead_lettered_at.to_rfc3339())
        .bind(entry.dismissed)
        .bind(entry.dismissed_at.map(|t| t.to_rfc3339()))
        .bind(&entry.dismissed_by)
        .bind(entry.retried)
        .bind(entry.retried_at.map(|t| t.to_rfc3339()))
        .bind(&entry.retried_by)
        .bind(entry.retried_task_id.map(|id| id.to_string()))
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<DeadLetterEntry>> {
        let row: Option<DeadLetterRow> = sqlx::query_as("SELECT * FROM dead_letters WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(DeadLetterEntry::try_from).transpose()
    }

    async fn find_by_task(&self, task_id: Uuid) -> DomainResult<Option<DeadLetterEntry>> {
        let row: Option<DeadLetterRow> = sqlx::query_as("SELECT * FROM dead_letters WHERE task_id = ?")
            .bind(task_id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(DeadLetterEntry::try_from).transpose()
    }

    async fn save_resolution(&self, entry: &DeadLetterEntry) -> DomainResult<()> {
        let mut conn = self.pool.acquire().await?;
        save_resolution_on(&mut *conn, entry).await
    }

    async fn resolve_with_retry(
        &self,
        entry: &DeadLetterEntry,
        task: &Task,
        transition: &TaskTransition,
    ) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        save_resolution_on(&mut *tx, entry).await?;
        insert_queued_on(&mut *tx, task, transition).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn list(&self, filters: DeadLetterFilters) -> DomainResult<Vec<DeadLetterEntry>> {
        let mut query = String::from("SELECT * FROM dead_letters WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if filters.open_only {
            query.push_str(" AND dismissed = 0 AND retried = 0");
        }
        if let Some(project_id) = filters.project_id {
            query.push_str(" AND project_id = ?");
            bindings.push(project_id.to_string());
        }

        query.push_str(" ORDER BY dead_lettered_at DESC");

        if let Some(limit) = filters.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, DeadLetterRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<DeadLetterRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(DeadLetterEntry::try_from).collect()
    }
}

/// Conditional resolution write: only an open entry is updated.
async fn save_resolution_on(conn: &mut SqliteConnection, entry: &DeadLetterEntry) -> DomainResult<()> {
    let result = sqlx::query(
        r#"UPDATE dead_letters SET dismissed = ?, dismissed_at = ?, dismissed_by = ?,
           retried = ?, retried_at = ?, retried_by = ?, retried_task_id = ?
           WHERE id = ? AND dismissed = 0 AND retried = 0"#,
    )
    .bind(entry.dismissed)
    .bind(entry.dismissed_at.map(|t| t.to_rfc3339()))
    .bind(&entry.dismissed_by)
    .bind(entry.retried)
    .bind(entry.retried_at.map(|t| t.to_rfc3339()))
    .bind(&entry.retried_by)
    .bind(entry.retried_task_id.map(|id| id.to_string()))
    .bind(entry.id.to_string())
    .execute(conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DomainError::ConcurrencyConflict {
            entity: "dead_letter".to_string(),
            id: entry.id.to_string(),
        });
    }

    Ok(())
}

#[derive(sqlx::FromRow)]
struct DeadLetterRow {
    id: String,
    task_id: String,
    task_record: String,
    failure_reason: String,
    error_details: Option<String>,
    attempts: String,
    originally_queued_at: Option<String>,
    dead_lettered_at: String,
    dismissed: bool,
    dismissed_at: Option<String>,
    dismissed_by: Option<String>,
    retried: bool,
    retried_at: Option<String>,
    retried_by: Option<String>,
    retried_task_id: Option<String>,
}

impl TryFrom<DeadLetterRow> for DeadLetterEntry {
    type Error = DomainError;

    fn try_from(row: DeadLetterRow) -> Result<Self, Self::Error> {
        let task_record: Task = serde_json::from_str(&row.task_record)?;
        let attempts: Vec<AttemptRecord> = serde_json::from_str(&row.attempts)?;

        Ok(DeadLetterEntry {
            id: parse_uuid(&row.id)?,
            task_id: parse_uuid(&row.task_id)?,
            task_record,
            failure_reason: row.failure_reason,
            error_details: row.error_details,
            attempts,
            originally_queued_at: parse_optional_datetime(row.originally_queued_at)?,
            dead_lettered_at: parse_datetime(&row.dead_lettered_at)?,
            dismissed: row.dismissed,
            dismissed_at: parse_optional_datetime(row.dismissed_at)?,
            dismissed_by: row.dismissed_by,
            retried: row.retried,
            retried_at: parse_optional_datetime(row.retried_at)?,
            retried_by: row.retried_by,
            retried_task_id: parse_optional_uuid(row.retried_task_id)?,
        })
    }
}
