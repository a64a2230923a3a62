//! SQLite-backed priority work queues.
//!
//! A dequeue stamps `claimed_at` instead of deleting the row. The row is
//! removed by `ack`, so a worker that dies mid-dispatch leaves the entry
//! behind and it is reclaimed once the claim timeout has passed.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::parse_uuid;
use crate::domain::errors::DomainResult;
use crate::domain::models::TaskPriority;
use crate::domain::ports::WorkQueue;

/// How long a claimed entry is withheld from other workers.
pub const DEFAULT_CLAIM_TIMEOUT: Duration = Duration::from_secs(900);

/// [`WorkQueue`] over the `work_queue` table.
#[derive(Clone)]
pub struct SqliteWorkQueue {
    pool: SqlitePool,
    claim_timeout: Duration,
}

impl SqliteWorkQueue {
    /// Queue with [`DEFAULT_CLAIM_TIMEOUT`].
    pub fn new(pool: SqlitePool) -> Self {
        Self {
            pool,
            claim_timeout: DEFAULT_CLAIM_TIMEOUT,
        }
    }

    /// Override how long a claim holds before the entry is handed out again.
    #[must_use]
    pub const fn with_claim_timeout(mut self, claim_timeout: Duration) -> Self {
        self.claim_timeout = claim_timeout;
        self
    }
}

/// Enqueue on an open connection so callers can share a transaction.
pub(super) async fn enqueue_on(conn: &mut SqliteConnection, queue: TaskPriority, task_id: Uuid) -> DomainResult<()> {
    sqlx::query("INSERT INTO work_queue (queue, task_id, enqueued_at) VALUES (?, ?, ?)")
        .bind(queue.queue_name())
        .bind(task_id.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(conn)
        .await?;
    Ok(())
}

#[async_trait]
impl WorkQueue for SqliteWorkQueue {
    async fn enqueue(&self, queue: TaskPriority, task_id: Uuid) -> DomainResult<()> {
        let mut conn = self.pool.acquire().await?;
        enqueue_on(&mut *conn, queue, task_id).await
    }

    async fn dequeue(&self, queue: TaskPriority) -> DomainResult<Option<Uuid>> {
        let now = Utc::now().timestamp_millis();
        let lease = i64::try_from(self.claim_timeout.as_millis()).unwrap_or(i64::MAX);

        // Single statement: stamping claimed_at is the claim.
        let row: Option<(String,)> = sqlx::query_as(
            r#"UPDATE work_queue SET claimed_at = ?
               WHERE id = (
                   SELECT id FROM work_queue
                   WHERE queue = ? AND (claimed_at IS NULL OR claimed_at <= ?)
                   ORDER BY id LIMIT 1
               )
               RETURNING task_id"#,
        )
        .bind(now)
        .bind(queue.queue_name())
        .bind(now.saturating_sub(lease))
        .fetch_optional(&self.pool)
        .await?;

        row.map(|(id,)| parse_uuid(&id)).transpose()
    }

    async fn ack(&self, task_id: Uuid) -> DomainResult<()> {
        sqlx::query("DELETE FROM work_queue WHERE task_id = ?")
            .bind(task_id.to_string())
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn depth(&self, queue: TaskPriority) -> DomainResult<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM work_queue WHERE queue = ?")
            .bind(queue.queue_name())
            .fetch_one(&self.pool)
            .await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }
}
