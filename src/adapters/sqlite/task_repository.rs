//! SQLite implementation of the TaskRepository.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{SqliteConnection, SqlitePool};
use uuid::Uuid;

use super::work_queue::enqueue_on;
use super::{parse_datetime, parse_enum, parse_json_or_default, parse_optional_datetime, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    Intent, Task, TaskOrigin, TaskPriority, TaskStatus, TaskTransition, TaskType,
};
use crate::domain::ports::{FinishedTaskSample, TaskFilters, TaskRepository};

/// SQLite-backed task store with transition history.
#[derive(Clone)]
pub struct SqliteTaskRepository {
    pool: SqlitePool,
}

impl SqliteTaskRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TaskRepository for SqliteTaskRepository {
    async fn insert(&self, task: &Task) -> DomainResult<()> {
        let mut conn = self.pool.acquire().await?;
        insert_on(&mut *conn, task).await
    }

    async fn insert_queued(&self, task: &Task, transition: &TaskTransition) -> DomainResult<()> {
        let mut tx = self.pool.begin().await?;
        insert_queued_on(&mut *tx, task, transition).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DomainResult<Option<Task>> {
        let row: Option<TaskRow> = sqlx::query_as("SELECT * FROM tasks WHERE id = ?")
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await?;

        row.map(Task::try_from).transpose()
    }

    async fn update_details(&self, task: &Task) -> DomainResult<()> {
        let metadata_json = serde_json::to_string(&task.metadata)?;
        let result_json = task.result.as_ref().map(serde_json::to_string).transpose()?;

        let result = sqlx::query(
            r#"UPDATE tasks SET pipeline_id = ?, comment_id = ?, retry_count = ?,
               metadata = ?, result = ?, updated_at = ?
               WHERE id = ?"#,
        )
        .bind(task.pipeline_id)
        .bind(task.comment_id)
        .bind(task.retry_count.map(i64::from))
        .bind(&metadata_json)
        .bind(&result_json)
        .bind(Utc::now().to_rfc3339())
        .bind(task.id.to_string())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::TaskNotFound(task.id));
        }

        Ok(())
    }

    async fn apply_transition(&self, task: &Task, transition: &TaskTransition) -> DomainResult<()> {
        // Use &mut *tx for all queries inside the transaction so the single
        // connection is never requested twice.
        let mut tx = self.pool.begin().await?;
        write_transition(&mut *tx, task, transition).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn supersede_in_flight(&self, project_id: i64, mr_iid: i64) -> DomainResult<Vec<Task>> {
        let mut conn = self.pool.acquire().await?;

        // IMMEDIATE takes the write lock up front, so the read below cannot
        // be invalidated by a concurrent writer before the updates land.
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;

        match supersede_on(&mut *conn, project_id, mr_iid).await {
            Ok(tasks) => {
                sqlx::query("COMMIT").execute(&mut *conn).await?;
                Ok(tasks)
            }
            Err(e) => {
                if let Err(rollback) = sqlx::query("ROLLBACK").execute(&mut *conn).await {
                    tracing::error!(error = %rollback, "failed to roll back supersede transaction");
                }
                Err(e)
            }
        }
    }

    async fn has_in_flight_commit(&self, project_id: i64, mr_iid: i64, commit_sha: &str) -> DomainResult<bool> {
        let (count,): (i64,) = sqlx::query_as(
            r#"SELECT COUNT(*) FROM tasks
               WHERE project_id = ? AND mr_iid = ? AND commit_sha = ?
               AND status IN ('queued', 'running')"#,
        )
        .bind(project_id)
        .bind(mr_iid)
        .bind(commit_sha)
        .fetch_one(&self.pool)
        .await?;

        Ok(count > 0)
    }

    async fn list(&self, filters: TaskFilters) -> DomainResult<Vec<Task>> {
        let mut query = String::from("SELECT * FROM tasks WHERE 1=1");
        let mut bindings: Vec<String> = Vec::new();

        if let Some(status) = &filters.status {
            query.push_str(" AND status = ?");
            bindings.push(status.as_str().to_string());
        }
        if let Some(project_id) = filters.project_id {
            query.push_str(" AND project_id = ?");
            bindings.push(project_id.to_string());
        }
        if let Some(mr_iid) = filters.mr_iid {
            query.push_str(" AND mr_iid = ?");
            bindings.push(mr_iid.to_string());
        }
        if let Some(task_type) = &filters.task_type {
            query.push_str(" AND task_type = ?");
            bindings.push(task_type.as_str().to_string());
        }

        query.push_str(" ORDER BY created_at DESC");

        if let Some(limit) = filters.limit {
            query.push_str(&format!(" LIMIT {limit}"));
        }

        let mut q = sqlx::query_as::<_, TaskRow>(&query);
        for binding in &bindings {
            q = q.bind(binding);
        }

        let rows: Vec<TaskRow> = q.fetch_all(&self.pool).await?;
        rows.into_iter().map(Task::try_from).collect()
    }

    async fn transitions(&self, task_id: Uuid) -> DomainResult<Vec<TaskTransition>> {
        let rows: Vec<TransitionRow> = sqlx::query_as(
            "SELECT task_id, from_status, to_status, transitioned_at FROM task_transitions WHERE task_id = ? ORDER BY id",
        )
        .bind(task_id.to_string())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TaskTransition::try_from).collect()
    }

    async fn find_previous_review_comment(
        &self,
        project_id: i64,
        mr_iid: i64,
        exclude_task: Uuid,
    ) -> DomainResult<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as(
            r#"SELECT comment_id FROM tasks
               WHERE project_id = ? AND mr_iid = ? AND id != ?
               AND comment_id IS NOT NULL
               AND task_type IN ('code_review', 'security_audit')
               ORDER BY created_at DESC
               LIMIT 1"#,
        )
        .bind(project_id)
        .bind(mr_iid)
        .bind(exclude_task.to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(id,)| id))
    }

    async fn count_by_status(&self, statuses: &[TaskStatus]) -> DomainResult<u64> {
        if statuses.is_empty() {
            return Ok(0);
        }

        let placeholders = vec!["?"; statuses.len()].join(", ");
        let query = format!("SELECT COUNT(*) FROM tasks WHERE status IN ({placeholders})");

        let mut q = sqlx::query_as::<_, (i64,)>(&query);
        for status in statuses {
            q = q.bind(status.as_str());
        }

        let (count,) = q.fetch_one(&self.pool).await?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    async fn recent_finished(&self, limit: i64) -> DomainResult<Vec<FinishedTaskSample>> {
        let rows: Vec<FinishedRow> = sqlx::query_as(
            r#"SELECT t.id, t.status, t.error_reason, d.error_details, t.completed_at
               FROM tasks t LEFT JOIN dead_letters d ON d.task_id = t.id
               WHERE t.status IN ('completed', 'failed') AND t.completed_at IS NOT NULL
               ORDER BY t.completed_at DESC
               LIMIT ?"#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FinishedTaskSample::try_from).collect()
    }

    async fn finished_since(&self, since: DateTime<Utc>) -> DomainResult<Vec<FinishedTaskSample>> {
        let rows: Vec<FinishedRow> = sqlx::query_as(
            r#"SELECT t.id, t.status, t.error_reason, d.error_details, t.completed_at
               FROM tasks t LEFT JOIN dead_letters d ON d.task_id = t.id
               WHERE t.status IN ('completed', 'failed') AND t.completed_at >= ?
               ORDER BY t.completed_at DESC"#,
        )
        .bind(since.to_rfc3339())
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(FinishedTaskSample::try_from).collect()
    }
}

/// Insert `task` as-is on an open connection.
pub(super) async fn insert_on(conn: &mut SqliteConnection, task: &Task) -> DomainResult<()> {
    let metadata_json = serde_json::to_string(&task.metadata)?;
    let result_json = task.result.as_ref().map(serde_json::to_string).transpose()?;

    sqlx::query(
        r#"INSERT INTO tasks (id, project_id, gitlab_project_id, task_type, origin, priority,
           status, intent, mr_iid, issue_iid, commit_sha, pipeline_id, comment_id, retry_count,
           error_reason, metadata, result, started_at, completed_at, created_at, updated_at)
           VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
    )
    .bind(task.id.to_string())
    .bind(task.project_id)
    .bind(task.gitlab_project_id)
    .bind(task.task_type.as_str())
    .bind(task.origin.as_str())
    .bind(task.priority.as_str())
    .bind(task.status.as_str())
    .bind(task.intent.map(|i| i.as_str()))
    .bind(task.mr_iid)
    .bind(task.issue_iid)
    .bind(&task.commit_sha)
    .bind(task.pipeline_id)
    .bind(task.comment_id)
    .bind(task.retry_count.map(i64::from))
    .bind(&task.error_reason)
    .bind(&metadata_json)
    .bind(&result_json)
    .bind(task.started_at.map(|t| t.to_rfc3339()))
    .bind(task.completed_at.map(|t| t.to_rfc3339()))
    .bind(task.created_at.to_rfc3339())
    .bind(task.updated_at.to_rfc3339())
    .execute(conn)
    .await?;

    Ok(())
}

/// Insert a task that is already `Queued`, its audit row and its queue
/// entry. The caller owns the surrounding transaction.
pub(super) async fn insert_queued_on(
    conn: &mut SqliteConnection,
    task: &Task,
    transition: &TaskTransition,
) -> DomainResult<()> {
    insert_on(&mut *conn, task).await?;
    record_transition(&mut *conn, transition).await?;
    enqueue_on(conn, task.priority, task.id).await
}

async fn record_transition(conn: &mut SqliteConnection, transition: &TaskTransition) -> DomainResult<()> {
    sqlx::query(
        "INSERT INTO task_transitions (task_id, from_status, to_status, transitioned_at) VALUES (?, ?, ?, ?)",
    )
    .bind(transition.task_id.to_string())
    .bind(transition.from_status.as_str())
    .bind(transition.to_status.as_str())
    .bind(transition.transitioned_at.to_rfc3339())
    .execute(conn)
    .await?;
    Ok(())
}

/// Guarded status write plus audit row, on a connection already inside a
/// transaction.
///
/// A result carried by `task` is written with the status, so a completed
/// task never lacks its result.
pub(super) async fn write_transition(
    conn: &mut SqliteConnection,
    task: &Task,
    transition: &TaskTransition,
) -> DomainResult<()> {
    let result_json = task.result.as_ref().map(serde_json::to_string).transpose()?;

    let result = sqlx::query(
        r#"UPDATE tasks SET status = ?, error_reason = ?, result = COALESCE(?, result),
           started_at = ?, completed_at = ?, updated_at = ?
           WHERE id = ? AND status = ?"#,
    )
    .bind(transition.to_status.as_str())
    .bind(&task.error_reason)
    .bind(&result_json)
    .bind(task.started_at.map(|t| t.to_rfc3339()))
    .bind(task.completed_at.map(|t| t.to_rfc3339()))
    .bind(task.updated_at.to_rfc3339())
    .bind(task.id.to_string())
    .bind(transition.from_status.as_str())
    .execute(&mut *conn)
    .await?;

    if result.rows_affected() == 0 {
        return Err(DomainError::ConcurrencyConflict {
            entity: "task".to_string(),
            id: task.id.to_string(),
        });
    }

    record_transition(conn, transition).await
}

async fn supersede_on(conn: &mut SqliteConnection, project_id: i64, mr_iid: i64) -> DomainResult<Vec<Task>> {
    let rows: Vec<TaskRow> = sqlx::query_as(
        r#"SELECT * FROM tasks
           WHERE project_id = ? AND mr_iid = ? AND status IN ('queued', 'running')
           ORDER BY created_at"#,
    )
    .bind(project_id)
    .bind(mr_iid)
    .fetch_all(&mut *conn)
    .await?;

    let mut superseded = Vec::with_capacity(rows.len());
    for row in rows {
        let mut task = Task::try_from(row)?;
        let transition = task.transition_to(TaskStatus::Superseded, None)?;
        write_transition(conn, &task, &transition).await?;
        superseded.push(task);
    }

    Ok(superseded)
}

#[derive(sqlx::FromRow)]
struct TaskRow {
    id: String,
    project_id: i64,
    gitlab_project_id: i64,
    task_type: String,
    origin: String,
    priority: String,
    status: String,
    intent: Option<String>,
    mr_iid: Option<i64>,
    issue_iid: Option<i64>,
    commit_sha: Option<String>,
    pipeline_id: Option<i64>,
    comment_id: Option<i64>,
    retry_count: Option<i64>,
    error_reason: Option<String>,
    metadata: Option<String>,
    result: Option<String>,
    started_at: Option<String>,
    completed_at: Option<String>,
    created_at: String,
    updated_at: String,
}

impl TryFrom<TaskRow> for Task {
    type Error = DomainError;

    fn try_from(row: TaskRow) -> Result<Self, Self::Error> {
        let intent = row
            .intent
            .as_deref()
            .map(|s| parse_enum("intent", s, Intent::from_str))
            .transpose()?;

        let result = row
            .result
            .map(|s| serde_json::from_str(&s))
            .transpose()
            .map_err(|e| DomainError::SerializationError(e.to_string()))?;

        Ok(Task {
            id: parse_uuid(&row.id)?,
            project_id: row.project_id,
            gitlab_project_id: row.gitlab_project_id,
            task_type: parse_enum("task_type", &row.task_type, TaskType::from_str)?,
            origin: parse_enum("origin", &row.origin, TaskOrigin::from_str)?,
            priority: parse_enum("priority", &row.priority, TaskPriority::from_str)?,
            status: parse_enum("status", &row.status, TaskStatus::from_str)?,
            intent,
            mr_iid: row.mr_iid,
            issue_iid: row.issue_iid,
            commit_sha: row.commit_sha,
            pipeline_id: row.pipeline_id,
            comment_id: row.comment_id,
            retry_count: row.retry_count.and_then(|c| u32::try_from(c).ok()),
            error_reason: row.error_reason,
            metadata: parse_json_or_default(row.metadata)?,
            result,
            started_at: parse_optional_datetime(row.started_at)?,
            completed_at: parse_optional_datetime(row.completed_at)?,
            created_at: parse_datetime(&row.created_at)?,
            updated_at: parse_datetime(&row.updated_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct TransitionRow {
    task_id: String,
    from_status: String,
    to_status: String,
    transitioned_at: String,
}

impl TryFrom<TransitionRow> for TaskTransition {
    type Error = DomainError;

    fn try_from(row: TransitionRow) -> Result<Self, Self::Error> {
        Ok(TaskTransition {
            task_id: parse_uuid(&row.task_id)?,
            from_status: parse_enum("from_status", &row.from_status, TaskStatus::from_str)?,
            to_status: parse_enum("to_status", &row.to_status, TaskStatus::from_str)?,
            transitioned_at: parse_datetime(&row.transitioned_at)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct FinishedRow {
    id: String,
    status: String,
    error_reason: Option<String>,
    error_details: Option<String>,
    completed_at: String,
}

impl TryFrom<FinishedRow> for FinishedTaskSample {
    type Error = DomainError;

    fn try_from(row: FinishedRow) -> Result<Self, Self::Error> {
        let error_text = match (row.error_reason, row.error_details) {
            (None, None) => None,
            (reason, details) => Some(
                [reason, details]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ")
                    .to_lowercase(),
            ),
        };

        Ok(FinishedTaskSample {
            task_id: parse_uuid(&row.id)?,
            status: parse_enum("status", &row.status, TaskStatus::from_str)?,
            error_text,
            completed_at: parse_datetime(&row.completed_at)?,
        })
    }
}
