//! SQLite implementation of the ProjectRepository.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::parse_datetime;
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{NewProject, Project};
use crate::domain::ports::ProjectRepository;

/// SQLite-backed project registry.
#[derive(Clone)]
pub struct SqliteProjectRepository {
    pool: SqlitePool,
}

impl SqliteProjectRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ProjectRepository for SqliteProjectRepository {
    async fn create(&self, project: NewProject) -> DomainResult<Project> {
        let created_at = Utc::now();
        let result = sqlx::query(
            r#"INSERT INTO projects (gitlab_project_id, name, enabled, webhook_secret, ci_trigger_token, created_at)
               VALUES (?, ?, 1, ?, ?, ?)"#,
        )
        .bind(project.gitlab_project_id)
        .bind(&project.name)
        .bind(&project.webhook_secret)
        .bind(&project.ci_trigger_token)
        .bind(created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(Project {
            id: result.last_insert_rowid(),
            gitlab_project_id: project.gitlab_project_id,
            name: project.name,
            enabled: true,
            webhook_secret: project.webhook_secret,
            ci_trigger_token: project.ci_trigger_token,
            created_at,
        })
    }

    async fn get(&self, id: i64) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Project::try_from).transpose()
    }

    async fn find_by_webhook_secret(&self, secret: &str) -> DomainResult<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as("SELECT * FROM projects WHERE webhook_secret = ? LIMIT 1")
            .bind(secret)
            .fetch_optional(&self.pool)
            .await?;

        row.map(Project::try_from).transpose()
    }

    async fn set_enabled(&self, id: i64, enabled: bool) -> DomainResult<()> {
        let result = sqlx::query("UPDATE projects SET enabled = ? WHERE id = ?")
            .bind(enabled)
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ProjectNotFound(id));
        }

        Ok(())
    }

    async fn list(&self) -> DomainResult<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as("SELECT * FROM projects ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        rows.into_iter().map(Project::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    gitlab_project_id: i64,
    name: String,
    enabled: bool,
    webhook_secret: Option<String>,
    ci_trigger_token: Option<String>,
    created_at: String,
}

impl TryFrom<ProjectRow> for Project {
    type Error = DomainError;

    fn try_from(row: ProjectRow) -> Result<Self, Self::Error> {
        Ok(Project {
            id: row.id,
            gitlab_project_id: row.gitlab_project_id,
            name: row.name,
            enabled: row.enabled,
            webhook_secret: row.webhook_secret,
            ci_trigger_token: row.ci_trigger_token,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
