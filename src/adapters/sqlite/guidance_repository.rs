//! SQLite implementation of the GuidanceRepository.

use async_trait::async_trait;
use sqlx::SqlitePool;

use super::{parse_datetime, parse_enum, parse_uuid};
use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{GuidanceEntry, GuidanceKind};
use crate::domain::ports::GuidanceRepository;

/// SQLite-backed [`GuidanceRepository`].
#[derive(Clone)]
pub struct SqliteGuidanceRepository {
    pool: SqlitePool,
}

impl SqliteGuidanceRepository {
    /// Repository over `pool`.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl GuidanceRepository for SqliteGuidanceRepository {
    async fn insert(&self, entry: &GuidanceEntry) -> DomainResult<()> {
        sqlx::query(
            "INSERT INTO project_guidance (id, project_id, kind, content, active, created_at) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(entry.id.to_string())
        .bind(entry.project_id)
        .bind(entry.kind.as_str())
        .bind(&entry.content)
        .bind(entry.active)
        .bind(entry.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_active(&self, project_id: i64) -> DomainResult<Vec<GuidanceEntry>> {
        let rows: Vec<GuidanceRow> = sqlx::query_as(
            "SELECT * FROM project_guidance WHERE project_id = ? AND active = 1 ORDER BY created_at DESC",
        )
        .bind(project_id)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(GuidanceEntry::try_from).collect()
    }
}

#[derive(sqlx::FromRow)]
struct GuidanceRow {
    id: String,
    project_id: i64,
    kind: String,
    content: String,
    active: bool,
    created_at: String,
}

impl TryFrom<GuidanceRow> for GuidanceEntry {
    type Error = DomainError;

    fn try_from(row: GuidanceRow) -> Result<Self, Self::Error> {
        Ok(GuidanceEntry {
            id: parse_uuid(&row.id)?,
            project_id: row.project_id,
            kind: parse_enum("kind", &row.kind, GuidanceKind::from_str)?,
            content: row.content,
            active: row.active,
            created_at: parse_datetime(&row.created_at)?,
        })
    }
}
