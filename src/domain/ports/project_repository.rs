use async_trait::async_trait;

use crate::domain::errors::DomainResult;
use crate::domain::models::{NewProject, Project};

/// Persistence for registered projects.
#[async_trait]
pub trait ProjectRepository: Send + Sync {
    /// Register a project and return it with its id.
    async fn create(&self, project: NewProject) -> DomainResult<Project>;

    /// Project by local id
    async fn get(&self, id: i64) -> DomainResult<Option<Project>>;

    /// Project whose webhook secret equals `secret`, enabled or not
    async fn find_by_webhook_secret(&self, secret: &str) -> DomainResult<Option<Project>>;

    /// Enable or disable webhook intake
    async fn set_enabled(&self, id: i64, enabled: bool) -> DomainResult<()>;

    /// All projects ordered by id
    async fn list(&self) -> DomainResult<Vec<Project>>;
}
