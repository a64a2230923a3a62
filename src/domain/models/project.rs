//! Registered GitLab projects.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::event::ProjectRef;

/// A GitLab project registered for webhook intake.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: i64,
    pub gitlab_project_id: i64,
    pub name: String,
    /// Disabled projects have their webhooks ignored
    pub enabled: bool,
    /// Secret GitLab sends in `X-Gitlab-Token`
    pub webhook_secret: Option<String>,
    /// Pipeline trigger token used to start runner jobs
    pub ci_trigger_token: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Project {
    /// Local and GitLab ids of this project.
    pub fn reference(&self) -> ProjectRef {
        ProjectRef::new(self.id, self.gitlab_project_id)
    }
}

/// Fields needed to register a project.
#[derive(Debug, Clone, Default)]
pub struct NewProject {
    pub gitlab_project_id: i64,
    pub name: String,
    pub webhook_secret: Option<String>,
    /// Pipeline trigger token used to start runner jobs
    pub ci_trigger_token: Option<String>,
}
