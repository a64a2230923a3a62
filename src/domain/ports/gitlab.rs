//! GitLab REST collaborator.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failure talking to GitLab.
#[derive(Debug, Error)]
pub enum GitLabError {
    #[error("GitLab returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("GitLab request failed: {0}")]
    Transport(String),

    #[error("Failed to decode GitLab response: {0}")]
    Decode(String),
}

impl GitLabError {
    /// Client-side rejection that retrying cannot fix (4xx except 429).
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::Status { status, .. } if (400..500).contains(status) && *status != 429)
    }

    /// HTTP 404.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Status { status: 404, .. })
    }
}

/// Result alias for GitLab calls.
pub type GitLabResult<T> = Result<T, GitLabError>;

/// Merge request fields the engine reads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeRequestInfo {
    pub iid: i64,
    pub source_branch: String,
    pub target_branch: String,
    #[serde(default)]
    pub sha: Option<String>,
}

/// Created or updated note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoteRef {
    pub id: i64,
}

/// Triggered pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineRef {
    pub id: i64,
}

/// Created issue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueRef {
    pub iid: i64,
    #[serde(default)]
    pub web_url: Option<String>,
}

/// Operations the engine needs from GitLab. Project ids are GitLab ids.
#[async_trait]
pub trait GitLabApi: Send + Sync {
    /// Branches and head commit of a merge request
    async fn get_merge_request(&self, project_id: i64, mr_iid: i64) -> GitLabResult<MergeRequestInfo>;

    /// New paths of all files changed by the merge request
    async fn list_changed_files(&self, project_id: i64, mr_iid: i64) -> GitLabResult<Vec<String>>;

    /// Decoded file content at `git_ref`, `None` when the file does not exist
    async fn get_file(&self, project_id: i64, path: &str, git_ref: &str) -> GitLabResult<Option<String>>;

    /// Comment on a merge request
    async fn create_mr_note(&self, project_id: i64, mr_iid: i64, body: &str) -> GitLabResult<NoteRef>;

    /// Replace the body of an existing note
    async fn update_mr_note(&self, project_id: i64, mr_iid: i64, note_id: i64, body: &str) -> GitLabResult<()>;

    /// Comment on an issue
    async fn create_issue_note(&self, project_id: i64, issue_iid: i64, body: &str) -> GitLabResult<NoteRef>;

    /// Open an issue
    async fn create_issue(&self, project_id: i64, title: &str, description: &str) -> GitLabResult<IssueRef>;

    /// Start a pipeline with a trigger token, passing `variables`
    async fn trigger_pipeline(
        &self,
        project_id: i64,
        git_ref: &str,
        trigger_token: &str,
        variables: &[(String, String)],
    ) -> GitLabResult<PipelineRef>;

    /// Cancel a running pipeline
    async fn cancel_pipeline(&self, project_id: i64, pipeline_id: i64) -> GitLabResult<()>;
}
