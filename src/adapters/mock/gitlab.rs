//! In-memory GitLab for tests and local dry runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::domain::ports::{GitLabApi, GitLabError, GitLabResult, IssueRef, MergeRequestInfo, NoteRef, PipelineRef};

/// What a recorded note was posted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteTarget {
    /// Merge request iid
    MergeRequest(i64),
    /// Issue iid
    Issue(i64),
}

/// A note created or edited through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedNote {
    pub project_id: i64,
    pub target: NoteTarget,
    pub note_id: i64,
    pub body: String,
    /// Set when the note was edited in place rather than created
    pub updated: bool,
}

/// A pipeline trigger call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedTrigger {
    pub project_id: i64,
    pub git_ref: String,
    pub trigger_token: String,
    pub variables: Vec<(String, String)>,
    pub pipeline_id: i64,
}

impl RecordedTrigger {
    /// Value of pipeline variable `name`.
    pub fn variable(&self, name: &str) -> Option<&str> {
        self.variables.iter().find(|(k, _)| k == name).map(|(_, v)| v.as_str())
    }
}

/// An issue created through the mock.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedIssue {
    pub project_id: i64,
    pub iid: i64,
    pub title: String,
    pub description: String,
}

#[derive(Default)]
struct State {
    merge_requests: HashMap<(i64, i64), MergeRequestInfo>,
    changed_files: HashMap<(i64, i64), Vec<String>>,
    files: HashMap<(i64, String, String), String>,
    failures: HashMap<&'static str, u16>,
    notes: Vec<RecordedNote>,
    triggers: Vec<RecordedTrigger>,
    cancelled: Vec<(i64, i64)>,
    issues: Vec<RecordedIssue>,
}

/// Records every write and answers reads from seeded data.
///
/// Operations can be made to fail with an HTTP status through
/// [`MockGitLab::fail`], keyed by trait method name.
#[derive(Default)]
pub struct MockGitLab {
    state: Mutex<State>,
    next_id: AtomicI64,
}

impl MockGitLab {
    /// Empty mock with no seeded data.
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Seed a merge request returned by lookups.
    pub async fn add_merge_request(&self, project_id: i64, info: MergeRequestInfo) {
        self.state.lock().await.merge_requests.insert((project_id, info.iid), info);
    }

    /// Seed the changed paths of a merge request.
    pub async fn set_changed_files(&self, project_id: i64, mr_iid: i64, files: &[&str]) {
        self.state
            .lock()
            .await
            .changed_files
            .insert((project_id, mr_iid), files.iter().map(|f| (*f).to_string()).collect());
    }

    /// Serve `content` for `path` at `git_ref`.
    pub async fn set_file(&self, project_id: i64, path: &str, git_ref: &str, content: &str) {
        self.state
            .lock()
            .await
            .files
            .insert((project_id, path.to_string(), git_ref.to_string()), content.to_string());
    }

    /// Make `operation` return HTTP `status` from now on.
    pub async fn fail(&self, operation: &'static str, status: u16) {
        self.state.lock().await.failures.insert(operation, status);
    }

    /// Notes recorded so far.
    pub async fn notes(&self) -> Vec<RecordedNote> {
        self.state.lock().await.notes.clone()
    }

    /// Pipeline triggers recorded so far.
    pub async fn triggers(&self) -> Vec<RecordedTrigger> {
        self.state.lock().await.triggers.clone()
    }

    /// Cancelled pipelines as `(project_id, pipeline_id)`.
    pub async fn cancelled(&self) -> Vec<(i64, i64)> {
        self.state.lock().await.cancelled.clone()
    }

    /// Issues created so far.
    pub async fn issues(&self) -> Vec<RecordedIssue> {
        self.state.lock().await.issues.clone()
    }

    async fn check(&self, operation: &'static str) -> GitLabResult<()> {
        match self.state.lock().await.failures.get(operation) {
            Some(&status) => Err(GitLabError::Status {
                status,
                body: format!("{operation} failed"),
            }),
            None => Ok(()),
        }
    }

    async fn record_note(&self, project_id: i64, target: NoteTarget, body: &str) -> NoteRef {
        let note_id = self.next_id();
        self.state.lock().await.notes.push(RecordedNote {
            project_id,
            target,
            note_id,
            body: body.to_string(),
            updated: false,
        });
        NoteRef { id: note_id }
    }
}

#[async_trait]
impl GitLabApi for MockGitLab {
    async fn get_merge_request(&self, project_id: i64, mr_iid: i64) -> GitLabResult<MergeRequestInfo> {
        self.check("get_merge_request").await?;
        self.state
            .lock()
            .await
            .merge_requests
            .get(&(project_id, mr_iid))
            .cloned()
            .ok_or_else(|| GitLabError::Status {
                status: 404,
                body: "404 Not found".to_string(),
            })
    }

    async fn list_changed_files(&self, project_id: i64, mr_iid: i64) -> GitLabResult<Vec<String>> {
        self.check("list_changed_files").await?;
        Ok(self
            .state
            .lock()
            .await
            .changed_files
            .get(&(project_id, mr_iid))
            .cloned()
            .unwrap_or_default())
    }

    async fn get_file(&self, project_id: i64, path: &str, git_ref: &str) -> GitLabResult<Option<String>> {
        self.check("get_file").await?;
        Ok(self
            .state
            .lock()
            .await
            .files
            .get(&(project_id, path.to_string(), git_ref.to_string()))
            .cloned())
    }

    async fn create_mr_note(&self, project_id: i64, mr_iid: i64, body: &str) -> GitLabResult<NoteRef> {
        self.check("create_mr_note").await?;
        Ok(self.record_note(project_id, NoteTarget::MergeRequest(mr_iid), body).await)
    }

    async fn update_mr_note(&self, project_id: i64, mr_iid: i64, note_id: i64, body: &str) -> GitLabResult<()> {
        self.check("update_mr_note").await?;
        self.state.lock().await.notes.push(RecordedNote {
            project_id,
            target: NoteTarget::MergeRequest(mr_iid),
            note_id,
            body: body.to_string(),
            updated: true,
        });
        Ok(())
    }

    async fn create_issue_note(&self, project_id: i64, issue_iid: i64, body: &str) -> GitLabResult<NoteRef> {
        self.check("create_issue_note").await?;
        Ok(self.record_note(project_id, NoteTarget::Issue(issue_iid), body).await)
    }

    async fn create_issue(&self, project_id: i64, title: &str, description: &str) -> GitLabResult<IssueRef> {
        self.check("create_issue").await?;
        let iid = self.next_id();
        self.state.lock().await.issues.push(RecordedIssue {
            project_id,
            iid,
            title: title.to_string(),
            description: description.to_string(),
        });
        Ok(IssueRef {
            iid,
            web_url: Some(format!("https://gitlab.example/{project_id}/-/issues/{iid}")),
        })
    }

    async fn trigger_pipeline(
        &self,
        project_id: i64,
        git_ref: &str,
        trigger_token: &str,
        variables: &[(String, String)],
    ) -> GitLabResult<PipelineRef> {
        self.check("trigger_pipeline").await?;
        let pipeline_id = self.next_id();
        self.state.lock().await.triggers.push(RecordedTrigger {
            project_id,
            git_ref: git_ref.to_string(),
            trigger_token: trigger_token.to_string(),
            variables: variables.to_vec(),
            pipeline_id,
        });
        Ok(PipelineRef { id: pipeline_id })
    }

    async fn cancel_pipeline(&self, project_id: i64, pipeline_id: i64) -> GitLabResult<()> {
        self.check("cancel_pipeline").await?;
        self.state.lock().await.cancelled.push((project_id, pipeline_id));
        Ok(())
    }
}
