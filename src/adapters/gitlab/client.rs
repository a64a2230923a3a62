//! GitLab HTTP client with rate limiting.
//!
//! Wraps the GitLab REST API v4 with typed methods for the operations the
//! dispatch engine needs. Outbound calls share a `governor` rate limiter so
//! bursts of webhook work cannot exceed the configured request budget.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use reqwest::{Client, Method, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;

use crate::domain::models::GitLabConfig;
use crate::domain::ports::{
    GitLabApi, GitLabError, GitLabResult, IssueRef, MergeRequestInfo, NoteRef, PipelineRef,
};

/// HTTP client for the GitLab REST API v4.
#[derive(Clone)]
pub struct GitLabClient {
    http: Client,
    base_url: Url,
    token: Option<String>,
    rate_limiter: Arc<DefaultDirectRateLimiter>,
}

impl GitLabClient {
    /// Build a client for the configured GitLab instance.
    pub fn new(config: &GitLabConfig) -> GitLabResult<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .pool_max_idle_per_host(10)
            .build()
            .map_err(|e| GitLabError::Transport(e.to_string()))?;

        let base_url = Url::parse(config.base_url.trim_end_matches('/'))
            .map_err(|e| GitLabError::Transport(format!("invalid GitLab URL {}: {e}", config.base_url)))?;

        let per_second = NonZeroU32::new(config.requests_per_second).unwrap_or(NonZeroU32::MIN);

        Ok(Self {
            http,
            base_url,
            token: config.api_token.clone().filter(|t| !t.is_empty()),
            rate_limiter: Arc::new(RateLimiter::direct(Quota::per_second(per_second))),
        })
    }

    /// `{base}/api/v4/{segments...}`, each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> GitLabResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| GitLabError::Transport(format!("GitLab URL {} cannot be a base", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v4"])
            .extend(segments);
        Ok(url)
    }

    /// Wait for a rate-limit permit and build an authorized request.
    async fn request(&self, method: Method, url: Url) -> RequestBuilder {
        self.rate_limiter.until_ready().await;
        let builder = self.http.request(method, url).header("Accept", "application/json");
        match &self.token {
            Some(token) => builder.header("PRIVATE-TOKEN", token),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder, context: &str) -> GitLabResult<Response> {
        let response = builder
            .send()
            .await
            .map_err(|e| GitLabError::Transport(format!("{context}: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        tracing::warn!(context, status = status.as_u16(), %body, "GitLab API error");
        Err(GitLabError::Status { status: status.as_u16(), body })
    }

    async fn send_json<T: DeserializeOwned>(&self, builder: RequestBuilder, context: &str) -> GitLabResult<T> {
        self.send(builder, context)
            .await?
            .json::<T>()
            .await
            .map_err(|e| GitLabError::Decode(format!("{context}: {e}")))
    }
}

#[derive(Deserialize)]
struct ChangesResponse {
    #[serde(default)]
    changes: Vec<Change>,
}

#[derive(Deserialize)]
struct Change {
    new_path: String,
}

#[derive(Deserialize)]
struct FileResponse {
    content: String,
    #[serde(default)]
    encoding: Option<String>,
}

#[async_trait]
impl GitLabApi for GitLabClient {
    async fn get_merge_request(&self, project_id: i64, mr_iid: i64) -> GitLabResult<MergeRequestInfo> {
        let url = self.url(&["projects", &project_id.to_string(), "merge_requests", &mr_iid.to_string()])?;
        let req = self.request(Method::GET, url).await;
        self.send_json(req, "get_merge_request").await
    }

    async fn list_changed_files(&self, project_id: i64, mr_iid: i64) -> GitLabResult<Vec<String>> {
        let url = self.url(&[
            "projects",
            &project_id.to_string(),
            "merge_requests",
            &mr_iid.to_string(),
            "changes",
        ])?;
        let req = self.request(Method::GET, url).await;
        let changes: ChangesResponse = self.send_json(req, "list_changed_files").await?;
        Ok(changes.changes.into_iter().map(|c| c.new_path).collect())
    }

    async fn get_file(&self, project_id: i64, path: &str, git_ref: &str) -> GitLabResult<Option<String>> {
        let mut url = self.url(&["projects", &project_id.to_string(), "repository", "files", path])?;
        url.query_pairs_mut().append_pair("ref", git_ref);

        let req = self.request(Method::GET, url).await;
        let file: FileResponse = match self.send_json(req, "get_file").await {
            Ok(file) => file,
            Err(e) if e.is_not_found() => return Ok(None),
            Err(e) => return Err(e),
        };

        if file.encoding.as_deref() != Some("base64") {
            return Ok(Some(file.content));
        }

        // GitLab may wrap base64 content across lines.
        let compact: String = file.content.split_whitespace().collect();
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(compact)
            .map_err(|e| GitLabError::Decode(format!("get_file {path}: {e}")))?;
        String::from_utf8(bytes)
            .map(Some)
            .map_err(|e| GitLabError::Decode(format!("get_file {path}: {e}")))
    }

    async fn create_mr_note(&self, project_id: i64, mr_iid: i64, body: &str) -> GitLabResult<NoteRef> {
        let url = self.url(&[
            "projects",
            &project_id.to_string(),
            "merge_requests",
            &mr_iid.to_string(),
            "notes",
        ])?;
        let req = self.request(Method::POST, url).await.json(&json!({ "body": body }));
        self.send_json(req, "create_mr_note").await
    }

    async fn update_mr_note(&self, project_id: i64, mr_iid: i64, note_id: i64, body: &str) -> GitLabResult<()> {
        let url = self.url(&[
            "projects",
            &project_id.to_string(),
            "merge_requests",
            &mr_iid.to_string(),
            "notes",
            &note_id.to_string(),
        ])?;
        let req = self.request(Method::PUT, url).await.json(&json!({ "body": body }));
        self.send(req, "update_mr_note").await?;
        Ok(())
    }

    async fn create_issue_note(&self, project_id: i64, issue_iid: i64, body: &str) -> GitLabResult<NoteRef> {
        let url = self.url(&["projects", &project_id.to_string(), "issues", &issue_iid.to_string(), "notes"])?;
        let req = self.request(Method::POST, url).await.json(&json!({ "body": body }));
        self.send_json(req, "create_issue_note").await
    }

    async fn create_issue(&self, project_id: i64, title: &str, description: &str) -> GitLabResult<IssueRef> {
        let url = self.url(&["projects", &project_id.to_string(), "issues"])?;
        let req = self
            .request(Method::POST, url)
            .await
            .json(&json!({ "title": title, "description": description }));
        self.send_json(req, "create_issue").await
    }

    async fn trigger_pipeline(
        &self,
        project_id: i64,
        git_ref: &str,
        trigger_token: &str,
        variables: &[(String, String)],
    ) -> GitLabResult<PipelineRef> {
        let url = self.url(&["projects", &project_id.to_string(), "trigger", "pipeline"])?;
        let variables: serde_json::Map<String, serde_json::Value> = variables
            .iter()
            .map(|(k, v)| (k.clone(), serde_json::Value::String(v.clone())))
            .collect();

        let req = self.request(Method::POST, url).await.json(&json!({
            "token": trigger_token,
            "ref": git_ref,
            "variables": variables,
        }));
        self.send_json(req, "trigger_pipeline").await
    }

    async fn cancel_pipeline(&self, project_id: i64, pipeline_id: i64) -> GitLabResult<()> {
        let url = self.url(&["projects", &project_id.to_string(), "pipelines", &pipeline_id.to_string(), "cancel"])?;
        let req = self.request(Method::POST, url).await;
        self.send(req, "cancel_pipeline").await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher, Server};

    fn client(base_url: &str) -> GitLabClient {
        GitLabClient::new(&GitLabConfig {
            base_url: base_url.to_string(),
            api_token: Some("glpat-test".to_string()),
            requests_per_second: 100,
            ..GitLabConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_get_merge_request_sends_private_token() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("GET", "/api/v4/projects/100/merge_requests/42")
            .match_header("PRIVATE-TOKEN", "glpat-test")
            .with_status(200)
            .with_body(r#"{"iid": 42, "source_branch": "feature/login", "target_branch": "main", "sha": "abc"}"#)
            .create_async()
            .await;

        let mr = client(&server.url()).get_merge_request(100, 42).await.unwrap();
        assert_eq!(mr.source_branch, "feature/login");
        assert_eq!(mr.sha.as_deref(), Some("abc"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_error_status_is_preserved() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v4/projects/100/merge_requests/42/changes")
            .with_status(403)
            .with_body(r#"{"message": "403 Forbidden"}"#)
            .create_async()
            .await;

        let err = client(&server.url()).list_changed_files(100, 42).await.unwrap_err();
        assert!(matches!(err, GitLabError::Status { status: 403, .. }));
        assert!(err.is_invalid_request());
    }

    #[tokio::test]
    async fn test_get_file_decodes_base64_and_maps_404_to_none() {
        let mut server = Server::new_async().await;
        server
            .mock("GET", "/api/v4/projects/100/repository/files/.mergeward.yml")
            .match_query(Matcher::UrlEncoded("ref".into(), "feature/x".into()))
            .with_status(200)
            .with_body(r#"{"content": "Z2VuZXJhbDoKICBtb2RlbDogb3B1cwo=", "encoding": "base64"}"#)
            .create_async()
            .await;
        server
            .mock("GET", "/api/v4/projects/100/repository/files/missing.yml")
            .match_query(Matcher::Any)
            .with_status(404)
            .create_async()
            .await;

        let client = client(&server.url());
        let content = client.get_file(100, ".mergeward.yml", "feature/x").await.unwrap();
        assert_eq!(content.as_deref(), Some("general:\n  model: opus\n"));
        assert_eq!(client.get_file(100, "missing.yml", "main").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_trigger_pipeline_posts_variables() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/api/v4/projects/100/trigger/pipeline")
            .match_body(Matcher::PartialJson(json!({
                "token": "trigger-token",
                "ref": "main",
                "variables": {"MERGEWARD_TASK_ID": "t-1"}
            })))
            .with_status(201)
            .with_body(r#"{"id": 9001, "status": "created"}"#)
            .create_async()
            .await;

        let pipeline = client(&server.url())
            .trigger_pipeline(100, "main", "trigger-token", &[("MERGEWARD_TASK_ID".to_string(), "t-1".to_string())])
            .await
            .unwrap();
        assert_eq!(pipeline.id, 9001);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_note_create_and_update() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/api/v4/projects/100/merge_requests/42/notes")
            .match_body(Matcher::PartialJson(json!({"body": "hello"})))
            .with_status(201)
            .with_body(r#"{"id": 77, "body": "hello"}"#)
            .create_async()
            .await;
        let update = server
            .mock("PUT", "/api/v4/projects/100/merge_requests/42/notes/77")
            .with_status(200)
            .with_body(r#"{"id": 77}"#)
            .create_async()
            .await;

        let client = client(&server.url());
        let note = client.create_mr_note(100, 42, "hello").await.unwrap();
        assert_eq!(note.id, 77);
        client.update_mr_note(100, 42, 77, "bye").await.unwrap();
        update.assert_async().await;
    }
}
