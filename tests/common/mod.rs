//! Shared fixtures for integration tests: a fully wired engine over an
//! in-memory database with mock GitLab, notifier and host probe.

#![allow(dead_code)]

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use mergeward::adapters::http::server::build_router;
use mergeward::adapters::mock::{MockGitLab, MockHostProbe, MockNotifier};
use mergeward::adapters::sqlite::create_migrated_test_pool;
use mergeward::cli::context::{Externals, Repositories};
use mergeward::cli::Engine;
use mergeward::domain::models::{Config, NewProject, Project, TaskPriority};
use mergeward::domain::ports::ProjectRepository;
use mergeward::services::{QueueWorker, TaskTokenService};

pub const WEBHOOK_SECRET: &str = "hook-secret";

pub struct Harness {
    pub router: Router,
    pub tokens: TaskTokenService,
    pub workers: Vec<Arc<QueueWorker>>,
    pub alerts: Arc<mergeward::services::AlertService>,
    pub repos: Repositories,
    pub gitlab: Arc<MockGitLab>,
    pub notifier: Arc<MockNotifier>,
    pub project: Project,
}

pub fn test_config() -> Config {
    let mut config = Config::default();
    config.runner.token_secret = "integration-test-secret".to_string();
    config.gitlab.bot_account_id = Some(999);
    config.workers.max_attempts = 2;
    config.workers.initial_backoff_ms = 1;
    config.workers.max_backoff_ms = 2;
    config.alerts.queue_depth_threshold = 2;
    config
}

pub async fn harness() -> Harness {
    harness_with(test_config()).await
}

pub async fn harness_with(config: Config) -> Harness {
    let repos = Repositories::from_pool(create_migrated_test_pool().await.expect("test pool"));
    let gitlab = Arc::new(MockGitLab::new());
    let notifier = Arc::new(MockNotifier::new());
    let externals = Externals {
        gitlab: gitlab.clone(),
        notifier: notifier.clone(),
        probe: Arc::new(MockHostProbe::default()),
    };
    let engine = Engine::build(&config, &repos, externals).expect("engine");
    let project = repos
        .projects
        .create(NewProject {
            gitlab_project_id: 100,
            name: "shop".into(),
            webhook_secret: Some(WEBHOOK_SECRET.into()),
            ci_trigger_token: Some("trigger".into()),
        })
        .await
        .expect("project");

    Harness {
        tokens: engine.state.tokens.clone(),
        router: build_router(engine.state),
        workers: engine.workers,
        alerts: engine.alerts,
        repos,
        gitlab,
        notifier,
        project,
    }
}

impl Harness {
    pub fn worker(&self, priority: TaskPriority) -> &QueueWorker {
        let index = TaskPriority::ALL
            .iter()
            .position(|p| *p == priority)
            .expect("known priority");
        &self.workers[index]
    }

    pub async fn add_project(&self, gitlab_project_id: i64, secret: &str) -> Project {
        self.repos
            .projects
            .create(NewProject {
                gitlab_project_id,
                name: format!("project-{gitlab_project_id}"),
                webhook_secret: Some(secret.into()),
                ci_trigger_token: Some("trigger".into()),
            })
            .await
            .expect("project")
    }

    pub async fn webhook(&self, secret: &str, event: &str, uuid: Option<&str>, body: &Value) -> (StatusCode, Value) {
        let mut request = Request::post("/webhook")
            .header("content-type", "application/json")
            .header("x-gitlab-token", secret)
            .header("x-gitlab-event", event);
        if let Some(uuid) = uuid {
            request = request.header("x-gitlab-event-uuid", uuid);
        }
        send(&self.router, request.body(Body::from(body.to_string())).expect("request")).await
    }

    pub async fn report(&self, task_id: Uuid, token: &str, body: &Value) -> (StatusCode, Value) {
        let request = Request::post(format!("/api/v1/tasks/{task_id}/result"))
            .header("content-type", "application/json")
            .header("authorization", format!("Bearer {token}"))
            .body(Body::from(body.to_string()))
            .expect("request");
        send(&self.router, request).await
    }
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = router.clone().oneshot(request).await.expect("response");
    let status = response.status();
    let bytes = response.into_body().collect().await.expect("body").to_bytes();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

pub fn merge_request(iid: i64, action: &str, sha: &str) -> Value {
    json!({
        "object_kind": "merge_request",
        "object_attributes": {
            "iid": iid,
            "action": action,
            "source_branch": "feature",
            "target_branch": "main",
            "author_id": 5,
            "last_commit": {"id": sha}
        }
    })
}

pub fn task_id(body: &Value) -> Uuid {
    body["task_id"]
        .as_str()
        .and_then(|s| Uuid::parse_str(s).ok())
        .expect("response carries a task id")
}
