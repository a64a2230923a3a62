//! Executes queued tasks: triggers the runner pipeline or runs
//! server-side work inline.

use std::sync::Arc;

use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::{
    EffectOutcome, ExecutionMode, ReviewStrategy, RunnerConfig, Task, TaskStatus, TaskType,
};
use crate::domain::ports::{GitLabApi, GitLabError, ProjectRepository, TaskRepository};
use crate::services::comments::{PLACEHOLDER_BODY, PLACEHOLDER_REREVIEW_BODY};
use crate::services::failure_handler::FailureHandler;
use crate::services::guidance::GuidanceService;
use crate::services::repo_config::RepoConfigReader;
use crate::services::result_processor::{ReportOutcome, ResultProcessor};
use crate::services::strategy_resolver::StrategyResolver;
use crate::services::task_token::TaskTokenService;

/// Ref used when the merge request's source branch cannot be resolved.
pub const DEFAULT_REF: &str = "main";

/// Failure of one dispatch attempt.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Persistence or state machine error
    #[error(transparent)]
    Domain(#[from] DomainError),

    /// GitLab API call failed
    #[error(transparent)]
    GitLab(#[from] GitLabError),
}

impl DispatchError {
    /// A GitLab rejection that retrying cannot fix.
    pub fn is_invalid_request(&self) -> bool {
        matches!(self, Self::GitLab(e) if e.is_invalid_request())
    }
}

/// Result of a dispatch that did not error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Runner pipeline started
    Running { pipeline_id: i64 },
    /// Server-side task finished inline
    Completed,
    /// Task failed permanently at dispatch time
    Failed { reason: String },
    /// Task was gone or no longer queued
    Skipped,
}

/// Starts queued tasks, either on a CI runner or inline on the server.
pub struct TaskDispatcher {
    tasks: Arc<dyn TaskRepository>,
    projects: Arc<dyn ProjectRepository>,
    gitlab: Arc<dyn GitLabApi>,
    repo_config: RepoConfigReader,
    guidance: GuidanceService,
    tokens: TaskTokenService,
    failures: Arc<FailureHandler>,
    results: Arc<ResultProcessor>,
    runner: RunnerConfig,
}

impl TaskDispatcher {
    /// Dispatcher over the given collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        tasks: Arc<dyn TaskRepository>,
        projects: Arc<dyn ProjectRepository>,
        gitlab: Arc<dyn GitLabApi>,
        guidance: GuidanceService,
        tokens: TaskTokenService,
        failures: Arc<FailureHandler>,
        results: Arc<ResultProcessor>,
        runner: RunnerConfig,
    ) -> Self {
        Self {
            repo_config: RepoConfigReader::new(gitlab.clone()),
            tasks,
            projects,
            gitlab,
            guidance,
            tokens,
            failures,
            results,
            runner,
        }
    }

    /// Start the task if it is still `Queued`.
    ///
    /// Runner tasks get a placeholder note and a triggered pipeline and move to
    /// `Running`. Server-side tasks run to completion here. A missing task or one
    /// in any other status is skipped.
    pub async fn dispatch(&self, task_id: Uuid) -> Result<DispatchOutcome, DispatchError> {
        let Some(task) = self.tasks.get(task_id).await? else {
            tracing::warn!(%task_id, "dequeued task no longer exists");
            return Ok(DispatchOutcome::Skipped);
        };

        if task.status != TaskStatus::Queued {
            tracing::info!(%task_id, status = task.status.as_str(), "skipping task that is not queued");
            return Ok(DispatchOutcome::Skipped);
        }

        let mode = task.task_type.execution_mode();
        tracing::info!(
            %task_id,
            task_type = task.task_type.as_str(),
            execution_mode = if mode == ExecutionMode::Server { "server" } else { "runner" },
            "dispatching task"
        );

        match mode {
            ExecutionMode::Server => self.dispatch_server_side(task).await,
            ExecutionMode::Runner => self.dispatch_to_runner(task).await,
        }
    }

    async fn dispatch_server_side(&self, mut task: Task) -> Result<DispatchOutcome, DispatchError> {
        match task.task_type {
            TaskType::PrdCreation => {
                let title = task.metadata.title.clone().unwrap_or_else(|| "Product requirements".to_string());
                let description = task.metadata.description.clone().unwrap_or_default();
                let issue = self.gitlab.create_issue(task.gitlab_project_id, &title, &description).await?;
                tracing::info!(task_id = %task.id, issue_iid = issue.iid, "issue created");

                self.start(&mut task).await?;
                task.issue_iid = Some(issue.iid);
                let result = json!({"issue_iid": issue.iid, "web_url": issue.web_url, "title": title});
                match self.results.complete(task, result).await? {
                    ReportOutcome::Completed => Ok(DispatchOutcome::Completed),
                    ReportOutcome::Failed { reason } => Ok(DispatchOutcome::Failed { reason }),
                    ReportOutcome::Discarded | ReportOutcome::NotRunning(_) => Ok(DispatchOutcome::Skipped),
                }
            }
            other => Err(DomainError::LogicError(format!("{other} is not a server-side task type")).into()),
        }
    }

    async fn dispatch_to_runner(&self, mut task: Task) -> Result<DispatchOutcome, DispatchError> {
        let trigger_token = self
            .projects
            .get(task.project_id)
            .await?
            .and_then(|p| p.ci_trigger_token)
            .filter(|t| !t.is_empty());
        let Some(trigger_token) = trigger_token else {
            tracing::error!(task_id = %task.id, project_id = task.project_id, "missing CI trigger token");
            return self.fail(task, "missing_trigger_token", None).await;
        };

        let git_ref = self.resolve_ref(&task).await;
        let strategy = self.resolve_strategy(&task).await;
        let overrides = self.repo_config.read(task.gitlab_project_id, &git_ref).await;
        let guidance = self.guidance_for(&task).await;

        task.metadata.strategy = Some(strategy.as_str().to_string());
        task.metadata.repo_config = overrides;
        self.tasks.update_details(&task).await?;

        self.start(&mut task).await?;

        let variables = self.pipeline_variables(&task, strategy, guidance);
        let pipeline = match self
            .gitlab
            .trigger_pipeline(task.gitlab_project_id, &git_ref, &trigger_token, &variables)
            .await
        {
            Ok(pipeline) => pipeline,
            Err(e) => {
                tracing::error!(task_id = %task.id, error = %e, "pipeline trigger failed");
                return self.fail(task, "pipeline_trigger_failed", Some(e.to_string())).await;
            }
        };

        task.pipeline_id = Some(pipeline.id);
        self.tasks.update_details(&task).await?;
        tracing::info!(
            task_id = %task.id,
            pipeline_id = pipeline.id,
            strategy = strategy.as_str(),
            git_ref = %git_ref,
            "pipeline triggered"
        );

        if task.task_type.posts_placeholder() {
            self.post_placeholder(&mut task).await.log("placeholder_comment");
        }

        Ok(DispatchOutcome::Running { pipeline_id: pipeline.id })
    }

    async fn start(&self, task: &mut Task) -> DomainResult<()> {
        let transition = task.transition_to(TaskStatus::Running, None)?;
        self.tasks.apply_transition(task, &transition).await
    }

    async fn fail(&self, task: Task, reason: &str, details: Option<String>) -> Result<DispatchOutcome, DispatchError> {
        self.failures.handle_permanent_failure(task, reason, details, Vec::new()).await?;
        Ok(DispatchOutcome::Failed {
            reason: reason.to_string(),
        })
    }

    /// Source branch of the task's merge request, else [`DEFAULT_REF`].
    async fn resolve_ref(&self, task: &Task) -> String {
        let Some(mr_iid) = task.mr_iid else {
            return DEFAULT_REF.to_string();
        };

        match self.gitlab.get_merge_request(task.gitlab_project_id, mr_iid).await {
            Ok(mr) if !mr.source_branch.is_empty() => mr.source_branch,
            Ok(_) => DEFAULT_REF.to_string(),
            Err(e) => {
                tracing::warn!(task_id = %task.id, mr_iid, error = %e, "could not resolve source branch, using default ref");
                DEFAULT_REF.to_string()
            }
        }
    }

    async fn resolve_strategy(&self, task: &Task) -> ReviewStrategy {
        if let Some(strategy) = StrategyResolver::for_task_type(task.task_type) {
            return strategy;
        }

        let Some(mr_iid) = task.mr_iid else {
            return StrategyResolver::resolve::<&str>(&[]);
        };

        match self.gitlab.list_changed_files(task.gitlab_project_id, mr_iid).await {
            Ok(paths) => StrategyResolver::resolve(&paths),
            Err(e) => {
                tracing::warn!(task_id = %task.id, mr_iid, error = %e, "could not list changed files, using mixed review");
                ReviewStrategy::MixedReview
            }
        }
    }

    async fn guidance_for(&self, task: &Task) -> Option<String> {
        if task.task_type != TaskType::CodeReview {
            return None;
        }

        match self.guidance.build_review_guidance(task.project_id).await {
            Ok(text) if !text.is_empty() => Some(text),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!(task_id = %task.id, error = %e, "guidance unavailable");
                None
            }
        }
    }

    fn pipeline_variables(&self, task: &Task, strategy: ReviewStrategy, guidance: Option<String>) -> Vec<(String, String)> {
        let intent = task.intent.map_or(task.task_type.as_str(), |i| i.as_str());
        let mut variables = vec![
            ("MERGEWARD_TASK_ID", task.id.to_string()),
            ("MERGEWARD_TASK_TYPE", task.task_type.as_str().to_string()),
            ("MERGEWARD_INTENT", intent.to_string()),
            ("MERGEWARD_STRATEGY", strategy.as_str().to_string()),
            ("MERGEWARD_SKILLS", strategy.skills().join(",")),
            ("MERGEWARD_TOKEN", self.tokens.generate(task.id)),
            ("MERGEWARD_API_URL", self.runner.api_url.clone()),
        ];

        if let Some(question) = task.metadata.question.as_ref().filter(|q| !q.is_empty()) {
            variables.push(("MERGEWARD_QUESTION", question.clone()));
        }
        if let Some(issue_iid) = task.issue_iid {
            variables.push(("MERGEWARD_ISSUE_IID", issue_iid.to_string()));
        }
        if let Some(guidance) = guidance {
            variables.push(("MERGEWARD_GUIDANCE", guidance));
        }
        if let (Some(mr_iid), TaskType::FeatureDev | TaskType::UiAdjustment) = (task.mr_iid, task.task_type) {
            variables.push(("MERGEWARD_EXISTING_MR_IID", mr_iid.to_string()));
        }

        variables.into_iter().map(|(k, v)| (k.to_string(), v)).collect()
    }

    /// Post or reuse the "in progress" note and remember its id.
    async fn post_placeholder(&self, task: &mut Task) -> EffectOutcome {
        let Some(mr_iid) = task.mr_iid else {
            return EffectOutcome::skipped("task has no merge request");
        };
        let project = task.gitlab_project_id;

        let previous = match self.tasks.find_previous_review_comment(task.project_id, mr_iid, task.id).await {
            Ok(previous) => previous,
            Err(e) => return EffectOutcome::failed(e),
        };

        let note_id = match previous {
            Some(note_id) => match self.gitlab.update_mr_note(project, mr_iid, note_id, PLACEHOLDER_REREVIEW_BODY).await {
                Ok(()) => note_id,
                Err(e) => {
                    tracing::debug!(task_id = %task.id, note_id, error = %e, "previous note not editable, posting a new one");
                    match self.gitlab.create_mr_note(project, mr_iid, PLACEHOLDER_BODY).await {
                        Ok(note) => note.id,
                        Err(e) => return EffectOutcome::failed(e),
                    }
                }
            },
            None => match self.gitlab.create_mr_note(project, mr_iid, PLACEHOLDER_BODY).await {
                Ok(note) => note.id,
                Err(e) => return EffectOutcome::failed(e),
            },
        };

        task.comment_id = Some(note_id);
        self.tasks.update_details(task).await.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockGitLab, MockNotifier, NoteTarget};
    use crate::adapters::sqlite::{
        create_migrated_test_pool, SqliteDeadLetterRepository, SqliteGuidanceRepository, SqliteProjectRepository,
        SqliteTaskRepository,
    };
    use crate::domain::models::{
        GuidanceConfig, GuidanceEntry, GuidanceKind, Intent, NewProject, TaskMetadata, TaskPriority,
    };
    use crate::domain::ports::{DeadLetterRepository, GuidanceRepository, MergeRequestInfo};
    use crate::services::completion_notifier::CompletionNotifier;

    struct Fixture {
        dispatcher: TaskDispatcher,
        tasks: Arc<SqliteTaskRepository>,
        dead_letters: Arc<SqliteDeadLetterRepository>,
        guidance: Arc<SqliteGuidanceRepository>,
        gitlab: Arc<MockGitLab>,
        project_id: i64,
        tokens: TaskTokenService,
    }

    async fn fixture(trigger_token: Option<&str>) -> Fixture {
        let pool = create_migrated_test_pool().await.unwrap();
        let tasks = Arc::new(SqliteTaskRepository::new(pool.clone()));
        let dead_letters = Arc::new(SqliteDeadLetterRepository::new(pool.clone()));
        let guidance = Arc::new(SqliteGuidanceRepository::new(pool.clone()));
        let projects = Arc::new(SqliteProjectRepository::new(pool));
        let project = projects
            .create(NewProject {
                gitlab_project_id: 100,
                name: "shop".into(),
                webhook_secret: Some("hook".into()),
                ci_trigger_token: trigger_token.map(str::to_string),
            })
            .await
            .unwrap();

        let gitlab = Arc::new(MockGitLab::new());
        let completion = Arc::new(CompletionNotifier::new(projects.clone(), Arc::new(MockNotifier::new())));
        let failures = Arc::new(FailureHandler::new(
            tasks.clone(),
            dead_letters.clone(),
            gitlab.clone(),
            completion.clone(),
        ));
        let results = Arc::new(ResultProcessor::new(tasks.clone(), failures.clone(), completion));
        let tokens = TaskTokenService::new("dispatcher-test-secret-value", 60).unwrap();
        let dispatcher = TaskDispatcher::new(
            tasks.clone(),
            projects,
            gitlab.clone(),
            GuidanceService::new(guidance.clone(), GuidanceConfig::default()),
            tokens.clone(),
            failures,
            results,
            RunnerConfig {
                api_url: "https://mergeward.example".into(),
                ..RunnerConfig::default()
            },
        );

        Fixture {
            dispatcher,
            tasks,
            dead_letters,
            guidance,
            gitlab,
            project_id: project.id,
            tokens,
        }
    }

    async fn queued(f: &Fixture, task: Task) -> Task {
        let mut task = task;
        f.tasks.insert(&task).await.unwrap();
        let t = task.transition_to(TaskStatus::Queued, None).unwrap();
        f.tasks.apply_transition(&task, &t).await.unwrap();
        task
    }

    fn review(f: &Fixture) -> Task {
        Task::new(f.project_id, 100, TaskType::CodeReview, TaskPriority::Normal)
            .with_intent(Intent::AutoReview)
            .with_merge_request(Some(42))
            .with_commit(Some("abc".into()))
    }

    #[tokio::test]
    async fn test_review_triggers_pipeline_with_variables() {
        let f = fixture(Some("trigger-123")).await;
        f.gitlab
            .add_merge_request(
                100,
                MergeRequestInfo {
                    iid: 42,
                    source_branch: "feature/cart".into(),
                    target_branch: "main".into(),
                    sha: None,
                },
            )
            .await;
        f.gitlab.set_changed_files(100, 42, &["src/Cart.vue"]).await;
        f.gitlab
            .set_file(100, ".mergeward.yml", "feature/cart", "general:\n  model: opus\n")
            .await;
        f.guidance
            .insert(&GuidanceEntry::new(f.project_id, GuidanceKind::ReviewPattern, "prefer early returns"))
            .await
            .unwrap();
        let task = queued(&f, review(&f)).await;

        let outcome = f.dispatcher.dispatch(task.id).await.unwrap();
        let triggers = f.gitlab.triggers().await;
        assert_eq!(triggers.len(), 1);
        let trigger = &triggers[0];
        assert_eq!(outcome, DispatchOutcome::Running { pipeline_id: trigger.pipeline_id });
        assert_eq!(trigger.git_ref, "feature/cart");
        assert_eq!(trigger.trigger_token, "trigger-123");
        assert_eq!(trigger.variable("MERGEWARD_TASK_ID"), Some(task.id.to_string().as_str()));
        assert_eq!(trigger.variable("MERGEWARD_TASK_TYPE"), Some("code_review"));
        assert_eq!(trigger.variable("MERGEWARD_INTENT"), Some("auto_review"));
        assert_eq!(trigger.variable("MERGEWARD_STRATEGY"), Some("frontend-review"));
        assert_eq!(trigger.variable("MERGEWARD_SKILLS"), Some("frontend-review"));
        assert_eq!(trigger.variable("MERGEWARD_API_URL"), Some("https://mergeward.example"));
        assert_eq!(trigger.variable("MERGEWARD_GUIDANCE"), Some("- prefer early returns"));
        assert!(trigger.variable("MERGEWARD_EXISTING_MR_IID").is_none());
        let token = trigger.variable("MERGEWARD_TOKEN").unwrap();
        assert_eq!(f.tokens.validate(token, task.id), Ok(()));

        let stored = f.tasks.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Running);
        assert_eq!(stored.pipeline_id, Some(trigger.pipeline_id));
        assert_eq!(stored.metadata.strategy.as_deref(), Some("frontend-review"));
        assert_eq!(stored.metadata.repo_config.get("ai_model"), Some(&json!("opus")));

        let notes = f.gitlab.notes().await;
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].body, PLACEHOLDER_BODY);
        assert_eq!(stored.comment_id, Some(notes[0].note_id));
    }

    #[tokio::test]
    async fn test_lookup_failures_fall_back() {
        let f = fixture(Some("trigger-123")).await;
        f.gitlab.fail("get_merge_request", 500).await;
        f.gitlab.fail("list_changed_files", 502).await;
        f.gitlab.fail("get_file", 500).await;
        f.gitlab.fail("create_mr_note", 500).await;
        let task = queued(&f, review(&f)).await;

        let outcome = f.dispatcher.dispatch(task.id).await.unwrap();
        assert!(matches!(outcome, DispatchOutcome::Running { .. }));

        let trigger = &f.gitlab.triggers().await[0];
        assert_eq!(trigger.git_ref, DEFAULT_REF);
        assert_eq!(trigger.variable("MERGEWARD_STRATEGY"), Some("mixed-review"));
        assert_eq!(trigger.variable("MERGEWARD_SKILLS"), Some("frontend-review,backend-review"));

        let stored = f.tasks.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Running);
        assert!(stored.comment_id.is_none());
    }

    #[tokio::test]
    async fn test_missing_trigger_token_fails_immediately() {
        let f = fixture(None).await;
        let task = queued(&f, review(&f)).await;

        let outcome = f.dispatcher.dispatch(task.id).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Failed {
                reason: "missing_trigger_token".into()
            }
        );
        let stored = f.tasks.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        assert_eq!(stored.error_reason.as_deref(), Some("missing_trigger_token"));
        assert!(f.gitlab.triggers().await.is_empty());
        assert!(f.dead_letters.find_by_task(task.id).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_trigger_failure_fails_task() {
        let f = fixture(Some("trigger-123")).await;
        f.gitlab.fail("trigger_pipeline", 400).await;
        let task = queued(&f, review(&f)).await;

        let outcome = f.dispatcher.dispatch(task.id).await.unwrap();
        assert_eq!(
            outcome,
            DispatchOutcome::Failed {
                reason: "pipeline_trigger_failed".into()
            }
        );
        let stored = f.tasks.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Failed);
        let entry = f.dead_letters.find_by_task(task.id).await.unwrap().unwrap();
        assert!(entry.error_details.unwrap().contains("400"));

        let notes = f.gitlab.notes().await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].body.contains("Failed to trigger the CI pipeline"));
    }

    #[tokio::test]
    async fn test_placeholder_reuses_previous_review_note() {
        let f = fixture(Some("trigger-123")).await;
        let mut earlier = queued(&f, review(&f)).await;
        earlier.comment_id = Some(900);
        f.tasks.update_details(&earlier).await.unwrap();
        f.tasks.supersede_in_flight(f.project_id, 42).await.unwrap();

        let task = queued(&f, review(&f)).await;
        f.dispatcher.dispatch(task.id).await.unwrap();

        let notes = f.gitlab.notes().await;
        assert_eq!(notes.len(), 1);
        assert!(notes[0].updated);
        assert_eq!(notes[0].note_id, 900);
        assert_eq!(notes[0].body, PLACEHOLDER_REREVIEW_BODY);
        assert_eq!(f.tasks.get(task.id).await.unwrap().unwrap().comment_id, Some(900));
    }

    #[tokio::test]
    async fn test_feature_dev_variables() {
        let f = fixture(Some("trigger-123")).await;
        let task = Task::new(f.project_id, 100, TaskType::FeatureDev, TaskPriority::Low)
            .with_intent(Intent::FeatureDev)
            .with_issue(Some(7))
            .with_merge_request(Some(12));
        let task = queued(&f, task).await;

        f.dispatcher.dispatch(task.id).await.unwrap();
        let trigger = &f.gitlab.triggers().await[0];
        assert_eq!(trigger.variable("MERGEWARD_STRATEGY"), Some("backend-review"));
        assert_eq!(trigger.variable("MERGEWARD_ISSUE_IID"), Some("7"));
        assert_eq!(trigger.variable("MERGEWARD_EXISTING_MR_IID"), Some("12"));
        assert!(trigger.variable("MERGEWARD_GUIDANCE").is_none());
        assert!(f.gitlab.notes().await.is_empty());
    }

    #[tokio::test]
    async fn test_ask_question_is_passed() {
        let f = fixture(Some("trigger-123")).await;
        let task = Task::new(f.project_id, 100, TaskType::IssueDiscussion, TaskPriority::Normal)
            .with_intent(Intent::AskCommand)
            .with_merge_request(Some(42))
            .with_metadata(TaskMetadata {
                question: Some("why is this slow?".into()),
                ..TaskMetadata::default()
            });
        let task = queued(&f, task).await;

        f.dispatcher.dispatch(task.id).await.unwrap();
        let trigger = &f.gitlab.triggers().await[0];
        assert_eq!(trigger.variable("MERGEWARD_QUESTION"), Some("why is this slow?"));
        assert_eq!(trigger.variable("MERGEWARD_INTENT"), Some("ask_command"));
    }

    #[tokio::test]
    async fn test_prd_creation_runs_server_side() {
        let f = fixture(None).await;
        let task = Task::new(f.project_id, 100, TaskType::PrdCreation, TaskPriority::Normal).with_metadata(
            TaskMetadata {
                title: Some("Checkout v2".into()),
                description: Some("Rework checkout".into()),
                ..TaskMetadata::default()
            },
        );
        let task = queued(&f, task).await;

        let outcome = f.dispatcher.dispatch(task.id).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::Completed);
        assert!(f.gitlab.triggers().await.is_empty());

        let issues = f.gitlab.issues().await;
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].title, "Checkout v2");

        let stored = f.tasks.get(task.id).await.unwrap().unwrap();
        assert_eq!(stored.status, TaskStatus::Completed);
        assert_eq!(stored.result.unwrap()["issue_iid"], json!(issues[0].iid));
    }

    #[tokio::test]
    async fn test_server_side_gitlab_error_leaves_task_queued() {
        let f = fixture(None).await;
        f.gitlab.fail("create_issue", 422).await;
        let task = queued(&f, Task::new(f.project_id, 100, TaskType::PrdCreation, TaskPriority::Normal)).await;

        let err = f.dispatcher.dispatch(task.id).await.unwrap_err();
        assert!(err.is_invalid_request());
        assert_eq!(f.tasks.get(task.id).await.unwrap().unwrap().status, TaskStatus::Queued);
    }

    #[tokio::test]
    async fn test_non_queued_and_missing_tasks_are_skipped() {
        let f = fixture(Some("trigger-123")).await;
        assert_eq!(f.dispatcher.dispatch(Uuid::new_v4()).await.unwrap(), DispatchOutcome::Skipped);

        let mut task = queued(&f, review(&f)).await;
        let t = task.transition_to(TaskStatus::Superseded, None).unwrap();
        f.tasks.apply_transition(&task, &t).await.unwrap();
        assert_eq!(f.dispatcher.dispatch(task.id).await.unwrap(), DispatchOutcome::Skipped);
        assert!(f.gitlab.triggers().await.is_empty());
    }
}
