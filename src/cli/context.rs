//! Wiring from configuration to repositories and services.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use sqlx::SqlitePool;

use crate::adapters::gitlab::GitLabClient;
use crate::adapters::host::SystemProbe;
use crate::adapters::http::AppState;
use crate::adapters::notify::TeamChatNotifier;
use crate::adapters::sqlite::{
    database_url, initialize_database, PoolConfig, SqliteAlertRepository, SqliteDeadLetterRepository,
    SqliteEventLogRepository, SqliteGuidanceRepository, SqliteProjectRepository, SqliteTaskRepository,
    SqliteWorkQueue,
};
use crate::domain::models::{Config, DatabaseConfig, TaskPriority};
use crate::domain::ports::{GitLabApi, HostProbe, Notifier};
use crate::infrastructure::config::ConfigLoader;
use crate::services::{
    AlertService, CompletionNotifier, DeadLetterService, EventDeduplicator, FailureHandler, GuidanceService,
    IntentRouter, QueueWorker, ResultProcessor, TaskDispatchService, TaskDispatcher, TaskTokenService,
    WebhookIntake,
};

/// SQLite-backed repositories sharing one pool.
#[derive(Clone)]
pub struct Repositories {
    /// Shared connection pool
    pub pool: SqlitePool,
    pub projects: Arc<SqliteProjectRepository>,
    pub tasks: Arc<SqliteTaskRepository>,
    pub queue: Arc<SqliteWorkQueue>,
    pub dead_letters: Arc<SqliteDeadLetterRepository>,
    pub alerts: Arc<SqliteAlertRepository>,
    pub event_log: Arc<SqliteEventLogRepository>,
    pub guidance: Arc<SqliteGuidanceRepository>,
}

impl Repositories {
    /// Open the configured database and apply migrations.
    pub async fn open(config: &DatabaseConfig) -> Result<Self> {
        let url = database_url(&config.path);
        let pool = initialize_database(&url, Some(PoolConfig::from(config)))
            .await
            .with_context(|| format!("Failed to open database at {}", config.path))?;
        Ok(Self::from_pool(pool))
    }

    /// Repositories over an already migrated pool.
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self {
            projects: Arc::new(SqliteProjectRepository::new(pool.clone())),
            tasks: Arc::new(SqliteTaskRepository::new(pool.clone())),
            queue: Arc::new(SqliteWorkQueue::new(pool.clone())),
            dead_letters: Arc::new(SqliteDeadLetterRepository::new(pool.clone())),
            alerts: Arc::new(SqliteAlertRepository::new(pool.clone())),
            event_log: Arc::new(SqliteEventLogRepository::new(pool.clone())),
            guidance: Arc::new(SqliteGuidanceRepository::new(pool.clone())),
            pool,
        }
    }

    /// Service for the `dlq` commands.
    pub fn dead_letter_service(&self) -> DeadLetterService {
        DeadLetterService::new(self.dead_letters.clone())
    }
}

/// External collaborators the engine talks to.
pub struct Externals {
    /// GitLab REST API
    pub gitlab: Arc<dyn GitLabApi>,
    /// Team chat
    pub notifier: Arc<dyn Notifier>,
    /// Host readings for the alert rules
    pub probe: Arc<dyn HostProbe>,
}

impl Externals {
    /// Real GitLab, team chat and host metrics adapters.
    pub fn from_config(config: &Config) -> Result<Self> {
        let gitlab = GitLabClient::new(&config.gitlab).context("Failed to build GitLab client")?;
        let notifier = TeamChatNotifier::new(&config.notifications).context("Failed to build notifier")?;
        Ok(Self {
            gitlab: Arc::new(gitlab),
            notifier: Arc::new(notifier),
            probe: Arc::new(SystemProbe::new(&config.alerts)),
        })
    }
}

/// Fully wired services.
pub struct Engine {
    /// State shared by the HTTP handlers
    pub state: AppState,
    /// One worker per priority queue
    pub workers: Vec<Arc<QueueWorker>>,
    /// Health checks
    pub alerts: Arc<AlertService>,
    /// Time between health check runs
    pub alert_interval: Duration,
}

impl Engine {
    /// Wire every service from `config`. Validates the configuration first.
    pub fn build(config: &Config, repos: &Repositories, externals: Externals) -> Result<Self> {
        let Externals {
            gitlab,
            notifier,
            probe,
        } = externals;
        ConfigLoader::validate(config)?;

        let tokens = TaskTokenService::new(&config.runner.token_secret, config.runner.token_ttl_minutes)
            .context("Invalid runner token configuration")?;
        let completion = Arc::new(CompletionNotifier::new(repos.projects.clone(), notifier.clone()));
        let failures = Arc::new(FailureHandler::new(
            repos.tasks.clone(),
            repos.dead_letters.clone(),
            gitlab.clone(),
            completion.clone(),
        ));
        let results = Arc::new(ResultProcessor::new(repos.tasks.clone(), failures.clone(), completion));
        let dispatch = Arc::new(TaskDispatchService::new(repos.tasks.clone()));

        let dispatcher = Arc::new(TaskDispatcher::new(
            repos.tasks.clone(),
            repos.projects.clone(),
            gitlab.clone(),
            GuidanceService::new(repos.guidance.clone(), config.guidance.clone()),
            tokens.clone(),
            failures.clone(),
            results.clone(),
            config.runner.clone(),
        ));
        let queue = Arc::new(
            (*repos.queue)
                .clone()
                .with_claim_timeout(Duration::from_secs(config.workers.claim_timeout_secs)),
        );
        let workers = TaskPriority::ALL
            .into_iter()
            .map(|priority| {
                Arc::new(QueueWorker::new(
                    priority,
                    queue.clone(),
                    repos.tasks.clone(),
                    dispatcher.clone(),
                    failures.clone(),
                    config.workers.clone(),
                ))
            })
            .collect();

        let intake = WebhookIntake::new(
            IntentRouter::new(config.gitlab.bot_account_id),
            EventDeduplicator::new(repos.tasks.clone(), repos.event_log.clone()),
            dispatch,
            gitlab,
        );
        let alerts = Arc::new(AlertService::new(
            repos.tasks.clone(),
            repos.alerts.clone(),
            probe,
            notifier,
            &config.alerts,
        ));

        Ok(Self {
            state: AppState {
                projects: repos.projects.clone(),
                tasks: repos.tasks.clone(),
                intake: Arc::new(intake),
                results,
                tokens,
            },
            workers,
            alerts,
            alert_interval: Duration::from_secs(config.alerts.interval_secs),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::mock::{MockGitLab, MockHostProbe, MockNotifier};
    use crate::adapters::sqlite::create_migrated_test_pool;

    fn mocks() -> Externals {
        Externals {
            gitlab: Arc::new(MockGitLab::new()),
            notifier: Arc::new(MockNotifier::new()),
            probe: Arc::new(MockHostProbe::default()),
        }
    }

    #[tokio::test]
    async fn test_engine_builds_one_worker_per_queue() {
        let repos = Repositories::from_pool(create_migrated_test_pool().await.unwrap());
        let mut config = Config::default();
        config.runner.token_secret = "engine-test-secret-value".into();

        let engine = Engine::build(&config, &repos, mocks()).unwrap();
        assert_eq!(engine.workers.len(), 3);
        assert_eq!(engine.alert_interval, Duration::from_secs(60));
    }

    #[tokio::test]
    async fn test_engine_rejects_empty_secret() {
        let repos = Repositories::from_pool(create_migrated_test_pool().await.unwrap());
        assert!(Engine::build(&Config::default(), &repos, mocks()).is_err());
    }

    #[tokio::test]
    async fn test_open_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = DatabaseConfig {
            path: dir.path().join("nested/mergeward.db").display().to_string(),
            max_connections: 2,
        };
        let repos = Repositories::open(&config).await.unwrap();
        assert!(dir.path().join("nested/mergeward.db").exists());
        repos.pool.close().await;
    }
}
