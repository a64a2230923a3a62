use serde::{Deserialize, Serialize};

/// Main configuration structure for Mergeward
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// GitLab API configuration
    #[serde(default)]
    pub gitlab: GitLabConfig,

    /// External runner configuration
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Queue worker configuration
    #[serde(default)]
    pub workers: WorkerConfig,

    /// Health check configuration
    #[serde(default)]
    pub alerts: AlertsConfig,

    /// Team chat delivery
    #[serde(default)]
    pub notifications: NotificationsConfig,

    /// Review guidance injection
    #[serde(default)]
    pub guidance: GuidanceConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".mergeward/mergeward.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rotated log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// Also log to stdout when a log directory is set
    #[serde(default = "default_enable_stdout")]
    pub enable_stdout: bool,

    /// File rotation: daily, hourly or never
    #[serde(default = "default_rotation")]
    pub rotation: String,

    /// Number of days to retain logs
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

const fn default_enable_stdout() -> bool {
    true
}

fn default_rotation() -> String {
    "daily".to_string()
}

const fn default_retention_days() -> u32 {
    30
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            enable_stdout: default_enable_stdout(),
            rotation: default_rotation(),
            retention_days: default_retention_days(),
        }
    }
}

/// GitLab API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GitLabConfig {
    /// Instance URL, without the `/api/v4` suffix
    #[serde(default = "default_gitlab_url")]
    pub base_url: String,

    /// Personal or bot access token (can also be set via `MERGEWARD_GITLAB__API_TOKEN`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_token: Option<String>,

    /// User id of the bot account; notes it authors are ignored
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bot_account_id: Option<i64>,

    /// Outbound request budget
    #[serde(default = "default_requests_per_second")]
    pub requests_per_second: u32,

    /// Per-request timeout
    #[serde(default = "default_gitlab_timeout")]
    pub timeout_secs: u64,
}

fn default_gitlab_url() -> String {
    "https://gitlab.com".to_string()
}

const fn default_requests_per_second() -> u32 {
    10
}

const fn default_gitlab_timeout() -> u64 {
    30
}

impl Default for GitLabConfig {
    fn default() -> Self {
        Self {
            base_url: default_gitlab_url(),
            api_token: None,
            bot_account_id: None,
            requests_per_second: default_requests_per_second(),
            timeout_secs: default_gitlab_timeout(),
        }
    }
}

/// External runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RunnerConfig {
    /// Base URL the runner calls back on
    #[serde(default = "default_runner_api_url")]
    pub api_url: String,

    /// HMAC secret for task tokens
    #[serde(default)]
    pub token_secret: String,

    /// Lifetime of per-task result tokens
    #[serde(default = "default_token_ttl")]
    pub token_ttl_minutes: u64,
}

fn default_runner_api_url() -> String {
    "http://127.0.0.1:8080".to_string()
}

const fn default_token_ttl() -> u64 {
    120
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            api_url: default_runner_api_url(),
            token_secret: String::new(),
            token_ttl_minutes: default_token_ttl(),
        }
    }
}

/// Queue worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct WorkerConfig {
    /// Idle sleep between polls of an empty queue, in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Dispatch attempts before a task is dead-lettered
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff delay in milliseconds
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff delay in milliseconds
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,

    /// Seconds a claimed queue entry is withheld before another worker may
    /// take it over. Must outlast a full round of dispatch retries.
    #[serde(default = "default_claim_timeout_secs")]
    pub claim_timeout_secs: u64,
}

impl WorkerConfig {
    /// Longest time a worker sleeps between attempts on one task.
    pub fn worst_case_backoff_ms(&self) -> u64 {
        self.max_backoff_ms.saturating_mul(u64::from(self.max_attempts.saturating_sub(1)))
    }
}

const fn default_poll_interval_ms() -> u64 {
    1000
}

const fn default_max_attempts() -> u32 {
    3
}

const fn default_initial_backoff_ms() -> u64 {
    10_000
}

const fn default_max_backoff_ms() -> u64 {
    300_000
}

const fn default_claim_timeout_secs() -> u64 {
    900
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval_ms(),
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff_ms(),
            max_backoff_ms: default_max_backoff_ms(),
            claim_timeout_secs: default_claim_timeout_secs(),
        }
    }
}

/// Health check configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AlertsConfig {
    /// Time between alert runs
    #[serde(default = "default_alert_interval")]
    pub interval_secs: u64,

    /// Received plus queued tasks above this count raise `queue_depth`
    #[serde(default = "default_queue_depth_threshold")]
    pub queue_depth_threshold: u64,

    /// Endpoint returning `{"status": "healthy"}`; container check skipped when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub health_url: Option<String>,

    /// Filesystem measured by the disk check
    #[serde(default = "default_disk_path")]
    pub disk_path: String,
}

const fn default_alert_interval() -> u64 {
    60
}

const fn default_queue_depth_threshold() -> u64 {
    50
}

fn default_disk_path() -> String {
    "/".to_string()
}

impl Default for AlertsConfig {
    fn default() -> Self {
        Self {
            interval_secs: default_alert_interval(),
            queue_depth_threshold: default_queue_depth_threshold(),
            health_url: None,
            disk_path: default_disk_path(),
        }
    }
}

/// Team chat delivery settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct NotificationsConfig {
    /// Incoming webhook of the team chat space
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_chat_webhook_url: Option<String>,

    /// Payload shape: generic, slack, mattermost or google_chat
    #[serde(default = "default_chat_platform")]
    pub platform: String,

    /// Categories to deliver; empty delivers everything
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<String>,
}

fn default_chat_platform() -> String {
    "generic".to_string()
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            team_chat_webhook_url: None,
            platform: default_chat_platform(),
            categories: Vec::new(),
        }
    }
}

/// Review guidance injection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GuidanceConfig {
    #[serde(default = "default_guidance_enabled")]
    pub enabled: bool,

    /// Word budget for guidance added to a review prompt
    #[serde(default = "default_guidance_words")]
    pub max_words: usize,
}

const fn default_guidance_enabled() -> bool {
    true
}

const fn default_guidance_words() -> usize {
    500
}

impl Default for GuidanceConfig {
    fn default() -> Self {
        Self {
            enabled: default_guidance_enabled(),
            max_words: default_guidance_words(),
        }
    }
}
