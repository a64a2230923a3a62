use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Shortest accepted task token secret, in bytes
pub const MIN_TOKEN_SECRET_LEN: usize = 16;

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidLogRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid max_attempts: {0}. Cannot be 0")]
    InvalidMaxAttempts(u32),

    #[error(
        "Invalid backoff configuration: initial_backoff_ms ({0}) must be less than max_backoff_ms ({1})"
    )]
    InvalidBackoff(u64, u64),

    #[error("Invalid claim_timeout_secs: {0}. Must exceed the worst-case retry backoff of {1} ms")]
    InvalidClaimTimeout(u64, u64),

    #[error("Invalid GitLab rate limit: {0}. Must be at least 1")]
    InvalidRateLimit(u32),

    #[error("runner.token_secret must be at least {MIN_TOKEN_SECRET_LEN} bytes")]
    WeakTokenSecret,

    #[error("Invalid token_ttl_minutes: {0}. Must be at least 1")]
    InvalidTokenTtl(u64),

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults (Serialized)
    /// 2. .mergeward/config.yaml
    /// 3. .mergeward/local.yaml (optional overrides)
    /// 4. Environment variables (MERGEWARD_* prefix, `__` nests)
    pub fn load() -> Result<Config> {
        let config: Config = Self::figment()
            .merge(Yaml::file(".mergeward/config.yaml"))
            .merge(Yaml::file(".mergeward/local.yaml"))
            .merge(Env::prefixed("MERGEWARD_").split("__"))
            .extract()
            .context("Failed to extract configuration from figment")?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Load configuration from a specific file; environment variables still win.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let config: Config = Self::figment()
            .merge(Yaml::file(path.as_ref()))
            .merge(Env::prefixed("MERGEWARD_").split("__"))
            .extract()
            .with_context(|| format!("Failed to load config from {}", path.as_ref().display()))?;

        Self::validate(&config)?;
        Ok(config)
    }

    fn figment() -> Figment {
        Figment::new().merge(Serialized::defaults(Config::default()))
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }

        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(config.database.max_connections));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidLogRotation(config.logging.rotation.clone()));
        }

        if config.workers.max_attempts == 0 {
            return Err(ConfigError::InvalidMaxAttempts(config.workers.max_attempts));
        }

        if config.workers.initial_backoff_ms >= config.workers.max_backoff_ms {
            return Err(ConfigError::InvalidBackoff(
                config.workers.initial_backoff_ms,
                config.workers.max_backoff_ms,
            ));
        }

        let worst_case_ms = config.workers.worst_case_backoff_ms();
        if config.workers.claim_timeout_secs.saturating_mul(1000) <= worst_case_ms {
            return Err(ConfigError::InvalidClaimTimeout(config.workers.claim_timeout_secs, worst_case_ms));
        }

        if config.gitlab.requests_per_second == 0 {
            return Err(ConfigError::InvalidRateLimit(config.gitlab.requests_per_second));
        }

        if config.gitlab.base_url.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("gitlab.base_url cannot be empty".to_string()));
        }

        if config.runner.token_secret.len() < MIN_TOKEN_SECRET_LEN {
            return Err(ConfigError::WeakTokenSecret);
        }

        if config.runner.token_ttl_minutes == 0 {
            return Err(ConfigError::InvalidTokenTtl(0));
        }

        if config.alerts.interval_secs == 0 {
            return Err(ConfigError::ValidationFailed("alerts.interval_secs must be at least 1".to_string()));
        }

        Ok(())
    }
}
