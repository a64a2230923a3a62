//! `mergeward migrate`

use anyhow::{Context, Result};
use serde::Serialize;

use crate::adapters::sqlite::{all_embedded_migrations, create_pool, database_url, Migrator, PoolConfig};
use crate::cli::output::{output, CommandOutput};
use crate::domain::models::Config;

/// Output of `migrate`.
#[derive(Debug, Serialize)]
pub struct MigrateOutput {
    pub database: String,
    pub applied: usize,
    pub version: i64,
}

impl CommandOutput for MigrateOutput {
    fn to_human(&self) -> String {
        if self.applied == 0 {
            format!("Database {} is up to date (version {}).", self.database, self.version)
        } else {
            format!(
                "Applied {} migration(s) to {}; now at version {}.",
                self.applied, self.database, self.version
            )
        }
    }
}

/// Apply pending migrations to the configured database.
pub async fn execute(json_mode: bool, config: &Config) -> Result<()> {
    let pool = create_pool(&database_url(&config.database.path), Some(PoolConfig::from(&config.database)))
        .await
        .with_context(|| format!("Failed to open database at {}", config.database.path))?;

    let migrator = Migrator::new(pool.clone());
    let applied = migrator
        .run_embedded_migrations(all_embedded_migrations())
        .await
        .context("Migration failed")?;
    let version = migrator.get_current_version().await?;
    pool.close().await;

    output(
        &MigrateOutput {
            database: config.database.path.clone(),
            applied,
            version,
        },
        json_mode,
    );
    Ok(())
}
