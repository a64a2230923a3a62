//! Engine configuration: defaults, `.mergeward/config.yaml`, then
//! `MERGEWARD_*` environment overrides, merged with figment and validated
//! before any component starts.

pub mod loader;

pub use loader::{ConfigError, ConfigLoader};
