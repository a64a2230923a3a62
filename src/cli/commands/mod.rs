//! CLI command handlers.

pub mod alerts;
pub mod dlq;
pub mod migrate;
pub mod project;
pub mod serve;
pub mod task;
