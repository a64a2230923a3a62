//! Process-level plumbing shared by every command: layered configuration
//! loading and the tracing subscriber.

pub mod config;
pub mod logging;
