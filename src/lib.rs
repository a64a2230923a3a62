//! Mergeward - GitLab webhook intake and task dispatch engine
//!
//! Mergeward ingests GitLab webhook events, classifies their intent, suppresses
//! duplicate and stale deliveries, and dispatches exactly one task per logical
//! unit of work into prioritized queues. Queued tasks are handed to an external
//! CI-triggered runner which reports back through an authenticated callback.
//!
//! # Architecture
//!
//! This crate follows Hexagonal Architecture principles:
//!
//! - **Domain Layer** (`domain`): Models, errors and port traits
//! - **Service Layer** (`services`): The intake pipeline, dispatch and failure handling
//! - **Adapters** (`adapters`): SQLite storage, GitLab REST, notifications, HTTP
//! - **Infrastructure Layer** (`infrastructure`): Configuration and logging
//! - **CLI Layer** (`cli`): Command-line interface

pub mod adapters;
pub mod cli;
pub mod domain;
pub mod infrastructure;
pub mod services;

// Re-export commonly used types for convenience
pub use domain::errors::{DomainError, DomainResult};
pub use domain::models::{
    Config, DeadLetterEntry, DomainEvent, Intent, RoutingResult, Task,
    TaskPriority, TaskStatus, TaskType,
};
pub use infrastructure::config::{ConfigError, ConfigLoader};
