//! Domain models for the Mergeward dispatch engine.

pub mod alert;
pub mod config;
pub mod dead_letter;
pub mod event;
pub mod event_log;
pub mod guidance;
pub mod outcome;
pub mod project;
pub mod routing;
pub mod strategy;
pub mod task;

pub use alert::{AlertEvent, AlertSeverity, AlertStatus, AlertType};
pub use config::{
    AlertsConfig, Config, DatabaseConfig, GitLabConfig, GuidanceConfig, LoggingConfig,
    NotificationsConfig, RunnerConfig, ServerConfig, WorkerConfig,
};
pub use dead_letter::{AttemptRecord, DeadLetterEntry};
pub use event::{
    DomainEvent, EventKind, IssueLabelChanged, MergeRequestEvent, NoteOnIssue, NoteOnMergeRequest,
    ProjectRef, PushToBranch,
};
pub use event_log::WebhookEventLogEntry;
pub use guidance::{GuidanceEntry, GuidanceKind};
pub use outcome::EffectOutcome;
pub use project::{NewProject, Project};
pub use routing::{Intent, RoutingResult};
pub use strategy::ReviewStrategy;
pub use task::{
    ExecutionMode, Task, TaskMetadata, TaskOrigin, TaskPriority, TaskStatus, TaskTransition,
    TaskType,
};
