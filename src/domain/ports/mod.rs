//! Port trait definitions (Hexagonal Architecture)
//!
//! This module defines async trait interfaces that adapters must implement:
//! - Repositories for tasks, webhook events, dead letters, alerts, projects and guidance
//! - WorkQueue: the three priority queues
//! - GitLabApi: GitLab REST operations
//! - Notifier: team chat notifications
//! - HostProbe: host resource readings for alerts
//!
//! These traits define the contracts that allow the domain to be independent
//! of specific infrastructure implementations.

pub mod alert_repository;
pub mod dead_letter_repository;
pub mod event_log_repository;
pub mod gitlab;
pub mod guidance_repository;
pub mod host_probe;
pub mod notifier;
pub mod project_repository;
pub mod task_repository;
pub mod work_queue;

pub use alert_repository::AlertRepository;
pub use dead_letter_repository::{DeadLetterFilters, DeadLetterRepository};
pub use event_log_repository::EventLogRepository;
pub use gitlab::{GitLabApi, GitLabError, GitLabResult, IssueRef, MergeRequestInfo, NoteRef, PipelineRef};
pub use guidance_repository::GuidanceRepository;
pub use host_probe::HostProbe;
pub use notifier::{Notifier, NotifyError};
pub use project_repository::ProjectRepository;
pub use task_repository::{FinishedTaskSample, TaskFilters, TaskRepository};
pub use work_queue::WorkQueue;
