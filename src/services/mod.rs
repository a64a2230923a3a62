//! Engine services: the intake pipeline, dispatch, failure handling and
//! operational checks.

pub mod alert_service;
pub mod comments;
pub mod completion_notifier;
pub mod dead_letter_service;
pub mod event_deduplicator;
pub mod event_parser;
pub mod failure_handler;
pub mod guidance;
pub mod intent_router;
pub mod queue_worker;
pub mod repo_config;
pub mod result_processor;
pub mod strategy_resolver;
pub mod task_dispatch_service;
pub mod task_dispatcher;
pub mod task_token;
pub mod webhook_intake;

pub use alert_service::{AlertRule, AlertService, Condition};
pub use completion_notifier::CompletionNotifier;
pub use dead_letter_service::DeadLetterService;
pub use event_deduplicator::{DedupOutcome, DeduplicationResult, EventDeduplicator};
pub use event_parser::{event_type_from_header, EventContext, EventParser};
pub use failure_handler::{FailureHandler, FailureOutcome};
pub use guidance::GuidanceService;
pub use intent_router::{IntentClassifier, IntentRouter};
pub use queue_worker::{QueueWorker, WorkOutcome};
pub use repo_config::RepoConfigReader;
pub use result_processor::{ReportOutcome, ResultProcessor, RunnerReport};
pub use strategy_resolver::StrategyResolver;
pub use task_dispatch_service::TaskDispatchService;
pub use task_dispatcher::{DispatchError, DispatchOutcome, TaskDispatcher};
pub use task_token::{TaskTokenService, TokenError};
pub use webhook_intake::{IntakeResponse, IntakeStatus, WebhookIntake};
