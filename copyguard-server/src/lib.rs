//! Copyguard Server Library - copyright scan pipeline, worker pool and admin API
//!
//! This library exposes the server components for use in integration tests.
//! The main binary uses these same components.

pub mod config;
pub mod error;
pub mod handlers;
pub mod notify;
pub mod openapi;
pub mod pipeline;
pub mod queue;
pub mod routes;
pub mod state;
pub mod store;
pub mod validation;

pub use config::Config;
pub use error::ApiError;
pub use notify::{
    AlertSink, LogAlertSink, LogNotificationSink, NotificationDispatcher, NotificationPublisher,
    NotificationSink, OperationalAlert, OwnerNotification, WebhookNotificationSink,
};
pub use openapi::ApiDoc;
pub use pipeline::{
    ContentStateUpdater, Orchestrator, ScanError, ScanLeases, ScanOutcome, ScanStage,
    RESTRICTION_REASON,
};
pub use queue::{
    AttemptRecord, DeadLetter, DeadLetterReason, JobReport, MemoryQueue, PostgresQueue,
    QueuedJob, RetryPolicy, ScanJob, ScanQueue, ScanWorker,
};
pub use routes::{create_router, create_router_with_config};
pub use state::AppState;
pub use store::{
    Backend, ContentRepository, FingerprintStore, MatchRecorder, MemoryStore, NewMatch,
    NewReference, PostgresStore, ReferenceIndex, StatusUpdate, StoreError, Stores,
};
