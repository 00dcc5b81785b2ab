//! Durable scan job queue.
//!
//! Delivery is at-least-once: a claimed job stays invisible for the
//! visibility timeout and is redelivered if the worker never settles it.
//! Settling is one of [`ScanQueue::complete`], [`ScanQueue::retry`] or
//! [`ScanQueue::dead_letter`].

mod memory;
mod postgres;
pub mod worker;

pub use memory::MemoryQueue;
pub use postgres::PostgresQueue;
pub use worker::{JobReport, ScanWorker};

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use copyguard_core::{ContentRef, MediaType};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::store::StoreError;

/// Work item for one content scan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ScanJob {
    /// Image content with one locator per attached media
    Image { content: ContentRef, urls: Vec<String> },
    /// Text content
    Text { content: ContentRef, text: String },
}

impl ScanJob {
    pub fn content(&self) -> &ContentRef {
        match self {
            Self::Image { content, .. } | Self::Text { content, .. } => content,
        }
    }

    pub fn media_type(&self) -> MediaType {
        match self {
            Self::Image { .. } => MediaType::Image,
            Self::Text { .. } => MediaType::Text,
        }
    }
}

/// One failed attempt of a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptRecord {
    /// 1-based attempt number.
    pub attempt: u32,
    pub error: String,
    pub retryable: bool,
    pub at: DateTime<Utc>,
}

impl AttemptRecord {
    pub fn new(attempt: u32, error: impl Into<String>, retryable: bool) -> Self {
        Self {
            attempt,
            error: error.into(),
            retryable,
            at: Utc::now(),
        }
    }
}

/// A job handed to a worker.
#[derive(Debug, Clone)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job: ScanJob,
    /// 1-based number of the attempt this delivery represents.
    pub attempt: u32,
    /// Failures of earlier attempts, oldest first.
    pub history: Vec<AttemptRecord>,
    pub enqueued_at: DateTime<Utc>,
}

/// Why a job was moved to the dead-letter store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeadLetterReason {
    /// Retry budget exhausted
    MaxAttemptsExceeded,
    /// Failed with an error that retrying cannot fix
    NonRetryable,
}

impl DeadLetterReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MaxAttemptsExceeded => "MAX_ATTEMPTS_EXCEEDED",
            Self::NonRetryable => "NON_RETRYABLE",
        }
    }
}

impl std::fmt::Display for DeadLetterReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DeadLetterReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "MAX_ATTEMPTS_EXCEEDED" => Ok(Self::MaxAttemptsExceeded),
            "NON_RETRYABLE" => Ok(Self::NonRetryable),
            other => Err(format!("unknown dead letter reason '{other}'")),
        }
    }
}

/// A dropped job with its full attempt history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeadLetter {
    pub job_id: Uuid,
    pub job: ScanJob,
    pub reason: DeadLetterReason,
    /// Error of the final attempt
    pub error: String,
    pub attempts: Vec<AttemptRecord>,
    pub dead_lettered_at: DateTime<Utc>,
}

/// Exponential backoff schedule with a bounded attempt budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// Delay before the attempt following failed attempt `attempt`:
    /// `base · 2^(attempt−1)`, capped at `max_delay`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let factor = 2u32.saturating_pow(attempt - 1);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }

    /// Whether failed attempt `attempt` may be followed by another.
    pub fn should_retry(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }
}

#[async_trait]
pub trait ScanQueue: Send + Sync {
    /// Enqueue a job for immediate delivery; returns its id.
    async fn enqueue(&self, job: ScanJob) -> Result<Uuid, StoreError>;

    /// Claim the oldest deliverable job, if any.
    async fn claim(&self) -> Result<Option<QueuedJob>, StoreError>;

    /// Acknowledge a successfully processed job.
    async fn complete(&self, job_id: Uuid) -> Result<(), StoreError>;

    /// Record a failed attempt and make the job deliverable again after `delay`.
    async fn retry(
        &self,
        job_id: Uuid,
        record: AttemptRecord,
        delay: Duration,
    ) -> Result<(), StoreError>;

    /// Remove the job and store it with its attempt history.
    async fn dead_letter(
        &self,
        job: &QueuedJob,
        record: AttemptRecord,
        reason: DeadLetterReason,
    ) -> Result<DeadLetter, StoreError>;

    /// Most recent dead letters first.
    async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, StoreError>;

    /// Jobs not yet settled, claimed or not.
    async fn pending(&self) -> Result<usize, StoreError>;
}
