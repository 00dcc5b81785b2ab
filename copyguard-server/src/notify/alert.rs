//! Operational alerts for dead-lettered scans.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::queue::{DeadLetter, DeadLetterReason};

/// Alert raised when a scan job is dropped.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationalAlert {
    pub job_id: Uuid,
    pub content: String,
    pub reason: DeadLetterReason,
    pub error: String,
    pub attempts: usize,
    pub raised_at: DateTime<Utc>,
}

impl From<&DeadLetter> for OperationalAlert {
    fn from(letter: &DeadLetter) -> Self {
        Self {
            job_id: letter.job_id,
            content: letter.job.content().to_string(),
            reason: letter.reason,
            error: letter.error.clone(),
            attempts: letter.attempts.len(),
            raised_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn raise(&self, alert: OperationalAlert);
}

/// Writes alerts to the log at error level.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogAlertSink;

#[async_trait]
impl AlertSink for LogAlertSink {
    async fn raise(&self, alert: OperationalAlert) {
        tracing::error!(
            alert = "scan_dead_lettered",
            job_id = %alert.job_id,
            content = %alert.content,
            reason = %alert.reason,
            attempts = alert.attempts,
            error = %alert.error,
            "Scan job dead-lettered"
        );
    }
}
