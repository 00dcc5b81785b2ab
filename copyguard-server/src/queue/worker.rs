//! Scan worker pool.
//!
//! Each worker claims one job at a time, runs it through the orchestrator
//! under a timeout and settles it: complete on success, retry with
//! exponential backoff on a retryable failure while budget remains,
//! dead-letter plus an operational alert otherwise.

use std::sync::Arc;
use std::time::Duration;

use copyguard_core::Decision;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use super::{AttemptRecord, DeadLetterReason, QueuedJob, RetryPolicy, ScanQueue};
use crate::notify::{AlertSink, OperationalAlert};
use crate::pipeline::{Orchestrator, ScanError};
use crate::store::StoreError;

/// What one worker iteration did.
#[derive(Debug, Clone, PartialEq)]
pub enum JobReport {
    /// Nothing to claim
    Idle,
    Completed {
        job_id: Uuid,
        decision: Decision,
    },
    Retrying {
        job_id: Uuid,
        attempt: u32,
        delay: Duration,
    },
    DeadLettered {
        job_id: Uuid,
        reason: DeadLetterReason,
    },
}

#[derive(Clone)]
pub struct ScanWorker {
    queue: Arc<dyn ScanQueue>,
    orchestrator: Arc<Orchestrator>,
    alerts: Arc<dyn AlertSink>,
    retry: RetryPolicy,
    job_timeout: Duration,
    poll_interval: Duration,
}

impl ScanWorker {
    pub fn new(
        queue: Arc<dyn ScanQueue>,
        orchestrator: Arc<Orchestrator>,
        alerts: Arc<dyn AlertSink>,
        retry: RetryPolicy,
    ) -> Self {
        Self {
            queue,
            orchestrator,
            alerts,
            retry,
            job_timeout: Duration::from_secs(120),
            poll_interval: Duration::from_millis(500),
        }
    }

    pub fn with_job_timeout(mut self, timeout: Duration) -> Self {
        self.job_timeout = timeout;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    /// Claim and settle at most one job.
    pub async fn run_once(&self) -> Result<JobReport, StoreError> {
        let Some(queued) = self.queue.claim().await? else {
            return Ok(JobReport::Idle);
        };

        // The job id doubles as the scan id so retries reuse it.
        let result = match tokio::time::timeout(
            self.job_timeout,
            self.orchestrator.run(queued.id, &queued.job),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ScanError::Timeout(self.job_timeout)),
        };

        match result {
            Ok(outcome) => {
                self.queue.complete(queued.id).await?;
                Ok(JobReport::Completed {
                    job_id: queued.id,
                    decision: outcome.decision,
                })
            }
            Err(err) => self.settle_failure(&queued, err).await,
        }
    }

    async fn settle_failure(
        &self,
        queued: &QueuedJob,
        err: ScanError,
    ) -> Result<JobReport, StoreError> {
        let retryable = err.is_retryable();
        let record = AttemptRecord::new(queued.attempt, err.to_string(), retryable);

        if retryable && self.retry.should_retry(queued.attempt) {
            let delay = self.retry.delay_for(queued.attempt);
            warn!(
                job_id = %queued.id,
                content = %queued.job.content(),
                attempt = queued.attempt,
                max_attempts = self.retry.max_attempts,
                error = %err,
                retry_after_ms = delay.as_millis() as u64,
                "Scan attempt failed, retry scheduled"
            );
            self.queue.retry(queued.id, record, delay).await?;
            return Ok(JobReport::Retrying {
                job_id: queued.id,
                attempt: queued.attempt,
                delay,
            });
        }

        let reason = if retryable {
            DeadLetterReason::MaxAttemptsExceeded
        } else {
            DeadLetterReason::NonRetryable
        };

        error!(
            job_id = %queued.id,
            content = %queued.job.content(),
            attempt = queued.attempt,
            reason = %reason,
            code = err.code(),
            error = %err,
            "Scan dropped to dead letter store"
        );

        let letter = self.queue.dead_letter(queued, record, reason).await?;
        self.alerts.raise(OperationalAlert::from(&letter)).await;

        Ok(JobReport::DeadLettered {
            job_id: queued.id,
            reason,
        })
    }

    /// Process jobs until `shutdown` flips to `true`; an in-flight job is finished first.
    pub async fn run(self, worker_id: usize, mut shutdown: watch::Receiver<bool>) {
        info!(worker_id, "Scan worker started");

        while !*shutdown.borrow() {
            match self.run_once().await {
                Ok(JobReport::Idle) => {}
                Ok(_) => continue,
                Err(e) => error!(worker_id, error = %e, "Scan queue error"),
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
            }
        }

        info!(worker_id, "Scan worker stopped");
    }

    /// Spawn `concurrency` workers sharing the queue.
    pub fn spawn_pool(
        &self,
        concurrency: usize,
        shutdown: watch::Receiver<bool>,
    ) -> Vec<JoinHandle<()>> {
        (0..concurrency.max(1))
            .map(|worker_id| tokio::spawn(self.clone().run(worker_id, shutdown.clone())))
            .collect()
    }
}
