//! In-process queue for development and tests.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Mutex;
use tokio::time::Instant;
use uuid::Uuid;

use super::{AttemptRecord, DeadLetter, DeadLetterReason, QueuedJob, ScanJob, ScanQueue};
use crate::store::StoreError;

struct Entry {
    job: ScanJob,
    attempts: u32,
    history: Vec<AttemptRecord>,
    run_at: Instant,
    locked_until: Option<Instant>,
    enqueued_at: DateTime<Utc>,
    seq: u64,
}

impl Entry {
    fn is_deliverable(&self, now: Instant) -> bool {
        self.run_at <= now && self.locked_until.map_or(true, |until| until <= now)
    }
}

#[derive(Default)]
struct State {
    jobs: HashMap<Uuid, Entry>,
    dead: Vec<DeadLetter>,
    next_seq: u64,
}

/// Queue held in process memory; lost on restart.
pub struct MemoryQueue {
    state: Mutex<State>,
    visibility_timeout: Duration,
}

impl MemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Mutex::new(State::default()),
            visibility_timeout,
        }
    }
}

#[async_trait]
impl ScanQueue for MemoryQueue {
    async fn enqueue(&self, job: ScanJob) -> Result<Uuid, StoreError> {
        let mut state = self.state.lock().await;
        let id = Uuid::new_v4();
        let seq = state.next_seq;
        state.next_seq += 1;
        state.jobs.insert(
            id,
            Entry {
                job,
                attempts: 0,
                history: Vec::new(),
                run_at: Instant::now(),
                locked_until: None,
                enqueued_at: Utc::now(),
                seq,
            },
        );
        Ok(id)
    }

    async fn claim(&self) -> Result<Option<QueuedJob>, StoreError> {
        let mut state = self.state.lock().await;
        let now = Instant::now();

        let next = state
            .jobs
            .iter()
            .filter(|(_, entry)| entry.is_deliverable(now))
            .min_by_key(|(_, entry)| (entry.run_at, entry.seq))
            .map(|(id, _)| *id);

        let Some(id) = next else {
            return Ok(None);
        };
        let Some(entry) = state.jobs.get_mut(&id) else {
            return Ok(None);
        };

        entry.attempts += 1;
        entry.locked_until = Some(now + self.visibility_timeout);

        Ok(Some(QueuedJob {
            id,
            job: entry.job.clone(),
            attempt: entry.attempts,
            history: entry.history.clone(),
            enqueued_at: entry.enqueued_at,
        }))
    }

    async fn complete(&self, job_id: Uuid) -> Result<(), StoreError> {
        self.state.lock().await.jobs.remove(&job_id);
        Ok(())
    }

    async fn retry(
        &self,
        job_id: Uuid,
        record: AttemptRecord,
        delay: Duration,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().await;
        let entry = state
            .jobs
            .get_mut(&job_id)
            .ok_or_else(|| StoreError::NotFound(format!("scan job {job_id}")))?;
        entry.history.push(record);
        entry.run_at = Instant::now() + delay;
        entry.locked_until = None;
        Ok(())
    }

    async fn dead_letter(
        &self,
        job: &QueuedJob,
        record: AttemptRecord,
        reason: DeadLetterReason,
    ) -> Result<DeadLetter, StoreError> {
        let mut state = self.state.lock().await;

        let mut attempts = state
            .jobs
            .remove(&job.id)
            .map(|entry| entry.history)
            .unwrap_or_else(|| job.history.clone());
        let error = record.error.clone();
        attempts.push(record);

        let letter = DeadLetter {
            job_id: job.id,
            job: job.job.clone(),
            reason,
            error,
            attempts,
            dead_lettered_at: Utc::now(),
        };
        state.dead.push(letter.clone());
        Ok(letter)
    }

    async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, StoreError> {
        let state = self.state.lock().await;
        Ok(state.dead.iter().rev().take(limit).cloned().collect())
    }

    async fn pending(&self) -> Result<usize, StoreError> {
        Ok(self.state.lock().await.jobs.len())
    }
}
