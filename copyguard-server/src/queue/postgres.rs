//! PostgreSQL-backed scan queue.
//!
//! Claims use `FOR UPDATE SKIP LOCKED` so concurrent workers never receive
//! the same job, and set `locked_until` so a crashed worker's job becomes
//! deliverable again once the visibility timeout passes.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::{AttemptRecord, DeadLetter, DeadLetterReason, QueuedJob, ScanJob, ScanQueue};
use crate::store::StoreError;

#[derive(Clone)]
pub struct PostgresQueue {
    pool: PgPool,
    visibility_timeout: Duration,
}

/// Row type for claimed jobs.
#[derive(FromRow)]
struct JobRow {
    id: Uuid,
    payload: Json<ScanJob>,
    attempts: i32,
    history: Json<Vec<AttemptRecord>>,
    created_at: DateTime<Utc>,
}

impl From<JobRow> for QueuedJob {
    fn from(row: JobRow) -> Self {
        Self {
            id: row.id,
            job: row.payload.0,
            attempt: row.attempts.max(0) as u32,
            history: row.history.0,
            enqueued_at: row.created_at,
        }
    }
}

/// Row type for dead letter queries.
#[derive(FromRow)]
struct DeadLetterRow {
    job_id: Uuid,
    payload: Json<ScanJob>,
    reason: String,
    error: String,
    attempts: Json<Vec<AttemptRecord>>,
    dead_lettered_at: DateTime<Utc>,
}

impl TryFrom<DeadLetterRow> for DeadLetter {
    type Error = StoreError;

    fn try_from(row: DeadLetterRow) -> Result<Self, Self::Error> {
        Ok(Self {
            job_id: row.job_id,
            job: row.payload.0,
            reason: row.reason.parse().map_err(StoreError::Serialization)?,
            error: row.error,
            attempts: row.attempts.0,
            dead_lettered_at: row.dead_lettered_at,
        })
    }
}

impl PostgresQueue {
    pub fn new(pool: PgPool, visibility_timeout: Duration) -> Self {
        Self {
            pool,
            visibility_timeout,
        }
    }
}

#[async_trait]
impl ScanQueue for PostgresQueue {
    async fn enqueue(&self, job: ScanJob) -> Result<Uuid, StoreError> {
        let id = Uuid::new_v4();

        sqlx::query("INSERT INTO scan_jobs (id, payload) VALUES ($1, $2)")
            .bind(id)
            .bind(Json(&job))
            .execute(&self.pool)
            .await?;

        tracing::debug!(job_id = %id, content = %job.content(), "Scan job enqueued");
        Ok(id)
    }

    async fn claim(&self) -> Result<Option<QueuedJob>, StoreError> {
        let row: Option<JobRow> = sqlx::query_as(
            r#"
            UPDATE scan_jobs
            SET attempts = attempts + 1,
                locked_until = NOW() + make_interval(secs => $1)
            WHERE id = (
                SELECT id FROM scan_jobs
                WHERE run_at <= NOW()
                  AND (locked_until IS NULL OR locked_until <= NOW())
                ORDER BY run_at, created_at
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING id, payload, attempts, history, created_at
            "#,
        )
        .bind(self.visibility_timeout.as_secs_f64())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(QueuedJob::from))
    }

    async fn complete(&self, job_id: Uuid) -> Result<(), StoreError> {
        sqlx::query("DELETE FROM scan_jobs WHERE id = $1")
            .bind(job_id)
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn retry(
        &self,
        job_id: Uuid,
        record: AttemptRecord,
        delay: Duration,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE scan_jobs
            SET history = history || $2,
                run_at = NOW() + make_interval(secs => $3),
                locked_until = NULL
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .bind(Json(vec![record]))
        .bind(delay.as_secs_f64())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("scan job {job_id}")));
        }
        Ok(())
    }

    async fn dead_letter(
        &self,
        job: &QueuedJob,
        record: AttemptRecord,
        reason: DeadLetterReason,
    ) -> Result<DeadLetter, StoreError> {
        let mut tx = self.pool.begin().await?;

        let stored: Option<(Json<Vec<AttemptRecord>>,)> =
            sqlx::query_as("DELETE FROM scan_jobs WHERE id = $1 RETURNING history")
                .bind(job.id)
                .fetch_optional(&mut *tx)
                .await?;

        let mut attempts = stored
            .map(|(history,)| history.0)
            .unwrap_or_else(|| job.history.clone());
        let error = record.error.clone();
        attempts.push(record);

        let row: DeadLetterRow = sqlx::query_as(
            r#"
            INSERT INTO scan_dead_letters (job_id, payload, reason, error, attempts)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (job_id) DO UPDATE SET
                reason = EXCLUDED.reason,
                error = EXCLUDED.error,
                attempts = EXCLUDED.attempts
            RETURNING job_id, payload, reason, error, attempts, dead_lettered_at
            "#,
        )
        .bind(job.id)
        .bind(Json(&job.job))
        .bind(reason.as_str())
        .bind(&error)
        .bind(Json(&attempts))
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        row.try_into()
    }

    async fn dead_letters(&self, limit: usize) -> Result<Vec<DeadLetter>, StoreError> {
        let rows: Vec<DeadLetterRow> = sqlx::query_as(
            r#"
            SELECT job_id, payload, reason, error, attempts, dead_lettered_at
            FROM scan_dead_letters
            ORDER BY dead_lettered_at DESC
            LIMIT $1
            "#,
        )
        .bind(i64::try_from(limit).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(TryInto::try_into).collect()
    }

    async fn pending(&self) -> Result<usize, StoreError> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM scan_jobs")
            .fetch_one(&self.pool)
            .await?;
        Ok(count.max(0) as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use copyguard_core::ContentRef;

    fn dead_letter_row(reason: &str) -> DeadLetterRow {
        DeadLetterRow {
            job_id: Uuid::from_u128(9),
            payload: Json(ScanJob::Text {
                content: ContentRef::post("1"),
                text: "caption".into(),
            }),
            reason: reason.into(),
            error: "extraction failed".into(),
            attempts: Json(vec![AttemptRecord::new(1, "extraction failed", true)]),
            dead_lettered_at: Utc::now(),
        }
    }

    #[test]
    fn test_dead_letter_row_conversion() {
        let dead = DeadLetter::try_from(dead_letter_row("MAX_ATTEMPTS_EXCEEDED")).unwrap();
        assert_eq!(dead.job_id, Uuid::from_u128(9));
        assert_eq!(dead.reason, DeadLetterReason::MaxAttemptsExceeded);
        assert_eq!(dead.attempts.len(), 1);
        assert_eq!(dead.job.content(), &ContentRef::post("1"));
    }

    #[test]
    fn test_dead_letter_row_rejects_unknown_reason() {
        let err = DeadLetter::try_from(dead_letter_row("GAVE_UP")).unwrap_err();
        assert!(matches!(err, StoreError::Serialization(_)));
    }

    #[test]
    fn test_job_row_clamps_negative_attempts() {
        let job: QueuedJob = JobRow {
            id: Uuid::from_u128(3),
            payload: Json(ScanJob::Image {
                content: ContentRef::post("2"),
                urls: vec!["https://cdn.test/a.jpg".into()],
            }),
            attempts: -1,
            history: Json(Vec::new()),
            created_at: Utc::now(),
        }
        .into();
        assert_eq!(job.attempt, 0);
        assert_eq!(job.id, Uuid::from_u128(3));
    }
}
