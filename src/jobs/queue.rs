//! PostgreSQL-backed job queue.
//!
//! Jobs live in the `jobs` table. Workers claim them with
//! `FOR UPDATE SKIP LOCKED`, so any number of workers (in any number of
//! processes) can pull concurrently without handing the same job out twice.
//!
//! # Row lifecycle
//!
//! ```text
//! queued ──claim──> running ──complete──> completed
//!   ^                  │
//!   └──retry_later─────┤
//!                      └──dead_letter──> dead
//! ```

use std::time::Duration;

use sqlx::PgExecutor;

use crate::db::DbPool;
use crate::error::AppError;
use crate::models::job::{Job, JobRecord, status};

#[derive(Clone)]
pub struct JobQueue {
    pool: DbPool,
    max_attempts: i32,
}

impl JobQueue {
    pub fn new(pool: DbPool, max_attempts: i32) -> Self {
        Self { pool, max_attempts }
    }

    /// Enqueue a job for immediate execution.
    ///
    /// Returns `false` when a job with the same idempotency key already exists.
    pub async fn enqueue(&self, job: &Job) -> Result<bool, AppError> {
        self.enqueue_with(&self.pool, job, Duration::ZERO).await
    }

    /// Enqueue a job to run after `delay`.
    pub async fn enqueue_in(&self, job: &Job, delay: Duration) -> Result<bool, AppError> {
        self.enqueue_with(&self.pool, job, delay).await
    }

    /// Enqueue through a caller-provided executor.
    ///
    /// Passing an open store transaction makes the job visible only if that
    /// transaction commits.
    pub async fn enqueue_with<'e>(
        &self,
        executor: impl PgExecutor<'e>,
        job: &Job,
        delay: Duration,
    ) -> Result<bool, AppError> {
        let envelope = job
            .to_envelope()
            .map_err(|e| AppError::InvalidRequest(format!("Failed to serialize job: {}", e)))?;

        let inserted = sqlx::query(
            r#"
            INSERT INTO jobs (job_type, payload, idempotency_key, priority, max_attempts, run_at)
            VALUES ($1, $2, $3, $4, $5, NOW() + ($6::bigint * INTERVAL '1 millisecond'))
            ON CONFLICT (idempotency_key) DO NOTHING
            "#,
        )
        .bind(&envelope.job_type)
        .bind(&envelope.payload)
        .bind(&envelope.idempotency_key)
        .bind(job.priority().weight())
        .bind(self.max_attempts)
        .bind(millis(delay))
        .execute(executor)
        .await?
        .rows_affected()
            == 1;

        if inserted {
            tracing::debug!(
                job_type = %envelope.job_type,
                idempotency_key = %envelope.idempotency_key,
                priority = job.priority().as_str(),
                "Job enqueued"
            );
        } else {
            tracing::info!(
                idempotency_key = %envelope.idempotency_key,
                "Duplicate job ignored"
            );
        }

        Ok(inserted)
    }

    /// Take the next runnable job, highest priority first, oldest first.
    ///
    /// The claimed row is marked `running` and its attempt count incremented.
    pub async fn claim(&self) -> Result<Option<JobRecord>, AppError> {
        let job = sqlx::query_as::<_, JobRecord>(
            r#"
            UPDATE jobs
            SET status = $1,
                attempts = attempts + 1,
                locked_at = NOW(),
                updated_at = NOW()
            WHERE id = (
                SELECT id FROM jobs
                WHERE status = $2 AND run_at <= NOW()
                ORDER BY priority DESC, run_at ASC, id ASC
                FOR UPDATE SKIP LOCKED
                LIMIT 1
            )
            RETURNING *
            "#,
        )
        .bind(status::RUNNING)
        .bind(status::QUEUED)
        .fetch_optional(&self.pool)
        .await?;

        Ok(job)
    }

    pub async fn complete(&self, job_id: i64) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE jobs SET status = $1, locked_at = NULL, updated_at = NOW() WHERE id = $2",
        )
        .bind(status::COMPLETED)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Put a failed job back in the queue to run after `delay`.
    pub async fn retry_later(&self, job_id: i64, delay: Duration, error: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1,
                last_error = $2,
                run_at = NOW() + ($3::bigint * INTERVAL '1 millisecond'),
                locked_at = NULL,
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(status::QUEUED)
        .bind(error)
        .bind(millis(delay))
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Park a job for good. Dead jobs are only visible through logs and the table.
    pub async fn dead_letter(&self, job_id: i64, error: &str) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = $1,
                last_error = $2,
                locked_at = NULL,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(status::DEAD)
        .bind(error)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Return jobs left `running` by a crashed worker.
    ///
    /// A job that already used its last attempt is dead-lettered instead.
    pub async fn requeue_stale(&self, older_than: Duration) -> Result<u64, AppError> {
        let requeued = sqlx::query(
            r#"
            UPDATE jobs
            SET status = CASE WHEN attempts >= max_attempts THEN $1 ELSE $2 END,
                last_error = COALESCE(last_error, 'worker lost while running'),
                locked_at = NULL,
                updated_at = NOW()
            WHERE status = $3
              AND locked_at < NOW() - ($4::bigint * INTERVAL '1 millisecond')
            "#,
        )
        .bind(status::DEAD)
        .bind(status::QUEUED)
        .bind(status::RUNNING)
        .bind(millis(older_than))
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(requeued)
    }

    /// Number of jobs per status, for the health endpoint.
    pub async fn counts(&self) -> Result<Vec<(String, i64)>, AppError> {
        let counts = sqlx::query_as::<_, (String, i64)>(
            "SELECT status, COUNT(*) FROM jobs GROUP BY status ORDER BY status",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(counts)
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations_convert_to_millis() {
        assert_eq!(millis(Duration::ZERO), 0);
        assert_eq!(millis(Duration::from_secs(2)), 2_000);
        assert_eq!(millis(Duration::MAX), i64::MAX);
    }
}
