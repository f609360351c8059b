//! Queue facade (C) over a Postgres-backed broker (A).
//!
//! The host codebase conflates the broker client and the queue facade into
//! one Postgres-backed store behind a typed `Job` struct rather than treating
//! them as two layers talking to an external list/set broker — Postgres
//! genuinely plays the broker's role here, so this module keeps that shape
//! and extends it with the facade-level operations (pause/resume/stats/clean)
//! the original only implied.

use std::sync::Arc;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use tracing::{info, warn};
use uuid::Uuid;

use super::dead_letter::DeadLetterManager;
use super::job::{backoff_delay, ErrorKind, Job, JobKind, JobState};
use super::payloads::CommandMeta;

#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueueStats {
    pub waiting: i64,
    pub delayed: i64,
    pub active: i64,
    pub completed: i64,
    pub failed: i64,
    pub paused: bool,
}

/// A job reserved for exclusive processing until `reserved_until` elapses.
#[derive(Debug)]
pub struct Reservation {
    pub job: Job,
}

pub struct JobQueue {
    pool: PgPool,
    dead_letters: Arc<DeadLetterManager>,
    base_backoff: chrono::Duration,
}

impl JobQueue {
    pub fn new(pool: PgPool, dead_letters: Arc<DeadLetterManager>) -> Self {
        Self {
            pool,
            dead_letters,
            base_backoff: chrono::Duration::seconds(2),
        }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Enqueue a typed command (§4.1 `enqueue`). Accepts an optional `delay`.
    pub async fn enqueue<C>(&self, command: &C, delay: Option<chrono::Duration>) -> Result<Uuid>
    where
        C: Serialize + CommandMeta,
    {
        let payload = serde_json::to_value(command)?;
        let job = Job::new(
            command.job_kind(),
            payload,
            command.priority(),
            command.max_attempts(),
            delay,
            command.correlation_id(),
        );

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, kind, payload, priority, attempts_made, max_attempts, state,
                progress, reserved_by, reserved_until, delay_until, correlation_id,
                last_error, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15)
            "#,
        )
        .bind(job.id)
        .bind(job.kind)
        .bind(&job.payload)
        .bind(job.priority)
        .bind(job.attempts_made)
        .bind(job.max_attempts)
        .bind(job.state)
        .bind(job.progress)
        .bind(&job.reserved_by)
        .bind(job.reserved_until)
        .bind(job.delay_until)
        .bind(job.correlation_id)
        .bind(&job.last_error)
        .bind(job.created_at)
        .bind(job.updated_at)
        .execute(&self.pool)
        .await?;

        info!(job_id = %job.id, kind = job.kind.as_str(), "enqueued job");
        Ok(job.id)
    }

    /// Reserve the next ready job of `kind`, skipping paused queues and jobs
    /// belonging to other in-flight reservations (§4.1 `reserve`).
    ///
    /// Also recovers stalled reservations whose `reserved_until` has elapsed
    /// (§4.3 "Stalled detection").
    pub async fn reserve(
        &self,
        kind: JobKind,
        worker_id: &str,
        visibility_timeout: chrono::Duration,
    ) -> Result<Option<Reservation>> {
        if self.is_paused(kind).await? {
            return Ok(None);
        }

        let job = sqlx::query_as::<_, Job>(
            r#"
            WITH next_job AS (
                SELECT id FROM jobs
                WHERE kind = $1
                  AND (
                      (state IN ('waiting', 'delayed') AND (delay_until IS NULL OR delay_until <= NOW()))
                      OR (state = 'active' AND reserved_until < NOW())
                  )
                ORDER BY priority ASC, created_at ASC
                LIMIT 1
                FOR UPDATE SKIP LOCKED
            )
            UPDATE jobs
            SET state = 'active',
                reserved_by = $2,
                reserved_until = NOW() + ($3 || ' milliseconds')::INTERVAL,
                updated_at = NOW()
            WHERE id IN (SELECT id FROM next_job)
            RETURNING id, kind, payload, priority, attempts_made, max_attempts, state,
                      progress, reserved_by, reserved_until, delay_until, correlation_id,
                      last_error, created_at, updated_at
            "#,
        )
        .bind(kind)
        .bind(worker_id)
        .bind(visibility_timeout.num_milliseconds().to_string())
        .fetch_optional(&self.pool)
        .await?;

        Ok(job.map(|job| Reservation { job }))
    }

    /// Extend a reservation and record progress (§4.1 `heartbeat`).
    pub async fn heartbeat(
        &self,
        job_id: Uuid,
        visibility_timeout: chrono::Duration,
        progress: Option<i16>,
    ) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET reserved_until = NOW() + ($1 || ' milliseconds')::INTERVAL,
                progress = COALESCE($2, progress),
                updated_at = NOW()
            WHERE id = $3 AND state = 'active'
            "#,
        )
        .bind(visibility_timeout.num_milliseconds().to_string())
        .bind(progress)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Mark a job as completed (§4.1 `complete`).
    pub async fn complete(&self, job_id: Uuid) -> Result<()> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'completed', progress = 100, reserved_by = NULL,
                reserved_until = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Fail a job, retrying with backoff if attempts remain, otherwise
    /// terminally failing it and handing it to the dead-letter manager
    /// (§4.1 `fail`, §4.3, §4.4 atomicity guarantee).
    pub async fn fail(&self, job_id: Uuid, reason: &str, kind: ErrorKind) -> Result<()> {
        let job = sqlx::query_as::<_, Job>(
            r#"SELECT id, kind, payload, priority, attempts_made, max_attempts, state,
                      progress, reserved_by, reserved_until, delay_until, correlation_id,
                      last_error, created_at, updated_at
               FROM jobs WHERE id = $1"#,
        )
        .bind(job_id)
        .fetch_one(&self.pool)
        .await?;

        if kind == ErrorKind::Cancelled {
            // Cancelled: no attempt consumed, re-queue immediately (§4.5).
            sqlx::query(
                r#"UPDATE jobs SET state = 'waiting', reserved_by = NULL,
                   reserved_until = NULL, delay_until = NULL, updated_at = NOW()
                   WHERE id = $1"#,
            )
            .bind(job_id)
            .execute(&self.pool)
            .await?;
            return Ok(());
        }

        let attempts_made = job.attempts_made + 1;

        if kind.should_retry() && attempts_made < job.max_attempts {
            let delay = backoff_delay(self.base_backoff, attempts_made);
            sqlx::query(
                r#"
                UPDATE jobs
                SET state = 'delayed',
                    attempts_made = $1,
                    delay_until = NOW() + ($2 || ' milliseconds')::INTERVAL,
                    reserved_by = NULL,
                    reserved_until = NULL,
                    last_error = $3,
                    updated_at = NOW()
                WHERE id = $4
                "#,
            )
            .bind(attempts_made)
            .bind(delay.num_milliseconds().to_string())
            .bind(reason)
            .bind(job_id)
            .execute(&self.pool)
            .await?;
            warn!(job_id = %job_id, attempts_made, "job failed, scheduled retry");
            return Ok(());
        }

        // Terminal failure. DLQ insertion is the first durable step (§4.4).
        self.dead_letters
            .insert(&job, reason, attempts_made)
            .await?;

        sqlx::query(
            r#"
            UPDATE jobs
            SET state = 'failed',
                attempts_made = $1,
                last_error = $2,
                reserved_by = NULL,
                reserved_until = NULL,
                updated_at = NOW()
            WHERE id = $3
            "#,
        )
        .bind(attempts_made)
        .bind(reason)
        .bind(job_id)
        .execute(&self.pool)
        .await?;

        warn!(job_id = %job_id, attempts_made, "job terminally failed, moved to dead-letter");
        Ok(())
    }

    pub async fn stats(&self, kind: JobKind) -> Result<QueueStats> {
        let row: (i64, i64, i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COUNT(*) FILTER (WHERE state = 'waiting') AS waiting,
                COUNT(*) FILTER (WHERE state = 'delayed') AS delayed,
                COUNT(*) FILTER (WHERE state = 'active') AS active,
                COUNT(*) FILTER (WHERE state = 'completed') AS completed,
                COUNT(*) FILTER (WHERE state = 'failed') AS failed
            FROM jobs WHERE kind = $1
            "#,
        )
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;

        Ok(QueueStats {
            waiting: row.0,
            delayed: row.1,
            active: row.2,
            completed: row.3,
            failed: row.4,
            paused: self.is_paused(kind).await?,
        })
    }

    pub async fn pause(&self, kind: JobKind) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO queue_pauses (kind, paused) VALUES ($1, true)
               ON CONFLICT (kind) DO UPDATE SET paused = true"#,
        )
        .bind(kind)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn resume(&self, kind: JobKind) -> Result<()> {
        sqlx::query(
            r#"INSERT INTO queue_pauses (kind, paused) VALUES ($1, false)
               ON CONFLICT (kind) DO UPDATE SET paused = false"#,
        )
        .bind(kind)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn is_paused(&self, kind: JobKind) -> Result<bool> {
        let paused: Option<bool> = sqlx::query_scalar("SELECT paused FROM queue_pauses WHERE kind = $1")
            .bind(kind)
            .fetch_optional(&self.pool)
            .await?;
        Ok(paused.unwrap_or(false))
    }

    /// Remove completed/failed jobs of `kind` older than `older_than` (§4.3 "clean").
    pub async fn clean(&self, kind: JobKind, older_than: chrono::Duration, state: JobState) -> Result<u64> {
        let cutoff: DateTime<Utc> = Utc::now() - older_than;
        let result = sqlx::query("DELETE FROM jobs WHERE kind = $1 AND state = $2 AND updated_at < $3")
            .bind(kind)
            .bind(state)
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn queue_stats_serialize_roundtrip() {
        let stats = QueueStats {
            waiting: 1,
            delayed: 0,
            active: 2,
            completed: 5,
            failed: 0,
            paused: false,
        };
        let json = serde_json::to_string(&stats).unwrap();
        assert!(json.contains("waiting"));
    }
}
