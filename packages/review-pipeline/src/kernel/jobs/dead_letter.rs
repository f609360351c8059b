//! Dead-letter manager (D) — §4.4.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;

use super::job::{Job, JobKind};
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct DeadLetter {
    pub id: Uuid,
    pub original_job_id: Uuid,
    pub kind: JobKind,
    pub original_payload: serde_json::Value,
    pub failure_reason: String,
    pub failure_stack: Option<String>,
    pub attempts_made: i32,
    pub failed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeadLetterStats {
    pub total: i64,
    pub by_failure_reason: Vec<(String, i64)>,
    pub oldest_failure: Option<DateTime<Utc>>,
    pub newest_failure: Option<DateTime<Utc>>,
}

pub struct DeadLetterManager {
    pool: PgPool,
}

impl DeadLetterManager {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Insert a dead-letter record. Called as the first durable step of a
    /// terminal failure, before the originating job row transitions out of
    /// `active` (§4.4 atomicity guarantee).
    pub async fn insert(&self, job: &Job, reason: &str, attempts_made: i32) -> anyhow::Result<Uuid> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO dead_letters (
                id, original_job_id, kind, original_payload, failure_reason,
                failure_stack, attempts_made, failed_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8)
            "#,
        )
        .bind(id)
        .bind(job.id)
        .bind(job.kind)
        .bind(&job.payload)
        .bind(reason)
        .bind(None::<String>)
        .bind(attempts_made)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Metrics::job_dead_lettered(job.kind);
        Ok(id)
    }

    pub async fn get_dead_letters(&self, kind: JobKind, limit: i64) -> anyhow::Result<Vec<DeadLetter>> {
        let rows = sqlx::query_as::<_, DeadLetter>(
            r#"
            SELECT id, original_job_id, kind, original_payload, failure_reason,
                   failure_stack, attempts_made, failed_at
            FROM dead_letters
            WHERE kind = $1
            ORDER BY failed_at DESC
            LIMIT $2
            "#,
        )
        .bind(kind)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn stats(&self, kind: JobKind) -> anyhow::Result<DeadLetterStats> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM dead_letters WHERE kind = $1")
            .bind(kind)
            .fetch_one(&self.pool)
            .await?;

        let by_reason: Vec<(String, i64)> = sqlx::query_as(
            r#"SELECT failure_reason, COUNT(*) FROM dead_letters WHERE kind = $1
               GROUP BY failure_reason ORDER BY COUNT(*) DESC"#,
        )
        .bind(kind)
        .fetch_all(&self.pool)
        .await?;

        let bounds: (Option<DateTime<Utc>>, Option<DateTime<Utc>>) = sqlx::query_as(
            "SELECT MIN(failed_at), MAX(failed_at) FROM dead_letters WHERE kind = $1",
        )
        .bind(kind)
        .fetch_one(&self.pool)
        .await?;

        Ok(DeadLetterStats {
            total,
            by_failure_reason: by_reason,
            oldest_failure: bounds.0,
            newest_failure: bounds.1,
        })
    }

    /// Re-enqueue the original payload with `attemptsMade = 0`, removing the
    /// DLQ record (§4.4 `replay`).
    pub async fn replay(&self, dlq_id: Uuid) -> anyhow::Result<Uuid> {
        let dead_letter = sqlx::query_as::<_, DeadLetter>(
            r#"SELECT id, original_job_id, kind, original_payload, failure_reason,
                      failure_stack, attempts_made, failed_at
               FROM dead_letters WHERE id = $1"#,
        )
        .bind(dlq_id)
        .fetch_one(&self.pool)
        .await?;

        let new_job = Job::new(
            dead_letter.kind,
            dead_letter.original_payload,
            5,
            dead_letter.kind.default_max_attempts(),
            None,
            None,
        );

        sqlx::query(
            r#"
            INSERT INTO jobs (
                id, kind, payload, priority, attempts_made, max_attempts, state,
                progress, reserved_by, reserved_until, delay_until, correlation_id,
                last_error, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,0,$5,$6,0,NULL,NULL,NULL,$7,NULL,$8,$9)
            "#,
        )
        .bind(new_job.id)
        .bind(new_job.kind)
        .bind(&new_job.payload)
        .bind(new_job.priority)
        .bind(new_job.max_attempts)
        .bind(new_job.state)
        .bind(new_job.correlation_id)
        .bind(new_job.created_at)
        .bind(new_job.updated_at)
        .execute(&self.pool)
        .await?;

        sqlx::query("DELETE FROM dead_letters WHERE id = $1")
            .bind(dlq_id)
            .execute(&self.pool)
            .await?;

        Ok(new_job.id)
    }

    /// Bulk replay filtered by a substring of `failure_reason` (§4.4 `replayByReason`).
    pub async fn replay_by_reason(
        &self,
        kind: JobKind,
        reason_substring: &str,
        max_jobs: i64,
    ) -> anyhow::Result<Vec<Uuid>> {
        let pattern = format!("%{reason_substring}%");
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"SELECT id FROM dead_letters WHERE kind = $1 AND failure_reason ILIKE $2
               ORDER BY failed_at DESC LIMIT $3"#,
        )
        .bind(kind)
        .bind(pattern)
        .bind(max_jobs)
        .fetch_all(&self.pool)
        .await?;

        let mut new_job_ids = Vec::with_capacity(ids.len());
        for id in ids {
            new_job_ids.push(self.replay(id).await?);
        }
        Ok(new_job_ids)
    }

    /// TTL cleanup, scheduled periodically by the lifecycle supervisor (§4.4, §4.9).
    pub async fn sweep(&self, older_than: chrono::Duration) -> anyhow::Result<u64> {
        let cutoff = Utc::now() - older_than;
        let result = sqlx::query("DELETE FROM dead_letters WHERE failed_at < $1")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
