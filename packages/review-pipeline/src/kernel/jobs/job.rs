//! Job record and state machine (§3 "Job record", §4.3).

use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_kind", rename_all = "snake_case")]
pub enum JobKind {
    Scrape,
    Label,
    ProcessResults,
    Cleanup,
    Export,
}

impl JobKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobKind::Scrape => "SCRAPE",
            JobKind::Label => "LABEL",
            JobKind::ProcessResults => "PROCESS_RESULTS",
            JobKind::Cleanup => "CLEANUP",
            JobKind::Export => "EXPORT",
        }
    }

    /// Default `maxAttempts` per kind (§3: "default 3; 2 for LABEL").
    pub fn default_max_attempts(&self) -> i32 {
        match self {
            JobKind::Label => 2,
            _ => 3,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "job_state", rename_all = "snake_case")]
pub enum JobState {
    Waiting,
    Delayed,
    Active,
    Completed,
    Failed,
    Dead,
}

/// Error classification governing retry behavior (§7 error taxonomy).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "error_kind", rename_all = "snake_case")]
pub enum ErrorKind {
    Transient,
    RateLimited,
    Permanent,
    InvalidPayload,
    Cancelled,
}

impl ErrorKind {
    /// Whether this error kind should trigger a retry, given attempts remain.
    pub fn should_retry(&self) -> bool {
        matches!(self, ErrorKind::Transient | ErrorKind::RateLimited)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transient => "transient",
            ErrorKind::RateLimited => "rate_limited",
            ErrorKind::Permanent => "permanent",
            ErrorKind::InvalidPayload => "invalid_payload",
            ErrorKind::Cancelled => "cancelled",
        }
    }
}

/// Exponential backoff with jitter (§4.3): `base * 2^(attempts-1)`, ±25% jitter,
/// capped at 5 minutes.
pub fn backoff_delay(base: chrono::Duration, attempts_made: i32) -> chrono::Duration {
    let base_secs = base.num_milliseconds().max(1) as f64 / 1000.0;
    let exp = 2f64.powi((attempts_made - 1).max(0));
    let raw_secs = (base_secs * exp).min(300.0);

    let jitter_frac = rand::thread_rng().gen_range(-0.25..=0.25);
    let jittered = (raw_secs * (1.0 + jitter_frac)).clamp(0.0, 300.0);

    chrono::Duration::milliseconds((jittered * 1000.0) as i64)
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Job {
    pub id: Uuid,
    pub kind: JobKind,
    pub payload: serde_json::Value,
    pub priority: i16,
    pub attempts_made: i32,
    pub max_attempts: i32,
    pub state: JobState,
    pub progress: i16,
    pub reserved_by: Option<String>,
    pub reserved_until: Option<DateTime<Utc>>,
    pub delay_until: Option<DateTime<Utc>>,
    pub correlation_id: Uuid,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(
        kind: JobKind,
        payload: serde_json::Value,
        priority: i16,
        max_attempts: i32,
        delay: Option<chrono::Duration>,
        correlation_id: Option<Uuid>,
    ) -> Self {
        let now = Utc::now();
        let delay_until = delay.filter(|d| *d > chrono::Duration::zero()).map(|d| now + d);
        Self {
            id: Uuid::new_v4(),
            kind,
            payload,
            priority,
            attempts_made: 0,
            max_attempts,
            state: if delay_until.is_some() {
                JobState::Delayed
            } else {
                JobState::Waiting
            },
            progress: 0,
            reserved_by: None,
            reserved_until: None,
            delay_until,
            correlation_id: correlation_id.unwrap_or_else(Uuid::new_v4),
            last_error: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_ready(&self) -> bool {
        match self.state {
            JobState::Waiting => true,
            JobState::Delayed => self.delay_until.map(|at| at <= Utc::now()).unwrap_or(true),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_max_attempts_per_kind() {
        assert_eq!(JobKind::Scrape.default_max_attempts(), 3);
        assert_eq!(JobKind::Label.default_max_attempts(), 2);
        assert_eq!(JobKind::Cleanup.default_max_attempts(), 3);
    }

    #[test]
    fn retryable_kinds_should_retry() {
        assert!(ErrorKind::Transient.should_retry());
        assert!(ErrorKind::RateLimited.should_retry());
        assert!(!ErrorKind::Permanent.should_retry());
        assert!(!ErrorKind::InvalidPayload.should_retry());
        assert!(!ErrorKind::Cancelled.should_retry());
    }

    #[test]
    fn backoff_grows_exponentially_and_caps() {
        let base = chrono::Duration::seconds(2);
        let d1 = backoff_delay(base, 1).num_milliseconds() as f64 / 1000.0;
        let d2 = backoff_delay(base, 2).num_milliseconds() as f64 / 1000.0;
        // with jitter, just assert rough ordering and the 5-minute cap
        assert!(d1 <= 2.5);
        assert!(d2 <= 6.0);

        let huge = backoff_delay(base, 20).num_milliseconds() as f64 / 1000.0;
        assert!(huge <= 300.0 * 1.25 + 0.001);
    }

    #[test]
    fn new_job_without_delay_starts_waiting() {
        let job = Job::new(JobKind::Scrape, serde_json::json!({}), 5, 3, None, None);
        assert_eq!(job.state, JobState::Waiting);
        assert!(job.is_ready());
    }

    #[test]
    fn new_job_with_delay_starts_delayed_and_not_ready() {
        let job = Job::new(
            JobKind::Scrape,
            serde_json::json!({}),
            5,
            3,
            Some(chrono::Duration::seconds(60)),
            None,
        );
        assert_eq!(job.state, JobState::Delayed);
        assert!(!job.is_ready());
    }
}
