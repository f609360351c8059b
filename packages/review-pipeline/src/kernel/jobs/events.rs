//! Job lifecycle events, used for structured logging and metrics (§4.8).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::job::{ErrorKind, JobKind};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum JobEvent {
    Enqueued {
        job_id: Uuid,
        kind: JobKind,
        correlation_id: Uuid,
    },
    Started {
        job_id: Uuid,
        kind: JobKind,
        correlation_id: Uuid,
        worker_id: String,
        attempt: i32,
    },
    Succeeded {
        job_id: Uuid,
        kind: JobKind,
        correlation_id: Uuid,
        duration_ms: u64,
        items_processed: i64,
    },
    Failed {
        job_id: Uuid,
        kind: JobKind,
        correlation_id: Uuid,
        error: String,
        error_kind: ErrorKind,
        attempt: i32,
        will_retry: bool,
    },
    DeadLettered {
        job_id: Uuid,
        kind: JobKind,
        correlation_id: Uuid,
        total_attempts: i32,
        final_error: String,
    },
    Stalled {
        job_id: Uuid,
        kind: JobKind,
        old_worker_id: Option<String>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_enqueued_serializes() {
        let event = JobEvent::Enqueued {
            job_id: Uuid::new_v4(),
            kind: JobKind::Scrape,
            correlation_id: Uuid::new_v4(),
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("Enqueued"));
    }

    #[test]
    fn event_failed_serializes_with_retry_flag() {
        let event = JobEvent::Failed {
            job_id: Uuid::new_v4(),
            kind: JobKind::Label,
            correlation_id: Uuid::new_v4(),
            error: "timeout".to_string(),
            error_kind: ErrorKind::Transient,
            attempt: 1,
            will_retry: true,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("will_retry"));
        assert!(json.contains("true"));
    }

    #[test]
    fn events_roundtrip() {
        let events = vec![
            JobEvent::Enqueued {
                job_id: Uuid::new_v4(),
                kind: JobKind::Scrape,
                correlation_id: Uuid::new_v4(),
            },
            JobEvent::DeadLettered {
                job_id: Uuid::new_v4(),
                kind: JobKind::Label,
                correlation_id: Uuid::new_v4(),
                total_attempts: 2,
                final_error: "no reviews found".into(),
            },
        ];
        for event in events {
            let json = serde_json::to_string(&event).unwrap();
            let _: JobEvent = serde_json::from_str(&json).unwrap();
        }
    }
}
