//! Job infrastructure: durable queue (A/C), codec (B), dead-letter manager (D),
//! worker runtime (E), and lifecycle events.

pub mod dead_letter;
pub mod events;
pub mod job;
pub mod payloads;
pub mod queue;
pub mod registry;
pub mod runner;

pub use dead_letter::{DeadLetter, DeadLetterManager, DeadLetterStats};
pub use events::JobEvent;
pub use job::{backoff_delay, ErrorKind, Job, JobKind, JobState};
pub use payloads::{CleanupPayload, CommandMeta, ExportPayload, LabelPayload, ProcessResultsPayload, ScrapePayload};
pub use queue::{JobQueue, QueueStats, Reservation};
pub use registry::JobRegistry;
pub use runner::{WorkerConfig, WorkerRuntime};

use serde::Serialize;

/// Result of a processor run (§7 "every job result carries ...").
#[derive(Debug, Clone, Serialize, Default)]
pub struct JobReport {
    pub success: bool,
    pub message: Option<String>,
    pub data: Option<serde_json::Value>,
    pub items_processed: i64,
}

impl JobReport {
    pub fn success(items_processed: i64, data: serde_json::Value) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
            items_processed,
        }
    }
}

/// Error raised by a processor, classified per §7's error taxonomy.
#[derive(Debug, thiserror::Error)]
pub enum ProcessorError {
    #[error("transient: {0}")]
    Transient(String),
    #[error("rate limited: {0}")]
    RateLimited(String),
    #[error("permanent: {0}")]
    Permanent(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("cancelled")]
    Cancelled,
}

impl ProcessorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            ProcessorError::Transient(_) => ErrorKind::Transient,
            ProcessorError::RateLimited(_) => ErrorKind::RateLimited,
            ProcessorError::Permanent(_) => ErrorKind::Permanent,
            ProcessorError::InvalidPayload(_) => ErrorKind::InvalidPayload,
            ProcessorError::Cancelled => ErrorKind::Cancelled,
        }
    }
}

/// Handed to a processor so it can report progress without knowing about
/// the queue's storage details (§4.5 step 4 "forward processor progress").
#[derive(Clone)]
pub struct ProgressReporter {
    queue: std::sync::Arc<JobQueue>,
    job_id: uuid::Uuid,
    visibility_timeout: chrono::Duration,
}

impl ProgressReporter {
    pub fn new(queue: std::sync::Arc<JobQueue>, job_id: uuid::Uuid, visibility_timeout: chrono::Duration) -> Self {
        Self {
            queue,
            job_id,
            visibility_timeout,
        }
    }

    pub async fn report(&self, progress: i16) {
        if let Err(e) = self
            .queue
            .heartbeat(self.job_id, self.visibility_timeout, Some(progress))
            .await
        {
            tracing::warn!(job_id = %self.job_id, error = %e, "failed to report progress");
        }
    }
}
