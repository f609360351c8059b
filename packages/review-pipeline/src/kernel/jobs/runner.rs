//! Worker runtime (E): a generic reservation loop across concurrency slots,
//! rate limiting, heartbeats, and cooperative cancellation (§4.5).

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::job::JobKind;
use super::queue::JobQueue;
use super::registry::JobRegistry;
use super::{JobReport, ProcessorError, ProgressReporter};
use crate::kernel::app_context::AppContext;
use crate::kernel::rate_limiter::RateLimiterSet;
use crate::observability::metrics::Metrics;

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub kind: JobKind,
    pub concurrency: usize,
    pub visibility_timeout: chrono::Duration,
    pub heartbeat_interval: Duration,
    pub shutdown_grace: Duration,
    pub poll_interval: Duration,
    pub worker_id: String,
}

impl WorkerConfig {
    pub fn for_kind(kind: JobKind, worker_id: impl Into<String>) -> Self {
        let visibility_timeout = chrono::Duration::seconds(300);
        let heartbeat_interval = Duration::from_secs(30).min(Duration::from_secs(
            (visibility_timeout.num_seconds() / 4).max(1) as u64,
        ));

        Self {
            kind,
            concurrency: match kind {
                JobKind::Scrape => 3,
                JobKind::Label => 2,
                _ => 1,
            },
            visibility_timeout,
            heartbeat_interval,
            shutdown_grace: Duration::from_secs(30),
            poll_interval: Duration::from_secs(2),
            worker_id: worker_id.into(),
        }
    }
}

/// Runs `concurrency` reservation loops for one job kind (§4.5, §5 "Intra-process").
pub struct WorkerRuntime {
    queue: Arc<JobQueue>,
    registry: Arc<JobRegistry>,
    ctx: Arc<AppContext>,
    rate_limiters: Arc<RateLimiterSet>,
    config: WorkerConfig,
    shutdown: CancellationToken,
}

impl WorkerRuntime {
    pub fn new(
        queue: Arc<JobQueue>,
        registry: Arc<JobRegistry>,
        ctx: Arc<AppContext>,
        rate_limiters: Arc<RateLimiterSet>,
        config: WorkerConfig,
    ) -> Self {
        Self {
            queue,
            registry,
            ctx,
            rate_limiters,
            config,
            shutdown: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Stop new reservations but let in-flight slots finish (§4.9 step 2/3).
    pub fn stop_new_reservations(&self) {
        self.shutdown.cancel();
    }

    pub async fn run(self: Arc<Self>) {
        info!(
            kind = self.config.kind.as_str(),
            concurrency = self.config.concurrency,
            "worker runtime starting"
        );

        let permits = Arc::new(Semaphore::new(self.config.concurrency));
        let mut handles = Vec::with_capacity(self.config.concurrency);

        for slot in 0..self.config.concurrency {
            let runtime = self.clone();
            let permits = permits.clone();
            handles.push(tokio::spawn(async move {
                runtime.run_slot(slot, permits).await;
            }));
        }

        for handle in handles {
            let _ = handle.await;
        }

        info!(kind = self.config.kind.as_str(), "worker runtime stopped");
    }

    async fn run_slot(&self, slot: usize, permits: Arc<Semaphore>) {
        loop {
            if self.shutdown.is_cancelled() {
                break;
            }

            // Step 1: acquire a rate-limit token before reserving (§4.5, §5).
            self.rate_limiters.until_ready(self.config.kind).await;

            let _permit = match permits.clone().try_acquire_owned() {
                Ok(p) => p,
                Err(_) => {
                    tokio::time::sleep(self.config.poll_interval).await;
                    continue;
                }
            };

            // Step 2: reserve next job.
            let reservation = match self
                .queue
                .reserve(self.config.kind, &self.config.worker_id, self.config.visibility_timeout)
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    error!(slot, error = %e, "failed to reserve job");
                    tokio::time::sleep(Duration::from_secs(1)).await;
                    continue;
                }
            };

            let Some(reservation) = reservation else {
                tokio::time::sleep(self.config.poll_interval).await;
                continue;
            };

            Metrics::job_reserved(self.config.kind);
            self.execute(reservation.job.id, reservation.job.correlation_id, reservation.job.payload)
                .await;
        }
    }

    async fn execute(&self, job_id: Uuid, correlation_id: Uuid, payload: serde_json::Value) {
        let started = std::time::Instant::now();
        debug!(job_id = %job_id, correlation_id = %correlation_id, kind = self.config.kind.as_str(), "job started");

        let progress = ProgressReporter::new(self.queue.clone(), job_id, self.config.visibility_timeout);
        let job_cancel = self.shutdown.child_token();

        let heartbeat_handle = {
            let queue = self.queue.clone();
            let interval = self.config.heartbeat_interval;
            let visibility_timeout = self.config.visibility_timeout;
            let cancel = job_cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = tokio::time::sleep(interval) => {
                            let _ = queue.heartbeat(job_id, visibility_timeout, None).await;
                        }
                        _ = cancel.cancelled() => break,
                    }
                }
            })
        };

        let result = self
            .registry
            .dispatch(self.config.kind, payload, self.ctx.clone(), progress, job_cancel.clone())
            .await;

        job_cancel.cancel();
        heartbeat_handle.abort();

        match result {
            Ok(JobReport { success: true, items_processed, .. }) => {
                let duration_ms = started.elapsed().as_millis() as u64;
                info!(
                    job_id = %job_id,
                    kind = self.config.kind.as_str(),
                    items_processed,
                    duration_ms,
                    "job completed"
                );
                Metrics::job_completed(self.config.kind, duration_ms);
                if let Err(e) = self.queue.complete(job_id).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job complete");
                }
            }
            Ok(report) => {
                warn!(job_id = %job_id, message = ?report.message, "job reported failure without error");
                Metrics::job_failed(self.config.kind, "transient");
                if let Err(e) = self
                    .queue
                    .fail(job_id, report.message.as_deref().unwrap_or("unknown failure"), super::ErrorKind::Transient)
                    .await
                {
                    error!(job_id = %job_id, error = %e, "failed to mark job failed");
                }
            }
            Err(err) => {
                let kind = err.kind();
                warn!(job_id = %job_id, error = %err, ?kind, "job failed");
                Metrics::job_failed(self.config.kind, kind.as_str());
                if let Err(e) = self.queue.fail(job_id, &err.to_string(), kind).await {
                    error!(job_id = %job_id, error = %e, "failed to mark job failed");
                }
            }
        }
    }
}

/// Classify an unclassified `anyhow` error for the worker boundary (§7):
/// transient on the first two attempts, permanent on the final attempt.
pub fn classify_unclassified(attempts_made: i32, max_attempts: i32) -> ProcessorError {
    if attempts_made + 1 >= max_attempts {
        ProcessorError::Permanent("unclassified error on final attempt".to_string())
    } else {
        ProcessorError::Transient("unclassified error".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn worker_config_defaults_scrape_concurrency() {
        let config = WorkerConfig::for_kind(JobKind::Scrape, "worker-1");
        assert_eq!(config.concurrency, 3);
    }

    #[test]
    fn worker_config_defaults_label_concurrency() {
        let config = WorkerConfig::for_kind(JobKind::Label, "worker-1");
        assert_eq!(config.concurrency, 2);
    }

    #[test]
    fn classify_unclassified_is_permanent_on_final_attempt() {
        let err = classify_unclassified(2, 3);
        assert!(matches!(err, ProcessorError::Permanent(_)));
    }

    #[test]
    fn classify_unclassified_is_transient_before_final_attempt() {
        let err = classify_unclassified(0, 3);
        assert!(matches!(err, ProcessorError::Transient(_)));
    }
}
