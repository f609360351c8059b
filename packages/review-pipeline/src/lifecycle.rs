//! Lifecycle supervisor (I) — §4.9: ordered shutdown on SIGTERM/SIGINT/SIGHUP,
//! plus periodic dead-letter sweeping.

use std::sync::Arc;
use std::time::Duration;

use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info, warn};

use crate::kernel::jobs::dead_letter::DeadLetterManager;
use crate::kernel::jobs::job::JobKind;
use crate::kernel::jobs::queue::JobQueue;
use crate::kernel::jobs::runner::WorkerRuntime;
use crate::observability::metrics::Metrics;

/// Registered worker runtimes plus the resources shutdown needs to close, in
/// the order §4.9 lists them.
pub struct Supervisor {
    workers: Vec<Arc<WorkerRuntime>>,
    db: sqlx::PgPool,
    shutdown_grace: Duration,
    shutdown_timeout: Duration,
}

impl Supervisor {
    pub fn new(
        workers: Vec<Arc<WorkerRuntime>>,
        db: sqlx::PgPool,
        shutdown_grace: Duration,
        shutdown_timeout: Duration,
    ) -> Self {
        Self {
            workers,
            db,
            shutdown_grace,
            shutdown_timeout,
        }
    }

    /// Wait for a termination signal, then run the ordered shutdown sequence.
    /// Force-exits with status 1 if the whole sequence exceeds `shutdown_timeout`.
    pub async fn run_until_signal(self) {
        wait_for_signal().await;
        info!("shutdown signal received, draining");

        let shutdown_timeout = self.shutdown_timeout;
        let sequence = self.shutdown_sequence();
        if tokio::time::timeout(shutdown_timeout, sequence).await.is_err() {
            error!("shutdown exceeded timeout, forcing exit");
            std::process::exit(1);
        }
    }

    async fn shutdown_sequence(self) {
        // Steps 1-2: health monitor loop and new reservations are governed by
        // the same cancellation tokens; cancel all worker runtimes so they
        // stop pulling new jobs but finish what's in flight.
        for worker in &self.workers {
            worker.stop_new_reservations();
        }
        info!("stopped accepting new reservations");

        // Step 3: drain, bounded by shutdown_grace. In-flight jobs whose
        // runtime doesn't observe cancellation in time revert to `waiting`
        // via the stalled-reservation rule once their visibility expires.
        tokio::time::sleep(self.shutdown_grace).await;
        info!("drain window elapsed");

        // Steps 4-5: close the DB pool (there is no separate broker client;
        // Postgres plays both roles here).
        self.db.close().await;
        info!("database pool closed");

        // Step 6: flush logs — tracing writers flush on drop, nothing to do
        // explicitly for the stdout/json layers this process uses.
    }
}

async fn wait_for_signal() {
    let mut sigterm = signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut sighup = signal(SignalKind::hangup()).expect("failed to install SIGHUP handler");

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
        _ = sighup.recv() => {}
    }
}

/// Periodic dead-letter TTL sweep, scheduled by the lifecycle supervisor
/// (§4.4 `sweep`, SPEC_FULL "supplemented features"). Runs until the given
/// token is cancelled.
pub async fn run_dlq_sweeper(
    dead_letters: Arc<DeadLetterManager>,
    interval: Duration,
    retention: chrono::Duration,
    shutdown: tokio_util::sync::CancellationToken,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                match dead_letters.sweep(retention).await {
                    Ok(removed) if removed > 0 => info!(removed, "swept expired dead letters"),
                    Ok(_) => {}
                    Err(e) => warn!(error = %e, "dead-letter sweep failed"),
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}

const ALL_KINDS: [JobKind; 5] = [
    JobKind::Scrape,
    JobKind::Label,
    JobKind::ProcessResults,
    JobKind::Cleanup,
    JobKind::Export,
];

/// Periodically refresh the `queue_depth` gauge so `/metrics` reflects
/// current backlog without a scrape-time DB round trip (§4.8 backpressure).
pub async fn run_queue_depth_refresher(
    queue: Arc<JobQueue>,
    interval: Duration,
    shutdown: tokio_util::sync::CancellationToken,
) {
    loop {
        tokio::select! {
            _ = tokio::time::sleep(interval) => {
                for kind in ALL_KINDS {
                    match queue.stats(kind).await {
                        Ok(stats) => {
                            Metrics::queue_depth(kind, "waiting", stats.waiting + stats.delayed);
                            Metrics::queue_depth(kind, "active", stats.active);
                            Metrics::queue_depth(kind, "failed", stats.failed);
                        }
                        Err(e) => warn!(kind = kind.as_str(), error = %e, "failed to refresh queue depth gauge"),
                    }
                }
            }
            _ = shutdown.cancelled() => break,
        }
    }
}
