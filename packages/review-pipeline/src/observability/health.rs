//! Three-tier health checks (§4.8): liveness, readiness, and a detailed
//! health report combining dependency checks with a per-check timeout.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::PgPool;

use crate::kernel::jobs::dead_letter::{DeadLetterManager, DeadLetterStats};
use crate::kernel::jobs::job::JobKind;
use crate::kernel::jobs::queue::{JobQueue, QueueStats};

const DEPENDENCY_TIMEOUT: Duration = Duration::from_secs(5);

const ALL_KINDS: [JobKind; 5] = [
    JobKind::Scrape,
    JobKind::Label,
    JobKind::ProcessResults,
    JobKind::Cleanup,
    JobKind::Export,
];

#[derive(Debug, Serialize)]
pub struct QueueSnapshot {
    pub kind: JobKind,
    pub stats: QueueStats,
    pub dead_letters: DeadLetterStats,
}

#[derive(Debug, Serialize)]
pub struct QueueMonitorSummary {
    pub total_active: i64,
    pub total_waiting: i64,
    pub total_failed: i64,
    pub total_dlq: i64,
}

/// Single queue-monitor snapshot (§4.8): per-kind stats plus an aggregate
/// summary, the shape an operator dashboard or autoscaler polls.
#[derive(Debug, Serialize)]
pub struct QueueMonitorReport {
    pub timestamp: DateTime<Utc>,
    pub queues: Vec<QueueSnapshot>,
    pub summary: QueueMonitorSummary,
}

/// Combine queue and dead-letter stats across every job kind, for the
/// operator-facing queue monitor (§4.8).
pub async fn queue_snapshot(queue: &JobQueue, dead_letters: &DeadLetterManager) -> anyhow::Result<QueueMonitorReport> {
    let mut queues = Vec::with_capacity(ALL_KINDS.len());
    for kind in ALL_KINDS {
        queues.push(QueueSnapshot {
            kind,
            stats: queue.stats(kind).await?,
            dead_letters: dead_letters.stats(kind).await?,
        });
    }

    let summary = summarize(&queues);

    Ok(QueueMonitorReport {
        timestamp: Utc::now(),
        queues,
        summary,
    })
}

fn summarize(queues: &[QueueSnapshot]) -> QueueMonitorSummary {
    QueueMonitorSummary {
        total_active: queues.iter().map(|q| q.stats.active).sum(),
        total_waiting: queues.iter().map(|q| q.stats.waiting + q.stats.delayed).sum(),
        total_failed: queues.iter().map(|q| q.stats.failed).sum(),
        total_dlq: queues.iter().map(|q| q.dead_letters.total).sum(),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Serialize)]
pub struct DependencyHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: HealthStatus,
    pub dependencies: Vec<DependencyHealth>,
}

/// Liveness: the process is running and able to respond. No dependency
/// checks — a stuck database must not flip this to unhealthy, only
/// readiness should react to that.
pub fn liveness() -> HealthStatus {
    HealthStatus::Healthy
}

/// Readiness: can this instance currently accept and complete work.
pub async fn readiness(db: &PgPool) -> HealthReport {
    let db_health = check_database(db).await;
    let status = if db_health.status == HealthStatus::Healthy {
        HealthStatus::Healthy
    } else {
        HealthStatus::Unhealthy
    };

    HealthReport {
        status,
        dependencies: vec![db_health],
    }
}

async fn check_database(db: &PgPool) -> DependencyHealth {
    match tokio::time::timeout(DEPENDENCY_TIMEOUT, sqlx::query("SELECT 1").execute(db)).await {
        Ok(Ok(_)) => DependencyHealth {
            name: "database".to_string(),
            status: HealthStatus::Healthy,
            error: None,
        },
        Ok(Err(e)) => DependencyHealth {
            name: "database".to_string(),
            status: HealthStatus::Unhealthy,
            error: Some(e.to_string()),
        },
        Err(_) => DependencyHealth {
            name: "database".to_string(),
            status: HealthStatus::Unhealthy,
            error: Some(format!("timed out after {DEPENDENCY_TIMEOUT:?}")),
        },
    }
}
