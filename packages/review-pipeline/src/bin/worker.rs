//! Long-running worker process: reserves and executes jobs of a single kind
//! determined by `SCRAPER_MODE`/`LABELER_MODE`, serves health/metrics over
//! HTTP, and shuts down on signal (§4.5, §4.8, §4.9).

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::Router;
use review_pipeline::config::{Config, LabelerMode, ScraperMode};
use review_pipeline::kernel::app_context::AppContext;
use review_pipeline::kernel::jobs::dead_letter::DeadLetterManager;
use review_pipeline::kernel::jobs::job::JobKind;
use review_pipeline::kernel::jobs::queue::JobQueue;
use review_pipeline::kernel::jobs::registry::JobRegistry;
use review_pipeline::kernel::jobs::runner::{WorkerConfig, WorkerRuntime};
use review_pipeline::lifecycle::{run_dlq_sweeper, run_queue_depth_refresher, Supervisor};
use review_pipeline::observability::{health, logging, metrics::Metrics};
use review_pipeline::processors;
use sqlx::postgres::PgPoolOptions;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
struct HttpState {
    db: sqlx::PgPool,
    metrics: Metrics,
    queue: Arc<JobQueue>,
    dead_letters: Arc<DeadLetterManager>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    logging::init(&config);

    tracing::info!("starting review pipeline worker");

    let pool = PgPoolOptions::new()
        .max_connections(20)
        .min_connections(2)
        .idle_timeout(std::time::Duration::from_secs(30))
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;
    sqlx::migrate!("./migrations").run(&pool).await.context("failed to run migrations")?;

    let metrics = Metrics::install().context("failed to install metrics recorder")?;
    let ctx = Arc::new(AppContext::from_config(&config, pool.clone(), metrics.clone())?);

    let dead_letters = Arc::new(DeadLetterManager::new(pool.clone()));
    let queue = Arc::new(JobQueue::new(pool.clone(), dead_letters.clone()));

    let mut registry = JobRegistry::new();
    processors::register_all(&mut registry);
    let registry = Arc::new(registry);

    let kinds = worker_kinds(&config);
    tracing::info!(?kinds, "worker active for job kinds");

    let mut runtimes = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let worker_id = format!("{}-{}", kind.as_str().to_lowercase(), uuid::Uuid::new_v4());
        let runtime = Arc::new(WorkerRuntime::new(
            queue.clone(),
            registry.clone(),
            ctx.clone(),
            ctx.rate_limiters.clone(),
            WorkerConfig::for_kind(kind, worker_id),
        ));
        runtimes.push(runtime);
    }

    let mut handles = Vec::with_capacity(runtimes.len());
    for runtime in &runtimes {
        let runtime = runtime.clone();
        handles.push(tokio::spawn(async move { runtime.run().await }));
    }

    let sweeper_shutdown = CancellationToken::new();
    let sweeper_handle = tokio::spawn(run_dlq_sweeper(
        dead_letters.clone(),
        std::time::Duration::from_secs(3600),
        chrono::Duration::days(30),
        sweeper_shutdown.clone(),
    ));
    let gauge_handle = tokio::spawn(run_queue_depth_refresher(
        queue.clone(),
        std::time::Duration::from_secs(15),
        sweeper_shutdown.clone(),
    ));

    let http_state = HttpState {
        db: pool.clone(),
        metrics,
        queue: queue.clone(),
        dead_letters: dead_letters.clone(),
    };
    let app = Router::new()
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .route("/queue", get(queue_handler))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(http_state);
    let listener = tokio::net::TcpListener::bind(("0.0.0.0", config.port))
        .await
        .context("failed to bind http listener")?;
    let server_handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let supervisor = Supervisor::new(runtimes, pool, config.shutdown_grace, config.shutdown_timeout);
    supervisor.run_until_signal().await;

    sweeper_shutdown.cancel();
    server_handle.abort();
    let _ = sweeper_handle.await;
    let _ = gauge_handle.await;
    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("worker shut down cleanly");
    Ok(())
}

fn worker_kinds(config: &Config) -> Vec<JobKind> {
    let mut kinds = Vec::new();
    if matches!(config.scraper_mode, ScraperMode::Worker) {
        kinds.push(JobKind::Scrape);
    }
    if matches!(config.labeler_mode, LabelerMode::Worker) {
        kinds.push(JobKind::Label);
    }
    kinds.push(JobKind::ProcessResults);
    kinds.push(JobKind::Cleanup);
    kinds.push(JobKind::Export);
    kinds
}

async fn livez() -> StatusCode {
    StatusCode::OK
}

async fn readyz(State(state): State<HttpState>) -> (StatusCode, axum::Json<health::HealthReport>) {
    let report = health::readiness(&state.db).await;
    let status = if report.status == health::HealthStatus::Healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, axum::Json(report))
}

async fn metrics_handler(State(state): State<HttpState>) -> String {
    state.metrics.render()
}

async fn queue_handler(
    State(state): State<HttpState>,
) -> Result<axum::Json<health::QueueMonitorReport>, StatusCode> {
    health::queue_snapshot(&state.queue, &state.dead_letters)
        .await
        .map(axum::Json)
        .map_err(|_| StatusCode::INTERNAL_SERVER_ERROR)
}
