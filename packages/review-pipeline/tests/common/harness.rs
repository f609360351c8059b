//! Test harness with testcontainers for integration testing.
//!
//! A single Postgres container is started once and shared across all tests
//! in the binary; migrations run once against it. Each test gets its own
//! connection pool so tests don't interfere with each other's transactions.

use std::sync::Arc;

use anyhow::{Context, Result};
use review_pipeline::kernel::jobs::dead_letter::DeadLetterManager;
use review_pipeline::kernel::jobs::queue::JobQueue;
use sqlx::PgPool;
use testcontainers::runners::AsyncRunner;
use testcontainers::ContainerAsync;
use testcontainers_modules::postgres::Postgres;
use tokio::sync::OnceCell;

struct SharedTestInfra {
    db_url: String,
    _postgres: ContainerAsync<Postgres>,
}

static SHARED_INFRA: OnceCell<SharedTestInfra> = OnceCell::const_new();

impl SharedTestInfra {
    async fn init() -> Result<Self> {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();

        let postgres = Postgres::default()
            .start()
            .await
            .context("failed to start postgres container")?;

        let host = postgres.get_host().await?;
        let port = postgres.get_host_port_ipv4(5432).await?;
        let db_url = format!("postgresql://postgres:postgres@{host}:{port}/postgres");

        let pool = PgPool::connect(&db_url)
            .await
            .context("failed to connect to test database")?;
        sqlx::migrate!("./migrations")
            .run(&pool)
            .await
            .context("failed to run migrations")?;

        Ok(Self {
            db_url,
            _postgres: postgres,
        })
    }

    async fn get() -> &'static Self {
        SHARED_INFRA
            .get_or_init(|| async { Self::init().await.expect("failed to initialize shared test infrastructure") })
            .await
    }
}

/// Owns a fresh pool against the shared Postgres container, plus the queue
/// and dead-letter facades under test.
pub struct TestHarness {
    pub db_pool: PgPool,
    pub queue: JobQueue,
    pub dead_letters: Arc<DeadLetterManager>,
}

impl TestHarness {
    pub async fn new() -> Result<Self> {
        let infra = SharedTestInfra::get().await;
        let db_pool = PgPool::connect(&infra.db_url)
            .await
            .context("failed to connect to test database")?;

        let dead_letters = Arc::new(DeadLetterManager::new(db_pool.clone()));
        let queue = JobQueue::new(db_pool.clone(), dead_letters.clone());

        Ok(Self {
            db_pool,
            queue,
            dead_letters,
        })
    }
}
