//! One-shot CLI: enqueue a SCRAPE job for an app and exit (`SCRAPER_MODE=create-jobs`).

use anyhow::{Context, Result};
use clap::Parser;
use review_pipeline::config::Config;
use review_pipeline::kernel::jobs::dead_letter::DeadLetterManager;
use review_pipeline::kernel::jobs::payloads::{ScrapePayload, SortMethod};
use review_pipeline::kernel::jobs::queue::JobQueue;
use review_pipeline::observability::logging;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[derive(Parser)]
#[command(about = "Enqueue a SCRAPE job for an app")]
struct Args {
    #[arg(long)]
    app_id: String,

    #[arg(long, value_delimiter = ',', default_value = "US")]
    countries: Vec<String>,

    #[arg(long, default_value_t = 5)]
    pages: u32,

    #[arg(long, default_value_t = 500)]
    throttle_ms: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    logging::init(&config);

    let args = Args::parse();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let dead_letters = Arc::new(DeadLetterManager::new(pool.clone()));
    let queue = JobQueue::new(pool, dead_letters);

    let payload = ScrapePayload {
        app_id: args.app_id,
        countries: args.countries,
        pages: args.pages,
        sort_methods: vec![SortMethod::Recent],
        throttle_ms: args.throttle_ms,
        correlation_id: None,
        priority: 5,
        max_attempts: 3,
        delay_ms: 0,
    }
    .validate()
    .context("invalid scrape payload")?;

    let job_id = queue.enqueue(&payload, None).await.context("failed to enqueue job")?;
    tracing::info!(%job_id, "enqueued scrape job");
    println!("{job_id}");

    Ok(())
}
