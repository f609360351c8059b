//! One-shot catch-up CLI over unlabeled reviews (`LABELER_MODE=process-unlabeled`).

use anyhow::{Context, Result};
use clap::Parser;
use review_pipeline::config::Config;
use review_pipeline::kernel::app_context::AppContext;
use review_pipeline::observability::{logging, metrics::Metrics};
use review_pipeline::processors::label;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[derive(Parser)]
#[command(about = "Classify up to --limit unlabeled reviews")]
struct Args {
    #[arg(long, default_value_t = 100)]
    limit: i64,

    #[arg(long, default_value = "gpt-4o-mini")]
    model: String,
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

    let metrics = Metrics::install().context("failed to install metrics recorder")?;
    let ctx = Arc::new(AppContext::from_config(&config, pool, metrics)?);

    let report = label::process_unlabeled(ctx, args.limit, &args.model)
        .await
        .map_err(|e| anyhow::anyhow!("process_unlabeled failed: {e}"))?;

    tracing::info!(?report.data, "process_unlabeled complete");
    println!("{}", serde_json::to_string_pretty(&report.data)?);

    Ok(())
}
