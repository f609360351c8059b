//! Operator CLI: pause/resume a queue, clean old jobs, replay dead letters.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use review_pipeline::config::Config;
use review_pipeline::kernel::jobs::dead_letter::DeadLetterManager;
use review_pipeline::kernel::jobs::job::{JobKind, JobState};
use review_pipeline::kernel::jobs::queue::JobQueue;
use review_pipeline::observability::logging;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;

#[derive(Parser)]
#[command(about = "Operator commands for the review pipeline job queue")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Pause reservations for a job kind.
    Pause { kind: CliJobKind },
    /// Resume reservations for a job kind.
    Resume { kind: CliJobKind },
    /// Delete completed/failed jobs of a kind older than the given hours.
    Clean {
        kind: CliJobKind,
        #[arg(long, default_value_t = 720)]
        older_than_hours: i64,
        #[arg(long, value_enum, default_value = "completed")]
        state: CliJobState,
    },
    /// Show queue and dead-letter stats for a kind.
    Stats { kind: CliJobKind },
    /// Replay a single dead-lettered job by id.
    Replay { dlq_id: uuid::Uuid },
    /// Bulk replay dead letters whose failure reason contains a substring.
    ReplayByReason {
        kind: CliJobKind,
        reason_substring: String,
        #[arg(long, default_value_t = 50)]
        max_jobs: i64,
    },
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliJobKind {
    Scrape,
    Label,
    ProcessResults,
    Cleanup,
    Export,
}

impl From<CliJobKind> for JobKind {
    fn from(value: CliJobKind) -> Self {
        match value {
            CliJobKind::Scrape => JobKind::Scrape,
            CliJobKind::Label => JobKind::Label,
            CliJobKind::ProcessResults => JobKind::ProcessResults,
            CliJobKind::Cleanup => JobKind::Cleanup,
            CliJobKind::Export => JobKind::Export,
        }
    }
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum CliJobState {
    Completed,
    Failed,
}

impl From<CliJobState> for JobState {
    fn from(value: CliJobState) -> Self {
        match value {
            CliJobState::Completed => JobState::Completed,
            CliJobState::Failed => JobState::Failed,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("failed to load configuration")?;
    logging::init(&config);

    let cli = Cli::parse();
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("failed to connect to database")?;

    let dead_letters = Arc::new(DeadLetterManager::new(pool.clone()));
    let queue = JobQueue::new(pool, dead_letters.clone());

    match cli.command {
        Command::Pause { kind } => {
            queue.pause(kind.into()).await?;
            println!("paused");
        }
        Command::Resume { kind } => {
            queue.resume(kind.into()).await?;
            println!("resumed");
        }
        Command::Clean { kind, older_than_hours, state } => {
            let removed = queue
                .clean(kind.into(), chrono::Duration::hours(older_than_hours), state.into())
                .await?;
            println!("removed {removed} jobs");
        }
        Command::Stats { kind } => {
            let kind: JobKind = kind.into();
            let stats = queue.stats(kind).await?;
            let dlq_stats = dead_letters.stats(kind).await?;
            println!("{}", serde_json::to_string_pretty(&serde_json::json!({
                "queue": stats,
                "deadLetters": dlq_stats,
            }))?);
        }
        Command::Replay { dlq_id } => {
            let new_job_id = dead_letters.replay(dlq_id).await?;
            println!("{new_job_id}");
        }
        Command::ReplayByReason { kind, reason_substring, max_jobs } => {
            let new_job_ids = dead_letters
                .replay_by_reason(kind.into(), &reason_substring, max_jobs)
                .await?;
            println!("{}", serde_json::to_string_pretty(&new_job_ids)?);
        }
    }

    Ok(())
}
