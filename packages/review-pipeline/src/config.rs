//! Environment-sourced configuration (§6 Configuration).
//!
//! Constructed once at process start and passed explicitly down through the
//! call graph — no self-initializing singletons (see `SPEC_FULL.md` §9).

use anyhow::{Context, Result};
use dotenvy::dotenv;
use std::env;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

/// Which mode the scrape-side process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScraperMode {
    /// Long-running worker that reserves and executes SCRAPE jobs.
    Worker,
    /// One-shot CLI invocation that enqueues SCRAPE jobs and exits.
    CreateJobs,
}

/// Which mode the label-side process runs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LabelerMode {
    /// Long-running worker that reserves and executes LABEL jobs.
    Worker,
    /// One-shot catch-up pass over unlabeled reviews.
    ProcessUnlabeled,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: String,
    pub log_level: LogLevel,
    pub log_format: LogFormat,
    pub database_url: String,
    pub redis_url: Option<String>,
    pub openai_api_key: Option<String>,
    pub scraper_mode: ScraperMode,
    pub labeler_mode: LabelerMode,
    pub memory_limit_mb: Option<u64>,
    pub port: u16,
    pub shutdown_grace: Duration,
    pub shutdown_timeout: Duration,
}

impl Config {
    /// Load configuration from environment variables. Exits the caller with
    /// a clear message (via the returned `Err`) if a required variable is
    /// absent, per §6.
    pub fn from_env() -> Result<Self> {
        let _ = dotenv();

        let environment = env::var("NODE_ENV")
            .or_else(|_| env::var("ENV"))
            .unwrap_or_else(|_| "development".to_string());

        let log_level = match env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()).as_str() {
            "debug" => LogLevel::Debug,
            "warn" => LogLevel::Warn,
            "error" => LogLevel::Error,
            _ => LogLevel::Info,
        };

        let log_format = match env::var("LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()).as_str() {
            "json" => LogFormat::Json,
            _ => LogFormat::Pretty,
        };

        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let redis_url = env::var("REDIS_URL").ok();
        let openai_api_key = env::var("OPENAI_API_KEY").ok();

        let scraper_mode = match env::var("SCRAPER_MODE").unwrap_or_else(|_| "worker".to_string()).as_str() {
            "create-jobs" => ScraperMode::CreateJobs,
            "worker" => ScraperMode::Worker,
            other => anyhow::bail!("SCRAPER_MODE must be 'worker' or 'create-jobs', got '{other}'"),
        };

        let labeler_mode = match env::var("LABELER_MODE").unwrap_or_else(|_| "worker".to_string()).as_str() {
            "process-unlabeled" => LabelerMode::ProcessUnlabeled,
            "worker" => LabelerMode::Worker,
            other => anyhow::bail!("LABELER_MODE must be 'worker' or 'process-unlabeled', got '{other}'"),
        };

        if openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set; LABEL jobs will fail fast when attempted");
        }

        let memory_limit_mb = env::var("MEMORY_LIMIT")
            .ok()
            .map(|v| v.parse::<u64>())
            .transpose()
            .context("MEMORY_LIMIT must be a valid number")?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .context("PORT must be a valid number")?;

        Ok(Self {
            environment,
            log_level,
            log_format,
            database_url,
            redis_url,
            openai_api_key,
            scraper_mode,
            labeler_mode,
            memory_limit_mb,
            port,
            shutdown_grace: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        })
    }

    pub fn require_openai_api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .context("OPENAI_API_KEY must be set to run LABEL jobs")
    }
}
