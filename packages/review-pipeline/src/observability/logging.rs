//! Structured logging setup (§4.8): one subscriber, JSON or pretty
//! formatting, correlation id carried as a tracing field rather than
//! threaded through every log call manually.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::{Config, LogFormat};

/// Initialize the global tracing subscriber from configuration. Call once,
/// at process start, before anything else logs.
pub fn init(config: &Config) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("{},sqlx=warn", config.log_level.as_str()).into()
    });

    let registry = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
        LogFormat::Pretty => registry.with(tracing_subscriber::fmt::layer()).init(),
    }

    tracing::info!(
        environment = %config.environment,
        log_format = ?config.log_format,
        "logging initialized"
    );
}

/// A correlation id attached to every log line emitted within its scope
/// (§9 "correlation propagation"). Held as a tracing span guard.
pub fn correlation_span(correlation_id: uuid::Uuid) -> tracing::Span {
    tracing::info_span!("job", correlation_id = %correlation_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn correlation_span_carries_id() {
        let id = uuid::Uuid::new_v4();
        let span = correlation_span(id);
        assert_eq!(span.metadata().unwrap().name(), "job");
    }
}
