//! Observability surface (§4.8): structured logging, health checks, metrics.

pub mod health;
pub mod logging;
pub mod metrics;

pub use health::{HealthReport, HealthStatus, QueueMonitorReport};
pub use metrics::Metrics;
