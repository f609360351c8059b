//! Prometheus metrics exposition (§4.8), via the `metrics` facade crate and
//! `metrics-exporter-prometheus`.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::kernel::jobs::job::JobKind;

/// Thin handle kept on `AppContext`; the actual registry lives in the
/// global `metrics` facade, this just owns the Prometheus renderer.
#[derive(Clone)]
pub struct Metrics {
    handle: PrometheusHandle,
}

impl Metrics {
    pub fn install() -> anyhow::Result<Self> {
        let handle = PrometheusBuilder::new()
            .install_recorder()
            .map_err(|e| anyhow::anyhow!("failed to install prometheus recorder: {e}"))?;
        Ok(Self { handle })
    }

    /// Render the current metrics snapshot in Prometheus text exposition
    /// format, for the `/metrics` endpoint.
    pub fn render(&self) -> String {
        self.handle.render()
    }

    pub fn job_reserved(kind: JobKind) {
        metrics::counter!("jobs_reserved_total", "kind" => kind.as_str()).increment(1);
    }

    pub fn job_completed(kind: JobKind, duration_ms: u64) {
        metrics::counter!("jobs_completed_total", "kind" => kind.as_str()).increment(1);
        metrics::histogram!("job_duration_ms", "kind" => kind.as_str()).record(duration_ms as f64);
    }

    pub fn job_failed(kind: JobKind, error_kind: &str) {
        metrics::counter!("jobs_failed_total", "kind" => kind.as_str(), "error_kind" => error_kind.to_string())
            .increment(1);
    }

    pub fn job_dead_lettered(kind: JobKind) {
        metrics::counter!("jobs_dead_lettered_total", "kind" => kind.as_str()).increment(1);
    }

    pub fn queue_depth(kind: JobKind, state: &str, depth: i64) {
        metrics::gauge!("queue_depth", "kind" => kind.as_str(), "state" => state.to_string())
            .set(depth as f64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn install_does_not_panic() {
        // installing twice in the same test binary is harmless; the
        // recorder is process-global and idempotent enough for this check.
        let _ = Metrics::install();
    }
}
