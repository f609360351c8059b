//! No-op stub processors for `PROCESS_RESULTS`, `CLEANUP`, and `EXPORT`.
//!
//! These kinds have real payload schemas (`kernel::jobs::payloads`) but the
//! distilled feature set never exercises their business logic; they validate
//! their payload, report completion, and succeed. A future iteration can
//! replace the body without touching the queue, registry, or worker runtime.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::kernel::app_context::AppContext;
use crate::kernel::jobs::payloads::{CleanupPayload, ExportPayload, ProcessResultsPayload};
use crate::kernel::jobs::{JobReport, ProcessorError, ProgressReporter};

pub async fn process_results(
    payload: serde_json::Value,
    _ctx: Arc<AppContext>,
    progress: ProgressReporter,
    _cancel: CancellationToken,
) -> Result<JobReport, ProcessorError> {
    let payload: ProcessResultsPayload =
        serde_json::from_value(payload).map_err(|e| ProcessorError::InvalidPayload(e.to_string()))?;
    progress.report(100).await;
    Ok(JobReport::success(0, serde_json::json!({ "jobId": payload.job_id })))
}

pub async fn cleanup(
    payload: serde_json::Value,
    ctx: Arc<AppContext>,
    progress: ProgressReporter,
    _cancel: CancellationToken,
) -> Result<JobReport, ProcessorError> {
    let payload: CleanupPayload =
        serde_json::from_value(payload).map_err(|e| ProcessorError::InvalidPayload(e.to_string()))?;

    let _ = ctx; // real cleanup touches storage through AppContext when implemented
    progress.report(100).await;
    Ok(JobReport::success(
        0,
        serde_json::json!({ "olderThanHours": payload.older_than_hours }),
    ))
}

pub async fn export(
    payload: serde_json::Value,
    _ctx: Arc<AppContext>,
    progress: ProgressReporter,
    _cancel: CancellationToken,
) -> Result<JobReport, ProcessorError> {
    let payload: ExportPayload =
        serde_json::from_value(payload).map_err(|e| ProcessorError::InvalidPayload(e.to_string()))?;
    progress.report(100).await;
    Ok(JobReport::success(
        0,
        serde_json::json!({ "appId": payload.app_id, "format": payload.format }),
    ))
}
