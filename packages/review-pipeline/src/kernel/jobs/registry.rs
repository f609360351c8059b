//! Job registry: maps each job kind to its registered processor.
//!
//! Mirrors the host's string-keyed `JobRegistry` (deserialize + dispatch in
//! one step), but keyed by the fixed `JobKind` enum since this pipeline has
//! a closed set of kinds rather than arbitrary domain commands.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use super::job::JobKind;
use super::{JobReport, ProcessorError, ProgressReporter};
use crate::kernel::app_context::AppContext;

type BoxedHandler = Box<
    dyn Fn(
            serde_json::Value,
            Arc<AppContext>,
            ProgressReporter,
            CancellationToken,
        ) -> Pin<Box<dyn Future<Output = Result<JobReport, ProcessorError>> + Send>>
        + Send
        + Sync,
>;

#[derive(Default)]
pub struct JobRegistry {
    handlers: HashMap<JobKind, BoxedHandler>,
}

impl JobRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    pub fn register<F, Fut>(&mut self, kind: JobKind, handler: F)
    where
        F: Fn(serde_json::Value, Arc<AppContext>, ProgressReporter, CancellationToken) -> Fut
            + Send
            + Sync
            + 'static,
        Fut: Future<Output = Result<JobReport, ProcessorError>> + Send + 'static,
    {
        self.handlers.insert(kind, Box::new(move |v, ctx, progress, cancel| {
            Box::pin(handler(v, ctx, progress, cancel))
        }));
    }

    pub async fn dispatch(
        &self,
        kind: JobKind,
        payload: serde_json::Value,
        ctx: Arc<AppContext>,
        progress: ProgressReporter,
        cancel: CancellationToken,
    ) -> Result<JobReport, ProcessorError> {
        let handler = self
            .handlers
            .get(&kind)
            .ok_or_else(|| ProcessorError::Permanent(format!("no processor registered for {:?}", kind)))?;
        handler(payload, ctx, progress, cancel).await
    }

    pub fn is_registered(&self, kind: JobKind) -> bool {
        self.handlers.contains_key(&kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unregistered_kind_has_no_handler() {
        let registry = JobRegistry::new();
        assert!(!registry.is_registered(JobKind::Scrape));
    }

    #[tokio::test]
    async fn registered_handler_is_dispatched() {
        let mut registry = JobRegistry::new();
        registry.register(JobKind::Cleanup, |_v, _ctx, _progress, _cancel| async move {
            Ok(JobReport::success(0, serde_json::json!({})))
        });
        assert!(registry.is_registered(JobKind::Cleanup));
    }
}
