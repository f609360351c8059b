//! Job processors: the actual business logic dispatched by the registry.

pub mod label;
pub mod scrape;
pub mod stubs;

use crate::kernel::jobs::job::JobKind;
use crate::kernel::jobs::registry::JobRegistry;

/// Register every processor against its job kind. Called once at process start.
pub fn register_all(registry: &mut JobRegistry) {
    registry.register(JobKind::Scrape, |payload, ctx, progress, cancel| async move {
        scrape::run(payload, ctx, progress, cancel).await
    });
    registry.register(JobKind::Label, |payload, ctx, progress, cancel| async move {
        label::run(payload, ctx, progress, cancel).await
    });
    registry.register(JobKind::ProcessResults, |payload, ctx, progress, cancel| async move {
        stubs::process_results(payload, ctx, progress, cancel).await
    });
    registry.register(JobKind::Cleanup, |payload, ctx, progress, cancel| async move {
        stubs::cleanup(payload, ctx, progress, cancel).await
    });
    registry.register(JobKind::Export, |payload, ctx, progress, cancel| async move {
        stubs::export(payload, ctx, progress, cancel).await
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_all_populates_every_kind() {
        let mut registry = JobRegistry::new();
        register_all(&mut registry);
        assert!(registry.is_registered(JobKind::Scrape));
        assert!(registry.is_registered(JobKind::Label));
        assert!(registry.is_registered(JobKind::ProcessResults));
        assert!(registry.is_registered(JobKind::Cleanup));
        assert!(registry.is_registered(JobKind::Export));
    }
}
