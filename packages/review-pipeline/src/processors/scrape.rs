//! Scrape processor (F) — §4.6.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{error, warn};

use crate::domain::{App, Review};
use crate::kernel::app_context::AppContext;
use crate::kernel::jobs::payloads::ScrapePayload;
use crate::kernel::jobs::{JobReport, ProcessorError, ProgressReporter};
use crate::repository::ReviewRepository;

pub async fn run(
    payload: serde_json::Value,
    ctx: Arc<AppContext>,
    progress: ProgressReporter,
    cancel: CancellationToken,
) -> Result<JobReport, ProcessorError> {
    let payload: ScrapePayload = serde_json::from_value(payload)
        .map_err(|e| ProcessorError::InvalidPayload(e.to_string()))?;
    let payload = payload
        .validate()
        .map_err(|e| ProcessorError::InvalidPayload(e.to_string()))?;

    // Step 1: resolve appInfo, tolerating failure.
    let app_info = ctx
        .catalog
        .app(&payload.app_id, &payload.countries[0])
        .await
        .unwrap_or_else(|e| {
            warn!(app_id = %payload.app_id, error = %e, "failed to resolve app info, using unknown");
            crate::kernel::catalog_client::AppInfo::unknown()
        });
    progress.report(10).await;

    // Step 2: upsert App. Irrecoverable here fails the whole job.
    let repo = ReviewRepository::new(&ctx.db);
    let _app: App = repo
        .upsert_app(&payload.app_id, &app_info)
        .await
        .map_err(|e| ProcessorError::Transient(format!("failed to upsert app: {e}")))?;
    progress.report(20).await;

    // Step 3: in-memory dedupe map, later observations win.
    let mut acc: BTreeMap<String, Review> = BTreeMap::new();
    progress.report(30).await;

    let pairs: Vec<(crate::kernel::jobs::payloads::SortMethod, &String)> = payload
        .sort_methods
        .iter()
        .copied()
        .flat_map(|sort| payload.countries.iter().map(move |country| (sort, country)))
        .collect();

    let total_pairs = pairs.len().max(1);
    let max_pages = payload.pages.min(10);

    for (idx, (sort, country)) in pairs.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ProcessorError::Cancelled);
        }

        for page in 1..=max_pages {
            let raw_reviews = match ctx
                .catalog
                .reviews(&payload.app_id, country, page, *sort, Duration::from_millis(payload.throttle_ms))
                .await
            {
                Ok(reviews) => reviews,
                Err(e) => {
                    // Per-(sort,country) error: log and move to the next pair.
                    error!(app_id = %payload.app_id, country = %country, ?sort, page, error = %e, "scrape page fetch failed, skipping pair");
                    break;
                }
            };

            if raw_reviews.is_empty() {
                break;
            }

            for raw in raw_reviews {
                let review = Review::normalize(raw, &payload.app_id, country);
                acc.insert(review.id.clone(), review);
            }
        }

        let pair_progress = 30 + ((idx + 1) * 60 / total_pairs) as i16;
        progress.report(pair_progress.min(90)).await;
    }

    // Step 6: batched persistence.
    let reviews: Vec<Review> = acc.into_values().collect();
    let persisted = repo
        .upsert_reviews(&reviews)
        .await
        .map_err(|e| ProcessorError::Transient(format!("failed to persist reviews: {e}")))?;
    progress.report(95).await;

    let result = serde_json::json!({
        "reviewsScraped": persisted,
        "countriesProcessed": payload.countries,
        "sortMethodsUsed": payload.sort_methods,
        "appTitle": app_info.title,
    });
    progress.report(100).await;

    Ok(JobReport::success(persisted as i64, result))
}
