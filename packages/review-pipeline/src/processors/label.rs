//! Label processor (G) — §4.7.

use std::sync::Arc;
use std::time::Duration;

use llm_client::{ChatRequest, Message};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::domain::{Label, RawLabel, Sentiment};
use crate::kernel::app_context::AppContext;
use crate::kernel::jobs::payloads::LabelPayload;
use crate::kernel::jobs::{JobReport, ProcessorError, ProgressReporter};
use crate::repository::ReviewRepository;

const LLM_TIMEOUT: Duration = Duration::from_secs(120);
const INTER_BATCH_SLEEP: Duration = Duration::from_millis(1000);

/// Catch-up mode (§4.7): select up to `limit` unlabeled reviews and run them
/// through the same classify-sanitize-persist path as targeted mode. Driven
/// by a standalone CLI rather than the job queue, so progress is logged
/// instead of heartbeated.
pub async fn process_unlabeled(
    ctx: Arc<AppContext>,
    limit: i64,
    model: &str,
) -> Result<JobReport, ProcessorError> {
    let repo = ReviewRepository::new(&ctx.db);
    let reviews = repo
        .find_unlabeled(limit)
        .await
        .map_err(|e| ProcessorError::Transient(format!("failed to load unlabeled reviews: {e}")))?;

    if reviews.is_empty() {
        return Ok(JobReport::success(0, serde_json::json!({ "reviewsProcessed": 0 })));
    }

    classify_and_persist(&ctx, reviews, 20, model, &CancellationToken::new(), |pct| {
        tracing::info!(progress = pct, "process_unlabeled progress");
    })
    .await
}

pub async fn run(
    payload: serde_json::Value,
    ctx: Arc<AppContext>,
    progress: ProgressReporter,
    cancel: CancellationToken,
) -> Result<JobReport, ProcessorError> {
    let payload: LabelPayload = serde_json::from_value(payload)
        .map_err(|e| ProcessorError::InvalidPayload(e.to_string()))?;
    let payload = payload
        .validate()
        .map_err(|e| ProcessorError::InvalidPayload(e.to_string()))?;

    progress.report(10).await;

    let repo = ReviewRepository::new(&ctx.db);
    let reviews = repo
        .find_reviews_by_ids(&payload.review_ids)
        .await
        .map_err(|e| ProcessorError::Transient(format!("failed to load reviews: {e}")))?;

    if reviews.is_empty() {
        return Err(ProcessorError::Permanent("no reviews found".to_string()));
    }
    progress.report(20).await;

    let result = classify_and_persist(
        &ctx,
        reviews,
        payload.batch_size as usize,
        &payload.model,
        &cancel,
        |_pct| {},
    )
    .await?;

    progress.report(100).await;
    Ok(result)
}

/// Shared core for both entry modes (§4.7 steps 2-8): batch, classify,
/// sanitize, persist, and summarize. `on_progress` lets each caller report
/// the 20..80 range its own way (queue heartbeat vs. log line).
async fn classify_and_persist(
    ctx: &Arc<AppContext>,
    reviews: Vec<crate::domain::Review>,
    batch_size: usize,
    model: &str,
    cancel: &CancellationToken,
    on_progress: impl Fn(i16),
) -> Result<JobReport, ProcessorError> {
    let repo = ReviewRepository::new(&ctx.db);
    let mut all_labels: Vec<Label> = Vec::with_capacity(reviews.len());

    let batches: Vec<&[crate::domain::Review]> = reviews.chunks(batch_size.max(1)).collect();
    let total_batches = batches.len().max(1);

    for (idx, batch) in batches.iter().enumerate() {
        if cancel.is_cancelled() {
            return Err(ProcessorError::Cancelled);
        }

        let labels = classify_batch(ctx, batch, model).await;
        all_labels.extend(labels);

        let batch_progress = 20 + ((idx + 1) * 60 / total_batches) as i16;
        on_progress(batch_progress.min(80));

        if idx + 1 < batches.len() {
            tokio::time::sleep(INTER_BATCH_SLEEP).await;
        }
    }

    let persisted = repo
        .upsert_labels(&all_labels)
        .await
        .map_err(|e| ProcessorError::Transient(format!("failed to persist labels: {e}")))?;

    let mut sentiment_breakdown = serde_json::json!({ "positive": 0, "neutral": 0, "negative": 0 });
    let mut confidence_sum = 0.0f64;
    for label in &all_labels {
        confidence_sum += label.confidence as f64;
        let key = label.sentiment.as_str();
        if let Some(count) = sentiment_breakdown.get_mut(key) {
            *count = serde_json::json!(count.as_i64().unwrap_or(0) + 1);
        }
    }
    let average_confidence = if all_labels.is_empty() {
        0.0
    } else {
        confidence_sum / all_labels.len() as f64
    };

    let result = serde_json::json!({
        "reviewsProcessed": persisted,
        "model": model,
        "averageConfidence": average_confidence,
        "sentimentBreakdown": sentiment_breakdown,
    });

    Ok(JobReport::success(persisted as i64, result))
}

/// Classify one batch via the LLM; on any parse failure, fabricate default
/// labels rather than retrying (§4.7 step 5) — one bad batch must not
/// poison the rest of the job.
async fn classify_batch(ctx: &Arc<AppContext>, batch: &[crate::domain::Review], model: &str) -> Vec<Label> {
    let system_prompt = format!(
        "{}\n\nReturn a single JSON array of objects, one per review, each with: \
         reviewId, theme, sentiment (positive|neutral|negative), severity (1-5), \
         featureRequest (bool), directQuote (string), confidence (0-1). \
         Respond with a JSON object of the form {{\"labels\": [...]}}.",
        ctx.taxonomy.as_system_prompt_fragment()
    );

    let user_prompt = batch
        .iter()
        .enumerate()
        .map(|(i, review)| {
            format!(
                "{}. id={} text={}",
                i + 1,
                review.id,
                review.text.as_deref().unwrap_or("")
            )
        })
        .collect::<Vec<_>>()
        .join("\n");

    let request = ChatRequest::new(model)
        .message(Message::system(system_prompt))
        .message(Message::user(user_prompt))
        .temperature(0.1);

    let response = match ctx.llm.chat_completion(request, LLM_TIMEOUT).await {
        Ok(r) => r,
        Err(e) => {
            warn!(error = %e, "llm call failed, fabricating default labels for batch");
            return fallback_labels(batch, model);
        }
    };

    let parsed: Result<ParsedLabels, _> = serde_json::from_str(&response.content);
    match parsed {
        Ok(parsed) => {
            let mut by_id: std::collections::HashMap<String, RawLabel> = parsed
                .labels
                .into_iter()
                .map(|raw| (raw.review_id.clone(), raw))
                .collect();

            batch
                .iter()
                .map(|review| {
                    let raw = by_id.remove(&review.id).unwrap_or_else(|| RawLabel {
                        review_id: review.id.clone(),
                        ..Default::default()
                    });
                    ctx.taxonomy.sanitize(raw, model)
                })
                .collect()
        }
        Err(e) => {
            warn!(error = %e, "failed to parse llm response, fabricating default labels for batch");
            fallback_labels(batch, model)
        }
    }
}

fn fallback_labels(batch: &[crate::domain::Review], model: &str) -> Vec<Label> {
    batch
        .iter()
        .map(|review| crate::domain::Taxonomy::fallback_label(&review.id, model))
        .collect()
}

#[derive(serde::Deserialize)]
struct ParsedLabels {
    labels: Vec<RawLabel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fallback_labels_match_spec_defaults() {
        let review = crate::domain::Review {
            id: "r1".into(),
            app_id: "a1".into(),
            user_name: "Anonymous".into(),
            user_url: None,
            version: None,
            score: 3,
            title: None,
            text: None,
            url: None,
            date: None,
            reply_date: None,
            reply_text: None,
            helpful_votes: 0,
            country: "US".into(),
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let labels = fallback_labels(std::slice::from_ref(&review), "gpt-test");
        assert_eq!(labels.len(), 1);
        assert_eq!(labels[0].theme, "General Feedback");
        assert_eq!(labels[0].sentiment, Sentiment::Neutral.as_str());
        assert_eq!(labels[0].confidence, 0.0);
    }
}
