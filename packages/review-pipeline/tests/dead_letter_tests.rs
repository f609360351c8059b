//! Integration tests for the dead-letter manager (§4.4, §8).

mod common;

use common::TestHarness;
use review_pipeline::kernel::jobs::job::{ErrorKind, JobKind};
use review_pipeline::kernel::jobs::payloads::{ScrapePayload, SortMethod};
use uuid::Uuid;

fn scrape_payload(app_id: &str) -> ScrapePayload {
    ScrapePayload {
        app_id: app_id.to_string(),
        countries: vec!["US".to_string()],
        pages: 1,
        sort_methods: vec![SortMethod::Recent],
        throttle_ms: 0,
        correlation_id: Some(Uuid::new_v4()),
        priority: 5,
        max_attempts: 1,
        delay_ms: 0,
    }
    .validate()
    .unwrap()
}

async fn dead_letter_one(harness: &TestHarness, app_id: &str, reason: &str) -> Uuid {
    let job_id = harness.queue.enqueue(&scrape_payload(app_id), None).await.unwrap();
    let reservation = harness
        .queue
        .reserve(JobKind::Scrape, "worker-1", chrono::Duration::seconds(30))
        .await
        .unwrap()
        .unwrap();
    harness.queue.fail(reservation.job.id, reason, ErrorKind::Permanent).await.unwrap();

    let dead_letters = harness.dead_letters.get_dead_letters(JobKind::Scrape, 50).await.unwrap();
    dead_letters
        .into_iter()
        .find(|dl| dl.original_job_id == job_id)
        .expect("job should have been dead-lettered")
        .id
}

/// `replay` re-enqueues the original payload with a fresh id, zeroed
/// attempts, and removes the dead-letter record.
#[tokio::test]
async fn replay_requeues_and_removes_dead_letter() {
    let harness = TestHarness::new().await.unwrap();
    let dlq_id = dead_letter_one(&harness, "app-replay", "permanent failure").await;

    let new_job_id = harness.dead_letters.replay(dlq_id).await.unwrap();

    let reservation = harness
        .queue
        .reserve(JobKind::Scrape, "worker-1", chrono::Duration::seconds(30))
        .await
        .unwrap()
        .expect("replayed job should be reservable");
    assert_eq!(reservation.job.id, new_job_id);
    assert_eq!(reservation.job.attempts_made, 0);

    let remaining = harness.dead_letters.get_dead_letters(JobKind::Scrape, 50).await.unwrap();
    assert!(remaining.iter().all(|dl| dl.id != dlq_id));
}

/// `replayByReason` bulk-replays only dead letters whose failure reason
/// matches the given substring.
#[tokio::test]
async fn replay_by_reason_filters_on_substring() {
    let harness = TestHarness::new().await.unwrap();
    dead_letter_one(&harness, "app-reason-1", "rate limit exceeded").await;
    dead_letter_one(&harness, "app-reason-2", "unexpected catalog schema").await;

    let replayed = harness
        .dead_letters
        .replay_by_reason(JobKind::Scrape, "rate limit", 10)
        .await
        .unwrap();

    assert_eq!(replayed.len(), 1);

    let stats = harness.dead_letters.stats(JobKind::Scrape).await.unwrap();
    assert_eq!(stats.total, 1, "only the non-matching dead letter should remain");
}

/// `stats` aggregates total count and the oldest/newest failure bounds.
#[tokio::test]
async fn stats_reports_total_and_bounds() {
    let harness = TestHarness::new().await.unwrap();
    dead_letter_one(&harness, "app-stats-1", "boom").await;
    dead_letter_one(&harness, "app-stats-2", "boom").await;

    let stats = harness.dead_letters.stats(JobKind::Scrape).await.unwrap();
    assert_eq!(stats.total, 2);
    assert!(stats.oldest_failure.is_some());
    assert!(stats.newest_failure.is_some());
    assert_eq!(stats.by_failure_reason.len(), 1);
    assert_eq!(stats.by_failure_reason[0], ("boom".to_string(), 2));
}

/// `sweep` deletes dead letters older than the cutoff and leaves newer ones.
#[tokio::test]
async fn sweep_removes_only_entries_older_than_cutoff() {
    let harness = TestHarness::new().await.unwrap();
    dead_letter_one(&harness, "app-sweep", "old failure").await;

    let removed = harness.dead_letters.sweep(chrono::Duration::seconds(3600)).await.unwrap();
    assert_eq!(removed, 0, "entry is younger than the cutoff");

    let removed = harness.dead_letters.sweep(chrono::Duration::seconds(-1)).await.unwrap();
    assert_eq!(removed, 1);
}
