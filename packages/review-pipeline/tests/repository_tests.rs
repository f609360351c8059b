//! Integration tests for the review/app/label repository (§4.6, §4.7, §8).

mod common;

use chrono::Utc;
use common::TestHarness;
use review_pipeline::domain::{RawReview, Review};
use review_pipeline::kernel::catalog_client::AppInfo;
use review_pipeline::repository::ReviewRepository;

fn app_info(title: &str) -> AppInfo {
    AppInfo {
        title: title.to_string(),
        description: Some("a test app".to_string()),
        version: Some("1.0.0".to_string()),
        developer: Some("Acme".to_string()),
        genre: Some("Productivity".to_string()),
    }
}

fn review(id: &str, app_id: &str, country: &str) -> Review {
    Review::normalize(
        RawReview {
            review_id: id.to_string(),
            author_name: Some("Jo".to_string()),
            score: 4,
            title: Some("Great app".to_string()),
            text: Some("Does what it says.".to_string()),
            version: Some("1.0.0".to_string()),
            url: None,
            submitted_at: Some(Utc::now()),
            developer_reply_at: None,
            developer_reply_text: None,
            helpful_votes: Some(2),
        },
        app_id,
        country,
    )
}

/// Upserting the same app twice updates the row in place rather than
/// duplicating it (§4.6 step 2).
#[tokio::test]
async fn upsert_app_is_idempotent() {
    let harness = TestHarness::new().await.unwrap();
    let repo = ReviewRepository::new(&harness.db_pool);

    repo.upsert_app("app-1", &app_info("First Title")).await.unwrap();
    let updated = repo.upsert_app("app-1", &app_info("Second Title")).await.unwrap();

    assert_eq!(updated.id, "app-1");
    assert_eq!(updated.title, "Second Title");
}

/// Re-running a scrape over the same reviews leaves no duplicates (§8
/// invariant 2: idempotent on persistent state).
#[tokio::test]
async fn upsert_reviews_is_idempotent_across_reruns() {
    let harness = TestHarness::new().await.unwrap();
    let repo = ReviewRepository::new(&harness.db_pool);
    repo.upsert_app("app-2", &app_info("Idempotence Test")).await.unwrap();

    let reviews = vec![review("r1", "app-2", "us"), review("r2", "app-2", "us")];

    let persisted_first = repo.upsert_reviews(&reviews).await.unwrap();
    let persisted_second = repo.upsert_reviews(&reviews).await.unwrap();

    assert_eq!(persisted_first, 2);
    assert_eq!(persisted_second, 2);

    let fetched = repo
        .find_reviews_by_ids(&["r1".to_string(), "r2".to_string()])
        .await
        .unwrap();
    assert_eq!(fetched.len(), 2, "no duplicate rows after re-running the same scrape");
}

/// `findUnlabeled` only returns reviews with no corresponding label row,
/// and `upsertLabels` keeps at most one label per review (§8 invariant 3).
#[tokio::test]
async fn find_unlabeled_excludes_reviews_with_labels() {
    let harness = TestHarness::new().await.unwrap();
    let repo = ReviewRepository::new(&harness.db_pool);
    repo.upsert_app("app-3", &app_info("Unlabeled Test")).await.unwrap();
    repo.upsert_reviews(&[review("r3", "app-3", "gb"), review("r4", "app-3", "gb")])
        .await
        .unwrap();

    let taxonomy = review_pipeline::domain::Taxonomy::default_taxonomy();
    let label = taxonomy.sanitize(
        review_pipeline::domain::RawLabel {
            review_id: "r3".to_string(),
            theme: Some("Bug Report".to_string()),
            sentiment: Some("negative".to_string()),
            severity: Some(4),
            feature_request: Some(false),
            direct_quote: Some("crashes on launch".to_string()),
            confidence: Some(0.9),
        },
        "gpt-test",
    );
    repo.upsert_labels(&[label.clone()]).await.unwrap();

    let unlabeled = repo.find_unlabeled(10).await.unwrap();
    assert!(unlabeled.iter().any(|r| r.id == "r4"));
    assert!(unlabeled.iter().all(|r| r.id != "r3"));

    // Re-labeling the same review replaces the row rather than adding a
    // second one.
    let relabel = taxonomy.sanitize(
        review_pipeline::domain::RawLabel {
            review_id: "r3".to_string(),
            theme: Some("Performance".to_string()),
            sentiment: Some("neutral".to_string()),
            severity: Some(2),
            feature_request: Some(false),
            direct_quote: Some("slow to load".to_string()),
            confidence: Some(0.5),
        },
        "gpt-test",
    );
    repo.upsert_labels(&[relabel]).await.unwrap();

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM labels WHERE review_id = 'r3'")
        .fetch_one(&harness.db_pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "at most one label row per reviewId");
}
