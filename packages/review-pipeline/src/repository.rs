//! Repository: UPSERT-based persistence for apps, reviews, and labels (§1, §4.6, §4.7).
//!
//! Individual row failures inside a batch are logged and swallowed so one
//! bad row never aborts the rest of the batch (§7 "repository upserts").

use sqlx::PgPool;
use tracing::warn;

use crate::domain::{App, Label, Review};
use crate::kernel::catalog_client::AppInfo;

const REVIEW_BATCH_SIZE: usize = 50;

pub struct ReviewRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ReviewRepository<'a> {
    pub fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Upsert the App record; primary key `app_id`, mutable fields updated on conflict (§4.6 step 2).
    pub async fn upsert_app(&self, app_id: &str, info: &AppInfo) -> anyhow::Result<App> {
        let app = sqlx::query_as::<_, App>(
            r#"
            INSERT INTO apps (id, title, description, version, developer, category, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, NOW(), NOW())
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                description = EXCLUDED.description,
                version = EXCLUDED.version,
                developer = EXCLUDED.developer,
                category = EXCLUDED.category,
                updated_at = NOW()
            RETURNING id, title, description, version, developer, category, created_at, updated_at
            "#,
        )
        .bind(app_id)
        .bind(&info.title)
        .bind(&info.description)
        .bind(&info.version)
        .bind(&info.developer)
        .bind(&info.genre)
        .fetch_one(self.pool)
        .await?;

        Ok(app)
    }

    /// Upsert reviews in batches of `REVIEW_BATCH_SIZE` (§4.6 step 6). Row-level
    /// failures are logged and skipped; the caller gets back how many persisted.
    pub async fn upsert_reviews(&self, reviews: &[Review]) -> anyhow::Result<usize> {
        let mut persisted = 0usize;
        for batch in reviews.chunks(REVIEW_BATCH_SIZE) {
            for review in batch {
                match self.upsert_review(review).await {
                    Ok(()) => persisted += 1,
                    Err(e) => warn!(review_id = %review.id, error = %e, "failed to upsert review"),
                }
            }
        }
        Ok(persisted)
    }

    async fn upsert_review(&self, review: &Review) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO reviews (
                id, app_id, user_name, user_url, version, score, title, text, url,
                date, reply_date, reply_text, helpful_votes, country, created_at, updated_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,$9,$10,$11,$12,$13,$14,$15,$16)
            ON CONFLICT (id) DO UPDATE SET
                user_name = EXCLUDED.user_name,
                user_url = EXCLUDED.user_url,
                version = EXCLUDED.version,
                score = EXCLUDED.score,
                title = EXCLUDED.title,
                text = EXCLUDED.text,
                url = EXCLUDED.url,
                date = EXCLUDED.date,
                reply_date = EXCLUDED.reply_date,
                reply_text = EXCLUDED.reply_text,
                helpful_votes = EXCLUDED.helpful_votes,
                country = EXCLUDED.country,
                updated_at = NOW()
            "#,
        )
        .bind(&review.id)
        .bind(&review.app_id)
        .bind(&review.user_name)
        .bind(&review.user_url)
        .bind(&review.version)
        .bind(review.score)
        .bind(&review.title)
        .bind(&review.text)
        .bind(&review.url)
        .bind(review.date)
        .bind(review.reply_date)
        .bind(&review.reply_text)
        .bind(review.helpful_votes)
        .bind(&review.country)
        .bind(review.created_at)
        .bind(review.updated_at)
        .execute(self.pool)
        .await?;
        Ok(())
    }

    /// Batch-load reviews by id, preserving no particular order (§4.7 step 1).
    pub async fn find_reviews_by_ids(&self, ids: &[String]) -> anyhow::Result<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>("SELECT * FROM reviews WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(self.pool)
            .await?;
        Ok(reviews)
    }

    /// Up to `limit` reviews with no label yet, most recently created first (§4.7 catch-up mode).
    pub async fn find_unlabeled(&self, limit: i64) -> anyhow::Result<Vec<Review>> {
        let reviews = sqlx::query_as::<_, Review>(
            r#"
            SELECT r.* FROM reviews r
            LEFT JOIN labels l ON l.review_id = r.id
            WHERE l.id IS NULL
            ORDER BY r.created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit)
        .fetch_all(self.pool)
        .await?;
        Ok(reviews)
    }

    /// Upsert labels keyed by `review_id` (§4.7 step 7). One label per review;
    /// a later classification for the same review replaces the earlier one.
    pub async fn upsert_labels(&self, labels: &[Label]) -> anyhow::Result<usize> {
        let mut persisted = 0usize;
        for label in labels {
            match self.upsert_label(label).await {
                Ok(()) => persisted += 1,
                Err(e) => warn!(review_id = %label.review_id, error = %e, "failed to upsert label"),
            }
        }
        Ok(persisted)
    }

    async fn upsert_label(&self, label: &Label) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            INSERT INTO labels (
                review_id, sentiment, confidence, theme, severity, feature_request,
                direct_quote, model_version, created_at
            ) VALUES ($1,$2,$3,$4,$5,$6,$7,$8,NOW())
            ON CONFLICT (review_id) DO UPDATE SET
                sentiment = EXCLUDED.sentiment,
                confidence = EXCLUDED.confidence,
                theme = EXCLUDED.theme,
                severity = EXCLUDED.severity,
                feature_request = EXCLUDED.feature_request,
                direct_quote = EXCLUDED.direct_quote,
                model_version = EXCLUDED.model_version,
                created_at = NOW()
            "#,
        )
        .bind(&label.review_id)
        .bind(&label.sentiment)
        .bind(label.confidence)
        .bind(&label.theme)
        .bind(label.severity)
        .bind(label.feature_request)
        .bind(&label.direct_quote)
        .bind(&label.model_version)
        .execute(self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_batch_size_matches_spec() {
        assert_eq!(REVIEW_BATCH_SIZE, 50);
    }
}
