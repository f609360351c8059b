//! Domain model: App, Review, Label, and the static theme taxonomy (§3).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum Sentiment {
    Positive,
    Neutral,
    Negative,
}

impl Sentiment {
    pub fn as_str(&self) -> &'static str {
        match self {
            Sentiment::Positive => "positive",
            Sentiment::Neutral => "neutral",
            Sentiment::Negative => "negative",
        }
    }

    pub fn parse_or_neutral(s: &str) -> Self {
        match s.to_ascii_lowercase().as_str() {
            "positive" => Sentiment::Positive,
            "negative" => Sentiment::Negative,
            _ => Sentiment::Neutral,
        }
    }
}

/// An application tracked in the review catalog. Upserted on first scrape.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct App {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub developer: Option<String>,
    pub category: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl App {
    pub fn unknown(app_id: &str) -> Self {
        let now = Utc::now();
        Self {
            id: app_id.to_string(),
            title: "Unknown".to_string(),
            description: None,
            version: None,
            developer: None,
            category: None,
            created_at: now,
            updated_at: now,
        }
    }
}

/// A raw record as returned by the opaque review catalog, before normalization.
#[derive(Debug, Clone, Deserialize)]
pub struct RawReview {
    pub review_id: String,
    pub author_name: Option<String>,
    pub score: i32,
    pub title: Option<String>,
    pub text: Option<String>,
    pub version: Option<String>,
    pub url: Option<String>,
    pub submitted_at: Option<DateTime<Utc>>,
    pub developer_reply_at: Option<DateTime<Utc>>,
    pub developer_reply_text: Option<String>,
    pub helpful_votes: Option<i64>,
}

/// A normalized, persisted review (§3).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Review {
    pub id: String,
    pub app_id: String,
    pub user_name: String,
    pub user_url: Option<String>,
    pub version: Option<String>,
    pub score: i32,
    pub title: Option<String>,
    pub text: Option<String>,
    pub url: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub reply_date: Option<DateTime<Utc>>,
    pub reply_text: Option<String>,
    pub helpful_votes: i64,
    pub country: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Review {
    /// Normalize a raw catalog record into a persistable review (§4.6 step 4).
    pub fn normalize(raw: RawReview, app_id: &str, country: &str) -> Self {
        let now = Utc::now();
        Self {
            id: raw.review_id,
            app_id: app_id.to_string(),
            user_name: raw
                .author_name
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| "Anonymous".to_string()),
            user_url: None,
            version: raw.version,
            score: raw.score.clamp(1, 5),
            title: raw.title,
            text: raw.text,
            url: raw.url,
            date: raw.submitted_at,
            reply_date: raw.developer_reply_at,
            reply_text: raw.developer_reply_text,
            helpful_votes: raw.helpful_votes.unwrap_or(0).max(0),
            country: country.to_ascii_uppercase(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Sentiment/topic label attached to a review by the label processor (§3, §4.7).
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Label {
    pub id: i64,
    pub review_id: String,
    pub sentiment: String,
    pub confidence: f32,
    pub theme: String,
    pub severity: i32,
    pub feature_request: bool,
    pub direct_quote: String,
    pub model_version: String,
    pub created_at: DateTime<Utc>,
}

/// One raw label object as returned, pre-sanitization, by the LLM classifier.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawLabel {
    pub review_id: String,
    #[serde(default)]
    pub theme: Option<String>,
    #[serde(default)]
    pub sentiment: Option<String>,
    #[serde(default)]
    pub severity: Option<i32>,
    #[serde(default)]
    pub feature_request: Option<bool>,
    #[serde(default)]
    pub direct_quote: Option<String>,
    #[serde(default)]
    pub confidence: Option<f32>,
}

pub const FALLBACK_THEME: &str = "General Feedback";

/// A fixed set of named themes with descriptions used to constrain LLM output (GLOSSARY).
///
/// Remains embedded for the core; loading from a path referenced by
/// `taxonomyRef` is a trivial extension left out of scope (§9).
pub struct Taxonomy {
    entries: Vec<(&'static str, &'static str)>,
}

impl Taxonomy {
    pub fn default_taxonomy() -> Self {
        Self {
            entries: vec![
                ("Bug Report", "User reports a crash, error, or defect."),
                ("Performance", "Complaints about speed, battery, or resource usage."),
                ("UI/UX", "Feedback about layout, navigation, or visual design."),
                ("Feature Request", "User asks for new functionality."),
                ("Pricing", "Feedback about cost, subscriptions, or billing."),
                ("Customer Support", "Feedback about support responsiveness or quality."),
                ("Onboarding", "Feedback about first-run experience or setup."),
                ("Reliability", "Sync failures, data loss, connectivity issues."),
                (FALLBACK_THEME, "Feedback that does not fit a more specific theme."),
            ],
        }
    }

    pub fn contains(&self, theme: &str) -> bool {
        self.entries.iter().any(|(name, _)| *name == theme)
    }

    pub fn as_system_prompt_fragment(&self) -> String {
        let mut out = String::from("Available themes:\n");
        for (name, description) in &self.entries {
            out.push_str(&format!("- {name}: {description}\n"));
        }
        out
    }

    /// Sanitize a raw label per §4.7 step 6.
    pub fn sanitize(&self, raw: RawLabel, model_version: &str) -> Label {
        let theme = raw
            .theme
            .filter(|t| self.contains(t))
            .unwrap_or_else(|| FALLBACK_THEME.to_string());

        let sentiment = raw
            .sentiment
            .as_deref()
            .map(Sentiment::parse_or_neutral)
            .unwrap_or(Sentiment::Neutral);

        let severity = raw.severity.unwrap_or(1).clamp(1, 5);
        let feature_request = raw.feature_request.unwrap_or(false);
        let direct_quote = raw
            .direct_quote
            .unwrap_or_default()
            .chars()
            .take(100)
            .collect::<String>();
        let confidence = raw.confidence.unwrap_or(0.0).clamp(0.0, 1.0);

        Label {
            id: 0,
            review_id: raw.review_id,
            sentiment: sentiment.as_str().to_string(),
            confidence,
            theme,
            severity,
            feature_request,
            direct_quote,
            model_version: model_version.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn fallback_label(review_id: &str, model_version: &str) -> Label {
        Label {
            id: 0,
            review_id: review_id.to_string(),
            sentiment: Sentiment::Neutral.as_str().to_string(),
            confidence: 0.0,
            theme: FALLBACK_THEME.to_string(),
            severity: 1,
            feature_request: false,
            direct_quote: String::new(),
            model_version: model_version.to_string(),
            created_at: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_defaults_anonymous_author() {
        let raw = RawReview {
            review_id: "r1".into(),
            author_name: None,
            score: 4,
            title: None,
            text: None,
            version: None,
            url: None,
            submitted_at: None,
            developer_reply_at: None,
            developer_reply_text: None,
            helpful_votes: None,
        };
        let review = Review::normalize(raw, "app1", "us");
        assert_eq!(review.user_name, "Anonymous");
        assert_eq!(review.country, "US");
        assert_eq!(review.helpful_votes, 0);
    }

    #[test]
    fn normalize_clamps_negative_helpful_votes() {
        let raw = RawReview {
            review_id: "r2".into(),
            author_name: Some("Jo".into()),
            score: 3,
            title: None,
            text: None,
            version: None,
            url: None,
            submitted_at: None,
            developer_reply_at: None,
            developer_reply_text: None,
            helpful_votes: Some(-5),
        };
        let review = Review::normalize(raw, "app1", "gb");
        assert_eq!(review.helpful_votes, 0);
    }

    #[test]
    fn sanitize_falls_back_on_unknown_theme() {
        let taxonomy = Taxonomy::default_taxonomy();
        let raw = RawLabel {
            review_id: "r1".into(),
            theme: Some("Not A Real Theme".into()),
            sentiment: Some("positive".into()),
            severity: Some(9),
            feature_request: Some(true),
            direct_quote: Some("x".repeat(200)),
            confidence: Some(1.5),
        };
        let label = taxonomy.sanitize(raw, "gpt-test");
        assert_eq!(label.theme, FALLBACK_THEME);
        assert_eq!(label.severity, 5);
        assert_eq!(label.confidence, 1.0);
        assert_eq!(label.direct_quote.chars().count(), 100);
    }

    #[test]
    fn sanitize_clamps_low_severity() {
        let taxonomy = Taxonomy::default_taxonomy();
        let raw = RawLabel {
            review_id: "r1".into(),
            theme: Some("Bug Report".into()),
            sentiment: Some("negative".into()),
            severity: Some(-3),
            feature_request: None,
            direct_quote: None,
            confidence: Some(-0.2),
        };
        let label = taxonomy.sanitize(raw, "gpt-test");
        assert_eq!(label.severity, 1);
        assert_eq!(label.confidence, 0.0);
        assert_eq!(label.theme, "Bug Report");
    }

    #[test]
    fn fallback_label_has_zero_confidence() {
        let label = Taxonomy::fallback_label("r9", "gpt-test");
        assert_eq!(label.confidence, 0.0);
        assert_eq!(label.theme, FALLBACK_THEME);
        assert_eq!(label.sentiment, "neutral");
    }
}
