//! Typed per-kind job payloads with validation and defaults (§4.2 Job codec).

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use super::job::JobKind;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SortMethod {
    Recent,
    Helpful,
}

/// `SCRAPE` payload (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapePayload {
    pub app_id: String,
    pub countries: Vec<String>,
    #[serde(default = "default_pages")]
    pub pages: u32,
    #[serde(default = "default_sort_methods")]
    pub sort_methods: Vec<SortMethod>,
    #[serde(default = "default_throttle_ms")]
    pub throttle_ms: u64,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
    #[serde(default = "default_priority")]
    pub priority: i16,
    #[serde(default = "default_scrape_max_attempts")]
    pub max_attempts: i32,
    #[serde(default)]
    pub delay_ms: u64,
}

fn default_pages() -> u32 {
    5
}
fn default_sort_methods() -> Vec<SortMethod> {
    vec![SortMethod::Recent]
}
fn default_throttle_ms() -> u64 {
    500
}
fn default_priority() -> i16 {
    5
}
fn default_scrape_max_attempts() -> i32 {
    3
}

impl ScrapePayload {
    /// Validate and normalize per §4.2: coerce countries to uppercase, enforce
    /// the declared bounds. Never mutates fields other than defaults/coercion.
    pub fn validate(mut self) -> Result<Self, CodecError> {
        if self.app_id.trim().is_empty() {
            return Err(CodecError::InvalidPayload("appId must be nonempty".into()));
        }
        if self.countries.is_empty() {
            return Err(CodecError::InvalidPayload("countries must be nonempty".into()));
        }
        if self.countries.iter().any(|c| c.chars().count() != 2) {
            return Err(CodecError::InvalidPayload("countries must be 2-character codes".into()));
        }
        self.countries = self.countries.iter().map(|c| c.to_ascii_uppercase()).collect();
        if !(1..=10).contains(&self.pages) {
            return Err(CodecError::InvalidPayload("pages must be in 1..10".into()));
        }
        if self.sort_methods.is_empty() {
            return Err(CodecError::InvalidPayload("sortMethods must be nonempty".into()));
        }
        if self.throttle_ms > 5000 {
            return Err(CodecError::InvalidPayload("throttleMs must be in 0..5000".into()));
        }
        if !(1..=10).contains(&self.priority) {
            return Err(CodecError::InvalidPayload("priority must be in 1..10".into()));
        }
        if !(0..=5).contains(&self.max_attempts) {
            return Err(CodecError::InvalidPayload("maxAttempts must be in 0..5".into()));
        }
        Ok(self)
    }
}

/// `LABEL` payload (§4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LabelPayload {
    pub review_ids: Vec<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    #[serde(default = "default_model")]
    pub model: String,
    #[serde(default)]
    pub taxonomy_ref: Option<String>,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
    #[serde(default = "default_priority")]
    pub priority: i16,
    #[serde(default = "default_label_max_attempts")]
    pub max_attempts: i32,
}

fn default_batch_size() -> u32 {
    20
}
fn default_model() -> String {
    "gpt-4o-mini".to_string()
}
fn default_label_max_attempts() -> i32 {
    2
}

impl LabelPayload {
    pub fn validate(self) -> Result<Self, CodecError> {
        if self.review_ids.is_empty() {
            return Err(CodecError::InvalidPayload("reviewIds must be nonempty".into()));
        }
        if !(1..=100).contains(&self.batch_size) {
            return Err(CodecError::InvalidPayload("batchSize must be in 1..100".into()));
        }
        Ok(self)
    }
}

/// `PROCESS_RESULTS` payload. Processor is a no-op stub (SPEC_FULL "Supplemented features").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessResultsPayload {
    pub job_id: Uuid,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
}

/// `CLEANUP` payload. Processor is a no-op stub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CleanupPayload {
    #[serde(default = "default_older_than_hours")]
    pub older_than_hours: u32,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
}

fn default_older_than_hours() -> u32 {
    24 * 30
}

/// `EXPORT` payload. Processor is a no-op stub.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportPayload {
    pub app_id: String,
    #[serde(default = "default_export_format")]
    pub format: String,
    #[serde(default)]
    pub correlation_id: Option<Uuid>,
}

fn default_export_format() -> String {
    "csv".to_string()
}

/// Metadata commands attach when going through the queue facade (component C).
pub trait CommandMeta {
    fn job_kind(&self) -> JobKind;
    fn correlation_id(&self) -> Option<Uuid> {
        None
    }
    fn priority(&self) -> i16 {
        5
    }
    fn max_attempts(&self) -> i32 {
        self.job_kind().default_max_attempts()
    }
}

impl CommandMeta for ScrapePayload {
    fn job_kind(&self) -> JobKind {
        JobKind::Scrape
    }
    fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }
    fn priority(&self) -> i16 {
        self.priority
    }
    fn max_attempts(&self) -> i32 {
        self.max_attempts
    }
}

impl CommandMeta for LabelPayload {
    fn job_kind(&self) -> JobKind {
        JobKind::Label
    }
    fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }
    fn priority(&self) -> i16 {
        self.priority
    }
    fn max_attempts(&self) -> i32 {
        self.max_attempts
    }
}

impl CommandMeta for ProcessResultsPayload {
    fn job_kind(&self) -> JobKind {
        JobKind::ProcessResults
    }
    fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }
}

impl CommandMeta for CleanupPayload {
    fn job_kind(&self) -> JobKind {
        JobKind::Cleanup
    }
    fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }
}

impl CommandMeta for ExportPayload {
    fn job_kind(&self) -> JobKind {
        JobKind::Export
    }
    fn correlation_id(&self) -> Option<Uuid> {
        self.correlation_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_scrape() -> ScrapePayload {
        ScrapePayload {
            app_id: "737534985".into(),
            countries: vec!["us".into(), "gb".into()],
            pages: 2,
            sort_methods: vec![SortMethod::Recent],
            throttle_ms: 100,
            correlation_id: None,
            priority: 5,
            max_attempts: 3,
            delay_ms: 0,
        }
    }

    #[test]
    fn scrape_validate_uppercases_countries() {
        let validated = sample_scrape().validate().unwrap();
        assert_eq!(validated.countries, vec!["US", "GB"]);
    }

    #[test]
    fn scrape_validate_rejects_empty_app_id() {
        let mut payload = sample_scrape();
        payload.app_id = "".into();
        assert!(matches!(payload.validate(), Err(CodecError::InvalidPayload(_))));
    }

    #[test]
    fn scrape_validate_rejects_non_two_char_country_codes() {
        let mut payload = sample_scrape();
        payload.countries = vec!["usa".into()];
        assert!(matches!(payload.validate(), Err(CodecError::InvalidPayload(_))));

        let mut payload = sample_scrape();
        payload.countries = vec!["u".into()];
        assert!(matches!(payload.validate(), Err(CodecError::InvalidPayload(_))));
    }

    #[test]
    fn scrape_validate_rejects_pages_out_of_range() {
        let mut payload = sample_scrape();
        payload.pages = 11;
        assert!(payload.validate().is_err());
    }

    #[test]
    fn label_validate_rejects_empty_review_ids() {
        let payload = LabelPayload {
            review_ids: vec![],
            batch_size: 20,
            model: default_model(),
            taxonomy_ref: None,
            correlation_id: None,
            priority: 5,
            max_attempts: 2,
        };
        assert!(payload.validate().is_err());
    }

    #[test]
    fn label_default_max_attempts_is_two() {
        assert_eq!(JobKind::Label.default_max_attempts(), 2);
    }
}
