//! Review-catalog HTTP client (§6 "Catalog API contract").
//!
//! Treated as opaque per spec.md §1: a thin adapter that normalizes an
//! external catalog's responses into this crate's `AppInfo`/`RawReview` shape.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;

use crate::domain::RawReview;
use crate::kernel::jobs::payloads::SortMethod;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("network error: {0}")]
    Network(String),
    #[error("catalog returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("timeout after {0:?}")]
    Timeout(Duration),
    #[error("failed to parse catalog response: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct AppInfo {
    pub title: String,
    pub description: Option<String>,
    pub version: Option<String>,
    pub developer: Option<String>,
    pub genre: Option<String>,
}

impl AppInfo {
    pub fn unknown() -> Self {
        Self {
            title: "Unknown".to_string(),
            ..Default::default()
        }
    }
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn app(&self, app_id: &str, country: &str) -> Result<AppInfo, CatalogError>;

    async fn reviews(
        &self,
        app_id: &str,
        country: &str,
        page: u32,
        sort: SortMethod,
        throttle: Duration,
    ) -> Result<Vec<RawReview>, CatalogError>;
}

/// `reqwest`-based client, constructed the way the host builds its HTTP
/// clients: explicit timeout, custom `User-Agent`, one shared `Client`.
pub struct HttpCatalogClient {
    http: Client,
    base_url: String,
}

impl HttpCatalogClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let http = Client::builder()
            .user_agent("review-pipeline/0.1")
            .timeout(Duration::from_secs(30))
            .build()
            .expect("catalog http client build");
        Self {
            http,
            base_url: base_url.into(),
        }
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn app(&self, app_id: &str, country: &str) -> Result<AppInfo, CatalogError> {
        let url = format!("{}/apps/{app_id}", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("country", country)])
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<AppInfo>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }

    async fn reviews(
        &self,
        app_id: &str,
        country: &str,
        page: u32,
        sort: SortMethod,
        throttle: Duration,
    ) -> Result<Vec<RawReview>, CatalogError> {
        tokio::time::sleep(throttle).await;

        let sort_param = match sort {
            SortMethod::Recent => "RECENT",
            SortMethod::Helpful => "HELPFUL",
        };

        let url = format!("{}/apps/{app_id}/reviews", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[
                ("country", country),
                ("page", &page.to_string()),
                ("sort", sort_param),
            ])
            .send()
            .await
            .map_err(|e| CatalogError::Network(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CatalogError::Api {
                status: status.as_u16(),
                body,
            });
        }

        response
            .json::<Vec<RawReview>>()
            .await
            .map_err(|e| CatalogError::Parse(e.to_string()))
    }
}
