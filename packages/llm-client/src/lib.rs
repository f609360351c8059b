//! Minimal chat-completion REST client.
//!
//! This is intentionally narrow: one client struct, one call
//! (`chat_completion`), JSON response format only. The label processor is
//! the only caller and it always wants a single JSON array back — no
//! streaming, no tool use, no embeddings.

pub mod error;
pub mod types;

pub use error::{LlmError, Result};
pub use types::{ChatRequest, ChatResponse, Message};

use std::time::Duration;
use tracing::{debug, warn};

/// Chat-completion client for an OpenAI-compatible API.
#[derive(Clone)]
pub struct LlmClient {
    http_client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl LlmClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: "https://api.openai.com/v1".to_string(),
        }
    }

    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| LlmError::Config("OPENAI_API_KEY not set".into()))?;
        Ok(Self::new(api_key))
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Send a chat completion request with the given wall-clock timeout.
    pub async fn chat_completion(
        &self,
        request: ChatRequest,
        timeout: Duration,
    ) -> Result<ChatResponse> {
        let start = std::time::Instant::now();

        let send = self
            .http_client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&request)
            .send();

        let response = match tokio::time::timeout(timeout, send).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                warn!(error = %e, "llm request failed");
                return Err(LlmError::Network(e.to_string()));
            }
            Err(_) => return Err(LlmError::Timeout(timeout)),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "llm api error");
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let raw: types::ChatResponseRaw = response
            .json()
            .await
            .map_err(|e| LlmError::Parse(e.to_string()))?;

        let content = raw
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| LlmError::Parse("no choices in response".into()))?;

        debug!(
            model = %request.model,
            duration_ms = start.elapsed().as_millis(),
            "llm chat completion"
        );

        Ok(ChatResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_base_url() {
        let client = LlmClient::new("sk-test").with_base_url("https://custom.api.com");
        assert_eq!(client.api_key, "sk-test");
        assert_eq!(client.base_url, "https://custom.api.com");
    }

    #[test]
    fn from_env_requires_api_key() {
        std::env::remove_var("OPENAI_API_KEY");
        assert!(LlmClient::from_env().is_err());
    }

    #[test]
    fn transient_classification() {
        assert!(LlmError::Network("x".into()).is_transient());
        assert!(LlmError::Timeout(Duration::from_secs(1)).is_transient());
        assert!(LlmError::Api {
            status: 429,
            body: String::new()
        }
        .is_transient());
        assert!(LlmError::Api {
            status: 500,
            body: String::new()
        }
        .is_transient());
        assert!(!LlmError::Api {
            status: 400,
            body: String::new()
        }
        .is_transient());
        assert!(!LlmError::Config("x".into()).is_transient());
    }
}
