//! Error types for the LLM client.

use thiserror::Error;

/// Result type for LLM client operations.
pub type Result<T> = std::result::Result<T, LlmError>;

/// LLM client errors.
#[derive(Debug, Error)]
pub enum LlmError {
    /// Configuration error (missing API key, invalid settings)
    #[error("configuration error: {0}")]
    Config(String),

    /// Network error (connection failed, timeout)
    #[error("network error: {0}")]
    Network(String),

    /// Non-2xx response, rate limit, invalid request
    #[error("api error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// Response exceeded the configured timeout
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    /// Invalid JSON, unexpected response shape
    #[error("parse error: {0}")]
    Parse(String),
}

impl LlmError {
    /// Whether a caller should treat this as retryable (network blip, 429, 5xx)
    /// versus permanent (4xx other than 429, malformed request).
    pub fn is_transient(&self) -> bool {
        match self {
            LlmError::Network(_) | LlmError::Timeout(_) => true,
            LlmError::Api { status, .. } => *status == 429 || *status >= 500,
            LlmError::Config(_) | LlmError::Parse(_) => false,
        }
    }
}
