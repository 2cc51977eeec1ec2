//! LLM error types.

use thiserror::Error;

/// Errors that can occur during generative backend operations.
#[derive(Debug, Error)]
pub enum LlmError {
    /// HTTP request failed.
    #[error("LLM request failed: {0}")]
    RequestFailed(String),

    /// LLM response could not be parsed.
    #[error("Failed to parse LLM response: {0}")]
    ParseError(String),

    /// Request timed out.
    #[error("LLM request timed out after {0}ms")]
    Timeout(u64),

    /// LLM provider is unavailable.
    #[error("LLM provider unavailable: {0}")]
    Unavailable(String),

    /// All retry attempts exhausted.
    #[error("All LLM retry attempts exhausted after {attempts} tries: {last_error}")]
    RetriesExhausted {
        attempts: u32,
        last_error: String,
    },

    /// Configuration error.
    #[error("LLM configuration error: {0}")]
    ConfigError(String),

    /// No tokio runtime is available to run workers on.
    #[error("No async runtime available: {0}")]
    NoRuntime(String),
}

impl LlmError {
    /// Classify a failed HTTP exchange that was bounded by `timeout_ms`.
    pub(crate) fn transport(err: &reqwest::Error, timeout_ms: u64) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(timeout_ms)
        } else if err.is_connect() {
            LlmError::Unavailable(err.to_string())
        } else {
            LlmError::RequestFailed(err.to_string())
        }
    }
}
