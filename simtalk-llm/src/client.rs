//! LLM Client — the generative backend seam and its HTTP implementation.
//!
//! [`GenerativeBackend`] is the one operation the rest of the workspace
//! needs: turn a prompt into text, or fail. [`LlmClient`] implements it for
//! Ollama and OpenAI-compatible APIs; tests plug in scripted backends.

use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde_json::json;
use simtalk_core::config::LlmConfig;
use tracing::{debug, warn};

use crate::error::LlmError;
use crate::types::{LlmRequest, LlmResponse, Prompt};

/// Something that can turn a prompt into text.
///
/// Calls may be slow and may fail. Callers never see a panic or an error
/// from the dispatcher; failures are converted into placeholder text there.
pub trait GenerativeBackend: Send + Sync + 'static {
    /// Generate text for `prompt`.
    fn generate(&self, prompt: &Prompt) -> impl Future<Output = Result<String, LlmError>> + Send;
}

impl<B: GenerativeBackend> GenerativeBackend for Arc<B> {
    fn generate(&self, prompt: &Prompt) -> impl Future<Output = Result<String, LlmError>> + Send {
        (**self).generate(prompt)
    }
}

/// Provider backend for LLM inference.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Ollama running locally (recommended).
    Ollama { base_url: String },
    /// OpenAI-compatible API.
    OpenAiCompatible { base_url: String, api_key: String },
    /// No LLM available; all calls fail and yield placeholder text.
    None,
}

/// The main LLM client that routes requests to the configured backend.
pub struct LlmClient {
    provider: LlmProvider,
    http: Client,
    model: String,
    max_retries: u32,
    timeout_ms: u64,
}

impl LlmClient {
    /// Create a new LLM client.
    #[must_use]
    pub fn new(provider: LlmProvider, model: impl Into<String>, max_retries: u32) -> Self {
        Self {
            provider,
            http: Client::new(),
            model: model.into(),
            max_retries,
            timeout_ms: 5000,
        }
    }

    /// Create a client with no LLM backend (every call fails).
    #[must_use]
    pub fn none() -> Self {
        Self::new(LlmProvider::None, String::new(), 0)
    }

    /// Build a client from the `[llm]` config section.
    ///
    /// # Errors
    /// Returns `LlmError::ConfigError` for an unknown provider name.
    pub fn from_config(config: &LlmConfig) -> Result<Self, LlmError> {
        let provider = match config.provider.as_str() {
            "ollama" => LlmProvider::Ollama {
                base_url: config.base_url.clone(),
            },
            "openai" => LlmProvider::OpenAiCompatible {
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
            },
            "none" => LlmProvider::None,
            other => {
                return Err(LlmError::ConfigError(format!(
                    "unknown LLM provider '{other}' (expected ollama, openai or none)"
                )));
            }
        };
        let mut client = Self::new(provider, config.model.clone(), config.max_retries);
        client.timeout_ms = config.request_timeout_ms;
        Ok(client)
    }

    /// Check if the LLM client has a backend configured.
    #[must_use]
    pub fn is_available(&self) -> bool {
        !matches!(self.provider, LlmProvider::None)
    }

    /// Generate a response from the LLM.
    ///
    /// Returns `Err` if the LLM is unavailable or all retries fail.
    pub async fn complete(&self, request: &LlmRequest) -> Result<LlmResponse, LlmError> {
        match &self.provider {
            LlmProvider::None => Err(LlmError::Unavailable("No LLM provider configured".into())),
            LlmProvider::Ollama { base_url } => self.generate_ollama(base_url, request).await,
            LlmProvider::OpenAiCompatible { base_url, api_key } => {
                self.generate_openai(base_url, api_key, request).await
            }
        }
    }

    /// Generate using Ollama's API.
    async fn generate_ollama(
        &self,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/api/generate");
        let body = json!({
            "model": self.model,
            "system": request.system,
            "prompt": request.user,
            "stream": false,
            "options": {
                "temperature": request.temperature,
                "num_predict": request.max_tokens,
            }
        });

        let (json, latency_ms) = self.post_with_retries(&url, None, &body, request.timeout_ms).await?;
        Ok(LlmResponse {
            text: json["response"].as_str().unwrap_or("").trim().to_string(),
            tokens_generated: u32::try_from(json["eval_count"].as_u64().unwrap_or(0))
                .unwrap_or(u32::MAX),
            latency_ms,
            model: self.model.clone(),
        })
    }

    /// Generate using an OpenAI-compatible API.
    async fn generate_openai(
        &self,
        base_url: &str,
        api_key: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse, LlmError> {
        let url = format!("{base_url}/v1/chat/completions");
        let body = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": request.system },
                { "role": "user", "content": request.user },
            ],
            "max_tokens": request.max_tokens,
            "temperature": request.temperature,
        });

        let (json, latency_ms) = self
            .post_with_retries(&url, Some(api_key), &body, request.timeout_ms)
            .await?;
        Ok(LlmResponse {
            text: json["choices"][0]["message"]["content"]
                .as_str()
                .unwrap_or("")
                .trim()
                .to_string(),
            tokens_generated: u32::try_from(json["usage"]["completion_tokens"].as_u64().unwrap_or(0))
                .unwrap_or(u32::MAX),
            latency_ms,
            model: self.model.clone(),
        })
    }

    /// POST `body` to `url`, retrying up to `max_retries` times.
    ///
    /// Returns the parsed JSON body and the latency of the successful attempt.
    async fn post_with_retries(
        &self,
        url: &str,
        bearer: Option<&str>,
        body: &serde_json::Value,
        timeout_ms: u64,
    ) -> Result<(serde_json::Value, u64), LlmError> {
        let mut last_error = String::new();
        for attempt in 0..=self.max_retries {
            if attempt > 0 {
                debug!("Retrying LLM call (attempt {}/{})", attempt + 1, self.max_retries + 1);
            }

            let start = Instant::now();
            let mut builder = self
                .http
                .post(url)
                .json(body)
                .timeout(Duration::from_millis(timeout_ms));
            if let Some(key) = bearer {
                builder = builder.header("Authorization", format!("Bearer {key}"));
            }

            match builder.send().await {
                Ok(resp) if resp.status().is_success() => {
                    let latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
                    let json: serde_json::Value = resp
                        .json()
                        .await
                        .map_err(|e| LlmError::ParseError(e.to_string()))?;
                    return Ok((json, latency_ms));
                }
                Ok(resp) => {
                    let status = resp.status();
                    last_error = format!("HTTP {status}: {}", resp.text().await.unwrap_or_default());
                    warn!("LLM backend returned error: {last_error}");
                }
                Err(e) => {
                    let err = LlmError::transport(&e, timeout_ms);
                    warn!("LLM request failed: {err}");
                    last_error = err.to_string();
                }
            }
        }

        Err(LlmError::RetriesExhausted {
            attempts: self.max_retries + 1,
            last_error,
        })
    }
}

impl GenerativeBackend for LlmClient {
    async fn generate(&self, prompt: &Prompt) -> Result<String, LlmError> {
        let request = LlmRequest::for_prompt(prompt).with_timeout(self.timeout_ms);
        let response = self.complete(&request).await?;
        if response.text.is_empty() {
            return Err(LlmError::ParseError(format!(
                "model '{}' returned an empty response",
                response.model
            )));
        }
        Ok(response.text)
    }
}

/// Parse structured JSON out of raw model text.
///
/// Models like to wrap JSON in prose or code fences, so this parses the
/// outermost `{ ... }` span.
///
/// # Errors
/// Returns `LlmError::ParseError` if no JSON object is found or it does not
/// match `T`.
pub fn parse_structured<T: serde::de::DeserializeOwned>(text: &str) -> Result<T, LlmError> {
    let start = text.find('{');
    let end = text.rfind('}');
    let json = match (start, end) {
        (Some(s), Some(e)) if s < e => &text[s..=e],
        _ => {
            return Err(LlmError::ParseError(format!(
                "no JSON object in response; raw text: '{text}'"
            )));
        }
    };
    serde_json::from_str(json)
        .map_err(|e| LlmError::ParseError(format!("JSON parse error: {e}; raw text: '{text}'")))
}
