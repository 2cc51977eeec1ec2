//! Core types for LLM requests and responses.

use serde::{Deserialize, Serialize};

/// A rendered prompt: persona/rules plus the concrete ask.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Prompt {
    /// What the prompt is for.
    pub kind: RequestKind,
    /// System prompt (persona, rules, constraints).
    pub system: String,
    /// User prompt (context and instructions).
    pub user: String,
}

impl Prompt {
    /// Create a prompt from its two halves.
    #[must_use]
    pub fn new(kind: RequestKind, system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            kind,
            system: system.into(),
            user: user.into(),
        }
    }
}

/// What kind of generation a request is for. Controls sampling defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestKind {
    /// One line of a two-party conversation.
    ConversationTurn,
    /// A solo ambient thought.
    Thought,
    /// Post-conversation romance analysis (structured JSON).
    RomanceAnalysis,
}

/// A request to the LLM.
#[derive(Debug, Clone, Serialize)]
pub struct LlmRequest {
    /// System prompt.
    pub system: String,
    /// User prompt.
    pub user: String,
    /// What the request is for.
    pub kind: RequestKind,
    /// Maximum tokens to generate.
    pub max_tokens: u32,
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f32,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
}

impl LlmRequest {
    /// Build a request for `prompt` with sampling defaults for its kind.
    #[must_use]
    pub fn for_prompt(prompt: &Prompt) -> Self {
        let kind = prompt.kind;
        let (max_tokens, temperature) = match kind {
            RequestKind::ConversationTurn => (80, 0.8),
            RequestKind::Thought => (40, 0.9),
            RequestKind::RomanceAnalysis => (120, 0.2),
        };
        Self {
            system: prompt.system.clone(),
            user: prompt.user.clone(),
            kind,
            max_tokens,
            temperature,
            timeout_ms: 5000,
        }
    }

    /// Set the timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = timeout_ms;
        self
    }
}

/// A response from the LLM.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmResponse {
    /// The generated text.
    pub text: String,
    /// How many tokens were generated.
    pub tokens_generated: u32,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Which model was used.
    pub model: String,
}

/// Structured romance analysis output (matches `ROMANCE_ANALYSIS_USER`).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RomanceVerdict {
    /// Romantic interest between the two, 0.0 to 1.0.
    pub romance: f32,
    /// One-sentence summary of the conversation.
    #[serde(default)]
    pub summary: String,
}
