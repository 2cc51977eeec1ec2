//! Error types for the simtalk core library.

use thiserror::Error;

/// Top-level error type for core simulation operations.
#[derive(Error, Debug)]
pub enum SimError {
    /// An agent with the same ID is already registered.
    #[error("Agent already registered: {0}")]
    DuplicateAgent(crate::AgentId),

    /// Configuration could not be parsed or failed validation.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for SimError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, SimError>;
