//! Configuration for the simtalk simulation.
//!
//! Maps directly to `simtalk.toml`. The recognized camelCase keys
//! (`interactionDistance`, `conversationMaxTurns`, ...) are accepted as
//! aliases of the snake_case field names.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SimError};

/// Top-level simtalk configuration, loadable from TOML.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SimConfig {
    /// Proximity, cooldown and bookkeeping settings.
    #[serde(default)]
    pub simulation: SimulationConfig,
    /// Conversation session settings.
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// Ambient thought settings.
    #[serde(default)]
    pub thought: ThoughtConfig,
    /// Generative backend settings.
    #[serde(default)]
    pub llm: LlmConfig,
}

impl SimConfig {
    /// Load configuration from a TOML string and validate it.
    ///
    /// # Errors
    /// Returns `SimError::Config` if the TOML is invalid or fails validation.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(toml_str).map_err(|e| SimError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Check cross-field constraints.
    ///
    /// # Errors
    /// Returns `SimError::Config` describing the first violated constraint.
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulation;
        if sim.interaction_distance <= 0.0 {
            return Err(SimError::Config(
                "interaction_distance must be positive".into(),
            ));
        }
        if sim.min_separation < 0.0 || sim.min_separation > sim.interaction_distance {
            return Err(SimError::Config(format!(
                "min_separation ({}) must lie in [0, interaction_distance ({})]",
                sim.min_separation, sim.interaction_distance
            )));
        }
        if sim.ignore_interaction_time < 0.0 {
            return Err(SimError::Config(
                "ignore_interaction_time must not be negative".into(),
            ));
        }
        let conv = &self.conversation;
        if conv.max_turns < 2 {
            return Err(SimError::Config(format!(
                "conversation max_turns must be at least 2 (got {})",
                conv.max_turns
            )));
        }
        if conv.response_timeout <= 0.0 {
            return Err(SimError::Config(
                "conversation response_timeout must be positive".into(),
            ));
        }
        if !(0.0..=1.0).contains(&conv.high_romance_threshold) {
            return Err(SimError::Config(format!(
                "high_romance_threshold must lie in [0, 1] (got {})",
                conv.high_romance_threshold
            )));
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// Proximity detection and relationship bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Pairs closer than this (world units) interact.
    #[serde(default = "default_interaction_distance", alias = "interactionDistance")]
    pub interaction_distance: f32,
    /// Pairs closer than this are pushed apart to exactly this distance.
    #[serde(default = "default_min_separation", alias = "minSeparation")]
    pub min_separation: f32,
    /// Seconds an agent ignores new interactions after its last one.
    #[serde(default = "default_ignore_time", alias = "ignoreInteractionTime")]
    pub ignore_interaction_time: f64,
    /// Friendship gained by both sides on every encounter.
    #[serde(default = "default_0_01")]
    pub friendship_increment: f32,
    /// Mood gained by both sides on every encounter.
    #[serde(default = "default_0_01")]
    pub mood_increment: f32,
    /// Memory records kept per agent (oldest dropped first).
    #[serde(default = "default_100")]
    pub max_memories_per_agent: usize,
    /// RNG seed for reproducible runs; random when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            interaction_distance: 50.0,
            min_separation: 20.0,
            ignore_interaction_time: 10.0,
            friendship_increment: 0.01,
            mood_increment: 0.01,
            max_memories_per_agent: 100,
            seed: None,
        }
    }
}

/// Conversation session tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Seconds a speaker may wait for its reply before the session ends.
    #[serde(default = "default_response_timeout", alias = "conversationResponseTimeout")]
    pub response_timeout: f64,
    /// Total turns per conversation, split evenly between the two speakers.
    #[serde(default = "default_max_turns", alias = "conversationMaxTurns")]
    pub max_turns: u32,
    /// Seconds a spoken line stays in the speech bubble.
    #[serde(default = "default_bubble_time", alias = "bubbleDisplayTime")]
    pub bubble_display_time: f64,
    /// Romance score at which prompts switch to a flirtatious tone.
    #[serde(default = "default_romance_threshold", alias = "highRomanceThreshold")]
    pub high_romance_threshold: f32,
}

impl ConversationConfig {
    /// Turns each participant gets before the session terminates.
    #[must_use]
    pub const fn max_turns_per_agent(&self) -> u32 {
        self.max_turns / 2
    }
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            response_timeout: 30.0,
            max_turns: 6,
            bubble_display_time: 5.0,
            high_romance_threshold: 0.7,
        }
    }
}

/// Ambient thought generation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ThoughtConfig {
    /// Whether idle agents request thoughts at all.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Minimum seconds between two thought requests from the same agent.
    #[serde(default = "default_thought_interval")]
    pub interval: f64,
    /// Seconds a thought stays on screen.
    #[serde(default = "default_bubble_time")]
    pub display_time: f64,
}

impl Default for ThoughtConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            interval: 20.0,
            display_time: 5.0,
        }
    }
}

/// Generative backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// Provider: "ollama", "openai", "none".
    #[serde(default = "default_ollama")]
    pub provider: String,
    /// Base URL for the LLM API.
    #[serde(default = "default_ollama_url")]
    pub base_url: String,
    /// API key for OpenAI-compatible providers.
    #[serde(default)]
    pub api_key: String,
    /// Model name.
    #[serde(default = "default_model")]
    pub model: String,
    /// Hard timeout for any single backend call in milliseconds.
    #[serde(default = "default_5000")]
    pub request_timeout_ms: u64,
    /// Retries before the call is reported as failed.
    #[serde(default = "default_1")]
    pub max_retries: u32,
    /// Text delivered in place of a failed generation.
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "ollama".to_string(),
            base_url: "http://localhost:11434".to_string(),
            api_key: String::new(),
            model: "qwen2.5:1.5b".to_string(),
            request_timeout_ms: 5000,
            max_retries: 1,
            placeholder: "(model unavailable)".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_ollama() -> String { "ollama".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_model() -> String { "qwen2.5:1.5b".to_string() }
fn default_placeholder() -> String { "(model unavailable)".to_string() }
fn default_interaction_distance() -> f32 { 50.0 }
fn default_min_separation() -> f32 { 20.0 }
fn default_ignore_time() -> f64 { 10.0 }
fn default_response_timeout() -> f64 { 30.0 }
fn default_bubble_time() -> f64 { 5.0 }
fn default_thought_interval() -> f64 { 20.0 }
fn default_romance_threshold() -> f32 { 0.7 }
fn default_0_01() -> f32 { 0.01 }
fn default_1() -> u32 { 1 }
fn default_max_turns() -> u32 { 6 }
fn default_100() -> usize { 100 }
fn default_5000() -> u64 { 5000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_validate() {
        assert!(SimConfig::default().validate().is_ok());
    }

    #[test]
    fn empty_toml_yields_defaults() {
        let config = SimConfig::from_toml("").expect("empty config parses");
        assert_eq!(config.conversation.max_turns, 6);
        assert_eq!(config.conversation.max_turns_per_agent(), 3);
        assert_eq!(config.llm.placeholder, "(model unavailable)");
    }

    #[test]
    fn camel_case_keys_are_recognized() {
        let config = SimConfig::from_toml(
            r#"
            [simulation]
            interactionDistance = 80.0
            ignoreInteractionTime = 4.0

            [conversation]
            conversationResponseTimeout = 12.0
            conversationMaxTurns = 4
            bubbleDisplayTime = 2.5
            highRomanceThreshold = 0.9
            "#,
        )
        .expect("camelCase config parses");

        assert!((config.simulation.interaction_distance - 80.0).abs() < f32::EPSILON);
        assert!((config.simulation.ignore_interaction_time - 4.0).abs() < f64::EPSILON);
        assert!((config.conversation.response_timeout - 12.0).abs() < f64::EPSILON);
        assert_eq!(config.conversation.max_turns_per_agent(), 2);
        assert!((config.conversation.bubble_display_time - 2.5).abs() < f64::EPSILON);
        assert!((config.conversation.high_romance_threshold - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn odd_turn_budget_rounds_down() {
        let conv = ConversationConfig {
            max_turns: 5,
            ..ConversationConfig::default()
        };
        assert_eq!(conv.max_turns_per_agent(), 2);
    }

    #[test]
    fn rejects_separation_beyond_interaction_range() {
        let result = SimConfig::from_toml(
            r"
            [simulation]
            interaction_distance = 10.0
            min_separation = 30.0
            ",
        );
        assert!(matches!(result, Err(SimError::Config(_))));
    }

    #[test]
    fn rejects_single_turn_conversations() {
        let result = SimConfig::from_toml(
            r"
            [conversation]
            max_turns = 1
            ",
        );
        assert!(result.is_err());
    }

    #[test]
    fn rejects_malformed_toml() {
        assert!(SimConfig::from_toml("[simulation\nbroken").is_err());
    }
}
