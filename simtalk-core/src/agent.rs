//! Agents ("sims") and their per-agent conversation state.

use std::collections::{HashMap, VecDeque};

use serde::{Deserialize, Serialize};

use crate::relationship::{MemoryRecord, RelationshipRecord};
use crate::types::{AgentId, Position, SimTime};

/// Text shown above an agent for a limited time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bubble {
    /// What is displayed.
    pub text: String,
    /// Seconds until the bubble disappears.
    pub remaining: f64,
}

impl Bubble {
    /// Create a bubble that lives for `display_time` seconds.
    #[must_use]
    pub fn new(text: impl Into<String>, display_time: f64) -> Self {
        Self {
            text: text.into(),
            remaining: display_time,
        }
    }

    /// Count down by `dt` seconds. Returns `true` once the bubble has expired.
    pub fn tick(&mut self, dt: f64) -> bool {
        self.remaining -= dt;
        self.remaining <= 0.0
    }
}

/// Per-agent view of the conversation it is part of.
///
/// All fields are written by the conversation manager only, in response to
/// session events. A cleared value means "not in a conversation".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ConversationFields {
    /// The other party, if this agent is in a session.
    pub partner: Option<AgentId>,
    /// Whether it is this agent's turn to speak.
    pub my_turn: bool,
    /// Whether this agent has a turn request in flight.
    pub waiting: bool,
    /// Completed turns in the current session.
    pub turn_count: u32,
    /// When the current turn request was submitted.
    pub last_response_time: Option<SimTime>,
    /// The last line this agent said, while it is still displayed.
    pub outbound: Option<Bubble>,
}

impl ConversationFields {
    /// Reset every field.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Whether every field is in its cleared state.
    #[must_use]
    pub fn is_clear(&self) -> bool {
        self.partner.is_none()
            && !self.my_turn
            && !self.waiting
            && self.turn_count == 0
            && self.last_response_time.is_none()
            && self.outbound.is_none()
    }
}

/// An autonomous simulated actor.
#[derive(Debug, Clone)]
pub struct Agent {
    /// Unique identifier.
    pub id: AgentId,
    /// Display name.
    pub name: String,
    /// Free-text personality descriptor fed into prompts.
    pub personality: String,
    /// Current position.
    pub position: Position,
    /// Whether this agent takes part in generated dialogue and thoughts.
    pub talking_enabled: bool,
    /// Whether the movement collaborator must leave this agent in place.
    pub movement_frozen: bool,
    /// When this agent last interacted with anyone.
    pub last_interaction: Option<SimTime>,
    /// Conversation state, mirrored from the owning session.
    pub conversation: ConversationFields,
    /// Ambient thought currently displayed.
    pub thought: Option<Bubble>,
    /// When this agent last asked for an ambient thought.
    pub last_thought_request: Option<SimTime>,
    mood: f32,
    relationships: HashMap<AgentId, RelationshipRecord>,
    memories: VecDeque<MemoryRecord>,
}

impl Agent {
    /// Create a new talking agent with neutral mood.
    #[must_use]
    pub fn new(name: impl Into<String>, personality: impl Into<String>, position: Position) -> Self {
        Self {
            id: AgentId::new(),
            name: name.into(),
            personality: personality.into(),
            position,
            talking_enabled: true,
            movement_frozen: false,
            last_interaction: None,
            conversation: ConversationFields::default(),
            thought: None,
            last_thought_request: None,
            mood: 0.0,
            relationships: HashMap::new(),
            memories: VecDeque::new(),
        }
    }

    /// Builder: disable generated dialogue for this agent.
    #[must_use]
    pub fn silent(mut self) -> Self {
        self.talking_enabled = false;
        self
    }

    /// Builder: start with the given mood.
    #[must_use]
    pub fn with_mood(mut self, mood: f32) -> Self {
        self.mood = mood.clamp(-1.0, 1.0);
        self
    }

    /// Current mood, -1.0 (miserable) to 1.0 (elated).
    #[must_use]
    pub const fn mood(&self) -> f32 {
        self.mood
    }

    /// Add `delta` to mood, clamped into [-1, 1]. Returns the new mood.
    pub fn adjust_mood(&mut self, delta: f32) -> f32 {
        self.mood = (self.mood + delta).clamp(-1.0, 1.0);
        self.mood
    }

    /// Short mood description for prompts.
    #[must_use]
    pub fn mood_label(&self) -> &'static str {
        match self.mood {
            m if m > 0.6 => "elated",
            m if m > 0.2 => "cheerful",
            m if m > -0.2 => "calm",
            m if m > -0.6 => "gloomy",
            _ => "miserable",
        }
    }

    /// Whether this agent is currently a party to a conversation.
    #[must_use]
    pub const fn in_conversation(&self) -> bool {
        self.conversation.partner.is_some()
    }

    /// Whether this agent is still inside its post-interaction cooldown.
    #[must_use]
    pub fn is_cooling_down(&self, now: SimTime, ignore_interaction_time: f64) -> bool {
        self.last_interaction
            .is_some_and(|at| now.elapsed_since(at) <= ignore_interaction_time)
    }

    /// The record this agent holds towards `other`, if they have met.
    #[must_use]
    pub fn relationship(&self, other: &AgentId) -> Option<&RelationshipRecord> {
        self.relationships.get(other)
    }

    /// The record towards `other`, created empty on first access.
    pub fn relationship_mut(&mut self, other: AgentId) -> &mut RelationshipRecord {
        self.relationships.entry(other).or_default()
    }

    /// Every relationship this agent holds.
    pub fn relationships(&self) -> impl Iterator<Item = (&AgentId, &RelationshipRecord)> {
        self.relationships.iter()
    }

    /// Romance this agent feels towards `other` (0.0 if they never met).
    #[must_use]
    pub fn romance_towards(&self, other: &AgentId) -> f32 {
        self.relationships.get(other).map_or(0.0, |r| r.romance)
    }

    /// Append a memory, dropping the oldest ones beyond `capacity`.
    pub fn remember(&mut self, record: MemoryRecord, capacity: usize) {
        self.memories.push_back(record);
        while self.memories.len() > capacity {
            self.memories.pop_front();
        }
    }

    /// Memory log, oldest first.
    pub fn memories(&self) -> impl Iterator<Item = &MemoryRecord> {
        self.memories.iter()
    }

    /// Count down displayed bubbles by `dt` seconds, dropping expired ones.
    pub fn tick_bubbles(&mut self, dt: f64) {
        if self.thought.as_mut().is_some_and(|b| b.tick(dt)) {
            self.thought = None;
        }
        if self.conversation.outbound.as_mut().is_some_and(|b| b.tick(dt)) {
            self.conversation.outbound = None;
        }
    }
}
