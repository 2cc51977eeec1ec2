//! Relationship records and the per-agent memory log.
//!
//! Every agent keeps its own copy of the record it holds towards each
//! other agent. The two copies are updated together by the interaction
//! detector and the romance analysis, but are never shared.

use serde::{Deserialize, Serialize};

use crate::types::{AgentId, SimTime};

/// How one agent feels about another.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct RelationshipRecord {
    /// Friendship, 0.0 (stranger) to 1.0 (best friend).
    pub friendship: f32,
    /// Romantic interest, 0.0 (none) to 1.0 (infatuated).
    pub romance: f32,
}

impl RelationshipRecord {
    /// Create a record, clamping both values into [0, 1].
    #[must_use]
    pub fn new(friendship: f32, romance: f32) -> Self {
        Self {
            friendship: friendship.clamp(0.0, 1.0),
            romance: romance.clamp(0.0, 1.0),
        }
    }

    /// Add `delta` to friendship, clamped into [0, 1]. Returns the applied change.
    pub fn add_friendship(&mut self, delta: f32) -> f32 {
        let before = self.friendship;
        self.friendship = (self.friendship + delta).clamp(0.0, 1.0);
        self.friendship - before
    }

    /// Overwrite the romance score, clamped into [0, 1].
    pub fn set_romance(&mut self, romance: f32) {
        self.romance = romance.clamp(0.0, 1.0);
    }
}

/// What an agent remembers about an encounter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MemoryKind {
    /// The two agents crossed paths.
    Encounter,
    /// The two agents finished a conversation of this many lines.
    Conversation {
        /// Number of transcript lines exchanged.
        lines: usize,
    },
}

/// A single entry in an agent's memory log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryRecord {
    /// When it happened.
    pub at: SimTime,
    /// Who else was involved.
    pub other: AgentId,
    /// What happened.
    pub kind: MemoryKind,
}

impl MemoryRecord {
    /// Record an encounter with `other`.
    #[must_use]
    pub const fn encounter(at: SimTime, other: AgentId) -> Self {
        Self {
            at,
            other,
            kind: MemoryKind::Encounter,
        }
    }

    /// Record a finished conversation with `other`.
    #[must_use]
    pub const fn conversation(at: SimTime, other: AgentId, lines: usize) -> Self {
        Self {
            at,
            other,
            kind: MemoryKind::Conversation { lines },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn friendship_saturates_at_one() {
        let mut rec = RelationshipRecord::new(0.995, 0.0);
        let applied = rec.add_friendship(0.01);
        assert!((rec.friendship - 1.0).abs() < f32::EPSILON);
        assert!(applied < 0.01);
        assert!(rec.add_friendship(0.01).abs() < f32::EPSILON);
    }

    #[test]
    fn romance_is_clamped() {
        let mut rec = RelationshipRecord::default();
        rec.set_romance(3.0);
        assert!((rec.romance - 1.0).abs() < f32::EPSILON);
        rec.set_romance(-0.5);
        assert!(rec.romance.abs() < f32::EPSILON);
    }
}
