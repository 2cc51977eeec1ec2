//! Core type definitions shared by every simtalk crate.
//!
//! All types are serializable so they can be written to the flat event log.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for a simulated agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct AgentId(pub Uuid);

impl AgentId {
    /// Create a new random agent ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a conversation session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A 2D position in world units.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}

impl Position {
    /// Create a new position.
    #[must_use]
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to `other`.
    #[must_use]
    pub fn distance(&self, other: &Self) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.1}, {:.1})", self.x, self.y)
    }
}

// ---------------------------------------------------------------------------
// Time
// ---------------------------------------------------------------------------

/// Simulation clock reading, in seconds since the simulation started.
///
/// The clock is supplied by the caller of the simulation tick, so every
/// timeout in this workspace is deterministic under test.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct SimTime(pub f64);

impl SimTime {
    /// The start of the simulation.
    pub const ZERO: Self = Self(0.0);

    /// Create a timestamp from seconds.
    #[must_use]
    pub const fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Seconds since the start of the simulation.
    #[must_use]
    pub const fn as_secs(self) -> f64 {
        self.0
    }

    /// Seconds elapsed since `earlier`. Never negative.
    #[must_use]
    pub fn elapsed_since(self, earlier: Self) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }

    /// This timestamp shifted forward by `secs`.
    #[must_use]
    pub fn plus(self, secs: f64) -> Self {
        Self(self.0 + secs)
    }
}

impl fmt::Display for SimTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "t={:.2}s", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn distance_is_euclidean() {
        let a = Position::new(0.0, 0.0);
        let b = Position::new(3.0, 4.0);
        assert!((a.distance(&b) - 5.0).abs() < f32::EPSILON);
        assert!((b.distance(&a) - 5.0).abs() < f32::EPSILON);
    }

    #[test]
    fn elapsed_never_negative() {
        let early = SimTime::from_secs(10.0);
        let late = SimTime::from_secs(12.5);
        assert!((late.elapsed_since(early) - 2.5).abs() < f64::EPSILON);
        assert!(early.elapsed_since(late).abs() < f64::EPSILON);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(AgentId::new(), AgentId::new());
        assert_ne!(SessionId::new(), SessionId::new());
    }
}
