//! # simtalk Core Library
//!
//! Game-agnostic data model for simulated agents ("sims") that wander a
//! shared 2D space and talk to each other when they meet.
//!
//! - **Agents**: position, mood, relationships, memory log, and the
//!   per-agent view of the conversation they are in
//! - **Relationships**: friendship and romance, one record per side
//! - **Admission control**: the global dialogue floor and the busy set
//! - **Registry**: owned `id → agent` map with O(1) lookup
//! - **Events**: the flat event log and its sinks
//!
//! Nothing in this crate performs I/O against the generative backend; see
//! `simtalk-llm` for that and `simtalk-world` for the tick loop.

#![deny(clippy::unwrap_used)]
#![deny(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod admission;
pub mod agent;
pub mod config;
pub mod error;
pub mod events;
pub mod registry;
pub mod relationship;
pub mod transcript;
pub mod types;

pub use admission::{BusySet, DialogueFloor, FloorGuard};
pub use agent::{Agent, Bubble, ConversationFields};
pub use config::SimConfig;
pub use error::SimError;
pub use events::{EventSink, SimEvent, TerminationReason};
pub use registry::AgentRegistry;
pub use relationship::{MemoryKind, MemoryRecord, RelationshipRecord};
pub use transcript::{Transcript, TranscriptLine};
pub use types::*;
