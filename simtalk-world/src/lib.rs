//! # simtalk-world — the simulation layer
//!
//! Wires the game-agnostic data model from `simtalk-core` and the
//! generative dispatcher from `simtalk-llm` into a tick-driven world where
//! agents wander, bump into each other and hold short generated
//! conversations.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────── Simulation::tick ────────────────────────┐
//! │                                                                  │
//! │  Movement ─▶ InteractionDetector ─▶ ConversationManager          │
//! │                                        │   ▲        │            │
//! │                           DialogueFloor│   │results │ transcript │
//! │                                        ▼   │        ▼            │
//! │  ThoughtRequestor ──────────▶ GenerativeClient   RomanceAnalyzer │
//! │                                                                  │
//! └──────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - `conversation`: session state machine and the manager that mirrors
//!   it onto agents
//! - `interaction`: pair scan, separation, relationship bookkeeping
//! - `thought`: ambient thoughts for idle agents
//! - `romance`: post-conversation romance analysis
//! - `movement`: movement collaborator (`Wander`, `Stationary`)
//! - `simulation`: the tick loop

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod conversation;
pub mod interaction;
pub mod movement;
pub mod romance;
pub mod simulation;
pub mod thought;

pub use conversation::{ConversationManager, ConversationSession, SessionEvent, SessionState};
pub use interaction::{InteractionDetector, InteractionReport};
pub use movement::{Movement, Stationary, Wander};
pub use romance::{AnalysisRequest, LlmRomanceAnalyzer, NullRomanceAnalyzer, RomanceAnalyzer, RomanceOutcome};
pub use simulation::{Simulation, TickReport};
pub use thought::ThoughtRequestor;
