//! # simtalk-llm — Generative Backend Layer for simtalk
//!
//! Every line a sim says or thinks comes from a slow, fallible text
//! generator. This crate hides that behind two pieces:
//!   - [`GenerativeBackend`]: the single `generate(&Prompt)` seam, with
//!     [`LlmClient`] talking to **Ollama** or any **OpenAI-compatible** API
//!   - [`GenerativeClient`]: fire-and-forget submission keyed by
//!     requester, one tokio task per request, non-blocking result polling
//!
//! Failures never escape the dispatcher. Backend errors, panics and
//! timeouts are delivered as placeholder text so the simulation always
//! gets exactly one result per accepted request.
//!
//! # Architecture
//!
//! ```text
//! tick loop ──submit(id, prompt)──▶ GenerativeClient ──spawn──▶ worker task
//!     ▲                               │ pending: id → request       │
//!     │                               │                             ▼
//!     └──────poll_result()◀── mpsc ◀──┴──── (id, text | placeholder) backend.generate()
//! ```

#![deny(clippy::unwrap_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod client;
pub mod dispatch;
pub mod error;
pub mod prompt;
pub mod types;

pub use client::{GenerativeBackend, LlmClient, LlmProvider, parse_structured};
pub use dispatch::{DEFAULT_PLACEHOLDER, DispatchStats, GenerativeClient};
pub use error::LlmError;
pub use types::{LlmRequest, LlmResponse, Prompt, RequestKind, RomanceVerdict};
