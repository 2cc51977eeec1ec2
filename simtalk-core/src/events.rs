//! Simulation events and the logging collaborator.
//!
//! Every component reports what happened through an [`EventSink`]. Sinks are
//! pure: they never feed anything back into the simulation.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::types::{AgentId, SessionId, SimTime};

/// Why a conversation session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TerminationReason {
    /// Both speakers used up their turns.
    MaxTurns,
    /// A reply did not arrive within the response timeout.
    TimedOut,
    /// The other party could not be found.
    PartnerMissing,
    /// The generative client refused the turn request.
    DispatchRejected,
    /// A participant was removed from the simulation.
    Removed,
}

impl std::fmt::Display for TerminationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::MaxTurns => "max_turns",
            Self::TimedOut => "timed_out",
            Self::PartnerMissing => "partner_missing",
            Self::DispatchRejected => "dispatch_rejected",
            Self::Removed => "removed",
        };
        write!(f, "{name}")
    }
}

/// Something worth writing to the event log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum SimEvent {
    /// Two agents came within interaction range.
    Interaction {
        /// Simulation time.
        at: SimTime,
        /// First agent.
        a: AgentId,
        /// Second agent.
        b: AgentId,
        /// Friendship actually added to each side.
        friendship_delta: f32,
    },
    /// An agent's mood changed.
    Mood {
        /// Simulation time.
        at: SimTime,
        /// Whose mood.
        agent: AgentId,
        /// The new mood.
        mood: f32,
    },
    /// A conversation session started.
    SessionOpened {
        /// Simulation time.
        at: SimTime,
        /// The new session.
        session: SessionId,
        /// Who speaks first.
        first_speaker: AgentId,
        /// Who listens first.
        listener: AgentId,
    },
    /// A line was spoken.
    Line {
        /// Simulation time.
        at: SimTime,
        /// Owning session.
        session: SessionId,
        /// Who said it.
        speaker: AgentId,
        /// What was said.
        line: String,
    },
    /// A conversation session ended.
    SessionClosed {
        /// Simulation time.
        at: SimTime,
        /// The finished session.
        session: SessionId,
        /// Why it ended.
        reason: TerminationReason,
        /// Lines exchanged before it ended.
        lines: usize,
    },
    /// An agent had an ambient thought.
    Thought {
        /// Simulation time.
        at: SimTime,
        /// Who thought it.
        agent: AgentId,
        /// The thought.
        text: String,
    },
    /// A romance analysis updated a relationship.
    Romance {
        /// Simulation time.
        at: SimTime,
        /// First agent.
        a: AgentId,
        /// Second agent.
        b: AgentId,
        /// The new romance score.
        romance: f32,
    },
}

/// Receives simulation events.
pub trait EventSink: Send + Sync {
    /// Record one event.
    fn record(&self, event: SimEvent);

    /// Record an interaction between `a` and `b`.
    fn log_interaction(&self, at: SimTime, a: AgentId, b: AgentId, friendship_delta: f32) {
        self.record(SimEvent::Interaction {
            at,
            a,
            b,
            friendship_delta,
        });
    }

    /// Record an agent's new mood.
    fn log_mood(&self, at: SimTime, agent: AgentId, mood: f32) {
        self.record(SimEvent::Mood { at, agent, mood });
    }
}

// ---------------------------------------------------------------------------
// Sinks
// ---------------------------------------------------------------------------

/// Emits every event as a structured `tracing` event.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl EventSink for TracingSink {
    fn record(&self, event: SimEvent) {
        match &event {
            SimEvent::Interaction { at, a, b, friendship_delta } => {
                info!(target: "simtalk::events", at = at.as_secs(), %a, %b, friendship_delta, "interaction");
            }
            SimEvent::Mood { at, agent, mood } => {
                info!(target: "simtalk::events", at = at.as_secs(), %agent, mood, "mood");
            }
            SimEvent::SessionOpened { at, session, first_speaker, listener } => {
                info!(target: "simtalk::events", at = at.as_secs(), %session, %first_speaker, %listener, "session opened");
            }
            SimEvent::Line { at, session, speaker, line } => {
                info!(target: "simtalk::events", at = at.as_secs(), %session, %speaker, line = %line, "line");
            }
            SimEvent::SessionClosed { at, session, reason, lines } => {
                info!(target: "simtalk::events", at = at.as_secs(), %session, %reason, lines, "session closed");
            }
            SimEvent::Thought { at, agent, text } => {
                info!(target: "simtalk::events", at = at.as_secs(), %agent, text = %text, "thought");
            }
            SimEvent::Romance { at, a, b, romance } => {
                info!(target: "simtalk::events", at = at.as_secs(), %a, %b, romance, "romance");
            }
        }
    }
}

/// Keeps events in memory. Clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<SimEvent>>>,
}

impl MemorySink {
    /// Create an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of everything recorded so far.
    #[must_use]
    pub fn events(&self) -> Vec<SimEvent> {
        self.events.lock().clone()
    }

    /// Number of events recorded so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    /// Whether nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl EventSink for MemorySink {
    fn record(&self, event: SimEvent) {
        self.events.lock().push(event);
    }
}

/// One line of the JSONL event log.
#[derive(Debug, Serialize, Deserialize)]
pub struct LogLine {
    /// Wall-clock time the event was written.
    pub recorded_at: DateTime<Utc>,
    /// The event itself.
    #[serde(flatten)]
    pub event: SimEvent,
}

/// Appends events to a flat JSON-lines file.
#[derive(Debug)]
pub struct JsonlSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonlSink {
    /// Create (or truncate) the log file at `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be created.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Flush buffered lines to disk.
    ///
    /// # Errors
    /// Returns an error if the underlying write fails.
    pub fn flush(&self) -> Result<()> {
        self.writer.lock().flush()?;
        Ok(())
    }
}

impl EventSink for JsonlSink {
    fn record(&self, event: SimEvent) {
        let line = LogLine {
            recorded_at: Utc::now(),
            event,
        };
        let mut writer = self.writer.lock();
        let written = serde_json::to_writer(&mut *writer, &line)
            .map_err(std::io::Error::from)
            .and_then(|()| writer.write_all(b"\n"));
        if let Err(e) = written {
            warn!("failed to write event log line: {e}");
        }
    }
}

impl Drop for JsonlSink {
    fn drop(&mut self) {
        if let Err(e) = self.writer.get_mut().flush() {
            warn!("failed to flush event log: {e}");
        }
    }
}
