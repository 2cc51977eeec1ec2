//! Conversation sessions — the per-pair turn-taking state machine.
//!
//! A [`ConversationSession`] owns one pair of agents for the length of a
//! dialogue. It never touches the agents directly: every transition yields
//! [`SessionEvent`]s, and the [`ConversationManager`] applies them to both
//! agents' [`ConversationFields`](simtalk_core::ConversationFields) in one
//! place.
//!
//! ```text
//!   open ──TurnGranted(s)──▶ AwaitingTurn(s)
//!                               │ floor acquired, request submitted
//!                               ▼
//!                         RequestInFlight(s) ──timeout / max turns──▶ Terminated
//!                               │ line for s arrives
//!                               ▼
//!              LineSpoken(s) ── s out of turns? ──yes──▶ Terminated(MaxTurns)
//!                               │ no
//!                               ▼
//!                   TurnGranted(listener) ──▶ AwaitingTurn(listener)
//! ```
//!
//! The floor is released as soon as a turn request has been submitted, not
//! when the reply arrives. It bounds how many submissions happen at once,
//! not how many requests the backend is serving.

use std::collections::HashMap;
use std::sync::Arc;

use rand::Rng;
use simtalk_core::{
    AgentId, AgentRegistry, Bubble, BusySet, DialogueFloor, EventSink, MemoryRecord, SessionId,
    SimEvent, SimTime, TerminationReason, Transcript, config::ConversationConfig,
};
use simtalk_llm::prompt::{self, TurnContext};
use simtalk_llm::{GenerativeBackend, GenerativeClient};
use tracing::{debug, info, warn};

use crate::movement::Movement;
use crate::romance::{AnalysisRequest, RomanceAnalyzer};

// ---------------------------------------------------------------------------
// Session
// ---------------------------------------------------------------------------

/// Where a session is in its turn cycle.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SessionState {
    /// `speaker` may submit its next turn once it gets the floor.
    AwaitingTurn(AgentId),
    /// `speaker` submitted a turn at `since` and is waiting for the line.
    RequestInFlight {
        /// Who is waiting.
        speaker: AgentId,
        /// When the request was submitted.
        since: SimTime,
    },
    /// The session is over.
    Terminated(TerminationReason),
}

/// A transition the manager must mirror onto the agents.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// `speaker` holds the turn; `listener` waits.
    TurnGranted {
        /// Who speaks next.
        speaker: AgentId,
        /// Who listens.
        listener: AgentId,
    },
    /// `speaker` said `line`.
    LineSpoken {
        /// Who spoke.
        speaker: AgentId,
        /// Who heard it.
        listener: AgentId,
        /// What was said.
        line: String,
    },
    /// The session ended.
    Terminated {
        /// Why.
        reason: TerminationReason,
    },
}

/// One active two-party dialogue.
#[derive(Debug, Clone)]
pub struct ConversationSession {
    id: SessionId,
    participants: [AgentId; 2],
    transcript: Transcript,
    turns: [u32; 2],
    state: SessionState,
    created_at: SimTime,
    last_activity: SimTime,
}

impl ConversationSession {
    /// Start a session between `a` and `b`. `a` speaks first iff
    /// `a_speaks_first`.
    #[must_use]
    pub fn open(a: AgentId, b: AgentId, a_speaks_first: bool, now: SimTime) -> (Self, SessionEvent) {
        let (speaker, listener) = if a_speaks_first { (a, b) } else { (b, a) };
        let session = Self {
            id: SessionId::new(),
            participants: [a, b],
            transcript: Transcript::new(),
            turns: [0, 0],
            state: SessionState::AwaitingTurn(speaker),
            created_at: now,
            last_activity: now,
        };
        (session, SessionEvent::TurnGranted { speaker, listener })
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Both participants, in the order they were given to `open`.
    #[must_use]
    pub fn participants(&self) -> [AgentId; 2] {
        self.participants
    }

    /// Current state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Everything said so far.
    #[must_use]
    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    /// When the session was opened.
    #[must_use]
    pub fn created_at(&self) -> SimTime {
        self.created_at
    }

    /// When the session last changed state.
    #[must_use]
    pub fn last_activity(&self) -> SimTime {
        self.last_activity
    }

    /// Whether `agent` is one of the two participants.
    #[must_use]
    pub fn involves(&self, agent: &AgentId) -> bool {
        self.participants.contains(agent)
    }

    /// The other participant.
    #[must_use]
    pub fn partner_of(&self, agent: &AgentId) -> Option<AgentId> {
        match self.slot(agent)? {
            0 => Some(self.participants[1]),
            _ => Some(self.participants[0]),
        }
    }

    /// Completed turns by `agent` (0 for non-participants).
    #[must_use]
    pub fn turns_of(&self, agent: &AgentId) -> u32 {
        self.slot(agent).map_or(0, |i| self.turns[i])
    }

    /// Who currently holds the turn, if the session is live.
    #[must_use]
    pub fn current_speaker(&self) -> Option<AgentId> {
        match self.state {
            SessionState::AwaitingTurn(speaker) | SessionState::RequestInFlight { speaker, .. } => {
                Some(speaker)
            }
            SessionState::Terminated(_) => None,
        }
    }

    /// Whether the session is over.
    #[must_use]
    pub fn is_terminated(&self) -> bool {
        matches!(self.state, SessionState::Terminated(_))
    }

    /// Why the session ended, if it has.
    #[must_use]
    pub fn termination_reason(&self) -> Option<TerminationReason> {
        match self.state {
            SessionState::Terminated(reason) => Some(reason),
            _ => None,
        }
    }

    /// Whether a line from `speaker` would be accepted right now.
    #[must_use]
    pub fn is_waiting_on(&self, speaker: &AgentId) -> bool {
        matches!(self.state, SessionState::RequestInFlight { speaker: s, .. } if s == *speaker)
    }

    fn slot(&self, agent: &AgentId) -> Option<usize> {
        self.participants.iter().position(|p| p == agent)
    }

    /// `AwaitingTurn(s)` → `RequestInFlight { s, now }`. Returns `false` in
    /// any other state.
    pub fn begin_request(&mut self, now: SimTime) -> bool {
        let SessionState::AwaitingTurn(speaker) = self.state else {
            return false;
        };
        self.state = SessionState::RequestInFlight { speaker, since: now };
        self.last_activity = now;
        true
    }

    /// End the session if the in-flight reply is overdue or the current
    /// speaker is already out of turns.
    pub fn check_expiry(
        &mut self,
        now: SimTime,
        response_timeout: f64,
        max_turns_per_agent: u32,
    ) -> Option<SessionEvent> {
        if let SessionState::RequestInFlight { since, .. } = self.state {
            if now.elapsed_since(since) > response_timeout {
                return self.terminate(TerminationReason::TimedOut);
            }
        }
        let speaker = self.current_speaker()?;
        if self.turns_of(&speaker) >= max_turns_per_agent {
            return self.terminate(TerminationReason::MaxTurns);
        }
        None
    }

    /// Accept the line `speaker` was waiting for.
    ///
    /// Returns no events if the session was not waiting on `speaker`.
    pub fn accept_line(
        &mut self,
        speaker: AgentId,
        speaker_name: &str,
        line: String,
        now: SimTime,
        max_turns_per_agent: u32,
    ) -> Vec<SessionEvent> {
        if !self.is_waiting_on(&speaker) {
            return Vec::new();
        }
        let (Some(slot), Some(listener)) = (self.slot(&speaker), self.partner_of(&speaker)) else {
            return Vec::new();
        };

        self.transcript.push(speaker, speaker_name, line.clone());
        self.turns[slot] += 1;
        self.last_activity = now;

        let mut events = vec![SessionEvent::LineSpoken {
            speaker,
            listener,
            line,
        }];
        if self.turns[slot] >= max_turns_per_agent {
            events.extend(self.terminate(TerminationReason::MaxTurns));
        } else {
            self.state = SessionState::AwaitingTurn(listener);
            events.push(SessionEvent::TurnGranted {
                speaker: listener,
                listener: speaker,
            });
        }
        events
    }

    /// End the session. Returns `None` if it had already ended.
    pub fn terminate(&mut self, reason: TerminationReason) -> Option<SessionEvent> {
        if self.is_terminated() {
            return None;
        }
        self.state = SessionState::Terminated(reason);
        Some(SessionEvent::Terminated { reason })
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// Owns every live session and mirrors session events onto agents.
pub struct ConversationManager {
    config: ConversationConfig,
    memory_capacity: usize,
    floor: Arc<DialogueFloor>,
    busy: Arc<BusySet>,
    sessions: Vec<ConversationSession>,
    by_agent: HashMap<AgentId, SessionId>,
}

impl ConversationManager {
    /// Create a manager sharing the given floor and busy set.
    #[must_use]
    pub fn new(
        config: ConversationConfig,
        memory_capacity: usize,
        floor: Arc<DialogueFloor>,
        busy: Arc<BusySet>,
    ) -> Self {
        Self {
            config,
            memory_capacity,
            floor,
            busy,
            sessions: Vec::new(),
            by_agent: HashMap::new(),
        }
    }

    /// Live and not-yet-reaped sessions, oldest first.
    #[must_use]
    pub fn sessions(&self) -> &[ConversationSession] {
        &self.sessions
    }

    /// The session `agent` belongs to.
    #[must_use]
    pub fn session_for(&self, agent: &AgentId) -> Option<&ConversationSession> {
        let id = self.by_agent.get(agent)?;
        self.sessions.iter().find(|s| s.id == *id)
    }

    /// Whether `agent` is claimed by any session.
    #[must_use]
    pub fn is_busy(&self, agent: &AgentId) -> bool {
        self.busy.contains(agent)
    }

    /// Whether `agent` is in a session that is waiting on its line.
    #[must_use]
    pub fn is_awaiting_reply(&self, agent: &AgentId) -> bool {
        self.session_for(agent).is_some_and(|s| s.is_waiting_on(agent))
    }

    fn session_mut(&mut self, agent: &AgentId) -> Option<&mut ConversationSession> {
        let id = self.by_agent.get(agent)?;
        self.sessions.iter_mut().find(|s| s.id == *id)
    }

    /// Open a session between `a` and `b`.
    ///
    /// Freezes both agents, stamps their interaction time and picks the
    /// first speaker at random. Returns `None` without side effects if
    /// either agent is missing or already busy.
    #[allow(clippy::too_many_arguments)]
    pub fn open<R: Rng>(
        &mut self,
        registry: &mut AgentRegistry,
        a: AgentId,
        b: AgentId,
        now: SimTime,
        rng: &mut R,
        movement: &mut dyn Movement,
        sink: &dyn EventSink,
    ) -> Option<SessionId> {
        if !registry.contains(&a) || !registry.contains(&b) {
            return None;
        }
        if !self.busy.try_claim_pair(a, b) {
            debug!(%a, %b, "Pair already busy, not opening session");
            return None;
        }
        let Some((agent_a, agent_b)) = registry.pair_mut(&a, &b) else {
            self.busy.release(&a);
            self.busy.release(&b);
            return None;
        };
        for agent in [agent_a, agent_b] {
            movement.set_frozen(agent, true);
            agent.last_interaction = Some(now);
        }

        let (session, event) = ConversationSession::open(a, b, rng.gen_bool(0.5), now);
        let id = session.id;
        if let SessionEvent::TurnGranted { speaker, listener } = &event {
            info!(session = %id, first_speaker = %speaker, listener = %listener, "Conversation opened");
            sink.record(SimEvent::SessionOpened {
                at: now,
                session: id,
                first_speaker: *speaker,
                listener: *listener,
            });
        }
        self.by_agent.insert(a, id);
        self.by_agent.insert(b, id);
        self.sessions.push(session);
        apply_event(registry, self.config.bubble_display_time, id, &event, now, sink);
        Some(id)
    }

    /// End sessions whose reply is overdue or whose speaker is out of turns.
    pub fn expire(&mut self, now: SimTime) {
        let timeout = self.config.response_timeout;
        let max_turns = self.config.max_turns_per_agent();
        for session in &mut self.sessions {
            if let Some(SessionEvent::Terminated { reason }) =
                session.check_expiry(now, timeout, max_turns)
            {
                info!(session = %session.id, %reason, "Conversation expired");
            }
        }
    }

    /// Route a generated line to the session waiting on `speaker`.
    ///
    /// Returns `true` if the session consumed the result, `false` if nobody
    /// was waiting for it (a late or misrouted result).
    pub fn deliver(
        &mut self,
        registry: &mut AgentRegistry,
        speaker: AgentId,
        line: String,
        now: SimTime,
        sink: &dyn EventSink,
    ) -> bool {
        let bubble_time = self.config.bubble_display_time;
        let max_turns = self.config.max_turns_per_agent();
        let Some(session) = self.session_mut(&speaker) else {
            return false;
        };
        if !session.is_waiting_on(&speaker) {
            debug!(session = %session.id, %speaker, "Discarding line nobody is waiting for");
            return false;
        }

        let listener_present = session.partner_of(&speaker).is_some_and(|l| registry.contains(&l));
        let speaker_name = registry.get(&speaker).map(|a| a.name.clone());
        let (true, Some(speaker_name)) = (listener_present, speaker_name) else {
            if session.terminate(TerminationReason::PartnerMissing).is_some() {
                warn!(session = %session.id, %speaker, "Conversation partner vanished");
            }
            return true;
        };

        let id = session.id;
        let events = session.accept_line(speaker, &speaker_name, line, now, max_turns);
        for event in &events {
            apply_event(registry, bubble_time, id, event, now, sink);
        }
        true
    }

    /// Let every session awaiting a turn try to submit it.
    ///
    /// Each submission holds the floor only for the duration of `submit`.
    /// A session that cannot get the floor simply retries next tick.
    pub fn advance_turns<B: GenerativeBackend>(
        &mut self,
        registry: &mut AgentRegistry,
        client: &GenerativeClient<AgentId, B>,
        now: SimTime,
    ) {
        let threshold = self.config.high_romance_threshold;
        for session in &mut self.sessions {
            let SessionState::AwaitingTurn(speaker) = session.state else {
                continue;
            };
            let Some(listener) = session.partner_of(&speaker) else {
                continue;
            };
            let (Some(sp), Some(li)) = (registry.get(&speaker), registry.get(&listener)) else {
                if session.terminate(TerminationReason::PartnerMissing).is_some() {
                    warn!(session = %session.id, %speaker, %listener, "Conversation partner vanished");
                }
                continue;
            };
            if !sp.conversation.my_turn || sp.conversation.waiting {
                continue;
            }
            let Some(guard) = self.floor.try_acquire() else {
                continue;
            };

            let turn_prompt = prompt::conversation_turn(&TurnContext {
                speaker_name: &sp.name,
                personality: &sp.personality,
                listener_name: &li.name,
                transcript: &session.transcript,
                friendship: sp.relationship(&listener).map_or(0.0, |r| r.friendship),
                romance: sp.romance_towards(&listener),
                romance_threshold: threshold,
            });
            let accepted = client.submit(speaker, turn_prompt);
            guard.release();

            if accepted {
                session.begin_request(now);
                if let Some(sp) = registry.get_mut(&speaker) {
                    sp.conversation.waiting = true;
                    sp.conversation.last_response_time = Some(now);
                }
                debug!(session = %session.id, %speaker, turn = session.turns_of(&speaker) + 1, "Turn submitted");
            } else if session.terminate(TerminationReason::DispatchRejected).is_some() {
                warn!(session = %session.id, %speaker, "Turn request rejected by dispatcher");
            }
        }
    }

    /// End the session `agent` is in, if any. Idempotent.
    pub fn terminate_for(&mut self, agent: &AgentId, reason: TerminationReason) -> bool {
        let Some(session) = self.session_mut(agent) else {
            return false;
        };
        let ended = session.terminate(reason).is_some();
        if ended {
            info!(session = %session.id, %agent, %reason, "Conversation terminated");
        }
        ended
    }

    /// Tear down every terminated session.
    ///
    /// For each participant still in the registry: leave the busy set,
    /// reset its conversation fields, unfreeze it and remember the
    /// conversation. Sessions with at least one line whose two parties both
    /// still exist are handed to the romance analyzer. Returns how many
    /// sessions were reaped.
    pub fn reap(
        &mut self,
        registry: &mut AgentRegistry,
        movement: &mut dyn Movement,
        romance: &mut dyn RomanceAnalyzer,
        now: SimTime,
        sink: &dyn EventSink,
    ) -> usize {
        if !self.sessions.iter().any(ConversationSession::is_terminated) {
            return 0;
        }
        let (closed, live): (Vec<_>, Vec<_>) = std::mem::take(&mut self.sessions)
            .into_iter()
            .partition(ConversationSession::is_terminated);
        self.sessions = live;

        let reaped = closed.len();
        for session in closed {
            let reason = session
                .termination_reason()
                .unwrap_or(TerminationReason::PartnerMissing);
            let [a, b] = session.participants;
            let lines = session.transcript.len();

            for (me, other) in [(a, b), (b, a)] {
                self.busy.release(&me);
                if self.by_agent.get(&me) == Some(&session.id) {
                    self.by_agent.remove(&me);
                }
                if let Some(agent) = registry.get_mut(&me) {
                    agent.conversation.clear();
                    movement.set_frozen(agent, false);
                    agent.remember(MemoryRecord::conversation(now, other, lines), self.memory_capacity);
                }
            }

            info!(session = %session.id, %reason, lines, "Conversation closed");
            sink.record(SimEvent::SessionClosed {
                at: now,
                session: session.id,
                reason,
                lines,
            });

            if session.transcript.is_empty() {
                continue;
            }
            if let (Some(agent_a), Some(agent_b)) = (registry.get(&a), registry.get(&b)) {
                romance.request_analysis(AnalysisRequest {
                    a,
                    b,
                    name_a: agent_a.name.clone(),
                    name_b: agent_b.name.clone(),
                    current_romance: agent_a.romance_towards(&b),
                    transcript: session.transcript,
                });
            }
        }
        reaped
    }
}

/// Mirror one session event onto both agents.
fn apply_event(
    registry: &mut AgentRegistry,
    bubble_display_time: f64,
    session: SessionId,
    event: &SessionEvent,
    now: SimTime,
    sink: &dyn EventSink,
) {
    match event {
        SessionEvent::TurnGranted { speaker, listener } => {
            if let Some(agent) = registry.get_mut(speaker) {
                agent.conversation.partner = Some(*listener);
                agent.conversation.my_turn = true;
                agent.conversation.waiting = false;
            }
            if let Some(agent) = registry.get_mut(listener) {
                agent.conversation.partner = Some(*speaker);
                agent.conversation.my_turn = false;
            }
        }
        SessionEvent::LineSpoken { speaker, line, .. } => {
            if let Some(agent) = registry.get_mut(speaker) {
                let fields = &mut agent.conversation;
                fields.outbound = Some(Bubble::new(line.clone(), bubble_display_time));
                fields.waiting = false;
                fields.my_turn = false;
                fields.turn_count += 1;
                debug!(%session, %speaker, turn = fields.turn_count, "Line spoken");
            }
            sink.record(SimEvent::Line {
                at: now,
                session,
                speaker: *speaker,
                line: line.clone(),
            });
        }
        SessionEvent::Terminated { reason } => {
            info!(%session, %reason, "Conversation finished");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids() -> (AgentId, AgentId) {
        (AgentId::new(), AgentId::new())
    }

    #[test]
    fn open_grants_first_turn() {
        let (a, b) = ids();
        let (session, event) = ConversationSession::open(a, b, false, SimTime::ZERO);
        assert_eq!(event, SessionEvent::TurnGranted { speaker: b, listener: a });
        assert_eq!(session.state(), SessionState::AwaitingTurn(b));
        assert_eq!(session.partner_of(&a), Some(b));
        assert_eq!(session.partner_of(&AgentId::new()), None);
    }

    #[test]
    fn turns_alternate_until_budget_runs_out() {
        let (a, b) = ids();
        let (mut s, _) = ConversationSession::open(a, b, true, SimTime::ZERO);

        assert!(s.begin_request(SimTime::from_secs(1.0)));
        let events = s.accept_line(a, "A", "hi".into(), SimTime::from_secs(2.0), 2);
        assert_eq!(events.len(), 2);
        assert_eq!(s.state(), SessionState::AwaitingTurn(b));

        assert!(s.begin_request(SimTime::from_secs(3.0)));
        s.accept_line(b, "B", "hello".into(), SimTime::from_secs(4.0), 2);
        assert!(s.begin_request(SimTime::from_secs(5.0)));
        let events = s.accept_line(a, "A", "bye".into(), SimTime::from_secs(6.0), 2);

        assert_eq!(
            events.last(),
            Some(&SessionEvent::Terminated {
                reason: TerminationReason::MaxTurns
            })
        );
        assert_eq!(s.turns_of(&a), 2);
        assert_eq!(s.turns_of(&b), 1);
        assert_eq!(s.transcript().len(), 3);
    }

    #[test]
    fn lines_from_the_wrong_speaker_are_ignored() {
        let (a, b) = ids();
        let (mut s, _) = ConversationSession::open(a, b, true, SimTime::ZERO);
        assert!(s.accept_line(a, "A", "too early".into(), SimTime::ZERO, 3).is_empty());
        s.begin_request(SimTime::ZERO);
        assert!(s.accept_line(b, "B", "not my turn".into(), SimTime::ZERO, 3).is_empty());
        assert!(s.transcript().is_empty());
    }

    #[test]
    fn overdue_reply_times_out() {
        let (a, b) = ids();
        let (mut s, _) = ConversationSession::open(a, b, true, SimTime::ZERO);
        s.begin_request(SimTime::from_secs(10.0));
        assert!(s.check_expiry(SimTime::from_secs(40.0), 30.0, 3).is_none());
        assert_eq!(
            s.check_expiry(SimTime::from_secs(40.5), 30.0, 3),
            Some(SessionEvent::Terminated {
                reason: TerminationReason::TimedOut
            })
        );
        assert!(s.accept_line(a, "A", "late".into(), SimTime::from_secs(41.0), 3).is_empty());
    }

    #[test]
    fn termination_is_idempotent() {
        let (a, b) = ids();
        let (mut s, _) = ConversationSession::open(a, b, true, SimTime::ZERO);
        assert!(s.terminate(TerminationReason::Removed).is_some());
        assert!(s.terminate(TerminationReason::TimedOut).is_none());
        assert_eq!(s.termination_reason(), Some(TerminationReason::Removed));
        assert!(!s.begin_request(SimTime::ZERO));
    }

    mod manager {
        use rand::SeedableRng;
        use rand::rngs::StdRng;
        use simtalk_core::events::MemorySink;
        use simtalk_core::{Agent, Position, SimConfig};
        use simtalk_llm::{LlmError, Prompt};

        use super::*;
        use crate::movement::Stationary;

        #[derive(Default)]
        struct CountingAnalyzer(usize);

        impl RomanceAnalyzer for CountingAnalyzer {
            fn request_analysis(&mut self, _: AnalysisRequest) {
                self.0 += 1;
            }
        }

        struct Mute;

        impl GenerativeBackend for Mute {
            async fn generate(&self, _: &Prompt) -> Result<String, LlmError> {
                Ok(String::new())
            }
        }

        struct Pair {
            registry: AgentRegistry,
            manager: ConversationManager,
            floor: Arc<DialogueFloor>,
            busy: Arc<BusySet>,
            sink: MemorySink,
            romance: CountingAnalyzer,
            first: AgentId,
            second: AgentId,
        }

        impl Pair {
            /// Two agents already in a session; `first` holds the turn.
            fn opened() -> Self {
                let config = SimConfig::default();
                let floor = Arc::new(DialogueFloor::new());
                let busy = Arc::new(BusySet::new());
                let mut registry = AgentRegistry::new();
                let a = registry
                    .insert(Agent::new("Ada", "curious", Position::new(0.0, 0.0)))
                    .expect("insert");
                let b = registry
                    .insert(Agent::new("Bo", "gruff", Position::new(10.0, 0.0)))
                    .expect("insert");
                let mut manager = ConversationManager::new(
                    config.conversation.clone(),
                    config.simulation.max_memories_per_agent,
                    Arc::clone(&floor),
                    Arc::clone(&busy),
                );
                let sink = MemorySink::new();
                let mut rng = StdRng::seed_from_u64(7);
                manager
                    .open(&mut registry, a, b, SimTime::ZERO, &mut rng, &mut Stationary, &sink)
                    .expect("session opens");
                let first = manager.sessions()[0].current_speaker().expect("turn granted");
                let second = manager.sessions()[0].partner_of(&first).expect("partner");
                Self {
                    registry,
                    manager,
                    floor,
                    busy,
                    sink,
                    romance: CountingAnalyzer::default(),
                    first,
                    second,
                }
            }

            fn state(&self) -> SessionState {
                self.manager.sessions()[0].state()
            }

            /// Reap at `now` and check `survivor` came out with nothing left over.
            fn reap_leaves_clean(&mut self, survivor: AgentId, gone: AgentId, now: SimTime) {
                let reaped = self.manager.reap(
                    &mut self.registry,
                    &mut Stationary,
                    &mut self.romance,
                    now,
                    &self.sink,
                );
                assert_eq!(reaped, 1);
                assert!(self.manager.sessions().is_empty());
                assert_eq!(self.romance.0, 0, "romance analysis requested for a vanished agent");

                let agent = self.registry.get(&survivor).expect("survivor stays registered");
                assert!(agent.conversation.is_clear(), "{:?}", agent.conversation);
                assert!(!agent.movement_frozen);
                for id in [survivor, gone] {
                    assert!(!self.busy.contains(&id));
                    assert!(!self.manager.is_busy(&id));
                }
                assert!(self.sink.events().iter().any(|e| matches!(
                    e,
                    SimEvent::SessionClosed {
                        reason: TerminationReason::PartnerMissing,
                        ..
                    }
                )));
            }
        }

        #[test]
        fn reply_to_a_vanished_listener_ends_the_session() {
            let mut pair = Pair::opened();
            let (first, second) = (pair.first, pair.second);

            assert!(pair.manager.sessions[0].begin_request(SimTime::from_secs(1.0)));
            assert!(pair.manager.deliver(
                &mut pair.registry,
                first,
                "hello there".into(),
                SimTime::from_secs(2.0),
                &pair.sink,
            ));
            assert_eq!(pair.state(), SessionState::AwaitingTurn(second));

            assert!(pair.manager.sessions[0].begin_request(SimTime::from_secs(3.0)));
            pair.registry.remove(&first).expect("first registered");

            assert!(pair.manager.deliver(
                &mut pair.registry,
                second,
                "anyone?".into(),
                SimTime::from_secs(4.0),
                &pair.sink,
            ));
            assert_eq!(
                pair.state(),
                SessionState::Terminated(TerminationReason::PartnerMissing)
            );
            assert_eq!(pair.manager.sessions()[0].transcript().len(), 1);

            pair.reap_leaves_clean(second, first, SimTime::from_secs(5.0));
        }

        #[tokio::test]
        async fn turn_for_a_vanished_listener_is_never_submitted() {
            let mut pair = Pair::opened();
            let (first, second) = (pair.first, pair.second);
            let client = GenerativeClient::new(Mute).expect("client");

            pair.registry.remove(&second).expect("second registered");
            pair.manager
                .advance_turns(&mut pair.registry, &client, SimTime::from_secs(1.0));

            assert_eq!(
                pair.state(),
                SessionState::Terminated(TerminationReason::PartnerMissing)
            );
            assert_eq!(client.stats().submitted, 0);
            assert_eq!(pair.floor.acquisitions(), 0);

            pair.reap_leaves_clean(first, second, SimTime::from_secs(2.0));
        }
    }
}
