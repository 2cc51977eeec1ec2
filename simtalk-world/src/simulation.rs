//! The simulation tick loop.
//!
//! [`Simulation::tick`] is the single entry point that advances the world.
//! It never blocks: generative work happens on tokio tasks and results are
//! drained with a non-blocking poll.
//!
//! ## Tick order
//!
//! | Step | What                                                   |
//! |------|--------------------------------------------------------|
//! | 1    | Move unfrozen agents                                   |
//! | 2    | Detect encounters, open sessions                       |
//! | 3    | Expire overdue / exhausted sessions                    |
//! | 4    | Route generated text by requester id                   |
//! | 5    | Sessions awaiting a turn take the floor and submit     |
//! | 6    | Reap terminated sessions, hand off romance analyses    |
//! | 7    | Request thoughts for idle agents                       |
//! | 8    | Count down speech and thought bubbles                  |
//! | 9    | Apply romance verdicts                                 |
//!
//! Expiry runs before routing, so a reply that arrives after its session
//! timed out is discarded rather than accepted.

use std::sync::Arc;

use rand::SeedableRng;
use rand::rngs::StdRng;
use simtalk_core::events::TracingSink;
use simtalk_core::{
    Agent, AgentId, AgentRegistry, BusySet, DialogueFloor, EventSink, SimConfig, SimEvent,
    SimTime, TerminationReason, error::Result,
};
use simtalk_llm::{DispatchStats, GenerativeBackend, GenerativeClient, LlmClient, LlmError};
use tracing::{debug, info};

use crate::conversation::{ConversationManager, ConversationSession};
use crate::interaction::InteractionDetector;
use crate::movement::{Movement, Stationary};
use crate::romance::{LlmRomanceAnalyzer, NullRomanceAnalyzer, RomanceAnalyzer, RomanceOutcome};
use crate::thought::ThoughtRequestor;

/// What one tick did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Pairs that interacted.
    pub encounters: usize,
    /// Pairs pushed apart.
    pub separations: usize,
    /// Sessions opened.
    pub sessions_opened: usize,
    /// Conversation lines accepted.
    pub lines_delivered: usize,
    /// Thoughts shown.
    pub thoughts_delivered: usize,
    /// Results nobody was waiting for.
    pub results_discarded: usize,
    /// Sessions torn down.
    pub sessions_closed: usize,
    /// Thought requests submitted.
    pub thoughts_requested: usize,
    /// Romance verdicts applied.
    pub romance_applied: usize,
}

/// A world of agents that meet, talk and think.
pub struct Simulation<B> {
    config: SimConfig,
    registry: AgentRegistry,
    detector: InteractionDetector,
    manager: ConversationManager,
    thoughts: ThoughtRequestor,
    floor: Arc<DialogueFloor>,
    busy: Arc<BusySet>,
    client: GenerativeClient<AgentId, B>,
    romance: Box<dyn RomanceAnalyzer>,
    movement: Box<dyn Movement>,
    sink: Arc<dyn EventSink>,
    rng: StdRng,
    now: SimTime,
}

impl<B: GenerativeBackend> Simulation<B> {
    /// Create an empty world that generates text through `client`.
    ///
    /// Defaults: agents stand still, romance analysis is off, events go to
    /// `tracing`. The RNG is seeded from `simulation.seed` when set.
    #[must_use]
    pub fn new(config: SimConfig, client: GenerativeClient<AgentId, B>) -> Self {
        let floor = Arc::new(DialogueFloor::new());
        let busy = Arc::new(BusySet::new());
        let rng = match config.simulation.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            registry: AgentRegistry::new(),
            detector: InteractionDetector::new(config.simulation.clone()),
            manager: ConversationManager::new(
                config.conversation.clone(),
                config.simulation.max_memories_per_agent,
                Arc::clone(&floor),
                Arc::clone(&busy),
            ),
            thoughts: ThoughtRequestor::new(config.thought.clone()),
            floor,
            busy,
            client,
            romance: Box::new(NullRomanceAnalyzer),
            movement: Box::new(Stationary),
            sink: Arc::new(TracingSink),
            rng,
            now: SimTime::ZERO,
            config,
        }
    }

    /// Use `movement` to move agents.
    #[must_use]
    pub fn with_movement(mut self, movement: impl Movement + 'static) -> Self {
        self.movement = Box::new(movement);
        self
    }

    /// Use `romance` to analyse finished conversations.
    #[must_use]
    pub fn with_romance(mut self, romance: impl RomanceAnalyzer + 'static) -> Self {
        self.romance = Box::new(romance);
        self
    }

    /// Send events to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Share a floor and busy set with other simulations.
    ///
    /// Must be called before any agent is added.
    #[must_use]
    pub fn with_admission(mut self, floor: Arc<DialogueFloor>, busy: Arc<BusySet>) -> Self {
        self.manager = ConversationManager::new(
            self.config.conversation.clone(),
            self.config.simulation.max_memories_per_agent,
            Arc::clone(&floor),
            Arc::clone(&busy),
        );
        self.floor = floor;
        self.busy = busy;
        self
    }

    // -- Agents -------------------------------------------------------------

    /// Add an agent.
    ///
    /// # Errors
    /// Returns `SimError::DuplicateAgent` if the id is already present.
    pub fn add_agent(&mut self, agent: Agent) -> Result<AgentId> {
        let id = self.registry.insert(agent)?;
        debug!(agent = %id, "Agent added");
        Ok(id)
    }

    /// Remove an agent, ending its conversation with `Removed`.
    ///
    /// The partner is released immediately. Late results for the removed
    /// agent are discarded when they arrive.
    pub fn remove_agent(&mut self, id: &AgentId) -> Option<Agent> {
        self.manager.terminate_for(id, TerminationReason::Removed);
        let mut removed = self.registry.remove(id)?;
        self.manager.reap(
            &mut self.registry,
            self.movement.as_mut(),
            self.romance.as_mut(),
            self.now,
            self.sink.as_ref(),
        );
        self.busy.release(id);
        self.thoughts.forget(id);
        removed.conversation.clear();
        removed.movement_frozen = false;
        info!(agent = %id, "Agent removed");
        Some(removed)
    }

    /// Look up an agent.
    #[must_use]
    pub fn agent(&self, id: &AgentId) -> Option<&Agent> {
        self.registry.get(id)
    }

    /// Look up an agent mutably.
    pub fn agent_mut(&mut self, id: &AgentId) -> Option<&mut Agent> {
        self.registry.get_mut(id)
    }

    /// Every agent.
    pub fn agents(&self) -> impl Iterator<Item = &Agent> {
        self.registry.iter()
    }

    /// The session `id` is in.
    #[must_use]
    pub fn session_for(&self, id: &AgentId) -> Option<&ConversationSession> {
        self.manager.session_for(id)
    }

    /// Sessions currently open.
    #[must_use]
    pub fn active_sessions(&self) -> &[ConversationSession] {
        self.manager.sessions()
    }

    // -- Introspection ------------------------------------------------------

    /// Configuration in use.
    #[must_use]
    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    /// The dialogue floor.
    #[must_use]
    pub fn floor(&self) -> &DialogueFloor {
        &self.floor
    }

    /// The busy set.
    #[must_use]
    pub fn busy_set(&self) -> &BusySet {
        &self.busy
    }

    /// Dispatcher counters.
    #[must_use]
    pub fn dispatch_stats(&self) -> DispatchStats {
        self.client.stats()
    }

    /// Time of the last tick.
    #[must_use]
    pub fn now(&self) -> SimTime {
        self.now
    }

    // -- Tick ---------------------------------------------------------------

    /// Advance the world to `now`, `dt` seconds after the previous tick.
    pub fn tick(&mut self, now: SimTime, dt: f64) -> TickReport {
        self.now = now;
        let mut report = TickReport::default();
        let sink = Arc::clone(&self.sink);
        let sink = sink.as_ref();

        // 1. Movement
        for agent in self.registry.iter_mut() {
            if !agent.movement_frozen {
                self.movement.advance(agent, dt);
            }
        }

        // 2. Encounters
        let scan = self.detector.scan(
            &mut self.registry,
            &mut self.manager,
            now,
            &mut self.rng,
            self.movement.as_mut(),
            sink,
        );
        report.encounters = scan.encounters;
        report.separations = scan.separations;
        report.sessions_opened = scan.sessions_opened.len();

        // 3. Expiry
        self.manager.expire(now);

        // 4. Results
        while let Some((id, text)) = self.client.poll_result() {
            // One outstanding request per id, so whoever submitted it owns it.
            let consumed = if self.thoughts.is_expecting(&id) {
                let delivered = self
                    .thoughts
                    .deliver(&mut self.registry, &self.manager, id, text, now, sink);
                report.thoughts_delivered += usize::from(delivered);
                delivered
            } else {
                let delivered = self.manager.deliver(&mut self.registry, id, text, now, sink);
                report.lines_delivered += usize::from(delivered);
                delivered
            };
            if !consumed {
                debug!(agent = %id, "Discarded generative result");
                report.results_discarded += 1;
            }
        }

        // 5. Turns
        self.manager.advance_turns(&mut self.registry, &self.client, now);

        // 6. Cleanup
        report.sessions_closed = self.manager.reap(
            &mut self.registry,
            self.movement.as_mut(),
            self.romance.as_mut(),
            now,
            sink,
        );

        // 7. Thoughts
        report.thoughts_requested =
            self.thoughts
                .request_thoughts(&mut self.registry, &self.manager, &self.client, now);

        // 8. Bubbles
        for agent in self.registry.iter_mut() {
            agent.tick_bubbles(dt);
        }

        // 9. Romance
        while let Some(outcome) = self.romance.poll_outcome() {
            if self.apply_romance(&outcome, now, sink) {
                report.romance_applied += 1;
            }
        }

        report
    }

    fn apply_romance(&mut self, outcome: &RomanceOutcome, now: SimTime, sink: &dyn EventSink) -> bool {
        let Some((a, b)) = self.registry.pair_mut(&outcome.a, &outcome.b) else {
            debug!(a = %outcome.a, b = %outcome.b, "Romance verdict for departed pair");
            return false;
        };
        a.relationship_mut(outcome.b).set_romance(outcome.romance);
        b.relationship_mut(outcome.a).set_romance(outcome.romance);
        let romance = a.romance_towards(&outcome.b);
        info!(a = %outcome.a, b = %outcome.b, romance, summary = %outcome.summary, "Romance updated");
        sink.record(SimEvent::Romance {
            at: now,
            a: outcome.a,
            b: outcome.b,
            romance,
        });
        true
    }
}

impl Simulation<LlmClient> {
    /// Build a world talking to the backend described by `config.llm`, on
    /// the ambient tokio runtime, with LLM romance analysis enabled.
    ///
    /// # Errors
    /// Returns an error for an unknown provider or when called outside a
    /// tokio runtime.
    pub fn from_config(config: SimConfig) -> std::result::Result<Self, LlmError> {
        let client = GenerativeClient::new(LlmClient::from_config(&config.llm)?)?
            .with_placeholder(config.llm.placeholder.clone());
        let analyzer_client = GenerativeClient::new(LlmClient::from_config(&config.llm)?)?
            .with_placeholder(config.llm.placeholder.clone());
        Ok(Self::new(config, client).with_romance(LlmRomanceAnalyzer::new(analyzer_client)))
    }
}
