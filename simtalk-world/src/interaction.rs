//! Proximity-triggered interactions.
//!
//! The detector is the only thing that opens conversation sessions. It
//! scans every unordered pair once per tick, which is O(n²) in the number
//! of agents; fine for a few hundred sims, not for thousands.

use rand::Rng;
use simtalk_core::{
    Agent, AgentRegistry, EventSink, MemoryRecord, SessionId, SimTime, config::SimulationConfig,
};
use tracing::trace;

use crate::conversation::ConversationManager;
use crate::movement::Movement;

/// What one detector pass did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InteractionReport {
    /// Pairs that came within interaction range and were not skipped.
    pub encounters: usize,
    /// Pairs pushed apart to the minimum separation.
    pub separations: usize,
    /// Sessions opened by this pass.
    pub sessions_opened: Vec<SessionId>,
}

/// Finds agents close enough to interact.
#[derive(Debug, Clone)]
pub struct InteractionDetector {
    config: SimulationConfig,
}

impl InteractionDetector {
    /// Create a detector with the given tuning.
    #[must_use]
    pub fn new(config: SimulationConfig) -> Self {
        Self { config }
    }

    /// Evaluate every unordered pair once.
    ///
    /// A pair is skipped if either agent is busy or still cooling down from
    /// its last interaction. Otherwise, when closer than
    /// `interaction_distance`, both agents gain friendship and mood,
    /// remember the encounter and start their cooldown; overlapping agents
    /// are pushed apart; and if both are talking-enabled a session opens.
    #[allow(clippy::too_many_arguments)]
    pub fn scan<R: Rng>(
        &self,
        registry: &mut AgentRegistry,
        manager: &mut ConversationManager,
        now: SimTime,
        rng: &mut R,
        movement: &mut dyn Movement,
        sink: &dyn EventSink,
    ) -> InteractionReport {
        let mut report = InteractionReport::default();
        let n = registry.len();

        for i in 0..n {
            for j in (i + 1)..n {
                let Some((a, b)) = registry.pair_mut_by_index(i, j) else {
                    continue;
                };
                if manager.is_busy(&a.id) || manager.is_busy(&b.id) {
                    continue;
                }
                let ignore = self.config.ignore_interaction_time;
                if a.is_cooling_down(now, ignore) || b.is_cooling_down(now, ignore) {
                    continue;
                }
                let distance = a.position.distance(&b.position);
                if distance >= self.config.interaction_distance {
                    continue;
                }

                if distance < self.config.min_separation {
                    separate(a, b, self.config.min_separation);
                    report.separations += 1;
                }

                let (id_a, id_b) = (a.id, b.id);
                let both_talk = a.talking_enabled && b.talking_enabled;
                self.record_encounter(a, b, now, sink);
                report.encounters += 1;
                trace!(%id_a, %id_b, distance, "Encounter");

                if both_talk {
                    if let Some(session) = manager.open(registry, id_a, id_b, now, rng, movement, sink) {
                        report.sessions_opened.push(session);
                    }
                }
            }
        }
        report
    }

    fn record_encounter(&self, a: &mut Agent, b: &mut Agent, now: SimTime, sink: &dyn EventSink) {
        let cap = self.config.max_memories_per_agent;
        let friendship_delta = a
            .relationship_mut(b.id)
            .add_friendship(self.config.friendship_increment);
        b.relationship_mut(a.id)
            .add_friendship(self.config.friendship_increment);

        a.remember(MemoryRecord::encounter(now, b.id), cap);
        b.remember(MemoryRecord::encounter(now, a.id), cap);
        sink.log_interaction(now, a.id, b.id, friendship_delta);

        let mood_a = a.adjust_mood(self.config.mood_increment);
        let mood_b = b.adjust_mood(self.config.mood_increment);
        sink.log_mood(now, a.id, mood_a);
        sink.log_mood(now, b.id, mood_b);

        a.last_interaction = Some(now);
        b.last_interaction = Some(now);
    }
}

/// Push `a` and `b` apart symmetrically until they are `min_separation`
/// apart. Coincident agents are pushed along the x axis.
fn separate(a: &mut Agent, b: &mut Agent, min_separation: f32) {
    let dx = b.position.x - a.position.x;
    let dy = b.position.y - a.position.y;
    let distance = (dx * dx + dy * dy).sqrt();
    let (ux, uy) = if distance <= f32::EPSILON {
        (1.0, 0.0)
    } else {
        (dx / distance, dy / distance)
    };
    let push = (min_separation - distance) / 2.0;
    a.position.x -= ux * push;
    a.position.y -= uy * push;
    b.position.x += ux * push;
    b.position.y += uy * push;
}
