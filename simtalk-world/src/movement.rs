//! Movement collaborator.
//!
//! Path-finding and animation live outside this workspace. The simulation
//! only needs to move unfrozen agents each tick and to freeze the two
//! parties of a conversation in place.

use std::collections::HashMap;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use simtalk_core::{Agent, AgentId, Position};

/// Moves agents around the world.
pub trait Movement: Send {
    /// Advance one unfrozen agent by `dt` seconds.
    fn advance(&mut self, agent: &mut Agent, dt: f64);

    /// Freeze or release an agent.
    fn set_frozen(&mut self, agent: &mut Agent, frozen: bool) {
        agent.movement_frozen = frozen;
    }
}

/// Nobody moves. Useful for scripted scenarios.
#[derive(Debug, Clone, Copy, Default)]
pub struct Stationary;

impl Movement for Stationary {
    fn advance(&mut self, _agent: &mut Agent, _dt: f64) {}
}

/// Random walk inside a rectangle.
///
/// Each agent keeps a heading and occasionally picks a new one; headings
/// reflect off the bounds.
#[derive(Debug)]
pub struct Wander {
    rng: StdRng,
    min: Position,
    max: Position,
    speed: f32,
    turn_rate: f64,
    headings: HashMap<AgentId, (f32, f32)>,
}

impl Wander {
    /// Wander inside `min..=max` at `speed` units per second.
    #[must_use]
    pub fn new(min: Position, max: Position, speed: f32, seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            min,
            max,
            speed,
            turn_rate: 0.5,
            headings: HashMap::new(),
        }
    }

    /// Expected heading changes per second.
    #[must_use]
    pub fn with_turn_rate(mut self, turn_rate: f64) -> Self {
        self.turn_rate = turn_rate.max(0.0);
        self
    }

    fn random_heading(rng: &mut StdRng) -> (f32, f32) {
        let angle: f32 = rng.gen_range(0.0..std::f32::consts::TAU);
        (angle.cos(), angle.sin())
    }
}

impl Movement for Wander {
    #[allow(clippy::cast_possible_truncation)]
    fn advance(&mut self, agent: &mut Agent, dt: f64) {
        if agent.movement_frozen {
            return;
        }

        let rng = &mut self.rng;
        let heading = self
            .headings
            .entry(agent.id)
            .or_insert_with(|| Self::random_heading(rng));
        if rng.gen_bool((self.turn_rate * dt).clamp(0.0, 1.0)) {
            *heading = Self::random_heading(rng);
        }

        let step = self.speed * dt as f32;
        let mut x = agent.position.x + heading.0 * step;
        let mut y = agent.position.y + heading.1 * step;

        if x < self.min.x || x > self.max.x {
            heading.0 = -heading.0;
            x = x.clamp(self.min.x, self.max.x);
        }
        if y < self.min.y || y > self.max.y {
            heading.1 = -heading.1;
            y = y.clamp(self.min.y, self.max.y);
        }
        agent.position = Position::new(x, y);
    }

    fn set_frozen(&mut self, agent: &mut Agent, frozen: bool) {
        agent.movement_frozen = frozen;
        if frozen {
            self.headings.remove(&agent.id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn wander() -> Wander {
        Wander::new(Position::new(0.0, 0.0), Position::new(100.0, 100.0), 10.0, 7)
    }

    #[test]
    fn wander_stays_in_bounds() {
        let mut movement = wander().with_turn_rate(2.0);
        let mut agent = Agent::new("Ada", "restless", Position::new(99.0, 1.0));
        for _ in 0..1_000 {
            movement.advance(&mut agent, 0.5);
            assert!((0.0..=100.0).contains(&agent.position.x));
            assert!((0.0..=100.0).contains(&agent.position.y));
        }
    }

    #[test]
    fn frozen_agents_do_not_move() {
        let mut movement = wander();
        let mut agent = Agent::new("Bo", "calm", Position::new(50.0, 50.0));
        movement.set_frozen(&mut agent, true);
        movement.advance(&mut agent, 1.0);
        assert_eq!(agent.position, Position::new(50.0, 50.0));

        movement.set_frozen(&mut agent, false);
        movement.advance(&mut agent, 1.0);
        assert!(agent.position.distance(&Position::new(50.0, 50.0)) > 0.0);
    }

    #[test]
    fn stationary_only_toggles_the_flag() {
        let mut movement = Stationary;
        let mut agent = Agent::new("Cy", "still", Position::new(3.0, 4.0));
        movement.set_frozen(&mut agent, true);
        assert!(agent.movement_frozen);
        movement.advance(&mut agent, 1.0);
        assert_eq!(agent.position, Position::new(3.0, 4.0));
    }
}
