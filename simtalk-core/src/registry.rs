//! Owned agent registry with O(1) lookup by id.
//!
//! Agents live in a dense `Vec` (stable iteration order for the pair scan)
//! indexed by a `HashMap<AgentId, usize>`. Removal swaps the last agent into
//! the freed slot.

use std::collections::HashMap;

use crate::agent::Agent;
use crate::error::{Result, SimError};
use crate::types::AgentId;

/// The live population.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: Vec<Agent>,
    index: HashMap<AgentId, usize>,
}

impl AgentRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent.
    ///
    /// # Errors
    /// Returns `SimError::DuplicateAgent` if the id is already registered.
    pub fn insert(&mut self, agent: Agent) -> Result<AgentId> {
        let id = agent.id;
        if self.index.contains_key(&id) {
            return Err(SimError::DuplicateAgent(id));
        }
        self.index.insert(id, self.agents.len());
        self.agents.push(agent);
        Ok(id)
    }

    /// Remove an agent, returning it if it was registered.
    pub fn remove(&mut self, id: &AgentId) -> Option<Agent> {
        let slot = self.index.remove(id)?;
        let removed = self.agents.swap_remove(slot);
        if let Some(moved) = self.agents.get(slot) {
            self.index.insert(moved.id, slot);
        }
        Some(removed)
    }

    /// Look up an agent.
    #[must_use]
    pub fn get(&self, id: &AgentId) -> Option<&Agent> {
        self.index.get(id).and_then(|&i| self.agents.get(i))
    }

    /// Look up an agent mutably.
    pub fn get_mut(&mut self, id: &AgentId) -> Option<&mut Agent> {
        let i = *self.index.get(id)?;
        self.agents.get_mut(i)
    }

    /// Whether `id` is registered.
    #[must_use]
    pub fn contains(&self, id: &AgentId) -> bool {
        self.index.contains_key(id)
    }

    /// Borrow two distinct agents mutably at once.
    ///
    /// Returns `None` if either is missing or `a == b`.
    pub fn pair_mut(&mut self, a: &AgentId, b: &AgentId) -> Option<(&mut Agent, &mut Agent)> {
        let ia = *self.index.get(a)?;
        let ib = *self.index.get(b)?;
        self.pair_mut_by_index(ia, ib)
    }

    /// Borrow the agents at two distinct dense indices mutably at once.
    pub fn pair_mut_by_index(&mut self, ia: usize, ib: usize) -> Option<(&mut Agent, &mut Agent)> {
        if ia == ib || ia >= self.agents.len() || ib >= self.agents.len() {
            return None;
        }
        if ia < ib {
            let (left, right) = self.agents.split_at_mut(ib);
            Some((&mut left[ia], &mut right[0]))
        } else {
            let (left, right) = self.agents.split_at_mut(ia);
            Some((&mut right[0], &mut left[ib]))
        }
    }

    /// Iterate over all agents.
    pub fn iter(&self) -> impl Iterator<Item = &Agent> {
        self.agents.iter()
    }

    /// Iterate mutably over all agents.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Agent> {
        self.agents.iter_mut()
    }

    /// Number of registered agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Whether the population is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Position;

    fn agent(name: &str) -> Agent {
        Agent::new(name, "plain", Position::default())
    }

    #[test]
    fn insert_and_lookup() {
        let mut reg = AgentRegistry::new();
        let id = reg.insert(agent("Ada")).expect("insert");
        assert_eq!(reg.get(&id).map(|a| a.name.as_str()), Some("Ada"));
        assert!(reg.get(&AgentId::new()).is_none());
        assert!(reg.contains(&id));
    }

    #[test]
    fn duplicate_insert_is_rejected() {
        let mut reg = AgentRegistry::new();
        let a = agent("Ada");
        let copy = a.clone();
        reg.insert(a).expect("first insert");
        assert!(matches!(reg.insert(copy), Err(SimError::DuplicateAgent(_))));
    }

    #[test]
    fn removal_keeps_index_consistent() {
        let mut reg = AgentRegistry::new();
        let a = reg.insert(agent("Ada")).expect("insert");
        let b = reg.insert(agent("Bo")).expect("insert");
        let c = reg.insert(agent("Cy")).expect("insert");

        let removed = reg.remove(&a).expect("was registered");
        assert_eq!(removed.name, "Ada");
        assert!(reg.get(&a).is_none());
        assert_eq!(reg.get(&b).map(|x| x.name.as_str()), Some("Bo"));
        assert_eq!(reg.get(&c).map(|x| x.name.as_str()), Some("Cy"));
        assert_eq!(reg.len(), 2);
        assert!(reg.remove(&a).is_none());
    }

    #[test]
    fn pair_mut_borrows_both_orders() {
        let mut reg = AgentRegistry::new();
        let a = reg.insert(agent("Ada")).expect("insert");
        let b = reg.insert(agent("Bo")).expect("insert");

        let (x, y) = reg.pair_mut(&b, &a).expect("both exist");
        assert_eq!(x.name, "Bo");
        assert_eq!(y.name, "Ada");
        x.adjust_mood(0.5);

        assert!(reg.pair_mut(&a, &a).is_none());
        assert!(reg.pair_mut(&a, &AgentId::new()).is_none());
        assert!((reg.get(&b).map_or(0.0, Agent::mood) - 0.5).abs() < f32::EPSILON);
    }
}
