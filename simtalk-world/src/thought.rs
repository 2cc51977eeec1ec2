//! Ambient thoughts for idle agents.
//!
//! Thoughts go through the same generative client as conversation turns
//! but never touch the dialogue floor.

use std::collections::HashSet;

use simtalk_core::{AgentId, AgentRegistry, Bubble, EventSink, SimEvent, SimTime, config::ThoughtConfig};
use simtalk_llm::{GenerativeBackend, GenerativeClient, prompt};
use tracing::debug;

use crate::conversation::ConversationManager;

/// How many friends a thought prompt mentions.
const FRIENDS_IN_PROMPT: usize = 3;

/// Requests and displays ambient thoughts.
///
/// Remembers which agents it has a request out for, so a result can be
/// told apart from a conversation line for the same agent.
#[derive(Debug, Clone)]
pub struct ThoughtRequestor {
    config: ThoughtConfig,
    outstanding: HashSet<AgentId>,
}

impl ThoughtRequestor {
    /// Create a requestor with the given tuning.
    #[must_use]
    pub fn new(config: ThoughtConfig) -> Self {
        Self {
            config,
            outstanding: HashSet::new(),
        }
    }

    /// Whether the pending request for `agent` is a thought.
    #[must_use]
    pub fn is_expecting(&self, agent: &AgentId) -> bool {
        self.outstanding.contains(agent)
    }

    /// Stop expecting a thought for `agent`.
    pub fn forget(&mut self, agent: &AgentId) {
        self.outstanding.remove(agent);
    }

    /// Submit a thought request for every idle agent that is due one.
    ///
    /// An agent is due when it is talking-enabled, not in a session, not
    /// already showing a thought, has nothing pending with the client, and
    /// its last request is at least `interval` seconds old. Returns how many
    /// requests were submitted.
    pub fn request_thoughts<B: GenerativeBackend>(
        &mut self,
        registry: &mut AgentRegistry,
        manager: &ConversationManager,
        client: &GenerativeClient<AgentId, B>,
        now: SimTime,
    ) -> usize {
        if !self.config.enabled {
            return 0;
        }

        let due: Vec<_> = registry
            .iter()
            .filter(|agent| {
                agent.talking_enabled
                    && !agent.in_conversation()
                    && !manager.is_busy(&agent.id)
                    && agent.thought.is_none()
                    && !client.is_pending(&agent.id)
                    && agent
                        .last_thought_request
                        .is_none_or(|at| now.elapsed_since(at) >= self.config.interval)
            })
            .map(|agent| {
                let mut friends: Vec<_> = agent
                    .relationships()
                    .filter(|(_, record)| record.friendship > 0.0)
                    .filter_map(|(id, record)| registry.get(id).map(|f| (record.friendship, f.name.as_str())))
                    .collect();
                friends.sort_by(|x, y| y.0.total_cmp(&x.0));
                let names: Vec<&str> = friends.iter().take(FRIENDS_IN_PROMPT).map(|(_, n)| *n).collect();
                (
                    agent.id,
                    prompt::thought(&agent.name, &agent.personality, agent.mood_label(), &names),
                )
            })
            .collect();

        let mut submitted = 0;
        for (id, thought_prompt) in due {
            if client.submit(id, thought_prompt) {
                self.outstanding.insert(id);
                if let Some(agent) = registry.get_mut(&id) {
                    agent.last_thought_request = Some(now);
                }
                submitted += 1;
            }
        }
        submitted
    }

    /// Show a generated thought. Discarded if it was not asked for, or the
    /// agent has since entered a session or left the simulation.
    pub fn deliver(
        &mut self,
        registry: &mut AgentRegistry,
        manager: &ConversationManager,
        agent_id: AgentId,
        text: String,
        now: SimTime,
        sink: &dyn EventSink,
    ) -> bool {
        if !self.outstanding.remove(&agent_id) {
            return false;
        }
        if manager.session_for(&agent_id).is_some() {
            debug!(agent = %agent_id, "Discarding thought, agent is in a conversation");
            return false;
        }
        let Some(agent) = registry.get_mut(&agent_id) else {
            debug!(agent = %agent_id, "Discarding thought for departed agent");
            return false;
        };
        if agent.in_conversation() {
            return false;
        }
        agent.thought = Some(Bubble::new(text.clone(), self.config.display_time));
        sink.record(SimEvent::Thought {
            at: now,
            agent: agent_id,
            text,
        });
        true
    }
}
