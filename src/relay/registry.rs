//! Set of connected agents and their outbound frame queues.
//!
//! Owned by the relay hub task. Each entry is the sending half of the
//! channel drained by that agent's WebSocket writer.

use std::collections::HashMap;

use tokio::sync::mpsc;

use crate::domain::AgentId;

/// Outbound text-frame queue of one agent connection.
pub type AgentSender = mpsc::UnboundedSender<String>;

/// Currently connected agents.
#[derive(Debug, Default)]
pub struct AgentRegistry {
    agents: HashMap<AgentId, AgentSender>,
}

impl AgentRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an agent. Replaces the queue if the id is already present.
    pub fn insert(&mut self, agent: AgentId, sender: AgentSender) {
        self.agents.insert(agent, sender);
    }

    /// Removes an agent. Returns `false` if it was not registered.
    pub fn remove(&mut self, agent: AgentId) -> bool {
        self.agents.remove(&agent).is_some()
    }

    /// Queues `frame` for a single agent.
    ///
    /// Returns `false` if the agent is unknown or its writer has gone away.
    pub fn send_to(&self, agent: AgentId, frame: String) -> bool {
        self.agents
            .get(&agent)
            .is_some_and(|sender| sender.send(frame).is_ok())
    }

    /// Queues `frame` for every agent and drops agents whose writer has
    /// gone away.
    ///
    /// Returns the number of agents the frame was queued for.
    pub fn broadcast(&mut self, frame: &str) -> usize {
        let mut delivered = 0;
        self.agents.retain(|agent, sender| {
            if sender.send(frame.to_owned()).is_ok() {
                delivered += 1;
                true
            } else {
                tracing::warn!(%agent, "dropping agent with closed writer");
                false
            }
        });
        delivered
    }

    /// Returns the number of connected agents.
    #[must_use]
    pub fn len(&self) -> usize {
        self.agents.len()
    }

    /// Returns `true` if no agent is connected.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
