//! Relay server core: agent registry, pending requests, and the hub task
//! that owns them.
//!
//! ```text
//! MCP tool call ─► RelayHandle ─► HubEvent queue ─► RelayHub
//!                                                   │  ├── AgentRegistry
//!                                                   │  ├── PendingRequests
//!                                                   │  └── SceneSnapshot
//! agent socket  ◄── outbound queue ◄────────────────┘
//! agent socket  ──► HubEvent::Inbound ─► resolves PendingRequests
//! ```

pub mod hub;
pub mod pending;
pub mod registry;

use serde::{Deserialize, Serialize};

use crate::domain::SceneSnapshot;

pub use hub::{HubEvent, RelayHandle, RelayHub};
pub use pending::PendingRequests;
pub use registry::AgentRegistry;

/// Text reported to tool callers when an agent answers with an empty message.
pub const DEFAULT_SUCCESS_TEXT: &str = "Command executed successfully";

/// An agent's answer to a relayed command.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommandOutcome {
    /// Whether the command took effect on the agent.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
    /// Optional structured payload.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

impl CommandOutcome {
    /// Text shown to the tool caller.
    #[must_use]
    pub fn text(&self) -> &str {
        if self.message.is_empty() {
            DEFAULT_SUCCESS_TEXT
        } else {
            &self.message
        }
    }
}

/// Point-in-time view of the hub's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RelayStatus {
    /// Connected agents.
    pub agents: usize,
    /// Commands awaiting a response.
    pub pending: usize,
    /// Last snapshot reported by an agent.
    pub snapshot: SceneSnapshot,
}
