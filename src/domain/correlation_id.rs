//! Type-safe identifiers for relay requests and agent connections.
//!
//! [`CorrelationId`] and [`AgentId`] are newtype wrappers around
//! [`uuid::Uuid`] (v4) so that a request identifier can never be confused
//! with a connection identifier.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Token pairing an outbound command with its eventual response.
///
/// Generated once per `send_command_to_agents` call. UUID v4 makes reuse
/// while the request is still pending practically impossible; the pending
/// map additionally refuses duplicate inserts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CorrelationId(uuid::Uuid);

impl CorrelationId {
    /// Creates a new random `CorrelationId` (UUID v4).
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for CorrelationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for CorrelationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of one agent WebSocket connection, assigned by the relay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AgentId(uuid::Uuid);

impl AgentId {
    /// Creates a new random `AgentId`.
    #[must_use]
    pub fn new() -> Self {
        Self(uuid::Uuid::new_v4())
    }
}

impl Default for AgentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for AgentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
