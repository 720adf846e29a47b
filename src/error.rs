//! Relay error types with stable numeric codes.
//!
//! [`RelayError`] is the central error type for the relay. The grammar and
//! the scene facade fold it into a failed [`crate::scene::SceneResponse`];
//! the relay folds it into textual tool output. Nothing here is fatal.

/// Relay-wide error enum.
///
/// # Error Code Ranges
///
/// | Range     | Category          |
/// |-----------|-------------------|
/// | 1000–1999 | Validation        |
/// | 2000–2999 | Scene state       |
/// | 3000–3999 | Relay / transport |
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RelayError {
    /// Wrong operand count for a grammar verb. Carries the usage line.
    #[error("{0}")]
    Usage(String),

    /// Shape name outside the supported set.
    #[error("Invalid shape: {0}. Use: box, sphere, cylinder, cone, or torus")]
    InvalidShape(String),

    /// Verb outside the supported set.
    #[error("Unknown command: {0}. Use: create, delete, select, or list")]
    InvalidVerb(String),

    /// Structured parameters failed to decode or validate.
    #[error("Invalid parameters for {command}: {detail}")]
    InvalidParams {
        /// Command the parameters were meant for.
        command: String,
        /// What was wrong with them.
        detail: String,
    },

    /// No object with the given name exists.
    #[error("Object \"{0}\" not found")]
    NotFound(String),

    /// An object with the given name already exists.
    #[error("Object \"{0}\" already exists")]
    AlreadyExists(String),

    /// No agent is connected to the relay.
    #[error("No agents connected. Start a scene agent and point it at this relay.")]
    NoAgents,

    /// No response arrived before the deadline.
    #[error("Command timeout after {timeout_ms} ms")]
    CommandTimeout {
        /// Deadline that elapsed, in milliseconds.
        timeout_ms: u64,
    },

    /// A wire message was not JSON or did not match any known shape.
    #[error("malformed message: {0}")]
    MalformedMessage(String),

    /// Socket-level failure.
    #[error("transport error: {0}")]
    Transport(String),

    /// Internal failure, e.g. the relay task has stopped.
    #[error("internal error: {0}")]
    Internal(String),
}

impl RelayError {
    /// Returns the numeric error code for this variant.
    #[must_use]
    pub const fn error_code(&self) -> u32 {
        match self {
            Self::Usage(_) => 1001,
            Self::InvalidShape(_) => 1002,
            Self::InvalidVerb(_) => 1003,
            Self::InvalidParams { .. } => 1004,
            Self::NotFound(_) => 2001,
            Self::AlreadyExists(_) => 2002,
            Self::Internal(_) => 3000,
            Self::NoAgents => 3001,
            Self::CommandTimeout { .. } => 3002,
            Self::MalformedMessage(_) => 3003,
            Self::Transport(_) => 3004,
        }
    }

    /// Returns `true` for errors caused by the caller's input rather than
    /// by relay or transport state.
    #[must_use]
    pub const fn is_client_error(&self) -> bool {
        self.error_code() < 3000
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(err: serde_json::Error) -> Self {
        Self::MalformedMessage(err.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for RelayError {
    fn from(err: tokio_tungstenite::tungstenite::Error) -> Self {
        Self::Transport(err.to_string())
    }
}
