//! Relay and agent configuration loaded from environment variables.
//!
//! Follows 12-factor style: all settings come from environment variables
//! (or a `.env` file via `dotenvy`). The relay and the agent read disjoint
//! key sets, so each binary only loads the struct it needs.

use std::net::SocketAddr;
use std::time::Duration;

/// Relay server configuration.
///
/// Loaded once at startup via [`RelayConfig::from_env`].
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Socket address agents connect to (e.g. `0.0.0.0:8080`).
    pub listen_addr: SocketAddr,

    /// How long a command waits for an agent response.
    pub command_timeout: Duration,

    /// Capacity of the hub's event queue.
    pub hub_queue_capacity: usize,

    /// Whether to serve the MCP tool surface on stdin/stdout.
    pub mcp_stdio_enabled: bool,
}

impl RelayConfig {
    /// Loads configuration from environment variables.
    ///
    /// Falls back to defaults when a variable is not set.
    /// Calls `dotenvy::dotenv().ok()` to optionally load a `.env` file.
    ///
    /// # Errors
    ///
    /// Returns an error if `LISTEN_ADDR` is set but cannot be parsed as
    /// a [`SocketAddr`].
    pub fn from_env() -> Result<Self, Box<dyn std::error::Error>> {
        dotenvy::dotenv().ok();

        let listen_addr: SocketAddr = std::env::var("LISTEN_ADDR")
            .unwrap_or_else(|_| "0.0.0.0:8080".to_string())
            .parse()?;

        let command_timeout = Duration::from_millis(parse_env("COMMAND_TIMEOUT_MS", 5_000));
        let hub_queue_capacity = parse_env("HUB_QUEUE_CAPACITY", 1_024);
        let mcp_stdio_enabled = parse_env_bool("MCP_STDIO_ENABLED", true);

        Ok(Self {
            listen_addr,
            command_timeout,
            hub_queue_capacity,
            mcp_stdio_enabled,
        })
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([0, 0, 0, 0], 8080)),
            command_timeout: Duration::from_millis(5_000),
            hub_queue_capacity: 1_024,
            mcp_stdio_enabled: true,
        }
    }
}

/// Agent-side endpoint configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentConfig {
    /// WebSocket URL of the relay.
    pub relay_url: String,

    /// Fixed delay between reconnect attempts.
    pub reconnect_interval: Duration,

    /// Attempts allowed before the endpoint gives up.
    pub max_reconnect_attempts: u32,

    /// Upper bound on the WebSocket handshake.
    pub connect_timeout: Duration,
}

impl AgentConfig {
    /// Loads configuration from environment variables.
    ///
    /// Never fails: missing or unparsable values fall back to defaults.
    #[must_use]
    pub fn from_env() -> Self {
        dotenvy::dotenv().ok();

        let defaults = Self::default();
        Self {
            relay_url: std::env::var("RELAY_URL").unwrap_or(defaults.relay_url),
            reconnect_interval: Duration::from_millis(parse_env("RECONNECT_INTERVAL_MS", 3_000)),
            max_reconnect_attempts: parse_env(
                "MAX_RECONNECT_ATTEMPTS",
                defaults.max_reconnect_attempts,
            ),
            connect_timeout: Duration::from_millis(parse_env("CONNECT_TIMEOUT_MS", 10_000)),
        }
    }
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            relay_url: "ws://localhost:8080".to_string(),
            reconnect_interval: Duration::from_millis(3_000),
            max_reconnect_attempts: 10,
            connect_timeout: Duration::from_millis(10_000),
        }
    }
}

/// Parses an environment variable as `T`, returning `default` on missing
/// or invalid values.
fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Parses an environment variable as a boolean. Accepts `"true"`, `"1"`,
/// `"false"`, `"0"` (case-insensitive). Returns `default` otherwise.
fn parse_env_bool(key: &str, default: bool) -> bool {
    match std::env::var(key).ok().map(|v| v.to_ascii_lowercase()).as_deref() {
        Some("true" | "1") => true,
        Some("false" | "0") => false,
        _ => default,
    }
}
