//! # scene-relay
//!
//! Relay between an MCP control channel and browser-style scene agents.
//!
//! A tool call arrives over stdio, the relay broadcasts it as a `command`
//! frame to every connected agent over WebSocket, and the first `response`
//! carrying the same correlation id answers the call. Agents keep the
//! relay's cached scene snapshot current with `state_update` frames.
//!
//! ## Architecture
//!
//! ```text
//! MCP client (stdio)
//!     │
//!     ├── SceneToolServer (mcp/)
//!     │
//!     ├── RelayHub (relay/)          ◄── GET /health, /scene (api/)
//!     │     ├── AgentRegistry
//!     │     └── PendingRequests
//!     │
//!     ├── WebSocket connections (ws/)
//!     │
//! Scene agents
//!     ├── RelayEndpoint (endpoint/)
//!     ├── Command grammar (grammar)
//!     └── SceneFacade (scene/)
//! ```

pub mod api;
pub mod app_state;
pub mod config;
pub mod domain;
pub mod endpoint;
pub mod error;
pub mod grammar;
pub mod mcp;
pub mod relay;
pub mod scene;
pub mod telemetry;
pub mod ws;
