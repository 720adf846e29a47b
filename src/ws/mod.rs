//! WebSocket layer: agent connection handling and wire messages.
//!
//! Agents connect to `/` (the default `ws://localhost:8080` URL) or `/ws`.
//! Each connection forwards frames between its socket and the relay hub.

pub mod connection;
pub mod handler;
pub mod messages;
