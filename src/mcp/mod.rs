//! Control channel: MCP tools over stdio, backed by the relay hub.

pub mod server;

pub use server::SceneToolServer;
