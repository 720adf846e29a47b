//! Scene agent side of the relay: keeps one WebSocket open to the relay,
//! executes relayed commands against a local [`SceneFacade`], and reports
//! every successful change as a `state_update`.
//!
//! [`SceneFacade`]: crate::scene::SceneFacade

pub mod client;
pub mod dispatch;
pub mod state;

pub use client::{EndpointHandle, RelayEndpoint};
pub use dispatch::{RemoteOutcome, execute_remote, handle_frame};
pub use state::{ConnectionState, ReconnectPolicy};
