//! Shared application state injected into all Axum handlers.

use crate::relay::RelayHandle;

/// Shared application state available to all handlers via Axum's
/// `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Handle to the relay hub owning agents and pending requests.
    pub relay: RelayHandle,
}
