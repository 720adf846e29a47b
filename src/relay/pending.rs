//! Outstanding command requests keyed by correlation identifier.
//!
//! Owned exclusively by the relay hub task, so no locking. Removal is the
//! exactly-once guard: whichever of response or timeout removes an entry
//! first gets to complete it, the other finds nothing and does nothing.

use std::collections::HashMap;
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;

use super::CommandOutcome;
use crate::domain::CorrelationId;
use crate::error::RelayError;

/// Channel on which a pending request is completed.
pub type Completion = oneshot::Sender<Result<CommandOutcome, RelayError>>;

/// One in-flight command awaiting an agent response.
#[derive(Debug)]
struct PendingRequest {
    completion: Completion,
    deadline: Instant,
}

/// Map from correlation identifier to in-flight request.
#[derive(Debug, Default)]
pub struct PendingRequests {
    requests: HashMap<CorrelationId, PendingRequest>,
}

impl PendingRequests {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a request that must complete within `timeout`.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::Internal`] if `id` is already pending; the
    /// completion is handed back so the caller can still answer it.
    pub fn insert(
        &mut self,
        id: CorrelationId,
        completion: Completion,
        timeout: Duration,
    ) -> Result<(), (RelayError, Completion)> {
        if self.requests.contains_key(&id) {
            return Err((
                RelayError::Internal(format!("correlation id {id} already pending")),
                completion,
            ));
        }
        self.requests.insert(
            id,
            PendingRequest {
                completion,
                deadline: Instant::now() + timeout,
            },
        );
        Ok(())
    }

    /// Completes `id` with an agent's outcome.
    ///
    /// Returns `false` if `id` is unknown, already answered, or already
    /// timed out.
    pub fn resolve(&mut self, id: CorrelationId, outcome: CommandOutcome) -> bool {
        let Some(request) = self.requests.remove(&id) else {
            return false;
        };
        let remaining = request.deadline.saturating_duration_since(Instant::now());
        tracing::debug!(%id, remaining_ms = remaining.as_millis(), "command resolved");
        // The caller may have given up waiting; that is not an error here.
        let _ = request.completion.send(Ok(outcome));
        true
    }

    /// Fails `id` with [`RelayError::CommandTimeout`].
    ///
    /// Returns `false` if `id` was already resolved.
    pub fn expire(&mut self, id: CorrelationId, timeout: Duration) -> bool {
        let Some(request) = self.requests.remove(&id) else {
            return false;
        };
        tracing::warn!(%id, timeout_ms = timeout.as_millis(), "command timed out");
        let _ = request.completion.send(Err(RelayError::CommandTimeout {
            timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
        }));
        true
    }

    /// Returns the number of in-flight requests.
    #[must_use]
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Returns `true` if nothing is in flight.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }
}
