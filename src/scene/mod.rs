//! Scene facade: the capability surface of the rendering collaborator.
//!
//! The relay never touches meshes. It only needs four operations, and
//! every implementation reports outcomes as a [`SceneResponse`] instead of
//! an error so that failures travel back to the caller as plain messages.

pub mod memory;

use serde::{Deserialize, Serialize};

use crate::domain::{CreateObjectParams, SceneObject, SceneSnapshot};
use crate::error::RelayError;

pub use memory::InMemoryScene;

/// Outcome of a scene operation or grammar command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneResponse {
    /// Whether the operation took effect.
    pub success: bool,
    /// Human-readable outcome.
    pub message: String,
}

impl SceneResponse {
    /// A successful outcome.
    #[must_use]
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }

    /// A failed outcome.
    #[must_use]
    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            success: false,
            message: message.into(),
        }
    }
}

impl From<Result<String, RelayError>> for SceneResponse {
    fn from(result: Result<String, RelayError>) -> Self {
        match result {
            Ok(message) => Self::success(message),
            Err(err) => Self::failure(err.to_string()),
        }
    }
}

/// The four operations a live scene exposes to the grammar and the relay.
pub trait SceneFacade: Send {
    /// Creates a primitive.
    fn create_object(&mut self, params: &CreateObjectParams) -> SceneResponse;

    /// Deletes the object with the given name.
    fn delete_object(&mut self, name: &str) -> SceneResponse;

    /// Makes the named object the single selected one.
    fn select_object(&mut self, name: &str) -> SceneResponse;

    /// Returns every object in insertion order.
    fn list_objects(&self) -> Vec<SceneObject>;

    /// Returns the current contents as a snapshot.
    fn snapshot(&self) -> SceneSnapshot {
        SceneSnapshot {
            objects: self.list_objects(),
        }
    }
}
