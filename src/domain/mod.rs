//! Domain layer: shapes, scene descriptors, parsed commands, identifiers.
//!
//! Everything here is plain data. The scene itself lives behind
//! [`crate::scene::SceneFacade`]; the relay only moves these types around.

pub mod command;
pub mod correlation_id;
pub mod scene_object;
pub mod shape;

pub use command::{Command, ToolName, Verb};
pub use correlation_id::{AgentId, CorrelationId};
pub use scene_object::{
    Color, CreateObjectParams, ObjectNameParams, SceneObject, SceneSnapshot, Vec3,
};
pub use shape::Shape;
