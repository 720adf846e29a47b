//! Scene object descriptors, snapshots, and structured request parameters.

use rmcp::schemars;
use serde::{Deserialize, Serialize};

use super::Shape;
use crate::error::RelayError;

/// A point in scene space.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Vec3 {
    /// X coordinate.
    pub x: f64,
    /// Y coordinate (up).
    pub y: f64,
    /// Z coordinate.
    pub z: f64,
}

impl Vec3 {
    /// Creates a new point.
    #[must_use]
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

/// RGB color with channels in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Color {
    /// Red channel, 0 to 1.
    #[schemars(range(min = 0.0, max = 1.0))]
    pub r: f64,
    /// Green channel, 0 to 1.
    #[schemars(range(min = 0.0, max = 1.0))]
    pub g: f64,
    /// Blue channel, 0 to 1.
    #[schemars(range(min = 0.0, max = 1.0))]
    pub b: f64,
}

impl Color {
    /// Returns `true` if every channel lies in `[0, 1]`.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        [self.r, self.g, self.b]
            .iter()
            .all(|c| (0.0..=1.0).contains(c))
    }
}

/// Observable description of one object in the scene.
///
/// Owned by the scene; the relay only ever sees copies of it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    /// Unique name within the scene.
    pub name: String,
    /// Primitive kind.
    #[serde(rename = "type")]
    pub shape: Shape,
    /// World position.
    pub position: Vec3,
    /// Whether this is the currently selected object.
    pub selected: bool,
}

/// Full scene contents as reported by an agent.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneSnapshot {
    /// Objects in insertion order.
    #[serde(default)]
    pub objects: Vec<SceneObject>,
}

impl SceneSnapshot {
    /// Returns the selected object, if any.
    #[must_use]
    pub fn selected(&self) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.selected)
    }
}

/// Parameters for creating a primitive.
///
/// The grammar only ever fills `shape` and `name`; the tool adapter may
/// supply the optional fields as well.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CreateObjectParams {
    /// The shape of the object to create.
    pub shape: Shape,
    /// Unique name for the object.
    pub name: String,
    /// Position of the object. Random on the ground plane when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Vec3>,
    /// Size of the object (default: 1). Must be positive.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<f64>,
    /// RGB color values in the 0-1 range. Random when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<Color>,
}

impl CreateObjectParams {
    /// Creates parameters with only shape and name set.
    #[must_use]
    pub fn new(shape: Shape, name: impl Into<String>) -> Self {
        Self {
            shape,
            name: name.into(),
            position: None,
            size: None,
            color: None,
        }
    }

    /// Checks the optional fields against their documented ranges.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::InvalidParams`] if `size` is not positive or
    /// a color channel lies outside `[0, 1]`.
    pub fn validate(&self) -> Result<(), RelayError> {
        if let Some(size) = self.size
            && !(size > 0.0 && size.is_finite())
        {
            return Err(RelayError::InvalidParams {
                command: "create_object".to_string(),
                detail: format!("size must be a positive number, got {size}"),
            });
        }
        if let Some(color) = self.color
            && !color.is_normalized()
        {
            return Err(RelayError::InvalidParams {
                command: "create_object".to_string(),
                detail: "color channels must lie in [0, 1]".to_string(),
            });
        }
        Ok(())
    }
}

/// Parameters naming a single existing object (delete, select).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ObjectNameParams {
    /// Name of the target object.
    pub name: String,
}

impl ObjectNameParams {
    /// Wraps a name.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }
}
