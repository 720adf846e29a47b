//! Primitive shape kinds.

use std::fmt;
use std::str::FromStr;

use rmcp::schemars;
use serde::{Deserialize, Serialize};

use crate::error::RelayError;

/// Kind of primitive a scene object is built from.
///
/// Serialized in lowercase (`"box"`, `"sphere"`, ...) on the wire and in
/// tool schemas.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Shape {
    /// Axis-aligned cube.
    Box,
    /// Sphere.
    Sphere,
    /// Cylinder.
    Cylinder,
    /// Cone (cylinder with zero top diameter).
    Cone,
    /// Torus.
    Torus,
}

impl Shape {
    /// Every supported shape, in the order they are listed to users.
    pub const ALL: [Self; 5] = [
        Self::Box,
        Self::Sphere,
        Self::Cylinder,
        Self::Cone,
        Self::Torus,
    ];

    /// Returns the lowercase label used on the wire.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Box => "box",
            Self::Sphere => "sphere",
            Self::Cylinder => "cylinder",
            Self::Cone => "cone",
            Self::Torus => "torus",
        }
    }
}

impl fmt::Display for Shape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Shape {
    type Err = RelayError;

    /// Parses an exact lowercase label. Callers lowercase first.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|shape| shape.as_str() == s)
            .ok_or_else(|| RelayError::InvalidShape(s.to_string()))
    }
}
