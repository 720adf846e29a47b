//! In-memory scene model.
//!
//! Keeps exactly the state a rendering engine would hold for each
//! primitive (shape, placement, size, color, selection) without drawing
//! anything. Used by the agent binary and by tests.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::{SceneFacade, SceneResponse};
use crate::domain::{Color, CreateObjectParams, SceneObject, Shape, Vec3};
use crate::error::RelayError;

/// Half-width of the square in which unplaced objects are dropped.
const SCATTER_HALF_EXTENT: f64 = 4.0;

/// Size used when a create request does not specify one.
const DEFAULT_SIZE: f64 = 1.0;

/// One primitive in the scene.
#[derive(Debug, Clone, PartialEq)]
struct Primitive {
    name: String,
    shape: Shape,
    position: Vec3,
    size: f64,
    color: Color,
}

/// Scene state held entirely in memory.
///
/// Objects keep insertion order. At most one object is selected; deleting
/// it clears the selection.
#[derive(Debug)]
pub struct InMemoryScene {
    objects: Vec<Primitive>,
    selected: Option<String>,
    rng: StdRng,
}

impl InMemoryScene {
    /// Creates an empty scene with an entropy-seeded placement generator.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Creates an empty scene whose random placement is reproducible.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            objects: Vec::new(),
            selected: None,
            rng,
        }
    }

    /// Returns the number of objects in the scene.
    #[must_use]
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    /// Returns `true` if the scene holds no objects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Returns the size and color of the named object.
    #[must_use]
    pub fn appearance(&self, name: &str) -> Option<(f64, Color)> {
        self.find(name).map(|p| (p.size, p.color))
    }

    fn find(&self, name: &str) -> Option<&Primitive> {
        self.objects.iter().find(|p| p.name == name)
    }

    fn try_create(&mut self, params: &CreateObjectParams) -> Result<String, RelayError> {
        params.validate()?;
        if self.find(&params.name).is_some() {
            return Err(RelayError::AlreadyExists(params.name.clone()));
        }

        let size = params.size.unwrap_or(DEFAULT_SIZE);
        let position = params.position.unwrap_or_else(|| Vec3 {
            x: self.rng.gen_range(-SCATTER_HALF_EXTENT..SCATTER_HALF_EXTENT),
            y: size / 2.0,
            z: self.rng.gen_range(-SCATTER_HALF_EXTENT..SCATTER_HALF_EXTENT),
        });
        let color = params.color.unwrap_or_else(|| Color {
            r: self.rng.r#gen(),
            g: self.rng.r#gen(),
            b: self.rng.r#gen(),
        });

        self.objects.push(Primitive {
            name: params.name.clone(),
            shape: params.shape,
            position,
            size,
            color,
        });

        tracing::debug!(name = %params.name, shape = %params.shape, "primitive created");
        Ok(format!("Created {} named \"{}\"", params.shape, params.name))
    }

    fn try_delete(&mut self, name: &str) -> Result<String, RelayError> {
        let index = self
            .objects
            .iter()
            .position(|p| p.name == name)
            .ok_or_else(|| RelayError::NotFound(name.to_string()))?;
        self.objects.remove(index);
        if self.selected.as_deref() == Some(name) {
            self.selected = None;
        }

        tracing::debug!(name, "primitive deleted");
        Ok(format!("Deleted object \"{name}\""))
    }

    fn try_select(&mut self, name: &str) -> Result<String, RelayError> {
        if self.find(name).is_none() {
            return Err(RelayError::NotFound(name.to_string()));
        }
        self.selected = Some(name.to_string());
        Ok(format!("Selected object \"{name}\""))
    }
}

impl Default for InMemoryScene {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneFacade for InMemoryScene {
    fn create_object(&mut self, params: &CreateObjectParams) -> SceneResponse {
        self.try_create(params).into()
    }

    fn delete_object(&mut self, name: &str) -> SceneResponse {
        self.try_delete(name).into()
    }

    fn select_object(&mut self, name: &str) -> SceneResponse {
        self.try_select(name).into()
    }

    fn list_objects(&self) -> Vec<SceneObject> {
        self.objects
            .iter()
            .map(|p| SceneObject {
                name: p.name.clone(),
                shape: p.shape,
                position: p.position,
                selected: self.selected.as_deref() == Some(p.name.as_str()),
            })
            .collect()
    }
}
