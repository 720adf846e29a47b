//! Textual command grammar.
//!
//! `create <shape> <name>`, `delete <name>`, `select <name>`, `list`.
//! Case-insensitive and whitespace-delimited. Every outcome, including
//! parse failures, comes back as a [`SceneResponse`]; nothing is raised
//! past this boundary.

use crate::domain::{Command, CreateObjectParams, SceneObject};
use crate::scene::{SceneFacade, SceneResponse};

/// Message returned by `list` on an empty scene.
pub const EMPTY_SCENE_MESSAGE: &str = "No objects in the scene";

/// Parses `line` and runs it against `scene`.
pub fn parse_and_execute<S>(scene: &mut S, line: &str) -> SceneResponse
where
    S: SceneFacade + ?Sized,
{
    let command = match Command::parse(line) {
        Ok(command) => command,
        Err(err) => {
            tracing::debug!(line, error = %err, "rejected command line");
            return SceneResponse::failure(err.to_string());
        }
    };
    tracing::debug!(verb = %command.verb(), "executing command line");

    match command {
        // Grammar-created objects always get default size, random
        // placement and random color.
        Command::Create { shape, name } => {
            scene.create_object(&CreateObjectParams::new(shape, name))
        }
        Command::Delete { name } => scene.delete_object(&name),
        Command::Select { name } => scene.select_object(&name),
        Command::List => {
            let objects = scene.list_objects();
            if objects.is_empty() {
                SceneResponse::success(EMPTY_SCENE_MESSAGE)
            } else {
                SceneResponse::success(format!("Objects: {}", format_object_list(&objects)))
            }
        }
    }
}

/// Formats objects as `name (type)[ [SELECTED]]`, comma-separated.
#[must_use]
pub fn format_object_list(objects: &[SceneObject]) -> String {
    objects
        .iter()
        .map(|obj| {
            let marker = if obj.selected { " [SELECTED]" } else { "" };
            format!("{} ({}){marker}", obj.name, obj.shape)
        })
        .collect::<Vec<_>>()
        .join(", ")
}

/// Formats objects one per line with their positions, as reported to tool
/// callers.
#[must_use]
pub fn format_object_details(objects: &[SceneObject]) -> String {
    if objects.is_empty() {
        return EMPTY_SCENE_MESSAGE.to_string();
    }
    let lines = objects
        .iter()
        .map(|obj| {
            let marker = if obj.selected { " [SELECTED]" } else { "" };
            format!(
                "- {} ({}) at ({:.2}, {:.2}, {:.2}){marker}",
                obj.name, obj.shape, obj.position.x, obj.position.y, obj.position.z
            )
        })
        .collect::<Vec<_>>()
        .join("\n");
    format!("Objects in scene:\n{lines}")
}
