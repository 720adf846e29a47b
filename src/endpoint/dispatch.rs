//! Turns relay frames into scene operations and reply frames.
//!
//! Kept free of I/O so the endpoint's behavior on each frame can be
//! exercised against an [`InMemoryScene`](crate::scene::InMemoryScene)
//! without a socket.

use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::domain::{CreateObjectParams, ObjectNameParams, ToolName};
use crate::error::RelayError;
use crate::grammar;
use crate::scene::{SceneFacade, SceneResponse};
use crate::ws::messages::{AgentMessage, ServerMessage};

/// Result of running one relayed command.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteOutcome {
    /// Success flag and message.
    pub response: SceneResponse,
    /// Structured payload, set only by `list_objects`.
    pub result: Option<Value>,
}

impl From<SceneResponse> for RemoteOutcome {
    fn from(response: SceneResponse) -> Self {
        Self {
            response,
            result: None,
        }
    }
}

/// Handles one text frame from the relay.
///
/// Returns the frames to send back, in order: a `response` for every
/// `command`, followed by a `state_update` when the command succeeded.
/// `init` produces nothing.
///
/// # Errors
///
/// Returns [`RelayError::MalformedMessage`] if the frame is not a known
/// relay message. The caller logs it and keeps the socket open.
pub fn handle_frame<S>(scene: &mut S, text: &str) -> Result<Vec<AgentMessage>, RelayError>
where
    S: SceneFacade + ?Sized,
{
    match ServerMessage::decode(text)? {
        ServerMessage::Init { state } => {
            tracing::info!(objects = state.objects.len(), "received initial scene state");
            Ok(Vec::new())
        }
        ServerMessage::Command {
            id,
            command,
            params,
        } => {
            let outcome = execute_remote(scene, &command, params);
            tracing::debug!(
                %id,
                command = %command,
                success = outcome.response.success,
                "executed relayed command"
            );

            let success = outcome.response.success;
            let mut replies = vec![AgentMessage::Response {
                id,
                success,
                message: outcome.response.message,
                result: outcome.result,
            }];
            if success {
                replies.push(AgentMessage::StateUpdate {
                    state: scene.snapshot(),
                });
            }
            Ok(replies)
        }
    }
}

/// Runs a relayed command string against the scene.
///
/// Tool names are dispatched with their `params`; anything else is a
/// grammar line.
pub fn execute_remote<S>(scene: &mut S, command: &str, params: Value) -> RemoteOutcome
where
    S: SceneFacade + ?Sized,
{
    let Some(tool) = ToolName::from_wire(command) else {
        return grammar::parse_and_execute(scene, command).into();
    };

    match tool {
        ToolName::CreateObject => match decode_params::<CreateObjectParams>(tool, params) {
            Ok(params) => scene.create_object(&params).into(),
            Err(err) => SceneResponse::failure(err.to_string()).into(),
        },
        ToolName::DeleteObject => match decode_params::<ObjectNameParams>(tool, params) {
            Ok(params) => scene.delete_object(&params.name).into(),
            Err(err) => SceneResponse::failure(err.to_string()).into(),
        },
        ToolName::SelectObject => match decode_params::<ObjectNameParams>(tool, params) {
            Ok(params) => scene.select_object(&params.name).into(),
            Err(err) => SceneResponse::failure(err.to_string()).into(),
        },
        ToolName::ListObjects => {
            let objects = scene.list_objects();
            RemoteOutcome {
                response: SceneResponse::success(grammar::format_object_details(&objects)),
                result: serde_json::to_value(&objects).ok(),
            }
        }
    }
}

fn decode_params<T: DeserializeOwned>(tool: ToolName, params: Value) -> Result<T, RelayError> {
    serde_json::from_value(params).map_err(|err| RelayError::InvalidParams {
        command: tool.to_string(),
        detail: err.to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::panic, clippy::indexing_slicing)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::domain::{CorrelationId, SceneSnapshot};
    use crate::scene::InMemoryScene;

    fn command_frame(id: CorrelationId, command: &str, params: Value) -> String {
        let msg = ServerMessage::Command {
            id,
            command: command.to_string(),
            params,
        };
        let Ok(text) = msg.encode() else {
            panic!("encode failed");
        };
        text
    }

    #[test]
    fn init_is_logged_only() {
        let mut scene = InMemoryScene::with_seed(1);
        let Ok(frame) = (ServerMessage::Init {
            state: SceneSnapshot::default(),
        })
        .encode() else {
            panic!("encode failed");
        };
        assert_eq!(handle_frame(&mut scene, &frame), Ok(Vec::new()));
    }

    #[test]
    fn successful_command_answers_then_reports_state() {
        let mut scene = InMemoryScene::with_seed(1);
        let id = CorrelationId::new();
        let frame = command_frame(id, "create_object", json!({"shape": "box", "name": "a"}));

        let Ok(replies) = handle_frame(&mut scene, &frame) else {
            panic!("frame should decode");
        };
        assert_eq!(replies.len(), 2);
        let AgentMessage::Response {
            id: answered,
            success,
            message,
            ..
        } = &replies[0]
        else {
            panic!("first reply must be the response");
        };
        assert_eq!(*answered, id);
        assert!(success);
        assert_eq!(message, "Created box named \"a\"");

        let AgentMessage::StateUpdate { state } = &replies[1] else {
            panic!("second reply must be the state update");
        };
        assert_eq!(state.objects.len(), 1);
        assert_eq!(state.objects[0].name, "a");
    }

    #[test]
    fn failed_command_sends_no_state_update() {
        let mut scene = InMemoryScene::with_seed(1);
        let frame = command_frame(CorrelationId::new(), "delete ghost", Value::Null);

        let Ok(replies) = handle_frame(&mut scene, &frame) else {
            panic!("frame should decode");
        };
        assert_eq!(replies.len(), 1);
        let AgentMessage::Response {
            success, message, ..
        } = &replies[0]
        else {
            panic!("expected a response");
        };
        assert!(!success);
        assert_eq!(message, "Object \"ghost\" not found");
    }

    #[test]
    fn grammar_lines_are_executed() {
        let mut scene = InMemoryScene::with_seed(1);
        let outcome = execute_remote(&mut scene, "create sphere ball", Value::Null);
        assert!(outcome.response.success);

        let outcome = execute_remote(&mut scene, "list", Value::Null);
        assert_eq!(outcome.response.message, "Objects: ball (sphere)");
        assert_eq!(outcome.result, None);
    }

    #[test]
    fn list_objects_returns_details_and_payload() {
        let mut scene = InMemoryScene::with_seed(1);
        let outcome = execute_remote(&mut scene, "list_objects", json!({}));
        assert_eq!(outcome.response.message, grammar::EMPTY_SCENE_MESSAGE);

        let _ = execute_remote(&mut scene, "create cone c", Value::Null);
        let _ = execute_remote(&mut scene, "select_object", json!({"name": "c"}));
        let outcome = execute_remote(&mut scene, "list_objects", Value::Null);
        assert!(outcome.response.message.starts_with("Objects in scene:\n- c (cone) at ("));
        assert!(outcome.response.message.ends_with("[SELECTED]"));

        let Some(Value::Array(items)) = outcome.result else {
            panic!("list_objects carries an array payload");
        };
        assert_eq!(items.len(), 1);
        assert_eq!(items[0]["type"], "cone");
        assert_eq!(items[0]["selected"], true);
    }

    #[test]
    fn bad_params_are_reported_as_failures() {
        let mut scene = InMemoryScene::with_seed(1);
        let outcome = execute_remote(&mut scene, "create_object", json!({"shape": "prism"}));
        assert!(!outcome.response.success);
        assert!(
            outcome
                .response
                .message
                .starts_with("Invalid parameters for create_object:")
        );

        let outcome = execute_remote(&mut scene, "delete_object", Value::Null);
        assert!(!outcome.response.success);
        assert!(scene.is_empty());
    }

    #[test]
    fn unknown_frames_are_malformed() {
        let mut scene = InMemoryScene::with_seed(1);
        assert!(matches!(
            handle_frame(&mut scene, r#"{"type":"reboot"}"#),
            Err(RelayError::MalformedMessage(_))
        ));
        assert!(matches!(
            handle_frame(&mut scene, "not json"),
            Err(RelayError::MalformedMessage(_))
        ));
    }
}
