//! Wire messages exchanged between the relay and scene agents.
//!
//! Every frame is a JSON object discriminated by its `type` field:
//!
//! | Direction      | `type`         | Fields                                   |
//! |----------------|----------------|------------------------------------------|
//! | relay → agent  | `init`         | `state`                                  |
//! | relay → agent  | `command`      | `id`, `command`, `params`                |
//! | agent → relay  | `response`     | `id`, `success`, `message`, `result?`    |
//! | agent → relay  | `state_update` | `state`                                  |
//!
//! Anything else, including an unknown `type`, decodes to
//! [`RelayError::MalformedMessage`].

use serde::{Deserialize, Serialize};

use crate::domain::{CorrelationId, SceneSnapshot};
use crate::error::RelayError;

/// Messages the relay sends to agents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Sent once right after an agent connects.
    Init {
        /// Last snapshot reported by any agent.
        state: SceneSnapshot,
    },
    /// A command the agent should execute and answer.
    Command {
        /// Correlation identifier to echo back.
        id: CorrelationId,
        /// Tool name or grammar line.
        command: String,
        /// Structured arguments; `null` for grammar lines.
        #[serde(default)]
        params: serde_json::Value,
    },
}

/// Messages agents send to the relay.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentMessage {
    /// Answer to a [`ServerMessage::Command`].
    Response {
        /// Correlation identifier of the command being answered.
        id: CorrelationId,
        /// Whether the command took effect.
        success: bool,
        /// Human-readable outcome.
        message: String,
        /// Optional structured payload.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<serde_json::Value>,
    },
    /// Full replacement of the relay's cached scene snapshot.
    StateUpdate {
        /// Current scene contents.
        state: SceneSnapshot,
    },
}

impl ServerMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MalformedMessage`] for non-JSON input, an
    /// unknown `type`, or missing fields.
    pub fn decode(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes this message as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MalformedMessage`] if serialization fails.
    pub fn encode(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

impl AgentMessage {
    /// Decodes a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MalformedMessage`] for non-JSON input, an
    /// unknown `type`, or missing fields.
    pub fn decode(text: &str) -> Result<Self, RelayError> {
        Ok(serde_json::from_str(text)?)
    }

    /// Encodes this message as a text frame.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::MalformedMessage`] if serialization fails.
    pub fn encode(&self) -> Result<String, RelayError> {
        Ok(serde_json::to_string(self)?)
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::domain::{SceneObject, Shape, Vec3};

    #[test]
    fn command_frame_shape() {
        let id = CorrelationId::new();
        let msg = ServerMessage::Command {
            id,
            command: "create_object".to_string(),
            params: serde_json::json!({"shape": "box", "name": "a"}),
        };
        let Ok(text) = msg.encode() else {
            panic!("encode failed");
        };
        let value: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();
        assert_eq!(value["type"], "command");
        assert_eq!(value["id"], id.to_string());
        assert_eq!(value["params"]["shape"], "box");
    }

    #[test]
    fn init_frame_carries_snapshot() {
        let msg = ServerMessage::Init {
            state: SceneSnapshot {
                objects: vec![SceneObject {
                    name: "a".to_string(),
                    shape: Shape::Cylinder,
                    position: Vec3::default(),
                    selected: false,
                }],
            },
        };
        let text = msg.encode().unwrap_or_default();
        assert!(text.contains(r#""type":"init""#));
        assert!(text.contains(r#""type":"cylinder""#));
    }

    #[test]
    fn response_without_result_decodes() {
        let id = CorrelationId::new();
        let text = format!(r#"{{"type":"response","id":"{id}","success":true,"message":"ok"}}"#);
        let Ok(AgentMessage::Response {
            id: got,
            success,
            result,
            ..
        }) = AgentMessage::decode(&text)
        else {
            panic!("response should decode");
        };
        assert_eq!(got, id);
        assert!(success);
        assert!(result.is_none());
    }

    #[test]
    fn state_update_decodes() {
        let text = r#"{"type":"state_update","state":{"objects":[
            {"name":"b","type":"torus","position":{"x":0,"y":1,"z":2},"selected":true}
        ]}}"#;
        let Ok(AgentMessage::StateUpdate { state }) = AgentMessage::decode(text) else {
            panic!("state_update should decode");
        };
        assert_eq!(state.selected().map(|o| o.shape), Some(Shape::Torus));
    }

    #[test]
    fn unknown_type_and_garbage_are_malformed() {
        for text in [
            r#"{"type":"hello"}"#,
            "not json",
            r#"{"type":"response","success":true}"#,
        ] {
            let Err(err) = AgentMessage::decode(text) else {
                panic!("{text} should not decode");
            };
            assert!(matches!(err, RelayError::MalformedMessage(_)));
        }
    }
}
