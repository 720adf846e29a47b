//! MCP server exposing the scene operations as tools.
//!
//! Each tool is a pass-through to [`RelayHandle::send_command_to_agents`].
//! Argument presence is enforced by the tool schemas, so a call with missing
//! fields fails at the protocol level. Relay failures (no agents, timeouts)
//! come back as error-flagged text content instead.

use std::fmt;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo};
use rmcp::{ErrorData, ServerHandler, ServiceExt, tool, tool_handler, tool_router};
use serde::Serialize;

use crate::domain::{CreateObjectParams, ObjectNameParams, ToolName};
use crate::error::RelayError;
use crate::relay::{CommandOutcome, RelayHandle};

/// Tool server bound to a running relay hub.
#[derive(Clone)]
pub struct SceneToolServer {
    relay: RelayHandle,
    tool_router: ToolRouter<Self>,
}

impl fmt::Debug for SceneToolServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SceneToolServer")
            .field("relay", &self.relay)
            .finish_non_exhaustive()
    }
}

#[tool_router]
impl SceneToolServer {
    /// Creates a server that relays every tool call through `relay`.
    #[must_use]
    pub fn new(relay: RelayHandle) -> Self {
        Self {
            relay,
            tool_router: Self::tool_router(),
        }
    }

    /// Serves MCP over stdin/stdout until the client disconnects.
    ///
    /// # Errors
    ///
    /// Returns an error if the MCP handshake fails or the service task
    /// panics.
    pub async fn serve_stdio(self) -> anyhow::Result<()> {
        let service = self.serve((tokio::io::stdin(), tokio::io::stdout())).await?;
        let reason = service.waiting().await?;
        tracing::info!(?reason, "MCP client disconnected");
        Ok(())
    }

    #[tool(
        description = "Create a 3D primitive in the scene. Position, size and color are optional; omitted values get random placement and color."
    )]
    async fn create_object(
        &self,
        Parameters(args): Parameters<CreateObjectParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.relay_tool(ToolName::CreateObject, &args).await
    }

    #[tool(description = "Delete an object from the scene by name.")]
    async fn delete_object(
        &self,
        Parameters(args): Parameters<ObjectNameParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.relay_tool(ToolName::DeleteObject, &args).await
    }

    #[tool(description = "Select an object in the scene by name, replacing any current selection.")]
    async fn select_object(
        &self,
        Parameters(args): Parameters<ObjectNameParams>,
    ) -> Result<CallToolResult, ErrorData> {
        self.relay_tool(ToolName::SelectObject, &args).await
    }

    #[tool(description = "List every object in the scene with its type, position and selection.")]
    async fn list_objects(&self) -> Result<CallToolResult, ErrorData> {
        self.relay_tool(ToolName::ListObjects, &serde_json::json!({})).await
    }

    async fn relay_tool<P: Serialize>(
        &self,
        tool: ToolName,
        args: &P,
    ) -> Result<CallToolResult, ErrorData> {
        let params = serde_json::to_value(args).map_err(|e| {
            ErrorData::internal_error(format!("Unable to encode {tool} arguments: {e}"), None)
        })?;
        tracing::debug!(%tool, %params, "relaying tool call");

        let result = self.relay.send_command_to_agents(tool.as_str(), params).await;
        Ok(format_result(tool, result))
    }
}

/// Turns a relay outcome into a single text content block.
fn format_result(tool: ToolName, result: Result<CommandOutcome, RelayError>) -> CallToolResult {
    match result {
        Ok(outcome) if outcome.success => {
            CallToolResult::success(vec![Content::text(outcome.text())])
        }
        Ok(outcome) => CallToolResult::error(vec![Content::text(outcome.text())]),
        Err(err) => {
            if err.is_client_error() {
                tracing::debug!(%tool, code = err.error_code(), error = %err, "tool call rejected");
            } else {
                tracing::warn!(%tool, code = err.error_code(), error = %err, "tool call failed");
            }
            CallToolResult::error(vec![Content::text(format!("Error: {err}"))])
        }
    }
}

#[tool_handler]
impl ServerHandler for SceneToolServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(
                "Scene relay (tools: create_object, delete_object, select_object, list_objects). \
                 Commands run in every connected scene agent; the first answer wins."
                    .into(),
            ),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            ..Default::default()
        }
    }
}
