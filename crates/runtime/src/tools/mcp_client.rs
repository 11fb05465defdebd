//! MCP (Model Context Protocol) client over Streamable HTTP.
//!
//! Thin wrapper over the official rmcp SDK. Framing, session handling and
//! the server-push channel all live in rmcp; this type only connects and
//! exposes the two requests the tool host needs.

use super::McpEndpoint;
use rmcp::{
    ServiceExt,
    model::{CallToolRequestParams, CallToolResult, Tool},
    service::{RoleClient, RunningService},
    transport::StreamableHttpClientTransport,
};
use tracing::debug;

/// Error type for MCP operations.
pub type McpError = Box<dyn std::error::Error + Send + Sync>;

/// An MCP client connected to a remote server.
pub struct McpClient {
    service: RunningService<RoleClient, ()>,
}

impl McpClient {
    /// Connect to the server and complete the MCP handshake.
    pub async fn connect(endpoint: &McpEndpoint) -> Result<Self, McpError> {
        let transport = StreamableHttpClientTransport::from_uri(endpoint.as_str());
        let service = ().serve(transport).await?;

        if let Some(info) = service.peer_info() {
            debug!(
                server = %info.server_info.name,
                version = %info.server_info.version,
                "MCP handshake complete"
            );
        }

        Ok(Self { service })
    }

    /// List available tools from the server.
    pub async fn list_tools(&self) -> Result<Vec<Tool>, McpError> {
        let response = self.service.list_tools(Default::default()).await?;
        Ok(response.tools)
    }

    /// Call a tool with the given name and arguments.
    pub async fn call_tool(
        &self,
        name: impl Into<String>,
        arguments: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<CallToolResult, McpError> {
        let params = CallToolRequestParams {
            name: name.into().into(),
            arguments,
            meta: None,
            task: None,
        };

        let result = self.service.call_tool(params).await?;
        Ok(result)
    }

    /// Close the MCP session.
    pub async fn shutdown(self) -> Result<(), McpError> {
        self.service.cancel().await?;
        Ok(())
    }
}
