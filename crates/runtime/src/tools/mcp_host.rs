//! MCP-backed tool host.

use super::{McpClient, McpEndpoint, McpError, ToolError, ToolHost};
use crate::model::{ToolCall, ToolSpec};
use rmcp::model::Tool;
use serde_json::{Map, Value};
use tracing::{debug, info};

/// Tool host backed by a remote MCP server.
pub struct McpToolHost {
    client: McpClient,
    specs: Vec<ToolSpec>,
}

impl McpToolHost {
    /// Connect to the server and cache its tool specs.
    pub async fn connect(endpoint: &McpEndpoint) -> Result<Self, McpError> {
        let client = McpClient::connect(endpoint).await?;
        let specs: Vec<ToolSpec> = client
            .list_tools()
            .await?
            .into_iter()
            .map(ToolSpec::from)
            .collect();

        info!(endpoint = %endpoint, tools = specs.len(), "connected to MCP server");
        Ok(Self { client, specs })
    }

    /// Close the MCP session.
    pub async fn shutdown(self) -> Result<(), McpError> {
        self.client.shutdown().await
    }
}

impl From<Tool> for ToolSpec {
    fn from(tool: Tool) -> Self {
        Self {
            name: tool.name.to_string(),
            description: tool.description.map(|d| d.to_string()).unwrap_or_default(),
            schema: Value::Object((*tool.input_schema).clone()),
        }
    }
}

impl ToolHost for McpToolHost {
    fn specs(&self) -> &[ToolSpec] {
        &self.specs
    }

    async fn execute(&self, call: &ToolCall) -> Result<Value, ToolError> {
        let arguments = ToolArguments::try_from(call.input.clone())?;
        debug!(tool = %call.name, id = %call.id, "calling MCP tool");

        let result = self
            .client
            .call_tool(&call.name, arguments.0)
            .await
            .map_err(|e| ToolError::Execution(e.to_string()))?;

        let content = serde_json::to_value(&result.content)
            .map_err(|e| ToolError::Execution(format!("serialize result: {e}")))?;
        let output = content_output(content);

        if result.is_error.unwrap_or(false) {
            let message = match output {
                Value::String(text) => text,
                other => other.to_string(),
            };
            return Err(ToolError::Execution(message));
        }
        Ok(output)
    }
}

/// Arguments accepted by an MCP `tools/call` request.
struct ToolArguments(Option<Map<String, Value>>);

impl TryFrom<Value> for ToolArguments {
    type Error = ToolError;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match value {
            Value::Object(map) => Ok(Self(Some(map))),
            Value::Null => Ok(Self(None)),
            other => Err(ToolError::InvalidInput(format!(
                "expected a JSON object, got {other}"
            ))),
        }
    }
}

/// Collapse MCP result content into one value.
///
/// Results made only of text parts become a single string, which is what a
/// human (and the model) wants to read; anything richer stays JSON.
fn content_output(content: Value) -> Value {
    let Value::Array(parts) = content else {
        return content;
    };

    let joined = parts
        .iter()
        .map(|part| match (part.get("type"), part.get("text")) {
            (Some(Value::String(kind)), Some(Value::String(text))) if kind == "text" => {
                Some(text.as_str())
            }
            _ => None,
        })
        .collect::<Option<Vec<&str>>>()
        .filter(|texts| !texts.is_empty())
        .map(|texts| texts.join("\n"));

    match joined {
        Some(text) => Value::String(text),
        None => Value::Array(parts),
    }
}
