//! Tool execution and MCP integration.

mod empty;
mod endpoint;
pub mod errors;
mod host;
mod mcp_client;
mod mcp_host;

pub use empty::EmptyToolHost;
pub use endpoint::McpEndpoint;
pub use errors::ToolError;
pub use host::ToolHost;
pub use mcp_client::{McpClient, McpError};
pub use mcp_host::McpToolHost;
