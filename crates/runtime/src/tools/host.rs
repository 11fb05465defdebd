//! Tool host trait.

use crate::model::{ToolCall, ToolSpec};
use crate::tools::ToolError;
use serde_json::Value;
use std::future::Future;

/// Where the agent sends tool calls.
///
/// `specs` is offered to the model on every step. `execute` failures are
/// handed back to the model as failed results rather than ending the run.
pub trait ToolHost: Send + Sync {
    fn specs(&self) -> &[ToolSpec];

    /// Run one call and return its output value.
    fn execute(&self, call: &ToolCall) -> impl Future<Output = Result<Value, ToolError>> + Send;
}
