//! Per-turn tool activity records.

use crate::model::{ToolCall, ToolResult};
use serde::Serialize;
use serde_json::Value;
use std::collections::HashMap;
use std::fmt::Debug;
use tracing::warn;

/// What the presentation layer shows for one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolActivity {
    pub id: String,
    pub name: String,
    /// Rendered arguments.
    pub input: String,
    /// Rendered output (or error message) once the call has finished.
    pub output: Option<String>,
    pub is_error: bool,
}

/// Tool activity for the turn in progress, keyed by invocation id.
#[derive(Debug, Default)]
pub(crate) struct ToolActivityLog {
    records: Vec<ToolActivity>,
    index: HashMap<String, usize>,
}

impl ToolActivityLog {
    /// Record a started call. A repeated id resets the existing record.
    pub(crate) fn start(&mut self, call: &ToolCall) -> &ToolActivity {
        let activity = ToolActivity {
            id: call.id.clone(),
            name: call.name.clone(),
            input: render(&call.input),
            output: None,
            is_error: false,
        };

        let slot = match self.index.get(&call.id) {
            Some(&slot) => {
                self.records[slot] = activity;
                slot
            }
            None => {
                self.records.push(activity);
                self.index.insert(call.id.clone(), self.records.len() - 1);
                self.records.len() - 1
            }
        };
        &self.records[slot]
    }

    /// Attach a result to its started call.
    ///
    /// Returns `None` when no call with that id was started this turn.
    pub(crate) fn finish(&mut self, result: &ToolResult) -> Option<&ToolActivity> {
        let &slot = self.index.get(result.tool_call_id())?;
        let record = &mut self.records[slot];
        record.output = Some(render_result(result));
        record.is_error = result.is_error();
        Some(&*record)
    }

    /// Records in the order their calls started.
    pub(crate) fn into_records(self) -> Vec<ToolActivity> {
        self.records
    }
}

/// Pretty JSON, or the value's debug form if it will not serialize.
pub fn render<T: Serialize + Debug + ?Sized>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|error| {
        warn!(%error, "falling back to plain rendering");
        format!("{value:?}")
    })
}

/// Strings are shown as-is; errors as their message.
fn render_result(result: &ToolResult) -> String {
    match result {
        ToolResult::Success {
            output: Value::String(text),
            ..
        } => text.clone(),
        ToolResult::Success { output, .. } => render(output),
        ToolResult::Failure { error, .. } => error.to_string(),
    }
}
