//! Presentation seam for a running turn.

use super::ToolActivity;

/// Receives incremental updates while a turn runs.
pub trait Presenter {
    /// A fragment of assistant text, in arrival order.
    fn text_delta(&mut self, fragment: &str);

    /// A tool call was started.
    fn tool_started(&mut self, activity: &ToolActivity);

    /// A started tool call now has its output.
    fn tool_finished(&mut self, activity: &ToolActivity);

    /// The turn is over; `text` is what should remain visible.
    fn finalize(&mut self, text: &str);
}

/// Discards everything.
#[derive(Debug, Default)]
pub struct NullPresenter;

impl Presenter for NullPresenter {
    fn text_delta(&mut self, _fragment: &str) {}
    fn tool_started(&mut self, _activity: &ToolActivity) {}
    fn tool_finished(&mut self, _activity: &ToolActivity) {}
    fn finalize(&mut self, _text: &str) {}
}
