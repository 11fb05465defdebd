//! Terminal rendering of a running turn.

use runtime::{Presenter, ToolActivity};
use std::fmt;
use std::io::Write;
use tracing::debug;

const INDENT: &str = "   ";

/// Streams a turn to a terminal (or any writer).
pub struct TerminalPresenter<W: Write> {
    out: W,
    streamed: String,
    mid_line: bool,
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            streamed: String::new(),
            mid_line: false,
        }
    }

    /// Close off a turn that failed part way.
    pub fn interrupt(&mut self) {
        self.end_line();
        self.streamed.clear();
    }

    #[cfg(test)]
    fn into_inner(self) -> W {
        self.out
    }

    fn emit(&mut self, args: fmt::Arguments<'_>) {
        if let Err(error) = self.out.write_fmt(args).and_then(|_| self.out.flush()) {
            debug!(%error, "terminal write failed");
        }
    }

    fn end_line(&mut self) {
        if self.mid_line {
            self.emit(format_args!("\n"));
            self.mid_line = false;
        }
    }

    fn block(&mut self, label: &str, body: &str) {
        self.emit(format_args!("{INDENT}{label}:\n"));
        for line in body.lines() {
            self.emit(format_args!("{INDENT}{INDENT}{line}\n"));
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn text_delta(&mut self, fragment: &str) {
        self.emit(format_args!("{fragment}"));
        self.streamed.push_str(fragment);
        self.mid_line = !fragment.ends_with('\n');
    }

    fn tool_started(&mut self, activity: &ToolActivity) {
        self.end_line();
        self.emit(format_args!("🛠️ {}\n", activity.name));
        self.block("input", &activity.input);
    }

    fn tool_finished(&mut self, activity: &ToolActivity) {
        let label = if activity.is_error { "error" } else { "output" };
        let body = activity.output.as_deref().unwrap_or_default();
        self.block(label, body);
    }

    fn finalize(&mut self, text: &str) {
        self.end_line();
        if text.trim() != self.streamed.trim() {
            self.emit(format_args!("\n{text}\n"));
        }
        self.emit(format_args!("\n"));
        self.streamed.clear();
    }
}
