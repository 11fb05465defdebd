//! Run events and the handle a caller consumes them through.

use crate::context::Turn;
use crate::model::{ToolCall, ToolResult, Usage};
use crate::{Error, Result};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::task::{Context, Poll};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Something that happened during a model run, in emission order.
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// A fragment of assistant text.
    TextDelta(String),
    /// The model asked for a tool; the call is about to execute.
    ToolCallStarted(ToolCall),
    /// A tool call completed, successfully or not.
    ToolCallFinished(ToolResult),
}

/// Terminal result of a run.
#[derive(Debug, Clone, Default)]
pub struct AgentOutput {
    /// Final assistant answer, if the run produced one.
    pub response: Option<String>,
    pub usage: Usage,
    /// Model calls made during the run.
    pub steps: usize,
}

pub type EventSender = mpsc::UnboundedSender<RunEvent>;

/// A run in flight.
///
/// Yields [`RunEvent`]s as a [`Stream`]. The stream ends when the run stops
/// emitting; it is consumed once and returns `None` from then on. Call
/// [`finish`](Self::finish) afterwards for the terminal result.
///
/// Dropping the handle aborts the run.
pub struct RunHandle {
    events: mpsc::UnboundedReceiver<RunEvent>,
    task: JoinHandle<Result<AgentOutput>>,
}

impl RunHandle {
    /// Spawn `run` on the tokio runtime, handing it the event sender.
    pub fn spawn<F, Fut>(run: F) -> Self
    where
        F: FnOnce(EventSender) -> Fut,
        Fut: Future<Output = Result<AgentOutput>> + Send + 'static,
    {
        let (tx, events) = mpsc::unbounded_channel();
        let task = tokio::spawn(run(tx));
        Self { events, task }
    }

    /// Wait for the run to end and return its result.
    pub async fn finish(mut self) -> Result<AgentOutput> {
        (&mut self.task)
            .await
            .map_err(|e| Error::Run(format!("run task failed: {e}")))?
    }
}

impl Drop for RunHandle {
    fn drop(&mut self) {
        self.task.abort();
    }
}

impl Stream for RunHandle {
    type Item = RunEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<RunEvent>> {
        self.events.poll_recv(cx)
    }
}

/// Anything that can run the model for one user turn.
pub trait ModelClient: Send + Sync {
    /// Start a run over `history` plus the new `user_message`.
    ///
    /// Must be called from within a tokio runtime.
    fn run(&self, history: &[Turn], user_message: &str) -> RunHandle;

    /// Model identifier, for banners and transcripts.
    fn model(&self) -> &str;
}
