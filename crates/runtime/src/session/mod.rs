//! Session management and the per-turn run coordinator.

mod activity;
mod presenter;

pub use activity::{ToolActivity, render};
use activity::ToolActivityLog;
pub use presenter::{NullPresenter, Presenter};

use crate::Result;
use crate::agent::{ModelClient, RunEvent};
use crate::context::Turn;
use crate::model::{ToolResult, Usage};
use futures::StreamExt;
use storage::{Event, EventKind, EventStore, SessionId};
use tracing::{debug, warn};

/// What a completed turn left behind.
#[derive(Debug, Clone, PartialEq)]
pub struct TurnOutcome {
    /// Text that remains visible: the final response, or the streamed text
    /// when the run produced none.
    pub text: String,
    /// Whether an assistant turn was added to the context.
    pub answered: bool,
    /// Tool activity in start order.
    pub tools: Vec<ToolActivity>,
    pub usage: Usage,
    pub steps: usize,
}

/// A conversation session.
pub struct Session<C> {
    pub id: SessionId,
    store: EventStore,
    client: C,
    context: Vec<Turn>,
}

impl<C: ModelClient> Session<C> {
    /// Create a new session with the given store and model client.
    pub fn new(store: EventStore, client: C) -> Result<Self> {
        let id = SessionId::new();
        store.append(&Event::new(
            id,
            EventKind::SessionStart {
                model: client.model().to_string(),
            },
        ))?;

        Ok(Self {
            id,
            store,
            client,
            context: Vec::new(),
        })
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    /// Turns so far, oldest first.
    pub fn context(&self) -> &[Turn] {
        &self.context
    }

    /// Run one user turn to completion.
    ///
    /// Text and tool activity reach `presenter` as the run produces them.
    /// A run failure is returned as-is; the user turn stays in the context
    /// and no assistant turn is added.
    pub async fn run_turn(
        &mut self,
        user_message: &str,
        presenter: &mut impl Presenter,
    ) -> Result<TurnOutcome> {
        let history_len = self.context.len();
        self.context.push(Turn::user(user_message));
        self.store
            .append(&Event::message(self.id, storage::Role::User, user_message))?;

        let mut run = self
            .client
            .run(&self.context[..history_len], user_message);
        debug!(session = %self.id, "turn streaming");

        let mut text = String::new();
        let mut activity = ToolActivityLog::default();

        while let Some(event) = run.next().await {
            match event {
                RunEvent::TextDelta(fragment) => {
                    presenter.text_delta(&fragment);
                    text.push_str(&fragment);
                }
                RunEvent::ToolCallStarted(call) => {
                    self.store.append(&Event::new(
                        self.id,
                        EventKind::ToolCall {
                            call_id: call.id.clone(),
                            name: call.name.clone(),
                            input: call.input.clone(),
                        },
                    ))?;
                    presenter.tool_started(activity.start(&call));
                }
                RunEvent::ToolCallFinished(result) => match activity.finish(&result) {
                    Some(record) => {
                        self.store.append(&tool_result_event(self.id, record, &result))?;
                        presenter.tool_finished(record);
                    }
                    None => {
                        warn!(
                            id = result.tool_call_id(),
                            "dropping tool result with no matching call"
                        );
                    }
                },
            }
        }

        debug!(session = %self.id, "turn finalizing");
        let output = run.finish().await?;

        let response = output.response.filter(|r| !r.is_empty());
        let answered = response.is_some();
        if let Some(response) = response {
            self.store.append(&Event::message(
                self.id,
                storage::Role::Assistant,
                &response,
            ))?;
            self.context.push(Turn::assistant(&response));
            text = response;
        }
        presenter.finalize(&text);

        Ok(TurnOutcome {
            text,
            answered,
            tools: activity.into_records(),
            usage: output.usage,
            steps: output.steps,
        })
    }

    /// Swap the model client and start over with an empty context.
    pub fn reconfigure(&mut self, client: C) -> Result<()> {
        self.client = client;
        self.context.clear();
        self.store.append(&Event::new(
            self.id,
            EventKind::Reconfigured {
                model: self.client.model().to_string(),
            },
        ))?;
        Ok(())
    }

    /// End the session.
    pub fn end(self) -> Result<()> {
        self.store
            .append(&Event::new(self.id, EventKind::SessionEnd))?;
        Ok(())
    }
}

fn tool_result_event(id: SessionId, record: &ToolActivity, result: &ToolResult) -> Event {
    Event::new(
        id,
        EventKind::ToolResult {
            call_id: record.id.clone(),
            name: record.name.clone(),
            output: result.content(),
            is_error: result.is_error(),
        },
    )
}
