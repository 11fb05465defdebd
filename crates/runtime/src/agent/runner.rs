//! Function-calling loop over a backend and a tool host.

use super::handle::{AgentOutput, EventSender, ModelClient, RunEvent, RunHandle};
use crate::context::Turn;
use crate::model::{Backend, Message, ModelRequest, ToolResult, Usage};
use crate::tools::ToolHost;
use crate::{Error, Result};
use std::sync::Arc;
use tracing::debug;

/// Default number of model calls allowed in one run.
pub const DEFAULT_MAX_STEPS: usize = 20;

/// Drives a model through tool calls until it answers.
pub struct Agent<B, T> {
    backend: Arc<B>,
    tools: Arc<T>,
    system: Option<String>,
    max_steps: usize,
}

impl<B, T> Agent<B, T>
where
    B: Backend + 'static,
    T: ToolHost + 'static,
{
    pub fn new(backend: B, tools: T) -> Self {
        Self::from_shared(Arc::new(backend), Arc::new(tools))
    }

    /// Build from already shared parts, e.g. to keep one tool host across
    /// a model switch.
    pub fn from_shared(backend: Arc<B>, tools: Arc<T>) -> Self {
        Self {
            backend,
            tools,
            system: None,
            max_steps: DEFAULT_MAX_STEPS,
        }
    }

    /// Set the system directive prefixed to every run.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    /// The tool host, shareable with a replacement agent.
    pub fn tools(&self) -> &Arc<T> {
        &self.tools
    }
}

impl<B, T> ModelClient for Agent<B, T>
where
    B: Backend + 'static,
    T: ToolHost + 'static,
{
    fn run(&self, history: &[Turn], user_message: &str) -> RunHandle {
        let mut messages: Vec<Message> = history.iter().map(Message::from).collect();
        messages.push(Message::user(user_message));

        let backend = Arc::clone(&self.backend);
        let tools = Arc::clone(&self.tools);
        let system = self.system.clone();
        let max_steps = self.max_steps;

        RunHandle::spawn(move |events| async move {
            drive(&*backend, &*tools, system.as_deref(), max_steps, messages, events).await
        })
    }

    fn model(&self) -> &str {
        self.backend.model()
    }
}

async fn drive<B: Backend, T: ToolHost>(
    backend: &B,
    tools: &T,
    system: Option<&str>,
    max_steps: usize,
    mut messages: Vec<Message>,
    events: EventSender,
) -> Result<AgentOutput> {
    let mut usage = Usage::default();
    // A closed receiver only means nobody is watching; the run still completes.
    let forward = |fragment: &str| {
        let _ = events.send(RunEvent::TextDelta(fragment.to_string()));
    };

    for step in 1..=max_steps {
        let request = ModelRequest {
            system,
            messages: &messages,
            tools: tools.specs(),
        };
        let response = backend.call(request, &forward).await?;
        usage += response.usage;

        let calls = response.message.tool_calls();
        debug!(step, tool_calls = calls.len(), "model step complete");

        if calls.is_empty() {
            let text = response.message.text();
            return Ok(AgentOutput {
                response: (!text.is_empty()).then_some(text),
                usage,
                steps: step,
            });
        }

        messages.push(response.message);

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            let _ = events.send(RunEvent::ToolCallStarted(call.clone()));

            let result = match tools.execute(&call).await {
                Ok(output) => ToolResult::Success {
                    tool_call_id: call.id,
                    output,
                },
                Err(error) => {
                    debug!(tool = %call.name, %error, "tool call failed");
                    ToolResult::Failure {
                        tool_call_id: call.id,
                        error,
                    }
                }
            };

            let _ = events.send(RunEvent::ToolCallFinished(result.clone()));
            results.push(result);
        }
        messages.push(Message::tool_results(results));
    }

    Err(Error::StepLimit(max_steps))
}
