//! Model runs: the agent loop and the event stream it produces.

mod handle;
mod runner;

pub use handle::{AgentOutput, EventSender, ModelClient, RunEvent, RunHandle};
pub use runner::{Agent, DEFAULT_MAX_STEPS};
