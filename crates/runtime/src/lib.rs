//! MCP chat runtime: model runs, tool calls and the per-turn coordinator.
//!
//! # Overview
//!
//! - **Backend**: a streaming model provider ([`ChatCompletionsBackend`]).
//! - **ToolHost**: where tool calls execute ([`McpToolHost`] for an MCP
//!   server reached over Streamable HTTP).
//! - **Agent**: the function-calling loop. Each run is spawned and exposed as
//!   a [`RunHandle`], a stream of [`RunEvent`]s plus a terminal result.
//! - **Session**: owns the conversation context. [`Session::run_turn`] relays
//!   a run's events to a [`Presenter`], correlates tool starts with their
//!   results and appends the final answer.
//!
//! # Example
//!
//! ```ignore
//! use runtime::{Agent, ChatCompletionsBackend, McpEndpoint, McpToolHost, NullPresenter, Session};
//! use storage::EventStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
//! let endpoint = McpEndpoint::parse("http://127.0.0.1:3001/mcp")?;
//! // Connect failures carry the transport's boxed error, not `runtime::Error`.
//! let tools = McpToolHost::connect(&endpoint).await?;
//! let backend = ChatCompletionsBackend::builder("gpt-4o-mini").build();
//! let agent = Agent::new(backend, tools).with_system("You are a helpful assistant.");
//!
//! let mut session = Session::new(EventStore::in_memory()?, agent)?;
//! let outcome = session.run_turn("What is 1 + 2?", &mut NullPresenter).await?;
//! println!("{}", outcome.text);
//! # Ok(())
//! # }
//! ```

pub mod agent;
mod context;
mod error;
pub mod model;
pub mod providers;
pub mod session;
pub mod tools;

pub use agent::{Agent, AgentOutput, DEFAULT_MAX_STEPS, ModelClient, RunEvent, RunHandle};
pub use context::Turn;
pub use error::{Error, Result};
pub use model::{Backend, ModelError, ToolCall, ToolResult, ToolSpec, Usage};
pub use providers::{ChatCompletionsBackend, ChatCompletionsBackendBuilder};
pub use session::{NullPresenter, Presenter, Session, ToolActivity, TurnOutcome};
pub use tools::{EmptyToolHost, McpEndpoint, McpToolHost, ToolError, ToolHost};
