//! SQLite-backed transcript storage for chat sessions.
//!
//! Every session leaves an append-only trail of events: its start and end,
//! each user and assistant turn, each tool invocation and its result, and
//! any reconfiguration that reset the conversation. The CLI reads this log
//! back for `mcp-chat sessions` and `mcp-chat logs`.
//!
//! # Example
//!
//! ```no_run
//! use storage::{Event, EventKind, EventStore, Role, SessionId};
//!
//! let store = EventStore::open("events.db")?;
//!
//! let session_id = SessionId::new();
//! store.append(&Event::new(session_id, EventKind::SessionStart { model: "gpt-4o-mini".into() }))?;
//! store.append(&Event::message(session_id, Role::User, "What is 1 + 2?"))?;
//! store.append(&Event::message(session_id, Role::Assistant, "3"))?;
//!
//! for event in store.load_session(session_id)? {
//!     println!("{}: {:?}", event.timestamp, event.kind);
//! }
//! # Ok::<(), storage::Error>(())
//! ```

mod error;
mod event;
mod store;

pub use error::{Error, Result};
pub use event::{Event, EventKind, Role, SessionId};
pub use store::{EventStore, SessionSummary};
