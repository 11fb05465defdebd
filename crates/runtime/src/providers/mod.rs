//! LLM provider adapters.
//!
//! Each provider implements [`Backend`](crate::model::Backend) for its API.

mod chat_completions;
mod sse;

pub use chat_completions::{
    ChatCompletionsBackend, ChatCompletionsBackendBuilder, DEFAULT_BASE_URL,
};
