//! LLM access: the chat backend, the on-disk reply cache and the retrying caller.

mod cache;
mod caller;
mod client;
mod types;

pub use cache::ResponseCache;
pub use caller::{LlmCaller, MAX_ATTEMPTS};
pub use client::{ChatBackend, OpenAiClient};
pub use types::{ChatRequest, ChatResponse, Message, MessageRole, ResponseFormat};

#[cfg(test)]
pub(crate) use client::MockChatBackend;
