//! LLM client abstraction and HTTP implementation

pub mod client;

pub use client::{ChatCompletionClient, Completion, CompletionState, LlmClient, LlmError};
