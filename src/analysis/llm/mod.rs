//! LLM provider abstraction layer.

mod openai;
mod provider;
mod types;

pub use openai::{is_usable_api_key, OpenAIProvider};
#[cfg(test)]
pub use provider::MockLlmProvider;
pub use provider::{CompletionOptions, LlmError, LlmProvider};
pub use types::{CompletionResponse, FinishReason, Message, MessageRole};
