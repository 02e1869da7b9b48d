//! grna-llm: completion backends used by the `ask` command.

pub mod backend;

pub use backend::{
    AnthropicBackend, LlmBackend, LlmError, LlmRequest, LlmResponse, Message, OllamaBackend,
};
