//! # tiro-llm
//!
//! Everything an agent needs below the conversation layer.
//!
//! - **Provider**: trait-based chat backends (Ollama, OpenAI-compatible) with
//!   streaming and reasoning suppression
//! - **History**: the session history store, one ordered message log per key
//! - **Prompt**: system prompt files, loaded once per agent

pub mod error;
pub mod history;
pub mod prompt;
pub mod provider;

pub use error::{Error, ErrorKind, ErrorStatus, Result};
pub use history::{HistoryStore, SessionHistory};
pub use prompt::{PromptLibrary, SystemPrompt};
pub use provider::{
    create_provider, ChatMessage, CompletionRequest, CompletionResponse, FinishReason,
    LlmProvider, OllamaProvider, OpenAIProvider, ProviderConfig, ProviderType, ReasoningFilter,
    Role, ScriptedProvider, StreamChunk, StreamReceiver, Usage,
};
