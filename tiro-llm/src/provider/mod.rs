//! # Chat Provider Interface
//!
//! A trait-based abstraction over the text-generation backend an agent talks to.
//!
//! ## Design
//! - `LlmProvider` is object safe, so agents hold an `Arc<dyn LlmProvider>`
//! - Implementations for Ollama's native API and OpenAI-compatible servers
//! - Streaming via `StreamReceiver`, a plain `futures` stream of chunks
//! - `hide_reasoning` asks the backend to keep "thinking" text out of replies;
//!   `ReasoningFilter` strips whatever leaks through anyway

mod framing;
pub mod ollama;
pub mod openai;
pub mod reasoning;
pub mod scripted;

pub use ollama::OllamaProvider;
pub use openai::OpenAIProvider;
pub use reasoning::{strip_reasoning, ReasoningFilter};
pub use scripted::ScriptedProvider;

use crate::error::Result;
use async_trait::async_trait;
use futures_core::Stream;
use futures_util::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

// ============================================================================
// Core Types
// ============================================================================

/// A chat message in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn is_user(&self) -> bool {
        self.role == Role::User
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// Request parameters for a completion
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub messages: Vec<ChatMessage>,
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<usize>,
    /// Keep intermediate reasoning out of the returned text
    pub hide_reasoning: bool,
    pub stream: bool,
}

impl CompletionRequest {
    pub fn new(messages: Vec<ChatMessage>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_temperature(mut self, temp: f32) -> Self {
        self.temperature = Some(temp);
        self
    }

    pub fn with_max_tokens(mut self, max: usize) -> Self {
        self.max_tokens = Some(max);
        self
    }

    pub fn with_hidden_reasoning(mut self, hide: bool) -> Self {
        self.hide_reasoning = hide;
        self
    }

    pub fn with_streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// The leading system instruction, if any
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .first()
            .filter(|m| m.role == Role::System)
            .map(|m| m.content.as_str())
    }

    /// Content of the most recent user turn
    pub fn last_user_content(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.is_user())
            .map(|m| m.content.as_str())
    }
}

/// Response from a completion request
#[derive(Debug, Clone)]
pub struct CompletionResponse {
    pub id: String,
    pub model: String,
    pub content: String,
    pub finish_reason: FinishReason,
    pub usage: Usage,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    Unknown,
}

impl FinishReason {
    pub(crate) fn from_wire(reason: Option<&str>) -> Self {
        match reason {
            Some("stop") => FinishReason::Stop,
            Some("length") => FinishReason::Length,
            Some("content_filter") => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        }
    }
}

/// Token usage information
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: usize,
    pub completion_tokens: usize,
    pub total_tokens: usize,
}

impl Usage {
    pub fn new(prompt_tokens: usize, completion_tokens: usize) -> Self {
        Self {
            prompt_tokens,
            completion_tokens,
            total_tokens: prompt_tokens + completion_tokens,
        }
    }
}

/// A streaming chunk from the model
#[derive(Debug, Clone, PartialEq)]
pub enum StreamChunk {
    /// Text content delta
    Text(String),
    /// Stream finished
    Done {
        finish_reason: FinishReason,
        usage: Option<Usage>,
    },
    /// The transport failed mid-stream
    Error(String),
}

// ============================================================================
// Provider Trait
// ============================================================================

/// A chat-completion backend
#[async_trait]
pub trait LlmProvider: Send + Sync {
    /// Provider name (e.g. "ollama", "openai")
    fn name(&self) -> &str;

    /// Model used when a request does not name one
    fn default_model(&self) -> &str;

    /// Send a completion request and wait for the full reply
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Send a completion request and receive the reply incrementally.
    ///
    /// The backend is called exactly once; the receiver is not restartable.
    async fn stream(&self, request: CompletionRequest) -> Result<StreamReceiver>;

    /// Chat with message history, returning only the reply text
    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let response = self.complete(CompletionRequest::new(messages)).await?;
        Ok(response.content)
    }
}

/// Receiver for streaming responses.
///
/// Dropping it before the end abandons the reply; the producer is not told.
pub struct StreamReceiver {
    inner: Pin<Box<dyn Stream<Item = StreamChunk> + Send>>,
}

impl StreamReceiver {
    pub fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = StreamChunk> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// Drain the stream and concatenate its text chunks
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            match chunk {
                StreamChunk::Text(t) => text.push_str(&t),
                StreamChunk::Done { .. } => break,
                StreamChunk::Error(e) => return Err(crate::error::stream_interrupted(e)),
            }
        }
        Ok(text)
    }
}

impl Stream for StreamReceiver {
    type Item = StreamChunk;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

// ============================================================================
// Provider Configuration
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderType {
    Ollama,
    OpenAI,
}

impl std::str::FromStr for ProviderType {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "ollama" => Ok(ProviderType::Ollama),
            "openai" => Ok(ProviderType::OpenAI),
            other => Err(crate::Error::config_invalid(format!(
                "unknown provider '{}', expected 'ollama' or 'openai'",
                other
            ))),
        }
    }
}

/// Configuration for creating providers
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    pub provider_type: ProviderType,
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub default_model: Option<String>,
    pub headers: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

impl ProviderConfig {
    /// Local Ollama server with the model the coach prompts were tuned on
    pub fn ollama() -> Self {
        Self {
            provider_type: ProviderType::Ollama,
            api_key: None,
            base_url: Some("http://localhost:11434".into()),
            default_model: Some("qwen3:latest".into()),
            headers: HashMap::new(),
            timeout_secs: Some(300),
        }
    }

    pub fn openai(api_key: impl Into<String>) -> Self {
        Self {
            provider_type: ProviderType::OpenAI,
            api_key: Some(api_key.into()),
            base_url: Some("https://api.openai.com/v1".into()),
            default_model: Some("gpt-4o".into()),
            headers: HashMap::new(),
            timeout_secs: Some(120),
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.default_model = Some(model.into());
        self
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn with_header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self::ollama()
    }
}

/// Build the provider a config describes
pub fn create_provider(config: ProviderConfig) -> Result<Arc<dyn LlmProvider>> {
    let provider: Arc<dyn LlmProvider> = match config.provider_type {
        ProviderType::Ollama => Arc::new(OllamaProvider::new(config)?),
        ProviderType::OpenAI => Arc::new(OpenAIProvider::new(config)?),
    };
    tracing::debug!(
        provider = provider.name(),
        model = provider.default_model(),
        "created chat provider"
    );
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_constructors() {
        let sys = ChatMessage::system("You are Tiro");
        assert_eq!(sys.role, Role::System);
        assert_eq!(sys.content, "You are Tiro");

        assert!(ChatMessage::user("Hello").is_user());
        assert!(!ChatMessage::assistant("Hi there!").is_user());
    }

    #[test]
    fn test_completion_request_builder() {
        let request = CompletionRequest::new(vec![
            ChatMessage::system("coach"),
            ChatMessage::user("first"),
            ChatMessage::assistant("reply"),
            ChatMessage::user("second"),
        ])
        .with_model("qwen3:latest")
        .with_temperature(0.8)
        .with_max_tokens(8192)
        .with_hidden_reasoning(true)
        .with_streaming(true);

        assert_eq!(request.model.as_deref(), Some("qwen3:latest"));
        assert_eq!(request.temperature, Some(0.8));
        assert_eq!(request.max_tokens, Some(8192));
        assert!(request.hide_reasoning);
        assert!(request.stream);
        assert_eq!(request.system_prompt(), Some("coach"));
        assert_eq!(request.last_user_content(), Some("second"));
    }

    #[test]
    fn test_system_prompt_absent() {
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        assert_eq!(request.system_prompt(), None);
    }

    #[test]
    fn test_provider_config() {
        let config = ProviderConfig::ollama();
        assert_eq!(config.provider_type, ProviderType::Ollama);
        assert_eq!(config.default_model.as_deref(), Some("qwen3:latest"));

        let config = ProviderConfig::openai("sk-test").with_model("gpt-4o-mini");
        assert_eq!(config.provider_type, ProviderType::OpenAI);
        assert_eq!(config.default_model.as_deref(), Some("gpt-4o-mini"));
    }

    #[test]
    fn test_provider_type_from_str() {
        assert_eq!("Ollama".parse::<ProviderType>().unwrap(), ProviderType::Ollama);
        assert_eq!("openai".parse::<ProviderType>().unwrap(), ProviderType::OpenAI);
        assert!("bard".parse::<ProviderType>().is_err());
    }

    #[tokio::test]
    async fn test_stream_receiver_collects_until_done() {
        let chunks = vec![
            StreamChunk::Text("Good ".into()),
            StreamChunk::Text("morning".into()),
            StreamChunk::Done {
                finish_reason: FinishReason::Stop,
                usage: None,
            },
            StreamChunk::Text("ignored".into()),
        ];
        let receiver = StreamReceiver::new(futures_util::stream::iter(chunks));
        assert_eq!(receiver.collect_text().await.unwrap(), "Good morning");
    }

    #[tokio::test]
    async fn test_stream_receiver_error_chunk() {
        let chunks = vec![
            StreamChunk::Text("partial".into()),
            StreamChunk::Error("connection reset".into()),
        ];
        let receiver = StreamReceiver::new(futures_util::stream::iter(chunks));
        let err = receiver.collect_text().await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::StreamInterrupted);
    }
}
