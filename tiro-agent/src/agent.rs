//! The base agent: a system prompt, fixed backend settings and a session scope
//!
//! Every specialized agent wraps an [`Agent`] and exposes it through the
//! [`Chat`] capability, which is what the orchestration code depends on.

use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tiro_llm::{
    error, ChatMessage, CompletionRequest, HistoryStore, LlmProvider, PromptLibrary, Result,
    SessionHistory, StreamChunk, SystemPrompt,
};

/// Backend settings, fixed when the agent is built
#[derive(Debug, Clone, PartialEq)]
pub struct AgentConfig {
    /// Model override; `None` uses the provider's default
    pub model: Option<String>,
    pub max_tokens: usize,
    pub temperature: f32,
    /// Ask the backend to return only the final answer, no reasoning
    pub hide_reasoning: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            model: None,
            max_tokens: 8192,
            temperature: 0.8,
            hide_reasoning: true,
        }
    }
}

/// A named system prompt bound to a chat backend and a default session.
pub struct Agent {
    name: String,
    prompt: SystemPrompt,
    session_key: String,
    config: AgentConfig,
    provider: Arc<dyn LlmProvider>,
    store: HistoryStore,
}

impl Agent {
    /// The default session key is the agent's name.
    pub fn new(
        name: impl Into<String>,
        prompt: SystemPrompt,
        provider: Arc<dyn LlmProvider>,
        store: HistoryStore,
    ) -> Self {
        let name = name.into();
        Self {
            session_key: name.clone(),
            name,
            prompt,
            config: AgentConfig::default(),
            provider,
            store,
        }
    }

    /// Build from `<library>/<name>_prompt.txt`; a missing file is fatal
    pub fn load(
        name: impl Into<String>,
        library: &PromptLibrary,
        provider: Arc<dyn LlmProvider>,
        store: HistoryStore,
    ) -> Result<Self> {
        let name = name.into();
        let prompt = library
            .load(&name)
            .map_err(|e| e.with_context("agent", name.clone()))?;
        Ok(Self::new(name, prompt, provider, store))
    }

    pub fn with_session_key(mut self, key: impl Into<String>) -> Self {
        self.session_key = key.into();
        self
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn prompt(&self) -> &SystemPrompt {
        &self.prompt
    }

    pub fn session_key(&self) -> &str {
        &self.session_key
    }

    pub fn config(&self) -> &AgentConfig {
        &self.config
    }

    pub(crate) fn set_session_key(&mut self, key: impl Into<String>) {
        self.session_key = key.into();
    }

    /// History for `session_key`, or the agent's own session
    pub fn history(&self, session_key: Option<&str>) -> SessionHistory {
        self.store
            .get_history(session_key.unwrap_or(&self.session_key))
    }

    /// One user turn in, one reply out.
    ///
    /// On success the session grows by exactly the user message and the
    /// reply. A backend failure propagates and leaves the session untouched.
    pub async fn send(&self, input: &str, session_key: Option<&str>) -> Result<String> {
        let history = self.history(session_key);
        let request = build_request(&self.prompt, &self.config, &history, &[input]);

        let response = self
            .provider
            .complete(request)
            .await
            .map_err(|e| e.with_operation("agent::send").with_context("agent", self.name.clone()))?;

        history.record_turn(&[input], &response.content);
        tracing::debug!(
            agent = %self.name,
            session = history.key(),
            chars = response.content.len(),
            "reply"
        );
        Ok(response.content)
    }

    /// Stream the reply to one or more user turns.
    ///
    /// Nothing happens until the stream is first polled; the backend is then
    /// called once. The exchange is recorded in the session only when the
    /// stream runs to its end, so a consumer that stops early leaves the
    /// session as it was.
    pub fn stream<S: Into<String>>(&self, inputs: Vec<S>, session_key: Option<&str>) -> AgentStream {
        let inputs: Vec<String> = inputs.into_iter().map(Into::into).collect();
        let history = self.history(session_key);
        let provider = Arc::clone(&self.provider);
        let prompt = self.prompt.clone();
        let config = self.config.clone();
        let name = self.name.clone();

        AgentStream::new(async_stream::try_stream! {
            let request = build_request(&prompt, &config, &history, &inputs).with_streaming(true);
            let mut receiver = provider
                .stream(request)
                .await
                .map_err(|e| e.with_operation("agent::stream").with_context("agent", name.clone()))?;

            let mut reply = String::new();
            while let Some(chunk) = receiver.next().await {
                match chunk {
                    StreamChunk::Text(text) => {
                        if text.is_empty() {
                            continue;
                        }
                        reply.push_str(&text);
                        yield text;
                    }
                    StreamChunk::Done { .. } => break,
                    StreamChunk::Error(message) => {
                        let err = error::stream_interrupted(message)
                            .with_operation("agent::stream")
                            .with_context("agent", name.clone());
                        Err::<(), _>(err)?;
                    }
                }
            }

            history.record_turn(&inputs, &reply);
            tracing::debug!(agent = %name, session = history.key(), chars = reply.len(), "streamed reply");
        })
    }

    /// Drain [`Agent::stream`] into one string
    pub async fn stream_collect<S: Into<String>>(
        &self,
        inputs: Vec<S>,
        session_key: Option<&str>,
    ) -> Result<String> {
        self.stream(inputs, session_key).collect_text().await
    }

    /// Streamed reply wrapped as a Markdown section
    pub async fn stream_to_markdown<S: Into<String>>(
        &self,
        inputs: Vec<S>,
        title: &str,
        session_key: Option<&str>,
    ) -> Result<String> {
        let text = self.stream_collect(inputs, session_key).await?;
        Ok(format!("### {}\n{}", title, text.trim()))
    }
}

impl std::fmt::Debug for Agent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Agent")
            .field("name", &self.name)
            .field("session_key", &self.session_key)
            .field("provider", &self.provider.name())
            .field("config", &self.config)
            .finish()
    }
}

/// System prompt, then the whole session, then the new user turns
fn build_request<S: AsRef<str>>(
    prompt: &SystemPrompt,
    config: &AgentConfig,
    history: &SessionHistory,
    inputs: &[S],
) -> CompletionRequest {
    let mut messages = Vec::with_capacity(history.len() + inputs.len() + 1);
    messages.push(ChatMessage::system(prompt.as_str()));
    messages.extend(history.messages());
    messages.extend(inputs.iter().map(|i| ChatMessage::user(i.as_ref())));

    let mut request = CompletionRequest::new(messages)
        .with_temperature(config.temperature)
        .with_max_tokens(config.max_tokens)
        .with_hidden_reasoning(config.hide_reasoning);
    if let Some(model) = &config.model {
        request = request.with_model(model.clone());
    }
    request
}

/// Lazy, finite, single-use stream of reply text.
///
/// Dropping it part way abandons the reply without telling the producer.
pub struct AgentStream {
    inner: Pin<Box<dyn Stream<Item = Result<String>> + Send>>,
}

impl AgentStream {
    fn new<S>(stream: S) -> Self
    where
        S: Stream<Item = Result<String>> + Send + 'static,
    {
        Self {
            inner: Box::pin(stream),
        }
    }

    /// A stream that yields `text` once without touching any backend
    pub fn ready(text: impl Into<String>) -> Self {
        Self::new(futures_util::stream::once(futures_util::future::ready(Ok(
            text.into(),
        ))))
    }

    /// Drain and concatenate in production order
    pub async fn collect_text(mut self) -> Result<String> {
        let mut text = String::new();
        while let Some(chunk) = self.next().await {
            text.push_str(&chunk?);
        }
        Ok(text)
    }
}

impl Stream for AgentStream {
    type Item = Result<String>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.as_mut().poll_next(cx)
    }
}

/// The chat capability every agent exposes on its own session.
///
/// The orchestrator is generic over this trait, so writer and reflector can
/// be any agents (or test doubles wrapping an [`Agent`]).
#[allow(async_fn_in_trait)]
pub trait Chat {
    fn agent(&self) -> &Agent;

    async fn send(&self, input: &str) -> Result<String> {
        self.agent().send(input, None).await
    }

    fn stream(&self, inputs: Vec<String>) -> AgentStream {
        self.agent().stream(inputs, None)
    }

    async fn stream_collect(&self, inputs: Vec<String>) -> Result<String> {
        self.stream(inputs).collect_text().await
    }

    fn history(&self) -> SessionHistory {
        self.agent().history(None)
    }
}

impl Chat for Agent {
    fn agent(&self) -> &Agent {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiro_llm::{ErrorKind, Role, ScriptedProvider};

    fn agent_with(provider: Arc<ScriptedProvider>, store: &HistoryStore) -> Agent {
        Agent::new("writing", SystemPrompt::new("You write essays."), provider, store.clone())
    }

    #[tokio::test]
    async fn test_send_appends_exactly_one_exchange() {
        let provider = Arc::new(ScriptedProvider::echo());
        let store = HistoryStore::new();
        let agent = agent_with(provider.clone(), &store);

        let reply = agent.send("first", None).await.unwrap();
        assert_eq!(reply, "echo: first");
        let history = agent.history(None);
        assert_eq!(history.len(), 2);

        let reply = agent.send("second", None).await.unwrap();
        assert_eq!(history.len(), 4);
        assert_eq!(history.last(), Some(ChatMessage::assistant(reply)));
    }

    #[tokio::test]
    async fn test_request_carries_prompt_history_and_settings() {
        let provider = Arc::new(ScriptedProvider::echo());
        let store = HistoryStore::new();
        let agent = agent_with(provider.clone(), &store).with_config(AgentConfig {
            model: Some("qwen3:8b".into()),
            ..AgentConfig::default()
        });

        agent.send("one", None).await.unwrap();
        agent.send("two", None).await.unwrap();

        let request = provider.last_request().unwrap();
        let roles: Vec<Role> = request.messages.iter().map(|m| m.role).collect();
        assert_eq!(
            roles,
            vec![Role::System, Role::User, Role::Assistant, Role::User]
        );
        assert_eq!(request.system_prompt(), Some("You write essays."));
        assert_eq!(request.model.as_deref(), Some("qwen3:8b"));
        assert_eq!(request.max_tokens, Some(8192));
        assert_eq!(request.temperature, Some(0.8));
        assert!(request.hide_reasoning);
    }

    #[tokio::test]
    async fn test_stream_collect_matches_send() {
        let store_a = HistoryStore::new();
        let store_b = HistoryStore::new();
        let sent = agent_with(Arc::new(ScriptedProvider::echo()), &store_a)
            .send("tell me about rivers", None)
            .await
            .unwrap();
        let streamed = agent_with(Arc::new(ScriptedProvider::echo().with_chunk_chars(2)), &store_b)
            .stream_collect(vec!["tell me about rivers"], None)
            .await
            .unwrap();

        assert_eq!(streamed, sent);
        assert_eq!(store_a.get_history("writing").messages(), store_b.get_history("writing").messages());
    }

    #[tokio::test]
    async fn test_stream_is_lazy_and_single_call() {
        let provider = Arc::new(ScriptedProvider::echo());
        let store = HistoryStore::new();
        let agent = agent_with(provider.clone(), &store);

        let stream = agent.stream(vec!["hello"], None);
        assert_eq!(provider.calls(), 0);

        let chunks: Vec<Result<String>> = stream.collect().await;
        assert!(chunks.len() > 1);
        assert_eq!(provider.calls(), 1);
        assert_eq!(agent.history(None).len(), 2);
    }

    #[tokio::test]
    async fn test_abandoned_stream_records_nothing() {
        let provider = Arc::new(ScriptedProvider::replies(["a long reply in many chunks"]));
        let store = HistoryStore::new();
        let agent = agent_with(provider.clone(), &store);

        let mut stream = agent.stream(vec!["hello"], None);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first, "a lo");
        drop(stream);

        assert_eq!(provider.calls(), 1);
        assert!(agent.history(None).is_empty());
    }

    #[tokio::test]
    async fn test_multiple_inputs_are_separate_turns() {
        let provider = Arc::new(ScriptedProvider::replies(["critique"]));
        let store = HistoryStore::new();
        let agent = agent_with(provider.clone(), &store);

        agent.stream_collect(vec!["topic", "article"], None).await.unwrap();

        let messages = agent.history(None).messages();
        assert_eq!(messages.len(), 3);
        assert_eq!(messages[0], ChatMessage::user("topic"));
        assert_eq!(messages[1], ChatMessage::user("article"));
    }

    #[tokio::test]
    async fn test_backend_failure_propagates_and_keeps_history() {
        let provider = Arc::new(ScriptedProvider::new(|_| {
            Err(tiro_llm::Error::new(ErrorKind::NetworkFailed, "connection refused"))
        }));
        let store = HistoryStore::new();
        let agent = agent_with(provider, &store);

        let err = agent.send("hi", None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkFailed);
        assert_eq!(err.operation(), "agent::send");

        let err = agent.stream_collect(vec!["hi"], None).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NetworkFailed);
        assert!(agent.history(None).is_empty());
    }

    #[tokio::test]
    async fn test_explicit_session_key_is_isolated() {
        let provider = Arc::new(ScriptedProvider::echo());
        let store = HistoryStore::new();
        let agent = agent_with(provider, &store);

        agent.send("default", None).await.unwrap();
        agent.send("other", Some("learner-42")).await.unwrap();

        assert_eq!(agent.history(None).user_messages(), vec!["default"]);
        assert_eq!(store.get_history("learner-42").user_messages(), vec!["other"]);
    }

    #[tokio::test]
    async fn test_stream_to_markdown() {
        let provider = Arc::new(ScriptedProvider::replies(["  body text \n"]));
        let store = HistoryStore::new();
        let agent = agent_with(provider, &store);

        let md = agent.stream_to_markdown(vec!["x"], "Draft", None).await.unwrap();
        assert_eq!(md, "### Draft\nbody text");
    }

    #[test]
    fn test_load_missing_prompt_fails() {
        let dir = tempfile::tempdir().unwrap();
        let err = Agent::load(
            "writing",
            &PromptLibrary::new(dir.path()),
            Arc::new(ScriptedProvider::echo()),
            HistoryStore::new(),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PromptNotFound);
        assert_eq!(err.context_value("agent"), Some("writing"));
    }
}
