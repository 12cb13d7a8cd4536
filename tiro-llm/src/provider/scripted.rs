//! Deterministic in-process provider for tests and offline demos
//!
//! A responder closure turns each request into reply text. Every request is
//! recorded, so tests can count backend calls and inspect their order.
//! Streaming splits the same reply into fixed-size chunks, so the streaming
//! and single-shot paths always agree.

use super::*;
use crate::Error;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

type Responder = Box<dyn Fn(&CompletionRequest) -> Result<String> + Send + Sync>;

pub struct ScriptedProvider {
    responder: Responder,
    requests: Mutex<Vec<CompletionRequest>>,
    chunk_chars: usize,
}

impl ScriptedProvider {
    /// Answer every request with whatever `responder` returns
    pub fn new<F>(responder: F) -> Self
    where
        F: Fn(&CompletionRequest) -> Result<String> + Send + Sync + 'static,
    {
        Self {
            responder: Box::new(responder),
            requests: Mutex::new(Vec::new()),
            chunk_chars: 4,
        }
    }

    /// Infallible responder
    pub fn from_fn<F>(reply: F) -> Self
    where
        F: Fn(&CompletionRequest) -> String + Send + Sync + 'static,
    {
        Self::new(move |request| Ok(reply(request)))
    }

    /// Reply with the latest user turn prefixed by `echo: `
    pub fn echo() -> Self {
        Self::from_fn(|request| format!("echo: {}", request.last_user_content().unwrap_or_default()))
    }

    /// Hand out canned replies in order; running out is an error
    pub fn replies<I, S>(replies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let queue: Mutex<VecDeque<String>> =
            Mutex::new(replies.into_iter().map(Into::into).collect());
        Self::new(move |_| {
            queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front()
                .ok_or_else(|| Error::unexpected("scripted replies exhausted"))
        })
    }

    /// Size of streamed chunks, in characters (at least one)
    pub fn with_chunk_chars(mut self, chunk_chars: usize) -> Self {
        self.chunk_chars = chunk_chars.max(1);
        self
    }

    /// Number of backend calls made so far, streaming or not
    pub fn calls(&self) -> usize {
        self.lock_requests().len()
    }

    /// Every request received, oldest first
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.lock_requests().clone()
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.lock_requests().last().cloned()
    }

    fn lock_requests(&self) -> std::sync::MutexGuard<'_, Vec<CompletionRequest>> {
        self.requests.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn respond(&self, request: CompletionRequest) -> Result<String> {
        let reply = (self.responder)(&request);
        self.lock_requests().push(request);
        reply
    }
}

#[async_trait]
impl LlmProvider for ScriptedProvider {
    fn name(&self) -> &str {
        "scripted"
    }

    fn default_model(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = request.model.clone().unwrap_or_else(|| "scripted".into());
        let content = self.respond(request)?;
        Ok(CompletionResponse {
            id: format!("scripted-{}", self.calls()),
            model,
            content,
            finish_reason: FinishReason::Stop,
            usage: Usage::default(),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamReceiver> {
        let reply = self.respond(request)?;
        let chars: Vec<char> = reply.chars().collect();
        let mut chunks: Vec<StreamChunk> = chars
            .chunks(self.chunk_chars)
            .map(|c| StreamChunk::Text(c.iter().collect()))
            .collect();
        chunks.push(StreamChunk::Done {
            finish_reason: FinishReason::Stop,
            usage: None,
        });
        Ok(StreamReceiver::new(futures_util::stream::iter(chunks)))
    }
}
