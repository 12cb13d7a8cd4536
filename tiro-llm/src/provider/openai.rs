//! OpenAI-compatible provider
//!
//! Works with OpenAI, vLLM, LM Studio, and Ollama's `/v1` compatibility layer.

use super::framing::FrameBuffer;
use super::*;
use crate::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

/// OpenAI-compatible provider
pub struct OpenAIProvider {
    client: Client,
    config: ProviderConfig,
}

impl OpenAIProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.unwrap_or(120)))
            .build()
            .map_err(error::client_build)?;

        Ok(Self { client, config })
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or("https://api.openai.com/v1")
    }

    fn wire_request(&self, request: &CompletionRequest, stream: bool) -> OpenAIRequest {
        OpenAIRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model().to_string()),
            messages: request.messages.iter().map(OpenAIMessage::from).collect(),
            temperature: request.temperature,
            max_tokens: request.max_tokens,
            stream,
        }
    }

    async fn post(
        &self,
        operation: &'static str,
        body: &OpenAIRequest,
    ) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .post(format!("{}/chat/completions", self.base_url()))
            .json(body);

        if let Some(api_key) = self.config.api_key.as_deref().filter(|k| !k.is_empty()) {
            req = req.bearer_auth(api_key);
        }
        for (key, value) in &self.config.headers {
            req = req.header(key, value);
        }

        let response = req.send().await.map_err(|e| error::network(operation, e))?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(error::http_status(operation, status.as_u16(), text)
                .with_context("model", body.model.clone()));
        }
        Ok(response)
    }
}

#[async_trait]
impl LlmProvider for OpenAIProvider {
    fn name(&self) -> &str {
        "openai"
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("gpt-4o")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        const OP: &str = "openai::complete";
        let body = self.wire_request(&request, false);
        let response = self.post(OP, &body).await?;

        let api_response: OpenAIResponse = response
            .json()
            .await
            .map_err(|e| error::parse(OP, e.to_string()))?;

        let choice = api_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| error::empty_response(OP))?;
        let raw = choice.message.content.ok_or_else(|| error::empty_response(OP))?;

        let content = if request.hide_reasoning {
            strip_reasoning(&raw)
        } else {
            raw
        };

        let usage = api_response
            .usage
            .map(|u| Usage::new(u.prompt_tokens, u.completion_tokens))
            .unwrap_or_default();

        Ok(CompletionResponse {
            id: api_response.id,
            model: api_response.model,
            content,
            finish_reason: FinishReason::from_wire(choice.finish_reason.as_deref()),
            usage,
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamReceiver> {
        let body = self.wire_request(&request, true);
        let response = self.post("openai::stream", &body).await?;
        let hide_reasoning = request.hide_reasoning;

        let stream = sse_chunks(response.bytes_stream(), hide_reasoning);
        Ok(StreamReceiver::new(stream))
    }
}

/// Turn a raw server-sent event byte stream into reply chunks, one JSON
/// delta per `data:` line.
fn sse_chunks<S, B, E>(bytes: S, hide_reasoning: bool) -> impl Stream<Item = StreamChunk> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut frames = FrameBuffer::events();
        let mut filter = ReasoningFilter::new();

        while let Some(next) = bytes.next().await {
            match next {
                Ok(data) => frames.push(data.as_ref()),
                Err(e) => {
                    yield StreamChunk::Error(e.to_string());
                    return;
                }
            }
            while let Some(frame) = frames.next_frame() {
                let (chunks, finished) = event_chunks(frame, &mut filter, hide_reasoning);
                for chunk in chunks {
                    yield chunk;
                }
                if finished {
                    return;
                }
            }
        }

        if let Some(frame) = frames.finish() {
            let (chunks, finished) = event_chunks(frame, &mut filter, hide_reasoning);
            for chunk in chunks {
                yield chunk;
            }
            if finished {
                return;
            }
        }
        let tail = filter.finish();
        if !tail.is_empty() {
            yield StreamChunk::Text(tail);
        }
    }
}

/// Chunks for one decoded event; `true` once the reply is over
fn event_chunks(
    frame: std::result::Result<String, String>,
    filter: &mut ReasoningFilter,
    hide_reasoning: bool,
) -> (Vec<StreamChunk>, bool) {
    let event = match frame {
        Ok(event) => event,
        Err(message) => return (vec![StreamChunk::Error(message)], true),
    };

    let mut chunks = Vec::new();
    for data in event.lines().filter_map(|l| l.strip_prefix("data:")) {
        let finish_reason = match parse_sse_data(data.trim()) {
            SseEvent::Delta { text, finish_reason } => {
                let text = if hide_reasoning { filter.push(&text) } else { text };
                if !text.is_empty() {
                    chunks.push(StreamChunk::Text(text));
                }
                match finish_reason {
                    Some(finish_reason) => finish_reason,
                    None => continue,
                }
            }
            SseEvent::Done => FinishReason::Stop,
            SseEvent::Skip => continue,
        };

        let tail = filter.finish();
        if !tail.is_empty() {
            chunks.push(StreamChunk::Text(tail));
        }
        chunks.push(StreamChunk::Done { finish_reason, usage: None });
        return (chunks, true);
    }
    (chunks, false)
}

#[derive(Debug, PartialEq)]
enum SseEvent {
    Delta {
        text: String,
        finish_reason: Option<FinishReason>,
    },
    Done,
    Skip,
}

fn parse_sse_data(data: &str) -> SseEvent {
    if data == "[DONE]" {
        return SseEvent::Done;
    }
    let Ok(chunk) = serde_json::from_str::<OpenAIStreamChunk>(data) else {
        return SseEvent::Skip;
    };
    match chunk.choices.into_iter().next() {
        Some(choice) => SseEvent::Delta {
            text: choice.delta.content.unwrap_or_default(),
            finish_reason: choice
                .finish_reason
                .map(|r| FinishReason::from_wire(Some(r.as_str()))),
        },
        None => SseEvent::Skip,
    }
}

// ============================================================================
// OpenAI API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OpenAIRequest {
    model: String,
    messages: Vec<OpenAIMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<usize>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAIMessage {
    role: String,
    #[serde(default)]
    content: Option<String>,
}

impl From<&ChatMessage> for OpenAIMessage {
    fn from(msg: &ChatMessage) -> Self {
        Self {
            role: msg.role.as_str().into(),
            content: Some(msg.content.clone()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAIResponse {
    #[serde(default)]
    id: String,
    #[serde(default)]
    model: String,
    choices: Vec<OpenAIChoice>,
    usage: Option<OpenAIUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAIChoice {
    message: OpenAIMessage,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIUsage {
    prompt_tokens: usize,
    completion_tokens: usize,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChunk {
    choices: Vec<OpenAIStreamChoice>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamChoice {
    delta: OpenAIStreamDelta,
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OpenAIStreamDelta {
    content: Option<String>,
}
