//! Ollama provider, native `/api/chat` endpoint
//!
//! Streaming replies arrive as newline-delimited JSON objects. With
//! `hide_reasoning` the request sets `think: false`, and any `<think>` block a
//! model emits regardless is filtered out.

use super::framing::FrameBuffer;
use super::*;
use crate::error;
use reqwest::Client;
use serde::{Deserialize, Serialize};

pub struct OllamaProvider {
    client: Client,
    config: ProviderConfig,
}

impl OllamaProvider {
    pub fn new(config: ProviderConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs.unwrap_or(300)))
            .build()
            .map_err(error::client_build)?;

        Ok(Self { client, config })
    }

    /// Local server at the default port
    pub fn local() -> Result<Self> {
        Self::new(ProviderConfig::ollama())
    }

    fn base_url(&self) -> &str {
        self.config
            .base_url
            .as_deref()
            .unwrap_or("http://localhost:11434")
            .trim_end_matches('/')
    }

    fn wire_request(&self, request: &CompletionRequest, stream: bool) -> OllamaRequest {
        OllamaRequest {
            model: request
                .model
                .clone()
                .unwrap_or_else(|| self.default_model().to_string()),
            messages: request
                .messages
                .iter()
                .map(|m| OllamaMessage {
                    role: m.role.as_str().to_string(),
                    content: m.content.clone(),
                })
                .collect(),
            stream,
            think: request.hide_reasoning.then_some(false),
            options: OllamaOptions {
                temperature: request.temperature,
                num_predict: request.max_tokens,
            },
        }
    }

    async fn post(&self, operation: &'static str, body: &OllamaRequest) -> Result<reqwest::Response> {
        let mut req = self
            .client
            .post(format!("{}/api/chat", self.base_url()))
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
impl LlmProvider for OllamaProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    fn default_model(&self) -> &str {
        self.config.default_model.as_deref().unwrap_or("qwen3:latest")
    }

    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        const OP: &str = "ollama::complete";
        let body = self.wire_request(&request, false);
        let response = self.post(OP, &body).await?;

        let reply: OllamaChatResponse = response
            .json()
            .await
            .map_err(|e| error::parse(OP, e.to_string()))?;

        let message = reply.message.ok_or_else(|| error::empty_response(OP))?;
        let content = if request.hide_reasoning {
            strip_reasoning(&message.content)
        } else {
            message.content
        };

        Ok(CompletionResponse {
            id: reply.created_at.unwrap_or_default(),
            model: reply.model,
            content,
            finish_reason: FinishReason::from_wire(reply.done_reason.as_deref()),
            usage: Usage::new(
                reply.prompt_eval_count.unwrap_or(0),
                reply.eval_count.unwrap_or(0),
            ),
        })
    }

    async fn stream(&self, request: CompletionRequest) -> Result<StreamReceiver> {
        let body = self.wire_request(&request, true);
        let response = self.post("ollama::stream", &body).await?;
        let hide_reasoning = request.hide_reasoning;

        let stream = ndjson_chunks(response.bytes_stream(), hide_reasoning);
        Ok(StreamReceiver::new(stream))
    }
}

/// Turn a raw NDJSON byte stream into reply chunks.
fn ndjson_chunks<S, B, E>(bytes: S, hide_reasoning: bool) -> impl Stream<Item = StreamChunk> + Send + 'static
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    async_stream::stream! {
        let mut bytes = Box::pin(bytes);
        let mut frames = FrameBuffer::lines();
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
                let (chunks, finished) = frame_chunks(frame, &mut filter, hide_reasoning);
                for chunk in chunks {
                    yield chunk;
                }
                if finished {
                    return;
                }
            }
        }

        if let Some(frame) = frames.finish() {
            let (chunks, finished) = frame_chunks(frame, &mut filter, hide_reasoning);
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

/// Chunks for one decoded line; `true` once the reply is over
fn frame_chunks(
    frame: std::result::Result<String, String>,
    filter: &mut ReasoningFilter,
    hide_reasoning: bool,
) -> (Vec<StreamChunk>, bool) {
    let line = match frame {
        Ok(line) => line,
        Err(message) => return (vec![StreamChunk::Error(message)], true),
    };
    let line = line.trim();
    if line.is_empty() {
        return (Vec::new(), false);
    }
    let reply = match parse_ndjson_line(line) {
        Ok(reply) => reply,
        Err(message) => return (vec![StreamChunk::Error(message)], true),
    };

    let mut chunks = Vec::new();
    if let Some(message) = reply.message {
        let text = if hide_reasoning { filter.push(&message.content) } else { message.content };
        if !text.is_empty() {
            chunks.push(StreamChunk::Text(text));
        }
    }
    if !reply.done {
        return (chunks, false);
    }

    let tail = filter.finish();
    if !tail.is_empty() {
        chunks.push(StreamChunk::Text(tail));
    }
    chunks.push(StreamChunk::Done {
        finish_reason: FinishReason::from_wire(reply.done_reason.as_deref()),
        usage: Some(Usage::new(
            reply.prompt_eval_count.unwrap_or(0),
            reply.eval_count.unwrap_or(0),
        )),
    });
    (chunks, true)
}

/// Decode one NDJSON line; an `error` field mid-stream is a failure.
fn parse_ndjson_line(line: &str) -> std::result::Result<OllamaChatResponse, String> {
    let reply: OllamaChatResponse =
        serde_json::from_str(line).map_err(|e| format!("undecodable stream line: {}", e))?;
    match reply.error {
        Some(message) => Err(message),
        None => Ok(reply),
    }
}

// ============================================================================
// Ollama API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct OllamaRequest {
    model: String,
    messages: Vec<OllamaMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    think: Option<bool>,
    options: OllamaOptions,
}

#[derive(Debug, Serialize)]
struct OllamaOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<usize>,
}

#[derive(Debug, Serialize, Deserialize)]
struct OllamaMessage {
    role: String,
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct OllamaChatResponse {
    #[serde(default)]
    model: String,
    created_at: Option<String>,
    message: Option<OllamaMessage>,
    #[serde(default)]
    done: bool,
    done_reason: Option<String>,
    prompt_eval_count: Option<usize>,
    eval_count: Option<usize>,
    error: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wire_request_options() {
        let provider = OllamaProvider::local().unwrap();
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")])
            .with_temperature(0.8)
            .with_max_tokens(8192)
            .with_hidden_reasoning(true);

        let body = serde_json::to_value(provider.wire_request(&request, false)).unwrap();
        assert_eq!(body["model"], "qwen3:latest");
        assert_eq!(body["think"], false);
        assert_eq!(body["options"]["num_predict"], 8192);
        assert_eq!(body["messages"][0]["role"], "user");
        assert_eq!(body["stream"], false);
    }

    #[test]
    fn test_think_omitted_when_reasoning_allowed() {
        let provider = OllamaProvider::local().unwrap();
        let request = CompletionRequest::new(vec![ChatMessage::user("hi")]);
        let body = serde_json::to_value(provider.wire_request(&request, true)).unwrap();
        assert!(body.get("think").is_none());
        assert!(body["options"].get("temperature").is_none());
    }

    #[test]
    fn test_parse_ndjson_lines() {
        let partial = r#"{"model":"qwen3","message":{"role":"assistant","content":"Hel"},"done":false}"#;
        let reply = parse_ndjson_line(partial).unwrap();
        assert_eq!(reply.message.unwrap().content, "Hel");
        assert!(!reply.done);

        let last = r#"{"model":"qwen3","message":{"role":"assistant","content":""},"done":true,"done_reason":"stop","prompt_eval_count":20,"eval_count":7}"#;
        let reply = parse_ndjson_line(last).unwrap();
        assert!(reply.done);
        assert_eq!(reply.eval_count, Some(7));

        let failed = r#"{"error":"model 'qwen9' not found"}"#;
        assert_eq!(parse_ndjson_line(failed).unwrap_err(), "model 'qwen9' not found");
        assert!(parse_ndjson_line("{oops").is_err());
    }

    use futures_util::StreamExt;

    fn byte_chunks(parts: Vec<Vec<u8>>) -> StreamReceiver {
        let bytes = futures_util::stream::iter(parts.into_iter().map(Ok::<_, std::io::Error>));
        StreamReceiver::new(ndjson_chunks(bytes, true))
    }

    #[tokio::test]
    async fn test_stream_character_split_between_chunks() {
        let body = concat!(
            r#"{"message":{"role":"assistant","content":"你好"},"done":false}"#,
            "\n",
            r#"{"message":{"role":"assistant","content":"，世界"},"done":true,"done_reason":"stop"}"#,
            "\n",
        )
        .as_bytes()
        .to_vec();
        // split one byte into 你
        let cut = body.iter().position(|b| *b >= 0x80).unwrap() + 1;
        let parts = vec![body[..cut].to_vec(), body[cut..].to_vec()];

        assert_eq!(byte_chunks(parts).collect_text().await.unwrap(), "你好，世界");
    }

    #[tokio::test]
    async fn test_stream_final_line_without_newline() {
        let parts = vec![
            br#"{"message":{"role":"assistant","content":"Hi"},"done":false}"#.to_vec(),
            b"\r\n".to_vec(),
            br#"{"message":{"role":"assistant","content":" there"},"done":true}"#.to_vec(),
        ];
        let chunks: Vec<StreamChunk> = byte_chunks(parts).collect().await;
        assert_eq!(chunks[0], StreamChunk::Text("Hi".into()));
        assert_eq!(chunks[1], StreamChunk::Text(" there".into()));
        assert!(matches!(chunks.last(), Some(StreamChunk::Done { .. })));
    }

    #[tokio::test]
    async fn test_stream_error_line() {
        let parts = vec![b"{\"error\":\"model not found\"}\n".to_vec()];
        let err = byte_chunks(parts).collect_text().await.unwrap_err();
        assert!(err.to_string().contains("model not found"));
    }
}
