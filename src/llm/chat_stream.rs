use anyhow::{Context, Result};
use async_trait::async_trait;
use futures_util::stream::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use std::time::Duration;

use crate::config::LlmConfig;
use crate::models::ChatMessage;

/// Content deltas from a generation backend.
pub type BackendStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One streamed completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub max_output_tokens: u32,
}

/// A chat-completion service that streams its output.
///
/// The returned stream ends (`None`) only after the backend's explicit end
/// marker. A connection that drops before the marker yields an `Err` item.
/// Dropping the stream releases the upstream connection.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Check that the backend is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    async fn stream_complete(&self, request: CompletionRequest) -> Result<BackendStream>;
}

/// Streams chat completions from Ollama or an OpenAI-compatible API.
pub struct HttpGenerationBackend {
    client: reqwest::Client,
    config: LlmConfig,
}

impl HttpGenerationBackend {
    pub fn new(client: reqwest::Client, config: LlmConfig) -> Self {
        Self { client, config }
    }

    /// Reject providers this client cannot talk to.
    pub fn check_config(&self) -> Result<()> {
        match self.config.provider.as_str() {
            "ollama" | "openai" => Ok(()),
            other => anyhow::bail!("Unsupported LLM provider for chat: {other}"),
        }
    }
}

#[async_trait]
impl GenerationBackend for HttpGenerationBackend {
    /// Lists models: `GET /api/tags` on Ollama, `GET /v1/models` otherwise.
    async fn ping(&self) -> Result<()> {
        self.check_config()?;
        let base = self.config.base_url.trim_end_matches('/');
        let req = match self.config.provider.as_str() {
            "ollama" => self.client.get(format!("{base}/api/tags")),
            _ => self.client.get(format!("{base}/v1/models")).header(
                "Authorization",
                format!("Bearer {}", self.config.api_key.as_deref().unwrap_or("")),
            ),
        };

        let resp = req
            .timeout(Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .with_context(|| format!("Failed to reach LLM at {base}"))?;
        if !resp.status().is_success() {
            anyhow::bail!("LLM model listing returned {}", resp.status());
        }
        Ok(())
    }

    async fn stream_complete(&self, request: CompletionRequest) -> Result<BackendStream> {
        match self.config.provider.as_str() {
            "ollama" => stream_ollama(&self.client, &self.config, request).await,
            "openai" => stream_openai(&self.client, &self.config, request).await,
            other => anyhow::bail!("Unsupported LLM provider for chat: {other}"),
        }
    }
}

/// What one line of a streaming response means.
#[derive(Debug, PartialEq)]
enum StreamEvent {
    Delta(String),
    Skip,
    Done,
}

#[derive(Serialize, Deserialize)]
struct StreamMessage {
    role: String,
    content: String,
}

fn to_stream_messages(messages: Vec<ChatMessage>) -> Vec<StreamMessage> {
    messages
        .into_iter()
        .map(|m| StreamMessage {
            role: m.role,
            content: m.content,
        })
        .collect()
}

// ─── Ollama streaming ────────────────────────────────────

#[derive(Serialize)]
struct OllamaStreamRequest {
    model: String,
    messages: Vec<StreamMessage>,
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    num_predict: u32,
}

#[derive(Deserialize)]
struct OllamaStreamChunk {
    message: Option<StreamMessage>,
    #[serde(default)]
    done: bool,
    error: Option<String>,
}

async fn stream_ollama(
    client: &reqwest::Client,
    config: &LlmConfig,
    request: CompletionRequest,
) -> Result<BackendStream> {
    let url = format!("{}/api/chat", config.base_url.trim_end_matches('/'));

    let req = OllamaStreamRequest {
        model: request.model,
        messages: to_stream_messages(request.messages),
        stream: true,
        options: OllamaOptions {
            num_predict: request.max_output_tokens,
        },
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(config.timeout_secs))
        .json(&req)
        .send()
        .await
        .context("Failed to connect to Ollama for chat streaming")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("Ollama chat API returned {status}: {body}");
    }

    Ok(Box::pin(deltas_until_done(
        stream_lines(resp.bytes_stream()),
        parse_ollama_line,
    )))
}

fn parse_ollama_line(line: &str) -> Result<StreamEvent> {
    let line = line.trim();
    if line.is_empty() {
        return Ok(StreamEvent::Skip);
    }

    let chunk = serde_json::from_str::<OllamaStreamChunk>(line)
        .map_err(|e| anyhow::anyhow!("Failed to parse Ollama chunk: {e}"))?;

    if let Some(error) = chunk.error {
        anyhow::bail!("Ollama error: {error}");
    }
    if chunk.done {
        return Ok(StreamEvent::Done);
    }
    match chunk.message {
        Some(m) if !m.content.is_empty() => Ok(StreamEvent::Delta(m.content)),
        _ => Ok(StreamEvent::Skip),
    }
}

// ─── OpenAI streaming ────────────────────────────────────

#[derive(Serialize)]
struct OpenAiStreamRequest {
    model: String,
    messages: Vec<StreamMessage>,
    stream: bool,
    max_tokens: u32,
}

#[derive(Deserialize)]
struct OpenAiStreamChunk {
    #[serde(default)]
    choices: Vec<OpenAiStreamChoice>,
}

#[derive(Deserialize)]
struct OpenAiStreamChoice {
    delta: OpenAiStreamDelta,
}

#[derive(Deserialize)]
struct OpenAiStreamDelta {
    content: Option<String>,
}

async fn stream_openai(
    client: &reqwest::Client,
    config: &LlmConfig,
    request: CompletionRequest,
) -> Result<BackendStream> {
    let url = format!(
        "{}/v1/chat/completions",
        config.base_url.trim_end_matches('/')
    );

    let req = OpenAiStreamRequest {
        model: request.model,
        messages: to_stream_messages(request.messages),
        stream: true,
        max_tokens: request.max_output_tokens,
    };

    let resp = client
        .post(&url)
        .timeout(Duration::from_secs(config.timeout_secs))
        .header(
            "Authorization",
            format!("Bearer {}", config.api_key.as_deref().unwrap_or("")),
        )
        .json(&req)
        .send()
        .await
        .context("Failed to connect to OpenAI for chat streaming")?;

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().await.unwrap_or_default();
        anyhow::bail!("OpenAI chat API returned {status}: {body}");
    }

    Ok(Box::pin(deltas_until_done(
        stream_lines(resp.bytes_stream()),
        parse_openai_line,
    )))
}

/// Parse a single OpenAI SSE line. Non-data lines, role-only chunks and
/// empty deltas are skipped; `data: [DONE]` ends the stream.
fn parse_openai_line(line: &str) -> Result<StreamEvent> {
    let line = line.trim();
    let Some(data) = line.strip_prefix("data:") else {
        return Ok(StreamEvent::Skip);
    };
    let data = data.trim();

    if data == "[DONE]" {
        return Ok(StreamEvent::Done);
    }

    let chunk = serde_json::from_str::<OpenAiStreamChunk>(data)
        .map_err(|e| anyhow::anyhow!("Failed to parse OpenAI chunk: {e}"))?;

    let content = chunk
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.delta.content)
        .unwrap_or_default();
    if content.is_empty() {
        return Ok(StreamEvent::Skip);
    }
    Ok(StreamEvent::Delta(content))
}

// ─── Line buffering ──────────────────────────────────────

/// Turn parsed lines into content deltas, ending at the backend's done
/// marker. Stops after the first error.
fn deltas_until_done(
    lines: impl Stream<Item = Result<String>> + Send + 'static,
    parse: fn(&str) -> Result<StreamEvent>,
) -> impl Stream<Item = Result<String>> + Send {
    futures_util::stream::unfold(Some(Box::pin(lines)), move |state| async move {
        let mut lines = state?;
        loop {
            match lines.next().await {
                Some(Ok(line)) => match parse(&line) {
                    Ok(StreamEvent::Delta(text)) => return Some((Ok(text), Some(lines))),
                    Ok(StreamEvent::Skip) => continue,
                    Ok(StreamEvent::Done) => return None,
                    Err(e) => return Some((Err(e), None)),
                },
                Some(Err(e)) => return Some((Err(e), None)),
                None => {
                    return Some((
                        Err(anyhow::anyhow!(
                            "Stream closed before the completion marker"
                        )),
                        None,
                    ))
                }
            }
        }
    })
}

/// Convert a byte stream into a stream of complete lines.
fn stream_lines<E>(
    byte_stream: impl Stream<Item = std::result::Result<bytes::Bytes, E>> + Send + 'static,
) -> impl Stream<Item = Result<String>> + Send
where
    E: std::fmt::Display + Send + 'static,
{
    futures_util::stream::unfold(
        (Box::pin(byte_stream), Vec::<u8>::new()),
        |(mut stream, mut buffer)| async move {
            loop {
                // Split on raw bytes so multi-byte characters survive chunk boundaries
                if let Some(newline_pos) = buffer.iter().position(|b| *b == b'\n') {
                    let rest = buffer.split_off(newline_pos + 1);
                    let line = String::from_utf8_lossy(&buffer[..newline_pos]).into_owned();
                    buffer = rest;
                    if !line.trim().is_empty() {
                        return Some((Ok(line), (stream, buffer)));
                    }
                    continue;
                }

                match stream.next().await {
                    Some(Ok(bytes)) => buffer.extend_from_slice(&bytes),
                    Some(Err(e)) => {
                        return Some((
                            Err(anyhow::anyhow!("Stream read error: {e}")),
                            (stream, buffer),
                        ));
                    }
                    None => {
                        // Flush a trailing line with no newline
                        let remaining = String::from_utf8_lossy(&buffer).into_owned();
                        buffer.clear();
                        if !remaining.trim().is_empty() {
                            return Some((Ok(remaining), (stream, buffer)));
                        }
                        return None;
                    }
                }
            }
        },
    )
}
