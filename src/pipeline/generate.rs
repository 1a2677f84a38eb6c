use std::pin::Pin;
use std::sync::Arc;

use futures_util::stream::{self, Stream, StreamExt};
use tracing::Instrument;

use crate::llm::{BackendStream, CompletionRequest, GenerationBackend};
use crate::models::ChatMessage;

/// Fixed instruction sent ahead of every summary request.
pub const SUMMARY_SYSTEM_PROMPT: &str = "You are a research assistant that summarizes scholarly documents.\n\
     Write a neutral, objective summary that addresses the user's query.\n\
     Use ONLY the information in the provided documents. Never add facts, opinions or references from outside knowledge.\n\
     If the documents do not address the query, say so plainly.";

/// Sent instead of contacting the backend when there is nothing to summarize.
pub const EMPTY_CONTEXT_NOTICE: &str =
    "The retrieved documents contain no text to summarize for this query.";

/// One unit of streamed output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationChunk {
    /// Text produced by the backend, or a fixed notice.
    Text(String),
    /// Terminal, human-readable description of a failure.
    Diagnostic(String),
}

impl GenerationChunk {
    pub fn as_str(&self) -> &str {
        match self {
            Self::Text(s) | Self::Diagnostic(s) => s,
        }
    }

    pub fn into_text(self) -> String {
        match self {
            Self::Text(s) | Self::Diagnostic(s) => s,
        }
    }

    pub fn is_diagnostic(&self) -> bool {
        matches!(self, Self::Diagnostic(_))
    }
}

/// Lazy, finite, single-use chunk sequence. Dropping it cancels generation.
pub type ChunkStream = Pin<Box<dyn Stream<Item = GenerationChunk> + Send>>;

/// A stream consisting of exactly one chunk.
pub fn single_chunk(chunk: GenerationChunk) -> ChunkStream {
    Box::pin(stream::iter(std::iter::once(chunk)))
}

/// System turn plus a user turn carrying the query and then the context.
pub fn build_messages(query: &str, context_text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(SUMMARY_SYSTEM_PROMPT),
        ChatMessage::user(format!("Query: {query}\n\nDocuments:\n{context_text}")),
    ]
}

/// Relays a generation backend's output to the caller.
#[derive(Clone)]
pub struct GenerationStreamer {
    backend: Arc<dyn GenerationBackend>,
    max_output_tokens: u32,
}

enum Relay {
    Pending(Arc<dyn GenerationBackend>, CompletionRequest),
    Streaming(BackendStream),
    Finished,
}

impl GenerationStreamer {
    pub fn new(backend: Arc<dyn GenerationBackend>, max_output_tokens: u32) -> Self {
        Self {
            backend,
            max_output_tokens,
        }
    }

    /// Stream a summary of `context_text` for `query` from model `model_ref`.
    ///
    /// The backend is contacted on the first poll. Chunks are forwarded as they
    /// arrive. Any backend failure ends the stream with one
    /// [`GenerationChunk::Diagnostic`]; nothing is raised to the consumer.
    /// Failures are logged inside the span that was current at this call.
    pub fn stream_generate(&self, query: &str, context_text: &str, model_ref: &str) -> ChunkStream {
        if context_text.trim().is_empty() {
            return single_chunk(GenerationChunk::Text(EMPTY_CONTEXT_NOTICE.to_string()));
        }

        let request = CompletionRequest {
            model: model_ref.to_string(),
            messages: build_messages(query, context_text),
            max_output_tokens: self.max_output_tokens,
        };

        // The body is polled after the handler returns; keep its request span
        let span = tracing::Span::current();
        let initial = Relay::Pending(self.backend.clone(), request);
        Box::pin(stream::unfold(initial, move |state| {
            relay(state).instrument(span.clone())
        }))
    }
}

async fn relay(state: Relay) -> Option<(GenerationChunk, Relay)> {
    match state {
        Relay::Pending(backend, request) => match backend.stream_complete(request).await {
            Ok(upstream) => forward(upstream, false).await,
            Err(e) => {
                tracing::warn!("Generation backend request failed: {e:#}");
                Some((diagnostic(&e, false), Relay::Finished))
            }
        },
        Relay::Streaming(upstream) => forward(upstream, true).await,
        Relay::Finished => None,
    }
}

async fn forward(
    mut upstream: BackendStream,
    started: bool,
) -> Option<(GenerationChunk, Relay)> {
    match upstream.next().await {
        Some(Ok(text)) => Some((GenerationChunk::Text(text), Relay::Streaming(upstream))),
        Some(Err(e)) => {
            tracing::warn!("Generation stream failed: {e:#}");
            drop(upstream);
            Some((diagnostic(&e, started), Relay::Finished))
        }
        None => None,
    }
}

fn diagnostic(err: &anyhow::Error, started: bool) -> GenerationChunk {
    if started {
        GenerationChunk::Diagnostic(format!("\n\n[Summary generation interrupted: {err}]"))
    } else {
        GenerationChunk::Diagnostic(format!("[Summary generation failed: {err}]"))
    }
}
