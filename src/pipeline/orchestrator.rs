use std::sync::Arc;

use axum::http::StatusCode;
use serde_json::Value;

use crate::config::Config;
use crate::error::{PipelineError, Result};
use crate::index::SearchIndex;
use crate::llm::{GenerationBackend, RelevanceModel};
use crate::models::{validate_query, DocumentsPayload, SearchResponse};
use crate::pipeline::context::{assemble, ContextSource};
use crate::pipeline::generate::{single_chunk, ChunkStream, GenerationChunk, GenerationStreamer};
use crate::pipeline::reranker::Reranker;
use crate::pipeline::retriever::Retriever;

/// Whole stream when the index returned nothing for the query.
pub const NO_MATCHES_NOTICE: &str = "No documents matched the query.";

/// Whole stream when hits were retrieved but none could be ranked.
pub const NO_RELEVANT_DOCUMENTS_NOTICE: &str = "No relevant documents were found for the query.";

/// Per-process settings applied to every request.
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    pub index_name: String,
    pub search_fields: Vec<String>,
    pub retrieval_size: usize,
    pub rerank_top_k: usize,
    pub token_budget: usize,
    pub generation_model: String,
    pub max_output_tokens: u32,
}

impl PipelineSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            index_name: config.index.index_name.clone(),
            search_fields: config.index.search_fields.clone(),
            retrieval_size: config.pipeline.retrieval_size,
            rerank_top_k: config.pipeline.rerank_top_k,
            token_budget: config.pipeline.token_budget,
            generation_model: config.llm.chat_model.clone(),
            max_output_tokens: config.llm.max_output_tokens,
        }
    }
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Per-request overrides for the search flow.
#[derive(Debug, Clone, Copy, Default)]
pub struct SearchOptions {
    pub size: Option<usize>,
    pub top_k: Option<usize>,
}

/// Outcome of a generate-family flow: always a stream, plus the status the
/// transport should report.
pub struct GenerationResponse {
    pub status: StatusCode,
    pub chunks: ChunkStream,
}

impl GenerationResponse {
    fn streaming(chunks: ChunkStream) -> Self {
        Self {
            status: StatusCode::OK,
            chunks,
        }
    }

    fn notice(text: &str) -> Self {
        Self::streaming(single_chunk(GenerationChunk::Text(text.to_string())))
    }

    /// A single diagnostic chunk carrying `err`, with its status.
    pub fn failed(err: &PipelineError) -> Self {
        Self {
            status: err.status_code(),
            chunks: single_chunk(GenerationChunk::Diagnostic(err.to_string())),
        }
    }
}

/// Composes retrieval, reranking, context assembly and streamed generation.
///
/// Holds no mutable state; one instance serves all requests.
#[derive(Clone)]
pub struct Pipeline {
    retriever: Retriever,
    reranker: Reranker,
    streamer: GenerationStreamer,
    settings: PipelineSettings,
}

impl Pipeline {
    pub fn new(
        index: Arc<dyn SearchIndex>,
        model: Arc<dyn RelevanceModel>,
        backend: Arc<dyn GenerationBackend>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            retriever: Retriever::new(index),
            reranker: Reranker::new(model),
            streamer: GenerationStreamer::new(backend, settings.max_output_tokens),
            settings,
        }
    }

    /// Retrieve and rerank. Zero hits short-circuits without reranking.
    pub async fn search(&self, query: &str, options: SearchOptions) -> Result<SearchResponse> {
        let query = validate_query(query)?;
        let size = options.size.unwrap_or(self.settings.retrieval_size);
        let top_k = options.top_k.unwrap_or(self.settings.rerank_top_k);

        let hits = self
            .retriever
            .retrieve(&query, &self.settings.index_name, &self.settings.search_fields, size)
            .await?;

        if hits.is_empty() {
            tracing::info!("Search '{query}': no hits");
            return Ok(SearchResponse {
                query,
                initial_hits_count: 0,
                reranked_hits: Vec::new(),
            });
        }

        let initial_hits_count = hits.len();
        let reranked_hits = self.reranker.rerank(&query, hits, top_k).await?;
        tracing::info!(
            "Search '{query}': {initial_hits_count} hits, {} after reranking",
            reranked_hits.len()
        );

        Ok(SearchResponse {
            query,
            initial_hits_count,
            reranked_hits,
        })
    }

    /// Retrieve, rerank, then stream a summary of the top documents.
    pub async fn search_and_generate(&self, query: &str) -> GenerationResponse {
        let query = match validate_query(query) {
            Ok(q) => q,
            Err(e) => return GenerationResponse::failed(&e),
        };

        let hits = match self
            .retriever
            .retrieve(
                &query,
                &self.settings.index_name,
                &self.settings.search_fields,
                self.settings.retrieval_size,
            )
            .await
        {
            Ok(hits) => hits,
            Err(e) => return GenerationResponse::failed(&e),
        };
        if hits.is_empty() {
            tracing::info!("Summarize '{query}': no hits");
            return GenerationResponse::notice(NO_MATCHES_NOTICE);
        }

        let ranked = match self
            .reranker
            .rerank(&query, hits, self.settings.rerank_top_k)
            .await
        {
            Ok(ranked) => ranked,
            Err(e) => return GenerationResponse::failed(&e),
        };
        if ranked.is_empty() {
            tracing::info!("Summarize '{query}': nothing survived reranking");
            return GenerationResponse::notice(NO_RELEVANT_DOCUMENTS_NOTICE);
        }

        self.summarize(&query, &ranked)
    }

    /// Stream a summary of caller-supplied documents, skipping retrieval and
    /// reranking. Malformed payloads become a single 400 diagnostic chunk.
    pub fn generate_from_documents(&self, payload: &Value) -> GenerationResponse {
        match DocumentsPayload::from_json(payload) {
            Ok(p) => self.summarize(&p.query, &p.documents),
            Err(e) => {
                tracing::info!("Rejected summarize request: {e}");
                GenerationResponse::failed(&e)
            }
        }
    }

    fn summarize<D: ContextSource>(&self, query: &str, documents: &[D]) -> GenerationResponse {
        let context = assemble(documents, self.settings.token_budget);
        tracing::info!(
            "Summarize '{query}': {} of {} documents in context",
            context.segments.len(),
            documents.len()
        );
        GenerationResponse::streaming(self.streamer.stream_generate(
            query,
            &context.text,
            &self.settings.generation_model,
        ))
    }
}
