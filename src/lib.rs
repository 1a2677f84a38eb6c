//! # paper-search
//!
//! An HTTP service that answers natural-language queries over a corpus of
//! scholarly documents held in an Elasticsearch-compatible index, and
//! streams LLM-written summaries of the most relevant ones.
//!
//! ## Architecture
//!
//! ```text
//!                      ┌──────────────┐
//!                      │  User Query  │
//!                      └──────┬───────┘
//!                             │
//!                             ▼
//!                ┌────────────────────────┐
//!                │  Retrieval (index)     │
//!                │  most_fields match     │
//!                │  top `size` hits       │
//!                └───────────┬────────────┘
//!                            │
//!                            ▼
//!                ┌────────────────────────┐
//!                │  Cross-encoder Rerank  │
//!                │  one batch, stable sort│
//!                │  keep `top_k`          │
//!                └───────────┬────────────┘
//!                            │
//!          ┌─────────────────┴─────────────────┐
//!          ▼                                   ▼
//!  ┌───────────────┐              ┌────────────────────────┐
//!  │ Search result │              │  Context Assembly      │
//!  │ (JSON)        │              │  word budget, cut last │
//!  └───────────────┘              └───────────┬────────────┘
//!                                             │   ▲ caller-supplied
//!                                             │   │ documents
//!                                             ▼
//!                                 ┌────────────────────────┐
//!                                 │  Streamed Generation   │
//!                                 │  Ollama / OpenAI       │
//!                                 └────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`] - Environment-based configuration for the server and collaborators
//! - [`error`] - `PipelineError` and its HTTP status mapping
//! - [`models`] - Shared data types: `Document`, `ScoredDocument`, request validation
//! - [`index`] - `SearchIndex` trait and the Elasticsearch client
//! - [`llm::cross_encoder`] - `RelevanceModel` trait and the `/v1/rerank` client
//! - [`llm::chat_stream`] - `GenerationBackend` trait and streaming chat clients
//! - [`pipeline`] - Retriever, reranker, context assembler, streamer and the flows composing them
//! - [`api`] - Axum HTTP handlers
//! - [`state`] - Shared application state built once at startup

pub mod api;
pub mod config;
pub mod error;
pub mod index;
pub mod llm;
pub mod models;
pub mod pipeline;
pub mod state;
