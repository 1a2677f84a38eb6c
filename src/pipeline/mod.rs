//! The query → retrieve → rerank → assemble → generate pipeline.

pub mod context;
pub mod generate;
pub mod orchestrator;
pub mod reranker;
pub mod retriever;

pub use context::{assemble, AssembledContext, ContextSegment};
pub use generate::{ChunkStream, GenerationChunk, GenerationStreamer};
pub use orchestrator::{GenerationResponse, Pipeline, PipelineSettings, SearchOptions};
pub use reranker::Reranker;
pub use retriever::Retriever;
