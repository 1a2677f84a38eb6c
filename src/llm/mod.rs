//! Model collaborators: the cross-encoder used for reranking and the chat
//! backend used for streamed summaries.

pub mod chat_stream;
pub mod cross_encoder;

pub use chat_stream::{BackendStream, CompletionRequest, GenerationBackend, HttpGenerationBackend};
pub use cross_encoder::{HttpCrossEncoder, RelevanceModel};
