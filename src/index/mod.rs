//! Full-text search index collaborator.

pub mod elastic;

use async_trait::async_trait;
use thiserror::Error;

use crate::error::PipelineError;
use crate::models::Document;

pub use elastic::ElasticsearchIndex;

/// Failure talking to the index. `Unavailable` means no usable connection;
/// `Query` means the index was reached but the request failed.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("search index unavailable: {0}")]
    Unavailable(String),
    #[error("search index query failed: {0}")]
    Query(String),
}

impl From<IndexError> for PipelineError {
    fn from(err: IndexError) -> Self {
        match err {
            IndexError::Unavailable(message) => PipelineError::unavailable("search index", message),
            IndexError::Query(message) => PipelineError::Query(message),
        }
    }
}

/// A multi-field text match against one index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub index: String,
    pub query_text: String,
    pub fields: Vec<String>,
    pub size: usize,
}

/// A full-text index that ranks documents for a query.
///
/// Implementations are shared by all in-flight requests and must be safe for
/// concurrent use.
#[async_trait]
pub trait SearchIndex: Send + Sync {
    /// Check that the index is reachable.
    async fn ping(&self) -> Result<(), IndexError>;

    /// Run a "most fields" match. Hits come back in the index's rank order;
    /// zero hits is `Ok(vec![])`.
    async fn search(&self, query: &IndexQuery) -> Result<Vec<Document>, IndexError>;
}
