use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::index::{IndexQuery, SearchIndex};
use crate::models::Document;

/// First stage: candidate documents from the full-text index.
#[derive(Clone)]
pub struct Retriever {
    index: Arc<dyn SearchIndex>,
}

impl Retriever {
    pub fn new(index: Arc<dyn SearchIndex>) -> Self {
        Self { index }
    }

    /// Ask the index for up to `size` hits matching `query` on `fields`.
    ///
    /// The index's ranking is kept as is. Communication or query failures are
    /// errors, never partial or empty results.
    pub async fn retrieve(
        &self,
        query: &str,
        index: &str,
        fields: &[String],
        size: usize,
    ) -> Result<Vec<Document>> {
        let request = IndexQuery {
            index: index.to_string(),
            query_text: query.to_string(),
            fields: fields.to_vec(),
            size,
        };

        let hits = self.index.search(&request).await.map_err(|e| {
            tracing::warn!("Retrieval from '{index}' failed: {e}");
            PipelineError::from(e)
        })?;

        tracing::debug!(index, hits = hits.len(), "retrieved candidates");
        Ok(hits)
    }
}
