use std::cmp::Ordering;
use std::sync::Arc;

use crate::error::{PipelineError, Result};
use crate::llm::RelevanceModel;
use crate::models::{Document, ScoredDocument};

/// Reorders retrieved documents by cross-encoder relevance.
#[derive(Clone)]
pub struct Reranker {
    model: Arc<dyn RelevanceModel>,
}

impl Reranker {
    pub fn new(model: Arc<dyn RelevanceModel>) -> Self {
        Self { model }
    }

    /// Score `documents` against `query` and keep the best `top_k`.
    ///
    /// Documents without usable `text` are dropped before scoring. All
    /// remaining texts go to the model in one batch. The sort is stable, so
    /// equal scores keep their retrieval order.
    pub async fn rerank(
        &self,
        query: &str,
        documents: Vec<Document>,
        top_k: usize,
    ) -> Result<Vec<ScoredDocument>> {
        let total = documents.len();
        let (docs, texts): (Vec<Document>, Vec<String>) = documents
            .into_iter()
            .filter_map(|d| {
                let text = d.usable_text()?.to_string();
                Some((d, text))
            })
            .unzip();

        let dropped = total - docs.len();
        if dropped > 0 {
            tracing::info!("Dropped {dropped} of {total} documents without usable text before reranking");
        }
        if docs.is_empty() {
            return Ok(Vec::new());
        }

        let scores = self
            .model
            .score_batch(query, &texts)
            .await
            .map_err(|e| {
                tracing::warn!("Relevance model call failed: {e:#}");
                PipelineError::Scoring(format!("{e:#}"))
            })?;

        if scores.len() != docs.len() {
            return Err(PipelineError::Scoring(format!(
                "model returned {} scores for {} documents",
                scores.len(),
                docs.len()
            )));
        }
        if let Some(i) = scores.iter().position(|s| !s.is_finite()) {
            return Err(PipelineError::Scoring(format!(
                "non-finite score {} for document '{}'",
                scores[i], docs[i].id
            )));
        }

        let mut scored: Vec<ScoredDocument> = docs
            .into_iter()
            .zip(scores)
            .map(|(document, relevance_score)| ScoredDocument {
                document,
                relevance_score,
            })
            .collect();

        // sort_by is stable
        scored.sort_by(|a, b| {
            b.relevance_score
                .partial_cmp(&a.relevance_score)
                .unwrap_or(Ordering::Equal)
        });
        scored.truncate(top_k);

        tracing::debug!(scored = total - dropped, kept = scored.len(), "reranked");
        Ok(scored)
    }
}
