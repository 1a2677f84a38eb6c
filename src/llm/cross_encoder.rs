//! Cross-encoder relevance scoring via an OpenAI-compatible `/v1/rerank`
//! endpoint (llama-server, text-embeddings-inference, Jina, Cohere).
//!
//! Sends a single batch request with all query-document pairs.

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::RerankerConfig;

/// Scores (query, text) pairs jointly.
///
/// Must be safe to share across concurrent requests.
#[async_trait]
pub trait RelevanceModel: Send + Sync {
    /// Check that the model is reachable.
    async fn ping(&self) -> Result<()> {
        Ok(())
    }

    /// Score every text against `query` in one call. The result has the same
    /// length and order as `texts`.
    async fn score_batch(&self, query: &str, texts: &[String]) -> Result<Vec<f64>>;
}

pub struct HttpCrossEncoder {
    client: reqwest::Client,
    config: RerankerConfig,
}

impl HttpCrossEncoder {
    pub fn new(client: reqwest::Client, config: RerankerConfig) -> Self {
        Self { client, config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.base_url.is_some()
    }
}

#[async_trait]
impl RelevanceModel for HttpCrossEncoder {
    /// Any HTTP answer from the base URL counts; servers differ in what they
    /// expose there.
    async fn ping(&self) -> Result<()> {
        let base_url = self
            .config
            .base_url
            .as_deref()
            .context("Reranker base_url not configured")?;

        self.client
            .get(base_url)
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .send()
            .await
            .with_context(|| format!("Failed to reach reranker at {base_url}"))?;
        Ok(())
    }

    async fn score_batch(&self, query: &str, texts: &[String]) -> Result<Vec<f64>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let base_url = self
            .config
            .base_url
            .as_deref()
            .context("Reranker base_url not configured")?;

        let url = format!("{}/v1/rerank", base_url.trim_end_matches('/'));

        let req_body = RerankRequest {
            model: &self.config.model,
            query,
            documents: texts,
            top_n: texts.len(),
        };

        let resp = self
            .client
            .post(&url)
            .timeout(std::time::Duration::from_secs(self.config.timeout_secs))
            .json(&req_body)
            .send()
            .await
            .context("Failed to reach reranker endpoint")?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Reranker returned {status}: {body}");
        }

        let body: RerankResponse = resp
            .json()
            .await
            .context("Failed to parse reranker response")?;

        scores_in_input_order(body.results, texts.len())
    }
}

/// Put scores back in input order. The endpoint usually sorts by score, so
/// every input index must appear exactly once.
fn scores_in_input_order(results: Vec<RerankResultRaw>, expected: usize) -> Result<Vec<f64>> {
    let mut scores: Vec<Option<f64>> = vec![None; expected];

    for r in results {
        let slot = scores
            .get_mut(r.index)
            .with_context(|| format!("Reranker returned out-of-range index {}", r.index))?;
        if slot.is_some() {
            anyhow::bail!("Reranker returned index {} twice", r.index);
        }
        *slot = Some(r.relevance_score);
    }

    scores
        .into_iter()
        .enumerate()
        .map(|(i, s)| s.with_context(|| format!("Reranker returned no score for document {i}")))
        .collect()
}

// ─── Request/Response types ────────────────────────────

#[derive(Serialize)]
struct RerankRequest<'a> {
    model: &'a str,
    query: &'a str,
    documents: &'a [String],
    top_n: usize,
}

#[derive(Deserialize)]
struct RerankResponse {
    results: Vec<RerankResultRaw>,
}

#[derive(Deserialize)]
struct RerankResultRaw {
    index: usize,
    relevance_score: f64,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(index: usize, relevance_score: f64) -> RerankResultRaw {
        RerankResultRaw {
            index,
            relevance_score,
        }
    }

    #[test]
    fn test_scores_restored_to_input_order() {
        let results = vec![raw(2, 9.1), raw(0, 3.5), raw(1, -2.0)];
        let scores = scores_in_input_order(results, 3).unwrap();
        assert_eq!(scores, vec![3.5, -2.0, 9.1]);
    }

    #[test]
    fn test_missing_score_is_error() {
        let results = vec![raw(0, 1.0)];
        let err = scores_in_input_order(results, 2).unwrap_err();
        assert!(err.to_string().contains("document 1"));
    }

    #[test]
    fn test_out_of_range_index_is_error() {
        assert!(scores_in_input_order(vec![raw(5, 1.0)], 2).is_err());
    }

    #[test]
    fn test_duplicate_index_is_error() {
        assert!(scores_in_input_order(vec![raw(0, 1.0), raw(0, 2.0)], 1).is_err());
    }

    #[test]
    fn test_parse_rerank_response() {
        let body = r#"{"model":"m","results":[{"index":1,"relevance_score":0.8},{"index":0,"relevance_score":0.1}]}"#;
        let parsed: RerankResponse = serde_json::from_str(body).unwrap();
        let scores = scores_in_input_order(parsed.results, 2).unwrap();
        assert_eq!(scores, vec![0.1, 0.8]);
    }

    #[tokio::test]
    async fn test_unconfigured_endpoint_fails() {
        let model = HttpCrossEncoder::new(reqwest::Client::new(), RerankerConfig::default());
        assert!(!model.is_configured());
        let err = model
            .score_batch("q", &["text".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not configured"));
    }
}
