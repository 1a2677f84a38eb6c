use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{IndexError, IndexQuery, SearchIndex};
use crate::config::IndexConfig;
use crate::models::Document;

/// Elasticsearch (or OpenSearch) over its REST API.
pub struct ElasticsearchIndex {
    client: reqwest::Client,
    config: IndexConfig,
}

impl ElasticsearchIndex {
    pub fn new(client: reqwest::Client, config: IndexConfig) -> Self {
        Self { client, config }
    }

    fn base_url(&self) -> Result<&str, IndexError> {
        self.config
            .url
            .as_deref()
            .map(|u| u.trim_end_matches('/'))
            .ok_or_else(|| IndexError::Unavailable("index URL not configured".to_string()))
    }

    fn authorize(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let req = req.timeout(Duration::from_secs(self.config.timeout_secs));
        if let Some(key) = &self.config.api_key {
            req.header("Authorization", format!("ApiKey {key}"))
        } else if let Some(user) = &self.config.username {
            req.basic_auth(user, self.config.password.as_deref())
        } else {
            req
        }
    }
}

#[async_trait]
impl SearchIndex for ElasticsearchIndex {
    async fn ping(&self) -> Result<(), IndexError> {
        let url = format!("{}/", self.base_url()?);
        let resp = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| IndexError::Unavailable(format!("failed to reach {url}: {e}")))?;

        if !resp.status().is_success() {
            return Err(IndexError::Unavailable(format!(
                "ping returned {}",
                resp.status()
            )));
        }
        Ok(())
    }

    async fn search(&self, query: &IndexQuery) -> Result<Vec<Document>, IndexError> {
        let url = format!("{}/{}/_search", self.base_url()?, query.index);

        let resp = self
            .authorize(self.client.post(&url))
            .json(&build_search_body(query))
            .send()
            .await
            .map_err(classify_send_error)?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(IndexError::Query(format!("index returned {status}: {body}")));
        }

        let body: SearchResponseBody = resp
            .json()
            .await
            .map_err(|e| IndexError::Query(format!("failed to parse search response: {e}")))?;

        Ok(body.hits.hits)
    }
}

/// Request body for a "most fields" multi-match query.
pub fn build_search_body(query: &IndexQuery) -> Value {
    json!({
        "size": query.size,
        "query": {
            "multi_match": {
                "query": query.query_text,
                "fields": query.fields,
                "type": "most_fields",
            }
        }
    })
}

fn classify_send_error(e: reqwest::Error) -> IndexError {
    if e.is_connect() || e.is_timeout() {
        IndexError::Unavailable(e.to_string())
    } else {
        IndexError::Query(e.to_string())
    }
}

#[derive(Deserialize)]
struct SearchResponseBody {
    hits: HitsEnvelope,
}

#[derive(Deserialize)]
struct HitsEnvelope {
    #[serde(default)]
    hits: Vec<Document>,
}
