use std::sync::Arc;
use std::time::Duration;

use crate::config::Config;
use crate::error::PipelineError;
use crate::index::{ElasticsearchIndex, IndexError, SearchIndex};
use crate::llm::{GenerationBackend, HttpCrossEncoder, HttpGenerationBackend, RelevanceModel};
use crate::pipeline::{Pipeline, PipelineSettings};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub pipeline: Arc<Pipeline>,
}

impl AppState {
    /// Build the HTTP collaborators and verify each one before serving.
    ///
    /// The index must answer a ping; the reranker and generator must be
    /// configured. Any failure is `UpstreamUnavailable`.
    pub async fn connect(config: Config) -> Result<Self, PipelineError> {
        let http_client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| PipelineError::unavailable("http client", e.to_string()))?;

        let index = ElasticsearchIndex::new(http_client.clone(), config.index.clone());
        index
            .ping()
            .await
            .map_err(|e| match e {
                IndexError::Unavailable(m) | IndexError::Query(m) => {
                    PipelineError::unavailable("search index", m)
                }
            })?;
        tracing::info!("Connected to search index '{}'", config.index.index_name);

        let model = HttpCrossEncoder::new(http_client.clone(), config.reranker.clone());
        if !model.is_configured() {
            return Err(PipelineError::unavailable(
                "relevance model",
                "RERANKER_BASE_URL is not set",
            ));
        }
        model
            .ping()
            .await
            .map_err(|e| PipelineError::unavailable("relevance model", format!("{e:#}")))?;

        let backend = HttpGenerationBackend::new(http_client, config.llm.clone());
        backend
            .ping()
            .await
            .map_err(|e| PipelineError::unavailable("generation backend", format!("{e:#}")))?;
        tracing::info!("Relevance model and generation backend reachable");

        Ok(Self::from_parts(
            config,
            Arc::new(index),
            Arc::new(model),
            Arc::new(backend),
        ))
    }

    /// Assemble state from already-built collaborators.
    pub fn from_parts(
        config: Config,
        index: Arc<dyn SearchIndex>,
        model: Arc<dyn RelevanceModel>,
        backend: Arc<dyn GenerationBackend>,
    ) -> Self {
        let settings = PipelineSettings::from_config(&config);
        Self {
            config: Arc::new(config),
            pipeline: Arc::new(Pipeline::new(index, model, backend, settings)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::routing::get;
    use axum::Router;

    /// Serves `GET /` (index and reranker pings) and `GET /api/tags`.
    async fn spawn_upstream() -> String {
        let app = Router::new()
            .route("/", get(|| async { r#"{"tagline":"You Know, for Search"}"# }))
            .route("/api/tags", get(|| async { r#"{"models":[]}"# }));
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{addr}")
    }

    /// An address nothing is listening on.
    async fn closed_url() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        format!("http://{addr}")
    }

    fn config(index: &str, reranker: &str, llm: &str) -> Config {
        let mut config = Config::default();
        config.index.url = Some(index.to_string());
        config.reranker.base_url = Some(reranker.to_string());
        config.llm.base_url = llm.to_string();
        config
    }

    fn failed_service(result: Result<AppState, PipelineError>) -> &'static str {
        match result {
            Err(PipelineError::UpstreamUnavailable { service, .. }) => service,
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("startup should have failed"),
        }
    }

    #[tokio::test]
    async fn test_connect_fails_without_index_url() {
        assert_eq!(failed_service(AppState::connect(Config::default()).await), "search index");
    }

    #[tokio::test]
    async fn test_connect_fails_when_reranker_unreachable() {
        let up = spawn_upstream().await;
        let down = closed_url().await;
        let result = AppState::connect(config(&up, &down, &up)).await;
        assert_eq!(failed_service(result), "relevance model");
    }

    #[tokio::test]
    async fn test_connect_fails_when_generation_backend_unreachable() {
        let up = spawn_upstream().await;
        let down = closed_url().await;
        let result = AppState::connect(config(&up, &up, &down)).await;
        assert_eq!(failed_service(result), "generation backend");
    }

    #[tokio::test]
    async fn test_connect_succeeds_when_all_reachable() {
        let up = spawn_upstream().await;
        let state = AppState::connect(config(&up, &up, &up)).await;
        assert!(state.is_ok());
    }
}
