use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::Instrument;
use uuid::Uuid;

use crate::error::PipelineError;
use crate::models::{SearchParams, SearchResponse};
use crate::pipeline::SearchOptions;
use crate::state::AppState;

/// GET /search/{query} - retrieve from the index, then rerank:
///   1. Multi-field match, `size` hits (default from config)
///   2. Cross-encoder scoring, keep `top_k` (default from config)
pub async fn search(
    State(state): State<AppState>,
    Path(query): Path<String>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, PipelineError> {
    let span = tracing::info_span!("search", request_id = %Uuid::new_v4());
    async move {
        let options = SearchOptions {
            size: params.size,
            top_k: params.top_k,
        };
        match state.pipeline.search(&query, options).await {
            Ok(resp) => Ok(Json(resp)),
            Err(e) => {
                tracing::warn!("Search failed: {e}");
                Err(e)
            }
        }
    }
    .instrument(span)
    .await
}
