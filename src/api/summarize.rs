use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use serde_json::Value;
use tracing::Instrument;
use uuid::Uuid;

use crate::models::query_from_payload;
use crate::pipeline::GenerationResponse;
use crate::state::AppState;

/// POST /summarize_stream - search, rerank, and stream a summary as plain
/// text.
///
/// Bodies are parsed by hand so a malformed request still gets a single
/// diagnostic line instead of the extractor's rejection.
pub async fn summarize_stream(State(state): State<AppState>, body: Bytes) -> Response {
    let span = tracing::info_span!("summarize_stream", request_id = %Uuid::new_v4());
    let payload = parse_body(&body);

    let resp = async move {
        match query_from_payload(&payload) {
            Ok(query) => state.pipeline.search_and_generate(&query).await,
            Err(e) => {
                tracing::info!("Rejected summarize request: {e}");
                GenerationResponse::failed(&e)
            }
        }
    }
    .instrument(span)
    .await;

    text_stream(resp)
}

/// POST /summarize_documents_stream - stream a summary of the documents in
/// the request body, skipping retrieval and reranking.
pub async fn summarize_documents_stream(State(state): State<AppState>, body: Bytes) -> Response {
    let span = tracing::info_span!("summarize_documents_stream", request_id = %Uuid::new_v4());
    let resp = span.in_scope(|| state.pipeline.generate_from_documents(&parse_body(&body)));
    text_stream(resp)
}

fn parse_body(body: &[u8]) -> Value {
    serde_json::from_slice(body).unwrap_or(Value::Null)
}

fn text_stream(resp: GenerationResponse) -> Response {
    let chunks = resp
        .chunks
        .map(|chunk| Ok::<_, Infallible>(chunk.into_text()));
    (
        resp.status,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(chunks),
    )
        .into_response()
}
