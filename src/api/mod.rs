pub mod search;
pub mod summarize;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tower_http::cors::CorsLayer;

use crate::state::AppState;

/// All HTTP routes, bound to `state`.
pub fn router(state: AppState) -> Router {
    let cors_permissive = state.config.cors_permissive;

    let app = Router::new()
        .route("/", get(banner))
        .route("/search/{query}", get(search::search))
        .route("/summarize_stream", post(summarize::summarize_stream))
        .route(
            "/summarize_documents_stream",
            post(summarize::summarize_documents_stream),
        )
        .with_state(state);

    // Only needed when the browser frontend is served from another origin.
    if cors_permissive {
        app.layer(CorsLayer::permissive())
    } else {
        app
    }
}

/// GET / - liveness banner.
async fn banner() -> Json<Value> {
    Json(json!({
        "service": env!("CARGO_PKG_NAME"),
        "status": "ok",
    }))
}
