//! Error taxonomy for the search and summarize pipeline.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Errors surfaced by the pipeline to its callers.
///
/// An empty result is never an error: stages return `Ok(vec![])` when there
/// is legitimately nothing to return, and one of these variants otherwise.
#[derive(Debug, Error)]
pub enum PipelineError {
    /// A collaborator (index, relevance model or generation backend) is not
    /// configured or cannot be reached.
    #[error("{service} unavailable: {message}")]
    UpstreamUnavailable {
        /// Which collaborator failed.
        service: &'static str,
        /// A description of the failure.
        message: String,
    },

    /// A single request to the search index failed.
    #[error("Search service error: {0}")]
    Query(String),

    /// The relevance model failed or returned malformed scores.
    #[error("Relevance scoring failed: {0}")]
    Scoring(String),

    /// The caller sent a missing or malformed query or document list.
    #[error("Invalid request: {0}")]
    Validation(String),
}

impl PipelineError {
    pub fn unavailable(service: &'static str, message: impl Into<String>) -> Self {
        Self::UpstreamUnavailable {
            service,
            message: message.into(),
        }
    }

    /// HTTP status used when this error reaches a client.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::UpstreamUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            Self::Query(_) | Self::Scoring(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Validation(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for PipelineError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(serde_json::json!({ "detail": self.to_string() }))).into_response()
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes_by_class() {
        assert_eq!(
            PipelineError::unavailable("search index", "down").status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            PipelineError::Query("boom".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::Scoring("nan".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            PipelineError::Validation("empty".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
    }

    #[test]
    fn test_unavailable_message_names_service() {
        let err = PipelineError::unavailable("relevance model", "base URL not configured");
        assert_eq!(
            err.to_string(),
            "relevance model unavailable: base URL not configured"
        );
    }
}
