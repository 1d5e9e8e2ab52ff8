//! HTTP error mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

/// Error returned by the JSON routes.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The named resource does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Anything the client cannot fix.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<glyph_store::Error> for ApiError {
    fn from(err: glyph_store::Error) -> Self {
        match err {
            glyph_store::Error::SessionNotFound(id) => Self::NotFound(format!("session {id}")),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
