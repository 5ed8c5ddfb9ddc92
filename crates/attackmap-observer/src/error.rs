//! Error types for the snapshot API.
//!
//! [`ObserverError`] converts into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use attackmap_store::StoreError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the snapshot API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// An invalid query parameter or request body was provided.
    #[error("invalid request: {0}")]
    InvalidQuery(String),

    /// The event cache refused an operation.
    #[error("event cache error: {0}")]
    Store(#[from] StoreError),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::InvalidQuery(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            Self::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
