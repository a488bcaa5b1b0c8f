//! Error type shared by the route handlers.
//!
//! The store treats unknown ids as no-ops; handlers turn that into a 404
//! here so clients can tell the difference.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("location '{0}' not found")]
    NotFound(String),

    #[error("{0}")]
    BadRequest(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    // ---
    pub fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        // ---
        let status = self.status();
        match &self {
            Self::Internal(e) => tracing::error!("Request failed: {:#}", e),
            _ => tracing::warn!("Request rejected ({}): {}", status, self),
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}
