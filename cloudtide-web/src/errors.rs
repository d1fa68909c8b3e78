//! Error types for the API server.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cloudtide_core::CloudtideError;
use cloudtide_search::{ScraperError, SyncError};
use serde_json::json;

/// Errors surfaced by API handlers and server startup.
#[derive(Debug, thiserror::Error)]
pub enum WebError {
    /// Request was malformed or referenced invalid input.
    #[error("Invalid request: {reason}")]
    BadRequest {
        /// What was wrong with the request.
        reason: String,
    },

    /// Requested resource does not exist.
    #[error("Not found: {resource}")]
    NotFound {
        /// Description of the missing resource.
        resource: String,
    },

    /// Settings rejected or unavailable.
    #[error(transparent)]
    Settings(#[from] CloudtideError),

    /// Provider sync failure.
    #[error(transparent)]
    Sync(#[from] SyncError),

    /// Server could not be set up.
    #[error("Server error: {reason}")]
    Server {
        /// Setup step that failed.
        reason: String,
    },

    /// Listener or socket failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl WebError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            WebError::BadRequest { .. } => StatusCode::BAD_REQUEST,
            WebError::NotFound { .. } => StatusCode::NOT_FOUND,
            WebError::Settings(e) if e.is_user_error() => StatusCode::BAD_REQUEST,
            WebError::Settings(_) | WebError::Sync(_) | WebError::Server { .. } | WebError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl From<ScraperError> for WebError {
    fn from(error: ScraperError) -> Self {
        WebError::BadRequest {
            reason: error.to_string(),
        }
    }
}

impl IntoResponse for WebError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            WebError::Settings(e) => e.user_message(),
            other => other.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "Request failed");
        }

        (status, Json(json!({ "error": message }))).into_response()
    }
}
