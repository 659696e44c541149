//! Error types for the meldvis host.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;

/// Result type for host operations.
pub type Result<T> = std::result::Result<T, ServerError>;

/// Errors that can occur in the host process.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Session or protocol error
    #[error(transparent)]
    Core(#[from] meldvis_core::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Runtime socket error
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The session actor is gone
    #[error("session actor shut down")]
    Shutdown,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match &self {
            ServerError::Shutdown => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Core(e) if e.is_fatal() => StatusCode::CONFLICT,
            ServerError::Core(_) => StatusCode::BAD_REQUEST,
            ServerError::Io(_) | ServerError::Transport(_) => StatusCode::BAD_GATEWAY,
        };
        let body = serde_json::json!({ "error": self.to_string() });
        (status, Json(body)).into_response()
    }
}
