//! Error handling for the fusion gateway

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

/// Result type alias
pub type Result<T> = std::result::Result<T, Error>;

/// Error types
///
/// Nothing in this taxonomy is fatal to the process; every failure is scoped
/// to a single session or a single poll cycle.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Camera could not be opened or read after bounded retries
    #[error("Resource unavailable: {0}")]
    ResourceUnavailable(String),

    /// A sensor adapter's external call failed for one poll
    #[error("Source poll error: {0}")]
    SourcePoll(String),

    /// Image sink rejected or failed the snapshot upload
    #[error("Upload error: {0}")]
    Upload(String),

    /// Client sent a payload we could not parse
    #[error("Malformed message: {0}")]
    MalformedMessage(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// HTTP client error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal error
    #[error("Internal error: {0}")]
    Internal(String),
}

impl IntoResponse for Error {
    fn into_response(self) -> Response {
        let (status, error_code, message) = match &self {
            Error::ResourceUnavailable(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "RESOURCE_UNAVAILABLE",
                msg.clone(),
            ),
            Error::SourcePoll(msg) => (StatusCode::BAD_GATEWAY, "SOURCE_POLL_ERROR", msg.clone()),
            Error::Upload(msg) => (StatusCode::BAD_GATEWAY, "UPLOAD_ERROR", msg.clone()),
            Error::MalformedMessage(msg) => {
                (StatusCode::BAD_REQUEST, "MALFORMED_MESSAGE", msg.clone())
            }
            Error::Serialization(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "SERIALIZATION_ERROR",
                e.to_string(),
            ),
            Error::Http(e) => (StatusCode::BAD_GATEWAY, "HTTP_ERROR", e.to_string()),
            Error::Io(e) => (StatusCode::INTERNAL_SERVER_ERROR, "IO_ERROR", e.to_string()),
            Error::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                msg.clone(),
            ),
        };

        tracing::error!(
            status = %status,
            error_code = %error_code,
            message = %message,
            "Request error"
        );

        let body = Json(json!({
            "error_code": error_code,
            "message": message
        }));

        (status, body).into_response()
    }
}
