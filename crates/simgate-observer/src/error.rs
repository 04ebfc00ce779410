//! Error types for the observer API.
//!
//! [`ObserverError`] carries every failure a handler can produce and turns
//! it into a JSON response through its [`IntoResponse`] implementation.
//! Cache failures keep their [`ErrorKind`] so the status code never depends
//! on a message.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use simgate_core::{ErrorKind, SimError};

/// Errors that can occur in the observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// The kind is unknown or its servlet is disabled.
    #[error("not found: {0}")]
    NotFound(String),

    /// A failure from the cache or the bridge.
    #[error(transparent)]
    Sim(#[from] SimError),

    /// A serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The blocking worker running the request failed.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ObserverError {
    /// HTTP status for this error.
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Sim(err) => status_for(err.kind()),
            Self::Serialization(_) | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Status code for a failure kind.
pub const fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::NotFound => StatusCode::NOT_FOUND,
        ErrorKind::InvalidArgument => StatusCode::BAD_REQUEST,
        ErrorKind::Timeout => StatusCode::GATEWAY_TIMEOUT,
        ErrorKind::DeliveryFailed => StatusCode::BAD_GATEWAY,
        ErrorKind::ExecutionFailed | ErrorKind::Internal => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let status = self.status();
        let body = serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        });
        (status, axum::Json(body)).into_response()
    }
}
