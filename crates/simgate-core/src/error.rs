//! Failure taxonomy shared by the bridge, the cache and the dispatcher.
//!
//! Every request-path failure carries a [`ErrorKind`] so the HTTP adapter
//! can map it to a status without matching on messages.

use serde::Serialize;

/// A typed failure from a bridge call, cache operation or webhook delivery.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SimError {
    /// The identifier has no live object.
    #[error("not found: {0}")]
    NotFound(String),

    /// A malformed key, method name or parameter list.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The live-side operation failed.
    #[error("execution failed: {0}")]
    ExecutionFailed(String),

    /// The bridge call did not finish before its deadline.
    #[error("bridge call timed out after {elapsed_ms}ms")]
    Timeout {
        /// Time the caller waited before giving up.
        elapsed_ms: u64,
    },

    /// A webhook request failed. Never returned on the request path.
    #[error("delivery failed: {0}")]
    DeliveryFailed(String),

    /// Anything unclassified. Always logged and reported.
    #[error("internal error: {0}")]
    Internal(String),
}

/// Discriminant of [`SimError`] without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// See [`SimError::NotFound`].
    NotFound,
    /// See [`SimError::InvalidArgument`].
    InvalidArgument,
    /// See [`SimError::ExecutionFailed`].
    ExecutionFailed,
    /// See [`SimError::Timeout`].
    Timeout,
    /// See [`SimError::DeliveryFailed`].
    DeliveryFailed,
    /// See [`SimError::Internal`].
    Internal,
}

impl SimError {
    /// The kind of this failure.
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidArgument(_) => ErrorKind::InvalidArgument,
            Self::ExecutionFailed(_) => ErrorKind::ExecutionFailed,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::DeliveryFailed(_) => ErrorKind::DeliveryFailed,
            Self::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Shorthand for a [`SimError::NotFound`] naming the missing object.
    pub fn not_found(what: impl core::fmt::Display) -> Self {
        Self::NotFound(what.to_string())
    }

    /// Shorthand for a [`SimError::InvalidArgument`].
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }
}

impl From<simgate_types::IdParseError> for SimError {
    fn from(err: simgate_types::IdParseError) -> Self {
        Self::InvalidArgument(err.to_string())
    }
}
