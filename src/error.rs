//! Error types shared by the state store and the HTTP surface

use thiserror::Error;

/// Result alias for relay operations
pub type RelayResult<T> = Result<T, RelayError>;

/// Errors surfaced to relay callers
///
/// `InvalidArgument` maps to HTTP 400, `Internal` to HTTP 500.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RelayError {
    /// Bad input: unknown position, missing or malformed body
    #[error("{0}")]
    InvalidArgument(String),

    /// Anything unexpected while handling a request
    #[error("{0}")]
    Internal(String),
}

impl RelayError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        Self::Internal(e.to_string())
    }
}
