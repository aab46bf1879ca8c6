//! Error types for Firestore operations.

use thiserror::Error;

/// Result type for Firestore operations
pub type FirestoreResult<T> = Result<T, FirestoreError>;

/// Errors that can occur during Firestore operations
#[derive(Debug, Error)]
pub enum FirestoreError {
    #[error("authentication error: {0}")]
    AuthError(String),

    #[error("document not found: {0}")]
    NotFound(String),

    #[error("document already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("server error ({0}): {1}")]
    ServerError(u16, String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("serialization error: {0}")]
    SerializationError(String),

    #[error("rate limited, retry after {0}ms")]
    RateLimited(u64),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("precondition failed: {0}")]
    PreconditionFailed(String),
}

impl FirestoreError {
    /// Create an authentication error
    pub fn auth_error(msg: impl Into<String>) -> Self {
        FirestoreError::AuthError(msg.into())
    }

    /// Create a not found error
    pub fn not_found(msg: impl Into<String>) -> Self {
        FirestoreError::NotFound(msg.into())
    }

    /// Create a request failed error
    pub fn request_failed(msg: impl Into<String>) -> Self {
        FirestoreError::RequestFailed(msg.into())
    }

    /// Create an invalid response error
    pub fn invalid_response(msg: impl Into<String>) -> Self {
        FirestoreError::InvalidResponse(msg.into())
    }

    /// Classify an HTTP error status from the REST API.
    ///
    /// 429 responses rarely carry a usable Retry-After, so a one second
    /// default is assumed and the retry layer backs off from there.
    pub fn from_http_status(status: u16, msg: impl Into<String>) -> Self {
        let msg = msg.into();
        match status {
            401 => FirestoreError::AuthError(msg),
            403 => FirestoreError::PermissionDenied(msg),
            404 => FirestoreError::NotFound(msg),
            409 => FirestoreError::AlreadyExists(msg),
            412 => FirestoreError::PreconditionFailed(msg),
            429 => FirestoreError::RateLimited(1000),
            500..=599 => FirestoreError::ServerError(status, msg),
            _ => FirestoreError::RequestFailed(msg),
        }
    }

    /// HTTP status this error maps to, when it has one
    pub fn http_status(&self) -> Option<u16> {
        match self {
            FirestoreError::AuthError(_) => Some(401),
            FirestoreError::PermissionDenied(_) => Some(403),
            FirestoreError::NotFound(_) => Some(404),
            FirestoreError::AlreadyExists(_) => Some(409),
            FirestoreError::PreconditionFailed(_) => Some(412),
            FirestoreError::RateLimited(_) => Some(429),
            FirestoreError::ServerError(status, _) => Some(*status),
            _ => None,
        }
    }

    /// Server-requested retry delay, if the error carries one
    pub fn retry_after_ms(&self) -> Option<u64> {
        match self {
            FirestoreError::RateLimited(ms) => Some(*ms),
            _ => None,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FirestoreError::Network(_)
                | FirestoreError::RateLimited(_)
                | FirestoreError::ServerError(_, _)
        )
    }

    /// Check if this error is an update-time precondition failure
    pub fn is_precondition_failed(&self) -> bool {
        matches!(self, FirestoreError::PreconditionFailed(_))
            || matches!(
                self,
                FirestoreError::RequestFailed(msg) if msg.contains("FAILED_PRECONDITION")
            )
    }
}
