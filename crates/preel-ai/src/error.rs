//! AI service client error types.

use thiserror::Error;

pub type AiResult<T> = Result<T, AiError>;

#[derive(Debug, Error)]
pub enum AiError {
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("request failed: {0}")]
    RequestFailed(String),

    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AiError {
    pub fn unavailable(service: &str, message: impl Into<String>) -> Self {
        AiError::ServiceUnavailable(format!("{}: {}", service, message.into()))
    }

    pub fn request_failed(service: &str, message: impl Into<String>) -> Self {
        AiError::RequestFailed(format!("{}: {}", service, message.into()))
    }

    pub fn invalid_response(service: &str, message: impl Into<String>) -> Self {
        AiError::InvalidResponse(format!("{}: {}", service, message.into()))
    }

    /// Whether retrying the request could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AiError::ServiceUnavailable(_) | AiError::Network(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(AiError::unavailable("content", "503").is_retryable());
        assert!(!AiError::request_failed("content", "400").is_retryable());
        assert!(!AiError::invalid_response("video", "missing hook").is_retryable());
    }

    #[test]
    fn test_messages_carry_service() {
        let err = AiError::request_failed("speech", "boom");
        assert!(err.to_string().contains("speech"));
        assert!(err.to_string().contains("boom"));
    }
}
