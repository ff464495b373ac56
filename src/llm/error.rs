//! Typed errors for model endpoint calls
//!
//! Transport failures are never fed back to the model; they abort the run
//! and surface to the caller with one of these variants.

use thiserror::Error;

/// LLM operation errors with typed variants
///
/// - `Unauthorized` (401/403) - missing or rejected credentials
/// - `RateLimited` (429) - quota exceeded
/// - `BadRequest` (400) - malformed request
/// - `ServiceError` (5xx) - server-side issue
/// - `Network` - connection failure or timeout
/// - `InvalidResponse` - the body did not match the expected shape
#[derive(Debug, Error)]
pub enum LlmError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Service error: {0}")]
    ServiceError(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl LlmError {
    /// Whether the same request may succeed later
    ///
    /// The agent loop never retries; a failed round-trip ends the run. This
    /// only tells the host whether re-running the task is worth it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LlmError::RateLimited(_) | LlmError::ServiceError(_) | LlmError::Network(_)
        )
    }

    /// Convert HTTP status code and error text into typed LlmError
    pub fn from_http_status(status: reqwest::StatusCode, error_text: String) -> Self {
        match status.as_u16() {
            401 | 403 => LlmError::Unauthorized(error_text),
            429 => LlmError::RateLimited(error_text),
            400 => LlmError::BadRequest(error_text),
            500..=599 => LlmError::ServiceError(error_text),
            _ => LlmError::Other(anyhow::anyhow!("HTTP {}: {}", status, error_text)),
        }
    }

    /// Convert network/connection errors into typed LlmError
    pub fn from_network_error(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            LlmError::Network(format!("Request timeout: {}", e))
        } else if e.is_connect() {
            LlmError::Network(format!("Connection failed: {}", e))
        } else if e.is_decode() {
            LlmError::InvalidResponse(e.to_string())
        } else if let Some(status) = e.status() {
            Self::from_http_status(status, e.to_string())
        } else {
            LlmError::Other(e.into())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        let err = LlmError::from_http_status(
            reqwest::StatusCode::UNAUTHORIZED,
            "Invalid token".to_string(),
        );
        assert!(matches!(err, LlmError::Unauthorized(_)));
        assert!(!err.is_retryable());

        let err = LlmError::from_http_status(
            reqwest::StatusCode::FORBIDDEN,
            "Not allowed".to_string(),
        );
        assert!(matches!(err, LlmError::Unauthorized(_)));

        let err = LlmError::from_http_status(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            "Rate limit exceeded".to_string(),
        );
        assert!(matches!(err, LlmError::RateLimited(_)));
        assert!(err.is_retryable());

        let err = LlmError::from_http_status(
            reqwest::StatusCode::BAD_REQUEST,
            "Invalid JSON".to_string(),
        );
        assert!(matches!(err, LlmError::BadRequest(_)));

        let err = LlmError::from_http_status(
            reqwest::StatusCode::BAD_GATEWAY,
            "upstream".to_string(),
        );
        assert!(matches!(err, LlmError::ServiceError(_)));
    }

    #[test]
    fn test_other_status_keeps_code_in_message() {
        let err = LlmError::from_http_status(reqwest::StatusCode::IM_A_TEAPOT, "tea".to_string());
        assert!(matches!(err, LlmError::Other(_)));
        assert!(err.to_string().contains("418"));
    }
}
