//! Provider-specific error types
//!
//! `ProviderError` carries vendor failure detail and converts into
//! `triage_foundation::Error` at crate boundaries.

use crate::retry::{RetryClassification, RetryableError};
use thiserror::Error;
use triage_foundation::Error as FoundationError;

/// Errors that can occur during provider operations
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// API key is missing or invalid
    #[error("Authentication failed: {0}")]
    Authentication(String),

    #[error("Rate limit exceeded{}", .retry_after_ms.map(|ms| format!(", retry after {}ms", ms)).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(String),

    /// Server error (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Connection failed, DNS, timeout
    #[error("Network error: {0}")]
    Network(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl RetryableError for ProviderError {
    fn classify(&self) -> RetryClassification {
        match self {
            ProviderError::RateLimited { retry_after_ms } => RetryClassification::RateLimited {
                retry_after_ms: *retry_after_ms,
            },
            ProviderError::ServerError(_) | ProviderError::Network(_) => RetryClassification::Retry,
            _ => RetryClassification::NoRetry,
        }
    }
}

impl ProviderError {
    /// Map an HTTP status and body
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(body.to_string()),
            429 => ProviderError::RateLimited {
                retry_after_ms: extract_retry_after(body),
            },
            400 => {
                if body.contains("context") || body.contains("too long") {
                    ProviderError::ContextLengthExceeded(body.to_string())
                } else {
                    ProviderError::InvalidRequest(body.to_string())
                }
            }
            404 => ProviderError::ModelNotAvailable(body.to_string()),
            500..=599 => ProviderError::ServerError(body.to_string()),
            _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Map a transport-level reqwest failure
    pub fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ProviderError::Network(err.to_string())
        } else if err.is_decode() {
            ProviderError::InvalidResponse(err.to_string())
        } else {
            ProviderError::Network(err.to_string())
        }
    }
}

/// `{"error": {"retry_after": <secs>}}` in milliseconds
fn extract_retry_after(body: &str) -> Option<u64> {
    let json = serde_json::from_str::<serde_json::Value>(body).ok()?;
    let secs = json
        .get("error")
        .and_then(|e| e.get("retry_after"))
        .and_then(|v| v.as_f64())?;
    Some((secs * 1000.0) as u64)
}

// ============================================================================
// triage_foundation::Error conversion
// ============================================================================

impl From<ProviderError> for FoundationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::RateLimited { retry_after_ms } => FoundationError::RateLimited(
                retry_after_ms
                    .map(|ms| format!("Retry after {}ms", ms))
                    .unwrap_or_else(|| "Rate limited".to_string()),
            ),
            ProviderError::Network(msg) => FoundationError::Http(format!("Network: {}", msg)),
            ProviderError::InvalidRequest(msg) => FoundationError::InvalidInput(msg),
            ProviderError::NotConfigured(msg) => FoundationError::Config(msg),
            other => FoundationError::Provider(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_http_status() {
        assert!(matches!(
            ProviderError::from_http_status(401, "bad key"),
            ProviderError::Authentication(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(503, "overloaded"),
            ProviderError::ServerError(_)
        ));
        assert!(matches!(
            ProviderError::from_http_status(400, "prompt is too long"),
            ProviderError::ContextLengthExceeded(_)
        ));
    }

    #[test]
    fn test_retry_after_extraction() {
        let err = ProviderError::from_http_status(429, r#"{"error":{"retry_after":1.5}}"#);
        match err {
            ProviderError::RateLimited { retry_after_ms } => assert_eq!(retry_after_ms, Some(1500)),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_classification() {
        assert_eq!(
            ProviderError::ServerError("x".into()).classify(),
            RetryClassification::Retry
        );
        assert_eq!(
            ProviderError::Authentication("x".into()).classify(),
            RetryClassification::NoRetry
        );
    }

    #[test]
    fn test_into_foundation_error() {
        let err: FoundationError = ProviderError::NotConfigured("no key".into()).into();
        assert!(matches!(err, FoundationError::Config(_)));
    }
}
