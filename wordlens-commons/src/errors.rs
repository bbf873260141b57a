//! Typed errors for outbound API calls.
//!
//! Retryability is a property of the error value, inspected by policy code,
//! rather than something encoded in which exception type a call site caught.
//! Every variant that originates from an HTTP exchange can carry
//! [`ErrorMetadata`] describing the upstream response.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error_category::ErrorCategory;

/// Context captured from a failed upstream exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorMetadata {
    /// Logical service name (e.g., "photos", "chat", "translate").
    pub service: Option<String>,
    /// HTTP status code, when the failure came from a response.
    pub status: Option<u16>,
    /// Provider-specific error code, when one was present in the body.
    pub code: Option<String>,
    /// Server-declared wait before retrying, in seconds.
    pub retry_after_secs: Option<u64>,
    /// Snippet of the response body for diagnostics.
    pub body: Option<String>,
}

impl ErrorMetadata {
    pub fn new(
        service: impl Into<String>,
        status: Option<u16>,
        code: Option<String>,
        retry_after_secs: Option<u64>,
        body: Option<String>,
    ) -> Box<Self> {
        Box::new(Self {
            service: Some(service.into()),
            status,
            code,
            retry_after_secs,
            body,
        })
    }
}

/// Error taxonomy for the request pipeline and the service clients built on
/// top of it.
///
/// Fatal variants (`Authentication`, `InvalidRequest`, `Decode`) are never
/// retried: retrying cannot succeed without caller intervention. Retryable
/// variants (`RateLimited`, `Upstream`, `Network`, `Timeout`) are retried per
/// policy and surface only after exhaustion, wrapped in `Exhausted`.
/// `CircuitOpen` is a fast failure produced without any network attempt.
#[derive(Debug, Clone, thiserror::Error, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ApiError {
    #[error("authentication failed: {message}")]
    Authentication {
        message: String,
        metadata: Option<Box<ErrorMetadata>>,
    },
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        metadata: Option<Box<ErrorMetadata>>,
    },
    #[error("rate limit exceeded")]
    RateLimited {
        metadata: Option<Box<ErrorMetadata>>,
    },
    #[error("upstream error: {message}")]
    Upstream {
        message: String,
        metadata: Option<Box<ErrorMetadata>>,
    },
    #[error("network error: {message}")]
    Network {
        message: String,
        metadata: Option<Box<ErrorMetadata>>,
    },
    #[error("request timed out: {message}")]
    Timeout {
        message: String,
        metadata: Option<Box<ErrorMetadata>>,
    },
    #[error("failed to decode response: {message}")]
    Decode {
        message: String,
        metadata: Option<Box<ErrorMetadata>>,
    },
    #[error("circuit open for service '{service}'")]
    CircuitOpen { service: String },
    #[error("retries exhausted after {attempts} attempts")]
    Exhausted {
        attempts: u32,
        source: Box<ApiError>,
    },
    #[error("request cancelled")]
    Cancelled,
}

impl ApiError {
    /// Whether a retry of the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ApiError::RateLimited { .. }
                | ApiError::Upstream { .. }
                | ApiError::Network { .. }
                | ApiError::Timeout { .. }
        )
    }

    /// Whether the failure cannot be fixed by retrying (bad credentials,
    /// malformed request, undecodable response).
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            ApiError::Authentication { .. }
                | ApiError::InvalidRequest { .. }
                | ApiError::Decode { .. }
        )
    }

    /// Upstream response context, when the error carries any.
    pub fn metadata(&self) -> Option<&ErrorMetadata> {
        match self {
            ApiError::Authentication { metadata, .. }
            | ApiError::InvalidRequest { metadata, .. }
            | ApiError::RateLimited { metadata }
            | ApiError::Upstream { metadata, .. }
            | ApiError::Network { metadata, .. }
            | ApiError::Timeout { metadata, .. }
            | ApiError::Decode { metadata, .. } => metadata.as_deref(),
            ApiError::Exhausted { source, .. } => source.metadata(),
            ApiError::CircuitOpen { .. } | ApiError::Cancelled => None,
        }
    }

    /// Server-declared wait before the next attempt, when one was supplied.
    pub fn retry_after(&self) -> Option<Duration> {
        self.metadata()
            .and_then(|meta| meta.retry_after_secs)
            .map(Duration::from_secs)
    }

    /// Canonical category for this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            ApiError::Authentication { .. } => ErrorCategory::Authentication,
            ApiError::InvalidRequest { .. } => ErrorCategory::InvalidRequest,
            ApiError::RateLimited { .. } => ErrorCategory::RateLimit,
            ApiError::Upstream { .. } => ErrorCategory::ServiceUnavailable,
            ApiError::Network { .. } => ErrorCategory::Network,
            ApiError::Timeout { .. } => ErrorCategory::Timeout,
            ApiError::Decode { .. } => ErrorCategory::Decode,
            ApiError::CircuitOpen { .. } => ErrorCategory::CircuitOpen,
            ApiError::Exhausted { source, .. } => source.category(),
            ApiError::Cancelled => ErrorCategory::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rate_limited(retry_after_secs: Option<u64>) -> ApiError {
        ApiError::RateLimited {
            metadata: Some(ErrorMetadata::new(
                "photos",
                Some(429),
                None,
                retry_after_secs,
                None,
            )),
        }
    }

    #[test]
    fn retryable_variants() {
        assert!(rate_limited(None).is_retryable());
        assert!(
            ApiError::Upstream {
                message: "502".into(),
                metadata: None
            }
            .is_retryable()
        );
        assert!(
            ApiError::Network {
                message: "connection reset".into(),
                metadata: None
            }
            .is_retryable()
        );
        assert!(
            ApiError::Timeout {
                message: "deadline".into(),
                metadata: None
            }
            .is_retryable()
        );
    }

    #[test]
    fn fatal_variants_are_not_retryable() {
        let auth = ApiError::Authentication {
            message: "bad key".into(),
            metadata: None,
        };
        assert!(auth.is_fatal());
        assert!(!auth.is_retryable());

        let invalid = ApiError::InvalidRequest {
            message: "missing field".into(),
            metadata: None,
        };
        assert!(invalid.is_fatal());
        assert!(!invalid.is_retryable());
    }

    #[test]
    fn circuit_open_is_neither_fatal_nor_retryable() {
        let err = ApiError::CircuitOpen {
            service: "chat".into(),
        };
        assert!(!err.is_fatal());
        assert!(!err.is_retryable());
    }

    #[test]
    fn retry_after_comes_from_metadata() {
        assert_eq!(
            rate_limited(Some(12)).retry_after(),
            Some(Duration::from_secs(12))
        );
        assert_eq!(rate_limited(None).retry_after(), None);
    }

    #[test]
    fn exhausted_delegates_to_its_cause() {
        let err = ApiError::Exhausted {
            attempts: 4,
            source: Box::new(rate_limited(Some(3))),
        };
        assert_eq!(err.category(), ErrorCategory::RateLimit);
        assert_eq!(err.retry_after(), Some(Duration::from_secs(3)));
    }
}
