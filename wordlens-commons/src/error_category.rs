//! Canonical error classification for outbound API calls.
//!
//! Errors are divided into **retryable** (transient) and **non-retryable**
//! (permanent) categories. Classification happens once per attempt, from the
//! HTTP status code where one is available and from message markers as a
//! last resort when the original type has been erased.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Common quota/rate-limit markers (pre-lowercased for efficient matching).
/// Some providers return quota failures as HTTP 400 with one of these in the
/// body instead of a proper 429.
pub const QUOTA_MARKERS: &[&str] = &[
    "insufficient_quota",
    "resource_exhausted",
    "quota",
    "rate limit",
    "rate_limit",
    "ratelimit",
    "too many requests",
    "daily call limit",
];

/// Canonical error category used for retry decisions and user-facing
/// messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    // === Retryable (transient) ===
    /// Network connectivity issue (connection reset, DNS failure, etc.)
    Network,
    /// Request timed out or deadline exceeded
    Timeout,
    /// Rate limit exceeded (HTTP 429, provider throttling)
    RateLimit,
    /// External service temporarily unavailable (HTTP 5xx)
    ServiceUnavailable,
    /// Circuit breaker is open for this service
    CircuitOpen,

    // === Non-retryable (permanent) ===
    /// Authentication or authorization failure (invalid API key, expired token)
    Authentication,
    /// Malformed request or schema validation failure
    InvalidRequest,
    /// Response arrived but could not be decoded
    Decode,
    /// Caller withdrew the request
    Cancelled,
    /// Catch-all for unclassified failures
    Unknown,
}

impl ErrorCategory {
    /// Whether this error category is safe to retry.
    #[inline]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Network
                | ErrorCategory::Timeout
                | ErrorCategory::RateLimit
                | ErrorCategory::ServiceUnavailable
                | ErrorCategory::CircuitOpen
        )
    }

    /// Whether this error represents a permanent, non-recoverable condition.
    #[inline]
    pub const fn is_permanent(&self) -> bool {
        matches!(
            self,
            ErrorCategory::Authentication
                | ErrorCategory::InvalidRequest
                | ErrorCategory::Decode
        )
    }

    /// Concise, user-facing label for this category.
    pub const fn user_label(&self) -> &'static str {
        match self {
            ErrorCategory::Network => "Network error",
            ErrorCategory::Timeout => "Request timed out",
            ErrorCategory::RateLimit => "Rate limit exceeded",
            ErrorCategory::ServiceUnavailable => "Service temporarily unavailable",
            ErrorCategory::CircuitOpen => "Service temporarily disabled",
            ErrorCategory::Authentication => "Authentication failed",
            ErrorCategory::InvalidRequest => "Invalid request",
            ErrorCategory::Decode => "Malformed response",
            ErrorCategory::Cancelled => "Operation cancelled",
            ErrorCategory::Unknown => "Request failed",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.user_label())
    }
}

/// Classify an HTTP status code, consulting the response body for quota
/// markers hidden inside 400 responses.
pub fn classify_status(status: u16, body: &str) -> ErrorCategory {
    match status {
        401 | 403 => ErrorCategory::Authentication,
        429 => ErrorCategory::RateLimit,
        400 if is_quota_message(body) => ErrorCategory::RateLimit,
        408 => ErrorCategory::Timeout,
        400..=499 => ErrorCategory::InvalidRequest,
        500..=599 => ErrorCategory::ServiceUnavailable,
        _ => ErrorCategory::Unknown,
    }
}

/// Whether an error body looks like a quota/rate-limit failure regardless of
/// its status code.
#[inline]
pub fn is_quota_message(body: &str) -> bool {
    let lower = body.to_lowercase();
    QUOTA_MARKERS.iter().any(|marker| lower.contains(marker))
}

/// Classify an error message string. Marker groups are checked in priority
/// order so that overlapping patterns resolve deterministically (e.g.
/// "429 too many requests" is a rate limit, not a generic network failure).
pub fn classify_error_message(msg: &str) -> ErrorCategory {
    let msg = msg.to_lowercase();

    if contains_any(
        &msg,
        &[
            "invalid api key",
            "authentication failed",
            "unauthorized",
            "401",
            "invalid credentials",
            "forbidden",
            "403",
        ],
    ) {
        return ErrorCategory::Authentication;
    }

    if contains_any(&msg, &["cancelled", "canceled", "interrupted"]) {
        return ErrorCategory::Cancelled;
    }

    if contains_any(&msg, &["circuit breaker", "circuit open"]) {
        return ErrorCategory::CircuitOpen;
    }

    if contains_any(&msg, &["rate limit", "too many requests", "429", "throttl", "quota"]) {
        return ErrorCategory::RateLimit;
    }

    if contains_any(&msg, &["timeout", "timed out", "deadline exceeded"]) {
        return ErrorCategory::Timeout;
    }

    if contains_any(
        &msg,
        &[
            "service unavailable",
            "internal server error",
            "bad gateway",
            "gateway timeout",
            "overloaded",
            "500",
            "502",
            "503",
            "504",
        ],
    ) {
        return ErrorCategory::ServiceUnavailable;
    }

    if contains_any(
        &msg,
        &[
            "network",
            "connection reset",
            "connection refused",
            "broken pipe",
            "dns",
            "name resolution",
            "tls handshake",
            "socket hang up",
            "econnreset",
            "etimedout",
        ],
    ) {
        return ErrorCategory::Network;
    }

    if contains_any(
        &msg,
        &[
            "invalid argument",
            "invalid request",
            "malformed",
            "missing required",
            "schema validation",
            "unknown field",
        ],
    ) {
        return ErrorCategory::InvalidRequest;
    }

    ErrorCategory::Unknown
}

#[inline]
fn contains_any(message: &str, markers: &[&str]) -> bool {
    markers.iter().any(|marker| message.contains(marker))
}
