//! One-shot classification of an attempt's outcome.
//!
//! Classification happens exactly once per attempt and drives both the
//! circuit breaker and the retry policy. Authentication failures and
//! malformed requests are fatal (retrying is wasted work); quota responses
//! are retryable with a server-driven delay; 5xx and transport failures are
//! retryable with exponential backoff.

use serde_json::Value;

use wordlens_commons::error_category::ErrorCategory;
use wordlens_commons::{classify_status, ApiError, ErrorMetadata};

use crate::transport::{TransportError, TransportResponse};

const BODY_SNIPPET_LEN: usize = 512;

/// Classify a non-success HTTP response into a typed error.
pub fn classify_response(service: &str, response: &TransportResponse) -> ApiError {
    let status = response.status;
    let body = response.body_text();
    let message = parse_error_message(&body);
    let retry_after_secs = response
        .header("retry-after")
        .and_then(|value| value.trim().parse::<u64>().ok());

    let metadata = ErrorMetadata::new(
        service,
        Some(status),
        parse_error_code(&body),
        retry_after_secs,
        Some(snippet(&body)),
    );

    match classify_status(status, &body) {
        ErrorCategory::Authentication => ApiError::Authentication {
            message,
            metadata: Some(metadata),
        },
        ErrorCategory::RateLimit => ApiError::RateLimited {
            metadata: Some(metadata),
        },
        ErrorCategory::Timeout | ErrorCategory::ServiceUnavailable => ApiError::Upstream {
            message: format!("HTTP {}: {}", status, message),
            metadata: Some(metadata),
        },
        ErrorCategory::InvalidRequest => ApiError::InvalidRequest {
            message,
            metadata: Some(metadata),
        },
        _ => ApiError::Upstream {
            message: format!("HTTP {}: {}", status, message),
            metadata: Some(metadata),
        },
    }
}

/// Classify a transport-level failure.
pub fn classify_transport_error(service: &str, error: &TransportError) -> ApiError {
    let metadata = Some(ErrorMetadata::new(service, None, None, None, None));
    match error {
        TransportError::Timeout(message) => ApiError::Timeout {
            message: message.clone(),
            metadata,
        },
        TransportError::Connect(message) | TransportError::Io(message) => ApiError::Network {
            message: message.clone(),
            metadata,
        },
    }
}

/// Extract a meaningful message from a provider error body.
///
/// Handles the two common shapes:
/// - `{"error": {"message": "..."}}`
/// - `{"error": "..."}`
///
/// Falls back to the raw body when JSON parsing fails.
pub fn parse_error_message(body: &str) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body) {
        if let Some(message) = json
            .get("error")
            .and_then(|error| error.get("message"))
            .and_then(|message| message.as_str())
        {
            return message.to_owned();
        }
        if let Some(message) = json.get("error").and_then(|error| error.as_str()) {
            return message.to_owned();
        }
    }
    snippet(body)
}

fn parse_error_code(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()?
        .get("error")?
        .get("code")
        .and_then(|code| match code {
            Value::String(code) => Some(code.clone()),
            Value::Number(code) => Some(code.to_string()),
            _ => None,
        })
}

fn snippet(body: &str) -> String {
    if body.len() <= BODY_SNIPPET_LEN {
        body.to_owned()
    } else {
        let mut end = BODY_SNIPPET_LEN;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        body[..end].to_owned()
    }
}
