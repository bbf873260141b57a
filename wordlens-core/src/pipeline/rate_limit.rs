//! Quota tracking from server-supplied rate-limit headers.

use std::collections::HashMap;
use std::time::{Duration, SystemTime};

use tracing::debug;

pub const HEADER_RATELIMIT_REMAINING: &str = "x-ratelimit-remaining";
pub const HEADER_RATELIMIT_RESET: &str = "x-ratelimit-reset";
pub const HEADER_RETRY_AFTER: &str = "retry-after";

/// Reset values at or above this are treated as epoch seconds; smaller ones
/// as a delta from now. Providers disagree on which convention they use.
const EPOCH_SECONDS_CUTOFF: u64 = 100_000_000;

/// Last known quota state for one service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RateLimitState {
    pub remaining: Option<u32>,
    pub reset_at: Option<SystemTime>,
}

/// Parses conventional quota headers and answers "when is it safe to retry".
/// Never blocks or sleeps; the retry policy consumes the answer.
pub struct RateLimitTracker {
    state: parking_lot::Mutex<RateLimitState>,
}

impl RateLimitTracker {
    pub fn new() -> Self {
        Self {
            state: parking_lot::Mutex::new(RateLimitState::default()),
        }
    }

    /// Update quota state from response headers. Missing or unparsable
    /// headers leave the prior state unchanged: a missing header does not
    /// imply unlimited quota.
    pub fn update_from_headers(&self, headers: &HashMap<String, String>) {
        let remaining = headers
            .get(HEADER_RATELIMIT_REMAINING)
            .and_then(|value| value.trim().parse::<u32>().ok());

        let reset_at = headers
            .get(HEADER_RATELIMIT_RESET)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(|seconds| {
                if seconds >= EPOCH_SECONDS_CUTOFF {
                    SystemTime::UNIX_EPOCH + Duration::from_secs(seconds)
                } else {
                    SystemTime::now() + Duration::from_secs(seconds)
                }
            });

        // Retry-After is the more explicit backpressure signal; let it win
        // over a reset header when both are present.
        let retry_after = headers
            .get(HEADER_RETRY_AFTER)
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(|seconds| SystemTime::now() + Duration::from_secs(seconds));

        if remaining.is_none() && reset_at.is_none() && retry_after.is_none() {
            return;
        }

        let mut state = self.state.lock();
        if let Some(remaining) = remaining {
            state.remaining = Some(remaining);
        }
        if let Some(reset_at) = retry_after.or(reset_at) {
            state.reset_at = Some(reset_at);
        }
        debug!(remaining = ?state.remaining, "rate limit state updated");
    }

    /// Earliest time at which a retry is known to be safe, when the server
    /// has declared one.
    pub fn earliest_retry_time(&self) -> Option<SystemTime> {
        self.state.lock().reset_at
    }

    /// Last reported remaining request count.
    pub fn remaining(&self) -> Option<u32> {
        self.state.lock().remaining
    }

    pub fn snapshot(&self) -> RateLimitState {
        *self.state.lock()
    }
}

impl Default for RateLimitTracker {
    fn default() -> Self {
        Self::new()
    }
}
