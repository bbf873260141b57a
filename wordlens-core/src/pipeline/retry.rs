//! Retry decisions and backoff computation.

use std::time::{Duration, SystemTime};

use rand::Rng as _;

use wordlens_commons::ApiError;

/// Immutable retry settings.
#[derive(Debug, Clone, Copy)]
pub struct RetryConfig {
    /// Retries after the initial attempt.
    pub max_retries: u32,
    /// First backoff delay.
    pub base_delay: Duration,
    /// Backoff ceiling.
    pub max_delay: Duration,
    /// Growth factor between consecutive delays.
    pub exponential_base: f64,
    /// Randomize each delay into `[0.5, 1.0]` of its nominal value.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

/// Decides whether and when a failed attempt is retried.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    config: RetryConfig,
}

impl RetryPolicy {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn max_retries(&self) -> u32 {
        self.config.max_retries
    }

    /// Fatal errors are never retried, regardless of the attempt budget.
    pub fn should_retry(&self, error: &ApiError, attempt: u32) -> bool {
        error.is_retryable() && attempt < self.config.max_retries
    }

    /// Delay before retrying attempt number `attempt` (0-based).
    ///
    /// Rate-limit errors with a server-declared reset wait out the server's
    /// stated quota window instead of the local exponential guess. Everything
    /// else backs off as `base * exponential_base^attempt`, capped at
    /// `max_delay`, jittered into `[0.5, 1.0]` of the nominal value.
    pub fn delay_before(
        &self,
        error: &ApiError,
        attempt: u32,
        earliest_retry: Option<SystemTime>,
    ) -> Duration {
        if matches!(error, ApiError::RateLimited { .. }) {
            if let Some(delay) = error.retry_after() {
                return delay;
            }
            if let Some(reset_at) = earliest_retry {
                return reset_at
                    .duration_since(SystemTime::now())
                    .unwrap_or(Duration::ZERO);
            }
        }

        let exponent = attempt.min(32) as i32;
        let nominal_ms =
            self.config.base_delay.as_millis() as f64 * self.config.exponential_base.powi(exponent);
        let capped_ms = nominal_ms.min(self.config.max_delay.as_millis() as f64);

        let final_ms = if self.config.jitter {
            capped_ms * rand::rng().random_range(0.5..=1.0)
        } else {
            capped_ms
        };

        Duration::from_millis(final_ms as u64)
    }
}
