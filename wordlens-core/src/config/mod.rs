//! Pipeline configuration.
//!
//! The configuration surface is a flat struct with per-field `serde`
//! defaults so partial config files deserialize into something usable, and a
//! `validate()` pass that runs once at construction. Durations are stored as
//! plain integers (milliseconds or seconds) and converted at the point the
//! runtime components are built.

pub mod constants;

use std::time::Duration;

use anyhow::{ensure, Result};
use serde::{Deserialize, Serialize};

use crate::pipeline::{CircuitBreakerConfig, RetryConfig};
use constants::defaults;

/// Recognized options for one service client's pipeline, with sane defaults
/// for every field.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct PipelineConfig {
    /// Retries after the initial attempt.
    #[serde(default = "PipelineConfig::default_max_retries")]
    pub max_retries: u32,
    /// First backoff delay, in milliseconds.
    #[serde(default = "PipelineConfig::default_base_delay_ms")]
    pub base_delay_ms: u64,
    /// Backoff ceiling, in milliseconds.
    #[serde(default = "PipelineConfig::default_max_delay_ms")]
    pub max_delay_ms: u64,
    /// Growth factor between consecutive delays.
    #[serde(default = "PipelineConfig::default_exponential_base")]
    pub exponential_base: f64,
    /// Randomize each delay into `[0.5, 1.0]` of its nominal value.
    #[serde(default = "PipelineConfig::default_jitter")]
    pub jitter: bool,

    /// Consecutive failures before the circuit opens.
    #[serde(default = "PipelineConfig::default_failure_threshold")]
    pub failure_threshold: u32,
    /// Seconds the circuit stays open before a probe is allowed.
    #[serde(default = "PipelineConfig::default_recovery_timeout_secs")]
    pub recovery_timeout_secs: u64,
    /// Successful probes required to close a half-open circuit.
    #[serde(default = "PipelineConfig::default_success_threshold")]
    pub success_threshold: u32,

    /// Seconds a cached response stays valid.
    #[serde(default = "PipelineConfig::default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Maximum number of cached responses per client.
    #[serde(default = "PipelineConfig::default_cache_capacity")]
    pub cache_capacity: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_retries: Self::default_max_retries(),
            base_delay_ms: Self::default_base_delay_ms(),
            max_delay_ms: Self::default_max_delay_ms(),
            exponential_base: Self::default_exponential_base(),
            jitter: Self::default_jitter(),
            failure_threshold: Self::default_failure_threshold(),
            recovery_timeout_secs: Self::default_recovery_timeout_secs(),
            success_threshold: Self::default_success_threshold(),
            cache_ttl_secs: Self::default_cache_ttl_secs(),
            cache_capacity: Self::default_cache_capacity(),
        }
    }
}

impl PipelineConfig {
    const fn default_max_retries() -> u32 {
        defaults::MAX_RETRIES
    }

    const fn default_base_delay_ms() -> u64 {
        defaults::BASE_DELAY_MS
    }

    const fn default_max_delay_ms() -> u64 {
        defaults::MAX_DELAY_MS
    }

    const fn default_exponential_base() -> f64 {
        defaults::EXPONENTIAL_BASE
    }

    const fn default_jitter() -> bool {
        defaults::JITTER
    }

    const fn default_failure_threshold() -> u32 {
        defaults::FAILURE_THRESHOLD
    }

    const fn default_recovery_timeout_secs() -> u64 {
        defaults::RECOVERY_TIMEOUT_SECS
    }

    const fn default_success_threshold() -> u32 {
        defaults::SUCCESS_THRESHOLD
    }

    const fn default_cache_ttl_secs() -> u64 {
        defaults::CACHE_TTL_SECS
    }

    const fn default_cache_capacity() -> usize {
        defaults::CACHE_CAPACITY
    }

    /// Reject configurations that would disable the pipeline's safety
    /// machinery in surprising ways.
    pub fn validate(&self) -> Result<()> {
        ensure!(
            self.failure_threshold > 0,
            "failure_threshold must be at least 1"
        );
        ensure!(
            self.success_threshold > 0,
            "success_threshold must be at least 1"
        );
        ensure!(self.cache_capacity > 0, "cache_capacity must be at least 1");
        ensure!(
            self.exponential_base >= 1.0,
            "exponential_base must be at least 1.0"
        );
        ensure!(
            self.base_delay_ms <= self.max_delay_ms,
            "base_delay_ms must not exceed max_delay_ms"
        );
        Ok(())
    }

    pub fn retry(&self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries,
            base_delay: Duration::from_millis(self.base_delay_ms),
            max_delay: Duration::from_millis(self.max_delay_ms),
            exponential_base: self.exponential_base,
            jitter: self.jitter,
        }
    }

    pub fn breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            success_threshold: self.success_threshold,
            recovery_timeout: Duration::from_secs(self.recovery_timeout_secs),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    pub fn cache_capacity(&self) -> usize {
        self.cache_capacity
    }
}
