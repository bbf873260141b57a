//! Three-state circuit breaker gating outbound attempts per service client.
//!
//! State is evaluated lazily on [`CircuitBreaker::allow_request`]; there are
//! no timers or background tasks, which makes the breaker safe to poll from
//! any concurrency model.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::time::{Duration, SystemTime};

use tracing::{debug, info, warn};

/// Circuit breaker states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CircuitState {
    /// Normal operation, requests flow through
    Closed = 0,
    /// Too many failures, requests blocked
    Open = 1,
    /// Testing recovery, requests allowed as probes
    HalfOpen = 2,
}

impl From<u8> for CircuitState {
    fn from(val: u8) -> Self {
        match val {
            1 => CircuitState::Open,
            2 => CircuitState::HalfOpen,
            _ => CircuitState::Closed,
        }
    }
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Copy)]
pub struct CircuitBreakerConfig {
    /// Consecutive failures before opening the circuit
    pub failure_threshold: u32,
    /// Successes in half-open required to close the circuit
    pub success_threshold: u32,
    /// Time the circuit stays open before a probe is allowed
    pub recovery_timeout: Duration,
}

impl Default for CircuitBreakerConfig {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            success_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
        }
    }
}

/// Per-client circuit breaker. One instance lives for the lifetime of its
/// service client and is mutated on every completed attempt.
pub struct CircuitBreaker {
    service: String,
    state: AtomicU8,
    failure_count: AtomicU32,
    half_open_successes: AtomicU32,
    last_failure_time: parking_lot::Mutex<Option<SystemTime>>,
    config: CircuitBreakerConfig,
}

impl CircuitBreaker {
    pub fn new(service: impl Into<String>, config: CircuitBreakerConfig) -> Self {
        Self {
            service: service.into(),
            state: AtomicU8::new(CircuitState::Closed as u8),
            failure_count: AtomicU32::new(0),
            half_open_successes: AtomicU32::new(0),
            last_failure_time: parking_lot::Mutex::new(None),
            config,
        }
    }

    /// Current circuit state.
    pub fn state(&self) -> CircuitState {
        self.state.load(Ordering::Acquire).into()
    }

    /// Whether a request may be attempted right now.
    ///
    /// In the open state this is the recovery check: once
    /// `recovery_timeout` has elapsed since the last failure, the breaker
    /// flips to half-open and the request proceeds as a probe. Until then
    /// the caller must fail fast without touching the network.
    pub fn allow_request(&self) -> bool {
        match self.state() {
            CircuitState::Closed => true,
            CircuitState::HalfOpen => true,
            CircuitState::Open => {
                let recovered = {
                    let last_failure = self.last_failure_time.lock();
                    match *last_failure {
                        Some(failure_time) => failure_time
                            .elapsed()
                            .map(|elapsed| elapsed >= self.config.recovery_timeout)
                            .unwrap_or(false),
                        // No failure recorded, allow the transition
                        None => true,
                    }
                };

                if recovered {
                    self.state
                        .store(CircuitState::HalfOpen as u8, Ordering::Release);
                    self.half_open_successes.store(0, Ordering::Relaxed);
                    info!(
                        service = %self.service,
                        "circuit half-open: probing recovery"
                    );
                    true
                } else {
                    debug!(service = %self.service, "circuit open, request rejected");
                    false
                }
            }
        }
    }

    /// Record a successful attempt.
    pub fn record_success(&self) {
        match self.state() {
            CircuitState::Closed => {
                // Decay the failure count instead of resetting it, so
                // isolated transient errors age out without letting a slow
                // trickle of failures accumulate forever.
                let _ = self
                    .failure_count
                    .fetch_update(Ordering::AcqRel, Ordering::Acquire, |count| {
                        Some(count.saturating_sub(1))
                    });
            }
            CircuitState::HalfOpen => {
                let successes = self.half_open_successes.fetch_add(1, Ordering::AcqRel) + 1;
                if successes >= self.config.success_threshold {
                    self.state
                        .store(CircuitState::Closed as u8, Ordering::Release);
                    self.failure_count.store(0, Ordering::Relaxed);
                    self.half_open_successes.store(0, Ordering::Relaxed);
                    *self.last_failure_time.lock() = None;
                    info!(service = %self.service, "circuit closed: service recovered");
                }
            }
            CircuitState::Open => {
                // A success can only arrive here from a request admitted
                // before the circuit opened; treat it as a probe result.
                self.state
                    .store(CircuitState::HalfOpen as u8, Ordering::Release);
                self.half_open_successes.store(1, Ordering::Relaxed);
            }
        }
    }

    /// Record a failed attempt.
    pub fn record_failure(&self) {
        *self.last_failure_time.lock() = Some(SystemTime::now());

        match self.state() {
            CircuitState::Closed => {
                let failures = self.failure_count.fetch_add(1, Ordering::AcqRel) + 1;
                if failures >= self.config.failure_threshold {
                    self.state.store(CircuitState::Open as u8, Ordering::Release);
                    warn!(
                        service = %self.service,
                        failures,
                        threshold = self.config.failure_threshold,
                        "circuit open: failure threshold exceeded"
                    );
                }
            }
            CircuitState::HalfOpen => {
                // One failure during probation re-opens the circuit.
                self.state.store(CircuitState::Open as u8, Ordering::Release);
                self.failure_count.fetch_add(1, Ordering::AcqRel);
                self.half_open_successes.store(0, Ordering::Relaxed);
                warn!(service = %self.service, "circuit reopened: probe failed");
            }
            CircuitState::Open => {
                self.failure_count.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    /// Reset the breaker to its initial closed state.
    pub fn reset(&self) {
        self.state
            .store(CircuitState::Closed as u8, Ordering::Release);
        self.failure_count.store(0, Ordering::Relaxed);
        self.half_open_successes.store(0, Ordering::Relaxed);
        *self.last_failure_time.lock() = None;
    }

    /// Snapshot of the breaker's internals for logging and tests.
    pub fn diagnostics(&self) -> CircuitBreakerDiagnostics {
        CircuitBreakerDiagnostics {
            state: self.state(),
            failure_count: self.failure_count.load(Ordering::Relaxed),
            half_open_successes: self.half_open_successes.load(Ordering::Relaxed),
            last_failure_time: *self.last_failure_time.lock(),
        }
    }
}

/// Diagnostic snapshot of circuit breaker state.
#[derive(Debug, Clone)]
pub struct CircuitBreakerDiagnostics {
    pub state: CircuitState,
    pub failure_count: u32,
    pub half_open_successes: u32,
    pub last_failure_time: Option<SystemTime>,
}
