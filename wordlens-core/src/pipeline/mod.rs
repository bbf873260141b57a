//! The request pipeline: one logical operation wrapped with circuit
//! breaking, response caching, retries, and rate-limit awareness.
//!
//! Control flow per call:
//! admit → (cache hit | attempt loop { send → classify → record → backoff })
//! → success, fatal error, exhaustion, or fast circuit-open rejection.
//!
//! The pipeline is sequential logic with a single suspension point (the
//! retry delay); no lock is held across an `.await`.

pub mod circuit_breaker;
pub mod classify;
pub mod rate_limit;
pub mod retry;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use serde_json::Value;
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use wordlens_commons::ApiError;

use crate::cache::{request_cache_key, CachedResponse, ResponseCache};
use crate::config::PipelineConfig;
use crate::transport::{HttpMethod, Transport, TransportRequest};

pub use circuit_breaker::{
    CircuitBreaker, CircuitBreakerConfig, CircuitBreakerDiagnostics, CircuitState,
};
pub use rate_limit::{RateLimitState, RateLimitTracker};
pub use retry::{RetryConfig, RetryPolicy};

/// One logical API operation, described by the service client that owns it.
#[derive(Debug, Clone)]
pub struct ApiOperation {
    pub method: HttpMethod,
    pub url: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
    /// Only idempotent, side-effect-free operations may be cached.
    pub cacheable: bool,
    pub timeout: Option<Duration>,
}

impl ApiOperation {
    pub fn get(url: impl Into<String>) -> Self {
        Self {
            method: HttpMethod::Get,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
            cacheable: false,
            timeout: None,
        }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            method: HttpMethod::Post,
            url: url.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: Some(body),
            cacheable: false,
            timeout: None,
        }
    }

    pub fn query(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((name.into(), value.to_string()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn cacheable(mut self, cacheable: bool) -> Self {
        self.cacheable = cacheable;
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn cache_key(&self) -> String {
        request_cache_key(
            self.method.as_str(),
            &self.url,
            &self.query,
            self.body.as_ref(),
        )
    }
}

/// Successful pipeline result.
#[derive(Debug, Clone)]
pub struct ServiceResponse {
    pub status: u16,
    pub headers: HashMap<String, String>,
    pub body: Bytes,
    pub from_cache: bool,
}

impl ServiceResponse {
    pub fn json(&self) -> Result<Value, ApiError> {
        serde_json::from_slice(&self.body).map_err(|error| ApiError::Decode {
            message: error.to_string(),
            metadata: None,
        })
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Orchestrates circuit breaker, cache, retry policy, and rate-limit
/// tracking around a transport. One pipeline per service client; the
/// breaker, cache, and tracker are exclusively owned and shared across all
/// concurrent invocations on the same client.
pub struct RequestPipeline {
    service: String,
    transport: Arc<dyn Transport>,
    breaker: CircuitBreaker,
    cache: ResponseCache,
    rate_limits: RateLimitTracker,
    retry: RetryPolicy,
}

impl RequestPipeline {
    pub fn new(
        service: impl Into<String>,
        transport: Arc<dyn Transport>,
        config: &PipelineConfig,
    ) -> Self {
        let service = service.into();
        let config = match config.validate() {
            Ok(()) => config.clone(),
            Err(error) => {
                warn!(
                    service = %service,
                    %error,
                    "invalid pipeline config, falling back to defaults"
                );
                PipelineConfig::default()
            }
        };
        Self {
            breaker: CircuitBreaker::new(service.clone(), config.breaker()),
            cache: ResponseCache::new(config.cache_capacity(), config.cache_ttl()),
            rate_limits: RateLimitTracker::new(),
            retry: RetryPolicy::new(config.retry()),
            transport,
            service,
        }
    }

    pub fn service(&self) -> &str {
        &self.service
    }

    pub fn breaker(&self) -> &CircuitBreaker {
        &self.breaker
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    pub fn rate_limits(&self) -> &RateLimitTracker {
        &self.rate_limits
    }

    /// Execute one operation to completion.
    pub async fn execute(&self, operation: ApiOperation) -> Result<ServiceResponse, ApiError> {
        self.execute_with_cancel(operation, &CancellationToken::new())
            .await
    }

    /// Execute one operation, honoring a cancellation token.
    ///
    /// A cancelled call is withdrawn, not failed: it does not touch the
    /// circuit breaker counters and nothing is cached.
    pub async fn execute_with_cancel(
        &self,
        operation: ApiOperation,
        cancel: &CancellationToken,
    ) -> Result<ServiceResponse, ApiError> {
        if !self.breaker.allow_request() {
            return Err(ApiError::CircuitOpen {
                service: self.service.clone(),
            });
        }

        let cache_key = operation.cacheable.then(|| operation.cache_key());
        if let Some(key) = &cache_key {
            if let Some(cached) = self.cache.get(key) {
                debug!(service = %self.service, "cache hit, skipping network");
                return Ok(ServiceResponse {
                    status: 200,
                    headers: HashMap::new(),
                    body: cached.body,
                    from_cache: true,
                });
            }
        }

        let mut attempt: u32 = 0;
        loop {
            let request = self.build_request(&operation);
            let outcome = tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                outcome = self.transport.send(request) => outcome,
            };

            let error = match outcome {
                Ok(response) => {
                    // Quota headers are consulted even on failures, so the
                    // tracker update happens before the status check.
                    self.rate_limits.update_from_headers(&response.headers);

                    if (200..300).contains(&response.status) {
                        self.breaker.record_success();
                        if let Some(key) = &cache_key {
                            self.cache.put(
                                key.clone(),
                                CachedResponse {
                                    body: response.body.clone(),
                                    content_type: response
                                        .header("content-type")
                                        .map(str::to_owned),
                                },
                            );
                        }
                        return Ok(ServiceResponse {
                            status: response.status,
                            headers: response.headers,
                            body: response.body,
                            from_cache: false,
                        });
                    }
                    classify::classify_response(&self.service, &response)
                }
                Err(transport_error) => {
                    classify::classify_transport_error(&self.service, &transport_error)
                }
            };

            self.breaker.record_failure();

            if error.is_fatal() {
                warn!(
                    service = %self.service,
                    error = %error,
                    "fatal error, not retrying"
                );
                return Err(error);
            }

            let breaker_open = self.breaker.state() == CircuitState::Open;
            if breaker_open || !self.retry.should_retry(&error, attempt) {
                return Err(ApiError::Exhausted {
                    attempts: attempt + 1,
                    source: Box::new(error),
                });
            }

            let delay =
                self.retry
                    .delay_before(&error, attempt, self.rate_limits.earliest_retry_time());
            debug!(
                service = %self.service,
                attempt,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "retrying after backoff"
            );

            tokio::select! {
                _ = cancel.cancelled() => return Err(ApiError::Cancelled),
                _ = sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    fn build_request(&self, operation: &ApiOperation) -> TransportRequest {
        TransportRequest {
            method: operation.method,
            url: operation.url.clone(),
            query: operation.query.clone(),
            headers: operation.headers.clone(),
            body: operation.body.clone(),
            timeout: operation.timeout,
        }
    }
}
