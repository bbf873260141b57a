//! End-to-end pipeline behavior against scripted transports: retry budgets,
//! circuit breaking, caching, rate-limit handling, and cancellation.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use tokio_util::sync::CancellationToken;

use wordlens_core::pipeline::{ApiOperation, CircuitState, RequestPipeline};
use wordlens_core::transport::{
    Transport, TransportError, TransportRequest, TransportResponse,
};
use wordlens_core::{ApiError, PhotoSearchClient, PipelineConfig};

/// One scripted attempt outcome.
#[derive(Clone)]
enum Scripted {
    Status(u16, &'static str),
    StatusWithHeaders(u16, &'static str, Vec<(&'static str, &'static str)>),
    Error(TransportErrorKind),
}

#[derive(Clone, Copy)]
enum TransportErrorKind {
    Timeout,
    Connect,
}

/// Transport that replays a scripted sequence of outcomes and counts calls.
/// Once the script runs dry it keeps repeating the last entry.
struct ScriptedTransport {
    script: parking_lot::Mutex<Vec<Scripted>>,
    calls: AtomicU32,
}

impl ScriptedTransport {
    fn new(script: Vec<Scripted>) -> Arc<Self> {
        Arc::new(Self {
            script: parking_lot::Mutex::new(script),
            calls: AtomicU32::new(0),
        })
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for ScriptedTransport {
    async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = {
            let mut script = self.script.lock();
            if script.len() > 1 {
                script.remove(0)
            } else {
                script.first().cloned().expect("script must not be empty")
            }
        };

        match step {
            Scripted::Status(status, body) => Ok(response(status, body, &[])),
            Scripted::StatusWithHeaders(status, body, headers) => {
                Ok(response(status, body, &headers))
            }
            Scripted::Error(TransportErrorKind::Timeout) => {
                Err(TransportError::Timeout("deadline elapsed".into()))
            }
            Scripted::Error(TransportErrorKind::Connect) => {
                Err(TransportError::Connect("connection refused".into()))
            }
        }
    }
}

/// Transport that hangs until cancelled, for withdrawal tests.
struct HangingTransport {
    calls: AtomicU32,
}

#[async_trait]
impl Transport for HangingTransport {
    async fn send(&self, _request: TransportRequest) -> Result<TransportResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(response(200, "{}", &[]))
    }
}

fn response(status: u16, body: &str, headers: &[(&str, &str)]) -> TransportResponse {
    let mut header_map = HashMap::new();
    for (name, value) in headers {
        header_map.insert((*name).to_owned(), (*value).to_owned());
    }
    TransportResponse {
        status,
        headers: header_map,
        body: Bytes::copy_from_slice(body.as_bytes()),
    }
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("wordlens_core=debug")
        .try_init();
}

fn fast_config() -> PipelineConfig {
    init_tracing();
    PipelineConfig {
        max_retries: 3,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
        ..PipelineConfig::default()
    }
}

fn operation() -> ApiOperation {
    ApiOperation::get("https://api.test/search").query("query", "apfel")
}

#[tokio::test]
async fn success_passes_through_untouched() {
    let transport = ScriptedTransport::new(vec![Scripted::Status(200, r#"{"ok": true}"#)]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &fast_config());

    let response = pipeline.execute(operation()).await.expect("success");
    assert_eq!(response.status, 200);
    assert!(!response.from_cache);
    assert_eq!(transport.calls(), 1);
    assert_eq!(pipeline.breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn all_retryable_failures_exhaust_after_exactly_four_attempts() {
    let transport = ScriptedTransport::new(vec![Scripted::Status(503, "unavailable")]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &fast_config());

    let error = pipeline.execute(operation()).await.expect_err("exhausted");
    match error {
        ApiError::Exhausted { attempts, source } => {
            assert_eq!(attempts, 4);
            assert!(matches!(*source, ApiError::Upstream { .. }));
        }
        other => panic!("expected Exhausted, got {other:?}"),
    }
    // 1 initial + 3 retries.
    assert_eq!(transport.calls(), 4);
}

#[tokio::test]
async fn transient_failure_then_success_recovers() {
    let transport = ScriptedTransport::new(vec![
        Scripted::Error(TransportErrorKind::Timeout),
        Scripted::Error(TransportErrorKind::Connect),
        Scripted::Status(200, r#"{"ok": true}"#),
    ]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &fast_config());

    let response = pipeline.execute(operation()).await.expect("recovered");
    assert_eq!(response.status, 200);
    assert_eq!(transport.calls(), 3);
    assert_eq!(pipeline.breaker().state(), CircuitState::Closed);
}

#[tokio::test]
async fn authentication_failure_is_never_retried() {
    let transport = ScriptedTransport::new(vec![Scripted::Status(
        401,
        r#"{"error": {"message": "invalid api key"}}"#,
    )]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &fast_config());

    let error = pipeline.execute(operation()).await.expect_err("fatal");
    assert!(matches!(error, ApiError::Authentication { .. }));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn validation_failure_is_never_retried() {
    let transport = ScriptedTransport::new(vec![Scripted::Status(
        422,
        r#"{"error": "unsupported language pair"}"#,
    )]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &fast_config());

    let error = pipeline.execute(operation()).await.expect_err("fatal");
    assert!(matches!(error, ApiError::InvalidRequest { .. }));
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn open_circuit_rejects_without_touching_the_transport() {
    let config = PipelineConfig {
        failure_threshold: 2,
        max_retries: 0,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
        ..PipelineConfig::default()
    };
    let transport = ScriptedTransport::new(vec![Scripted::Status(500, "boom")]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &config);

    for _ in 0..2 {
        let error = pipeline.execute(operation()).await.expect_err("failure");
        assert!(matches!(error, ApiError::Exhausted { .. }));
    }
    assert_eq!(transport.calls(), 2);
    assert_eq!(pipeline.breaker().state(), CircuitState::Open);

    let error = pipeline.execute(operation()).await.expect_err("rejected");
    assert!(matches!(error, ApiError::CircuitOpen { .. }));
    // The third call never reached the transport.
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn breaker_opening_mid_call_stops_the_retry_loop() {
    let config = PipelineConfig {
        failure_threshold: 2,
        max_retries: 5,
        base_delay_ms: 1,
        max_delay_ms: 5,
        jitter: false,
        ..PipelineConfig::default()
    };
    let transport = ScriptedTransport::new(vec![Scripted::Status(500, "boom")]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &config);

    let error = pipeline.execute(operation()).await.expect_err("failure");
    assert!(matches!(error, ApiError::Exhausted { .. }));
    // Two failures tripped the breaker; the remaining retry budget is moot.
    assert_eq!(transport.calls(), 2);
    assert_eq!(pipeline.breaker().state(), CircuitState::Open);
}

#[tokio::test]
async fn rate_limited_attempt_honors_retry_after_and_recovers() {
    let transport = ScriptedTransport::new(vec![
        Scripted::StatusWithHeaders(
            429,
            r#"{"error": {"message": "rate limit exceeded"}}"#,
            vec![("retry-after", "0"), ("x-ratelimit-remaining", "0")],
        ),
        Scripted::StatusWithHeaders(
            200,
            r#"{"ok": true}"#,
            vec![("x-ratelimit-remaining", "39")],
        ),
    ]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &fast_config());

    let response = pipeline.execute(operation()).await.expect("recovered");
    assert_eq!(response.status, 200);
    assert_eq!(transport.calls(), 2);
    // Tracker state reflects the latest response, success included.
    assert_eq!(pipeline.rate_limits().remaining(), Some(39));
}

#[tokio::test]
async fn cacheable_success_is_served_from_cache_afterwards() {
    let transport = ScriptedTransport::new(vec![Scripted::Status(200, r#"{"total": 7}"#)]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &fast_config());
    let cacheable = || operation().cacheable(true);

    let first = pipeline.execute(cacheable()).await.expect("network hit");
    assert!(!first.from_cache);

    let second = pipeline.execute(cacheable()).await.expect("cache hit");
    assert!(second.from_cache);
    assert_eq!(second.body, first.body);
    assert_eq!(transport.calls(), 1);

    let stats = pipeline.cache().stats();
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn expired_cache_entries_trigger_a_fresh_fetch() {
    let config = PipelineConfig {
        cache_ttl_secs: 0,
        ..fast_config()
    };
    let transport = ScriptedTransport::new(vec![Scripted::Status(200, r#"{"total": 7}"#)]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &config);
    let cacheable = || operation().cacheable(true);

    pipeline.execute(cacheable()).await.expect("first fetch");
    tokio::time::sleep(Duration::from_millis(20)).await;
    let second = pipeline.execute(cacheable()).await.expect("second fetch");

    assert!(!second.from_cache);
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn non_cacheable_operations_always_hit_the_network() {
    let transport = ScriptedTransport::new(vec![Scripted::Status(200, r#"{"ok": true}"#)]);
    let pipeline = RequestPipeline::new("test", transport.clone(), &fast_config());

    pipeline.execute(operation()).await.expect("first");
    pipeline.execute(operation()).await.expect("second");
    assert_eq!(transport.calls(), 2);
    assert!(pipeline.cache().is_empty());
}

#[tokio::test]
async fn failures_are_never_cached() {
    let transport = ScriptedTransport::new(vec![
        Scripted::Status(503, "unavailable"),
        Scripted::Status(200, r#"{"ok": true}"#),
    ]);
    let config = PipelineConfig {
        max_retries: 0,
        ..fast_config()
    };
    let pipeline = RequestPipeline::new("test", transport.clone(), &config);
    let cacheable = || operation().cacheable(true);

    pipeline.execute(cacheable()).await.expect_err("failure");
    assert!(pipeline.cache().is_empty());

    let recovered = pipeline.execute(cacheable()).await.expect("success");
    assert!(!recovered.from_cache);
}

#[tokio::test]
async fn cancellation_withdraws_without_recording_an_outcome() {
    let transport = Arc::new(HangingTransport {
        calls: AtomicU32::new(0),
    });
    let pipeline = Arc::new(RequestPipeline::new(
        "test",
        transport.clone(),
        &fast_config(),
    ));
    let cancel = CancellationToken::new();

    let before = pipeline.breaker().diagnostics();
    let task = {
        let pipeline = Arc::clone(&pipeline);
        let cancel = cancel.clone();
        tokio::spawn(async move {
            pipeline
                .execute_with_cancel(operation().cacheable(true), &cancel)
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(50)).await;
    cancel.cancel();
    let result = task.await.expect("join");

    assert!(matches!(result, Err(ApiError::Cancelled)));
    let after = pipeline.breaker().diagnostics();
    assert_eq!(before.failure_count, after.failure_count);
    assert_eq!(before.state, after.state);
    assert!(pipeline.cache().is_empty());
    assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn photo_client_parses_and_caches_search_results() {
    let body = r#"{
        "total": 2,
        "total_pages": 1,
        "results": [
            {
                "id": "abc123",
                "description": "a red apple",
                "width": 4000,
                "height": 3000,
                "urls": {
                    "regular": "https://images.test/abc123?w=1080",
                    "thumb": "https://images.test/abc123?w=200"
                }
            },
            {
                "id": "def456",
                "alt_description": "green pear on wood",
                "urls": {"regular": "https://images.test/def456?w=1080"}
            }
        ]
    }"#;
    let transport = ScriptedTransport::new(vec![Scripted::Status(200, Box::leak(
        body.to_owned().into_boxed_str(),
    ))]);
    let client = PhotoSearchClient::with_transport(
        Some("test-access-key".to_owned()),
        Some("https://photos.test".to_owned()),
        transport.clone(),
        Some(fast_config()),
    );

    let result = client.search_photos("apple", 1).await.expect("search");
    assert_eq!(result.total, 2);
    assert_eq!(result.results.len(), 2);
    assert_eq!(result.results[0].id, "abc123");
    assert_eq!(
        result.results[1].description.as_deref(),
        Some("green pear on wood")
    );

    // Same query resolves from cache; the transport is not called again.
    let again = client.search_photos("apple", 1).await.expect("cached");
    assert_eq!(again, result);
    assert_eq!(transport.calls(), 1);
}
