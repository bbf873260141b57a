//! Resilient outbound API client core for wordlens.
//!
//! Every upstream call (photo search, chat completion, translation) runs
//! through one reusable [`pipeline::RequestPipeline`] that layers circuit
//! breaking, retry with backoff, response caching, and rate-limit awareness
//! around a pluggable [`transport::Transport`].
//!
//! The pieces compose bottom-up: a [`pipeline::CircuitBreaker`] gates
//! whether a call may be attempted at all, a [`cache::ResponseCache`] short-
//! circuits repeated idempotent reads, a [`pipeline::RetryPolicy`] decides
//! whether and when a failed attempt runs again, and a
//! [`pipeline::RateLimitTracker`] turns server quota headers into "earliest
//! safe retry" answers. Service clients in [`services`] own one pipeline
//! each and contribute auth, URLs, and payload handling.

pub mod cache;
pub mod config;
pub mod pipeline;
pub mod services;
pub mod transport;

pub use wordlens_commons::{ApiError, ErrorCategory, ErrorMetadata};

pub use cache::{CacheStats, CachedResponse, ResponseCache};
pub use config::PipelineConfig;
pub use pipeline::{
    ApiOperation, CircuitBreaker, CircuitBreakerConfig, CircuitState, RateLimitTracker,
    RequestPipeline, RetryConfig, RetryPolicy, ServiceResponse,
};
pub use services::{
    ChatClient, ChatCompletion, ChatMessage, Photo, PhotoSearchClient, PhotoSearchResult,
    TokenUsage, Translation, TranslationClient,
};
pub use transport::{
    HttpMethod, HttpTransport, Transport, TransportError, TransportRequest, TransportResponse,
};
