//! HTTP client construction helpers shared by every service client.

use std::time::Duration;

use reqwest::{Client, ClientBuilder};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const LONG_TIMEOUT: Duration = Duration::from_secs(120);

pub const USER_AGENT: &str = concat!("wordlens/", env!("CARGO_PKG_VERSION"));

/// Create a default HTTP client with standard timeouts.
pub fn create_default_client() -> Client {
    create_client_with_timeout(DEFAULT_TIMEOUT)
}

/// Create an HTTP client with a custom request timeout.
pub fn create_client_with_timeout(timeout: Duration) -> Client {
    ClientBuilder::new()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .unwrap_or_else(|_| Client::new())
}
