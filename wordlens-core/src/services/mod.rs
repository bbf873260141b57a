//! Service clients for the upstream APIs the assistant talks to.
//!
//! Each client supplies auth headers, a base URL, and operation-specific
//! payload building and parsing; execution is delegated to its own
//! [`crate::pipeline::RequestPipeline`]. Clients are constructed once by the
//! application's composition root and passed by reference to callers; there
//! are no ambient singletons.

pub mod chat;
pub mod photos;
pub mod translate;

pub use chat::{ChatClient, ChatCompletion, ChatMessage, TokenUsage};
pub use photos::{Photo, PhotoSearchClient, PhotoSearchResult};
pub use translate::{Translation, TranslationClient};

/// Resolve a base URL: explicit override, then environment variable, then
/// the built-in default. Trailing slashes are trimmed so path joining stays
/// uniform.
pub(crate) fn resolve_base_url(
    default_url: &str,
    explicit: Option<String>,
    env_var: &str,
) -> String {
    explicit
        .or_else(|| std::env::var(env_var).ok())
        .unwrap_or_else(|| default_url.to_owned())
        .trim_end_matches('/')
        .to_owned()
}

/// Resolve an API key from explicit configuration or the environment.
pub(crate) fn resolve_api_key(explicit: Option<String>, env_var: &str) -> Option<String> {
    explicit
        .filter(|key| !key.is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|key| !key.is_empty()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_base_url_wins_and_is_trimmed() {
        let url = resolve_base_url(
            "https://api.example.com",
            Some("https://proxy.internal/".to_owned()),
            "WORDLENS_TEST_UNSET_BASE_URL",
        );
        assert_eq!(url, "https://proxy.internal");
    }

    #[test]
    fn default_base_url_applies_when_nothing_is_set() {
        let url = resolve_base_url(
            "https://api.example.com",
            None,
            "WORDLENS_TEST_UNSET_BASE_URL",
        );
        assert_eq!(url, "https://api.example.com");
    }

    #[test]
    fn empty_api_key_counts_as_absent() {
        assert_eq!(
            resolve_api_key(Some(String::new()), "WORDLENS_TEST_UNSET_KEY"),
            None
        );
        assert_eq!(
            resolve_api_key(Some("k".to_owned()), "WORDLENS_TEST_UNSET_KEY"),
            Some("k".to_owned())
        );
    }
}
