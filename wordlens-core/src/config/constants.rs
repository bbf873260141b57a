//! Grouped constants for the service clients and the pipeline defaults.

/// Upstream base URLs. Each can be overridden per client via configuration
/// or the matching environment variable in [`env_vars`].
pub mod urls {
    pub const PHOTO_API_BASE: &str = "https://api.unsplash.com";
    pub const CHAT_API_BASE: &str = "https://api.openai.com/v1";
    pub const TRANSLATE_API_BASE: &str = "https://libretranslate.com";
}

/// Environment variables consulted when explicit configuration is absent.
pub mod env_vars {
    pub const PHOTO_ACCESS_KEY: &str = "UNSPLASH_ACCESS_KEY";
    pub const CHAT_API_KEY: &str = "OPENAI_API_KEY";
    pub const TRANSLATE_API_KEY: &str = "LIBRETRANSLATE_API_KEY";

    pub const PHOTO_BASE_URL: &str = "WORDLENS_PHOTO_BASE_URL";
    pub const CHAT_BASE_URL: &str = "WORDLENS_CHAT_BASE_URL";
    pub const TRANSLATE_BASE_URL: &str = "WORDLENS_TRANSLATE_BASE_URL";
}

/// Pipeline defaults. These back the `serde` defaults on
/// [`crate::config::PipelineConfig`].
pub mod defaults {
    pub const MAX_RETRIES: u32 = 3;
    pub const BASE_DELAY_MS: u64 = 500;
    pub const MAX_DELAY_MS: u64 = 30_000;
    pub const EXPONENTIAL_BASE: f64 = 2.0;
    pub const JITTER: bool = true;

    pub const FAILURE_THRESHOLD: u32 = 5;
    pub const RECOVERY_TIMEOUT_SECS: u64 = 60;
    pub const SUCCESS_THRESHOLD: u32 = 2;

    pub const CACHE_TTL_SECS: u64 = 300;
    pub const CACHE_CAPACITY: usize = 128;
}

/// Default models and page sizes used by the service clients.
pub mod services {
    pub const CHAT_DEFAULT_MODEL: &str = "gpt-4o-mini";
    pub const CHAT_MAX_TOKENS: u32 = 512;
    pub const PHOTOS_PER_PAGE: u32 = 10;
    pub const PHOTOS_API_VERSION: &str = "v1";
}
