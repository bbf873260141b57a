//! Shared contracts for the wordlens client core. The goal is to keep the
//! service adapters in `wordlens-core` decoupled from presentation concerns
//! while sharing one error taxonomy and one way of constructing HTTP
//! clients.

pub mod error_category;
pub mod errors;
pub mod http;

pub use error_category::{classify_error_message, classify_status, ErrorCategory};
pub use errors::{ApiError, ErrorMetadata};
