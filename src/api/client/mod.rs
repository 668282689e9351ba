//! Client module
//!
//! This module provides the envelope-aware HTTP client and the trait it is
//! consumed through.

mod helpers;
mod http;
mod trait_def;

// Re-export the trait and types
pub use helpers::SpreadFn;
pub use http::{
    ApiClient, BaseUrl, ClientError, ClientOptions, CACHE_BUST_PARAM, DEFAULT_BASE_URL_VAR,
    DEFAULT_TIMEOUT,
};
pub use trait_def::Api;
