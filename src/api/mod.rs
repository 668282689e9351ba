//! API module
//!
//! This module provides the client side of the envelope API: the shared HTTP
//! client, its error type and the `Api` trait.

pub mod client;

// Re-export commonly used types
pub use client::{Api, ApiClient, BaseUrl, ClientError, ClientOptions};
