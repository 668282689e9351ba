//! Client trait definition
//!
//! This module defines the `Api` trait that abstracts over the envelope client,
//! so consumers can take `&dyn Api` and tests can substitute their own backend.

use serde_json::Value;

use super::{ApiClient, ClientError};
use crate::models::RawResponse;

/// Trait defining the shorthand request surface
#[async_trait::async_trait]
pub trait Api: Send + Sync {
    /// Dispatch a request and return the raw, unvalidated response
    async fn api(&self, path: &str, method: &str, params: Value)
        -> Result<RawResponse, ClientError>;

    /// GET with query parameters; returns the envelope data
    async fn get(&self, path: &str, params: Value) -> Result<Value, ClientError>;

    /// POST a JSON body; returns the envelope data
    async fn post(&self, path: &str, data: Value) -> Result<Value, ClientError>;

    /// PUT a JSON body; returns the envelope data
    async fn put(&self, path: &str, data: Value) -> Result<Value, ClientError>;

    /// DELETE; returns the envelope data
    async fn delete(&self, path: &str) -> Result<Value, ClientError>;
}

#[async_trait::async_trait]
impl Api for ApiClient {
    async fn api(
        &self,
        path: &str,
        method: &str,
        params: Value,
    ) -> Result<RawResponse, ClientError> {
        ApiClient::api(self, path, method, params).await
    }

    async fn get(&self, path: &str, params: Value) -> Result<Value, ClientError> {
        ApiClient::get(self, path, &params).await
    }

    async fn post(&self, path: &str, data: Value) -> Result<Value, ClientError> {
        ApiClient::post(self, path, &data).await
    }

    async fn put(&self, path: &str, data: Value) -> Result<Value, ClientError> {
        ApiClient::put(self, path, &data).await
    }

    async fn delete(&self, path: &str) -> Result<Value, ClientError> {
        ApiClient::delete(self, path).await
    }
}
