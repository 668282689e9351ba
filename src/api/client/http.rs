//! HTTP client implementation
//!
//! `ApiClient` wraps one shared `reqwest::Client`, keeps a mutable set of
//! default headers, and validates the `{status, message, data}` envelope
//! returned by the backend.

use std::env;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use reqwest::{Client as ReqwestClient, Error as ReqwestError, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::models::{
    query_pairs, HeaderEntry, Method, PendingRequest, RawResponse, SUCCESS_STATUS,
    UNAUTHORIZED_STATUS,
};

/// Environment variable the base URL is read from by default
pub const DEFAULT_BASE_URL_VAR: &str = "API_URL";

/// Request timeout applied when the caller does not supply one
pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(30_000);

/// Name of the cache-busting query parameter
pub const CACHE_BUST_PARAM: &str = "_t";

/// Client errors
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The call was malformed and never reached the network
    #[error("{0}")]
    Usage(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] ReqwestError),

    #[error("HTTP status {status}: {body}")]
    Status { status: StatusCode, body: String },

    /// The backend answered with envelope status 401
    #[error("Unauthorized")]
    Unauthorized,

    /// The backend answered with an envelope status other than 200
    #[error("{0}")]
    Api(String),

    #[error("Failed to encode request parameters: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("Failed to decode response data: {0}")]
    Decode(#[source] serde_json::Error),
}

/// Where the base URL of every request comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BaseUrl {
    /// Read the named environment variable on every call
    Env(String),
    /// Use a fixed URL
    Fixed(String),
}

impl BaseUrl {
    fn resolve(&self) -> Result<String, ClientError> {
        let url = match self {
            BaseUrl::Env(var) => env::var(var).map_err(|_| {
                ClientError::Config(format!("environment variable {} is not set", var))
            })?,
            BaseUrl::Fixed(url) => url.clone(),
        };
        Ok(url.trim_end_matches('/').to_string())
    }
}

impl Default for BaseUrl {
    fn default() -> Self {
        BaseUrl::Env(DEFAULT_BASE_URL_VAR.to_string())
    }
}

/// Transport configuration.
///
/// Build it with struct-update syntax over `Default` or with the setters;
/// anything left unset keeps its default.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientOptions {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    /// Headers sent with every request until overwritten or reset
    pub headers: Vec<HeaderEntry>,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            user_agent: None,
            headers: Vec::new(),
        }
    }
}

impl ClientOptions {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.user_agent = Some(agent.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, HeaderEntry::new(key, value));
        self
    }

    fn build_transport(&self) -> Result<ReqwestClient, ClientError> {
        let mut builder = ReqwestClient::builder().timeout(self.timeout);
        if let Some(agent) = &self.user_agent {
            builder = builder.user_agent(agent.as_str());
        }
        builder
            .build()
            .map_err(|err| ClientError::Config(format!("failed to build HTTP client: {}", err)))
    }
}

/// Replaces an existing header with the same (case-insensitive) name, or appends
fn set_header(headers: &mut Vec<HeaderEntry>, entry: HeaderEntry) {
    match headers
        .iter_mut()
        .find(|existing| existing.key.eq_ignore_ascii_case(&entry.key))
    {
        Some(existing) => *existing = entry,
        None => headers.push(entry),
    }
}

/// Live transport state shared by every clone of an `ApiClient`
#[derive(Debug)]
struct Transport {
    http: ReqwestClient,
    options: ClientOptions,
}

impl Transport {
    fn new(options: ClientOptions) -> Result<Self, ClientError> {
        Ok(Self {
            http: options.build_transport()?,
            options,
        })
    }
}

/// API client for envelope-style JSON backends
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: BaseUrl,
    transport: Arc<RwLock<Transport>>,
}

impl ApiClient {
    /// Create a client that reads its base URL from `API_URL` on every call
    pub fn new(options: ClientOptions) -> Result<Self, ClientError> {
        Self::with_base_url(BaseUrl::default(), options)
    }

    /// Create a client with an explicit base URL source
    pub fn with_base_url(base_url: BaseUrl, options: ClientOptions) -> Result<Self, ClientError> {
        Ok(Self {
            base_url,
            transport: Arc::new(RwLock::new(Transport::new(options)?)),
        })
    }

    /// The options the transport is currently built from
    pub fn options(&self) -> ClientOptions {
        self.read_transport(|transport| transport.options.clone())
    }

    /// Set a default header for every subsequent request; last write wins
    pub fn add_header(&self, key: impl Into<String>, value: impl Into<String>) -> &Self {
        let entry = HeaderEntry::new(key, value);
        let mut transport = self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        set_header(&mut transport.options.headers, entry);
        self
    }

    /// Apply `add_header` for each entry, in order
    pub fn add_headers<I>(&self, entries: I) -> &Self
    where
        I: IntoIterator<Item = HeaderEntry>,
    {
        for HeaderEntry { key, value } in entries {
            self.add_header(key, value);
        }
        self
    }

    /// Rebuild the transport from `ClientOptions::default()`.
    ///
    /// Custom headers and every option given at construction are dropped;
    /// only the base URL source is kept.
    pub fn reset(&self) -> Result<(), ClientError> {
        let fresh = Transport::new(ClientOptions::default())?;
        *self
            .transport
            .write()
            .unwrap_or_else(PoisonError::into_inner) = fresh;
        debug!("API client transport reset to defaults");
        Ok(())
    }

    /// Validate a call and turn it into a `PendingRequest` without sending it
    pub fn prepare(
        &self,
        path: &str,
        method: &str,
        params: Value,
    ) -> Result<PendingRequest, ClientError> {
        if path.is_empty() {
            return Err(ClientError::Usage(
                "a request path is required: api(path, method, params)".to_string(),
            ));
        }

        // Usage errors are reported before the base URL is looked up
        let method: Method = method.parse()?;
        let (query, body) = match method {
            Method::Get => (query_pairs(&params)?, None),
            Method::Post | Method::Put => (Vec::new(), Some(body_or_empty(params))),
            Method::Delete => (Vec::new(), None),
        };

        let url = request_url(
            &self.base_url.resolve()?,
            path,
            chrono::Utc::now().timestamp_millis(),
        );

        Ok(PendingRequest {
            method,
            url,
            query,
            body,
            headers: self.read_transport(|transport| transport.options.headers.clone()),
        })
    }

    /// Dispatch a request and return the raw response.
    ///
    /// Fails before any network I/O on an empty path or an unsupported
    /// method. A body carrying envelope status 401 fails with
    /// `ClientError::Unauthorized` whatever the HTTP status was.
    pub async fn api(
        &self,
        path: &str,
        method: &str,
        params: Value,
    ) -> Result<RawResponse, ClientError> {
        let pending = self.prepare(path, method, params)?;
        self.send(pending).await
    }

    /// Shorthand form of `api`: a GET with query parameters
    pub async fn api_with_params(
        &self,
        path: &str,
        params: Value,
    ) -> Result<RawResponse, ClientError> {
        self.api(path, Method::Get.as_str(), params).await
    }

    /// Send a prepared request through the shared transport
    pub async fn send(&self, pending: PendingRequest) -> Result<RawResponse, ClientError> {
        let http = self.read_transport(|transport| transport.http.clone());

        let mut request = http.request(pending.method.into(), pending.url.as_str());
        if !pending.query.is_empty() {
            request = request.query(&pending.query);
        }
        for HeaderEntry { key, value } in &pending.headers {
            request = request.header(key.as_str(), value.as_str());
        }
        if let Some(body) = &pending.body {
            request = request.json(body);
        }

        debug!(method = %pending.method, url = %pending.url, "sending API request");
        let response = request.send().await?;

        let status = response.status();
        let headers = response.headers().clone();
        let bytes = response.bytes().await?;
        debug!(method = %pending.method, url = %pending.url, %status, "received API response");

        intercept(RawResponse::new(status, headers, &bytes))
    }

    /// GET `path` with `params` as query parameters and return the envelope data
    pub async fn get<T, P>(&self, path: &str, params: &P) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.call(path, Method::Get, encode(params)?).await
    }

    /// POST `data` as the JSON body and return the envelope data
    pub async fn post<T, P>(&self, path: &str, data: &P) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.call(path, Method::Post, encode(data)?).await
    }

    /// PUT `data` as the JSON body and return the envelope data
    pub async fn put<T, P>(&self, path: &str, data: &P) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        self.call(path, Method::Put, encode(data)?).await
    }

    /// DELETE `path` and return the envelope data
    pub async fn delete<T>(&self, path: &str) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        self.call(path, Method::Delete, Value::Null).await
    }

    /// Fail unless the envelope status is 200; the response is returned unchanged
    pub fn is_success_response(response: RawResponse) -> Result<RawResponse, ClientError> {
        if response.envelope_status() != Some(SUCCESS_STATUS) {
            return Err(ClientError::Api(response.envelope_message()));
        }
        Ok(response)
    }

    async fn call<T>(&self, path: &str, method: Method, params: Value) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let response = self.api(path, method.as_str(), params).await?;
        let data = Self::is_success_response(response)?.into_data();
        serde_json::from_value(data).map_err(ClientError::Decode)
    }

    fn read_transport<R>(&self, f: impl FnOnce(&Transport) -> R) -> R {
        let transport = self
            .transport
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        f(&transport)
    }
}

/// The response interceptor: envelope status 401 first, then the HTTP status
fn intercept(response: RawResponse) -> Result<RawResponse, ClientError> {
    if response.envelope_status() == Some(UNAUTHORIZED_STATUS) {
        debug!(status = %response.status, "envelope reported an expired session");
        return Err(ClientError::Unauthorized);
    }
    if !response.status.is_success() {
        let body = match &response.body {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        return Err(ClientError::Status {
            status: response.status,
            body,
        });
    }
    Ok(response)
}

/// Joins base URL and path and appends the cache-busting parameter
fn request_url(base_url: &str, path: &str, timestamp_ms: i64) -> String {
    let separator = if path.starts_with('/') { "" } else { "/" };
    let mut url = format!("{}{}{}", base_url, separator, path);
    url.push(if url.contains('?') { '&' } else { '?' });
    url.push_str(&format!("{}={}", CACHE_BUST_PARAM, timestamp_ms));
    url
}

fn encode<P: Serialize + ?Sized>(params: &P) -> Result<Value, ClientError> {
    serde_json::to_value(params).map_err(ClientError::Encode)
}

fn body_or_empty(params: Value) -> Value {
    match params {
        Value::Null => Value::Object(Default::default()),
        other => other,
    }
}
