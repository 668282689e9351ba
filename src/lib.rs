//! Envelope client library crate
//!
//! A thin async client for JSON backends that wrap every response in a
//! `{status, message, data}` envelope. It owns one shared `reqwest` client,
//! manages default headers, appends a cache-busting `_t` parameter to every
//! URL and unwraps the envelope into the caller's type.
//!
//! ```no_run
//! use envelope_client::{ApiClient, ClientOptions};
//! use serde_json::{json, Value};
//!
//! # async fn demo() -> Result<(), envelope_client::ClientError> {
//! let client = ApiClient::new(ClientOptions::default())?;
//! client.add_header("X-Token", "abc");
//!
//! let users: Value = client.get("users", &json!({"page": 2})).await?;
//! # let _ = users;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod cli;
pub mod models;

pub use api::{Api, ApiClient, BaseUrl, ClientError, ClientOptions};
pub use models::{HeaderEntry, Method, PendingRequest, RawResponse, ResponseEnvelope};
