//! Core models for the envelope client
//!
//! This module contains the wire-level data types shared by the client, the
//! `Api` trait and the CLI: the response envelope, header entries, the
//! supported HTTP methods and the prepared/received request shapes.

use std::fmt;
use std::str::FromStr;

use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::ClientError;

/// The envelope status code that marks a successful call
pub const SUCCESS_STATUS: i64 = 200;

/// The envelope status code that marks an expired or missing session
pub const UNAUTHORIZED_STATUS: i64 = 401;

/// Application-level wrapper returned by every backend endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope<T> {
    pub status: i64,
    #[serde(default)]
    pub message: String,
    pub data: T,
}

/// A single default header, as supplied to `add_headers`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeaderEntry {
    pub key: String,
    pub value: String,
}

impl HeaderEntry {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// HTTP methods the client is willing to dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "get",
            Method::Post => "post",
            Method::Put => "put",
            Method::Delete => "delete",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = ClientError;

    /// Parses a method name case-insensitively
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let method = s.to_lowercase();
        match method.as_str() {
            "get" => Ok(Method::Get),
            "post" => Ok(Method::Post),
            "put" => Ok(Method::Put),
            "delete" => Ok(Method::Delete),
            _ => Err(ClientError::Usage(format!(
                "{} not allowed, only allow get, post, put, delete",
                method
            ))),
        }
    }
}

impl From<Method> for reqwest::Method {
    fn from(method: Method) -> Self {
        match method {
            Method::Get => reqwest::Method::GET,
            Method::Post => reqwest::Method::POST,
            Method::Put => reqwest::Method::PUT,
            Method::Delete => reqwest::Method::DELETE,
        }
    }
}

/// A request that has passed validation and is ready to be sent
#[derive(Debug, Clone, PartialEq)]
pub struct PendingRequest {
    pub method: Method,
    /// Full URL, including the `_t` cache-busting parameter
    pub url: String,
    /// Query pairs appended after `url` (GET only)
    pub query: Vec<(String, String)>,
    /// JSON body (POST and PUT only)
    pub body: Option<Value>,
    pub headers: Vec<HeaderEntry>,
}

/// The transport-level response, before envelope validation
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    /// Parsed JSON body; a body that is not JSON is kept as a string value
    pub body: Value,
}

impl RawResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, bytes: &[u8]) -> Self {
        let body = serde_json::from_slice(bytes)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()));
        Self {
            status,
            headers,
            body,
        }
    }

    /// The numeric `status` field of the envelope, if there is one
    pub fn envelope_status(&self) -> Option<i64> {
        let status = self.body.get("status")?;
        status.as_i64().or_else(|| {
            status
                .as_f64()
                .filter(|value| value.fract() == 0.0)
                .map(|value| value as i64)
        })
    }

    /// The `message` field of the envelope, rendered as text
    pub fn envelope_message(&self) -> String {
        match self.body.get("message") {
            None | Some(Value::Null) => String::new(),
            Some(Value::String(message)) => message.clone(),
            Some(other) => other.to_string(),
        }
    }

    /// Consumes the response and returns the envelope's `data` field
    pub fn into_data(self) -> Value {
        match self.body {
            Value::Object(mut map) => map.remove("data").unwrap_or(Value::Null),
            _ => Value::Null,
        }
    }
}

/// Flattens a JSON object into query pairs.
///
/// Null values are skipped, arrays become repeated `key[]` pairs and nested
/// objects are sent as JSON text.
pub fn query_pairs(params: &Value) -> Result<Vec<(String, String)>, ClientError> {
    let map = match params {
        Value::Null => return Ok(Vec::new()),
        Value::Object(map) => map,
        other => {
            return Err(ClientError::Usage(format!(
                "query parameters must be a JSON object, got {}",
                other
            )))
        }
    };

    let mut pairs = Vec::with_capacity(map.len());
    for (key, value) in map {
        match value {
            Value::Null => {}
            Value::Array(items) => {
                let array_key = format!("{}[]", key);
                for item in items.iter().filter(|item| !item.is_null()) {
                    pairs.push((array_key.clone(), scalar_text(item)));
                }
            }
            other => pairs.push((key.clone(), scalar_text(other))),
        }
    }
    Ok(pairs)
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_method_parsing_is_case_insensitive() {
        assert_eq!("GET".parse::<Method>().unwrap(), Method::Get);
        assert_eq!("Post".parse::<Method>().unwrap(), Method::Post);
        assert_eq!("put".parse::<Method>().unwrap(), Method::Put);
        assert_eq!("DELETE".parse::<Method>().unwrap(), Method::Delete);
    }

    #[test]
    fn test_unsupported_method_names_the_method() {
        let err = "PATCH".parse::<Method>().unwrap_err();
        assert!(matches!(err, ClientError::Usage(_)));
        assert_eq!(
            err.to_string(),
            "patch not allowed, only allow get, post, put, delete"
        );
    }

    #[test]
    fn test_query_pairs_flattening() {
        let params = json!({
            "page": 2,
            "q": "rust",
            "active": true,
            "skip": null,
            "ids": [1, 2],
            "filter": {"kind": "a"}
        });
        let mut pairs = query_pairs(&params).unwrap();
        pairs.sort();

        assert_eq!(
            pairs,
            vec![
                ("active".to_string(), "true".to_string()),
                ("filter".to_string(), r#"{"kind":"a"}"#.to_string()),
                ("ids[]".to_string(), "1".to_string()),
                ("ids[]".to_string(), "2".to_string()),
                ("page".to_string(), "2".to_string()),
                ("q".to_string(), "rust".to_string()),
            ]
        );
    }

    #[test]
    fn test_query_pairs_rejects_non_objects() {
        assert!(query_pairs(&Value::Null).unwrap().is_empty());
        assert!(matches!(
            query_pairs(&json!([1, 2])),
            Err(ClientError::Usage(_))
        ));
    }

    #[test]
    fn test_raw_response_envelope_fields() {
        let raw = RawResponse::new(
            StatusCode::OK,
            HeaderMap::new(),
            br#"{"status": 500, "message": "boom", "data": {"foo": 1}}"#,
        );
        assert_eq!(raw.envelope_status(), Some(500));
        assert_eq!(raw.envelope_message(), "boom");
        assert_eq!(raw.into_data(), json!({"foo": 1}));
    }

    #[test]
    fn test_raw_response_keeps_non_json_body_as_text() {
        let raw = RawResponse::new(StatusCode::OK, HeaderMap::new(), b"<html>oops</html>");
        assert_eq!(raw.body, Value::String("<html>oops</html>".to_string()));
        assert_eq!(raw.envelope_status(), None);
        assert_eq!(raw.envelope_message(), "");
        assert_eq!(raw.into_data(), Value::Null);
    }

    #[test]
    fn test_envelope_status_accepts_integral_floats() {
        let raw = RawResponse::new(StatusCode::OK, HeaderMap::new(), br#"{"status": 200.0}"#);
        assert_eq!(raw.envelope_status(), Some(200));

        let raw = RawResponse::new(StatusCode::OK, HeaderMap::new(), br#"{"status": "200"}"#);
        assert_eq!(raw.envelope_status(), None);
    }

    #[test]
    fn test_envelope_deserializes_without_message() {
        let envelope: ResponseEnvelope<Value> =
            serde_json::from_value(json!({"status": 200, "data": [1]})).unwrap();
        assert_eq!(envelope.message, "");
        assert_eq!(envelope.data, json!([1]));
    }
}
