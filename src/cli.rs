//! CLI module
//!
//! This module provides the command-line interface for issuing envelope API
//! requests from a terminal.

use std::io;
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use serde_json::{json, Map, Value};
use tracing::Level;

use crate::api::{Api, ApiClient, BaseUrl, ClientError, ClientOptions};
use crate::models::HeaderEntry;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// API base URL; $API_URL is read on every request when omitted
    #[arg(short, long)]
    pub server: Option<String>,

    /// Request timeout in milliseconds
    #[arg(long, env = "API_TIMEOUT_MS", default_value_t = 30000)]
    pub timeout_ms: u64,

    /// Default header sent with every request ("Key: Value")
    #[arg(short = 'H', long = "header", value_parser = parse_header)]
    pub headers: Vec<HeaderEntry>,

    /// Log requests and responses to stderr
    #[arg(short, long)]
    pub verbose: bool,
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// GET a path and print the envelope data
    Get {
        path: String,

        /// Query parameter (key=value), repeatable
        #[arg(short, long = "query", value_parser = parse_query)]
        query: Vec<(String, String)>,
    },

    /// POST a JSON body and print the envelope data
    Post {
        path: String,

        /// JSON request body
        #[arg(short, long, value_parser = parse_json)]
        data: Option<Value>,
    },

    /// PUT a JSON body and print the envelope data
    Put {
        path: String,

        /// JSON request body
        #[arg(short, long, value_parser = parse_json)]
        data: Option<Value>,
    },

    /// DELETE a path and print the envelope data
    Delete { path: String },

    /// Send a raw request and print the HTTP status and unvalidated body
    Api {
        /// get, post, put or delete
        method: String,

        path: String,

        /// Query parameters (GET) or body (POST/PUT) as JSON
        #[arg(short, long, value_parser = parse_json)]
        data: Option<Value>,
    },

    /// Generate shell completions
    Completions {
        /// The shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Run the CLI application
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = Cli::command();
        let bin_name = cmd.get_name().to_string();
        generate(*shell, &mut cmd, bin_name, &mut io::stdout());
        return Ok(());
    }

    let client = create_client(&cli)?;
    let output = execute(&client, &cli.command).await?;
    println!("{}", serde_json::to_string_pretty(&output)?);

    Ok(())
}

fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(io::stderr)
        .init();
}

/// Build the client described by the global flags
pub fn create_client(cli: &Cli) -> Result<ApiClient, ClientError> {
    let base_url = match &cli.server {
        Some(url) => BaseUrl::Fixed(url.clone()),
        None => BaseUrl::default(),
    };
    let options = ClientOptions::default().timeout(Duration::from_millis(cli.timeout_ms));

    let client = ApiClient::with_base_url(base_url, options)?;
    client.add_headers(cli.headers.iter().cloned());
    Ok(client)
}

/// Execute a request command against any `Api` implementation
pub async fn execute(api: &dyn Api, command: &Commands) -> Result<Value, ClientError> {
    match command {
        Commands::Get { path, query } => {
            let params: Map<String, Value> = query
                .iter()
                .map(|(key, value)| (key.clone(), Value::String(value.clone())))
                .collect();
            api.get(path, Value::Object(params)).await
        }

        Commands::Post { path, data } => api.post(path, body(data)).await,

        Commands::Put { path, data } => api.put(path, body(data)).await,

        Commands::Delete { path } => api.delete(path).await,

        Commands::Api { method, path, data } => {
            let response = api
                .api(path, method, data.clone().unwrap_or(Value::Null))
                .await?;
            Ok(json!({
                "status": response.status.as_u16(),
                "body": response.body,
            }))
        }

        Commands::Completions { .. } => Err(ClientError::Usage(
            "completions do not issue a request".to_string(),
        )),
    }
}

fn body(data: &Option<Value>) -> Value {
    data.clone().unwrap_or_else(|| json!({}))
}

/// Parse a `Key: Value` header argument
fn parse_header(raw: &str) -> Result<HeaderEntry, String> {
    let (key, value) = raw
        .split_once(':')
        .ok_or_else(|| format!("expected \"Key: Value\", got \"{}\"", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("header name is empty in \"{}\"", raw));
    }
    Ok(HeaderEntry::new(key, value.trim()))
}

/// Parse a `key=value` query argument
fn parse_query(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected key=value, got \"{}\"", raw))?;
    if key.is_empty() {
        return Err(format!("query key is empty in \"{}\"", raw));
    }
    Ok((key.to_string(), value.to_string()))
}

fn parse_json(raw: &str) -> Result<Value, String> {
    serde_json::from_str(raw).map_err(|err| format!("invalid JSON: {}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::RawResponse;
    use pretty_assertions::assert_eq;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;
    use std::sync::Mutex;

    /// Records every call and answers with the call description
    #[derive(Default)]
    struct RecordingApi {
        calls: Mutex<Vec<(String, String, Value)>>,
    }

    impl RecordingApi {
        fn record(&self, method: &str, path: &str, params: Value) -> Value {
            self.calls
                .lock()
                .unwrap()
                .push((method.to_string(), path.to_string(), params.clone()));
            json!({ "method": method, "path": path, "params": params })
        }
    }

    #[async_trait::async_trait]
    impl Api for RecordingApi {
        async fn api(
            &self,
            path: &str,
            method: &str,
            params: Value,
        ) -> Result<RawResponse, ClientError> {
            let body = self.record(method, path, params);
            Ok(RawResponse {
                status: StatusCode::ACCEPTED,
                headers: HeaderMap::new(),
                body,
            })
        }

        async fn get(&self, path: &str, params: Value) -> Result<Value, ClientError> {
            Ok(self.record("get", path, params))
        }

        async fn post(&self, path: &str, data: Value) -> Result<Value, ClientError> {
            Ok(self.record("post", path, data))
        }

        async fn put(&self, path: &str, data: Value) -> Result<Value, ClientError> {
            Ok(self.record("put", path, data))
        }

        async fn delete(&self, path: &str) -> Result<Value, ClientError> {
            Ok(self.record("delete", path, Value::Null))
        }
    }

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_header() {
        assert_eq!(
            parse_header("X-Token: abc").unwrap(),
            HeaderEntry::new("X-Token", "abc")
        );
        // Values may contain colons
        assert_eq!(
            parse_header("Referer:http://a.test").unwrap(),
            HeaderEntry::new("Referer", "http://a.test")
        );
        assert!(parse_header("no-colon").is_err());
        assert!(parse_header(": value").is_err());
    }

    #[test]
    fn test_parse_query() {
        assert_eq!(
            parse_query("page=2").unwrap(),
            ("page".to_string(), "2".to_string())
        );
        assert_eq!(
            parse_query("q=a=b").unwrap(),
            ("q".to_string(), "a=b".to_string())
        );
        assert!(parse_query("page").is_err());
        assert!(parse_query("=2").is_err());
    }

    #[test]
    fn test_cli_parses_global_flags() {
        let cli = Cli::try_parse_from([
            "envelope-client",
            "--server",
            "http://api.test",
            "-H",
            "X-Token: abc",
            "get",
            "users",
            "-q",
            "page=2",
        ])
        .unwrap();

        assert_eq!(cli.server.as_deref(), Some("http://api.test"));
        assert_eq!(cli.timeout_ms, 30000);
        assert_eq!(cli.headers, vec![HeaderEntry::new("X-Token", "abc")]);
        match cli.command {
            Commands::Get { path, query } => {
                assert_eq!(path, "users");
                assert_eq!(query, vec![("page".to_string(), "2".to_string())]);
            }
            _ => panic!("expected the get command"),
        }
    }

    #[test]
    fn test_cli_rejects_invalid_json_data() {
        let result = Cli::try_parse_from(["envelope-client", "post", "users", "--data", "{oops"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_create_client_applies_flags() {
        let cli = Cli::try_parse_from([
            "envelope-client",
            "--server",
            "http://api.test/",
            "--timeout-ms",
            "1500",
            "-H",
            "X-Token: abc",
            "delete",
            "users/1",
        ])
        .unwrap();

        let client = create_client(&cli).unwrap();
        assert_eq!(client.options().timeout, Duration::from_millis(1500));

        let pending = client.prepare("users/1", "delete", Value::Null).unwrap();
        assert!(pending.url.starts_with("http://api.test/users/1?_t="));
        assert_eq!(pending.headers, vec![HeaderEntry::new("X-Token", "abc")]);
    }

    #[tokio::test]
    async fn test_execute_routes_commands() {
        let api = RecordingApi::default();

        let command = Commands::Get {
            path: "users".to_string(),
            query: vec![("page".to_string(), "2".to_string())],
        };
        let output = execute(&api, &command).await.unwrap();
        assert_eq!(output["params"], json!({"page": "2"}));

        let command = Commands::Post {
            path: "users".to_string(),
            data: None,
        };
        let output = execute(&api, &command).await.unwrap();
        assert_eq!(output["params"], json!({}));

        let command = Commands::Api {
            method: "PUT".to_string(),
            path: "users/1".to_string(),
            data: Some(json!({"name": "ada"})),
        };
        let output = execute(&api, &command).await.unwrap();
        assert_eq!(output["status"], json!(202));
        assert_eq!(output["body"]["method"], json!("PUT"));

        let calls = api.calls.lock().unwrap();
        let methods: Vec<&str> = calls.iter().map(|(method, _, _)| method.as_str()).collect();
        assert_eq!(methods, vec!["get", "post", "PUT"]);
    }

    #[tokio::test]
    async fn test_execute_refuses_completions() {
        let api = RecordingApi::default();
        let command = Commands::Completions { shell: Shell::Bash };
        assert!(matches!(
            execute(&api, &command).await,
            Err(ClientError::Usage(_))
        ));
        assert!(api.calls.lock().unwrap().is_empty());
    }
}
