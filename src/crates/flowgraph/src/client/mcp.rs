//! HTTP tool-invocation client
//!
//! Speaks either the JSON-RPC `tools/call` envelope or a plain
//! `POST <url>/call_tool` body, per configured server. Transient failures
//! (timeouts, connection errors, 5xx and 429) are retried with backoff;
//! anything else fails immediately.

use super::retry::{with_retry, RetryConfig};
use crate::config::{ToolRetryConfig, ToolServerConfig, ToolTransport};
use crate::error::{EngineError, Result};
use crate::services::ToolInvoker;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info};

impl From<&ToolRetryConfig> for RetryConfig {
    fn from(config: &ToolRetryConfig) -> Self {
        RetryConfig::new(
            config.max_retries,
            config.initial_delay_ms,
            config.max_delay_ms,
            config.multiplier,
        )
        .with_jitter(config.jitter)
    }
}

/// Failure of one HTTP attempt
#[derive(Debug)]
enum CallError {
    Transient(String),
    Permanent(String),
}

impl CallError {
    fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Self::Transient(format!("request timed out: {}", err))
        } else if err.is_connect() {
            Self::Transient(format!("connection failed: {}", err))
        } else {
            Self::Permanent(err.to_string())
        }
    }

    fn from_status(status: StatusCode, body: &str) -> Self {
        let message = format!("server returned {}: {}", status, body);
        if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
            Self::Transient(message)
        } else {
            Self::Permanent(message)
        }
    }
}

impl fmt::Display for CallError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transient(msg) | Self::Permanent(msg) => write!(f, "{}", msg),
        }
    }
}

/// Tool client over HTTP
#[derive(Debug, Clone)]
pub struct HttpToolClient {
    client: Client,
    servers: BTreeMap<String, ToolServerConfig>,
    retry: RetryConfig,
}

impl HttpToolClient {
    /// Create a client for the configured servers
    pub fn new(servers: BTreeMap<String, ToolServerConfig>, retry: RetryConfig) -> Result<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| EngineError::Tool(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            servers,
            retry,
        })
    }

    /// Names of the configured servers
    pub fn server_names(&self) -> impl Iterator<Item = &str> {
        self.servers.keys().map(String::as_str)
    }

    fn request_body(server: &ToolServerConfig, tool_name: &str, arguments: &Value, id: u64) -> (String, Value) {
        let base = server.url.trim_end_matches('/');
        match server.transport {
            ToolTransport::JsonRpc => (
                base.to_string(),
                json!({
                    "jsonrpc": "2.0",
                    "id": id,
                    "method": "tools/call",
                    "params": {"name": tool_name, "arguments": arguments},
                }),
            ),
            ToolTransport::Http => (
                format!("{}/call_tool", base),
                json!({"tool": tool_name, "arguments": arguments}),
            ),
        }
    }

    async fn attempt(
        &self,
        server: &ToolServerConfig,
        url: &str,
        body: &Value,
    ) -> std::result::Result<Value, CallError> {
        let mut request = self
            .client
            .post(url)
            .timeout(Duration::from_secs(server.timeout_secs))
            .json(body);

        if let Some(token) = &server.bearer_token {
            request = request.bearer_auth(token);
        }
        for (name, value) in &server.headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request.send().await.map_err(CallError::from_reqwest)?;
        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CallError::from_status(status, &text));
        }

        response
            .json::<Value>()
            .await
            .map_err(|e| CallError::Permanent(format!("invalid JSON response: {}", e)))
    }

    /// Unwrap a JSON-RPC envelope; plain HTTP bodies pass through
    fn extract_result(transport: ToolTransport, body: Value) -> Result<Value> {
        if transport != ToolTransport::JsonRpc {
            return Ok(body);
        }
        match body {
            Value::Object(mut envelope) => {
                if let Some(error) = envelope.remove("error").filter(|e| !e.is_null()) {
                    let message = error
                        .get("message")
                        .and_then(Value::as_str)
                        .map(str::to_string)
                        .unwrap_or_else(|| error.to_string());
                    return Err(EngineError::Tool(format!("Tool returned error: {}", message)));
                }
                match envelope.remove("result") {
                    Some(result) => Ok(result),
                    None => Ok(Value::Object(envelope)),
                }
            }
            other => Ok(other),
        }
    }
}

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

#[async_trait]
impl ToolInvoker for HttpToolClient {
    async fn call_tool(&self, server_name: &str, tool_name: &str, arguments: &Value) -> Result<Value> {
        let server = self.servers.get(server_name).ok_or_else(|| {
            EngineError::Tool(format!("Tool server '{}' is not configured", server_name))
        })?;

        let id = REQUEST_ID.fetch_add(1, Ordering::Relaxed);
        let (url, body) = Self::request_body(server, tool_name, arguments, id);
        let label = format!("{}/{}", server_name, tool_name);

        debug!(server = %server_name, tool = %tool_name, url = %url, "Calling tool");
        let started = Instant::now();

        let response = with_retry(&self.retry, &label, CallError::is_transient, || {
            self.attempt(server, &url, &body)
        })
        .await
        .map_err(|e| EngineError::Tool(format!("{} failed: {}", label, e)))?;

        info!(
            server = %server_name,
            tool = %tool_name,
            duration_ms = started.elapsed().as_millis() as u64,
            "Tool call completed"
        );

        Self::extract_result(server.transport, response)
    }
}
