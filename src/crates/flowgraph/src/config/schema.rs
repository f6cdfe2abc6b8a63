//! Configuration schema for the flowgraph engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// Main configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FlowgraphConfig {
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Execution configuration
    #[serde(default)]
    pub execution: ExecutionConfig,

    /// Tool server configuration
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Database configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database file path (relative to ~/.flowgraph or absolute)
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Connection pool size
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    "flowgraph.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: "compact", "pretty", "json"
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Enable colored output
    #[serde(default = "default_true")]
    pub colored: bool,

    /// Show timestamps
    #[serde(default = "default_true")]
    pub timestamps: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "compact".to_string()
}

fn default_true() -> bool {
    true
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            colored: true,
            timestamps: true,
        }
    }
}

/// Execution configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionConfig {
    /// Maximum number of workflow runs progressing at once
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: usize,
}

fn default_max_concurrent_runs() -> usize {
    10
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            max_concurrent_runs: default_max_concurrent_runs(),
        }
    }
}

/// Tool invocation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ToolsConfig {
    /// Tool servers keyed by the `server_name` used in node configs
    #[serde(default)]
    pub servers: BTreeMap<String, ToolServerConfig>,

    /// Retry policy for transient transport failures
    #[serde(default)]
    pub retry: ToolRetryConfig,
}

/// Wire protocol spoken by a tool server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolTransport {
    /// POST `{"method": "tools/call", ...}` to the server URL
    #[default]
    JsonRpc,
    /// POST `{"tool", "arguments"}` to `<url>/call_tool`
    Http,
}

/// One tool server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolServerConfig {
    /// Base URL (supports `${VAR}` interpolation)
    pub url: String,

    #[serde(default)]
    pub transport: ToolTransport,

    /// Per-call timeout in seconds
    #[serde(default = "default_tool_timeout")]
    pub timeout_secs: u64,

    /// Sent as `Authorization: Bearer <token>`
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Extra request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

fn default_tool_timeout() -> u64 {
    180
}

impl ToolServerConfig {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            transport: ToolTransport::default(),
            timeout_secs: default_tool_timeout(),
            bearer_token: None,
            headers: BTreeMap::new(),
        }
    }

    pub fn with_transport(mut self, transport: ToolTransport) -> Self {
        self.transport = transport;
        self
    }

    pub fn with_timeout_secs(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }
}

/// Tool retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolRetryConfig {
    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: usize,

    /// Initial retry delay in milliseconds
    #[serde(default = "default_initial_delay_ms")]
    pub initial_delay_ms: u64,

    /// Maximum retry delay in milliseconds
    #[serde(default = "default_max_delay_ms")]
    pub max_delay_ms: u64,

    /// Retry backoff multiplier
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Randomize delays
    #[serde(default = "default_true")]
    pub jitter: bool,
}

fn default_max_retries() -> usize {
    2
}

fn default_initial_delay_ms() -> u64 {
    200
}

fn default_max_delay_ms() -> u64 {
    5_000
}

fn default_multiplier() -> f64 {
    2.0
}

impl Default for ToolRetryConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            initial_delay_ms: default_initial_delay_ms(),
            max_delay_ms: default_max_delay_ms(),
            multiplier: default_multiplier(),
            jitter: true,
        }
    }
}

impl FlowgraphConfig {
    /// Directory holding user-level state (~/.flowgraph)
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".flowgraph")
    }

    /// Get the resolved database path
    ///
    /// If path is relative, resolves it relative to ~/.flowgraph
    pub fn database_path(&self) -> PathBuf {
        let path = PathBuf::from(&self.database.path);

        if path.is_absolute() {
            path
        } else {
            Self::home_dir().join(path)
        }
    }
}
