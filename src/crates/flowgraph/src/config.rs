//! Configuration management for flowgraph
//!
//! Supports layered configuration:
//! - User-level: ~/.flowgraph/flowgraph.toml
//! - Project-level: ./.flowgraph/flowgraph.toml
//! - Explicit file given with `--config`
//!
//! Later layers override earlier ones.

mod loader;
mod schema;

pub use loader::{ConfigLoader, DATABASE_ENV_VAR};
pub use schema::{
    DatabaseConfig, ExecutionConfig, FlowgraphConfig, LoggingConfig, ToolRetryConfig,
    ToolServerConfig, ToolTransport, ToolsConfig,
};

use crate::Result;
use std::path::PathBuf;

/// Load configuration from the standard locations plus an optional explicit file
pub async fn load_config(explicit: Option<PathBuf>) -> Result<FlowgraphConfig> {
    ConfigLoader::new().with_explicit_path(explicit).load().await
}
