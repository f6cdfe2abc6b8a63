//! Configuration loader with layered file support
//!
//! Loads configuration from:
//! 1. Default values
//! 2. User-level config: ~/.flowgraph/flowgraph.toml
//! 3. Project-level config: ./.flowgraph/flowgraph.toml
//! 4. An explicit file passed on the command line
//!
//! Later files override earlier ones key by key, so a project file that
//! only sets `[logging] level` keeps every other user-level setting.

use crate::config::schema::FlowgraphConfig;
use crate::error::{EngineError, Result};
use regex::Regex;
use std::env;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use tokio::fs;
use toml::{Table, Value};
use tracing::{debug, info};

/// Environment variable overriding `database.path`
pub const DATABASE_ENV_VAR: &str = "FLOWGRAPH_DATABASE";

static ENV_VAR_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^:}]+)(?::([^}]*))?\}").unwrap());

/// Configuration loader that layers user, project and explicit configs
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    user_config_path: PathBuf,
    project_config_path: PathBuf,
    explicit_path: Option<PathBuf>,
}

impl ConfigLoader {
    /// Create a loader for the standard locations
    pub fn new() -> Self {
        Self {
            user_config_path: FlowgraphConfig::home_dir().join("flowgraph.toml"),
            project_config_path: env::current_dir()
                .unwrap_or_else(|_| PathBuf::from("."))
                .join(".flowgraph")
                .join("flowgraph.toml"),
            explicit_path: None,
        }
    }

    /// Create a loader with custom user and project paths
    pub fn with_paths(user_config_path: impl Into<PathBuf>, project_config_path: impl Into<PathBuf>) -> Self {
        Self {
            user_config_path: user_config_path.into(),
            project_config_path: project_config_path.into(),
            explicit_path: None,
        }
    }

    /// Add an explicit config file, applied last; it must exist
    pub fn with_explicit_path(mut self, path: Option<PathBuf>) -> Self {
        self.explicit_path = path;
        self
    }

    /// Load and merge all configuration layers
    pub async fn load(&self) -> Result<FlowgraphConfig> {
        let mut merged = Table::new();

        for path in [&self.user_config_path, &self.project_config_path] {
            match Self::read_table(path).await? {
                Some(table) => {
                    debug!(path = %path.display(), "Loaded config layer");
                    merge_tables(&mut merged, table);
                }
                None => debug!(path = %path.display(), "Config layer not found"),
            }
        }

        if let Some(path) = &self.explicit_path {
            let table = Self::read_table(path).await?.ok_or_else(|| {
                EngineError::Config(format!("Config file not found: {}", path.display()))
            })?;
            debug!(path = %path.display(), "Loaded explicit config");
            merge_tables(&mut merged, table);
        }

        let mut root = Value::Table(merged);
        expand_variables(&mut root);

        let mut config: FlowgraphConfig = root
            .try_into()
            .map_err(|e| EngineError::Config(format!("Invalid configuration: {}", e)))?;

        if let Ok(path) = env::var(DATABASE_ENV_VAR) {
            if !path.is_empty() {
                debug!(path = %path, "Database path overridden from environment");
                config.database.path = path;
            }
        }

        info!(servers = config.tools.servers.len(), "Configuration loaded");
        Ok(config)
    }

    /// Read one TOML file; a missing file is not an error
    async fn read_table(path: &Path) -> Result<Option<Table>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = fs::read_to_string(path)
            .await
            .map_err(|e| EngineError::Config(format!("Failed to read {}: {}", path.display(), e)))?;

        let table: Table = toml::from_str(&content)
            .map_err(|e| EngineError::Config(format!("Failed to parse {}: {}", path.display(), e)))?;

        Ok(Some(table))
    }

    /// Get user config path
    pub fn user_config_path(&self) -> &Path {
        &self.user_config_path
    }

    /// Get project config path
    pub fn project_config_path(&self) -> &Path {
        &self.project_config_path
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Recursively merge `overlay` into `base`; overlay wins on conflicts
fn merge_tables(base: &mut Table, overlay: Table) {
    for (key, value) in overlay {
        match (base.get_mut(&key), value) {
            (Some(Value::Table(existing)), Value::Table(incoming)) => {
                merge_tables(existing, incoming);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

/// Expand `${VAR}` and `${VAR:default}` in every string value
fn expand_variables(value: &mut Value) {
    match value {
        Value::String(s) => {
            if let Some(expanded) = expand_env_in_string(s) {
                *s = expanded;
            }
        }
        Value::Table(table) => {
            for (_, v) in table.iter_mut() {
                expand_variables(v);
            }
        }
        Value::Array(items) => {
            for item in items.iter_mut() {
                expand_variables(item);
            }
        }
        _ => {}
    }
}

/// Expand environment variables in a string
///
/// Unset variables without a default expand to the empty string.
fn expand_env_in_string(s: &str) -> Option<String> {
    if !s.contains("${") {
        return None;
    }

    let expanded = ENV_VAR_REGEX.replace_all(s, |caps: &regex::Captures<'_>| {
        let default_value = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        env::var(&caps[1]).unwrap_or_else(|_| default_value.to_string())
    });
    Some(expanded.into_owned())
}
