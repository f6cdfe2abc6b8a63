//! Error types for the workflow engine
//!
//! A single error enum covers graph validation, node configuration,
//! collaborator failures, expression evaluation and persistence.

use thiserror::Error;

/// Result type alias for engine operations
pub type Result<T> = std::result::Result<T, EngineError>;

/// Main error type for engine operations
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed workflow graph (missing start node, dangling edge, ...)
    #[error("Graph error: {0}")]
    Graph(String),

    /// A node's required config or context field is missing or invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// Completion or retrieval provider call failed
    #[error("Provider error: {0}")]
    Provider(String),

    /// Tool invocation failed or timed out
    #[error("Tool error: {0}")]
    Tool(String),

    /// Condition, template or function code evaluation failed
    #[error("Expression error: {0}")]
    Expression(String),

    /// Record not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Status change not allowed from the current state
    #[error("Invalid state transition from {from} to {to}")]
    InvalidStateTransition { from: String, to: String },

    /// Persistence failure
    #[error("Database error: {0}")]
    Database(String),

    /// JSON (de)serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML (de)serialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EngineError {
    /// Create a new Graph error
    pub fn graph(msg: impl Into<String>) -> Self {
        Self::Graph(msg.into())
    }

    /// Create a new Config error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new Expression error
    pub fn expression(msg: impl Into<String>) -> Self {
        Self::Expression(msg.into())
    }

    /// Create a new NotFound error
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// Short machine-readable name of the error kind
    ///
    /// Used as the prefix of the `error_message` persisted on a failed run.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Graph(_) => "graph_error",
            Self::Config(_) => "config_error",
            Self::Provider(_) => "provider_error",
            Self::Tool(_) => "tool_error",
            Self::Expression(_) => "expression_error",
            Self::NotFound(_) => "not_found",
            Self::InvalidStateTransition { .. } => "invalid_state_transition",
            Self::Database(_) => "database_error",
            Self::Serialization(_) => "serialization_error",
            Self::Yaml(_) => "yaml_error",
            Self::Io(_) => "io_error",
        }
    }

    /// Message stored on a failed execution record
    pub fn to_record_message(&self) -> String {
        let detail = match self {
            Self::Graph(msg)
            | Self::Config(msg)
            | Self::Provider(msg)
            | Self::Tool(msg)
            | Self::Expression(msg)
            | Self::NotFound(msg)
            | Self::Database(msg) => msg.clone(),
            other => other.to_string(),
        };
        format!("{}: {}", self.kind(), detail)
    }

    /// Check if this is a not found error
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether the error ends a run when raised by a node executor
    ///
    /// Expression errors are reported in `condition`/`function` output and
    /// swallowed on edges; everything else fails the run.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, Self::Expression(_))
    }

    /// Check if this error comes from the persistence layer
    pub fn is_database(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

impl From<sqlx::Error> for EngineError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => Self::NotFound("No matching row found in database".to_string()),
            err => Self::Database(err.to_string()),
        }
    }
}

impl From<sqlx::migrate::MigrateError> for EngineError {
    fn from(err: sqlx::migrate::MigrateError) -> Self {
        Self::Database(format!("Migration failed: {}", err))
    }
}
