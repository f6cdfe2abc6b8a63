//! Database repositories
//!
//! One repository per persisted record type. JSON payloads are stored as
//! TEXT and timestamps as fixed-width RFC 3339 TEXT so they sort correctly.

pub mod execution_repository;
pub mod node_execution_repository;
pub mod workflow_repository;

pub use execution_repository::ExecutionRepository;
pub use node_execution_repository::NodeExecutionRepository;
pub use workflow_repository::WorkflowRepository;

use crate::error::{EngineError, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use serde::de::DeserializeOwned;
use serde::Serialize;

pub(crate) fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|e| EngineError::Database(format!("Invalid timestamp '{}': {}", raw, e)))
}

pub(crate) fn to_json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string(value)?)
}

pub(crate) fn from_json<T: DeserializeOwned>(raw: &str) -> Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| EngineError::Database(format!("Corrupt JSON column: {}", e)))
}
