//! `knowledge_retrieval` nodes

use super::config_str;
use crate::error::{EngineError, Result};
use crate::expression::render;
use crate::models::Context;
use crate::services::Retriever;
use serde_json::{Map, Value};
use tracing::debug;

const DEFAULT_LIMIT: usize = 5;
const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.7;

/// `application_id` from the context; strings and numbers are accepted
fn application_id(context: &Context) -> Result<String> {
    match context.get("application_id") {
        Some(Value::String(id)) if !id.trim().is_empty() => Ok(id.clone()),
        Some(Value::Number(n)) => Ok(n.to_string()),
        _ => Err(EngineError::config(
            "application_id is required in the execution context for knowledge retrieval",
        )),
    }
}

fn limit(config: &Map<String, Value>) -> Result<usize> {
    match config.get("limit") {
        None | Some(Value::Null) => Ok(DEFAULT_LIMIT),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .ok_or_else(|| EngineError::config(format!("limit must be a non-negative integer, got {}", value))),
    }
}

fn similarity_threshold(config: &Map<String, Value>) -> Result<f64> {
    match config.get("similarity_threshold") {
        None | Some(Value::Null) => Ok(DEFAULT_SIMILARITY_THRESHOLD),
        Some(value) => value
            .as_f64()
            .ok_or_else(|| EngineError::config(format!("similarity_threshold must be a number, got {}", value))),
    }
}

pub(super) async fn execute(
    retriever: &dyn Retriever,
    config: &Map<String, Value>,
    context: &Context,
) -> Result<Context> {
    let application_id = application_id(context)?;
    let query = render(config_str(config, "query").unwrap_or_default(), context);
    let limit = limit(config)?;
    let threshold = similarity_threshold(config)?;

    let chunks = retriever
        .retrieve(&application_id, &query, limit, threshold)
        .await
        .map_err(|e| match e {
            EngineError::Provider(_) | EngineError::Config(_) => e,
            other => EngineError::Provider(other.to_string()),
        })?;

    debug!(application_id = %application_id, count = chunks.len(), "Retrieved knowledge");

    let count = chunks.len();
    let mut output = Map::new();
    output.insert("query".into(), Value::String(query));
    output.insert("results".into(), serde_json::to_value(chunks)?);
    output.insert("count".into(), Value::from(count));
    Ok(output)
}
