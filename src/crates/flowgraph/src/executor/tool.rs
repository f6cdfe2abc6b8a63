//! `mcp_tool` nodes

use super::config_str;
use crate::error::{EngineError, Result};
use crate::expression::render_value;
use crate::models::Context;
use crate::services::ToolInvoker;
use serde_json::{Map, Value};

fn required<'a>(config: &'a Map<String, Value>, key: &str) -> Result<&'a str> {
    config_str(config, key)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| EngineError::config(format!("mcp_tool node requires '{}'", key)))
}

pub(super) async fn execute(
    tools: &dyn ToolInvoker,
    config: &Map<String, Value>,
    context: &Context,
) -> Result<Context> {
    let server_name = required(config, "server_name")?;
    let tool_name = required(config, "tool_name")?;
    let arguments = match config.get("args") {
        Some(args) => render_value(args, context),
        None => Value::Object(Map::new()),
    };

    let result = tools
        .call_tool(server_name, tool_name, &arguments)
        .await
        .map_err(|e| match e {
            EngineError::Tool(_) => e,
            other => EngineError::Tool(other.to_string()),
        })?;

    let mut output = Map::new();
    output.insert("tool_name".into(), Value::String(tool_name.to_string()));
    output.insert("server_name".into(), Value::String(server_name.to_string()));
    output.insert("arguments".into(), arguments);
    output.insert("result".into(), result);
    Ok(output)
}
