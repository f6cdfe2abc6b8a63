//! `condition` and `function` nodes
//!
//! Both evaluate user code with the restricted interpreter and report
//! evaluation failures in their output instead of failing the run.

use super::config_str;
use crate::expression::{evaluate_condition, run_function};
use crate::models::Context;
use serde_json::{Map, Value};
use tracing::warn;

pub(super) fn condition(config: &Map<String, Value>, context: &Context) -> Context {
    let source = config_str(config, "condition").unwrap_or_default();
    let mut output = Map::new();

    match evaluate_condition(source, context) {
        Ok(result) => {
            output.insert("condition_result".into(), Value::Bool(result));
            output.insert("condition".into(), Value::String(source.to_string()));
        }
        Err(e) => {
            warn!(condition = %source, error = %e, "Condition evaluation failed");
            output.insert("condition_result".into(), Value::Bool(false));
            output.insert("error".into(), Value::String(e.to_string()));
        }
    }
    output
}

pub(super) fn function(config: &Map<String, Value>, context: &Context) -> Context {
    let code = config_str(config, "function_code").unwrap_or_default();
    let mut output = Map::new();

    match run_function(code, context) {
        Ok(result) => {
            output.insert("function_output".into(), result);
        }
        Err(e) => {
            warn!(error = %e, "Function execution failed");
            output.insert("error".into(), Value::String(e.to_string()));
            output.insert("function_output".into(), Value::Object(Map::new()));
        }
    }
    output
}
