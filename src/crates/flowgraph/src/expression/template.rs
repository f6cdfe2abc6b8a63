//! `{{variable}}` template rendering

use super::value::to_display_string;
use crate::models::Context;
use regex::{Captures, Regex};
use serde_json::Value;
use std::sync::LazyLock;

static PLACEHOLDER_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{\{\s*([^{}\s]+)\s*\}\}").unwrap());

/// Resolve a placeholder name: exact key first, then a dotted path
fn lookup<'a>(context: &'a Context, name: &str) -> Option<&'a Value> {
    if let Some(value) = context.get(name) {
        return Some(value);
    }
    if !name.contains('.') {
        return None;
    }

    let mut parts = name.split('.');
    let mut current = context.get(parts.next()?)?;
    for part in parts {
        current = match current {
            Value::Object(map) => map.get(part)?,
            Value::Array(items) => items.get(part.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Substitute placeholders; unknown names are left verbatim
pub fn render(template: &str, context: &Context) -> String {
    if !template.contains("{{") {
        return template.to_string();
    }
    PLACEHOLDER_REGEX
        .replace_all(template, |caps: &Captures<'_>| match lookup(context, &caps[1]) {
            Some(value) => to_display_string(value),
            None => caps[0].to_string(),
        })
        .into_owned()
}

/// Render every string inside a JSON value, recursing into objects and arrays
pub fn render_value(value: &Value, context: &Context) -> Value {
    match value {
        Value::String(s) => Value::String(render(s, context)),
        Value::Array(items) => Value::Array(items.iter().map(|v| render_value(v, context)).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), render_value(v, context)))
                .collect(),
        ),
        other => other.clone(),
    }
}
