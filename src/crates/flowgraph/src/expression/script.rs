//! Statement interpreter for function nodes
//!
//! A script runs over a private copy of the context. Its result is whatever
//! it binds to `output`; nothing else leaks back to the caller.

use super::parser::{parse_program, Stmt};
use super::{eval, value};
use crate::error::{EngineError, Result};
use crate::models::Context;
use serde_json::{Map, Value};

/// Variable a script binds its result to
pub const OUTPUT_VARIABLE: &str = "output";

/// Run function-node code and return its `output` binding (`{}` if unset)
pub fn run_function(code: &str, context: &Context) -> Result<Value> {
    let program = parse_program(code)?;
    let mut locals = context.clone();
    for statement in &program {
        execute(statement, &mut locals)?;
    }
    Ok(locals
        .remove(OUTPUT_VARIABLE)
        .unwrap_or_else(|| Value::Object(Map::new())))
}

fn execute(statement: &Stmt, locals: &mut Context) -> Result<()> {
    match statement {
        Stmt::Expr(expr) => {
            eval(expr, locals)?;
        }
        Stmt::Assign(name, expr) => {
            let value = eval(expr, locals)?;
            value::footprint(&value)?;
            locals.insert(name.clone(), value);
        }
        Stmt::AugAssign(name, op, expr) => {
            let right = eval(expr, locals)?;
            let current = locals
                .get(name)
                .ok_or_else(|| undefined(name))?;
            let updated = value::binary(*op, current, &right)?;
            locals.insert(name.clone(), updated);
        }
        Stmt::AssignIndex { name, keys, value: expr } => {
            let new_value = eval(expr, locals)?;
            let keys = keys
                .iter()
                .map(|key| eval(key, locals))
                .collect::<Result<Vec<_>>>()?;

            let (last, path) = keys
                .split_last()
                .ok_or_else(|| EngineError::expression("invalid assignment target"))?;
            let mut target = locals.get_mut(name).ok_or_else(|| undefined(name))?;
            for key in path {
                target = child_mut(target, key)?;
            }
            value::set_index(target, last, new_value)?;
            // Self-referencing stores like `x[0] = x` double the variable
            if let Some(root) = locals.get(name) {
                value::footprint(root)?;
            }
        }
    }
    Ok(())
}

fn undefined(name: &str) -> EngineError {
    EngineError::expression(format!("name '{}' is not defined", name))
}

fn child_mut<'a>(container: &'a mut Value, key: &Value) -> Result<&'a mut Value> {
    let type_name = value::type_name(container);
    match (container, key) {
        (Value::Array(items), Value::Number(n)) if n.is_i64() => {
            let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
            let i = n.as_i64().unwrap_or_default();
            let resolved = if i < 0 { len + i } else { i };
            usize::try_from(resolved)
                .ok()
                .and_then(|pos| items.get_mut(pos))
                .ok_or_else(|| EngineError::expression("list index out of range"))
        }
        (Value::Object(map), Value::String(k)) => map
            .get_mut(k)
            .ok_or_else(|| EngineError::expression(format!("key not found: '{}'", k))),
        _ => Err(EngineError::expression(format!(
            "'{}' is not subscriptable with '{}'",
            type_name,
            value::type_name(key)
        ))),
    }
}
