//! Restricted expression language
//!
//! Conditions, edge guards and function-node scripts are parsed into a small
//! AST and interpreted over JSON values. The only names an expression can
//! reach are the context variables and the allow-listed functions in
//! [`functions`]; there is no attribute access, import or I/O.

pub mod functions;
pub mod lexer;
pub mod parser;
pub mod script;
pub mod template;
pub mod value;

pub use parser::{parse_expression, parse_program, Expr, Stmt};
pub use script::run_function;
pub use template::{render, render_value};
pub use value::is_truthy;

use crate::error::{EngineError, Result};
use crate::models::Context;
use parser::UnaryOp;
use serde_json::Value;

/// Parse and evaluate an expression against a context
pub fn evaluate(source: &str, context: &Context) -> Result<Value> {
    let expr = parse_expression(source)?;
    eval(&expr, context)
}

/// Evaluate an expression and reduce the result to its truthiness
pub fn evaluate_condition(source: &str, context: &Context) -> Result<bool> {
    Ok(is_truthy(&evaluate(source, context)?))
}

/// Interpret an AST node
pub(crate) fn eval(expr: &Expr, scope: &Context) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Variable(name) => scope
            .get(name)
            .cloned()
            .ok_or_else(|| EngineError::expression(format!("name '{}' is not defined", name))),
        Expr::List(items) => {
            let mut size = 1usize;
            let mut built = Vec::with_capacity(items.len());
            for item in items {
                let item = eval(item, scope)?;
                size = size.saturating_add(value::footprint(&item)?);
                value::ensure_size(size)?;
                built.push(item);
            }
            Ok(Value::Array(built))
        }
        Expr::Object(entries) => {
            let mut size = 1usize;
            let mut pairs = Vec::with_capacity(entries.len());
            for (key, item) in entries {
                let (key, item) = (eval(key, scope)?, eval(item, scope)?);
                size = size
                    .saturating_add(value::footprint(&key)?)
                    .saturating_add(value::footprint(&item)?);
                value::ensure_size(size)?;
                pairs.push((key, item));
            }
            value::object_from_pairs(pairs)
        }
        Expr::Unary(op, operand) => {
            let operand = eval(operand, scope)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!is_truthy(&operand))),
                UnaryOp::Neg => match value::Num::of(&operand) {
                    Some(value::Num::Int(i)) => i
                        .checked_neg()
                        .map(Value::from)
                        .ok_or_else(|| EngineError::expression("integer overflow")),
                    Some(value::Num::Float(f)) => value::float_value(-f),
                    None => Err(EngineError::expression(format!(
                        "bad operand type for unary -: '{}'",
                        value::type_name(&operand)
                    ))),
                },
                UnaryOp::Pos => match value::Num::of(&operand) {
                    Some(n) => n.into_value(),
                    None => Err(EngineError::expression(format!(
                        "bad operand type for unary +: '{}'",
                        value::type_name(&operand)
                    ))),
                },
            }
        }
        Expr::Binary(op, left, right) => {
            let left = eval(left, scope)?;
            let right = eval(right, scope)?;
            value::binary(*op, &left, &right)
        }
        Expr::And(left, right) => {
            let left = eval(left, scope)?;
            if is_truthy(&left) {
                eval(right, scope)
            } else {
                Ok(left)
            }
        }
        Expr::Or(left, right) => {
            let left = eval(left, scope)?;
            if is_truthy(&left) {
                Ok(left)
            } else {
                eval(right, scope)
            }
        }
        Expr::Compare { first, rest } => {
            let mut left = eval(first, scope)?;
            for (op, operand) in rest {
                let right = eval(operand, scope)?;
                if !value::compare(*op, &left, &right)? {
                    return Ok(Value::Bool(false));
                }
                left = right;
            }
            Ok(Value::Bool(true))
        }
        Expr::Index(container, key) => {
            let container = eval(container, scope)?;
            let key = eval(key, scope)?;
            value::index(&container, &key)
        }
        Expr::Call(function, args) => {
            let args = args
                .iter()
                .map(|arg| eval(arg, scope))
                .collect::<Result<Vec<_>>>()?;
            function.call(args)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx(value: Value) -> Context {
        match value {
            Value::Object(map) => map,
            _ => Context::new(),
        }
    }

    #[test]
    fn test_condition_comparisons() {
        let c = ctx(json!({"x": 10, "name": "bob", "tags": ["a", "b"]}));
        assert!(evaluate_condition("x > 5", &c).unwrap());
        assert!(!evaluate_condition("x > 5 and name == 'alice'", &c).unwrap());
        assert!(evaluate_condition("x > 50 or 'a' in tags", &c).unwrap());
        assert!(evaluate_condition("not (x < 5)", &c).unwrap());
        assert!(evaluate_condition("0 < x <= 10", &c).unwrap());
        assert!(evaluate_condition("len(tags) == 2 && x % 2 == 0", &c).unwrap());
    }

    #[test]
    fn test_long_operator_chain_is_an_expression_error() {
        let c = ctx(json!({"x": 0}));
        let chain = format!("x{}", " + x".repeat(200_000));
        let err = evaluate_condition(&chain, &c).unwrap_err();
        assert_eq!(err.kind(), "expression_error");
        assert!(evaluate(&chain, &c).is_err());
        assert_eq!(evaluate("x + x + x + 1", &c).unwrap(), json!(1));
    }

    #[test]
    fn test_literals_respect_value_size() {
        let c = ctx(json!({"s": "y".repeat(600_000)}));
        assert!(evaluate("[s, s]", &c).is_err());
        assert!(evaluate("{'a': s, 'b': s}", &c).is_err());
        assert_eq!(evaluate("[len(s)]", &c).unwrap(), json!([600_000]));
    }

    #[test]
    fn test_boolean_operators_return_operands() {
        let c = ctx(json!({"empty": "", "fallback": "default"}));
        assert_eq!(evaluate("empty or fallback", &c).unwrap(), json!("default"));
        assert_eq!(evaluate("empty and fallback", &c).unwrap(), json!(""));
    }

    #[test]
    fn test_short_circuit_skips_errors() {
        let c = ctx(json!({"x": 0}));
        assert!(!evaluate_condition("x != 0 and 10 / x > 1", &c).unwrap());
        assert!(evaluate_condition("x == 0 or undefined_name", &c).unwrap());
    }

    #[test]
    fn test_undefined_variable_is_an_error() {
        let err = evaluate("missing > 1", &Context::new()).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }

    #[test]
    fn test_arithmetic_and_functions() {
        let c = ctx(json!({"a": 7, "b": 2, "scores": [3, 9, 4]}));
        assert_eq!(evaluate("a // b", &c).unwrap(), json!(3));
        assert_eq!(evaluate("a / b", &c).unwrap(), json!(3.5));
        assert_eq!(evaluate("-a ** 2", &c).unwrap(), json!(-49));
        assert_eq!(evaluate("max(scores) - min(scores)", &c).unwrap(), json!(6));
        assert_eq!(evaluate("round(sum(scores) / len(scores), 2)", &c).unwrap(), json!(5.33));
        assert_eq!(evaluate("abs(b - a)", &c).unwrap(), json!(5));
    }

    #[test]
    fn test_literals_and_subscripts() {
        let c = ctx(json!({"user": {"roles": ["admin", "dev"]}}));
        assert!(evaluate_condition("user['roles'][0] == 'admin'", &c).unwrap());
        assert_eq!(evaluate("{'k': [1, None, True]}", &c).unwrap(), json!({"k": [1, null, true]}));
        assert!(evaluate("{1: 2}", &c).is_err());
    }

    #[test]
    fn test_sandbox_rejections() {
        let c = ctx(json!({"x": 1}));
        for source in [
            "__import__('os').system('ls')",
            "x.__class__",
            "open('/etc/passwd')",
            "exec('1')",
            "[c for c in x]",
        ] {
            assert!(evaluate(source, &c).is_err(), "{} should be rejected", source);
        }
    }

    #[test]
    fn test_empty_condition_is_an_error() {
        assert!(evaluate_condition("", &Context::new()).is_err());
        assert!(evaluate_condition("   ", &Context::new()).is_err());
    }
}
