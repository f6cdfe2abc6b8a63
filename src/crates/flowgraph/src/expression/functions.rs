//! Allow-listed pure functions
//!
//! This table is the complete set of callables reachable from an
//! expression. Names not listed here are rejected by the parser.

use super::value::{
    arithmetic, compare_values, float_value, is_truthy, to_display_string, type_name, Num,
    MAX_COLLECTION_LEN,
};
use super::parser::BinaryOp;
use crate::error::{EngineError, Result};
use serde_json::Value;
use std::cmp::Ordering;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Function {
    Len,
    Str,
    Int,
    Float,
    Bool,
    List,
    Abs,
    Min,
    Max,
    Round,
    Sum,
    Range,
    Sorted,
    Keys,
    Values,
    Lower,
    Upper,
}

impl Function {
    pub fn lookup(name: &str) -> Option<Self> {
        let function = match name {
            "len" => Self::Len,
            "str" => Self::Str,
            "int" => Self::Int,
            "float" => Self::Float,
            "bool" => Self::Bool,
            "list" => Self::List,
            "abs" => Self::Abs,
            "min" => Self::Min,
            "max" => Self::Max,
            "round" => Self::Round,
            "sum" => Self::Sum,
            "range" => Self::Range,
            "sorted" => Self::Sorted,
            "keys" => Self::Keys,
            "values" => Self::Values,
            "lower" => Self::Lower,
            "upper" => Self::Upper,
            _ => return None,
        };
        Some(function)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Len => "len",
            Self::Str => "str",
            Self::Int => "int",
            Self::Float => "float",
            Self::Bool => "bool",
            Self::List => "list",
            Self::Abs => "abs",
            Self::Min => "min",
            Self::Max => "max",
            Self::Round => "round",
            Self::Sum => "sum",
            Self::Range => "range",
            Self::Sorted => "sorted",
            Self::Keys => "keys",
            Self::Values => "values",
            Self::Lower => "lower",
            Self::Upper => "upper",
        }
    }

    /// Accepted argument counts (inclusive); `None` means unbounded
    fn arity(&self) -> (usize, Option<usize>) {
        match self {
            Self::Min | Self::Max => (1, None),
            Self::Round | Self::Sum => (1, Some(2)),
            Self::Range => (1, Some(3)),
            _ => (1, Some(1)),
        }
    }

    pub fn check_arity(&self, count: usize) -> Result<()> {
        let (min, max) = self.arity();
        if count < min || max.map(|m| count > m).unwrap_or(false) {
            return Err(EngineError::expression(format!(
                "{}() got {} argument(s)",
                self.name(),
                count
            )));
        }
        Ok(())
    }

    /// Invoke the function on already-evaluated arguments
    pub fn call(&self, args: Vec<Value>) -> Result<Value> {
        self.check_arity(args.len())?;
        match self {
            Self::Len => len(&args[0]),
            Self::Str => Ok(Value::String(to_display_string(&args[0]))),
            Self::Int => to_int(&args[0]),
            Self::Float => to_float(&args[0]),
            Self::Bool => Ok(Value::Bool(is_truthy(&args[0]))),
            Self::List => to_list(&args[0]).map(Value::Array),
            Self::Abs => abs(&args[0]),
            Self::Min => extreme(self.name(), args, Ordering::Less),
            Self::Max => extreme(self.name(), args, Ordering::Greater),
            Self::Round => round(&args[0], args.get(1)),
            Self::Sum => sum(&args[0], args.get(1)),
            Self::Range => range(&args),
            Self::Sorted => sorted(&args[0]),
            Self::Keys => match &args[0] {
                Value::Object(map) => Ok(Value::Array(
                    map.keys().map(|k| Value::String(k.clone())).collect(),
                )),
                other => Err(self.type_error(other)),
            },
            Self::Values => match &args[0] {
                Value::Object(map) => Ok(Value::Array(map.values().cloned().collect())),
                other => Err(self.type_error(other)),
            },
            Self::Lower => match &args[0] {
                Value::String(s) => Ok(Value::String(s.to_lowercase())),
                other => Err(self.type_error(other)),
            },
            Self::Upper => match &args[0] {
                Value::String(s) => Ok(Value::String(s.to_uppercase())),
                other => Err(self.type_error(other)),
            },
        }
    }

    fn type_error(&self, value: &Value) -> EngineError {
        EngineError::expression(format!(
            "{}() does not accept '{}'",
            self.name(),
            type_name(value)
        ))
    }
}

fn len(value: &Value) -> Result<Value> {
    let n = match value {
        Value::String(s) => s.chars().count(),
        Value::Array(a) => a.len(),
        Value::Object(o) => o.len(),
        other => {
            return Err(EngineError::expression(format!(
                "object of type '{}' has no len()",
                type_name(other)
            )))
        }
    };
    Ok(Value::from(n))
}

fn to_int(value: &Value) -> Result<Value> {
    match value {
        Value::String(s) => s
            .trim()
            .parse::<i64>()
            .map(Value::from)
            .map_err(|_| EngineError::expression(format!("invalid literal for int(): '{}'", s))),
        other => match Num::of(other) {
            Some(Num::Int(i)) => Ok(Value::from(i)),
            Some(Num::Float(f)) => {
                let truncated = f.trunc();
                if truncated >= i64::MIN as f64 && truncated < i64::MAX as f64 {
                    Ok(Value::from(truncated as i64))
                } else {
                    Err(EngineError::expression("float too large to convert to int"))
                }
            }
            None => Err(Function::Int.type_error(other)),
        },
    }
}

fn to_float(value: &Value) -> Result<Value> {
    match value {
        Value::String(s) => {
            let parsed = s.trim().parse::<f64>().map_err(|_| {
                EngineError::expression(format!("could not convert string to float: '{}'", s))
            })?;
            float_value(parsed)
        }
        other => match Num::of(other) {
            Some(n) => float_value(n.as_f64()),
            None => Err(Function::Float.type_error(other)),
        },
    }
}

fn to_list(value: &Value) -> Result<Vec<Value>> {
    match value {
        Value::Array(items) => Ok(items.clone()),
        Value::String(s) => Ok(s.chars().map(|c| Value::String(c.to_string())).collect()),
        Value::Object(map) => Ok(map.keys().map(|k| Value::String(k.clone())).collect()),
        other => Err(EngineError::expression(format!(
            "'{}' object is not iterable",
            type_name(other)
        ))),
    }
}

fn abs(value: &Value) -> Result<Value> {
    match Num::of(value) {
        Some(Num::Int(i)) => i
            .checked_abs()
            .map(Value::from)
            .ok_or_else(|| EngineError::expression("integer overflow")),
        Some(Num::Float(f)) => float_value(f.abs()),
        None => Err(Function::Abs.type_error(value)),
    }
}

/// Shared body of `min` and `max`; the first extreme element wins ties
fn extreme(name: &str, args: Vec<Value>, wanted: Ordering) -> Result<Value> {
    let candidates = if args.len() == 1 {
        to_list(&args[0])?
    } else {
        args
    };

    let mut iter = candidates.into_iter();
    let mut best = iter
        .next()
        .ok_or_else(|| EngineError::expression(format!("{}() arg is an empty sequence", name)))?;
    for candidate in iter {
        if compare_values(&candidate, &best)? == wanted {
            best = candidate;
        }
    }
    Ok(best)
}

fn round(value: &Value, ndigits: Option<&Value>) -> Result<Value> {
    let number = Num::of(value).ok_or_else(|| Function::Round.type_error(value))?;
    let digits = match ndigits {
        None | Some(Value::Null) => None,
        Some(d) => match Num::of(d) {
            Some(Num::Int(i)) => Some(i),
            _ => return Err(EngineError::expression("round() ndigits must be an integer")),
        },
    };

    match (number, digits) {
        (Num::Int(i), None) => Ok(Value::from(i)),
        (Num::Float(f), None) => {
            let r = f.round_ties_even();
            if r >= i64::MIN as f64 && r < i64::MAX as f64 {
                Ok(Value::from(r as i64))
            } else {
                Err(EngineError::expression("float too large to round to int"))
            }
        }
        (Num::Int(i), Some(d)) if d >= 0 => Ok(Value::from(i)),
        (n, Some(d)) => {
            let exponent = i32::try_from(d.clamp(-308, 308)).unwrap_or(0);
            let factor = 10f64.powi(exponent);
            let rounded = (n.as_f64() * factor).round_ties_even() / factor;
            match n {
                Num::Int(_) => Ok(Value::from(rounded as i64)),
                Num::Float(_) => float_value(rounded),
            }
        }
    }
}

fn sum(items: &Value, start: Option<&Value>) -> Result<Value> {
    let items = match items {
        Value::Array(items) => items,
        other => return Err(Function::Sum.type_error(other)),
    };
    let start = start.cloned().unwrap_or_else(|| Value::from(0));
    let mut total = Num::of(&start).ok_or_else(|| Function::Sum.type_error(&start))?;
    for item in items {
        let n = Num::of(item).ok_or_else(|| Function::Sum.type_error(item))?;
        total = arithmetic(BinaryOp::Add, total, n)?;
    }
    total.into_value()
}

fn range(args: &[Value]) -> Result<Value> {
    let mut ints = Vec::with_capacity(args.len());
    for arg in args {
        match Num::of(arg) {
            Some(Num::Int(i)) if !arg.is_boolean() => ints.push(i),
            _ => return Err(Function::Range.type_error(arg)),
        }
    }
    let (start, stop, step) = match ints.as_slice() {
        [stop] => (0, *stop, 1),
        [start, stop] => (*start, *stop, 1),
        [start, stop, step] => (*start, *stop, *step),
        _ => return Err(EngineError::expression("range() expects 1 to 3 arguments")),
    };
    if step == 0 {
        return Err(EngineError::expression("range() arg 3 must not be zero"));
    }

    let span = if step > 0 {
        (i128::from(stop) - i128::from(start)).max(0)
    } else {
        (i128::from(start) - i128::from(stop)).max(0)
    };
    let step_len = i128::from(step).abs();
    let count = (span + step_len - 1) / step_len;
    if count > MAX_COLLECTION_LEN as i128 {
        return Err(EngineError::expression(format!(
            "range() result exceeds {} elements",
            MAX_COLLECTION_LEN
        )));
    }

    let mut values = Vec::new();
    let mut current = i128::from(start);
    for _ in 0..count {
        values.push(Value::from(current as i64));
        current += i128::from(step);
    }
    Ok(Value::Array(values))
}

fn sorted(value: &Value) -> Result<Value> {
    let mut items = to_list(value)?;
    let mut failure = None;
    items.sort_by(|a, b| match compare_values(a, b) {
        Ok(ord) => ord,
        Err(e) => {
            failure.get_or_insert(e);
            Ordering::Equal
        }
    });
    match failure {
        Some(e) => Err(e),
        None => Ok(Value::Array(items)),
    }
}
