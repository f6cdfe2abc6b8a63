//! Operations on JSON values with Python-flavoured semantics

use super::parser::{BinaryOp, CompareOp};
use crate::error::{EngineError, Result};
use serde_json::{Map, Number, Value};
use std::cmp::Ordering;

/// Upper bound on collections built by `range` and sequence repetition
pub const MAX_COLLECTION_LEN: usize = 10_000;

/// Upper bound on the footprint of any value an expression builds
pub const MAX_VALUE_SIZE: usize = 1_000_000;

/// Upper bound on the nesting of any value an expression builds
pub const MAX_VALUE_DEPTH: usize = 128;

/// Numeric view of a value; booleans count as 0 and 1
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Num {
    Int(i64),
    Float(f64),
}

impl Num {
    pub fn of(value: &Value) -> Option<Self> {
        match value {
            Value::Bool(b) => Some(Num::Int(i64::from(*b))),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(Num::Int(i)),
                None => n.as_f64().map(Num::Float),
            },
            _ => None,
        }
    }

    pub fn as_f64(self) -> f64 {
        match self {
            Num::Int(i) => i as f64,
            Num::Float(f) => f,
        }
    }

    pub fn into_value(self) -> Result<Value> {
        match self {
            Num::Int(i) => Ok(Value::from(i)),
            Num::Float(f) => float_value(f),
        }
    }
}

/// Wrap a float, rejecting NaN and infinities
pub fn float_value(f: f64) -> Result<Value> {
    Number::from_f64(f)
        .map(Value::Number)
        .ok_or_else(|| EngineError::expression("result is not a finite number"))
}

/// Approximate size of a value: one per node plus string and key bytes
///
/// Fails once the size passes [`MAX_VALUE_SIZE`] or the nesting passes
/// [`MAX_VALUE_DEPTH`], without walking the rest of the value.
pub fn footprint(value: &Value) -> Result<usize> {
    let mut size = 0usize;
    let mut pending = vec![(value, 1usize)];
    while let Some((value, depth)) = pending.pop() {
        if depth > MAX_VALUE_DEPTH {
            return Err(EngineError::expression(format!(
                "value nested deeper than {} levels",
                MAX_VALUE_DEPTH
            )));
        }
        size += 1;
        match value {
            Value::String(s) => size += s.len(),
            Value::Array(items) => pending.extend(items.iter().map(|item| (item, depth + 1))),
            Value::Object(map) => {
                for (key, item) in map {
                    size += key.len();
                    pending.push((item, depth + 1));
                }
            }
            _ => {}
        }
        ensure_size(size)?;
    }
    Ok(size)
}

/// Reject a prospective value size above [`MAX_VALUE_SIZE`]
pub fn ensure_size(size: usize) -> Result<()> {
    if size > MAX_VALUE_SIZE {
        return Err(EngineError::expression(format!(
            "value exceeds the size limit of {}",
            MAX_VALUE_SIZE
        )));
    }
    Ok(())
}

fn overflow() -> EngineError {
    EngineError::expression("integer overflow")
}

/// Python truthiness
pub fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Type name used in error messages
pub fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "None",
        Value::Bool(_) => "bool",
        Value::Number(n) if n.is_f64() => "float",
        Value::Number(_) => "int",
        Value::String(_) => "str",
        Value::Array(_) => "list",
        Value::Object(_) => "dict",
    }
}

/// String form: strings stay raw, everything else is compact JSON
pub fn to_display_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn unsupported(op: &str, left: &Value, right: &Value) -> EngineError {
    EngineError::expression(format!(
        "unsupported operand types for {}: '{}' and '{}'",
        op,
        type_name(left),
        type_name(right)
    ))
}

/// Apply an arithmetic operator
pub fn binary(op: BinaryOp, left: &Value, right: &Value) -> Result<Value> {
    if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
        return arithmetic(op, a, b)?.into_value();
    }

    match (op, left, right) {
        (BinaryOp::Add, Value::String(a), Value::String(b)) => {
            ensure_size(a.len().saturating_add(b.len()))?;
            Ok(Value::String(format!("{}{}", a, b)))
        }
        (BinaryOp::Add, Value::Array(a), Value::Array(b)) => {
            ensure_size(footprint(left)?.saturating_add(footprint(right)?))?;
            let mut joined = a.clone();
            joined.extend(b.iter().cloned());
            Ok(Value::Array(joined))
        }
        (BinaryOp::Mul, Value::String(s), n) | (BinaryOp::Mul, n, Value::String(s))
            if matches!(Num::of(n), Some(Num::Int(_))) =>
        {
            let times = repeat_count(n, s.chars().count())?;
            ensure_size(s.len().saturating_mul(times))?;
            Ok(Value::String(s.repeat(times)))
        }
        (BinaryOp::Mul, Value::Array(items), n) | (BinaryOp::Mul, n, Value::Array(items))
            if matches!(Num::of(n), Some(Num::Int(_))) =>
        {
            let times = repeat_count(n, items.len())?;
            let unit = items.iter().map(footprint).sum::<Result<usize>>()?;
            ensure_size(unit.saturating_mul(times))?;
            let mut repeated = Vec::with_capacity(items.len() * times);
            for _ in 0..times {
                repeated.extend(items.iter().cloned());
            }
            Ok(Value::Array(repeated))
        }
        _ => Err(unsupported(op.symbol(), left, right)),
    }
}

fn repeat_count(n: &Value, unit: usize) -> Result<usize> {
    let times = match Num::of(n) {
        Some(Num::Int(i)) if i > 0 => usize::try_from(i).map_err(|_| overflow())?,
        _ => 0,
    };
    if unit.saturating_mul(times) > MAX_COLLECTION_LEN {
        return Err(EngineError::expression(format!(
            "repetition exceeds {} elements",
            MAX_COLLECTION_LEN
        )));
    }
    Ok(times)
}

/// Numeric arithmetic with Python division semantics
pub fn arithmetic(op: BinaryOp, a: Num, b: Num) -> Result<Num> {
    match (a, b) {
        (Num::Int(x), Num::Int(y)) => int_arithmetic(op, x, y),
        _ => {
            let (x, y) = (a.as_f64(), b.as_f64());
            let result = match op {
                BinaryOp::Add => x + y,
                BinaryOp::Sub => x - y,
                BinaryOp::Mul => x * y,
                BinaryOp::Div => {
                    check_divisor(y)?;
                    x / y
                }
                BinaryOp::FloorDiv => {
                    check_divisor(y)?;
                    (x / y).floor()
                }
                BinaryOp::Mod => {
                    check_divisor(y)?;
                    x - y * (x / y).floor()
                }
                BinaryOp::Pow => x.powf(y),
            };
            Ok(Num::Float(result))
        }
    }
}

fn check_divisor(y: f64) -> Result<()> {
    if y == 0.0 {
        Err(EngineError::expression("division by zero"))
    } else {
        Ok(())
    }
}

fn int_arithmetic(op: BinaryOp, x: i64, y: i64) -> Result<Num> {
    let result = match op {
        BinaryOp::Add => x.checked_add(y).ok_or_else(overflow)?,
        BinaryOp::Sub => x.checked_sub(y).ok_or_else(overflow)?,
        BinaryOp::Mul => x.checked_mul(y).ok_or_else(overflow)?,
        BinaryOp::Div => {
            check_divisor(y as f64)?;
            return Ok(Num::Float(x as f64 / y as f64));
        }
        BinaryOp::FloorDiv => {
            check_divisor(y as f64)?;
            let q = x.checked_div(y).ok_or_else(overflow)?;
            if x % y != 0 && ((x < 0) != (y < 0)) {
                q - 1
            } else {
                q
            }
        }
        BinaryOp::Mod => {
            check_divisor(y as f64)?;
            let r = x.checked_rem(y).ok_or_else(overflow)?;
            if r != 0 && ((r < 0) != (y < 0)) {
                r + y
            } else {
                r
            }
        }
        BinaryOp::Pow => {
            if y < 0 {
                return Ok(Num::Float((x as f64).powf(y as f64)));
            }
            let exp = u32::try_from(y).map_err(|_| overflow())?;
            x.checked_pow(exp).ok_or_else(overflow)?
        }
    };
    Ok(Num::Int(result))
}

/// Equality with numeric coercion (`1 == 1.0`, `True == 1`)
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).map(|w| values_equal(v, w)).unwrap_or(false))
        }
        _ => match (Num::of(left), Num::of(right)) {
            (Some(Num::Int(x)), Some(Num::Int(y))) => x == y,
            (Some(x), Some(y)) => x.as_f64() == y.as_f64(),
            _ => left == right,
        },
    }
}

/// Ordering between numbers, strings or lists
pub fn compare_values(left: &Value, right: &Value) -> Result<Ordering> {
    if let (Some(a), Some(b)) = (Num::of(left), Num::of(right)) {
        return Ok(match (a, b) {
            (Num::Int(x), Num::Int(y)) => x.cmp(&y),
            _ => a
                .as_f64()
                .partial_cmp(&b.as_f64())
                .unwrap_or(Ordering::Equal),
        });
    }
    match (left, right) {
        (Value::String(a), Value::String(b)) => Ok(a.cmp(b)),
        (Value::Array(a), Value::Array(b)) => {
            for (x, y) in a.iter().zip(b) {
                let ord = compare_values(x, y)?;
                if ord != Ordering::Equal {
                    return Ok(ord);
                }
            }
            Ok(a.len().cmp(&b.len()))
        }
        _ => Err(EngineError::expression(format!(
            "ordering not supported between '{}' and '{}'",
            type_name(left),
            type_name(right)
        ))),
    }
}

/// Membership test: substring, list element or object key
pub fn contains(container: &Value, item: &Value) -> Result<bool> {
    match (container, item) {
        (Value::String(haystack), Value::String(needle)) => Ok(haystack.contains(needle.as_str())),
        (Value::String(_), other) => Err(EngineError::expression(format!(
            "'in <str>' requires str as left operand, not '{}'",
            type_name(other)
        ))),
        (Value::Array(items), _) => Ok(items.iter().any(|v| values_equal(v, item))),
        (Value::Object(map), Value::String(key)) => Ok(map.contains_key(key)),
        (Value::Object(_), _) => Ok(false),
        (other, _) => Err(EngineError::expression(format!(
            "argument of type '{}' is not iterable",
            type_name(other)
        ))),
    }
}

/// Evaluate one comparison operator
pub fn compare(op: CompareOp, left: &Value, right: &Value) -> Result<bool> {
    Ok(match op {
        CompareOp::Eq => values_equal(left, right),
        CompareOp::Ne => !values_equal(left, right),
        CompareOp::Lt => compare_values(left, right)? == Ordering::Less,
        CompareOp::Le => compare_values(left, right)? != Ordering::Greater,
        CompareOp::Gt => compare_values(left, right)? == Ordering::Greater,
        CompareOp::Ge => compare_values(left, right)? != Ordering::Less,
        CompareOp::In => contains(right, left)?,
        CompareOp::NotIn => !contains(right, left)?,
    })
}

fn list_position(len: usize, index: i64) -> Option<usize> {
    let len = i64::try_from(len).ok()?;
    let resolved = if index < 0 { len + index } else { index };
    if (0..len).contains(&resolved) {
        usize::try_from(resolved).ok()
    } else {
        None
    }
}

/// Subscript access with negative indices for lists and strings
pub fn index(container: &Value, key: &Value) -> Result<Value> {
    match (container, key) {
        (Value::Array(items), Value::Number(n)) if n.is_i64() => {
            let i = n.as_i64().unwrap_or_default();
            list_position(items.len(), i)
                .and_then(|pos| items.get(pos).cloned())
                .ok_or_else(|| EngineError::expression("list index out of range"))
        }
        (Value::String(s), Value::Number(n)) if n.is_i64() => {
            let i = n.as_i64().unwrap_or_default();
            let chars: Vec<char> = s.chars().collect();
            list_position(chars.len(), i)
                .map(|pos| Value::String(chars[pos].to_string()))
                .ok_or_else(|| EngineError::expression("string index out of range"))
        }
        (Value::Object(map), Value::String(k)) => map
            .get(k)
            .cloned()
            .ok_or_else(|| EngineError::expression(format!("key not found: '{}'", k))),
        _ => Err(EngineError::expression(format!(
            "'{}' is not subscriptable with '{}'",
            type_name(container),
            type_name(key)
        ))),
    }
}

/// Store `value` at `container[key]`
pub fn set_index(container: &mut Value, key: &Value, value: Value) -> Result<()> {
    match (container, key) {
        (Value::Array(items), Value::Number(n)) if n.is_i64() => {
            let i = n.as_i64().unwrap_or_default();
            let pos = list_position(items.len(), i)
                .ok_or_else(|| EngineError::expression("list assignment index out of range"))?;
            items[pos] = value;
            Ok(())
        }
        (Value::Object(map), Value::String(k)) => {
            map.insert(k.clone(), value);
            Ok(())
        }
        (other, _) => Err(EngineError::expression(format!(
            "'{}' does not support item assignment with '{}'",
            type_name(other),
            type_name(key)
        ))),
    }
}

/// Build an object from evaluated key/value pairs; keys must be strings
pub fn object_from_pairs(pairs: Vec<(Value, Value)>) -> Result<Value> {
    let mut map = Map::with_capacity(pairs.len());
    for (key, value) in pairs {
        match key {
            Value::String(k) => {
                map.insert(k, value);
            }
            other => {
                return Err(EngineError::expression(format!(
                    "object keys must be strings, not '{}'",
                    type_name(&other)
                )))
            }
        }
    }
    Ok(Value::Object(map))
}
