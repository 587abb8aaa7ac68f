//! Default operator implementations.
//!
//! Arithmetic preserves the integer/float split: same-type operands use
//! native arithmetic, and mixed operands go through high-precision decimals
//! so that results which are mathematically whole come back as integers.

use std::cmp::Ordering;
use std::rc::Rc;

use rust_decimal::{Decimal, prelude::FromPrimitive, prelude::ToPrimitive};

use crate::error::EvalError;
use crate::grammar::Grammar;
use crate::value::{Value, type_name};

/// Installs the default operator set into a grammar.
pub(crate) fn register_defaults(grammar: &mut Grammar) {
    grammar.add_binary_op("+", 30, Rc::new(add));
    grammar.add_binary_op("-", 30, Rc::new(subtract));
    grammar.add_binary_op("*", 40, Rc::new(multiply));
    grammar.add_binary_op("/", 40, Rc::new(divide));
    grammar.add_binary_op("%", 50, Rc::new(modulo));
    grammar.add_binary_op("^", 50, Rc::new(power));
    grammar.add_binary_op("==", 20, Rc::new(equal));
    grammar.add_binary_op("!=", 20, Rc::new(not_equal));
    grammar.add_binary_op("<", 20, Rc::new(less));
    grammar.add_binary_op("<=", 20, Rc::new(less_equal));
    grammar.add_binary_op(">", 20, Rc::new(greater));
    grammar.add_binary_op(">=", 20, Rc::new(greater_equal));
    grammar.add_binary_op("&&", 10, Rc::new(and));
    grammar.add_binary_op("||", 10, Rc::new(or));
    grammar.add_binary_op("in", 20, Rc::new(contains));
    grammar.add_unary_op("!", Rc::new(not));
}

/// Mixed integer/float arithmetic through decimals. Returns an Integer when
/// the exact result is whole.
fn decimal_mixed(a: &Value, b: &Value, apply: fn(Decimal, Decimal) -> Decimal) -> Option<Value> {
    let ad = match a {
        Value::Integer(n) => Decimal::from_i64(*n),
        Value::Float(n) => Decimal::from_f64(*n),
        _ => None,
    }?;
    let bd = match b {
        Value::Integer(n) => Decimal::from_i64(*n),
        Value::Float(n) => Decimal::from_f64(*n),
        _ => None,
    }?;
    let rd = apply(ad, bd);
    if rd.is_integer()
        && let Some(r) = rd.to_i64()
    {
        return Some(Value::Integer(r));
    }
    rd.to_f64().map(Value::Float)
}

pub fn add(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::String(a), b) => Ok(Value::String(format!("{}{}", a, b.as_string()))),
        (a, Value::String(b)) => Ok(Value::String(format!("{}{}", a.as_string(), b))),
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a + b)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a + b)),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(af), Some(bf)) => {
                if let Some(v) = decimal_mixed(a, b, |x, y| x + y) {
                    return Ok(v);
                }
                Ok(Value::Float(af + bf))
            }
            _ => Err(EvalError::TypeError(format!(
                "Cannot add {} and {}",
                type_name(a),
                type_name(b)
            ))),
        },
    }
}

pub fn subtract(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a - b)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a - b)),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(af), Some(bf)) => {
                if let Some(v) = decimal_mixed(a, b, |x, y| x - y) {
                    return Ok(v);
                }
                Ok(Value::Float(af - bf))
            }
            _ => Err(EvalError::TypeError(format!(
                "Cannot subtract {} from {}",
                type_name(b),
                type_name(a)
            ))),
        },
    }
}

pub fn multiply(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a * b)),
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a * b)),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(af), Some(bf)) => {
                if let Some(v) = decimal_mixed(a, b, |x, y| x * y) {
                    return Ok(v);
                }
                Ok(Value::Float(af * bf))
            }
            _ => Err(EvalError::TypeError(format!(
                "Cannot multiply {} by {}",
                type_name(a),
                type_name(b)
            ))),
        },
    }
}

pub fn divide(left: &Value, right: &Value) -> Result<Value, EvalError> {
    if right.as_float() == Some(0.0) {
        return Err(EvalError::DivisionByZero);
    }
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => {
            // Exact division stays an integer; otherwise fall to float
            if a % b == 0 {
                Ok(Value::Integer(a / b))
            } else {
                Ok(Value::Float(*a as f64 / *b as f64))
            }
        }
        (Value::Float(a), Value::Float(b)) => Ok(Value::Float(a / b)),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(af), Some(bf)) => {
                if let Some(v) = decimal_mixed(a, b, |x, y| x / y) {
                    return Ok(v);
                }
                Ok(Value::Float(af / bf))
            }
            _ => Err(EvalError::TypeError(format!(
                "Cannot divide {} by {}",
                type_name(a),
                type_name(b)
            ))),
        },
    }
}

pub fn modulo(left: &Value, right: &Value) -> Result<Value, EvalError> {
    if right.as_float() == Some(0.0) {
        return Err(EvalError::DivisionByZero);
    }
    match (left, right) {
        (Value::Integer(a), Value::Integer(b)) => Ok(Value::Integer(a % b)),
        (a, b) => match (a.as_float(), b.as_float()) {
            (Some(af), Some(bf)) => Ok(Value::Float(af % bf)),
            _ => Err(EvalError::TypeError(format!(
                "Cannot take {} modulo {}",
                type_name(a),
                type_name(b)
            ))),
        },
    }
}

pub fn power(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match (left.as_float(), right.as_float()) {
        (Some(base), Some(exp)) => {
            let result = base.powf(exp);
            if result.is_finite()
                && result.fract() == 0.0
                && result.abs() <= i64::MAX as f64
            {
                Ok(Value::Integer(result as i64))
            } else {
                Ok(Value::Float(result))
            }
        }
        _ => Err(EvalError::TypeError(format!(
            "Cannot raise {} to {}",
            type_name(left),
            type_name(right)
        ))),
    }
}

pub fn equal(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(left == right))
}

pub fn not_equal(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(left != right))
}

fn compare(left: &Value, right: &Value) -> Result<Ordering, EvalError> {
    if let (Some(a), Some(b)) = (left.as_float(), right.as_float()) {
        return a
            .partial_cmp(&b)
            .ok_or_else(|| EvalError::TypeError("Cannot order NaN".to_string()));
    }
    if let (Value::String(a), Value::String(b)) = (left, right) {
        return Ok(a.cmp(b));
    }
    Err(EvalError::TypeError(format!(
        "Cannot compare {} with {}",
        type_name(left),
        type_name(right)
    )))
}

pub fn less(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(compare(left, right)? == Ordering::Less))
}

pub fn less_equal(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(compare(left, right)? != Ordering::Greater))
}

pub fn greater(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(compare(left, right)? == Ordering::Greater))
}

pub fn greater_equal(left: &Value, right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(compare(left, right)? != Ordering::Less))
}

pub fn and(left: &Value, right: &Value) -> Result<Value, EvalError> {
    if left.as_bool() {
        Ok(right.clone())
    } else {
        Ok(left.clone())
    }
}

pub fn or(left: &Value, right: &Value) -> Result<Value, EvalError> {
    if left.as_bool() {
        Ok(left.clone())
    } else {
        Ok(right.clone())
    }
}

pub fn contains(left: &Value, right: &Value) -> Result<Value, EvalError> {
    match right {
        Value::Array(items) => Ok(Value::Boolean(items.iter().any(|item| item == left))),
        Value::String(haystack) => match left {
            Value::String(needle) => Ok(Value::Boolean(haystack.contains(needle))),
            other => Err(EvalError::TypeError(format!(
                "Cannot search a string for {}",
                type_name(other)
            ))),
        },
        other => Err(EvalError::TypeError(format!(
            "Cannot search {} with 'in'",
            type_name(other)
        ))),
    }
}

pub fn not(right: &Value) -> Result<Value, EvalError> {
    Ok(Value::Boolean(!right.as_bool()))
}
