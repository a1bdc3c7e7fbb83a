//! Tree-walk evaluation of parsed expressions. Errors are ordinary values
//! here; they propagate through operators unchanged and only pick up
//! location context when a whole template is evaluated.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};

use super::ast::{BinaryOp, Expr};
use super::functions;
use super::types::{format_decimal, Value};
use crate::envs::Environment;

/// Evaluates a parsed expression against the given context.
pub fn evaluate(env: &Environment, context: &Value, expr: &Expr) -> Value {
    match expr {
        Expr::TextLiteral(s) => Value::Text(s.clone()),
        Expr::NumberLiteral(d) => Value::Number(*d),
        Expr::BooleanLiteral(b) => Value::Boolean(*b),
        Expr::NullLiteral => Value::Nil,

        Expr::ContextRef(name) => lookup_property(context, name, false),

        Expr::Property { object, key } => {
            let object = evaluate(env, context, object);
            lookup_property(&object, key, false)
        }

        Expr::Index { object, index } => {
            let object = evaluate(env, context, object);
            if object.is_error() {
                return object;
            }
            let index = evaluate(env, context, index);
            match index {
                Value::Error(_) => index,
                Value::Number(n) => lookup_index(&object, n),
                other => match other.to_text(env) {
                    Ok(key) => lookup_property(&object, &key, true),
                    Err(err) => Value::Error(err),
                },
            }
        }

        Expr::FunctionCall { name, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(env, context, arg));
            }
            let function = match functions::lookup(name) {
                Some(f) => f,
                None => return Value::error(format!("no function with name '{name}'")),
            };
            match function(env, &values) {
                Value::Error(err) => Value::error(format!(
                    "error calling {}: {}",
                    name.to_uppercase(),
                    err.message()
                )),
                value => value,
            }
        }

        Expr::Binary { op, left, right } => {
            let left = evaluate(env, context, left);
            let right = evaluate(env, context, right);
            evaluate_binary(env, *op, &left, &right)
        }

        Expr::Negate(operand) => {
            let operand = evaluate(env, context, operand);
            match operand.to_number(env) {
                Ok(n) => Value::Number(-n),
                Err(err) => Value::Error(err),
            }
        }
    }
}

fn evaluate_binary(env: &Environment, op: BinaryOp, left: &Value, right: &Value) -> Value {
    match op {
        BinaryOp::Concat => {
            let left = match left.to_text(env) {
                Ok(s) => s,
                Err(err) => return Value::Error(err),
            };
            let right = match right.to_text(env) {
                Ok(s) => s,
                Err(err) => return Value::Error(err),
            };
            Value::Text(left + &right)
        }

        // equality compares the textual form of both sides
        BinaryOp::Equal | BinaryOp::NotEqual => {
            let left = match left.to_text(env) {
                Ok(s) => s,
                Err(err) => return Value::Error(err),
            };
            let right = match right.to_text(env) {
                Ok(s) => s,
                Err(err) => return Value::Error(err),
            };
            let equal = left == right;
            Value::Boolean(if op == BinaryOp::Equal { equal } else { !equal })
        }

        // ordering is strictly numeric
        BinaryOp::LessThan
        | BinaryOp::LessThanOrEqual
        | BinaryOp::GreaterThan
        | BinaryOp::GreaterThanOrEqual => {
            let (left, right) = match numeric_operands(env, left, right) {
                Ok(pair) => pair,
                Err(err) => return err,
            };
            Value::Boolean(match op {
                BinaryOp::LessThan => left < right,
                BinaryOp::LessThanOrEqual => left <= right,
                BinaryOp::GreaterThan => left > right,
                _ => left >= right,
            })
        }

        BinaryOp::Add | BinaryOp::Subtract | BinaryOp::Multiply => {
            let (left, right) = match numeric_operands(env, left, right) {
                Ok(pair) => pair,
                Err(err) => return err,
            };
            let result = match op {
                BinaryOp::Add => left.checked_add(right),
                BinaryOp::Subtract => left.checked_sub(right),
                _ => left.checked_mul(right),
            };
            match result {
                Some(n) => Value::Number(n),
                None => Value::error("number overflow"),
            }
        }

        BinaryOp::Divide => {
            let (left, right) = match numeric_operands(env, left, right) {
                Ok(pair) => pair,
                Err(err) => return err,
            };
            if right.is_zero() {
                return Value::error("division by zero");
            }
            match left.checked_div(right) {
                Some(n) => Value::Number(n),
                None => Value::error("number overflow"),
            }
        }

        BinaryOp::Exponent => {
            let (left, right) = match numeric_operands(env, left, right) {
                Ok(pair) => pair,
                Err(err) => return err,
            };
            match left.checked_powd(right) {
                Some(n) => Value::Number(n),
                None => Value::error("number overflow"),
            }
        }
    }
}

fn numeric_operands(
    env: &Environment,
    left: &Value,
    right: &Value,
) -> Result<(Decimal, Decimal), Value> {
    let left = left.to_number(env).map_err(Value::Error)?;
    let right = right.to_number(env).map_err(Value::Error)?;
    Ok((left, right))
}

/// Resolves a named property on a value. Dot lookups match object keys
/// case-insensitively (and through snaking); bracket lookups are strict.
pub fn lookup_property(value: &Value, key: &str, strict_case: bool) -> Value {
    match value {
        Value::Error(_) => value.clone(),
        Value::Nil => Value::error(format!("null has no property '{key}'")),
        Value::Object(obj) => {
            let found = if strict_case {
                obj.get(key)
            } else {
                obj.get(key).or_else(|| {
                    let snaked = crate::utils::snakify(key);
                    obj.iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(key) || **k == snaked)
                        .map(|(_, v)| v)
                })
            };
            match found {
                Some(v) => v.clone(),
                None if obj.is_dynamic() => Value::Nil,
                None => Value::error(format!("{} has no property '{key}'", value.repr())),
            }
        }
        _ => Value::error(format!("{} has no property '{key}'", value.repr())),
    }
}

/// Resolves a numeric index on a value. Negative indexes count back from
/// the end of an array.
pub fn lookup_index(value: &Value, index: Decimal) -> Value {
    match value {
        Value::Error(_) => value.clone(),
        Value::Array(items) => {
            let idx = match index.to_i64() {
                Some(i) if index.fract().is_zero() => i,
                _ => return Value::error(format!("{} is not a valid index", format_decimal(index))),
            };
            let len = items.len() as i64;
            let resolved = if idx < 0 { len + idx } else { idx };
            if resolved < 0 || resolved >= len {
                return Value::error(format!(
                    "index {} out of range for {} items",
                    format_decimal(index),
                    len
                ));
            }
            items[resolved as usize].clone()
        }
        _ => Value::error(format!("{} is not indexable", value.repr())),
    }
}
