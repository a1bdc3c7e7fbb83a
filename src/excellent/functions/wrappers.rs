//! Adapters that turn typed function implementations into uniform entries
//! in the registry: each one enforces arity and coerces positional
//! arguments to the declared kind, returning the coercion error otherwise.

use chrono::{DateTime, FixedOffset, NaiveDate};
use rust_decimal::Decimal;

use super::XFunction;
use crate::envs::Environment;
use crate::excellent::types::Value;

/// Wraps a function with an argument count check. `max` of `None` means
/// unbounded.
pub fn arg_count<F>(min: usize, max: Option<usize>, f: F) -> XFunction
where
    F: Fn(&Environment, &[Value]) -> Value + Send + Sync + 'static,
{
    Box::new(move |env, args| {
        match max {
            Some(max) if min == max => {
                if args.len() != min {
                    return Value::error(format!("need {} argument(s), got {}", min, args.len()));
                }
            }
            Some(max) => {
                if args.len() < min || args.len() > max {
                    return Value::error(format!(
                        "need {} to {} argument(s), got {}",
                        min,
                        max,
                        args.len()
                    ));
                }
            }
            None => {
                if args.len() < min {
                    return Value::error(format!(
                        "need at least {} argument(s), got {}",
                        min,
                        args.len()
                    ));
                }
            }
        }
        f(env, args)
    })
}

pub fn no_args(f: fn(&Environment) -> Value) -> XFunction {
    arg_count(0, Some(0), move |env, _| f(env))
}

pub fn one_arg(f: fn(&Environment, &Value) -> Value) -> XFunction {
    arg_count(1, Some(1), move |env, args| f(env, &args[0]))
}

pub fn two_args(f: fn(&Environment, &Value, &Value) -> Value) -> XFunction {
    arg_count(2, Some(2), move |env, args| f(env, &args[0], &args[1]))
}

pub fn one_text(f: fn(&Environment, &str) -> Value) -> XFunction {
    arg_count(1, Some(1), move |env, args| match args[0].to_text(env) {
        Ok(text) => f(env, &text),
        Err(err) => Value::Error(err),
    })
}

pub fn two_text(f: fn(&Environment, &str, &str) -> Value) -> XFunction {
    arg_count(2, Some(2), move |env, args| {
        let first = match args[0].to_text(env) {
            Ok(t) => t,
            Err(err) => return Value::Error(err),
        };
        let second = match args[1].to_text(env) {
            Ok(t) => t,
            Err(err) => return Value::Error(err),
        };
        f(env, &first, &second)
    })
}

pub fn three_text(f: fn(&Environment, &str, &str, &str) -> Value) -> XFunction {
    arg_count(3, Some(3), move |env, args| {
        let mut texts = Vec::with_capacity(3);
        for arg in args {
            match arg.to_text(env) {
                Ok(t) => texts.push(t),
                Err(err) => return Value::Error(err),
            }
        }
        f(env, &texts[0], &texts[1], &texts[2])
    })
}

pub fn text_and_integer(f: fn(&Environment, &str, i64) -> Value) -> XFunction {
    arg_count(2, Some(2), move |env, args| {
        let text = match args[0].to_text(env) {
            Ok(t) => t,
            Err(err) => return Value::Error(err),
        };
        let num = match args[1].to_integer(env) {
            Ok(n) => n,
            Err(err) => return Value::Error(err),
        };
        f(env, &text, num)
    })
}

/// An initial text argument followed by `min_other` to `max_other` untyped
/// arguments.
pub fn initial_text<F>(min_other: usize, max_other: usize, f: F) -> XFunction
where
    F: Fn(&Environment, &str, &[Value]) -> Value + Send + Sync + 'static,
{
    arg_count(min_other + 1, Some(max_other + 1), move |env, args| {
        match args[0].to_text(env) {
            Ok(text) => f(env, &text, &args[1..]),
            Err(err) => Value::Error(err),
        }
    })
}

pub fn one_number(f: fn(&Environment, Decimal) -> Value) -> XFunction {
    arg_count(1, Some(1), move |env, args| match args[0].to_number(env) {
        Ok(num) => f(env, num),
        Err(err) => Value::Error(err),
    })
}

pub fn two_numbers(f: fn(&Environment, Decimal, Decimal) -> Value) -> XFunction {
    arg_count(2, Some(2), move |env, args| {
        let first = match args[0].to_number(env) {
            Ok(n) => n,
            Err(err) => return Value::Error(err),
        };
        let second = match args[1].to_number(env) {
            Ok(n) => n,
            Err(err) => return Value::Error(err),
        };
        f(env, first, second)
    })
}

pub fn one_number_and_optional_integer(
    f: fn(&Environment, Decimal, i64) -> Value,
    default: i64,
) -> XFunction {
    arg_count(1, Some(2), move |env, args| {
        let num = match args[0].to_number(env) {
            Ok(n) => n,
            Err(err) => return Value::Error(err),
        };
        let opt = if args.len() == 2 {
            match args[1].to_integer(env) {
                Ok(n) => n,
                Err(err) => return Value::Error(err),
            }
        } else {
            default
        };
        f(env, num, opt)
    })
}

pub fn one_date(f: fn(&Environment, NaiveDate) -> Value) -> XFunction {
    arg_count(1, Some(1), move |env, args| match args[0].to_date(env) {
        Ok(date) => f(env, date),
        Err(err) => Value::Error(err),
    })
}

pub fn one_datetime(f: fn(&Environment, DateTime<FixedOffset>) -> Value) -> XFunction {
    arg_count(1, Some(1), move |env, args| match args[0].to_datetime(env, false) {
        Ok(dt) => f(env, dt),
        Err(err) => Value::Error(err),
    })
}

/// A datetime followed by `min_other` to `max_other` untyped arguments.
pub fn initial_datetime<F>(min_other: usize, max_other: usize, f: F) -> XFunction
where
    F: Fn(&Environment, DateTime<FixedOffset>, &[Value]) -> Value + Send + Sync + 'static,
{
    arg_count(min_other + 1, Some(max_other + 1), move |env, args| {
        match args[0].to_datetime(env, false) {
            Ok(dt) => f(env, dt, &args[1..]),
            Err(err) => Value::Error(err),
        }
    })
}
