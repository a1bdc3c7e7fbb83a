//! The function library available inside expressions. Functions are pure:
//! they read the environment (timezone, formats, clock) but never touch
//! session state. Names are registered lowercase; callers may write them in
//! any case.

pub mod wrappers;

use std::collections::HashMap;
use std::sync::OnceLock;

use chrono::{Datelike, Duration, FixedOffset, TimeZone, Timelike, Utc};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, MathematicalOps};

use self::wrappers::*;
use crate::envs::{datetime, Environment, RedactionPolicy};
use crate::excellent::types::{parse_decimal, Value};
use crate::utils;

/// A registered function: environment plus already-evaluated arguments in,
/// value out. Errors among the arguments arrive unwrapped; most functions
/// reject them through coercion.
pub type XFunction = Box<dyn Fn(&Environment, &[Value]) -> Value + Send + Sync>;

/// Looks up a function by its lowercased name.
pub fn lookup(name: &str) -> Option<&'static XFunction> {
    registry().get(name)
}

/// All registered function names, for docs and validation.
pub fn names() -> Vec<&'static str> {
    let mut names: Vec<&'static str> = registry().keys().copied().collect();
    names.sort_unstable();
    names
}

fn registry() -> &'static HashMap<&'static str, XFunction> {
    static REGISTRY: OnceLock<HashMap<&'static str, XFunction>> = OnceLock::new();
    REGISTRY.get_or_init(build_registry)
}

fn build_registry() -> HashMap<&'static str, XFunction> {
    let mut map: HashMap<&'static str, XFunction> = HashMap::new();

    // text
    map.insert("upper", one_text(upper));
    map.insert("lower", one_text(lower));
    map.insert("title", one_text(title));
    map.insert("clean", one_text(clean));
    map.insert("length", one_arg(length));
    map.insert("left", text_and_integer(left));
    map.insert("right", text_and_integer(right));
    map.insert("substring", arg_count(3, Some(3), substring));
    map.insert("split", two_text(split));
    map.insert("join", two_args(join));
    map.insert("replace", three_text(replace));
    map.insert("repeat", text_and_integer(repeat));
    map.insert("remove_first_word", one_text(remove_first_word));
    map.insert("word", initial_text(1, 2, word));
    map.insert("word_count", initial_text(0, 1, word_count));
    map.insert("word_slice", initial_text(1, 3, word_slice));
    map.insert("text_compare", two_text(text_compare));
    map.insert("char", arg_count(1, Some(1), char_from_code));
    map.insert("code", one_text(code));
    map.insert("read_chars", one_text(read_chars));
    map.insert("trim", one_text(trim));
    map.insert("trim_left", one_text(trim_left));
    map.insert("trim_right", one_text(trim_right));
    map.insert("url_encode", one_text(url_encode));
    map.insert("format_urn", one_text(format_urn));
    map.insert("format_location", one_arg(format_location));

    // numbers
    map.insert("abs", one_number(abs));
    map.insert("absolute_value", one_number(abs));
    map.insert("round", one_number_and_optional_integer(round, 0));
    map.insert("round_up", one_number_and_optional_integer(round_up, 0));
    map.insert("round_down", one_number_and_optional_integer(round_down, 0));
    map.insert("max", arg_count(1, None, max));
    map.insert("min", arg_count(1, None, min));
    map.insert("mean", arg_count(1, None, mean));
    map.insert("mod", two_numbers(modulo));
    map.insert("power", two_numbers(power));
    map.insert("rand", no_args(rand));
    map.insert("rand_between", two_numbers(rand_between));
    map.insert("format_number", arg_count(1, Some(3), format_number));
    map.insert("number", one_arg(number));
    map.insert("number_from_string", one_text(number_from_string));

    // dates and times
    map.insert("date", one_arg(date));
    map.insert("datetime", one_arg(to_datetime));
    map.insert("time", one_arg(time));
    map.insert("now", no_args(now));
    map.insert("today", no_args(today));
    map.insert("weekday", one_date(weekday));
    map.insert("tz", one_datetime(tz));
    map.insert("tz_offset", one_datetime(tz_offset));
    map.insert("format_date", arg_count(1, Some(2), format_date));
    map.insert("format_time", arg_count(1, Some(2), format_time));
    map.insert("format_datetime", initial_datetime(0, 2, format_datetime));
    map.insert("datetime_add", initial_datetime(2, 2, datetime_add));
    map.insert("datetime_diff", arg_count(3, Some(3), datetime_diff));
    map.insert("datetime_from_epoch", one_number(datetime_from_epoch));
    map.insert("from_epoch", one_number(from_epoch));
    map.insert("to_epoch", one_datetime(to_epoch));
    map.insert("replace_time", arg_count(2, Some(2), replace_time));

    // logic and structure
    map.insert("if", arg_count(3, Some(3), if_));
    map.insert("and", arg_count(1, None, and));
    map.insert("or", arg_count(1, None, or));
    map.insert("not", arg_count(1, Some(1), not));
    map.insert("default", two_args(default));
    map.insert("is_error", one_arg(is_error));
    map.insert("has_value", one_arg(has_value));
    map.insert("array", arg_count(0, None, array));
    map.insert("json", one_arg(json));
    map.insert("parse_json", one_text(parse_json));
    map.insert("boolean", one_arg(boolean));
    map.insert("text", one_arg(text));

    map
}

/* ===================== Text ===================== */

fn upper(_env: &Environment, text: &str) -> Value {
    Value::Text(text.to_uppercase())
}

fn lower(_env: &Environment, text: &str) -> Value {
    Value::Text(text.to_lowercase())
}

fn title(_env: &Environment, text: &str) -> Value {
    let mut out = String::with_capacity(text.len());
    let mut at_word_start = true;
    for ch in text.chars() {
        if ch.is_alphanumeric() {
            if at_word_start {
                out.extend(ch.to_uppercase());
            } else {
                out.extend(ch.to_lowercase());
            }
            at_word_start = false;
        } else {
            out.push(ch);
            at_word_start = true;
        }
    }
    Value::Text(out)
}

fn clean(_env: &Environment, text: &str) -> Value {
    Value::Text(text.chars().filter(|ch| !ch.is_control()).collect())
}

fn length(_env: &Environment, value: &Value) -> Value {
    match value {
        Value::Text(s) => Value::int(s.chars().count() as i64),
        Value::Array(items) => Value::int(items.len() as i64),
        Value::Object(obj) => Value::int(obj.len() as i64),
        Value::Error(err) => Value::Error(err.clone()),
        _ => Value::error("value doesn't have length"),
    }
}

fn left(_env: &Environment, text: &str, count: i64) -> Value {
    if count < 0 {
        return Value::error("can't take a negative count of characters");
    }
    Value::Text(text.chars().take(count as usize).collect())
}

fn right(_env: &Environment, text: &str, count: i64) -> Value {
    if count < 0 {
        return Value::error("can't take a negative count of characters");
    }
    let total = text.chars().count();
    Value::Text(text.chars().skip(total.saturating_sub(count as usize)).collect())
}

fn substring(env: &Environment, args: &[Value]) -> Value {
    let text = match args[0].to_text(env) {
        Ok(t) => t,
        Err(err) => return Value::Error(err),
    };
    let (start, end) = match (args[1].to_integer(env), args[2].to_integer(env)) {
        (Ok(s), Ok(e)) => (s, e),
        (Err(err), _) | (_, Err(err)) => return Value::Error(err),
    };

    let chars: Vec<char> = text.chars().collect();
    let len = chars.len() as i64;
    let resolve = |idx: i64| -> i64 {
        let idx = if idx < 0 { len + idx } else { idx };
        idx.clamp(0, len)
    };
    let (start, end) = (resolve(start), resolve(end));
    if start >= end {
        return Value::text("");
    }
    Value::Text(chars[start as usize..end as usize].iter().collect())
}

fn split(_env: &Environment, text: &str, separator: &str) -> Value {
    if separator.is_empty() {
        return Value::Array(vec![Value::text(text)]);
    }
    Value::Array(
        text.split(separator)
            .map(|part| part.trim())
            .filter(|part| !part.is_empty())
            .map(Value::text)
            .collect(),
    )
}

fn join(env: &Environment, array: &Value, separator: &Value) -> Value {
    let items = match array {
        Value::Array(items) => items,
        Value::Error(err) => return Value::Error(err.clone()),
        _ => return Value::error(format!("unable to join {}", array.repr())),
    };
    let separator = match separator.to_text(env) {
        Ok(s) => s,
        Err(err) => return Value::Error(err),
    };
    let mut parts = Vec::with_capacity(items.len());
    for item in items {
        match item.to_text(env) {
            Ok(t) => parts.push(t),
            Err(err) => return Value::Error(err),
        }
    }
    Value::Text(parts.join(&separator))
}

fn replace(_env: &Environment, text: &str, needle: &str, replacement: &str) -> Value {
    Value::Text(text.replace(needle, replacement))
}

fn repeat(_env: &Environment, text: &str, count: i64) -> Value {
    if count < 0 {
        return Value::error(format!("can't repeat text {count} times"));
    }
    Value::Text(text.repeat(count as usize))
}

fn remove_first_word(_env: &Environment, text: &str) -> Value {
    let trimmed = text.trim_start();
    match trimmed.find(char::is_whitespace) {
        Some(idx) => Value::Text(trimmed[idx..].trim_start().to_string()),
        None => Value::text(""),
    }
}

fn words_of(text: &str, delimiters: Option<&str>) -> Vec<String> {
    match delimiters {
        Some(delims) if !delims.is_empty() => utils::tokenize_by_chars(text, delims),
        _ => utils::tokenize(text),
    }
}

fn word(env: &Environment, text: &str, rest: &[Value]) -> Value {
    let index = match rest[0].to_integer(env) {
        Ok(n) => n,
        Err(err) => return Value::Error(err),
    };
    let delimiters = match rest.get(1) {
        Some(arg) => match arg.to_text(env) {
            Ok(d) => Some(d),
            Err(err) => return Value::Error(err),
        },
        None => None,
    };
    let words = words_of(text, delimiters.as_deref());
    let len = words.len() as i64;
    let resolved = if index < 0 { len + index } else { index };
    if resolved < 0 || resolved >= len {
        return Value::error(format!(
            "index {} is out of range for the number of words {}",
            index, len
        ));
    }
    Value::Text(words[resolved as usize].clone())
}

fn word_count(env: &Environment, text: &str, rest: &[Value]) -> Value {
    let delimiters = match rest.first() {
        Some(arg) => match arg.to_text(env) {
            Ok(d) => Some(d),
            Err(err) => return Value::Error(err),
        },
        None => None,
    };
    Value::int(words_of(text, delimiters.as_deref()).len() as i64)
}

fn word_slice(env: &Environment, text: &str, rest: &[Value]) -> Value {
    let start = match rest[0].to_integer(env) {
        Ok(n) => n,
        Err(err) => return Value::Error(err),
    };
    if start < 0 {
        return Value::error("must start with a positive index");
    }
    let end = match rest.get(1) {
        Some(arg) => match arg.to_integer(env) {
            Ok(n) => n,
            Err(err) => return Value::Error(err),
        },
        None => -1,
    };
    let delimiters = match rest.get(2) {
        Some(arg) => match arg.to_text(env) {
            Ok(d) => Some(d),
            Err(err) => return Value::Error(err),
        },
        None => None,
    };

    let words = words_of(text, delimiters.as_deref());
    let end = if end < 0 { words.len() } else { (end as usize).min(words.len()) };
    let start = (start as usize).min(words.len());
    if start >= end {
        return Value::text("");
    }
    Value::Text(words[start..end].join(" "))
}

fn text_compare(_env: &Environment, first: &str, second: &str) -> Value {
    Value::int(match first.cmp(second) {
        std::cmp::Ordering::Less => -1,
        std::cmp::Ordering::Equal => 0,
        std::cmp::Ordering::Greater => 1,
    })
}

fn char_from_code(env: &Environment, args: &[Value]) -> Value {
    let code = match args[0].to_integer(env) {
        Ok(n) => n,
        Err(err) => return Value::Error(err),
    };
    u32::try_from(code)
        .ok()
        .and_then(char::from_u32)
        .map(|ch| Value::Text(ch.to_string()))
        .unwrap_or_else(|| Value::error(format!("{code} is not a valid character code")))
}

fn code(_env: &Environment, text: &str) -> Value {
    match text.chars().next() {
        Some(ch) => Value::int(ch as i64),
        None => Value::error("can't take the code of an empty string"),
    }
}

/// Renders text the way a voice channel should read it aloud: digits in
/// groups of three, everything else character by character.
fn read_chars(_env: &Environment, text: &str) -> Value {
    let chars: Vec<char> = text.chars().collect();
    if chars.iter().all(|ch| ch.is_ascii_digit()) && chars.len() > 4 {
        let groups: Vec<String> = chars.chunks(3).map(|c| c.iter().collect()).collect();
        return Value::Text(groups.join(" , "));
    }
    let spaced: Vec<String> = chars.iter().map(|ch| ch.to_string()).collect();
    Value::Text(spaced.join(" "))
}

fn trim(_env: &Environment, text: &str) -> Value {
    Value::Text(text.trim().to_string())
}

fn trim_left(_env: &Environment, text: &str) -> Value {
    Value::Text(text.trim_start().to_string())
}

fn trim_right(_env: &Environment, text: &str) -> Value {
    Value::Text(text.trim_end().to_string())
}

const URL_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

fn url_encode(_env: &Environment, text: &str) -> Value {
    Value::Text(utf8_percent_encode(text, URL_ENCODE_SET).to_string())
}

fn format_urn(env: &Environment, urn: &str) -> Value {
    if env.redaction_policy == RedactionPolicy::Urns {
        return Value::text("********");
    }
    let path = urn.split_once(':').map(|(_, path)| path).unwrap_or(urn);
    Value::Text(path.split('#').next().unwrap_or(path).to_string())
}

fn format_location(env: &Environment, value: &Value) -> Value {
    match value.to_text(env) {
        Ok(text) => Value::Text(text),
        Err(err) => Value::Error(err),
    }
}

/* ===================== Numbers ===================== */

fn abs(_env: &Environment, num: Decimal) -> Value {
    Value::Number(num.abs())
}

fn places_shift(places: i64) -> Option<Decimal> {
    if !(0..=9).contains(&places) {
        return None;
    }
    Some(Decimal::from(10i64.pow(places as u32)))
}

fn round(_env: &Environment, num: Decimal, places: i64) -> Value {
    if !(0..=9).contains(&places) {
        return Value::error(format!("{places} is not a valid number of decimal places"));
    }
    Value::Number(num.round_dp_with_strategy(
        places as u32,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    ))
}

fn round_up(_env: &Environment, num: Decimal, places: i64) -> Value {
    match places_shift(places) {
        Some(shift) => Value::Number((num * shift).ceil() / shift),
        None => Value::error(format!("{places} is not a valid number of decimal places")),
    }
}

fn round_down(_env: &Environment, num: Decimal, places: i64) -> Value {
    match places_shift(places) {
        Some(shift) => Value::Number((num * shift).floor() / shift),
        None => Value::error(format!("{places} is not a valid number of decimal places")),
    }
}

fn fold_numbers(
    env: &Environment,
    args: &[Value],
    f: impl Fn(Decimal, Decimal) -> Decimal,
) -> Result<Decimal, Value> {
    let mut result: Option<Decimal> = None;
    for arg in args {
        let num = arg.to_number(env).map_err(Value::Error)?;
        result = Some(match result {
            Some(acc) => f(acc, num),
            None => num,
        });
    }
    Ok(result.expect("arity check guarantees at least one argument"))
}

fn max(env: &Environment, args: &[Value]) -> Value {
    match fold_numbers(env, args, Decimal::max) {
        Ok(n) => Value::Number(n),
        Err(err) => err,
    }
}

fn min(env: &Environment, args: &[Value]) -> Value {
    match fold_numbers(env, args, Decimal::min) {
        Ok(n) => Value::Number(n),
        Err(err) => err,
    }
}

fn mean(env: &Environment, args: &[Value]) -> Value {
    match fold_numbers(env, args, |a, b| a + b) {
        Ok(sum) => Value::Number(sum / Decimal::from(args.len() as i64)),
        Err(err) => err,
    }
}

fn modulo(_env: &Environment, dividend: Decimal, divisor: Decimal) -> Value {
    if divisor.is_zero() {
        return Value::error("division by zero");
    }
    match dividend.checked_rem(divisor) {
        Some(n) => Value::Number(n),
        None => Value::error("number overflow"),
    }
}

fn power(_env: &Environment, base: Decimal, exponent: Decimal) -> Value {
    match base.checked_powd(exponent) {
        Some(n) => Value::Number(n),
        None => Value::error("number overflow"),
    }
}

fn rand(env: &Environment) -> Value {
    Value::Number(env.random_decimal())
}

fn rand_between(env: &Environment, min: Decimal, max: Decimal) -> Value {
    let span = max - min + Decimal::ONE;
    Value::Number((env.random_decimal() * span).floor() + min)
}

fn format_number(env: &Environment, args: &[Value]) -> Value {
    let num = match args[0].to_number(env) {
        Ok(n) => n,
        Err(err) => return Value::Error(err),
    };
    let places = match args.get(1) {
        Some(arg) => match arg.to_integer(env) {
            Ok(n) => n,
            Err(err) => return Value::Error(err),
        },
        None => 2,
    };
    let commas = match args.get(2) {
        Some(arg) => match arg.to_boolean(env) {
            Ok(b) => b,
            Err(err) => return Value::Error(err),
        },
        None => true,
    };
    if !(0..=9).contains(&places) {
        return Value::error(format!("{places} is not a valid number of decimal places"));
    }

    let rounded = num.round_dp_with_strategy(
        places as u32,
        rust_decimal::RoundingStrategy::MidpointAwayFromZero,
    );
    let formatted = format!("{:.*}", places as usize, rounded.abs());
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((i, f)) => (i.to_string(), Some(f.to_string())),
        None => (formatted, None),
    };

    let int_part = if commas {
        let digits: Vec<char> = int_part.chars().collect();
        let mut grouped = String::new();
        for (i, ch) in digits.iter().enumerate() {
            if i > 0 && (digits.len() - i) % 3 == 0 {
                grouped.push_str(&env.number_format.digit_grouping_symbol);
            }
            grouped.push(*ch);
        }
        grouped
    } else {
        int_part
    };

    let mut out = String::new();
    if num.is_sign_negative() && !rounded.is_zero() {
        out.push('-');
    }
    out.push_str(&int_part);
    if let Some(frac) = frac_part {
        out.push_str(&env.number_format.decimal_symbol);
        out.push_str(&frac);
    }
    Value::Text(out)
}

fn number(env: &Environment, value: &Value) -> Value {
    match value.to_number(env) {
        Ok(n) => Value::Number(n),
        Err(err) => Value::Error(err),
    }
}

fn number_from_string(env: &Environment, text: &str) -> Value {
    match parse_decimal(env, text) {
        Some(n) => Value::Number(n),
        None => Value::error(format!("unable to convert \"{text}\" to a number")),
    }
}

/* ===================== Dates and times ===================== */

fn date(env: &Environment, value: &Value) -> Value {
    match value.to_date(env) {
        Ok(d) => Value::Date(d),
        Err(err) => Value::Error(err),
    }
}

fn to_datetime(env: &Environment, value: &Value) -> Value {
    match value.to_datetime(env, false) {
        Ok(dt) => Value::DateTime(dt),
        Err(err) => Value::Error(err),
    }
}

fn time(env: &Environment, value: &Value) -> Value {
    match value.to_time(env) {
        Ok(t) => Value::Time(t),
        Err(err) => Value::Error(err),
    }
}

fn now(env: &Environment) -> Value {
    Value::DateTime(env.now())
}

fn today(env: &Environment) -> Value {
    Value::Date(env.now().with_timezone(&env.timezone).date_naive())
}

fn weekday(_env: &Environment, date: chrono::NaiveDate) -> Value {
    Value::int(date.weekday().num_days_from_sunday() as i64)
}

fn tz(env: &Environment, _dt: chrono::DateTime<FixedOffset>) -> Value {
    Value::Text(env.timezone_name().to_string())
}

fn tz_offset(env: &Environment, dt: chrono::DateTime<FixedOffset>) -> Value {
    Value::Text(dt.with_timezone(&env.timezone).format("%z").to_string())
}

fn format_date(env: &Environment, args: &[Value]) -> Value {
    let date = match args[0].to_date(env) {
        Ok(d) => d,
        Err(err) => return Value::Error(err),
    };
    let layout = match args.get(1) {
        Some(arg) => match arg.to_text(env) {
            Ok(l) => l,
            Err(err) => return Value::Error(err),
        },
        None => env.date_format.layout().to_string(),
    };
    match datetime::format_date(date, &layout) {
        Ok(s) => Value::Text(s),
        Err(msg) => Value::error(msg),
    }
}

fn format_time(env: &Environment, args: &[Value]) -> Value {
    let time = match args[0].to_time(env) {
        Ok(t) => t,
        Err(err) => return Value::Error(err),
    };
    let layout = match args.get(1) {
        Some(arg) => match arg.to_text(env) {
            Ok(l) => l,
            Err(err) => return Value::Error(err),
        },
        None => env.time_format.layout().to_string(),
    };
    match datetime::format_time(time, &layout) {
        Ok(s) => Value::Text(s),
        Err(msg) => Value::error(msg),
    }
}

fn format_datetime(
    env: &Environment,
    dt: chrono::DateTime<FixedOffset>,
    rest: &[Value],
) -> Value {
    let layout = match rest.first() {
        Some(arg) => match arg.to_text(env) {
            Ok(l) => l,
            Err(err) => return Value::Error(err),
        },
        None => format!("{} {}", env.date_format.layout(), env.time_format.layout()),
    };
    let localized = match rest.get(1) {
        Some(arg) => {
            let name = match arg.to_text(env) {
                Ok(n) => n,
                Err(err) => return Value::Error(err),
            };
            match crate::envs::parse_timezone(&name) {
                Ok(tz) => dt.with_timezone(&tz).fixed_offset(),
                Err(err) => return Value::error(err.to_string()),
            }
        }
        None => dt.with_timezone(&env.timezone).fixed_offset(),
    };
    match datetime::format_datetime(localized, &layout) {
        Ok(s) => Value::Text(s),
        Err(msg) => Value::error(msg),
    }
}

fn datetime_add(
    env: &Environment,
    dt: chrono::DateTime<FixedOffset>,
    rest: &[Value],
) -> Value {
    let amount = match rest[0].to_integer(env) {
        Ok(n) => n,
        Err(err) => return Value::Error(err),
    };
    let unit = match rest[1].to_text(env) {
        Ok(u) => u,
        Err(err) => return Value::Error(err),
    };

    let result = match unit.as_str() {
        "Y" => datetime::add_months(dt, amount * 12),
        "M" => datetime::add_months(dt, amount),
        "W" => dt + Duration::weeks(amount),
        "D" => dt + Duration::days(amount),
        "h" => dt + Duration::hours(amount),
        "m" => dt + Duration::minutes(amount),
        "s" => dt + Duration::seconds(amount),
        _ => {
            return Value::error(format!(
                "unknown unit: {unit}, must be one of Y, M, W, D, h, m, s"
            ))
        }
    };
    Value::DateTime(result)
}

fn datetime_diff(env: &Environment, args: &[Value]) -> Value {
    let first = match args[0].to_datetime(env, false) {
        Ok(dt) => dt,
        Err(err) => return Value::Error(err),
    };
    let second = match args[1].to_datetime(env, false) {
        Ok(dt) => dt,
        Err(err) => return Value::Error(err),
    };
    let unit = match args[2].to_text(env) {
        Ok(u) => u,
        Err(err) => return Value::Error(err),
    };

    let delta = first - second;
    let diff = match unit.as_str() {
        "Y" => (first.year() - second.year()) as i64,
        "M" => {
            (first.year() as i64 * 12 + first.month0() as i64)
                - (second.year() as i64 * 12 + second.month0() as i64)
        }
        "W" => delta.num_weeks(),
        "D" => delta.num_days(),
        "h" => delta.num_hours(),
        "m" => delta.num_minutes(),
        "s" => delta.num_seconds(),
        _ => {
            return Value::error(format!(
                "unknown unit: {unit}, must be one of Y, M, W, D, h, m, s"
            ))
        }
    };
    Value::int(diff)
}

fn datetime_from_epoch(env: &Environment, seconds: Decimal) -> Value {
    let nanos = (seconds * Decimal::from(1_000_000_000i64)).trunc();
    match nanos.to_i64() {
        Some(n) => Value::DateTime(
            Utc.timestamp_nanos(n).with_timezone(&env.timezone).fixed_offset(),
        ),
        None => Value::error("epoch value out of range"),
    }
}

fn from_epoch(env: &Environment, nanos: Decimal) -> Value {
    match nanos.trunc().to_i64() {
        Some(n) => Value::DateTime(
            Utc.timestamp_nanos(n).with_timezone(&env.timezone).fixed_offset(),
        ),
        None => Value::error("epoch value out of range"),
    }
}

fn to_epoch(_env: &Environment, dt: chrono::DateTime<FixedOffset>) -> Value {
    match dt.timestamp_nanos_opt() {
        Some(n) => Value::Number(Decimal::from(n)),
        None => Value::error("datetime out of range for epoch"),
    }
}

fn replace_time(env: &Environment, args: &[Value]) -> Value {
    let dt = match args[0].to_datetime(env, false) {
        Ok(dt) => dt,
        Err(err) => return Value::Error(err),
    };
    let new_time = match args[1].to_time(env) {
        Ok(t) => t,
        Err(err) => return Value::Error(err),
    };
    match dt
        .with_hour(new_time.hour())
        .and_then(|dt| dt.with_minute(new_time.minute()))
        .and_then(|dt| dt.with_second(new_time.second()))
        .and_then(|dt| dt.with_nanosecond(new_time.nanosecond()))
    {
        Some(dt) => Value::DateTime(dt),
        None => Value::error("unable to replace time"),
    }
}

/* ===================== Logic and structure ===================== */

fn if_(env: &Environment, args: &[Value]) -> Value {
    match args[0].to_boolean(env) {
        Ok(true) => args[1].clone(),
        Ok(false) => args[2].clone(),
        Err(err) => Value::Error(err),
    }
}

fn and(env: &Environment, args: &[Value]) -> Value {
    for arg in args {
        match arg.to_boolean(env) {
            Ok(true) => continue,
            Ok(false) => return Value::Boolean(false),
            Err(err) => return Value::Error(err),
        }
    }
    Value::Boolean(true)
}

fn or(env: &Environment, args: &[Value]) -> Value {
    for arg in args {
        match arg.to_boolean(env) {
            Ok(true) => return Value::Boolean(true),
            Ok(false) => continue,
            Err(err) => return Value::Error(err),
        }
    }
    Value::Boolean(false)
}

fn not(env: &Environment, args: &[Value]) -> Value {
    match args[0].to_boolean(env) {
        Ok(b) => Value::Boolean(!b),
        Err(err) => Value::Error(err),
    }
}

fn default(_env: &Environment, value: &Value, fallback: &Value) -> Value {
    let empty = match value {
        Value::Error(_) | Value::Nil => true,
        Value::Text(s) => s.is_empty(),
        Value::Array(items) => items.is_empty(),
        _ => false,
    };
    if empty {
        fallback.clone()
    } else {
        value.clone()
    }
}

fn is_error(_env: &Environment, value: &Value) -> Value {
    Value::Boolean(value.is_error())
}

fn has_value(_env: &Environment, value: &Value) -> Value {
    Value::Boolean(!value.is_error() && !value.is_nil())
}

fn array(_env: &Environment, args: &[Value]) -> Value {
    Value::Array(args.to_vec())
}

fn json(_env: &Environment, value: &Value) -> Value {
    Value::Text(value.to_json())
}

fn parse_json(_env: &Environment, text: &str) -> Value {
    match serde_json::from_str::<serde_json::Value>(text) {
        Ok(parsed) => Value::from_json(&parsed),
        Err(_) => Value::error(format!("unable to parse \"{text}\" as JSON")),
    }
}

fn boolean(env: &Environment, value: &Value) -> Value {
    match value.to_boolean(env) {
        Ok(b) => Value::Boolean(b),
        Err(err) => Value::Error(err),
    }
}

fn text(env: &Environment, value: &Value) -> Value {
    match value.to_text(env) {
        Ok(t) => Value::Text(t),
        Err(err) => Value::Error(err),
    }
}
