//! The value system of the expression language: a typed dynamic union with
//! explicit coercions. Every coercion yields a value of the target kind or
//! an error value, never a panic, and error values are absorbing through
//! arithmetic and comparisons.

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveTime, SecondsFormat, TimeZone, Timelike};
use indexmap::IndexMap;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::Decimal;

use crate::envs::{datetime, Environment};

/// An error produced during evaluation. These flow through expressions as
/// ordinary values; the evaluator adds location context at the boundary.
#[derive(Debug, Clone, PartialEq)]
pub struct XError {
    message: String,
}

impl XError {
    pub fn new(message: impl Into<String>) -> Self {
        XError { message: message.into() }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl std::fmt::Display for XError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

/// A structured value with named properties. Objects carry their own lookup
/// behavior: dynamic bags (contact fields, run results) resolve missing keys
/// to nil, structured objects resolve them to errors; the optional default
/// is the primitive the object stands for in text conversion and equality.
#[derive(Debug, Clone, PartialEq)]
pub struct Object {
    describe: String,
    entries: IndexMap<String, Value>,
    default: Option<Box<Value>>,
    dynamic: bool,
}

impl Object {
    pub fn new(describe: impl Into<String>) -> Self {
        Object {
            describe: describe.into(),
            entries: IndexMap::new(),
            default: None,
            dynamic: false,
        }
    }

    /// A bag whose missing keys read as nil rather than errors.
    pub fn dynamic(describe: impl Into<String>) -> Self {
        let mut obj = Object::new(describe);
        obj.dynamic = true;
        obj
    }

    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.entries.insert(key.into(), value);
        self
    }

    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(Box::new(value));
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.entries.insert(key.into(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn describe(&self) -> &str {
        &self.describe
    }

    pub fn is_dynamic(&self) -> bool {
        self.dynamic
    }

    pub fn default_value(&self) -> Option<&Value> {
        self.default.as_deref()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &String> {
        self.entries.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter()
    }
}

/// A value in the expression language.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Number(Decimal),
    Boolean(bool),
    Date(NaiveDate),
    DateTime(DateTime<FixedOffset>),
    Time(NaiveTime),
    Array(Vec<Value>),
    Object(Object),
    Error(XError),
    Nil,
}

impl Value {
    pub fn text(s: impl Into<String>) -> Value {
        Value::Text(s.into())
    }

    pub fn number(d: Decimal) -> Value {
        Value::Number(d)
    }

    pub fn int(n: i64) -> Value {
        Value::Number(Decimal::from(n))
    }

    pub fn error(message: impl Into<String>) -> Value {
        Value::Error(XError::new(message))
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The kind label used in error messages and docs.
    pub fn describe(&self) -> &str {
        match self {
            Value::Text(_) => "text",
            Value::Number(_) => "number",
            Value::Boolean(_) => "boolean",
            Value::Date(_) => "date",
            Value::DateTime(_) => "datetime",
            Value::Time(_) => "time",
            Value::Array(_) => "array",
            Value::Object(obj) => obj.describe(),
            Value::Error(_) => "error",
            Value::Nil => "null",
        }
    }

    /// How this value reads inside an error message, e.g. `"abc"` or `1.5`
    /// or `null`.
    pub fn repr(&self) -> String {
        match self {
            Value::Text(s) => format!("\"{s}\""),
            Value::Number(d) => format_decimal(*d),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format("%Y-%m-%d").to_string(),
            Value::DateTime(dt) => dt.to_rfc3339_opts(SecondsFormat::Micros, true),
            Value::Time(t) => t.format("%H:%M:%S%.6f").to_string(),
            Value::Array(_) => "array".to_string(),
            Value::Object(obj) => obj.describe().to_string(),
            Value::Error(_) => "error".to_string(),
            Value::Nil => "null".to_string(),
        }
    }

    /* ===================== Coercions ===================== */

    /// Converts to text. Nil reads as empty text; arrays join their items
    /// with a comma; objects defer to their default value.
    pub fn to_text(&self, env: &Environment) -> Result<String, XError> {
        match self {
            Value::Text(s) => Ok(s.clone()),
            Value::Number(d) => Ok(format_decimal(*d)),
            Value::Boolean(b) => Ok(b.to_string()),
            Value::Date(d) => Ok(d.format("%Y-%m-%d").to_string()),
            Value::DateTime(dt) => Ok(datetime::iso_datetime(env, *dt)),
            Value::Time(t) => Ok(t.format("%H:%M:%S%.6f").to_string()),
            Value::Array(items) => {
                let mut parts = Vec::with_capacity(items.len());
                for item in items {
                    parts.push(item.to_text(env)?);
                }
                Ok(parts.join(", "))
            }
            Value::Object(obj) => match obj.default_value() {
                Some(default) => default.to_text(env),
                None => Ok(self.to_json()),
            },
            Value::Error(err) => Err(err.clone()),
            Value::Nil => Ok(String::new()),
        }
    }

    pub fn to_number(&self, env: &Environment) -> Result<Decimal, XError> {
        match self {
            Value::Number(d) => Ok(*d),
            Value::Text(s) => parse_decimal(env, s)
                .ok_or_else(|| XError::new(format!("unable to convert {} to a number", self.repr()))),
            Value::Object(obj) => match obj.default_value() {
                Some(default) => default.to_number(env),
                None => Err(XError::new(format!("unable to convert {} to a number", self.repr()))),
            },
            Value::Error(err) => Err(err.clone()),
            _ => Err(XError::new(format!("unable to convert {} to a number", self.repr()))),
        }
    }

    /// Converts to a whole number, truncating towards zero.
    pub fn to_integer(&self, env: &Environment) -> Result<i64, XError> {
        let num = self.to_number(env)?;
        num.trunc()
            .to_i64()
            .ok_or_else(|| XError::new(format!("number {} is too large", format_decimal(num))))
    }

    pub fn to_boolean(&self, env: &Environment) -> Result<bool, XError> {
        match self {
            Value::Boolean(b) => Ok(*b),
            Value::Number(d) => Ok(!d.is_zero()),
            Value::Text(s) => Ok(!s.is_empty() && s.to_lowercase() != "false"),
            Value::Array(items) => Ok(!items.is_empty()),
            Value::Object(obj) => Ok(!obj.is_empty()),
            Value::Date(_) | Value::DateTime(_) | Value::Time(_) => Ok(true),
            Value::Error(err) => Err(err.clone()),
            Value::Nil => Ok(false),
        }
    }

    /// Converts to a datetime. With `fill_time`, text without a time of day
    /// takes its missing components from the environment's current moment.
    pub fn to_datetime(
        &self,
        env: &Environment,
        fill_time: bool,
    ) -> Result<DateTime<FixedOffset>, XError> {
        match self {
            Value::DateTime(dt) => Ok(*dt),
            Value::Date(d) => env
                .timezone
                .from_local_datetime(&d.and_hms_opt(0, 0, 0).unwrap())
                .earliest()
                .map(|dt| dt.fixed_offset())
                .ok_or_else(|| XError::new("unable to resolve date in timezone")),
            Value::Text(s) => {
                let fill = if fill_time { Some(env.now()) } else { None };
                datetime::parse_datetime(env, s, fill).ok_or_else(|| {
                    XError::new(format!("unable to convert {} to a datetime", self.repr()))
                })
            }
            Value::Object(obj) => match obj.default_value() {
                Some(default) => default.to_datetime(env, fill_time),
                None => Err(XError::new(format!(
                    "unable to convert {} to a datetime",
                    self.repr()
                ))),
            },
            Value::Error(err) => Err(err.clone()),
            _ => Err(XError::new(format!("unable to convert {} to a datetime", self.repr()))),
        }
    }

    pub fn to_date(&self, env: &Environment) -> Result<NaiveDate, XError> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::DateTime(dt) => Ok(dt.with_timezone(&env.timezone).date_naive()),
            Value::Text(s) => datetime::parse_date(env, s)
                .ok_or_else(|| XError::new(format!("unable to convert {} to a date", self.repr()))),
            Value::Error(err) => Err(err.clone()),
            _ => Err(XError::new(format!("unable to convert {} to a date", self.repr()))),
        }
    }

    pub fn to_time(&self, env: &Environment) -> Result<NaiveTime, XError> {
        match self {
            Value::Time(t) => Ok(*t),
            Value::DateTime(dt) => Ok(dt.with_timezone(&env.timezone).time()),
            Value::Text(s) => datetime::parse_time(s)
                .ok_or_else(|| XError::new(format!("unable to convert {} to a time", self.repr()))),
            Value::Error(err) => Err(err.clone()),
            _ => Err(XError::new(format!("unable to convert {} to a time", self.repr()))),
        }
    }

    /* ===================== JSON ===================== */

    /// Renders this value as canonical JSON text.
    pub fn to_json(&self) -> String {
        match self {
            Value::Text(s) => serde_json::to_string(s).unwrap_or_else(|_| "null".to_string()),
            Value::Number(d) => format_decimal(*d),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => format!("\"{}\"", d.format("%Y-%m-%d")),
            Value::DateTime(dt) => {
                let form = if dt.nanosecond() == 0 {
                    SecondsFormat::Secs
                } else {
                    SecondsFormat::Micros
                };
                format!("\"{}\"", dt.to_rfc3339_opts(form, true))
            }
            Value::Time(t) => format!("\"{}\"", t.format("%H:%M:%S%.6f")),
            Value::Array(items) => {
                let parts: Vec<String> = items.iter().map(|v| v.to_json()).collect();
                format!("[{}]", parts.join(","))
            }
            Value::Object(obj) => {
                let parts: Vec<String> = obj
                    .iter()
                    .map(|(k, v)| {
                        format!(
                            "{}:{}",
                            serde_json::to_string(k).unwrap_or_else(|_| "\"\"".to_string()),
                            v.to_json()
                        )
                    })
                    .collect();
                format!("{{{}}}", parts.join(","))
            }
            Value::Error(err) => {
                serde_json::to_string(err.message()).unwrap_or_else(|_| "null".to_string())
            }
            Value::Nil => "null".to_string(),
        }
    }

    /// Builds a value from parsed JSON.
    pub fn from_json(json: &serde_json::Value) -> Value {
        match json {
            serde_json::Value::Null => Value::Nil,
            serde_json::Value::Bool(b) => Value::Boolean(*b),
            serde_json::Value::Number(n) => match Decimal::from_str_exact(&n.to_string()) {
                Ok(d) => Value::Number(d),
                Err(_) => n
                    .as_f64()
                    .and_then(Decimal::from_f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Nil),
            },
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Array(items) => {
                Value::Array(items.iter().map(Value::from_json).collect())
            }
            serde_json::Value::Object(map) => {
                let mut obj = Object::dynamic("map");
                for (k, v) in map {
                    obj.insert(k.clone(), Value::from_json(v));
                }
                Value::Object(obj)
            }
        }
    }
}

/// Formats a decimal the way it renders in text: no exponent, trailing
/// zeros dropped.
pub fn format_decimal(d: Decimal) -> String {
    d.normalize().to_string()
}

/// Parses a decimal out of text, honoring the environment's number format.
pub fn parse_decimal(env: &Environment, text: &str) -> Option<Decimal> {
    let mut cleaned = text.trim().to_string();
    if cleaned.is_empty() {
        return None;
    }
    let grouping = &env.number_format.digit_grouping_symbol;
    if !grouping.is_empty() {
        cleaned = cleaned.replace(grouping.as_str(), "");
    }
    let decimal_symbol = &env.number_format.decimal_symbol;
    if decimal_symbol != "." {
        cleaned = cleaned.replace(decimal_symbol.as_str(), ".");
    }
    cleaned
        .parse::<Decimal>()
        .or_else(|_| Decimal::from_scientific(&cleaned))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::envs::{EnvironmentBuilder, NumberFormat};

    fn env() -> Environment {
        EnvironmentBuilder::new().build()
    }

    fn dt(s: &str) -> DateTime<FixedOffset> {
        DateTime::parse_from_rfc3339(s).unwrap()
    }

    #[test]
    fn test_to_text() {
        let env = env();
        let cases: Vec<(Value, &str)> = vec![
            (Value::text("hello"), "hello"),
            (Value::int(123), "123"),
            (Value::Number("1.50".parse().unwrap()), "1.5"),
            (Value::Number("4.0".parse().unwrap()), "4"),
            (Value::Boolean(true), "true"),
            (Value::Nil, ""),
            (Value::Date(NaiveDate::from_ymd_opt(2018, 4, 9).unwrap()), "2018-04-09"),
            (Value::DateTime(dt("2018-04-09T17:01:30Z")), "2018-04-09T17:01:30.000000Z"),
            (
                Value::Array(vec![Value::text("one"), Value::text("two"), Value::text("three")]),
                "one, two, three",
            ),
            (
                Value::Object(Object::new("contact").with_default(Value::text("Ben"))),
                "Ben",
            ),
        ];
        for (value, expected) in cases {
            assert_eq!(expected, value.to_text(&env).unwrap(), "to_text mismatch for {value:?}");
        }

        assert!(Value::error("boom").to_text(&env).is_err());
    }

    #[test]
    fn test_to_number() {
        let env = env();

        assert_eq!(Decimal::from(3), Value::text("3").to_number(&env).unwrap());
        assert_eq!("1.5".parse::<Decimal>().unwrap(), Value::text(" 1.5 ").to_number(&env).unwrap());
        assert_eq!(Decimal::from(1234), Value::text("1,234").to_number(&env).unwrap());

        let err = Value::Nil.to_number(&env).unwrap_err();
        assert_eq!("unable to convert null to a number", err.message());
        let err = Value::Boolean(true).to_number(&env).unwrap_err();
        assert_eq!("unable to convert true to a number", err.message());
        let err = Value::text("a").to_number(&env).unwrap_err();
        assert_eq!("unable to convert \"a\" to a number", err.message());
    }

    #[test]
    fn test_to_number_localized() {
        let env = EnvironmentBuilder::new()
            .with_number_format(NumberFormat {
                decimal_symbol: ",".to_string(),
                digit_grouping_symbol: ".".to_string(),
            })
            .build();
        assert_eq!(
            "1234.56".parse::<Decimal>().unwrap(),
            Value::text("1.234,56").to_number(&env).unwrap()
        );
    }

    #[test]
    fn test_to_boolean() {
        let env = env();
        assert!(Value::text("abc").to_boolean(&env).unwrap());
        assert!(!Value::text("").to_boolean(&env).unwrap());
        assert!(!Value::text("FALSE").to_boolean(&env).unwrap());
        assert!(Value::int(1).to_boolean(&env).unwrap());
        assert!(!Value::int(0).to_boolean(&env).unwrap());
        assert!(!Value::Nil.to_boolean(&env).unwrap());
        assert!(!Value::Array(vec![]).to_boolean(&env).unwrap());
        assert!(Value::error("boom").to_boolean(&env).is_err());
    }

    #[test]
    fn test_to_datetime() {
        let env = env();
        assert_eq!(
            dt("2018-06-05T00:00:00Z"),
            Value::text("2018-06-05").to_datetime(&env, false).unwrap()
        );
        assert!(Value::text("wha?").to_datetime(&env, false).is_err());
        assert!(Value::int(123).to_datetime(&env, false).is_err());
        assert_eq!(
            "unable to convert 3 to a datetime",
            Value::int(3).to_datetime(&env, false).unwrap_err().message()
        );
    }

    #[test]
    fn test_value_equality() {
        // numeric equality is exact but scale-insensitive
        assert_eq!(
            Value::Number("1.0".parse().unwrap()),
            Value::Number("1".parse().unwrap())
        );
        assert_ne!(Value::text("1"), Value::int(1));
    }

    #[test]
    fn test_to_json() {
        let obj = Object::new("map")
            .with("Name", Value::text("Ryan \"The Lion\""))
            .with("count", Value::int(2))
            .with("tags", Value::Array(vec![Value::text("a"), Value::Nil]));
        assert_eq!(
            r#"{"Name":"Ryan \"The Lion\"","count":2,"tags":["a",null]}"#,
            Value::Object(obj).to_json()
        );
        assert_eq!("\"2018-04-09T17:01:30Z\"", Value::DateTime(dt("2018-04-09T17:01:30Z")).to_json());
    }

    #[test]
    fn test_json_round_trip() {
        let parsed = Value::from_json(
            &serde_json::from_str(r#"{"a": [1, 2.5, "x"], "b": null, "c": true}"#).unwrap(),
        );
        assert_eq!(r#"{"a":[1,2.5,"x"],"b":null,"c":true}"#, parsed.to_json());
    }
}
