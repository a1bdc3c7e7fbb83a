//! The expression language embedded in flow text. Templates mix literal
//! text with `@name` lookups and `@( … )` expressions; evaluation always
//! yields text, with any failed spans contributing nothing and their errors
//! aggregated for the caller to log.

pub mod ast;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod scanner;
pub mod types;

use scanner::Segment;
use types::Value;

use crate::envs::Environment;

/// The aggregated failures from evaluating one template. `text` holds the
/// best-effort output with failed spans blanked.
#[derive(Debug, Clone)]
pub struct TemplateError {
    pub text: String,
    messages: Vec<String>,
}

impl TemplateError {
    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

impl std::fmt::Display for TemplateError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.messages.join(", "))
    }
}

impl std::error::Error for TemplateError {}

/// Evaluates a template to text. Unknown top-level names are echoed back
/// literally; everything else that fails contributes empty text and an
/// entry in the returned error.
pub fn evaluate_template(
    env: &Environment,
    context: &Value,
    template: &str,
    top_levels: &[String],
) -> Result<String, TemplateError> {
    let mut out = String::with_capacity(template.len());
    let mut messages = Vec::new();

    for segment in scanner::scan(template) {
        match segment {
            Segment::Literal(text) => out.push_str(&text),
            Segment::Identifier(path) => {
                if !is_known_top_level(&path, top_levels) {
                    out.push('@');
                    out.push_str(&path);
                    continue;
                }
                match evaluate_segment(env, context, &path) {
                    Ok(text) => out.push_str(&text),
                    Err(msg) => messages.push(format!("error evaluating @{path}: {msg}")),
                }
            }
            Segment::Expression(inner) => match evaluate_segment(env, context, &inner) {
                Ok(text) => out.push_str(&text),
                Err(msg) => messages.push(format!("error evaluating @({inner}): {msg}")),
            },
        }
    }

    if messages.is_empty() {
        Ok(out)
    } else {
        Err(TemplateError { text: out, messages })
    }
}

/// Evaluates a template that is a single expression to its value, falling
/// back to text evaluation when the template mixes in literal text. Error
/// values from a single expression come back as values, not failures.
pub fn evaluate_template_value(
    env: &Environment,
    context: &Value,
    template: &str,
    top_levels: &[String],
) -> Result<Value, TemplateError> {
    let segments = scanner::scan(template);

    match segments.as_slice() {
        [Segment::Identifier(path)] => {
            if !is_known_top_level(path, top_levels) {
                return Ok(Value::Text(format!("@{path}")));
            }
            Ok(evaluate_expression(env, context, path))
        }
        [Segment::Expression(inner)] => Ok(evaluate_expression(env, context, inner)),
        _ => evaluate_template(env, context, template, top_levels).map(Value::Text),
    }
}

/// Parses and evaluates a bare expression. Parse failures come back as
/// error values.
pub fn evaluate_expression(env: &Environment, context: &Value, expression: &str) -> Value {
    match parser::parse(expression) {
        Ok(expr) => evaluator::evaluate(env, context, &expr),
        Err(msg) => Value::error(msg),
    }
}

fn evaluate_segment(env: &Environment, context: &Value, expression: &str) -> Result<String, String> {
    let value = evaluate_expression(env, context, expression);
    match value {
        Value::Error(err) => Err(err.message().to_string()),
        other => other.to_text(env).map_err(|err| err.message().to_string()),
    }
}

fn is_known_top_level(path: &str, top_levels: &[String]) -> bool {
    let first = path.split('.').next().unwrap_or_default();
    top_levels.iter().any(|name| name.eq_ignore_ascii_case(first))
}

#[cfg(test)]
mod tests {
    use super::types::Object;
    use super::*;
    use crate::envs::EnvironmentBuilder;

    fn context() -> (Value, Vec<String>) {
        let array = Value::Array(vec![
            Value::text("one"),
            Value::text("two"),
            Value::text("three"),
        ]);
        let thing = Object::new("test")
            .with("foo", Value::text("bar"))
            .with("zed", Value::int(123))
            .with("missing", Value::Nil)
            .with_default(Value::text("hello"));

        let obj = Object::new("map")
            .with("string1", Value::text("foo"))
            .with("string2", Value::text("bar"))
            .with("汉字", Value::text("simplified chinese"))
            .with("int1", Value::int(1))
            .with("int2", Value::int(2))
            .with("dec1", Value::Number("1.5".parse().unwrap()))
            .with("dec2", Value::Number("2.5".parse().unwrap()))
            .with("words", Value::text("one two three"))
            .with("array", array)
            .with("thing", Value::Object(thing))
            .with("err", Value::error("an error"))
            .with("key", Value::text("four"));

        let top_levels = obj.keys().cloned().collect();
        (Value::Object(obj), top_levels)
    }

    #[test]
    fn test_evaluate_template() {
        let (ctx, names) = context();
        let env = EnvironmentBuilder::new().build();

        let ok_cases: Vec<(&str, &str)> = vec![
            ("hello world", "hello world"),
            (r#"@("hello\nworld")"#, "hello\nworld"),
            (r#"@("\"hello\nworld\"")"#, "\"hello\nworld\""),
            (r#"@("hello😁world")"#, "hello😁world"),
            (r#"@("hello\U0001F601world")"#, "hello😁world"),
            (r#"@(title("hello"))"#, "Hello"),
            (r#"Hello @(title(string1))"#, "Hello Foo"),
            ("Hello @@string1", "Hello @string1"),
            // unknown top-level names are echoed back, not errors
            ("@hello", "@hello"),
            ("@hello.bar", "@hello.bar"),
            ("My email is foo@bar.com", "My email is foo@bar.com"),
            ("1 + 2", "1 + 2"),
            ("@(1 + 2)", "3"),
            ("@", "@"),
            ("@@", "@"),
            ("@@string1", "@string1"),
            ("@@@string1", "@foo"),
            ("@string1@string2", "foobar"),
            ("@(string1 & string2)", "foobar"),
            ("@string1.@string2", "foo.bar"),
            ("@string1.@string2.@string3", "foo.bar.@string3"),
            ("@(汉字)", "simplified chinese"),
            ("@(string1", "@(string1"),
            ("@ (string1", "@ (string1"),
            ("@ (string1)", "@ (string1)"),
            ("@(int1 + int2)", "3"),
            ("@(dec1 + dec2)", "4"),
            ("@array", "one, two, three"),
            // [n] notation is not part of template identifiers
            ("@array[0]", "one, two, three[0]"),
            ("@(array [0])", "one"),
            ("@(array[0])", "one"),
            ("@(array[3 - 3])", "one"),
            ("@(array[-1])", "three"),
            (r#"@(split(words, " ")[0])"#, "one"),
            (r#"@(split(words, " ")[1])"#, "two"),
            (r#"@(split(words, " ")[-1])"#, "three"),
            ("@(thing.foo)", "bar"),
            (r#"@(thing["foo"])"#, "bar"),
            (r#"@(thing[lower("FOO")])"#, "bar"),
            (r#"@(thing["f" & "o" & "o"])"#, "bar"),
            ("@(thing[string1])", "bar"),
            ("@(thing.zed)", "123"),
            // nil renders as empty text
            ("@(thing.missing)", ""),
        ];
        for (template, expected) in ok_cases {
            let result = evaluate_template(&env, &ctx, template, &names);
            assert_eq!(
                expected,
                result.as_deref().unwrap_or_else(|e| panic!("error evaluating '{template}': {e}")),
                "unexpected output for template '{template}'"
            );
        }

        let error_cases = vec![
            r#"@(title(hello))"#,
            "@string1.xxx",
            r#"@(1 + "asdf")"#,
            "@(int1 + string1)",
            "@(TITLE(missing))",
            "@(TITLE(string1.xxx))",
            r#"@(thing["FOO"])"#, // bracket lookups are strict about case
            "@(thing.missing.xxx)",
            "@(thing.xxx)",
        ];
        for template in error_cases {
            let result = evaluate_template(&env, &ctx, template, &names);
            let err = result.expect_err(&format!("expected error for template '{template}'"));
            assert_eq!("", err.text, "failed spans contribute empty text for '{template}'");
        }
    }

    #[test]
    fn test_evaluate_template_error_messages() {
        let env = EnvironmentBuilder::new().build();
        let ctx = Value::Object(Object::new("map").with("foo", Value::text("bar")));
        let names = vec!["foo".to_string()];

        let cases = vec![
            (r#"@('x')"#, "error evaluating @('x'): syntax error at 'x'"),
            ("@(NULL.x)", "error evaluating @(NULL.x): null has no property 'x'"),
            (r#"@("abc".v)"#, r#"error evaluating @("abc".v): "abc" has no property 'v'"#),
            ("@(False.g)", "error evaluating @(False.g): false has no property 'g'"),
            ("@(1.1.0)", "error evaluating @(1.1.0): 1.1 has no property '0'"),
            ("@(hello)", "error evaluating @(hello): map has no property 'hello'"),
            ("@(foo.x)", r#"error evaluating @(foo.x): "bar" has no property 'x'"#),
            ("@foo.x", r#"error evaluating @foo.x: "bar" has no property 'x'"#),
            (
                "@(array(1, 2)[5])",
                "error evaluating @(array(1, 2)[5]): index 5 out of range for 2 items",
            ),
            ("@(1 + null)", "error evaluating @(1 + null): unable to convert null to a number"),
            ("@(1 + true)", "error evaluating @(1 + true): unable to convert true to a number"),
            (r#"@("a" + 2)"#, r#"error evaluating @("a" + 2): unable to convert "a" to a number"#),
            (
                r#"@(format_datetime("x"))"#,
                r#"error evaluating @(format_datetime("x")): error calling FORMAT_DATETIME: unable to convert "x" to a datetime"#,
            ),
            ("@(FOO())", "error evaluating @(FOO()): no function with name 'foo'"),
            ("@(length(1))", "error evaluating @(length(1)): error calling LENGTH: value doesn't have length"),
            (
                r#"@(word_count())"#,
                "error evaluating @(word_count()): error calling WORD_COUNT: need 1 to 2 argument(s), got 0",
            ),
            (
                r#"@(word_count("a", "b", "c"))"#,
                "error evaluating @(word_count(\"a\", \"b\", \"c\")): error calling WORD_COUNT: need 1 to 2 argument(s), got 3",
            ),
        ];
        for (template, expected) in cases {
            let err = evaluate_template(&env, &ctx, template, &names)
                .expect_err(&format!("expected error for template '{template}'"));
            assert_eq!(expected, err.to_string(), "error mismatch for template '{template}'");
            assert_eq!("", err.text);
        }
    }

    #[test]
    fn test_evaluate_template_value() {
        let (ctx, names) = context();
        let env = EnvironmentBuilder::new().build();

        let cases: Vec<(&str, Value)> = vec![
            ("hello world", Value::text("hello world")),
            ("@hello", Value::text("@hello")),
            ("@dec1", Value::Number("1.5".parse().unwrap())),
            ("@(dec1 + dec2)", Value::Number("4.0".parse().unwrap())),
            ("@(1+2)", Value::int(3)),
            ("@(-10)", Value::int(-10)),
            ("@(2^2)", Value::int(4)),
            ("@(1/2)", Value::Number("0.5".parse().unwrap())),
            ("@(false)", Value::Boolean(false)),
            ("@(TRUE)", Value::Boolean(true)),
            ("@(1+1+1)", Value::int(3)),
            ("@(5-2+1)", Value::int(4)),
            ("@(2*3*4+2)", Value::int(26)),
            ("@(4*3/4)", Value::int(3)),
            ("@(4/2*4)", Value::int(8)),
            ("@(2^2^2)", Value::int(16)),
            (r#"@("a" & "b" & "c")"#, Value::text("abc")),
            ("@(1+3 <= 1+4)", Value::Boolean(true)),
            (r#"@("asdf" = "asdf")"#, Value::Boolean(true)),
            (r#"@("asdf" = "ASDF")"#, Value::Boolean(false)),
            (r#"@("asdf" != "basf")"#, Value::Boolean(true)),
            ("@(true = TRUE)", Value::Boolean(true)),
            ("@(1 = 1)", Value::Boolean(true)),
            ("@(1.0 = 1)", Value::Boolean(true)),
            ("@(1.1 = 1.10)", Value::Boolean(true)),
            ("@(1.1234 = 1.10)", Value::Boolean(false)),
            ("@(-1 = 1)", Value::Boolean(false)),
            // 11=11 is true, then "true" != "11"
            ("@(11=11=11)", Value::Boolean(false)),
            ("@(2 > 1)", Value::Boolean(true)),
            ("@(1 >= 2)", Value::Boolean(false)),
            ("@(null)", Value::Nil),
            ("@(null = NULL)", Value::Boolean(true)),
            ("@(null != NULL)", Value::Boolean(false)),
            ("@(TITLE(string1))", Value::text("Foo")),
            ("@string1 world", Value::text("foo world")),
            // falls back to template text when literals surround it
            ("@string1 @string2", Value::text("foo bar")),
            ("@string1@string2", Value::text("foobar")),
        ];
        for (template, expected) in cases {
            let value = evaluate_template_value(&env, &ctx, template, &names)
                .unwrap_or_else(|e| panic!("error evaluating '{template}': {e}"));
            assert_eq!(expected, value, "unexpected value for template '{template}'");
        }

        let error_cases = vec![
            "@(-asdf)",
            "@(2^asdf)",
            "@(1-asdf)",
            "@(asdf+1)",
            "@(1/0)",
            "@(1*asdf)",
            "@(missing & \"bar\")",
            "@(MISSING(string1))",
            "@(TITLE(string1, string2))",
            "@(1 = asdf)",
            "@((1 / 0).field)",
            "@((1 / 0)[0])",
            "@(array[1 / 0])",
            r#"@(1 < "asdf")"#,
            r#"@("asdf" < "basf")"#,
            "@(1<2<3)",
            "@array.1",
        ];
        for template in error_cases {
            let value = evaluate_template_value(&env, &ctx, template, &names)
                .unwrap_or_else(|e| panic!("unexpected failure for '{template}': {e}"));
            assert!(value.is_error(), "expected error value for template '{template}', got {value:?}");
        }
    }
}
