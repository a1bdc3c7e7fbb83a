//! Parser for the expression language: a pest grammar plus builder
//! functions that fold the layered precedence rules into an AST.

use pest::iterators::Pair;
use pest::Parser;
use pest_derive::Parser;
use rust_decimal::Decimal;

use super::ast::{BinaryOp, Expr};

#[derive(Parser)]
#[grammar = "excellent/grammar.pest"]
struct ExpressionParser;

/// Parses an expression, reporting failures the way they surface to flow
/// authors: `syntax error at <rest>`.
pub fn parse(expression: &str) -> Result<Expr, String> {
    let mut pairs = ExpressionParser::parse(Rule::parse, expression).map_err(|err| {
        let pos = match err.location {
            pest::error::InputLocation::Pos(p) => p,
            pest::error::InputLocation::Span((start, _)) => start,
        };
        let rest = expression.get(pos..).unwrap_or("");
        format!("syntax error at {rest}")
    })?;

    let parse_pair = pairs.next().expect("parse rule always produces a pair");
    let expr_pair = parse_pair
        .into_inner()
        .find(|p| p.as_rule() == Rule::expression)
        .expect("parse rule contains an expression");

    build_expression(expr_pair)
}

fn build_expression(pair: Pair<Rule>) -> Result<Expr, String> {
    match pair.as_rule() {
        Rule::expression => build_expression(pair.into_inner().next().unwrap()),

        Rule::concat_expr
        | Rule::equality_expr
        | Rule::compare_expr
        | Rule::additive_expr
        | Rule::multiply_expr => build_binary_chain(pair, false),

        // exponentiation associates to the right
        Rule::exponent_expr => build_binary_chain(pair, true),

        Rule::unary_expr => {
            let mut inner = pair.into_inner();
            let first = inner.next().unwrap();
            if first.as_rule() == Rule::minus_op {
                let operand = build_expression(inner.next().unwrap())?;
                Ok(Expr::Negate(Box::new(operand)))
            } else {
                build_expression(first)
            }
        }

        Rule::postfix_expr => {
            let mut inner = pair.into_inner();
            let mut expr = build_atom(inner.next().unwrap())?;
            for lookup in inner {
                let part = lookup.into_inner().next().unwrap();
                expr = match part.as_rule() {
                    Rule::dot_lookup => {
                        let key = part.into_inner().next().unwrap().as_str().to_string();
                        Expr::Property { object: Box::new(expr), key }
                    }
                    Rule::index_lookup => {
                        let index = build_expression(part.into_inner().next().unwrap())?;
                        Expr::Index { object: Box::new(expr), index: Box::new(index) }
                    }
                    rule => return Err(format!("unexpected lookup rule: {rule:?}")),
                };
            }
            Ok(expr)
        }

        rule => Err(format!("unexpected expression rule: {rule:?}")),
    }
}

/// Folds `operand (op operand)*` into nested binary expressions, left
/// associative unless `right_assoc`.
fn build_binary_chain(pair: Pair<Rule>, right_assoc: bool) -> Result<Expr, String> {
    let mut operands = Vec::new();
    let mut ops = Vec::new();

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::concat_op | Rule::eq_op | Rule::cmp_op | Rule::add_op | Rule::mul_op
            | Rule::pow_op => ops.push(binary_op(part.as_str())?),
            _ => operands.push(build_expression(part)?),
        }
    }

    if right_assoc {
        let mut expr = operands.pop().expect("chain has at least one operand");
        while let Some(left) = operands.pop() {
            let op = ops.pop().expect("one op per extra operand");
            expr = Expr::Binary { op, left: Box::new(left), right: Box::new(expr) };
        }
        Ok(expr)
    } else {
        let mut operands = operands.into_iter();
        let mut expr = operands.next().expect("chain has at least one operand");
        for (op, right) in ops.into_iter().zip(operands) {
            expr = Expr::Binary { op, left: Box::new(expr), right: Box::new(right) };
        }
        Ok(expr)
    }
}

fn binary_op(symbol: &str) -> Result<BinaryOp, String> {
    Ok(match symbol {
        "&" => BinaryOp::Concat,
        "=" | "==" => BinaryOp::Equal,
        "!=" | "<>" => BinaryOp::NotEqual,
        "<" => BinaryOp::LessThan,
        "<=" => BinaryOp::LessThanOrEqual,
        ">" => BinaryOp::GreaterThan,
        ">=" => BinaryOp::GreaterThanOrEqual,
        "+" => BinaryOp::Add,
        "-" => BinaryOp::Subtract,
        "*" => BinaryOp::Multiply,
        "/" => BinaryOp::Divide,
        "^" => BinaryOp::Exponent,
        _ => return Err(format!("unknown operator: {symbol}")),
    })
}

fn build_atom(pair: Pair<Rule>) -> Result<Expr, String> {
    debug_assert_eq!(Rule::atom, pair.as_rule());
    let mut inner = pair.into_inner();
    let first = inner.next().unwrap();

    match first.as_rule() {
        Rule::function_call => {
            let mut parts = first.into_inner();
            let name = parts.next().unwrap().as_str().to_lowercase();
            let mut args = Vec::new();
            if let Some(params) = parts.next() {
                for param in params.into_inner() {
                    args.push(build_expression(param)?);
                }
            }
            Ok(Expr::FunctionCall { name, args })
        }
        Rule::number => {
            let num = first
                .as_str()
                .parse::<Decimal>()
                .map_err(|_| format!("invalid number literal: {}", first.as_str()))?;
            Ok(Expr::NumberLiteral(num))
        }
        Rule::text => Ok(Expr::TextLiteral(unescape(first.as_str()))),
        Rule::bool_true => Ok(Expr::BooleanLiteral(true)),
        Rule::bool_false => Ok(Expr::BooleanLiteral(false)),
        Rule::null => Ok(Expr::NullLiteral),
        Rule::context_ref => Ok(Expr::ContextRef(first.as_str().to_lowercase())),
        Rule::expression => build_expression(first),
        rule => Err(format!("unexpected atom rule: {rule:?}")),
    }
}

/// Strips the surrounding quotes and processes standard escape sequences,
/// including `\uXXXX` and `\UXXXXXXXX`.
fn unescape(quoted: &str) -> String {
    let inner = &quoted[1..quoted.len() - 1];
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();

    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('"') => out.push('"'),
            Some('\\') => out.push('\\'),
            Some('u') => push_codepoint(&mut out, &mut chars, 4),
            Some('U') => push_codepoint(&mut out, &mut chars, 8),
            Some(other) => out.push(other),
            None => break,
        }
    }
    out
}

fn push_codepoint(out: &mut String, chars: &mut std::str::Chars, digits: usize) {
    let hex: String = chars.take(digits).collect();
    match u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
        Some(ch) => out.push(ch),
        None => {
            out.push('\\');
            out.push_str(&hex);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(s: &str) -> Expr {
        Expr::NumberLiteral(s.parse().unwrap())
    }

    #[test]
    fn test_parse_literals() {
        assert_eq!(num("123"), parse("123").unwrap());
        assert_eq!(num("1.5"), parse("1.5").unwrap());
        assert_eq!(Expr::TextLiteral("hello\nworld".to_string()), parse(r#""hello\nworld""#).unwrap());
        assert_eq!(Expr::TextLiteral("hello😁world".to_string()), parse(r#""hello\U0001F601world""#).unwrap());
        assert_eq!(Expr::BooleanLiteral(true), parse("TRUE").unwrap());
        assert_eq!(Expr::NullLiteral, parse("Null").unwrap());
        assert_eq!(Expr::ContextRef("contact".to_string()), parse("Contact").unwrap());
    }

    #[test]
    fn test_parse_operators() {
        assert_eq!(
            Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(num("1")),
                right: Box::new(num("2")),
            },
            parse("1 + 2").unwrap()
        );

        // left associative: (5-2)+1
        assert_eq!(
            Expr::Binary {
                op: BinaryOp::Add,
                left: Box::new(Expr::Binary {
                    op: BinaryOp::Subtract,
                    left: Box::new(num("5")),
                    right: Box::new(num("2")),
                }),
                right: Box::new(num("1")),
            },
            parse("5 - 2 + 1").unwrap()
        );

        // exponent is right associative: 2^(2^3)
        assert_eq!(
            Expr::Binary {
                op: BinaryOp::Exponent,
                left: Box::new(num("2")),
                right: Box::new(Expr::Binary {
                    op: BinaryOp::Exponent,
                    left: Box::new(num("2")),
                    right: Box::new(num("3")),
                }),
            },
            parse("2 ^ 2 ^ 3").unwrap()
        );
    }

    #[test]
    fn test_parse_lookups() {
        assert_eq!(
            Expr::Property {
                object: Box::new(Expr::ContextRef("contact".to_string())),
                key: "name".to_string(),
            },
            parse("contact.name").unwrap()
        );

        // numeric dot lookups parse but array access requires brackets
        assert_eq!(
            Expr::Property {
                object: Box::new(Expr::ContextRef("array".to_string())),
                key: "0".to_string(),
            },
            parse("array.0").unwrap()
        );

        assert_eq!(
            Expr::Index {
                object: Box::new(Expr::ContextRef("array".to_string())),
                index: Box::new(num("0")),
            },
            parse("array[0]").unwrap()
        );

        // 1.1.0 is the number 1.1 with a property lookup
        assert_eq!(
            Expr::Property { object: Box::new(num("1.1")), key: "0".to_string() },
            parse("1.1.0").unwrap()
        );
    }

    #[test]
    fn test_parse_function_calls() {
        assert_eq!(
            Expr::FunctionCall {
                name: "title".to_string(),
                args: vec![Expr::ContextRef("foo".to_string())],
            },
            parse("TITLE(foo)").unwrap()
        );
        assert_eq!(
            Expr::FunctionCall { name: "now".to_string(), args: vec![] },
            parse("now()").unwrap()
        );
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!("syntax error at 'x'", parse("'x'").unwrap_err());
        assert!(parse("0 / ").unwrap_err().starts_with("syntax error at"));
        assert!(parse("").is_err());
    }
}
