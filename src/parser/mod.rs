//! Template expression parser - PEST-based
//!
//! Produces the interpreter AST, with span information for error reporting.

use pest::iterators::{Pair, Pairs};
use pest::Parser;
use pest_derive::Parser;
use thiserror::Error;

use crate::interpreter::types::{BinaryOp, Expr, LogicalOp, Span, UnaryOp};

pub mod semantic_validator;


/* ===================== PEST Parser ===================== */

#[derive(Parser)]
#[grammar = "parser/template.pest"]
struct TemplateParser;

/* ===================== Error Types ===================== */

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("{0}")]
    PestError(String, Option<Span>),
    #[error("{0}")]
    BuildError(String, Option<Span>),
}

impl ParseError {
    pub fn span(&self) -> Option<Span> {
        match self {
            ParseError::PestError(_, span) => *span,
            ParseError::BuildError(_, span) => *span,
        }
    }

    pub fn message(&self) -> &str {
        match self {
            ParseError::PestError(msg, _) => msg,
            ParseError::BuildError(msg, _) => msg,
        }
    }
}

impl From<pest::error::Error<Rule>> for ParseError {
    fn from(err: pest::error::Error<Rule>) -> Self {
        let span = match err.line_col {
            pest::error::LineColLocation::Pos((line, col)) => Some(Span {
                start: 0,
                end: 0,
                start_line: line.saturating_sub(1),
                start_col: col.saturating_sub(1),
                end_line: line.saturating_sub(1),
                end_col: col,
            }),
            pest::error::LineColLocation::Span((start_line, start_col), (end_line, end_col)) => {
                Some(Span {
                    start: 0,
                    end: 0,
                    start_line: start_line.saturating_sub(1),
                    start_col: start_col.saturating_sub(1),
                    end_line: end_line.saturating_sub(1),
                    end_col: end_col.saturating_sub(1),
                })
            }
        };
        ParseError::PestError(err.to_string(), span)
    }
}

pub type ParseResult<T> = Result<T, ParseError>;

/* ===================== Span Helpers ===================== */

/// Convert a PEST pair's span to our Span type
fn pair_to_span(pair: &Pair<Rule>, source: &str) -> Span {
    let pest_span = pair.as_span();
    let start = pest_span.start();
    let end = pest_span.end();

    let (start_line, start_col) = offset_to_line_col(source, start);
    let (end_line, end_col) = offset_to_line_col(source, end);

    Span::new(start, end, start_line, start_col, end_line, end_col)
}

/// Convert byte offset to (line, column) - 0-indexed
fn offset_to_line_col(source: &str, offset: usize) -> (usize, usize) {
    let mut line = 0;
    let mut col = 0;
    let mut current_offset = 0;

    for ch in source.chars() {
        if current_offset >= offset {
            break;
        }
        if ch == '\n' {
            line += 1;
            col = 0;
        } else {
            col += 1;
        }
        current_offset += ch.len_utf8();
    }

    (line, col)
}

/// Take the next inner pair, failing with a build error naming what was expected
fn expect_next<'i>(
    inner: &mut Pairs<'i, Rule>,
    what: &str,
    span: Span,
) -> ParseResult<Pair<'i, Rule>> {
    inner
        .next()
        .ok_or_else(|| ParseError::BuildError(format!("Expected {}", what), Some(span)))
}

/* ===================== Public API ===================== */

/// Parse the expression text of a template (the part between `{{` and `}}`)
pub fn parse_expression(source: &str) -> ParseResult<Expr> {
    let mut pairs = TemplateParser::parse(Rule::program, source)?;
    let whole = Span::new(0, source.len(), 0, 0, 0, 0);

    let program = expect_next(&mut pairs, "program", whole)?;
    let program_span = pair_to_span(&program, source);
    let mut inner = program.into_inner();
    let expression = expect_next(&mut inner, "expression", program_span)?;

    build_expression(expression, source)
}

/* ===================== AST Builder ===================== */

fn build_binary_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let inner_pairs: Vec<_> = pair.into_inner().collect();

    if inner_pairs.is_empty() {
        return Err(ParseError::BuildError(
            "Empty binary expression".to_string(),
            Some(span),
        ));
    }

    let mut left = build_expression(inner_pairs[0].clone(), source)?;

    let mut i = 1;
    while i < inner_pairs.len() {
        let op_rule = inner_pairs[i].as_rule();

        i += 1;
        if i >= inner_pairs.len() {
            return Err(ParseError::BuildError(
                "Missing right operand after operator".to_string(),
                Some(span),
            ));
        }

        let right = build_expression(inner_pairs[i].clone(), source)?;
        let new_span = left.span().merge(&right.span());

        let logical = match op_rule {
            Rule::op_and => Some(LogicalOp::And),
            Rule::op_or => Some(LogicalOp::Or),
            Rule::op_nullish => Some(LogicalOp::Nullish),
            _ => None,
        };

        left = if let Some(op) = logical {
            Expr::Logical {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: new_span,
            }
        } else {
            let op = match op_rule {
                Rule::op_strict_eq => BinaryOp::StrictEq,
                Rule::op_strict_ne => BinaryOp::StrictNe,
                Rule::op_eq => BinaryOp::Eq,
                Rule::op_ne => BinaryOp::Ne,
                Rule::op_lt => BinaryOp::Lt,
                Rule::op_lte => BinaryOp::Lte,
                Rule::op_gt => BinaryOp::Gt,
                Rule::op_gte => BinaryOp::Gte,
                Rule::op_add => BinaryOp::Add,
                Rule::op_sub => BinaryOp::Sub,
                Rule::op_mul => BinaryOp::Mul,
                Rule::op_div => BinaryOp::Div,
                Rule::op_mod => BinaryOp::Mod,
                _ => {
                    return Err(ParseError::BuildError(
                        format!(
                            "Expected operator rule at index {}, got {:?}",
                            i - 1,
                            op_rule
                        ),
                        Some(span),
                    ))
                }
            };
            Expr::Binary {
                op,
                left: Box::new(left),
                right: Box::new(right),
                span: new_span,
            }
        };

        i += 1;
    }

    Ok(left)
}

fn build_expression(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);

    match pair.as_rule() {
        Rule::expression | Rule::primary | Rule::literal | Rule::paren_expr => {
            let inner = expect_next(&mut pair.into_inner(), "expression", span)?;
            build_expression(inner, source)
        }
        Rule::ternary_expr => {
            let mut inner = pair.into_inner();
            let condition = build_expression(expect_next(&mut inner, "condition", span)?, source)?;

            if let Some(consequent_pair) = inner.next() {
                let consequent = build_expression(consequent_pair, source)?;
                let alternate =
                    build_expression(expect_next(&mut inner, "':' branch", span)?, source)?;
                Ok(Expr::Ternary {
                    condition: Box::new(condition),
                    consequent: Box::new(consequent),
                    alternate: Box::new(alternate),
                    span,
                })
            } else {
                Ok(condition)
            }
        }
        Rule::nullish_expr
        | Rule::logical_or_expr
        | Rule::logical_and_expr
        | Rule::equality_expr
        | Rule::comparison_expr
        | Rule::additive_expr
        | Rule::multiplicative_expr => build_binary_expr(pair, source),
        Rule::unary_expr => {
            let mut inner = pair.into_inner();
            let first = expect_next(&mut inner, "operand", span)?;

            let op = match first.as_rule() {
                Rule::op_not => UnaryOp::Not,
                Rule::op_neg => UnaryOp::Neg,
                Rule::op_pos => UnaryOp::Pos,
                _ => return build_expression(first, source),
            };
            let operand = build_expression(expect_next(&mut inner, "operand", span)?, source)?;
            Ok(Expr::Unary {
                op,
                operand: Box::new(operand),
                span,
            })
        }
        Rule::call_expr => build_call_expr(pair, source),
        Rule::identifier => {
            let name = pair.as_str().to_string();
            Ok(Expr::Ident { name, span })
        }
        Rule::number => {
            let num_str = pair.as_str();
            let value = num_str.parse::<f64>().map_err(|e| {
                ParseError::BuildError(
                    format!("Failed to parse number '{}': {}", num_str, e),
                    Some(span),
                )
            })?;
            Ok(Expr::LitNum { v: value, span })
        }
        Rule::boolean => {
            let value = pair.as_str() == "true";
            Ok(Expr::LitBool { v: value, span })
        }
        Rule::string => Ok(Expr::LitStr {
            v: build_string(pair),
            span,
        }),
        Rule::null_lit => Ok(Expr::LitNull { span }),
        Rule::undefined_lit => Ok(Expr::LitUndefined { span }),
        Rule::object_lit => build_object_literal(pair, source),
        Rule::array_lit => build_array_literal(pair, source),
        _ => Err(ParseError::BuildError(
            format!("Unexpected expression rule: {:?}", pair.as_rule()),
            Some(span),
        )),
    }
}

fn build_call_expr(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();
    let mut expr = build_expression(expect_next(&mut inner, "primary", span)?, source)?;

    for postfix_pair in inner {
        let postfix_span = pair_to_span(&postfix_pair, source);
        let postfix_inner = expect_next(&mut postfix_pair.into_inner(), "postfix", postfix_span)?;
        let new_span = expr.span().merge(&postfix_span);
        let rule = postfix_inner.as_rule();

        expr = match rule {
            Rule::call_suffix | Rule::optional_call => {
                let args = match postfix_inner.into_inner().next() {
                    Some(arg_list_pair) => build_arg_list(arg_list_pair, source)?,
                    None => vec![],
                };
                Expr::Call {
                    callee: Box::new(expr),
                    args,
                    optional: rule == Rule::optional_call,
                    span: new_span,
                }
            }
            Rule::index_suffix | Rule::optional_index => {
                let index_pair =
                    expect_next(&mut postfix_inner.into_inner(), "index", postfix_span)?;
                Expr::Index {
                    object: Box::new(expr),
                    index: Box::new(build_expression(index_pair, source)?),
                    optional: rule == Rule::optional_index,
                    span: new_span,
                }
            }
            Rule::regular_access | Rule::optional_access => {
                let prop_pair =
                    expect_next(&mut postfix_inner.into_inner(), "property", postfix_span)?;
                Expr::Member {
                    object: Box::new(expr),
                    property: prop_pair.as_str().to_string(),
                    property_span: pair_to_span(&prop_pair, source),
                    optional: rule == Rule::optional_access,
                    span: new_span,
                }
            }
            _ => {
                return Err(ParseError::BuildError(
                    format!("Unexpected postfix rule: {:?}", rule),
                    Some(postfix_span),
                ))
            }
        };
    }

    Ok(expr)
}

/// Decode a string literal, resolving backslash escapes
fn build_string(pair: Pair<Rule>) -> String {
    let raw = pair
        .into_inner()
        .next()
        .map(|content| content.as_str())
        .unwrap_or_default();

    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars().peekable();
    while let Some(ch) = chars.next() {
        if ch != '\\' {
            out.push(ch);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{8}'),
            Some('f') => out.push('\u{c}'),
            Some('v') => out.push('\u{b}'),
            Some('0') => out.push('\0'),
            Some('x') => match take_hex(&mut chars, 2) {
                Some(code) => out.push(char::from_u32(code).unwrap_or('\u{fffd}')),
                None => out.push('x'),
            },
            Some('u') => match decode_unicode_escape(&mut chars) {
                Some(decoded) => out.push(decoded),
                None => out.push('u'),
            },
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

type EscapeChars<'a> = std::iter::Peekable<std::str::Chars<'a>>;

/// Consume exactly `len` hex digits; on failure nothing is consumed
fn take_hex(chars: &mut EscapeChars, len: usize) -> Option<u32> {
    let digits: String = chars.clone().take(len).collect();
    if digits.len() != len || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    for _ in 0..len {
        chars.next();
    }
    u32::from_str_radix(&digits, 16).ok()
}

/// Body of a `\u` escape: `XXXX`, a surrogate pair `XXXX\uXXXX`, or `{X...}`
fn decode_unicode_escape(chars: &mut EscapeChars) -> Option<char> {
    if chars.peek() == Some(&'{') {
        let rest: String = chars.clone().skip(1).collect();
        let body = &rest[..rest.find('}')?];
        let code = u32::from_str_radix(body, 16).ok()?;
        let decoded = char::from_u32(code)?;
        for _ in 0..body.len() + 2 {
            chars.next();
        }
        return Some(decoded);
    }

    let high = take_hex(chars, 4)?;
    if (0xD800..0xDC00).contains(&high) {
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('\\') && lookahead.next() == Some('u') {
            if let Some(low) = take_hex(&mut lookahead, 4) {
                if (0xDC00..0xE000).contains(&low) {
                    *chars = lookahead;
                    let code = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(code);
                }
            }
        }
    }
    Some(char::from_u32(high).unwrap_or('\u{fffd}'))
}

fn build_arg_list(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<Expr>> {
    pair.into_inner()
        .map(|expr_pair| build_expression(expr_pair, source))
        .collect()
}

fn build_object_literal(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let properties = if let Some(property_list_pair) = inner.next() {
        build_property_list(property_list_pair, source)?
    } else {
        vec![]
    };

    Ok(Expr::LitObj { properties, span })
}

fn build_property_list(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<(String, Span, Expr)>> {
    pair.into_inner()
        .map(|property_pair| build_property(property_pair, source))
        .collect()
}

fn build_property(pair: Pair<Rule>, source: &str) -> ParseResult<(String, Span, Expr)> {
    let span = pair_to_span(&pair, source);
    let inner = expect_next(&mut pair.into_inner(), "property", span)?;
    let inner_span = pair_to_span(&inner, source);

    match inner.as_rule() {
        Rule::property_pair => {
            let mut inner_pairs = inner.into_inner();
            let key_pair = expect_next(&mut inner_pairs, "property key", inner_span)?;
            let key_span = pair_to_span(&key_pair, source);
            let key = build_property_key(key_pair, source)?;
            let value_pair = expect_next(&mut inner_pairs, "property value", inner_span)?;
            let value = build_expression(value_pair, source)?;
            Ok((key, key_span, value))
        }
        Rule::property_shorthand => {
            let key = inner.as_str().to_string();
            let value = Expr::Ident {
                name: key.clone(),
                span: inner_span,
            };
            Ok((key, inner_span, value))
        }
        _ => Err(ParseError::BuildError(
            format!("Unexpected property rule: {:?}", inner.as_rule()),
            Some(inner_span),
        )),
    }
}

fn build_property_key(pair: Pair<Rule>, source: &str) -> ParseResult<String> {
    let span = pair_to_span(&pair, source);
    let key = expect_next(&mut pair.into_inner(), "property key", span)?;
    match key.as_rule() {
        Rule::string => Ok(build_string(key)),
        Rule::number => match build_expression(key, source)? {
            Expr::LitNum { v, .. } => Ok(crate::interpreter::types::format_number(v)),
            _ => Err(ParseError::BuildError("Invalid numeric key".to_string(), Some(span))),
        },
        _ => Ok(key.as_str().to_string()),
    }
}

fn build_array_literal(pair: Pair<Rule>, source: &str) -> ParseResult<Expr> {
    let span = pair_to_span(&pair, source);
    let mut inner = pair.into_inner();

    let elements = if let Some(element_list_pair) = inner.next() {
        build_element_list(element_list_pair, source)?
    } else {
        vec![]
    };

    Ok(Expr::LitList { elements, span })
}

fn build_element_list(pair: Pair<Rule>, source: &str) -> ParseResult<Vec<Expr>> {
    pair.into_inner()
        .map(|expr_pair| build_expression(expr_pair, source))
        .collect()
}
