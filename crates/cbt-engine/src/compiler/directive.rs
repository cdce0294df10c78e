//! Directive classification
//!
//! Turns the text between a delimiter pair into a [`Directive`], parsing any
//! embedded expressions along the way.

use once_cell::sync::Lazy;
use regex::Regex;

use super::program::Filter;
use crate::{
    error::{Result, TemplateError},
    expr::{parse_arguments, parse_expression, parse_params, parse_statements, Expr, Stmt},
};

#[derive(Debug, Clone, PartialEq)]
pub enum Directive {
    Output { expr: Expr, filter: Filter },
    If(Expr),
    ElseIf(Expr),
    Else,
    EndIf,
    Foreach { item: String, source: Expr },
    ForeachElse,
    ForeachBreak,
    EndForeach,
    Define { name: String, params: Vec<String> },
    EndDefine,
    Run { name: String, args: Vec<Expr> },
    Statements(Vec<Stmt>),
    /// Inheritance markers, meaningful only to the layout resolver
    Marker,
}

/// Keywords consumed by the layout resolver
pub const LAYOUT_KEYWORDS: &[&str] = &[
    "extends", "block", "/block", "parent", "child", "use", "apply", "/apply", "call", "/call",
    "slot", "/slot",
];

fn pattern(source: &str) -> Regex {
    Regex::new(source).unwrap_or_else(|e| unreachable!("static directive pattern: {}", e))
}

static IF: Lazy<Regex> = Lazy::new(|| pattern(r"(?s)^if\s*\((.*)\)$"));
static ELSE_IF: Lazy<Regex> = Lazy::new(|| pattern(r"(?s)^else\s*if\s*\((.*)\)$"));
static FOREACH: Lazy<Regex> =
    Lazy::new(|| pattern(r"(?s)^foreach\s*\(\s*([A-Za-z_$][\w$]*)\s+in\s+(.+)\)$"));
static DEFINE: Lazy<Regex> = Lazy::new(|| pattern(r"(?s)^define\s+([A-Za-z0-9_$]+)\s*\((.*)\)$"));
static RUN: Lazy<Regex> = Lazy::new(|| pattern(r"(?s)^run\s+([A-Za-z0-9_$]+)\s*\((.*)\)$"));

/// Value-output prefixes, checked in order
const OUTPUT_PREFIXES: &[&str] = &[
    ":func=", ":func-", ":h=", ":u=", ":v=", ":a=", ":m=", ":s=", ":p=", ":=", "=", "-",
];

/// Classify the inner text of one directive
pub fn classify(inner: &str, escape: bool) -> Result<Directive> {
    let source = inner.trim();

    if let Some(prefix) = OUTPUT_PREFIXES.iter().find(|p| source.starts_with(**p)) {
        return output(inner, prefix, &source[prefix.len()..], escape);
    }

    let keyword = source.split_whitespace().next().unwrap_or("");
    let fail = |message: String| TemplateError::Directive {
        directive: source.to_string(),
        message,
    };

    let directive = match source {
        "else" => Directive::Else,
        "/if" => Directive::EndIf,
        "foreachelse" => Directive::ForeachElse,
        "foreachbreak" => Directive::ForeachBreak,
        "/foreach" => Directive::EndForeach,
        "/define" => Directive::EndDefine,
        _ if LAYOUT_KEYWORDS.contains(&keyword) => Directive::Marker,
        _ => {
            if let Some(caps) = ELSE_IF.captures(source) {
                Directive::ElseIf(parse_expression(&caps[1]).map_err(fail)?)
            } else if let Some(caps) = IF.captures(source) {
                Directive::If(parse_expression(&caps[1]).map_err(fail)?)
            } else if let Some(caps) = FOREACH.captures(source) {
                Directive::Foreach {
                    item: caps[1].to_string(),
                    source: parse_expression(&caps[2]).map_err(fail)?,
                }
            } else if let Some(caps) = DEFINE.captures(source) {
                Directive::Define {
                    name: caps[1].to_string(),
                    params: parse_params(&caps[2]).map_err(fail)?,
                }
            } else if let Some(caps) = RUN.captures(source) {
                Directive::Run {
                    name: caps[1].to_string(),
                    args: parse_arguments(&caps[2]).map_err(fail)?,
                }
            } else if matches!(keyword, "foreach" | "define" | "run") {
                return Err(fail(format!("malformed `{}` directive", keyword)));
            } else {
                Directive::Statements(parse_statements(source).map_err(fail)?)
            }
        }
    };
    Ok(directive)
}

fn output(inner: &str, prefix: &str, rest: &str, escape: bool) -> Result<Directive> {
    let fail = |message: String| TemplateError::Directive {
        directive: inner.trim().to_string(),
        message,
    };
    let expression = |text: &str| parse_expression(trim_output(text)).map_err(fail);

    let (expr, filter) = match prefix {
        ":a=" => match split_pipe(rest) {
            Some((expr, separator)) => (
                expression(expr)?,
                Filter::Join {
                    separator: separator.to_string(),
                },
            ),
            None => (
                expression(rest)?,
                Filter::Join {
                    separator: String::new(),
                },
            ),
        },
        ":s=" => {
            let (expr, length) = split_pipe(rest)
                .ok_or_else(|| fail("expected `EXPR|LENGTH`".to_string()))?;
            let length = trim_output(length)
                .parse::<usize>()
                .map_err(|_| fail(format!("invalid truncation length `{}`", length.trim())))?;
            (expression(expr)?, Filter::Truncate { length })
        }
        ":h=" | ":func=" => (expression(rest)?, Filter::Escape),
        ":=" | "-" | ":func-" => (expression(rest)?, Filter::Raw),
        ":u=" => (expression(rest)?, Filter::Url),
        ":v=" => (expression(rest)?, Filter::Attr),
        ":m=" => (expression(rest)?, Filter::Money),
        ":p=" => (expression(rest)?, Filter::Protocol),
        _ => (
            expression(rest)?,
            if escape { Filter::Escape } else { Filter::Raw },
        ),
    };
    Ok(Directive::Output { expr, filter })
}

/// Output expressions tolerate trailing semicolons
fn trim_output(text: &str) -> &str {
    text.trim().trim_end_matches(';').trim_end()
}

/// Split at the last `|` that is not part of `||`, inside a string, or
/// inside brackets
fn split_pipe(text: &str) -> Option<(&str, &str)> {
    let bytes = text.as_bytes();
    let mut depth = 0i32;
    let mut quote: Option<u8> = None;
    let mut found = None;
    let mut i = 0;

    while i < bytes.len() {
        let b = bytes[i];
        match quote {
            Some(q) => {
                if b == b'\\' {
                    i += 1;
                } else if b == q {
                    quote = None;
                }
            }
            None => match b {
                b'\'' | b'"' => quote = Some(b),
                b'(' | b'[' | b'{' => depth += 1,
                b')' | b']' | b'}' => depth -= 1,
                b'|' if bytes.get(i + 1) == Some(&b'|') => i += 1,
                b'|' if depth == 0 => found = Some(i),
                _ => {}
            },
        }
        i += 1;
    }

    found.map(|pos| (&text[..pos], &text[pos + 1..]))
}
