//! Output helpers used by value-output directives

use once_cell::sync::Lazy;
use regex::Regex;

use crate::expr::Value;

/// Separator used by `:a=` when none (or an empty one) is given
pub const DEFAULT_ARRAY_SEPARATOR: &str = "<br>";

static URL_PROTOCOL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^https?://(.+)$").unwrap_or_else(|_| unreachable!("static protocol pattern"))
});

/// HTML-escape `& < > \ " '`
pub fn encode_html(source: &str) -> String {
    let mut out = String::with_capacity(source.len());
    for c in source.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\\' => out.push_str("&#92;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

/// Escape for use inside event-handler attributes such as `onclick`
///
/// Backslash sequences are decoded after escaping, so `\n` in the value
/// becomes a real newline and a backslash itself is never entity-encoded.
pub fn encode_event_html(source: &str) -> String {
    source
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
        .replace("\\\\", "\\")
        .replace("\\/", "/")
        .replace("\\n", "\n")
        .replace("\\r", "\r")
}

/// Rewrite an `http://` or `https://` URL to protocol-relative form
pub fn replace_url_protocol(source: &str) -> String {
    URL_PROTOCOL.replace(source, "//$1").into_owned()
}

/// Join the trimmed, non-blank items of an array with `separator`,
/// HTML-escaping each one. Anything but an array yields an empty string.
pub fn for_each_array(source: &Value, separator: &str) -> String {
    let Value::Array(items) = source else {
        return String::new();
    };
    let separator = if separator.is_empty() {
        DEFAULT_ARRAY_SEPARATOR
    } else {
        separator
    };

    items
        .iter()
        .map(|item| item.to_string().trim().to_string())
        .filter(|item| !item.is_empty())
        .map(|item| encode_html(&item))
        .collect::<Vec<_>>()
        .join(separator)
}

/// Round half up to cents and format with two decimals; non-numeric is empty
pub fn format_money(source: &Value) -> String {
    let n = source.to_number();
    if n.is_nan() {
        return String::new();
    }
    to_fixed((n * 100.0 + 0.5).floor() / 100.0, 2)
}

/// Fixed-point formatting where ties round away from zero, like `toFixed`
pub fn to_fixed(n: f64, digits: usize) -> String {
    if !n.is_finite() {
        return crate::expr::format_number(n);
    }
    let scale = 10f64.powi(digits as i32);
    let rounded = (n.abs() * scale).round() / scale;
    let formatted = format!("{:.*}", digits, rounded);
    if n < 0.0 {
        format!("-{}", formatted)
    } else {
        formatted
    }
}

/// Keep the first `length` characters, adding `...` when anything was cut
pub fn truncate(source: &str, length: usize) -> String {
    match source.char_indices().nth(length) {
        Some((end, _)) => format!("{}...", &source[..end]),
        None => source.to_string(),
    }
}

/// Percent-encode a URL component
pub fn encode_uri_component(source: &str) -> String {
    urlencoding::encode(source).into_owned()
}
