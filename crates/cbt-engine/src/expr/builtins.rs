//! Built-in functions, methods and properties available to directives

use std::{collections::HashMap, fmt, sync::Arc};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;

use super::{format_number, Value};
use crate::helpers;

/// A host function callable from directive expressions
pub type NativeFunction = Arc<dyn Fn(&[Value]) -> Result<Value, String> + Send + Sync>;

/// User-registered functions, looked up before the built-ins
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    functions: HashMap<String, NativeFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` under `name`, replacing any previous one
    pub fn register<F>(&mut self, name: impl Into<String>, function: F)
    where
        F: Fn(&[Value]) -> Result<Value, String> + Send + Sync + 'static,
    {
        self.functions.insert(name.into(), Arc::new(function));
    }

    pub fn get(&self, name: &str) -> Option<&NativeFunction> {
        self.functions.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.functions.contains_key(name)
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&String> = self.functions.keys().collect();
        names.sort();
        f.debug_struct("FunctionRegistry")
            .field("functions", &names)
            .finish()
    }
}

fn arg(args: &[Value], index: usize) -> &Value {
    static UNDEFINED: Value = Value::Undefined;
    args.get(index).unwrap_or(&UNDEFINED)
}

fn string_arg(args: &[Value], index: usize) -> String {
    arg(args, index).to_string()
}

/// Global functions such as `String(x)` or `parseInt(x)`
pub(crate) fn call_global(name: &str, args: &[Value]) -> Option<Result<Value, String>> {
    let value = match name {
        "String" => Value::String(args.first().map(Value::to_string).unwrap_or_default()),
        "Number" => Value::Number(args.first().map_or(0.0, Value::to_number)),
        "Boolean" => Value::Bool(arg(args, 0).truthy()),
        "parseInt" => {
            let radix = match arg(args, 1) {
                Value::Undefined => None,
                other => Some(other.to_number()),
            };
            Value::Number(parse_int(&string_arg(args, 0), radix))
        }
        "parseFloat" => Value::Number(parse_float(&string_arg(args, 0))),
        "isNaN" => Value::Bool(arg(args, 0).to_number().is_nan()),
        "isFinite" => Value::Bool(arg(args, 0).to_number().is_finite()),
        "encodeURIComponent" => {
            Value::String(helpers::encode_uri_component(&string_arg(args, 0)))
        }
        _ => return None,
    };
    Some(Ok(value))
}

/// Namespaced functions such as `Math.round(x)`
pub(crate) fn call_namespace(
    namespace: &str,
    name: &str,
    args: &[Value],
) -> Option<Result<Value, String>> {
    let number = |i: usize| arg(args, i).to_number();
    let value = match (namespace, name) {
        ("Math", "round") => Value::Number((number(0) + 0.5).floor()),
        ("Math", "floor") => Value::Number(number(0).floor()),
        ("Math", "ceil") => Value::Number(number(0).ceil()),
        ("Math", "abs") => Value::Number(number(0).abs()),
        ("Math", "pow") => Value::Number(number(0).powf(number(1))),
        ("Math", "max") => Value::Number(
            args.iter()
                .map(Value::to_number)
                .fold(f64::NEG_INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.max(n) }),
        ),
        ("Math", "min") => Value::Number(
            args.iter()
                .map(Value::to_number)
                .fold(f64::INFINITY, |acc, n| if n.is_nan() || acc.is_nan() { f64::NAN } else { acc.min(n) }),
        ),
        ("Array", "isArray") => Value::Bool(matches!(arg(args, 0), Value::Array(_))),
        ("Object", "keys") => Value::Array(match arg(args, 0) {
            Value::Object(map) => map.keys().map(|k| Value::String(k.clone())).collect(),
            Value::Array(items) => (0..items.len())
                .map(|i| Value::String(i.to_string()))
                .collect(),
            _ => Vec::new(),
        }),
        ("JSON", "stringify") => match arg(args, 0) {
            Value::Undefined => Value::Undefined,
            other => match serde_json::to_string(&other.to_json()) {
                Ok(json) => Value::String(json),
                Err(e) => return Some(Err(e.to_string())),
            },
        },
        _ => return None,
    };
    Some(Ok(value))
}

/// Property access such as `items.length` or `user.name`
pub(crate) fn property(receiver: &Value, key: &str) -> Value {
    match receiver {
        Value::String(s) => match key {
            "length" => Value::Number(s.chars().count() as f64),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| s.chars().nth(i))
                .map_or(Value::Undefined, |c| Value::String(c.to_string())),
        },
        Value::Array(items) => match key {
            "length" => Value::Number(items.len() as f64),
            _ => key
                .parse::<usize>()
                .ok()
                .and_then(|i| items.get(i))
                .cloned()
                .unwrap_or_default(),
        },
        Value::Object(map) => map.get(key).cloned().unwrap_or_default(),
        _ => Value::Undefined,
    }
}

/// Method calls such as `name.toUpperCase()` or `items.join(", ")`
pub(crate) fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value, String> {
    let result = match receiver {
        Value::String(s) => string_method(s, name, args),
        Value::Array(items) => array_method(items, name, args),
        Value::Number(n) => number_method(*n, name, args),
        Value::Object(map) => object_method(map, name, args),
        _ => None,
    };

    result.ok_or_else(|| {
        format!(
            "{}.{} is not a function",
            match receiver {
                Value::Undefined | Value::Null => receiver.to_string(),
                other => other.type_name().to_string(),
            },
            name
        )
    })
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Option<Value> {
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let slice = |start: usize, end: usize| -> Value {
        Value::String(chars[start..end.max(start)].iter().collect())
    };

    let value = match name {
        "toUpperCase" => Value::String(s.to_uppercase()),
        "toLowerCase" => Value::String(s.to_lowercase()),
        "trim" => Value::String(s.trim().to_string()),
        "toString" => Value::String(s.to_string()),
        "charAt" => {
            let i = relative_index(arg(args, 0), len, 0);
            chars
                .get(i)
                .map_or(Value::String(String::new()), |c| Value::String(c.to_string()))
        }
        "indexOf" => Value::Number(char_index_of(s, &string_arg(args, 0))),
        "includes" => Value::Bool(s.contains(&string_arg(args, 0))),
        "startsWith" => Value::Bool(s.starts_with(&string_arg(args, 0))),
        "endsWith" => Value::Bool(s.ends_with(&string_arg(args, 0))),
        "slice" => {
            let start = relative_index(arg(args, 0), len, 0);
            let end = relative_index(arg(args, 1), len, len);
            slice(start, end)
        }
        "substring" => {
            let a = clamp_index(arg(args, 0), len, 0);
            let b = clamp_index(arg(args, 1), len, len);
            slice(a.min(b), a.max(b))
        }
        "substr" => {
            let start = relative_index(arg(args, 0), len, 0);
            let count = match arg(args, 1) {
                Value::Undefined => len,
                other => other.to_number().max(0.0) as usize,
            };
            slice(start, start.saturating_add(count).min(len))
        }
        "replace" => Value::String(s.replacen(&string_arg(args, 0), &string_arg(args, 1), 1)),
        "split" => {
            let parts: Vec<Value> = match arg(args, 0) {
                Value::Undefined => vec![Value::String(s.to_string())],
                sep => {
                    let sep = sep.to_string();
                    if sep.is_empty() {
                        chars.iter().map(|c| Value::String(c.to_string())).collect()
                    } else {
                        s.split(sep.as_str())
                            .map(|part| Value::String(part.to_string()))
                            .collect()
                    }
                }
            };
            Value::Array(parts)
        }
        _ => return None,
    };
    Some(value)
}

fn array_method(items: &[Value], name: &str, args: &[Value]) -> Option<Value> {
    let len = items.len();
    let value = match name {
        "join" => {
            let sep = match arg(args, 0) {
                Value::Undefined => ",".to_string(),
                other => other.to_string(),
            };
            Value::String(
                items
                    .iter()
                    .map(|item| if item.is_nullish() { String::new() } else { item.to_string() })
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "indexOf" => Value::Number(
            items
                .iter()
                .position(|item| item.strict_eq(arg(args, 0)))
                .map_or(-1.0, |i| i as f64),
        ),
        "includes" => Value::Bool(items.iter().any(|item| item.strict_eq(arg(args, 0)))),
        "slice" => {
            let start = relative_index(arg(args, 0), len, 0);
            let end = relative_index(arg(args, 1), len, len);
            Value::Array(items[start..end.max(start)].to_vec())
        }
        "concat" => {
            let mut out = items.to_vec();
            for extra in args {
                match extra {
                    Value::Array(more) => out.extend(more.iter().cloned()),
                    other => out.push(other.clone()),
                }
            }
            Value::Array(out)
        }
        "toString" => Value::String(Value::Array(items.to_vec()).to_string()),
        _ => return None,
    };
    Some(value)
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Value> {
    let value = match name {
        "toFixed" => {
            let digits = arg(args, 0).to_number();
            let digits = if digits.is_nan() { 0 } else { digits.clamp(0.0, 100.0) as usize };
            Value::String(helpers::to_fixed(n, digits))
        }
        "toString" => Value::String(format_number(n)),
        _ => return None,
    };
    Some(value)
}

fn object_method(map: &IndexMap<String, Value>, name: &str, args: &[Value]) -> Option<Value> {
    match name {
        "hasOwnProperty" => Some(Value::Bool(map.contains_key(&string_arg(args, 0)))),
        "toString" => Some(Value::String("[object Object]".to_string())),
        _ => None,
    }
}

/// Index that counts from the end when negative, clamped to `0..=len`
fn relative_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() {
        0
    } else if n < 0.0 {
        (len as f64 + n.trunc()).max(0.0) as usize
    } else {
        n.trunc().min(len as f64) as usize
    }
}

/// Index clamped to `0..=len`, negatives become zero
fn clamp_index(value: &Value, len: usize, default: usize) -> usize {
    if matches!(value, Value::Undefined) {
        return default;
    }
    let n = value.to_number();
    if n.is_nan() || n < 0.0 {
        0
    } else {
        n.trunc().min(len as f64) as usize
    }
}

fn char_index_of(haystack: &str, needle: &str) -> f64 {
    haystack
        .find(needle)
        .map_or(-1.0, |byte| haystack[..byte].chars().count() as f64)
}

fn parse_int(source: &str, radix: Option<f64>) -> f64 {
    let mut s = source.trim_start();
    let negative = s.starts_with('-');
    if negative || s.starts_with('+') {
        s = &s[1..];
    }

    let hex_prefix = s.starts_with("0x") || s.starts_with("0X");
    let radix = match radix {
        Some(r) if !r.is_nan() && r.trunc() != 0.0 => r.trunc() as u32,
        _ if hex_prefix => 16,
        _ => 10,
    };
    if radix == 16 && hex_prefix {
        s = &s[2..];
    }
    if !(2..=36).contains(&radix) {
        return f64::NAN;
    }

    let digits: String = s.chars().take_while(|c| c.is_digit(radix)).collect();
    if digits.is_empty() {
        return f64::NAN;
    }
    let magnitude = digits
        .chars()
        .filter_map(|c| c.to_digit(radix))
        .fold(0f64, |acc, d| acc * f64::from(radix) + f64::from(d));
    if negative {
        -magnitude
    } else {
        magnitude
    }
}

static FLOAT_PREFIX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[+-]?(?:Infinity|\d+\.?\d*(?:[eE][+-]?\d+)?|\.\d+(?:[eE][+-]?\d+)?)")
        .unwrap_or_else(|_| unreachable!("static float pattern"))
});

fn parse_float(source: &str) -> f64 {
    match FLOAT_PREFIX.find(source.trim_start()) {
        Some(m) => match m.as_str().trim_start_matches('+') {
            "Infinity" => f64::INFINITY,
            "-Infinity" => f64::NEG_INFINITY,
            number => number.parse().unwrap_or(f64::NAN),
        },
        None => f64::NAN,
    }
}
