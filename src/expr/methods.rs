//! Member lookup and method dispatch on values.
//!
//! Dot access on a primitive auto-boxes: known method names resolve
//! to a `Bound` value which the call node later dispatches through
//! `call_method`. Unknown properties yield undefined, matching host
//! behavior; calling a non-method is the TypeError.

use crate::error::{BaseError, Result};
use crate::file;
use crate::value::{format_date, number_to_string, BoundMethod, ObjectMap, Value};
use chrono::{Datelike, Timelike};
use std::rc::Rc;

const STR_METHODS: &[&str] = &[
    "toUpperCase", "toLowerCase", "trim", "includes", "contains", "startsWith", "endsWith",
    "split", "replace", "replaceAll", "slice", "substring", "indexOf", "lastIndexOf",
    "charAt", "repeat", "padStart", "padEnd", "isEmpty", "toString",
];

const LIST_METHODS: &[&str] = &[
    "includes", "contains", "join", "indexOf", "slice", "reverse", "flat", "isEmpty",
    "first", "last", "toString",
];

const NUM_METHODS: &[&str] = &["toFixed", "toString"];

const DATE_METHODS: &[&str] = &[
    "getTime", "getFullYear", "getMonth", "getDate", "getDay", "getHours", "getMinutes",
    "getSeconds", "getMilliseconds", "toISOString", "toString",
];

const OBJECT_METHODS: &[&str] = &["keys", "values", "entries", "has", "isEmpty", "toString"];

const REGEX_METHODS: &[&str] = &["matches", "test", "toString"];

fn bound(receiver: &Value, method: &str) -> Value {
    Value::Bound(Rc::new(BoundMethod {
        receiver: receiver.clone(),
        method: method.to_string(),
    }))
}

/// Property lookup (`object.name` and the dot half of `object[k]`).
pub fn get_member(value: &Value, name: &str) -> Result<Value> {
    match value {
        Value::Null | Value::Undefined => Err(BaseError::type_error(format!(
            "Cannot read properties of {} (reading '{}')",
            value.kind(),
            name
        ))),
        Value::File(record) => {
            if let Some(field) = file::field_value(record, name) {
                Ok(field)
            } else if file::FILE_METHODS.contains(&name) {
                Ok(bound(value, name))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Object(map) => {
            if let Some(found) = map.get(name) {
                Ok(found.clone())
            } else if OBJECT_METHODS.contains(&name)
                || (name == "asLink" && map.contains_key("path"))
            {
                Ok(bound(value, name))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Str(s) => {
            if name == "length" {
                Ok(Value::Int(s.chars().count() as i64))
            } else if STR_METHODS.contains(&name) {
                Ok(bound(value, name))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::List(items) => {
            if name == "length" {
                Ok(Value::Int(items.len() as i64))
            } else if LIST_METHODS.contains(&name) {
                Ok(bound(value, name))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Int(_) | Value::Float(_) => {
            if NUM_METHODS.contains(&name) {
                Ok(bound(value, name))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Date(_) => {
            if DATE_METHODS.contains(&name) {
                Ok(bound(value, name))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Duration(_) => {
            if name == "toString" {
                Ok(bound(value, name))
            } else {
                Ok(Value::Undefined)
            }
        }
        Value::Regex(r) => match name {
            "source" => Ok(Value::string(r.source.clone())),
            "flags" => Ok(Value::string(r.flags.clone())),
            _ if REGEX_METHODS.contains(&name) => Ok(bound(value, name)),
            _ => Ok(Value::Undefined),
        },
        Value::Bool(_) | Value::Function(_) | Value::Bound(_) => Ok(Value::Undefined),
    }
}

/// Invoke a method on a receiver.
pub fn call_method(receiver: &Value, name: &str, args: &[Value]) -> Result<Value> {
    let result = match receiver {
        Value::Str(s) => string_method(s, name, args),
        Value::List(items) => list_method(items, name, args),
        Value::Int(_) | Value::Float(_) => number_method(receiver.to_number(), name, args),
        Value::Date(_) => date_method(receiver, name),
        Value::Duration(ms) => match name {
            "toString" => Some(Value::string(crate::duration::format_duration(*ms))),
            _ => None,
        },
        Value::Regex(r) => match name {
            "matches" | "test" => {
                let haystack = args.first().map(Value::to_display_string).unwrap_or_default();
                Some(Value::Bool(r.regex.is_match(&haystack)))
            }
            "toString" => Some(Value::string(format!("/{}/{}", r.source, r.flags))),
            _ => None,
        },
        Value::Object(map) => object_method(map, name, args),
        Value::File(record) => file::call_method(record, name, args),
        _ => None,
    };

    result.ok_or_else(|| {
        BaseError::type_error(format!("{}.{} is not a function", receiver.kind(), name))
    })
}

fn arg_str(args: &[Value], index: usize) -> Option<String> {
    match args.get(index) {
        None | Some(Value::Undefined) => None,
        Some(v) => Some(v.to_display_string()),
    }
}

fn arg_num(args: &[Value], index: usize) -> Option<f64> {
    match args.get(index) {
        None | Some(Value::Undefined) => None,
        Some(v) => Some(v.to_number()),
    }
}

/// Resolve a JS-style slice bound against a length: negatives count
/// from the end, out-of-range clamps.
fn slice_bound(raw: Option<f64>, default: usize, len: usize) -> usize {
    match raw {
        None => default,
        Some(n) if n.is_nan() => 0,
        Some(n) if n < 0.0 => len.saturating_sub((-n) as usize),
        Some(n) => (n as usize).min(len),
    }
}

fn string_method(s: &str, name: &str, args: &[Value]) -> Option<Value> {
    let chars: Vec<char> = s.chars().collect();
    let value = match name {
        "toUpperCase" => Value::string(s.to_uppercase()),
        "toLowerCase" => Value::string(s.to_lowercase()),
        "trim" => Value::string(s.trim().to_string()),
        "includes" | "contains" => {
            Value::Bool(arg_str(args, 0).map(|n| s.contains(&n)).unwrap_or(false))
        }
        "startsWith" => {
            Value::Bool(arg_str(args, 0).map(|n| s.starts_with(&n)).unwrap_or(false))
        }
        "endsWith" => Value::Bool(arg_str(args, 0).map(|n| s.ends_with(&n)).unwrap_or(false)),
        "split" => match args.first() {
            Some(Value::Regex(r)) => Value::list(
                r.regex.split(s).map(|p| Value::string(p.to_string())).collect(),
            ),
            _ => match arg_str(args, 0) {
                None => Value::list(vec![Value::string(s.to_string())]),
                Some(sep) if sep.is_empty() => {
                    Value::list(chars.iter().map(|c| Value::string(c.to_string())).collect())
                }
                Some(sep) => Value::list(
                    s.split(sep.as_str())
                        .map(|p| Value::string(p.to_string()))
                        .collect(),
                ),
            },
        },
        "replace" => match args.first() {
            Some(Value::Regex(r)) => {
                let with = arg_str(args, 1).unwrap_or_default();
                Value::string(r.regex.replace(s, with.as_str()).into_owned())
            }
            _ => {
                let from = arg_str(args, 0)?;
                let with = arg_str(args, 1).unwrap_or_default();
                Value::string(s.replacen(&from, &with, 1))
            }
        },
        "replaceAll" => match args.first() {
            Some(Value::Regex(r)) => {
                let with = arg_str(args, 1).unwrap_or_default();
                Value::string(r.regex.replace_all(s, with.as_str()).into_owned())
            }
            _ => {
                let from = arg_str(args, 0)?;
                let with = arg_str(args, 1).unwrap_or_default();
                Value::string(s.replace(&from, &with))
            }
        },
        "slice" => {
            let len = chars.len();
            let start = slice_bound(arg_num(args, 0), 0, len);
            let end = slice_bound(arg_num(args, 1), len, len);
            if start >= end {
                Value::string(String::new())
            } else {
                Value::string(chars[start..end].iter().collect::<String>())
            }
        }
        "substring" => {
            let len = chars.len();
            let a = arg_num(args, 0).unwrap_or(0.0).max(0.0) as usize;
            let b = arg_num(args, 1).map(|n| n.max(0.0) as usize).unwrap_or(len);
            let (start, end) = (a.min(b).min(len), a.max(b).min(len));
            Value::string(chars[start..end].iter().collect::<String>())
        }
        "indexOf" => {
            let needle = arg_str(args, 0)?;
            match s.find(&needle) {
                Some(byte_pos) => Value::Int(s[..byte_pos].chars().count() as i64),
                None => Value::Int(-1),
            }
        }
        "lastIndexOf" => {
            let needle = arg_str(args, 0)?;
            match s.rfind(&needle) {
                Some(byte_pos) => Value::Int(s[..byte_pos].chars().count() as i64),
                None => Value::Int(-1),
            }
        }
        "charAt" => {
            let index = arg_num(args, 0).unwrap_or(0.0);
            if index < 0.0 {
                Value::string(String::new())
            } else {
                Value::string(
                    chars
                        .get(index as usize)
                        .map(|c| c.to_string())
                        .unwrap_or_default(),
                )
            }
        }
        "repeat" => {
            let count = arg_num(args, 0).unwrap_or(0.0);
            if count < 0.0 || !count.is_finite() {
                return None;
            }
            Value::string(s.repeat(count as usize))
        }
        "padStart" => pad(s, &chars, args, true),
        "padEnd" => pad(s, &chars, args, false),
        "isEmpty" => Value::Bool(s.is_empty()),
        "toString" => Value::string(s.to_string()),
        _ => return None,
    };
    Some(value)
}

fn pad(s: &str, chars: &[char], args: &[Value], at_start: bool) -> Value {
    let target = arg_num(args, 0).unwrap_or(0.0).max(0.0) as usize;
    let filler = arg_str(args, 1).unwrap_or_else(|| " ".to_string());
    if chars.len() >= target || filler.is_empty() {
        return Value::string(s.to_string());
    }
    let mut padding = String::new();
    while padding.chars().count() < target - chars.len() {
        padding.push_str(&filler);
    }
    let padding: String = padding.chars().take(target - chars.len()).collect();
    if at_start {
        Value::string(format!("{}{}", padding, s))
    } else {
        Value::string(format!("{}{}", s, padding))
    }
}

fn list_method(items: &Rc<Vec<Value>>, name: &str, args: &[Value]) -> Option<Value> {
    let value = match name {
        "includes" | "contains" => Value::Bool(
            args.first()
                .map(|needle| items.iter().any(|v| v.loose_eq(needle)))
                .unwrap_or(false),
        ),
        "join" => {
            let sep = arg_str(args, 0).unwrap_or_else(|| ",".to_string());
            Value::string(
                items
                    .iter()
                    .map(|v| {
                        if v.is_nullish() {
                            String::new()
                        } else {
                            v.to_display_string()
                        }
                    })
                    .collect::<Vec<_>>()
                    .join(&sep),
            )
        }
        "indexOf" => {
            let needle = args.first()?;
            Value::Int(
                items
                    .iter()
                    .position(|v| v.strict_eq(needle))
                    .map(|i| i as i64)
                    .unwrap_or(-1),
            )
        }
        "slice" => {
            let len = items.len();
            let start = slice_bound(arg_num(args, 0), 0, len);
            let end = slice_bound(arg_num(args, 1), len, len);
            if start >= end {
                Value::list(Vec::new())
            } else {
                Value::list(items[start..end].to_vec())
            }
        }
        "reverse" => {
            let mut reversed = items.as_ref().clone();
            reversed.reverse();
            Value::list(reversed)
        }
        "flat" => {
            let depth = arg_num(args, 0).unwrap_or(1.0).max(0.0) as usize;
            Value::list(flatten(items, depth))
        }
        "isEmpty" => Value::Bool(items.is_empty()),
        "first" => items.first().cloned().unwrap_or(Value::Undefined),
        "last" => items.last().cloned().unwrap_or(Value::Undefined),
        "toString" => Value::string(
            items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
        ),
        _ => return None,
    };
    Some(value)
}

fn flatten(items: &[Value], depth: usize) -> Vec<Value> {
    let mut out = Vec::new();
    for item in items {
        match item {
            Value::List(inner) if depth > 0 => out.extend(flatten(inner, depth - 1)),
            other => out.push(other.clone()),
        }
    }
    out
}

fn number_method(n: f64, name: &str, args: &[Value]) -> Option<Value> {
    let value = match name {
        "toFixed" => {
            let digits = arg_num(args, 0).unwrap_or(0.0).clamp(0.0, 100.0) as usize;
            Value::string(format!("{:.*}", digits, n))
        }
        "toString" => Value::string(number_to_string(n)),
        _ => return None,
    };
    Some(value)
}

fn date_method(receiver: &Value, name: &str) -> Option<Value> {
    let Value::Date(d) = receiver else { return None };
    let value = match name {
        "getTime" => Value::Int(d.timestamp_millis()),
        "getFullYear" => Value::Int(d.year() as i64),
        // Host months are zero-based.
        "getMonth" => Value::Int(d.month0() as i64),
        "getDate" => Value::Int(d.day() as i64),
        "getDay" => Value::Int(d.weekday().num_days_from_sunday() as i64),
        "getHours" => Value::Int(d.hour() as i64),
        "getMinutes" => Value::Int(d.minute() as i64),
        "getSeconds" => Value::Int(d.second() as i64),
        "getMilliseconds" => Value::Int((d.timestamp_subsec_millis()) as i64),
        "toISOString" | "toString" => Value::string(format_date(d)),
        _ => return None,
    };
    Some(value)
}

fn object_method(map: &Rc<ObjectMap>, name: &str, args: &[Value]) -> Option<Value> {
    let value = match name {
        "keys" => Value::list(map.keys().map(Value::string).collect()),
        "values" => Value::list(map.iter().map(|(_, v)| v.clone()).collect()),
        "entries" => Value::list(
            map.iter()
                .map(|(k, v)| Value::list(vec![Value::string(k), v.clone()]))
                .collect(),
        ),
        "has" => {
            let key = args.first().map(Value::to_display_string).unwrap_or_default();
            Value::Bool(map.contains_key(&key))
        }
        "isEmpty" => Value::Bool(map.is_empty()),
        "toString" => Value::string("[object Object]".to_string()),
        "asLink" => {
            // Path-shaped objects (wiki links, file() results) can be
            // re-wrapped as links with a new display.
            let path = match map.get("path") {
                Some(Value::Str(p)) => p.clone(),
                _ => return None,
            };
            let mut link = ObjectMap::new();
            link.insert("path".to_string(), Value::string(path));
            if let Some(display) = args.first() {
                if !display.is_nullish() {
                    link.insert(
                        "display".to_string(),
                        Value::string(display.to_display_string()),
                    );
                }
            }
            link.insert("isEmbed".to_string(), Value::Bool(false));
            Value::object(link)
        }
        _ => return None,
    };
    Some(value)
}
