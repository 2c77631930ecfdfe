//! Global functions available in every evaluation scope.
//!
//! `if` and `file` are also reachable through the `_if` / `_fileFn`
//! aliases the source rewriter targets; both spellings resolve to the
//! same function value.

use crate::duration::parse_duration;
use crate::error::{BaseError, Result};
use crate::value::{number_value, NativeFn, ObjectMap, Value};
use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use std::collections::HashMap;

/// Names of all global functions, used by the scope builder to keep
/// promoted frontmatter keys from shadowing them.
pub const GLOBAL_NAMES: &[&str] = &[
    "today", "now", "date", "duration", "if", "file", "image", "icon", "link", "list",
    "max", "min", "number",
];

/// Install every global (and its aliases) into a scope's variable
/// table.
pub fn install(vars: &mut HashMap<String, Value>) {
    let entries: &[(&'static str, fn(&[Value]) -> Result<Value>)] = &[
        ("today", fn_today),
        ("now", fn_now),
        ("date", fn_date),
        ("duration", fn_duration),
        ("_if", fn_if),
        ("_fileFn", fn_file),
        ("image", fn_image),
        ("icon", fn_icon),
        ("link", fn_link),
        ("list", fn_list),
        ("max", fn_max),
        ("min", fn_min),
        ("number", fn_number),
    ];
    for &(name, call) in entries {
        vars.entry(name.to_string())
            .or_insert(Value::Function(NativeFn { name, call }));
    }
}

/// Current date at local midnight, expressed as a UTC instant. Local
/// rather than UTC midnight: "today" follows the user's wall clock.
fn fn_today(_args: &[Value]) -> Result<Value> {
    let midnight = Local::now().date_naive().and_time(chrono::NaiveTime::MIN);
    let instant = Local
        .from_local_datetime(&midnight)
        .earliest()
        .map(|d| d.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);
    Ok(Value::Date(instant))
}

fn fn_now(_args: &[Value]) -> Result<Value> {
    Ok(Value::Date(Utc::now()))
}

/// Parse a date string: RFC 3339, or the common date / date-time
/// shapes without a zone (interpreted as UTC).
pub fn parse_date_string(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }
    if let Ok(parsed) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(parsed.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M",
        "%Y-%m-%dT%H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(trimmed, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
        return Some(Utc.from_utc_datetime(&date.and_hms_opt(0, 0, 0)?));
    }
    None
}

fn fn_date(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Date(d)) => Ok(Value::Date(*d)),
        Some(Value::Str(s)) if !s.trim().is_empty() => parse_date_string(s)
            .map(Value::Date)
            .ok_or_else(|| BaseError::Eval(format!("Invalid date: \"{}\"", s))),
        other => Err(BaseError::Eval(format!(
            "date() expects a date or a non-empty string, got {}",
            other.map(Value::kind).unwrap_or("nothing")
        ))),
    }
}

fn fn_duration(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Duration(ms)) => Ok(Value::Duration(*ms)),
        Some(Value::Str(s)) => Ok(Value::Duration(parse_duration(s)?)),
        other => Err(BaseError::Eval(format!(
            "duration() expects a string, got {}",
            other.map(Value::kind).unwrap_or("nothing")
        ))),
    }
}

fn fn_if(args: &[Value]) -> Result<Value> {
    let test = args.first().map(Value::truthy).unwrap_or(false);
    if test {
        Ok(args.get(1).cloned().unwrap_or(Value::Null))
    } else {
        Ok(args.get(2).cloned().unwrap_or(Value::Null))
    }
}

/// Normalize a path-ish argument: a string, or an object carrying
/// `path`/`target`/`url`/`href`.
fn normalize_path(value: &Value) -> Option<String> {
    let raw = match value {
        Value::Str(s) => s.clone(),
        Value::File(f) => f.relative_path.clone(),
        Value::Object(map) => {
            match ["path", "target", "url", "href"].iter().find_map(|k| map.get(k)) {
                Some(Value::Str(s)) => s.clone(),
                Some(other) => other.to_display_string(),
                None => return None,
            }
        }
        _ => return None,
    };
    let trimmed = raw.trim().to_string();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn fn_file(args: &[Value]) -> Result<Value> {
    let path = args
        .first()
        .and_then(normalize_path)
        .ok_or_else(|| BaseError::Eval("file() expects a non-empty path".to_string()))?;
    let mut object = ObjectMap::new();
    object.insert("path".to_string(), Value::string(path));
    object.insert("isEmbed".to_string(), Value::Bool(false));
    Ok(Value::object(object))
}

fn fn_image(args: &[Value]) -> Result<Value> {
    let path = args.first().and_then(normalize_path).unwrap_or_default();
    Ok(Value::string(format!("![]({})", path)))
}

fn fn_icon(args: &[Value]) -> Result<Value> {
    let name = match args.first() {
        Some(Value::Str(s)) if !s.trim().is_empty() => s.trim().to_string(),
        _ => "unknown".to_string(),
    };
    Ok(Value::string(format!("icon({})", name)))
}

fn fn_link(args: &[Value]) -> Result<Value> {
    let path = args
        .first()
        .and_then(normalize_path)
        .ok_or_else(|| BaseError::Eval("link() expects a non-empty path".to_string()))?;
    let mut object = ObjectMap::new();
    object.insert("path".to_string(), Value::string(path));
    object.insert("isEmbed".to_string(), Value::Bool(false));
    if let Some(display) = args.get(1) {
        if !display.is_nullish() {
            object.insert("display".to_string(), Value::string(display.to_display_string()));
        }
    }
    Ok(Value::object(object))
}

fn fn_list(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::List(_)) => Ok(args[0].clone()),
        Some(other) => Ok(Value::list(vec![other.clone()])),
        None => Ok(Value::list(Vec::new())),
    }
}

fn numeric_args(name: &str, args: &[Value]) -> Result<Vec<f64>> {
    if args.is_empty() {
        return Err(BaseError::Eval(format!(
            "{}() requires at least one argument",
            name
        )));
    }
    let mut numbers = Vec::with_capacity(args.len());
    for arg in args {
        let n = arg.to_number();
        if n.is_nan() {
            return Err(BaseError::Eval(format!(
                "{}() arguments must be numbers, got {}",
                name,
                arg.kind()
            )));
        }
        numbers.push(n);
    }
    Ok(numbers)
}

fn fn_max(args: &[Value]) -> Result<Value> {
    let numbers = numeric_args("max", args)?;
    Ok(number_value(numbers.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}

fn fn_min(args: &[Value]) -> Result<Value> {
    let numbers = numeric_args("min", args)?;
    Ok(number_value(numbers.into_iter().fold(f64::INFINITY, f64::min)))
}

fn fn_number(args: &[Value]) -> Result<Value> {
    match args.first() {
        Some(Value::Int(i)) => Ok(Value::Int(*i)),
        Some(Value::Float(f)) if f.is_finite() => Ok(Value::Float(*f)),
        Some(Value::Date(d)) => Ok(Value::Int(d.timestamp_millis())),
        Some(Value::Bool(b)) => Ok(Value::Int(if *b { 1 } else { 0 })),
        Some(Value::Str(s)) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Err(BaseError::Eval(
                    "number() cannot convert an empty string".to_string(),
                ));
            }
            let parsed = crate::expr::namespaces::parse_float_prefix(trimmed);
            if parsed.is_finite() {
                Ok(number_value(parsed))
            } else {
                Err(BaseError::Eval(format!(
                    "number() cannot convert \"{}\"",
                    trimmed
                )))
            }
        }
        other => Err(BaseError::Eval(format!(
            "number() cannot convert {}",
            other.map(Value::kind).unwrap_or("nothing")
        ))),
    }
}
