//! Read-only builtin namespaces reachable as identifiers in every
//! scope (`Math.max(...)`, `JSON.stringify(...)`, ...).
//!
//! Each namespace is an ordinary object holding native functions and
//! constants; the scope builder installs shared handles, so the
//! dictionaries are constructed once per thread.

use crate::error::{BaseError, Result};
use crate::value::{
    json_to_value, number_value, value_to_json, NativeFn, ObjectMap, Value,
};
use std::collections::HashMap;

/// Install every namespace into a scope's variable table.
pub fn install(vars: &mut HashMap<String, Value>) {
    NAMESPACES.with(|namespaces| {
        for (name, value) in namespaces {
            vars.entry(name.to_string()).or_insert_with(|| value.clone());
        }
    });
}

thread_local! {
    static NAMESPACES: Vec<(&'static str, Value)> = build();
}

fn func(name: &'static str, call: fn(&[Value]) -> Result<Value>) -> (String, Value) {
    (name.to_string(), Value::Function(NativeFn { name, call }))
}

fn namespace(pairs: Vec<(String, Value)>) -> Value {
    Value::object(ObjectMap::from_pairs(pairs))
}

fn build() -> Vec<(&'static str, Value)> {
    let math = namespace(vec![
        func("abs", |args| Ok(number_value(first_num(args).abs()))),
        func("floor", |args| Ok(number_value(first_num(args).floor()))),
        func("ceil", |args| Ok(number_value(first_num(args).ceil()))),
        func("round", |args| Ok(number_value(js_round(first_num(args))))),
        func("trunc", |args| Ok(number_value(first_num(args).trunc()))),
        func("sqrt", |args| Ok(number_value(first_num(args).sqrt()))),
        func("sign", |args| {
            let n = first_num(args);
            Ok(if n.is_nan() {
                Value::Float(f64::NAN)
            } else {
                number_value(if n > 0.0 {
                    1.0
                } else if n < 0.0 {
                    -1.0
                } else {
                    0.0
                })
            })
        }),
        func("pow", |args| {
            Ok(number_value(first_num(args).powf(second_num(args))))
        }),
        func("max", |args| Ok(fold_extremum(args, f64::NEG_INFINITY, f64::max))),
        func("min", |args| Ok(fold_extremum(args, f64::INFINITY, f64::min))),
        ("PI".to_string(), Value::Float(std::f64::consts::PI)),
        ("E".to_string(), Value::Float(std::f64::consts::E)),
    ]);

    let number = namespace(vec![
        func("isFinite", |args| {
            Ok(Value::Bool(matches!(
                args.first(),
                Some(Value::Int(_)) | Some(Value::Float(_))
            ) && first_num(args).is_finite()))
        }),
        func("isNaN", |args| {
            Ok(Value::Bool(
                matches!(args.first(), Some(Value::Float(f)) if f.is_nan()),
            ))
        }),
        func("isInteger", |args| {
            Ok(Value::Bool(match args.first() {
                Some(Value::Int(_)) => true,
                Some(Value::Float(f)) => f.is_finite() && *f == f.trunc(),
                _ => false,
            }))
        }),
        func("parseFloat", |args| {
            let text = args.first().map(Value::to_display_string).unwrap_or_default();
            Ok(number_value(parse_float_prefix(&text)))
        }),
        func("parseInt", |args| {
            let text = args.first().map(Value::to_display_string).unwrap_or_default();
            let radix = args.get(1).map(Value::to_number).unwrap_or(10.0);
            Ok(parse_int(&text, radix as u32))
        }),
        (
            "MAX_SAFE_INTEGER".to_string(),
            Value::Int(9_007_199_254_740_991),
        ),
        (
            "MIN_SAFE_INTEGER".to_string(),
            Value::Int(-9_007_199_254_740_991),
        ),
        ("EPSILON".to_string(), Value::Float(f64::EPSILON)),
    ]);

    let json = namespace(vec![
        func("stringify", |args| {
            let value = args.first().cloned().unwrap_or(Value::Undefined);
            if matches!(value, Value::Undefined) {
                return Ok(Value::Undefined);
            }
            let json = value_to_json(&value)?;
            let text = match args.get(2) {
                Some(indent) if !indent.is_nullish() => {
                    serde_json::to_string_pretty(&json)
                }
                _ => serde_json::to_string(&json),
            }
            .map_err(|e| BaseError::Format(e.to_string()))?;
            Ok(Value::string(text))
        }),
        func("parse", |args| {
            let text = args.first().map(Value::to_display_string).unwrap_or_default();
            let json: serde_json::Value = serde_json::from_str(&text)
                .map_err(|e| BaseError::Eval(format!("SyntaxError: invalid JSON: {}", e)))?;
            Ok(json_to_value(&json))
        }),
    ]);

    let object = namespace(vec![
        func("keys", |args| match args.first() {
            Some(Value::Object(map)) => {
                Ok(Value::list(map.keys().map(Value::string).collect()))
            }
            _ => Ok(Value::list(Vec::new())),
        }),
        func("values", |args| match args.first() {
            Some(Value::Object(map)) => {
                Ok(Value::list(map.iter().map(|(_, v)| v.clone()).collect()))
            }
            _ => Ok(Value::list(Vec::new())),
        }),
        func("entries", |args| match args.first() {
            Some(Value::Object(map)) => Ok(Value::list(
                map.iter()
                    .map(|(k, v)| Value::list(vec![Value::string(k), v.clone()]))
                    .collect(),
            )),
            _ => Ok(Value::list(Vec::new())),
        }),
    ]);

    let array = namespace(vec![func("isArray", |args| {
        Ok(Value::Bool(matches!(args.first(), Some(Value::List(_)))))
    })]);

    let date = namespace(vec![
        func("now", |_| {
            Ok(Value::Int(chrono::Utc::now().timestamp_millis()))
        }),
        func("parse", |args| {
            let text = args.first().map(Value::to_display_string).unwrap_or_default();
            Ok(match crate::globals::parse_date_string(&text) {
                Some(d) => Value::Int(d.timestamp_millis()),
                None => Value::Float(f64::NAN),
            })
        }),
    ]);

    let string = namespace(vec![func("fromCharCode", |args| {
        let mut s = String::new();
        for arg in args {
            let code = arg.to_number();
            if code.is_finite() && code >= 0.0 {
                if let Some(c) = char::from_u32(code as u32) {
                    s.push(c);
                }
            }
        }
        Ok(Value::string(s))
    })]);

    vec![
        ("Array", array),
        ("Boolean", namespace(vec![])),
        ("Date", date),
        ("JSON", json),
        ("Map", namespace(vec![])),
        ("Math", math),
        ("Number", number),
        ("Object", object),
        ("Reflect", namespace(vec![])),
        ("RegExp", namespace(vec![])),
        ("Set", namespace(vec![])),
        ("String", string),
        ("Symbol", namespace(vec![])),
        ("WeakMap", namespace(vec![])),
        ("WeakSet", namespace(vec![])),
        ("BigInt", namespace(vec![])),
    ]
}

fn first_num(args: &[Value]) -> f64 {
    args.first().map(Value::to_number).unwrap_or(f64::NAN)
}

fn second_num(args: &[Value]) -> f64 {
    args.get(1).map(Value::to_number).unwrap_or(f64::NAN)
}

fn fold_extremum(args: &[Value], identity: f64, pick: fn(f64, f64) -> f64) -> Value {
    let mut acc = identity;
    for arg in args {
        let n = arg.to_number();
        if n.is_nan() {
            return Value::Float(f64::NAN);
        }
        acc = pick(acc, n);
    }
    number_value(acc)
}

/// Host rounding: halves round toward +Infinity (`-0.5` → `0`).
fn js_round(n: f64) -> f64 {
    if n.is_finite() && n.fract() == -0.5 {
        n.ceil()
    } else {
        n.round()
    }
}

/// `parseFloat`: longest numeric prefix, NaN when there is none.
/// Also backs the `number()` global's string coercion.
pub(crate) fn parse_float_prefix(text: &str) -> f64 {
    let trimmed = text.trim_start();
    let bytes = trimmed.as_bytes();
    let mut end = 0;
    if end < bytes.len() && (bytes[end] == b'+' || bytes[end] == b'-') {
        end += 1;
    }
    let mut seen_digit = false;
    while end < bytes.len() && bytes[end].is_ascii_digit() {
        end += 1;
        seen_digit = true;
    }
    if end < bytes.len() && bytes[end] == b'.' {
        end += 1;
        while end < bytes.len() && bytes[end].is_ascii_digit() {
            end += 1;
            seen_digit = true;
        }
    }
    if seen_digit && end < bytes.len() && (bytes[end] == b'e' || bytes[end] == b'E') {
        let mut j = end + 1;
        if j < bytes.len() && (bytes[j] == b'+' || bytes[j] == b'-') {
            j += 1;
        }
        if j < bytes.len() && bytes[j].is_ascii_digit() {
            end = j;
            while end < bytes.len() && bytes[end].is_ascii_digit() {
                end += 1;
            }
        }
    }
    if !seen_digit {
        return f64::NAN;
    }
    trimmed[..end].parse().unwrap_or(f64::NAN)
}

fn parse_int(text: &str, radix: u32) -> Value {
    let radix = if radix == 0 { 10 } else { radix };
    if !(2..=36).contains(&radix) {
        return Value::Float(f64::NAN);
    }
    let trimmed = text.trim_start();
    let (negative, rest) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    let rest = if radix == 16 {
        rest.strip_prefix("0x").or_else(|| rest.strip_prefix("0X")).unwrap_or(rest)
    } else {
        rest
    };
    let digits: String = rest
        .chars()
        .take_while(|c| c.to_digit(radix).is_some())
        .collect();
    if digits.is_empty() {
        return Value::Float(f64::NAN);
    }
    let mut total: f64 = 0.0;
    for c in digits.chars() {
        total = total * radix as f64 + c.to_digit(radix).unwrap() as f64;
    }
    number_value(if negative { -total } else { total })
}
