//! Dynamic value domain for the expression evaluator.
//!
//! Every value an expression can produce or consume is a `Value`.
//! Equality and coercion follow JS loose/strict semantics for
//! primitives; reference types compare by identity under strict
//! equality.

use crate::duration::format_duration;
use crate::error::{BaseError, Result};
use crate::file::FileRecord;
use chrono::{DateTime, SecondsFormat, Utc};
use std::rc::Rc;

/// A native function exposed to expressions (globals and namespace
/// members). Arguments arrive fully evaluated.
#[derive(Clone, Copy)]
pub struct NativeFn {
    pub name: &'static str,
    pub call: fn(&[Value]) -> Result<Value>,
}

impl std::fmt::Debug for NativeFn {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "NativeFn({})", self.name)
    }
}

/// A method looked up on a receiver but not yet invoked.
/// `"x".toUpperCase` evaluates to one of these; calling it dispatches
/// through the per-tag method tables.
#[derive(Debug)]
pub struct BoundMethod {
    pub receiver: Value,
    pub method: String,
}

/// A compiled regex literal. Keeps the original source and flags for
/// `toString` and error messages.
#[derive(Debug)]
pub struct RegexValue {
    pub source: String,
    pub flags: String,
    pub regex: regex::Regex,
}

/// An insertion-ordered string-keyed map. YAML mapping order survives
/// into iteration, which drives column derivation and
/// `JSON.stringify` output.
#[derive(Debug, Clone, Default)]
pub struct ObjectMap {
    entries: Vec<(String, Value)>,
}

impl ObjectMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs(pairs: Vec<(String, Value)>) -> Self {
        let mut map = Self::new();
        for (k, v) in pairs {
            map.insert(k, v);
        }
        map
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries
            .iter()
            .find(|(k, _)| k.as_str() == key)
            .map(|(_, v)| v)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.entries.iter().any(|(k, _)| k.as_str() == key)
    }

    /// Insert or replace, preserving the original position on replace.
    pub fn insert(&mut self, key: String, value: Value) {
        if let Some(slot) = self.entries.iter_mut().find(|(k, _)| *k == key) {
            slot.1 = value;
        } else {
            self.entries.push((key, value));
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(k, _)| k.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The tagged union of all runtime values.
#[derive(Debug, Clone)]
pub enum Value {
    Null,
    Undefined,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(String),
    /// An instant, ms precision, rendered ISO-8601 UTC.
    Date(DateTime<Utc>),
    /// Total milliseconds; may be negative.
    Duration(i64),
    List(Rc<Vec<Value>>),
    Object(Rc<ObjectMap>),
    Regex(Rc<RegexValue>),
    File(Rc<FileRecord>),
    Function(NativeFn),
    Bound(Rc<BoundMethod>),
}

impl Value {
    pub fn string(s: impl Into<String>) -> Self {
        Value::Str(s.into())
    }

    pub fn list(items: Vec<Value>) -> Self {
        Value::List(Rc::new(items))
    }

    pub fn object(map: ObjectMap) -> Self {
        Value::Object(Rc::new(map))
    }

    /// Convert a parsed YAML node (frontmatter, base defaults) into a
    /// runtime value. Mapping keys that are not strings are rendered
    /// through their YAML display form.
    pub fn from_yaml(yaml: &serde_yaml::Value) -> Value {
        match yaml {
            serde_yaml::Value::Null => Value::Null,
            serde_yaml::Value::Bool(b) => Value::Bool(*b),
            serde_yaml::Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Value::Int(i)
                } else {
                    Value::Float(n.as_f64().unwrap_or(f64::NAN))
                }
            }
            serde_yaml::Value::String(s) => Value::Str(s.clone()),
            serde_yaml::Value::Sequence(seq) => {
                Value::list(seq.iter().map(Value::from_yaml).collect())
            }
            serde_yaml::Value::Mapping(map) => {
                let mut object = ObjectMap::new();
                for (k, v) in map {
                    let key = match k {
                        serde_yaml::Value::String(s) => s.clone(),
                        other => serde_yaml::to_string(other)
                            .map(|s| s.trim_end().to_string())
                            .unwrap_or_default(),
                    };
                    object.insert(key, Value::from_yaml(v));
                }
                Value::object(object)
            }
            serde_yaml::Value::Tagged(tagged) => Value::from_yaml(&tagged.value),
        }
    }

    /// JS `Boolean(x)`.
    pub fn truthy(&self) -> bool {
        match self {
            Value::Null | Value::Undefined => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(f) => *f != 0.0 && !f.is_nan(),
            Value::Str(s) => !s.is_empty(),
            _ => true,
        }
    }

    pub fn is_nullish(&self) -> bool {
        matches!(self, Value::Null | Value::Undefined)
    }

    pub fn is_callable(&self) -> bool {
        matches!(self, Value::Function(_) | Value::Bound(_))
    }

    /// JS `Number(x)`. Lists and plain objects coerce to NaN.
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Null => 0.0,
            Value::Undefined => f64::NAN,
            Value::Bool(b) => {
                if *b {
                    1.0
                } else {
                    0.0
                }
            }
            Value::Int(i) => *i as f64,
            Value::Float(f) => *f,
            Value::Str(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    0.0
                } else {
                    trimmed.parse::<f64>().unwrap_or(f64::NAN)
                }
            }
            Value::Date(d) => d.timestamp_millis() as f64,
            Value::Duration(ms) => *ms as f64,
            _ => f64::NAN,
        }
    }

    /// `typeof` result string.
    pub fn type_of(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Function(_) | Value::Bound(_) => "function",
            _ => "object",
        }
    }

    /// Name used in type-error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Undefined => "undefined",
            Value::Bool(_) => "boolean",
            Value::Int(_) | Value::Float(_) => "number",
            Value::Str(_) => "string",
            Value::Date(_) => "date",
            Value::Duration(_) => "duration",
            Value::List(_) => "list",
            Value::Object(_) => "object",
            Value::Regex(_) => "regex",
            Value::File(_) => "file",
            Value::Function(_) | Value::Bound(_) => "function",
        }
    }

    /// JS `String(x)`: the coercion used by string concatenation.
    pub fn to_display_string(&self) -> String {
        match self {
            Value::Null => "null".to_string(),
            Value::Undefined => "undefined".to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Int(i) => i.to_string(),
            Value::Float(f) => number_to_string(*f),
            Value::Str(s) => s.clone(),
            Value::Date(d) => format_date(d),
            Value::Duration(ms) => format_duration(*ms),
            Value::List(items) => items
                .iter()
                .map(Value::to_display_string)
                .collect::<Vec<_>>()
                .join(","),
            Value::Object(_) => "[object Object]".to_string(),
            Value::Regex(r) => format!("/{}/{}", r.source, r.flags),
            Value::File(f) => f.relative_path.clone(),
            Value::Function(f) => format!("function {}", f.name),
            Value::Bound(b) => format!("function {}", b.method),
        }
    }

    /// Strict equality (`===`).
    pub fn strict_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Undefined, Value::Undefined) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Date(a), Value::Date(b)) => {
                a.timestamp_millis() == b.timestamp_millis()
            }
            (Value::Duration(a), Value::Duration(b)) => a == b,
            (Value::List(a), Value::List(b)) => Rc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Rc::ptr_eq(a, b),
            (Value::Regex(a), Value::Regex(b)) => Rc::ptr_eq(a, b),
            (Value::File(a), Value::File(b)) => Rc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => {
                a.name == b.name && a.call as usize == b.call as usize
            }
            (Value::Bound(a), Value::Bound(b)) => Rc::ptr_eq(a, b),
            _ if self.is_numeric() && other.is_numeric() => {
                let (a, b) = (self.to_number(), other.to_number());
                a == b
            }
            _ => false,
        }
    }

    /// Loose equality (`==`). Numeric coercion across number-like
    /// primitives; null and undefined equal each other and nothing
    /// else; Dates compare by instant against numbers and by ISO
    /// string against strings.
    pub fn loose_eq(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null | Value::Undefined, Value::Null | Value::Undefined) => true,
            (Value::Null | Value::Undefined, _) | (_, Value::Null | Value::Undefined) => {
                false
            }
            (Value::Str(a), Value::Str(b)) => a == b,
            (Value::Date(d), Value::Str(s)) | (Value::Str(s), Value::Date(d)) => {
                format_date(d) == *s
            }
            (Value::Date(_), Value::Int(_) | Value::Float(_))
            | (Value::Int(_) | Value::Float(_), Value::Date(_)) => {
                self.to_number() == other.to_number()
            }
            (Value::Bool(_), _)
            | (_, Value::Bool(_))
            | (Value::Int(_) | Value::Float(_), Value::Str(_))
            | (Value::Str(_), Value::Int(_) | Value::Float(_)) => {
                let (a, b) = (self.to_number(), other.to_number());
                a == b
            }
            _ => self.strict_eq(other),
        }
    }

    fn is_numeric(&self) -> bool {
        matches!(self, Value::Int(_) | Value::Float(_))
    }
}

/// Convert a value to JSON for `JSON.stringify` and the formatter
/// fallback. Functions and regexes are not serializable.
pub fn value_to_json(value: &Value) -> Result<serde_json::Value> {
    let json = match value {
        Value::Null | Value::Undefined => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::Number((*i).into()),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::Str(s) => serde_json::Value::String(s.clone()),
        Value::Date(d) => serde_json::Value::String(format_date(d)),
        Value::Duration(ms) => serde_json::Value::String(format_duration(*ms)),
        Value::List(items) => serde_json::Value::Array(
            items.iter().map(value_to_json).collect::<Result<Vec<_>>>()?,
        ),
        Value::Object(map) => {
            let mut out = serde_json::Map::new();
            for (k, v) in map.iter() {
                out.insert(k.to_string(), value_to_json(v)?);
            }
            serde_json::Value::Object(out)
        }
        other => {
            return Err(BaseError::Format(format!(
                "{} is not JSON-serializable",
                other.kind()
            )))
        }
    };
    Ok(json)
}

/// Convert parsed JSON back into the value domain (`JSON.parse`).
pub fn json_to_value(json: &serde_json::Value) -> Value {
    match json {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::Str(s.clone()),
        serde_json::Value::Array(items) => {
            Value::list(items.iter().map(json_to_value).collect())
        }
        serde_json::Value::Object(map) => {
            let mut out = ObjectMap::new();
            for (k, v) in map {
                out.insert(k.clone(), json_to_value(v));
            }
            Value::object(out)
        }
    }
}

/// Render a Date the way `toISOString` would: ms precision, `Z`.
pub fn format_date(date: &DateTime<Utc>) -> String {
    date.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// JS number-to-string: integral floats print without a decimal
/// point, NaN and infinities by name.
pub fn number_to_string(n: f64) -> String {
    if n.is_nan() {
        "NaN".to_string()
    } else if n.is_infinite() {
        if n > 0.0 {
            "Infinity".to_string()
        } else {
            "-Infinity".to_string()
        }
    } else if n == n.trunc() && n.abs() < 1e15 {
        format!("{}", n as i64)
    } else {
        format!("{}", n)
    }
}

/// Wrap an f64 result back into the value domain, collapsing
/// integral results into Int so formatting stays clean.
pub fn number_value(n: f64) -> Value {
    if n.is_finite() && n == n.trunc() && n.abs() < 1e15 {
        Value::Int(n as i64)
    } else {
        Value::Float(n)
    }
}

/// Build a regex value from literal parts, mapping JS flags onto the
/// regex crate. Unsupported flags are rejected.
pub fn build_regex(source: &str, flags: &str) -> Result<Value> {
    let mut builder = regex::RegexBuilder::new(source);
    for flag in flags.chars() {
        match flag {
            'i' => {
                builder.case_insensitive(true);
            }
            'm' => {
                builder.multi_line(true);
            }
            's' => {
                builder.dot_matches_new_line(true);
            }
            'u' | 'g' => {} // no-ops for matching
            other => {
                return Err(BaseError::Eval(format!(
                    "SyntaxError: unsupported regex flag '{}'",
                    other
                )))
            }
        }
    }
    let regex = builder
        .build()
        .map_err(|e| BaseError::Eval(format!("SyntaxError: invalid regex: {}", e)))?;
    Ok(Value::Regex(Rc::new(RegexValue {
        source: source.to_string(),
        flags: flags.to_string(),
        regex,
    })))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_truthiness() {
        assert!(!Value::Null.truthy());
        assert!(!Value::Undefined.truthy());
        assert!(!Value::Bool(false).truthy());
        assert!(!Value::Int(0).truthy());
        assert!(!Value::Float(f64::NAN).truthy());
        assert!(!Value::string("").truthy());
        assert!(Value::string("x").truthy());
        assert!(Value::list(vec![]).truthy());
        assert!(Value::object(ObjectMap::new()).truthy());
    }

    #[test]
    fn test_loose_eq_null_undefined() {
        assert!(Value::Null.loose_eq(&Value::Undefined));
        assert!(!Value::Null.loose_eq(&Value::Int(0)));
        assert!(!Value::Undefined.loose_eq(&Value::string("")));
    }

    #[test]
    fn test_loose_eq_numeric_coercion() {
        assert!(Value::Int(5).loose_eq(&Value::string("5")));
        assert!(Value::Bool(true).loose_eq(&Value::Int(1)));
        assert!(!Value::Int(5).strict_eq(&Value::string("5")));
    }

    #[test]
    fn test_loose_eq_date_against_number() {
        let date = Value::Date(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        assert!(date.loose_eq(&Value::Int(1_704_067_200_000)));
        assert!(Value::Int(1_704_067_200_000).loose_eq(&date));
        assert!(!date.loose_eq(&Value::Int(0)));
        // Strict equality still requires matching tags.
        assert!(!date.strict_eq(&Value::Int(1_704_067_200_000)));
    }

    #[test]
    fn test_strict_eq_numbers_cross_tag() {
        assert!(Value::Int(2).strict_eq(&Value::Float(2.0)));
        assert!(!Value::Float(f64::NAN).strict_eq(&Value::Float(f64::NAN)));
    }

    #[test]
    fn test_list_identity_equality() {
        let a = Value::list(vec![Value::Int(1)]);
        let b = Value::list(vec![Value::Int(1)]);
        assert!(!a.strict_eq(&b));
        assert!(a.strict_eq(&a.clone()));
    }

    #[test]
    fn test_number_to_string() {
        assert_eq!(number_to_string(5.0), "5");
        assert_eq!(number_to_string(1.5), "1.5");
        assert_eq!(number_to_string(f64::NAN), "NaN");
        assert_eq!(number_to_string(f64::INFINITY), "Infinity");
    }

    #[test]
    fn test_format_date_iso() {
        let date = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(format_date(&date), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn test_from_yaml_preserves_mapping_order() {
        let yaml: serde_yaml::Value =
            serde_yaml::from_str("b: 1\na: 2\nc: 3").unwrap();
        let value = Value::from_yaml(&yaml);
        match value {
            Value::Object(map) => {
                let keys: Vec<&str> = map.keys().collect();
                assert_eq!(keys, vec!["b", "a", "c"]);
            }
            other => panic!("Expected object, got {:?}", other),
        }
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::string(" 3.5 ").to_number(), 3.5);
        assert_eq!(Value::string("").to_number(), 0.0);
        assert!(Value::string("abc").to_number().is_nan());
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
    }
}
