//! Tree-walking evaluation of expressions against a scope.

use crate::duration::parse_duration_opt;
use crate::error::{BaseError, Result};
use crate::expr::ast::{BinaryOp, Expr, LogicalOp, UnaryOp};
use crate::expr::methods::{call_method, get_member};
use crate::scope::Scope;
use crate::value::{build_regex, number_value, Value};
use chrono::TimeDelta;

/// Evaluate an expression. Operands evaluate left-to-right; any error
/// bubbles out unchanged so outer layers can attach context.
pub fn evaluate(expr: &Expr, scope: &Scope) -> Result<Value> {
    match expr {
        Expr::Int(n) => Ok(Value::Int(*n)),
        Expr::Float(n) => Ok(Value::Float(*n)),
        Expr::Str(s) => Ok(Value::string(s.clone())),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Null => Ok(Value::Null),
        Expr::Undefined => Ok(Value::Undefined),
        Expr::NaN => Ok(Value::Float(f64::NAN)),
        Expr::Infinity => Ok(Value::Float(f64::INFINITY)),
        Expr::Regex { source, flags } => build_regex(source, flags),

        Expr::Identifier(name) => match scope.lookup(name) {
            Some(value) => Ok(value.clone()),
            None => Err(BaseError::reference_error(name)),
        },

        Expr::Array(elements) => {
            let mut items = Vec::with_capacity(elements.len());
            for element in elements {
                items.push(evaluate(element, scope)?);
            }
            Ok(Value::list(items))
        }

        Expr::Member { object, property } => {
            if is_formula_namespace(object, scope) {
                return scope.formula_value(property);
            }
            let target = evaluate(object, scope)?;
            get_member(&target, property)
        }

        Expr::Index { object, index } => {
            if is_formula_namespace(object, scope) {
                let key = evaluate(index, scope)?.to_display_string();
                return scope.formula_value(&key);
            }
            let target = evaluate(object, scope)?;
            let key = evaluate(index, scope)?;
            index_value(&target, &key)
        }

        Expr::Call { callee, args } => {
            let target = evaluate(callee, scope)?;
            let mut evaluated = Vec::with_capacity(args.len());
            for arg in args {
                evaluated.push(evaluate(arg, scope)?);
            }
            match target {
                Value::Function(f) => (f.call)(&evaluated),
                Value::Bound(bound) => call_method(&bound.receiver, &bound.method, &evaluated),
                other => Err(BaseError::type_error(format!(
                    "{} is not a function",
                    other.kind()
                ))),
            }
        }

        Expr::Unary { op, operand } => evaluate_unary(*op, operand, scope),

        Expr::Binary { op, left, right } => {
            if *op == BinaryOp::InstanceOf {
                return evaluate_instanceof(left, right, scope);
            }
            let lhs = evaluate(left, scope)?;
            let rhs = evaluate(right, scope)?;
            evaluate_binary(*op, &lhs, &rhs)
        }

        Expr::Logical { op, left, right } => {
            let lhs = evaluate(left, scope)?;
            match op {
                LogicalOp::And => {
                    if lhs.truthy() {
                        evaluate(right, scope)
                    } else {
                        Ok(lhs)
                    }
                }
                LogicalOp::Or => {
                    if lhs.truthy() {
                        Ok(lhs)
                    } else {
                        evaluate(right, scope)
                    }
                }
                LogicalOp::Nullish => {
                    if lhs.is_nullish() {
                        evaluate(right, scope)
                    } else {
                        Ok(lhs)
                    }
                }
            }
        }

        Expr::Conditional {
            test,
            consequent,
            alternate,
        } => {
            if evaluate(test, scope)?.truthy() {
                evaluate(consequent, scope)
            } else {
                evaluate(alternate, scope)
            }
        }
    }
}

/// `formula.x` routes through the memo table unless a frontmatter key
/// literally named `formula` was promoted, in which case the binding
/// wins (it was inserted earlier in the precedence order).
fn is_formula_namespace(object: &Expr, scope: &Scope) -> bool {
    matches!(object, Expr::Identifier(name) if name == "formula")
        && scope.lookup("formula").is_none()
}

fn evaluate_unary(op: UnaryOp, operand: &Expr, scope: &Scope) -> Result<Value> {
    // `typeof missing` must not raise the ReferenceError.
    if op == UnaryOp::TypeOf {
        if let Expr::Identifier(name) = operand {
            if scope.lookup(name).is_none() {
                return Ok(Value::string("undefined"));
            }
        }
        let value = evaluate(operand, scope)?;
        return Ok(Value::string(value.type_of()));
    }

    let value = evaluate(operand, scope)?;
    match op {
        UnaryOp::Not => Ok(Value::Bool(!value.truthy())),
        UnaryOp::Plus => Ok(number_value(value.to_number())),
        UnaryOp::Minus => Ok(number_value(-value.to_number())),
        UnaryOp::BitNot => Ok(number_value(!to_int32(value.to_number()) as f64)),
        UnaryOp::Void => Ok(Value::Undefined),
        UnaryOp::TypeOf => unreachable!("handled above"),
    }
}

/// A value usable as the duration side of date arithmetic: numbers,
/// durations, and strings the best-effort duration parser accepts.
fn duration_ms(value: &Value) -> Option<i64> {
    match value {
        Value::Int(i) => Some(*i),
        Value::Float(f) if f.is_finite() => Some(*f as i64),
        Value::Duration(ms) => Some(*ms),
        Value::Str(s) => parse_duration_opt(s),
        _ => None,
    }
}

fn shift_date(date: chrono::DateTime<chrono::Utc>, ms: i64) -> Value {
    Value::Date(date + TimeDelta::milliseconds(ms))
}

fn evaluate_binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value> {
    match op {
        BinaryOp::Add => {
            if let Value::Date(d) = lhs {
                if let Some(ms) = duration_ms(rhs) {
                    return Ok(shift_date(*d, ms));
                }
            }
            if let Value::Date(d) = rhs {
                if let Some(ms) = duration_ms(lhs) {
                    return Ok(shift_date(*d, ms));
                }
            }
            if matches!(lhs, Value::Duration(_)) || matches!(rhs, Value::Duration(_)) {
                if let (Some(a), Some(b)) = (duration_ms(lhs), duration_ms(rhs)) {
                    return Ok(Value::Duration(a + b));
                }
            }
            // Host `+`: concatenation when either side is string-like.
            if matches!(lhs, Value::Str(_) | Value::List(_) | Value::Object(_))
                || matches!(rhs, Value::Str(_) | Value::List(_) | Value::Object(_))
            {
                return Ok(Value::string(format!(
                    "{}{}",
                    lhs.to_display_string(),
                    rhs.to_display_string()
                )));
            }
            Ok(number_value(lhs.to_number() + rhs.to_number()))
        }

        BinaryOp::Sub => {
            if let (Value::Date(a), Value::Date(b)) = (lhs, rhs) {
                return Ok(number_value(
                    (a.timestamp_millis() - b.timestamp_millis()) as f64,
                ));
            }
            if let Value::Date(d) = lhs {
                if let Some(ms) = duration_ms(rhs) {
                    return Ok(shift_date(*d, -ms));
                }
            }
            if matches!(lhs, Value::Duration(_)) || matches!(rhs, Value::Duration(_)) {
                if let (Some(a), Some(b)) = (duration_ms(lhs), duration_ms(rhs)) {
                    return Ok(Value::Duration(a - b));
                }
            }
            Ok(number_value(lhs.to_number() - rhs.to_number()))
        }

        BinaryOp::Mul => Ok(number_value(lhs.to_number() * rhs.to_number())),
        BinaryOp::Div => Ok(number_value(lhs.to_number() / rhs.to_number())),
        BinaryOp::Rem => Ok(number_value(lhs.to_number() % rhs.to_number())),
        BinaryOp::Pow => Ok(number_value(lhs.to_number().powf(rhs.to_number()))),

        BinaryOp::Eq => Ok(Value::Bool(lhs.loose_eq(rhs))),
        BinaryOp::NotEq => Ok(Value::Bool(!lhs.loose_eq(rhs))),
        BinaryOp::StrictEq => Ok(Value::Bool(lhs.strict_eq(rhs))),
        BinaryOp::StrictNotEq => Ok(Value::Bool(!lhs.strict_eq(rhs))),

        BinaryOp::Lt | BinaryOp::Gt | BinaryOp::LtEq | BinaryOp::GtEq => {
            Ok(Value::Bool(compare(op, lhs, rhs)))
        }

        BinaryOp::BitAnd => Ok(number_value(
            (to_int32(lhs.to_number()) & to_int32(rhs.to_number())) as f64,
        )),
        BinaryOp::BitOr => Ok(number_value(
            (to_int32(lhs.to_number()) | to_int32(rhs.to_number())) as f64,
        )),
        BinaryOp::BitXor => Ok(number_value(
            (to_int32(lhs.to_number()) ^ to_int32(rhs.to_number())) as f64,
        )),
        BinaryOp::Shl => Ok(number_value(
            (to_int32(lhs.to_number()) << (to_uint32(rhs.to_number()) & 31)) as f64,
        )),
        BinaryOp::Shr => Ok(number_value(
            (to_int32(lhs.to_number()) >> (to_uint32(rhs.to_number()) & 31)) as f64,
        )),
        BinaryOp::UShr => Ok(number_value(
            (to_uint32(lhs.to_number()) >> (to_uint32(rhs.to_number()) & 31)) as f64,
        )),

        BinaryOp::In => {
            let key = lhs.to_display_string();
            match rhs {
                Value::Object(map) => Ok(Value::Bool(map.contains_key(&key))),
                Value::List(items) => {
                    let index = lhs.to_number();
                    Ok(Value::Bool(
                        index.is_finite()
                            && index >= 0.0
                            && index == index.trunc()
                            && (index as usize) < items.len(),
                    ))
                }
                Value::File(record) => Ok(Value::Bool(
                    crate::file::field_value(record, &key).is_some()
                        || record.properties.contains_key(&key),
                )),
                other => Err(BaseError::type_error(format!(
                    "Cannot use 'in' operator to search for \"{}\" in {}",
                    key,
                    other.kind()
                ))),
            }
        }

        BinaryOp::InstanceOf => unreachable!("dispatched before operand evaluation"),
    }
}

/// `<` `>` `<=` `>=`: lexicographic when both sides are strings,
/// numeric otherwise (NaN comparisons are false).
fn compare(op: BinaryOp, lhs: &Value, rhs: &Value) -> bool {
    if let (Value::Str(a), Value::Str(b)) = (lhs, rhs) {
        return match op {
            BinaryOp::Lt => a < b,
            BinaryOp::Gt => a > b,
            BinaryOp::LtEq => a <= b,
            BinaryOp::GtEq => a >= b,
            _ => false,
        };
    }
    let (a, b) = (lhs.to_number(), rhs.to_number());
    if a.is_nan() || b.is_nan() {
        return false;
    }
    match op {
        BinaryOp::Lt => a < b,
        BinaryOp::Gt => a > b,
        BinaryOp::LtEq => a <= b,
        BinaryOp::GtEq => a >= b,
        _ => false,
    }
}

fn evaluate_instanceof(left: &Expr, right: &Expr, scope: &Scope) -> Result<Value> {
    let value = evaluate(left, scope)?;

    // Builtin constructors are recognized by name; anything else must
    // at least be callable.
    if let Expr::Identifier(name) = right {
        let known = match name.as_str() {
            "Date" => Some(matches!(value, Value::Date(_))),
            "RegExp" => Some(matches!(value, Value::Regex(_))),
            "Array" => Some(matches!(value, Value::List(_))),
            "Object" => Some(matches!(
                value,
                Value::Object(_) | Value::List(_) | Value::File(_) | Value::Regex(_)
            )),
            "Function" => Some(value.is_callable()),
            "String" | "Number" | "Boolean" => Some(false),
            _ => None,
        };
        if let Some(hit) = known {
            return Ok(Value::Bool(hit));
        }
    }

    let constructor = evaluate(right, scope)?;
    if constructor.is_callable() {
        Ok(Value::Bool(false))
    } else {
        Err(BaseError::type_error(
            "Right-hand side of 'instanceof' is not callable",
        ))
    }
}

/// Bracket access. Lists index numerically; everything else behaves
/// like dot access with a computed name.
fn index_value(target: &Value, key: &Value) -> Result<Value> {
    match target {
        Value::List(items) => {
            let index = key.to_number();
            if index.is_finite() && index >= 0.0 && index == index.trunc() {
                Ok(items.get(index as usize).cloned().unwrap_or(Value::Undefined))
            } else {
                get_member(target, &key.to_display_string())
            }
        }
        Value::Str(s) => {
            let index = key.to_number();
            if index.is_finite() && index >= 0.0 && index == index.trunc() {
                Ok(s.chars()
                    .nth(index as usize)
                    .map(|c| Value::string(c.to_string()))
                    .unwrap_or(Value::Undefined))
            } else {
                get_member(target, &key.to_display_string())
            }
        }
        _ => get_member(target, &key.to_display_string()),
    }
}

fn to_int32(n: f64) -> i32 {
    if !n.is_finite() {
        return 0;
    }
    (n.trunc() as i64 & 0xFFFF_FFFF) as u32 as i32
}

fn to_uint32(n: f64) -> u32 {
    to_int32(n) as u32
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::parser::parse;
    use crate::file::FileRecord;
    use crate::value::ObjectMap;
    use std::rc::Rc;

    fn eval_str(source: &str) -> Result<Value> {
        let expr = parse(source)?;
        evaluate(&expr, &Scope::bare())
    }

    fn eval_ok(source: &str) -> Value {
        eval_str(source).unwrap()
    }

    #[test]
    fn test_arithmetic_and_precedence() {
        assert!(matches!(eval_ok("1 + 2 * 3"), Value::Int(7)));
        assert!(matches!(eval_ok("(1 + 2) * 3"), Value::Int(9)));
        assert!(matches!(eval_ok("7 % 3"), Value::Int(1)));
        assert!(matches!(eval_ok("2 ** 10"), Value::Int(1024)));
        assert!(matches!(eval_ok("1 / 2"), Value::Float(f) if f == 0.5));
    }

    #[test]
    fn test_string_concat() {
        assert!(matches!(eval_ok("'a' + 1"), Value::Str(s) if s == "a1"));
        assert!(matches!(eval_ok("1 + '2'"), Value::Str(s) if s == "12"));
        assert!(matches!(eval_ok("'x' + null"), Value::Str(s) if s == "xnull"));
    }

    #[test]
    fn test_date_plus_duration_string() {
        let shifted = eval_ok("date('2024-01-01T00:00:00Z') + '1 day'");
        match shifted {
            Value::Date(d) => {
                assert_eq!(crate::value::format_date(&d), "2024-01-02T00:00:00.000Z")
            }
            other => panic!("Expected date, got {:?}", other),
        }
        // Same via the duration() global.
        let via_duration = eval_ok("date('2024-01-01T00:00:00Z') + duration('1 day')");
        assert!(shifted.strict_eq(&via_duration));
    }

    #[test]
    fn test_date_minus_week() {
        let shifted = eval_ok("date('2024-01-08T00:00:00Z') - '1 week'");
        match shifted {
            Value::Date(d) => {
                assert_eq!(crate::value::format_date(&d), "2024-01-01T00:00:00.000Z")
            }
            other => panic!("Expected date, got {:?}", other),
        }
    }

    #[test]
    fn test_date_minus_date_is_ms() {
        let diff = eval_ok("date('2024-01-08') - date('2024-01-01')");
        assert!(matches!(diff, Value::Int(604_800_000)));
    }

    #[test]
    fn test_nullish_coalescing() {
        assert!(matches!(eval_ok("null ?? 5"), Value::Int(5)));
        assert!(matches!(eval_ok("undefined ?? 5"), Value::Int(5)));
        assert!(matches!(eval_ok("0 ?? 5"), Value::Int(0)));
        assert!(matches!(eval_ok("'' ?? 'x'"), Value::Str(s) if s.is_empty()));
        assert!(matches!(eval_ok("false ?? true"), Value::Bool(false)));
    }

    #[test]
    fn test_logical_return_operand() {
        assert!(matches!(eval_ok("0 || 'fallback'"), Value::Str(s) if s == "fallback"));
        assert!(matches!(eval_ok("'left' && 'right'"), Value::Str(s) if s == "right"));
        assert!(matches!(eval_ok("0 && explodes"), Value::Int(0)));
        assert!(matches!(eval_ok("1 || explodes"), Value::Int(1)));
    }

    #[test]
    fn test_ternary_short_circuit() {
        assert!(matches!(eval_ok("true ? 1 : explodes"), Value::Int(1)));
        assert!(matches!(eval_ok("false ? explodes : 2"), Value::Int(2)));
    }

    #[test]
    fn test_typeof_undeclared() {
        assert!(matches!(
            eval_ok("typeof undeclared_identifier"),
            Value::Str(s) if s == "undefined"
        ));
        assert!(matches!(
            eval_ok("typeof undeclared_identifier === 'undefined'"),
            Value::Bool(true)
        ));
        // Outside typeof it is still an error.
        let err = eval_str("undeclared_identifier").unwrap_err();
        assert!(err.to_string().contains("ReferenceError"));
    }

    #[test]
    fn test_equality_modes() {
        assert!(matches!(eval_ok("5 == '5'"), Value::Bool(true)));
        assert!(matches!(eval_ok("5 === '5'"), Value::Bool(false)));
        assert!(matches!(eval_ok("null == undefined"), Value::Bool(true)));
        assert!(matches!(eval_ok("null === undefined"), Value::Bool(false)));
        assert!(matches!(eval_ok("NaN == NaN"), Value::Bool(false)));
    }

    #[test]
    fn test_comparisons() {
        assert!(matches!(eval_ok("'apple' < 'banana'"), Value::Bool(true)));
        assert!(matches!(eval_ok("10 > '9'"), Value::Bool(true)));
        assert!(matches!(eval_ok("NaN < 1"), Value::Bool(false)));
    }

    #[test]
    fn test_unary_operators() {
        assert!(matches!(eval_ok("!''"), Value::Bool(true)));
        assert!(matches!(eval_ok("-'5'"), Value::Int(-5)));
        assert!(matches!(eval_ok("+true"), Value::Int(1)));
        assert!(matches!(eval_ok("~0"), Value::Int(-1)));
        assert!(matches!(eval_ok("void 1"), Value::Undefined));
    }

    #[test]
    fn test_bitwise_and_shifts() {
        assert!(matches!(eval_ok("6 & 3"), Value::Int(2)));
        assert!(matches!(eval_ok("6 | 3"), Value::Int(7)));
        assert!(matches!(eval_ok("6 ^ 3"), Value::Int(5)));
        assert!(matches!(eval_ok("1 << 4"), Value::Int(16)));
        assert!(matches!(eval_ok("-1 >>> 0"), Value::Int(4_294_967_295)));
    }

    #[test]
    fn test_member_on_null_is_type_error() {
        let err = eval_str("null.x").unwrap_err();
        assert!(err.to_string().contains("TypeError"));
    }

    #[test]
    fn test_call_non_function_is_type_error() {
        let err = eval_str("(5)(1)").unwrap_err();
        assert!(err.to_string().contains("is not a function"));
    }

    #[test]
    fn test_array_literal_and_index() {
        assert!(matches!(eval_ok("[1, 2, 3][1]"), Value::Int(2)));
        assert!(matches!(eval_ok("[1, 2, 3].length"), Value::Int(3)));
        assert!(matches!(eval_ok("[1, , 3][1]"), Value::Undefined));
        assert!(matches!(eval_ok("'abc'[1]"), Value::Str(s) if s == "b"));
    }

    #[test]
    fn test_method_chain() {
        assert!(matches!(
            eval_ok("' Project Alpha '.trim().toUpperCase()"),
            Value::Str(s) if s == "PROJECT ALPHA"
        ));
    }

    #[test]
    fn test_regex_literal_matches() {
        assert!(matches!(
            eval_ok("/alpha/i.matches('Project Alpha Launch')"),
            Value::Bool(true)
        ));
        assert!(matches!(
            eval_ok("/alpha/i.matches('Project Beta Support')"),
            Value::Bool(false)
        ));
    }

    #[test]
    fn test_in_operator() {
        let mut scope = Scope::bare();
        let mut map = ObjectMap::new();
        map.insert("status".to_string(), Value::string("open"));
        scope.define("obj", Value::object(map));

        let expr = parse("'status' in obj").unwrap();
        assert!(matches!(evaluate(&expr, &scope).unwrap(), Value::Bool(true)));
        let expr = parse("'missing' in obj").unwrap();
        assert!(matches!(evaluate(&expr, &scope).unwrap(), Value::Bool(false)));
        let err = evaluate(&parse("'x' in 5").unwrap(), &scope).unwrap_err();
        assert!(err.to_string().contains("'in' operator"));
    }

    #[test]
    fn test_instanceof() {
        assert!(matches!(
            eval_ok("date('2024-01-01') instanceof Date"),
            Value::Bool(true)
        ));
        assert!(matches!(eval_ok("5 instanceof Date"), Value::Bool(false)));
        assert!(matches!(eval_ok("[1] instanceof Array"), Value::Bool(true)));
        assert!(matches!(
            eval_ok("/x/ instanceof RegExp"),
            Value::Bool(true)
        ));
    }

    #[test]
    fn test_namespace_access() {
        assert!(matches!(eval_ok("Math.max(1, 9, 4)"), Value::Int(9)));
        assert!(matches!(eval_ok("Math.floor(1.9)"), Value::Int(1)));
        assert!(matches!(
            eval_ok("JSON.stringify([1, 2])"),
            Value::Str(s) if s == "[1,2]"
        ));
    }

    #[test]
    fn test_if_global_through_rewrite() {
        assert!(matches!(eval_ok("if(1 > 0, 'yes', 'no')"), Value::Str(s) if s == "yes"));
        assert!(matches!(eval_ok("if(false, 'yes')"), Value::Null));
    }

    #[test]
    fn test_file_scope_expressions() {
        let mut record = FileRecord::stub("projects/alpha.md");
        let fm = Rc::new(ObjectMap::from_pairs(vec![
            ("title".to_string(), Value::string("Project Alpha Launch")),
            ("status".to_string(), Value::string("open")),
        ]));
        record.frontmatter = fm.clone();
        record.properties = fm;
        record.tags = vec!["project".to_string()];
        let scope = Scope::for_file(Rc::new(record), &[]);

        let check = |src: &str| evaluate(&parse(src).unwrap(), &scope).unwrap();
        assert!(matches!(check("file.name"), Value::Str(s) if s == "alpha"));
        assert!(matches!(check("file.file.name"), Value::Str(s) if s == "alpha"));
        assert!(matches!(check("file.hasTag('Project')"), Value::Bool(true)));
        assert!(matches!(check("note.title"), Value::Str(s) if s == "Project Alpha Launch"));
        assert!(matches!(check("status"), Value::Str(s) if s == "open"));
        assert!(matches!(check("file.inFolder('projects')"), Value::Bool(true)));
        assert!(matches!(
            check("note.title.toUpperCase()"),
            Value::Str(s) if s == "PROJECT ALPHA LAUNCH"
        ));
    }

    #[test]
    fn test_formula_access_via_scope() {
        let record = Rc::new(FileRecord::stub("a.md"));
        let scope = Scope::for_file(
            record,
            &[("answer".to_string(), "6 * 7".to_string())],
        );
        let expr = parse("formula.answer + 1").unwrap();
        assert!(matches!(evaluate(&expr, &scope).unwrap(), Value::Int(43)));
        let expr = parse("formula['answer']").unwrap();
        assert!(matches!(evaluate(&expr, &scope).unwrap(), Value::Int(42)));
        let expr = parse("formula.unknown").unwrap();
        assert!(matches!(evaluate(&expr, &scope).unwrap(), Value::Undefined));
    }
}
