//! Materialization: turn a base + view + vault files into a matrix
//! of formatted strings.

use crate::base::{BaseDef, ViewDef};
use crate::error::{BaseError, Result};
use crate::expr::eval::evaluate;
use crate::expr::parser::parse;
use crate::file::FileRecord;
use crate::filter;
use crate::format::format_value;
use crate::scope::Scope;
use crate::value::Value;
use std::rc::Rc;

/// A materialized view: its title and the `[header, ...rows]` matrix.
/// The matrix is empty when no columns could be derived.
#[derive(Debug)]
pub struct Materialized {
    pub view_name: String,
    pub rows: Vec<Vec<String>>,
}

/// Select the view to materialize: by name when given, the first view
/// otherwise.
fn select_view<'a>(base: &'a BaseDef, view_name: Option<&str>) -> Result<&'a ViewDef> {
    match view_name {
        Some(name) => base
            .views
            .iter()
            .find(|v| v.name.as_deref() == Some(name))
            .ok_or_else(|| BaseError::Shape(format!("View \"{}\" not found in base", name))),
        None => base
            .views
            .first()
            .ok_or_else(|| BaseError::Shape("Base defines no views".to_string())),
    }
}

/// Derive column keys: the view's `order`, else the base's property
/// keys, else `formula.<name>` per formula, else nothing.
fn column_keys(base: &BaseDef, view: &ViewDef) -> Vec<String> {
    if let Some(order) = &view.order {
        if !order.is_empty() {
            return order.clone();
        }
    }
    if !base.properties.is_empty() {
        return base.properties.iter().map(|(key, _)| key.clone()).collect();
    }
    base.formulas
        .iter()
        .map(|(name, _)| format!("formula.{}", name))
        .collect()
}

/// Evaluate one column key in a file's scope. Keys under `formula.`
/// read the memo table; everything else is an expression.
fn column_value(key: &str, scope: &Scope) -> Result<Value> {
    if let Some(name) = key.strip_prefix("formula.") {
        scope.formula_value(name)
    } else {
        let expr = parse(key)?;
        evaluate(&expr, scope)
    }
}

/// Materialize a view over the given files. Files are processed in
/// ascending relative-path order so `limit` is deterministic.
pub fn materialize(
    base: &BaseDef,
    view_name: Option<&str>,
    files: &[Rc<FileRecord>],
) -> Result<Materialized> {
    let view = select_view(base, view_name)?;
    let title = view
        .name
        .clone()
        .unwrap_or_else(|| view.view_type.clone());

    let keys = column_keys(base, view);
    if keys.is_empty() {
        return Ok(Materialized {
            view_name: title,
            rows: Vec::new(),
        });
    }

    let mut ordered: Vec<&Rc<FileRecord>> = files.iter().collect();
    ordered.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));

    let limit = view
        .limit
        .filter(|n| n.is_finite() && *n > 0.0)
        .map(|n| n.floor() as usize);

    let mut retained: Vec<(&Rc<FileRecord>, Scope)> = Vec::new();
    for record in ordered {
        let scope = Scope::for_file(record.clone(), &base.formulas);
        if !filter::matches(base.filters.as_ref(), &scope, "base filter")? {
            continue;
        }
        if !filter::matches(view.filters.as_ref(), &scope, "view filter")? {
            continue;
        }
        retained.push((record, scope));
        if let Some(limit) = limit {
            if retained.len() >= limit {
                break;
            }
        }
    }

    let header: Vec<String> = keys
        .iter()
        .map(|key| base.display_name(key).to_string())
        .collect();

    let mut rows = Vec::with_capacity(retained.len() + 1);
    rows.push(header);

    for (record, scope) in retained {
        let mut row = Vec::with_capacity(keys.len());
        for key in &keys {
            let value = column_value(key, &scope).map_err(|err| BaseError::ColumnContext {
                key: key.clone(),
                file: record.relative_path.clone(),
                source: Box::new(err),
            })?;
            row.push(format_value(&value));
        }
        rows.push(row);
    }

    Ok(Materialized {
        view_name: title,
        rows,
    })
}
