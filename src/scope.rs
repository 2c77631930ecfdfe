//! Per-file scope assembly and the memoized formula namespace.

use crate::error::{BaseError, Result};
use crate::expr::eval::evaluate;
use crate::expr::lexer::{is_identifier_char, is_identifier_start};
use crate::expr::parser::parse;
use crate::file::FileRecord;
use crate::value::{ObjectMap, Value};
use crate::{globals, expr::namespaces};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// Names a frontmatter key may never shadow. `if` is here because the
/// source rewriter targets bare `if(` calls; a promoted binding would
/// defeat the rewrite.
const RESERVED: &[&str] = &[
    "arguments", "eval", "prototype", "constructor", "__proto__", "super", "globalThis",
    "window", "if",
];

/// One formula's lifecycle: source text until first access, a marker
/// while its body runs (so re-entry is a cycle), then the cached
/// result forever.
enum FormulaCell {
    Unevaluated(String),
    InProgress,
    Done(Value),
}

/// The memo table behind the `formula` namespace.
pub struct FormulaTable {
    cells: RefCell<HashMap<String, FormulaCell>>,
}

impl FormulaTable {
    pub fn new(formulas: &[(String, String)]) -> Self {
        let cells = formulas
            .iter()
            .map(|(name, src)| (name.clone(), FormulaCell::Unevaluated(src.clone())))
            .collect();
        FormulaTable {
            cells: RefCell::new(cells),
        }
    }
}

/// Evaluation scope for exactly one file. Immutable after
/// construction except for the formula memo table.
pub struct Scope {
    vars: HashMap<String, Value>,
    formulas: Rc<FormulaTable>,
}

impl Scope {
    /// Build the scope for a file per the fixed precedence order:
    /// file object, frontmatter aliases, globals, builtin namespaces,
    /// promoted frontmatter identifiers. Earlier entries win.
    pub fn for_file(record: Rc<FileRecord>, formulas: &[(String, String)]) -> Self {
        let mut vars = HashMap::new();

        vars.insert("file".to_string(), Value::File(record.clone()));

        let frontmatter = Value::Object(record.frontmatter.clone());
        vars.insert("frontmatter".to_string(), frontmatter.clone());
        vars.insert("metadata".to_string(), Value::object(ObjectMap::new()));
        vars.insert("note".to_string(), frontmatter);
        vars.insert("properties".to_string(), Value::Object(record.properties.clone()));

        globals::install(&mut vars);
        namespaces::install(&mut vars);

        for (key, value) in record.frontmatter.iter() {
            if is_valid_identifier(key)
                && !RESERVED.contains(&key)
                && !globals::GLOBAL_NAMES.contains(&key)
                && !vars.contains_key(key)
            {
                vars.insert(key.to_string(), value.clone());
            }
        }

        Scope {
            vars,
            formulas: Rc::new(FormulaTable::new(formulas)),
        }
    }

    /// A scope with no file and no formulas. Used by tests and by
    /// filter evaluation smoke checks.
    pub fn bare() -> Self {
        let mut vars = HashMap::new();
        globals::install(&mut vars);
        namespaces::install(&mut vars);
        Scope {
            vars,
            formulas: Rc::new(FormulaTable::new(&[])),
        }
    }

    /// Add or override a binding. Intended for tests.
    pub fn define(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    pub fn lookup(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    /// Resolve `formula.<name>` through the memo table. The body runs
    /// at most once per scope; re-entrant access is a cycle error.
    pub fn formula_value(&self, name: &str) -> Result<Value> {
        let source = {
            let mut cells = self.formulas.cells.borrow_mut();
            match cells.get_mut(name) {
                None => return Ok(Value::Undefined),
                Some(FormulaCell::Done(value)) => return Ok(value.clone()),
                Some(FormulaCell::InProgress) => {
                    return Err(BaseError::FormulaCycle(name.to_string()))
                }
                Some(cell @ FormulaCell::Unevaluated(_)) => {
                    let FormulaCell::Unevaluated(src) = std::mem::replace(cell, FormulaCell::InProgress)
                    else {
                        unreachable!()
                    };
                    src
                }
            }
        };

        let result = parse(&source).and_then(|expr| evaluate(&expr, self));

        let mut cells = self.formulas.cells.borrow_mut();
        match result {
            Ok(value) => {
                cells.insert(name.to_string(), FormulaCell::Done(value.clone()));
                Ok(value)
            }
            Err(err) => {
                // Leave the cell evaluatable so the error is not
                // sticky across columns.
                cells.insert(name.to_string(), FormulaCell::Unevaluated(source));
                Err(BaseError::FormulaContext {
                    name: name.to_string(),
                    source: Box::new(err),
                })
            }
        }
    }
}

/// `/^[A-Za-z_$][A-Za-z0-9_$]*$/`
fn is_valid_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if is_identifier_start(first) => chars.all(is_identifier_char),
        _ => false,
    }
}
