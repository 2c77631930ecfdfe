//! Filter tree evaluation over a per-file scope.

use crate::base::FilterNode;
use crate::error::{BaseError, Result};
use crate::expr::eval::evaluate;
use crate::expr::parser::parse;
use crate::scope::Scope;

/// Evaluate a filter against a scope. A missing filter matches
/// everything. Errors are wrapped as `Failed to process <context>`
/// with the failing subject attached as the cause.
pub fn matches(filter: Option<&FilterNode>, scope: &Scope, context: &str) -> Result<bool> {
    let Some(filter) = filter else { return Ok(true) };

    match filter {
        FilterNode::Expr(source) => {
            let result = parse(source).and_then(|expr| evaluate(&expr, scope));
            match result {
                Ok(value) => Ok(value.truthy()),
                Err(err) => Err(BaseError::FilterContext {
                    context: context.to_string(),
                    source: Box::new(err),
                }),
            }
        }
        FilterNode::Group { and, or, not } => {
            // Short-circuit AND over the `and` group.
            if let Some(members) = and {
                let ctx = format!("{} (and)", context);
                for member in members {
                    if !matches(Some(member), scope, &ctx)? {
                        return Ok(false);
                    }
                }
            }

            // OR: an empty group matches nothing.
            if let Some(members) = or {
                let ctx = format!("{} (or)", context);
                let mut any = false;
                for member in members {
                    if matches(Some(member), scope, &ctx)? {
                        any = true;
                        break;
                    }
                }
                if !any {
                    return Ok(false);
                }
            }

            // NOT: true iff no member matches.
            if let Some(members) = not {
                let ctx = format!("{} (not)", context);
                for member in members {
                    if matches(Some(member), scope, &ctx)? {
                        return Ok(false);
                    }
                }
            }

            Ok(true)
        }
    }
}
