//! Predicate built-ins — boolean-returning functions usable directly in
//! WHERE without an explicit `= true` comparison.

use crate::error::{Error, Result};
use crate::model::Value;

pub fn exists(args: &[Value]) -> Result<bool> {
    Ok(!args[0].is_null())
}

pub fn is_empty(args: &[Value]) -> Result<bool> {
    match &args[0] {
        Value::Null => Ok(true),
        Value::String(s) => Ok(s.is_empty()),
        Value::List(items) => Ok(items.is_empty()),
        Value::Map(map) => Ok(map.is_empty()),
        other => Err(Error::SemanticError(format!(
            "isEmpty() does not accept a value of type {}",
            other.type_name()
        ))),
    }
}

/// `all`/`any`/`none`/`single` parse straight into `Expr::Comprehension`
/// (the loop variable needs lazy per-element binding, which a pre-evaluated
/// `&[Value]` argument list can't give them) and are evaluated in
/// `expr::eval_comprehension`, not through this registry entry. The entries
/// below exist only so `Registry::function_names()` lists them for
/// introspection; reaching this function means the parser failed to
/// recognize the comprehension grammar.
pub fn comprehension_unreachable(_args: &[Value]) -> Result<bool> {
    Err(Error::SemanticError(
        "comprehension predicate functions must be called as `name(var IN collection [WHERE ...])`".into(),
    ))
}
