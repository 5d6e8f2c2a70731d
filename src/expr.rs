//! Expression evaluation — the pure `value()` half of the expression
//! engine (spec.md §4.D). Parsing builds the `Expr` tree (shunting-yard
//! linearization lives in `parser.rs`); this module only ever walks an
//! already-built tree and never touches scope globally, per spec.md §9's
//! "pass it explicitly to `value()`" note.

use std::cmp::Ordering;
use std::collections::HashMap;

use crate::ast::{BinaryOp, Comprehension, ComprehensionKind, Expr, FStringSegment, Literal, StringOp, UnaryOp};
use crate::error::{Error, Result};
use crate::model::{flow_cmp, PropertyMap, Value};
use crate::registry::Registry;
use crate::scope::Scope;

/// Functions where *any* argument being `Null` propagates to a `Null`
/// result rather than an error — spec.md §7's explicit null-propagation
/// list, closed under Invariant 3's `f(…, null, …) = null`. Kept here
/// (rather than in the registry) since it's a property of *calling
/// convention*, not of any one function's body.
const NULL_PROPAGATING: &[&str] = &[
    "toLower", "toUpper", "trim", "reverse", "split", "replace", "substring", "size", "round",
    "abs", "sqrt", "floor", "ceil", "toInteger", "toFloat", "toString", "keys", "properties",
    "head", "last", "tail", "type", "nodes", "relationships", "stringify", "toJson", "range",
];

/// Canonical key identifying one distinct aggregate call within a single
/// projection list — used by the pipeline's grouping machinery to key its
/// per-group reducers. Two syntactically identical calls (same name, same
/// argument source text) collapse to one reducer per group.
pub fn aggregate_key(name: &str, args: &[Expr]) -> String {
    format!("{name}({:?})", args.iter().map(debug_shape).collect::<Vec<_>>())
}

fn debug_shape(expr: &Expr) -> String {
    format!("{expr:?}")
}

/// Walks `expr` looking for aggregate function calls, keyed the same way
/// `aggregate_key` would key them — used by the WITH/RETURN operations to
/// discover which reducers a group needs before it can finish.
pub fn collect_aggregate_calls(expr: &Expr, registry: &Registry, out: &mut Vec<(String, String, Vec<Expr>)>) {
    match expr {
        Expr::FunctionCall { name, args, .. } if registry.is_aggregate(name) => {
            let key = aggregate_key(name, args);
            if !out.iter().any(|(k, ..)| k == &key) {
                out.push((key, name.clone(), args.clone()));
            }
        }
        Expr::FunctionCall { args, .. } => {
            for a in args {
                collect_aggregate_calls(a, registry, out);
            }
        }
        Expr::BinaryOp { left, right, .. } => {
            collect_aggregate_calls(left, registry, out);
            collect_aggregate_calls(right, registry, out);
        }
        Expr::UnaryOp { expr, .. } => collect_aggregate_calls(expr, registry, out),
        Expr::Property { expr, .. } => collect_aggregate_calls(expr, registry, out),
        Expr::List(items) => {
            for i in items {
                collect_aggregate_calls(i, registry, out);
            }
        }
        Expr::MapLiteral(map) => {
            for v in map.values() {
                collect_aggregate_calls(v, registry, out);
            }
        }
        Expr::Case { operand, whens, else_expr } => {
            if let Some(o) = operand {
                collect_aggregate_calls(o, registry, out);
            }
            for (w, t) in whens {
                collect_aggregate_calls(w, registry, out);
                collect_aggregate_calls(t, registry, out);
            }
            if let Some(e) = else_expr {
                collect_aggregate_calls(e, registry, out);
            }
        }
        Expr::In { expr, list } => {
            collect_aggregate_calls(expr, registry, out);
            collect_aggregate_calls(list, registry, out);
        }
        Expr::IsNull { expr, .. } => collect_aggregate_calls(expr, registry, out),
        Expr::StringOp { left, right, .. } => {
            collect_aggregate_calls(left, registry, out);
            collect_aggregate_calls(right, registry, out);
        }
        Expr::FString(segments) => {
            for seg in segments {
                if let FStringSegment::Expr(e) = seg {
                    collect_aggregate_calls(e, registry, out);
                }
            }
        }
        Expr::Comprehension(c) => {
            collect_aggregate_calls(&c.source, registry, out);
            if let Some(f) = &c.filter {
                collect_aggregate_calls(f, registry, out);
            }
        }
        _ => {}
    }
}

/// Full evaluation context: scope bindings, the function registry, and
/// query parameters. `aggregates` holds the already-finalized values for
/// any aggregate sub-expression in the current projection item's group,
/// keyed by [`aggregate_key`] — populated by the pipeline before calling
/// `value()` on a projection item that contains one.
pub struct EvalContext<'a> {
    pub scope: &'a Scope,
    pub registry: &'a Registry,
    pub params: &'a PropertyMap,
    pub aggregates: Option<&'a HashMap<String, Value>>,
}

pub fn value(expr: &Expr, ctx: &EvalContext) -> Result<Value> {
    match expr {
        Expr::Literal(lit) => Ok(literal_value(lit)),
        Expr::Variable(name) => Ok(ctx.scope.get(name).cloned().unwrap_or(Value::Null)),
        Expr::Parameter(name) => Ok(ctx.params.get(name).cloned().unwrap_or(Value::Null)),
        Expr::Property { expr, key } => {
            let base = value(expr, ctx)?;
            Ok(property_access(&base, key))
        }
        Expr::FunctionCall { name, args, distinct: _ } => eval_call(name, args, ctx),
        Expr::BinaryOp { left, op, right } => eval_binary(*op, left, right, ctx),
        Expr::UnaryOp { op, expr } => eval_unary(*op, expr, ctx),
        Expr::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(value(item, ctx)?);
            }
            Ok(Value::List(out))
        }
        Expr::MapLiteral(map) => {
            let mut out = PropertyMap::new();
            for (k, v) in map {
                out.insert(k.clone(), value(v, ctx)?);
            }
            Ok(Value::Map(out))
        }
        Expr::Case { operand, whens, else_expr } => eval_case(operand, whens, else_expr, ctx),
        Expr::In { expr, list } => eval_in(expr, list, ctx),
        Expr::IsNull { expr, negated } => {
            let v = value(expr, ctx)?;
            Ok(Value::Bool(v.is_null() != *negated))
        }
        Expr::StringOp { left, op, right } => eval_string_op(*op, left, right, ctx),
        Expr::FString(segments) => eval_fstring(segments, ctx),
        Expr::PatternPredicate(_) => Err(Error::ExecutionError(
            "pattern predicates must be evaluated by the matcher, not expr::value".into(),
        )),
        Expr::Comprehension(c) => eval_comprehension(c, ctx),
        Expr::Star => Err(Error::ExecutionError("'*' is only valid as a projection item".into())),
    }
}

/// `all`/`any`/`none`/`single` (spec.md §4.E): iterate `source`, rebinding
/// `variable` each step in a pushed scope frame, test `filter` (or the
/// bound value's own truthiness when there is none), and fold per `kind`.
/// A null `source` propagates to null, matching the rest of the
/// null-propagating contract (§7, Invariant 3).
fn eval_comprehension(c: &Comprehension, ctx: &EvalContext) -> Result<Value> {
    let source = value(&c.source, ctx)?;
    let items = match source {
        Value::Null => return Ok(Value::Null),
        Value::List(items) => items,
        other => {
            return Err(Error::SemanticError(format!(
                "{}() expects a list, got {}",
                c.kind.name(),
                other.type_name()
            )))
        }
    };
    let mut matches = 0usize;
    for item in items {
        let mut local = ctx.scope.clone();
        local.push();
        local.bind(c.variable.clone(), item.clone());
        let local_ctx = EvalContext { scope: &local, registry: ctx.registry, params: ctx.params, aggregates: ctx.aggregates };
        let passes = match &c.filter {
            Some(f) => value(f, &local_ctx)?.is_truthy(),
            None => item.is_truthy(),
        };
        match c.kind {
            ComprehensionKind::All if !passes => return Ok(Value::Bool(false)),
            ComprehensionKind::None if passes => return Ok(Value::Bool(false)),
            ComprehensionKind::Any if passes => return Ok(Value::Bool(true)),
            ComprehensionKind::Single if passes => {
                matches += 1;
                if matches > 1 {
                    return Ok(Value::Bool(false));
                }
            }
            _ => {}
        }
    }
    Ok(Value::Bool(match c.kind {
        ComprehensionKind::All | ComprehensionKind::None => true,
        ComprehensionKind::Any => false,
        ComprehensionKind::Single => matches == 1,
    }))
}

fn literal_value(lit: &Literal) -> Value {
    match lit {
        Literal::Null => Value::Null,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Int(i) => Value::Int(*i),
        Literal::Float(f) => Value::Float(*f),
        Literal::String(s) => Value::String(s.clone()),
    }
}

/// Property access on null yields null (spec.md §3); node/relationship/map
/// values defer to their own reserved-key + passthrough contracts.
fn property_access(base: &Value, key: &str) -> Value {
    match base {
        Value::Null => Value::Null,
        Value::Node(n) => n.get(key).cloned().unwrap_or(Value::Null),
        Value::Relationship(r) => r.get(key).unwrap_or(Value::Null),
        Value::Map(m) => m.get(key).cloned().unwrap_or(Value::Null),
        _ => Value::Null,
    }
}

fn eval_call(name: &str, args: &[Expr], ctx: &EvalContext) -> Result<Value> {
    if ctx.registry.is_aggregate(name) {
        let key = aggregate_key(name, args);
        return ctx
            .aggregates
            .and_then(|map| map.get(&key))
            .cloned()
            .ok_or_else(|| Error::ExecutionError(format!("aggregate '{name}' was not pre-resolved for this row")));
    }
    let mut evaluated = Vec::with_capacity(args.len());
    for a in args {
        evaluated.push(value(a, ctx)?);
    }
    if NULL_PROPAGATING.contains(&name) && evaluated.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }
    if let Some(b) = try_predicate(name, &evaluated, ctx)? {
        return Ok(b);
    }
    ctx.registry.call_scalar(name, &evaluated)
}

fn try_predicate(name: &str, args: &[Value], ctx: &EvalContext) -> Result<Option<Value>> {
    match ctx.registry.lookup(name) {
        Some(crate::registry::FunctionDescriptor::Predicate { .. }) => {
            Ok(Some(Value::Bool(ctx.registry.call_predicate(name, args)?)))
        }
        _ => Ok(None),
    }
}

fn eval_unary(op: UnaryOp, expr: &Expr, ctx: &EvalContext) -> Result<Value> {
    let v = value(expr, ctx)?;
    match op {
        UnaryOp::Not => {
            if v.is_null() {
                Ok(Value::Null)
            } else {
                Ok(Value::Bool(!v.is_truthy()))
            }
        }
        UnaryOp::Negate => match v {
            Value::Null => Ok(Value::Null),
            Value::Int(i) => Ok(Value::Int(-i)),
            Value::Float(f) => Ok(Value::Float(-f)),
            other => Err(Error::SemanticError(format!("cannot negate a value of type {}", other.type_name()))),
        },
    }
}

fn eval_binary(op: BinaryOp, left: &Expr, right: &Expr, ctx: &EvalContext) -> Result<Value> {
    match op {
        BinaryOp::And => return eval_and(left, right, ctx),
        BinaryOp::Or => return eval_or(left, right, ctx),
        BinaryOp::Xor => {
            let l = value(left, ctx)?;
            let r = value(right, ctx)?;
            return Ok(if l.is_null() || r.is_null() {
                Value::Null
            } else {
                Value::Bool(l.is_truthy() ^ r.is_truthy())
            });
        }
        _ => {}
    }

    let l = value(left, ctx)?;
    let r = value(right, ctx)?;

    match op {
        BinaryOp::Add => add(&l, &r),
        BinaryOp::Sub => arithmetic(&l, &r, "-", |a, b| a - b, |a, b| a - b),
        BinaryOp::Mul => arithmetic(&l, &r, "*", |a, b| a * b, |a, b| a * b),
        BinaryOp::Div => divide(&l, &r),
        BinaryOp::Mod => modulo(&l, &r),
        BinaryOp::Pow => power(&l, &r),
        BinaryOp::Eq => Ok(compare_eq(&l, &r, false)),
        BinaryOp::Neq => Ok(compare_eq(&l, &r, true)),
        BinaryOp::Lt => Ok(compare_ord(&l, &r, |o| o == Ordering::Less)),
        BinaryOp::Lte => Ok(compare_ord(&l, &r, |o| o != Ordering::Greater)),
        BinaryOp::Gt => Ok(compare_ord(&l, &r, |o| o == Ordering::Greater)),
        BinaryOp::Gte => Ok(compare_ord(&l, &r, |o| o != Ordering::Less)),
        BinaryOp::RegexMatch => regex_match(&l, &r),
        BinaryOp::And | BinaryOp::Or | BinaryOp::Xor => unreachable!("handled above"),
    }
}

/// Three-valued AND: `false` short-circuits regardless of the other
/// operand being null; otherwise any null operand yields null.
fn eval_and(left: &Expr, right: &Expr, ctx: &EvalContext) -> Result<Value> {
    let l = value(left, ctx)?;
    if !l.is_null() && !l.is_truthy() {
        return Ok(Value::Bool(false));
    }
    let r = value(right, ctx)?;
    if !r.is_null() && !r.is_truthy() {
        return Ok(Value::Bool(false));
    }
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(true))
}

/// Three-valued OR: `true` short-circuits regardless of the other operand
/// being null; otherwise any null operand yields null.
fn eval_or(left: &Expr, right: &Expr, ctx: &EvalContext) -> Result<Value> {
    let l = value(left, ctx)?;
    if !l.is_null() && l.is_truthy() {
        return Ok(Value::Bool(true));
    }
    let r = value(right, ctx)?;
    if !r.is_null() && r.is_truthy() {
        return Ok(Value::Bool(true));
    }
    if l.is_null() || r.is_null() {
        return Ok(Value::Null);
    }
    Ok(Value::Bool(false))
}

/// `+` overloads across numerics, string concatenation, and list
/// concatenation (spec.md §4.D).
fn add(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(a), Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::String(a), b) => Ok(Value::String(format!("{a}{b}"))),
        (a, Value::String(b)) => Ok(Value::String(format!("{a}{b}"))),
        (Value::List(a), Value::List(b)) => {
            let mut out = a.clone();
            out.extend(b.clone());
            Ok(Value::List(out))
        }
        (Value::List(a), b) => {
            let mut out = a.clone();
            out.push(b.clone());
            Ok(Value::List(out))
        }
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a + b)),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            Ok(Value::Float(a.as_float().unwrap() + b.as_float().unwrap()))
        }
        _ => Err(Error::SemanticError(format!(
            "cannot add {} and {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn arithmetic(l: &Value, r: &Value, symbol: &str, int_op: fn(i64, i64) -> i64, float_op: fn(f64, f64) -> f64) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => Ok(Value::Int(int_op(*a, *b))),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            Ok(Value::Float(float_op(a.as_float().unwrap(), b.as_float().unwrap())))
        }
        _ => Err(Error::SemanticError(format!(
            "cannot apply '{symbol}' to {} and {}",
            l.type_name(),
            r.type_name()
        ))),
    }
}

fn divide(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(Error::SemanticError("division by zero".into()));
            }
            Ok(Value::Int(a / b))
        }
        (a, b) if a.is_numeric() && b.is_numeric() => {
            let bf = b.as_float().unwrap();
            if bf == 0.0 {
                return Err(Error::SemanticError("division by zero".into()));
            }
            Ok(Value::Float(a.as_float().unwrap() / bf))
        }
        _ => Err(Error::SemanticError(format!("cannot divide {} by {}", l.type_name(), r.type_name()))),
    }
}

fn modulo(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::Int(a), Value::Int(b)) => {
            if *b == 0 {
                return Err(Error::SemanticError("modulo by zero".into()));
            }
            Ok(Value::Int(a % b))
        }
        (a, b) if a.is_numeric() && b.is_numeric() => Ok(Value::Float(a.as_float().unwrap() % b.as_float().unwrap())),
        _ => Err(Error::SemanticError(format!("cannot modulo {} by {}", l.type_name(), r.type_name()))),
    }
}

fn power(l: &Value, r: &Value) -> Result<Value> {
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (a, b) if a.is_numeric() && b.is_numeric() => {
            Ok(Value::Float(a.as_float().unwrap().powf(b.as_float().unwrap())))
        }
        _ => Err(Error::SemanticError(format!("cannot exponentiate {} by {}", l.type_name(), r.type_name()))),
    }
}

fn compare_eq(l: &Value, r: &Value, negate: bool) -> Value {
    if l.is_null() || r.is_null() {
        return Value::Null;
    }
    let eq = l.structural_eq(r);
    Value::Bool(eq != negate)
}

fn compare_ord(l: &Value, r: &Value, matches: fn(Ordering) -> bool) -> Value {
    match flow_cmp(l, r) {
        Some(ordering) => Value::Bool(matches(ordering)),
        None => Value::Null,
    }
}

fn regex_match(l: &Value, r: &Value) -> Result<Value> {
    // FlowQuery's regex engine is out of scope here; `=~` degrades to an
    // exact-match fallback, matching `STRING CONTAINS`-style behavior for
    // the common case of literal patterns.
    match (l, r) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(a), Value::String(b)) => Ok(Value::Bool(a == b)),
        _ => Err(Error::SemanticError("=~ requires two strings".into())),
    }
}

fn eval_case(
    operand: &Option<Box<Expr>>,
    whens: &[(Expr, Expr)],
    else_expr: &Option<Box<Expr>>,
    ctx: &EvalContext,
) -> Result<Value> {
    match operand {
        Some(operand) => {
            let subject = value(operand, ctx)?;
            for (when, then) in whens {
                let candidate = value(when, ctx)?;
                if compare_eq(&subject, &candidate, false) == Value::Bool(true) {
                    return value(then, ctx);
                }
            }
        }
        None => {
            for (when, then) in whens {
                let cond = value(when, ctx)?;
                if cond.is_truthy() {
                    return value(then, ctx);
                }
            }
        }
    }
    match else_expr {
        Some(e) => value(e, ctx),
        None => Ok(Value::Null),
    }
}

fn eval_in(expr: &Expr, list: &Expr, ctx: &EvalContext) -> Result<Value> {
    let needle = value(expr, ctx)?;
    let haystack = value(list, ctx)?;
    if needle.is_null() {
        return Ok(Value::Null);
    }
    match haystack {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(Value::Bool(items.iter().any(|v| v.structural_eq(&needle)))),
        other => Err(Error::SemanticError(format!("IN requires a list, got {}", other.type_name()))),
    }
}

fn eval_string_op(op: StringOp, left: &Expr, right: &Expr, ctx: &EvalContext) -> Result<Value> {
    let l = value(left, ctx)?;
    let r = value(right, ctx)?;
    let (Value::String(a), Value::String(b)) = (&l, &r) else {
        if l.is_null() || r.is_null() {
            return Ok(Value::Null);
        }
        return Err(Error::SemanticError("string operators require two strings".into()));
    };
    Ok(Value::Bool(match op {
        StringOp::StartsWith => a.starts_with(b.as_str()),
        StringOp::EndsWith => a.ends_with(b.as_str()),
        StringOp::Contains => a.contains(b.as_str()),
    }))
}

fn eval_fstring(segments: &[FStringSegment], ctx: &EvalContext) -> Result<Value> {
    let mut out = String::new();
    for segment in segments {
        match segment {
            FStringSegment::Str(s) => out.push_str(s),
            FStringSegment::Expr(e) => {
                let v = value(e, ctx)?;
                if !v.is_null() {
                    out.push_str(&v.to_string());
                }
            }
        }
    }
    Ok(Value::String(out))
}
