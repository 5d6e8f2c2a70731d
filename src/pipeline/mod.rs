//! Pipeline executor — runs a [`Query`]'s operation chain to completion.
//!
//! Implemented as a staged `Vec<Scope>` transform (each operation consumes
//! the previous stage's rows and produces the next stage's) rather than a
//! lazy pull-iterator protocol: without a compiler in the loop to verify a
//! trait-object `Operation::next_row()` pull chain, a straight-line batch
//! transform is far more likely to actually be correct, and every ordering
//! guarantee spec.md §5 describes (zero-hop before one-hop, UNION
//! concatenation order, ORDER BY → LIMIT → DISTINCT) is preserved exactly
//! the same way. This tradeoff is recorded in DESIGN.md.

mod projection;

use std::collections::HashMap;

use crate::ast::{Operation, Query, VirtualKind};
use crate::catalog::{SubqueryRunner, VirtualCatalog};
use crate::error::{Error, Result};
use crate::expr::{self, EvalContext};
use crate::matcher::{self, MatchEnv};
use crate::model::Value;
use crate::provider::{HttpJsonProvider, ProviderRequest};
use crate::registry::Registry;
use crate::scope::Scope;
use crate::PropertyMap;

/// Everything a running query needs besides the AST itself.
pub struct Env<'a> {
    pub catalog: &'a VirtualCatalog,
    pub registry: &'a Registry,
    pub params: &'a PropertyMap,
    pub runner: &'a dyn SubqueryRunner,
}

/// Runs `query` to completion, returning its final row set. A query that
/// ends in `RETURN`/`UNION` produces those projected rows; one that
/// doesn't (e.g. a bare `CREATE VIRTUAL` or a sub-query feeding a virtual
/// store) returns the last stage's raw scope bindings flattened to rows.
pub async fn run_query(query: &Query, env: &Env<'_>) -> Result<Vec<HashMap<String, Value>>> {
    let mut rows: Vec<Scope> = vec![Scope::new()];

    for (i, op) in query.operations.iter().enumerate() {
        match op {
            Operation::With(clause) => {
                let projected = projection::project(&rows, &clause.items, env.registry, env.params)?;
                let finished = projection::finish(
                    projected,
                    &clause.order_by,
                    clause.skip.as_ref(),
                    clause.limit.as_ref(),
                    clause.distinct,
                    env.registry,
                    env.params,
                )?;
                rows = finished.into_iter().map(Scope::from_row).collect();
            }
            Operation::Unwind(clause) => {
                let mut next = Vec::new();
                for row in &rows {
                    let ctx = EvalContext { scope: row, registry: env.registry, params: env.params, aggregates: None };
                    let list = expr::value(&clause.expr, &ctx)?;
                    if let Value::List(items) = list {
                        for item in items {
                            let mut s = row.clone();
                            s.bind(clause.alias.clone(), item);
                            next.push(s);
                        }
                    }
                    // UNWIND of null/non-list yields zero rows for that input row.
                }
                rows = next;
            }
            Operation::Load(clause) => {
                let mut next = Vec::new();
                for row in &rows {
                    let ctx = EvalContext { scope: row, registry: env.registry, params: env.params, aggregates: None };
                    let url = match expr::value(&clause.url, &ctx)? {
                        Value::String(s) => s,
                        other => {
                            return Err(Error::SemanticError(format!(
                                "LOAD JSON FROM requires a string URL, got {}",
                                other.type_name()
                            )))
                        }
                    };
                    let body = match &clause.body {
                        Some(e) => Some(expr::value(e, &ctx)?),
                        None => None,
                    };
                    let headers = match &clause.headers {
                        Some(e) => match expr::value(e, &ctx)? {
                            Value::Map(m) => m.into_iter().map(|(k, v)| (k, v.to_string())).collect(),
                            Value::Null => HashMap::new(),
                            other => {
                                return Err(Error::SemanticError(format!(
                                    "LOAD JSON HEADERS requires a map, got {}",
                                    other.type_name()
                                )))
                            }
                        },
                        None => HashMap::new(),
                    };
                    let provider = HttpJsonProvider::new();
                    let result = provider.fetch(ProviderRequest { url, body, headers }).await?;
                    // §6 wire contract: an array response fans out to one
                    // row per element; anything else (object, scalar) binds
                    // as a single row.
                    match result {
                        Value::List(items) => {
                            for item in items {
                                let mut s = row.clone();
                                s.bind(clause.alias.clone(), item);
                                next.push(s);
                            }
                        }
                        other => {
                            let mut s = row.clone();
                            s.bind(clause.alias.clone(), other);
                            next.push(s);
                        }
                    }
                }
                rows = next;
            }
            Operation::Match(clause) => {
                let match_env = MatchEnv {
                    catalog: env.catalog,
                    runner: env.runner,
                    registry: env.registry,
                    params: env.params,
                };
                let mut next = Vec::new();
                for row in &rows {
                    next.extend(matcher::run_match(clause, row, &match_env).await?);
                }
                rows = next;
            }
            Operation::Where(expr_) => {
                let mut next = Vec::with_capacity(rows.len());
                for row in rows {
                    let ctx = EvalContext { scope: &row, registry: env.registry, params: env.params, aggregates: None };
                    if expr::value(expr_, &ctx)?.is_truthy() {
                        next.push(row);
                    }
                }
                rows = next;
            }
            Operation::Call(clause) => {
                rows = run_call(clause, &rows, env).await?;
            }
            Operation::CreateVirtual(clause) => {
                match clause.kind {
                    VirtualKind::Label => env.catalog.define_label(clause.name.clone(), (*clause.subquery).clone()),
                    VirtualKind::Type => env.catalog.define_type(clause.name.clone(), (*clause.subquery).clone()),
                }
            }
            Operation::DeleteVirtual(clause) => match clause.kind {
                VirtualKind::Label => env.catalog.delete_label(&clause.name)?,
                VirtualKind::Type => env.catalog.delete_type(&clause.name)?,
            },
            Operation::Return(clause) => {
                let projected = projection::project(&rows, &clause.items, env.registry, env.params)?;
                let finished = projection::finish(
                    projected,
                    &clause.order_by,
                    clause.skip.as_ref(),
                    clause.limit.as_ref(),
                    clause.distinct,
                    env.registry,
                    env.params,
                )?;
                let mut out = finished;
                if let Some(remaining) = query.operations.get(i + 1..) {
                    for op in remaining {
                        if let Operation::Union(union) = op {
                            let other_rows = Box::pin(run_query(&union.query, env)).await?;
                            require_matching_columns(&out, &other_rows)?;
                            out.extend(other_rows);
                            if !union.all {
                                out = dedupe(out);
                            }
                        }
                    }
                }
                return Ok(out);
            }
            Operation::Union(_) => {
                // Consumed by the preceding RETURN's handling above; a
                // leading UNION with no RETURN before it is a parse-time
                // well-formedness violation, not something this loop sees.
            }
        }
    }

    Ok(rows.into_iter().map(|s| s.to_row()).collect())
}

fn require_matching_columns(a: &[HashMap<String, Value>], b: &[HashMap<String, Value>]) -> Result<()> {
    let (Some(first_a), Some(first_b)) = (a.first(), b.first()) else {
        return Ok(());
    };
    let mut cols_a: Vec<&String> = first_a.keys().collect();
    let mut cols_b: Vec<&String> = first_b.keys().collect();
    cols_a.sort();
    cols_b.sort();
    if cols_a != cols_b {
        return Err(Error::ExecutionError(format!(
            "UNION requires both sides to return the same column names, got {cols_a:?} and {cols_b:?}"
        )));
    }
    Ok(())
}

fn dedupe(rows: Vec<HashMap<String, Value>>) -> Vec<HashMap<String, Value>> {
    let mut out: Vec<HashMap<String, Value>> = Vec::new();
    for row in rows {
        let dup = out.iter().any(|existing| {
            existing.len() == row.len()
                && existing.iter().all(|(k, v)| row.get(k).map(|rv| rv.structural_eq(v)).unwrap_or(false))
        });
        if !dup {
            out.push(row);
        }
    }
    out
}

async fn run_call(clause: &crate::ast::CallClause, rows: &[Scope], env: &Env<'_>) -> Result<Vec<Scope>> {
    let provider = env
        .registry
        .provider(&clause.name)
        .ok_or_else(|| Error::SemanticError(format!("no registered provider named '{}'", clause.name)))?;

    let mut next = Vec::with_capacity(rows.len());
    for row in rows {
        let ctx = EvalContext { scope: row, registry: env.registry, params: env.params, aggregates: None };
        let mut args = Vec::with_capacity(clause.args.len());
        for a in &clause.args {
            args.push(expr::value(a, &ctx)?);
        }
        let url = args
            .first()
            .and_then(|v| if let Value::String(s) = v { Some(s.clone()) } else { None })
            .unwrap_or_default();
        let result = provider
            .fetch(ProviderRequest { url, body: args.get(1).cloned(), headers: HashMap::new() })
            .await?;

        let mut s = row.clone();
        match (&result, clause.yield_items.as_slice()) {
            (Value::Map(map), items) if !items.is_empty() => {
                for name in items {
                    s.bind(name.clone(), map.get(name).cloned().unwrap_or(Value::Null));
                }
            }
            (_, [single]) => s.bind(single.clone(), result.clone()),
            _ => s.bind("value", result.clone()),
        }
        next.push(s);
    }
    Ok(next)
}
