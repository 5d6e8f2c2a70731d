//! Shared projection logic for `WITH` and `RETURN` — both clauses share
//! the same item/DISTINCT/ORDER BY/SKIP/LIMIT shape (spec.md §4.I), down
//! to the unusual lifecycle order: accumulate every row, sort by ORDER BY
//! keys (which never appear in the output), slice by SKIP/LIMIT, and only
//! *then* de-duplicate for DISTINCT.

use std::collections::HashMap;

use crate::ast::{Expr, OrderExpr, ProjectionItem};
use crate::error::Result;
use crate::expr::{self, collect_aggregate_calls, EvalContext};
use crate::model::Value;
use crate::registry::Registry;
use crate::scope::Scope;
use crate::PropertyMap;

/// Falls back to a readable name when a projection item has no explicit
/// `AS alias` — `n` for a bare variable, `n.key` for a property access,
/// and the function name for a call, matching what a reader would type if
/// asked to name the column themselves.
fn default_alias(expr: &Expr) -> String {
    match expr {
        Expr::Variable(name) => name.clone(),
        Expr::Property { expr, key } => format!("{}.{key}", default_alias(expr)),
        Expr::FunctionCall { name, .. } => name.clone(),
        Expr::Parameter(name) => format!("${name}"),
        _ => "expr".to_string(),
    }
}

fn item_name(item: &ProjectionItem) -> String {
    item.alias.clone().unwrap_or_else(|| default_alias(&item.expr))
}

/// Projects every row in `rows`, grouping by whichever items don't contain
/// an aggregate call if at least one item does (spec.md §4.C/§4.I).
pub fn project(
    rows: &[Scope],
    items: &[ProjectionItem],
    registry: &Registry,
    params: &PropertyMap,
) -> Result<Vec<HashMap<String, Value>>> {
    let mut has_aggregate = false;
    for item in items {
        let mut found = Vec::new();
        collect_aggregate_calls(&item.expr, registry, &mut found);
        if !found.is_empty() {
            has_aggregate = true;
            break;
        }
    }

    if !has_aggregate {
        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(project_row(row, items, registry, params, None)?);
        }
        return Ok(out);
    }

    let key_items: Vec<&ProjectionItem> = items
        .iter()
        .filter(|item| {
            let mut found = Vec::new();
            collect_aggregate_calls(&item.expr, registry, &mut found);
            found.is_empty()
        })
        .collect();

    let mut groups: Vec<(Vec<Value>, Vec<Scope>)> = Vec::new();
    for row in rows {
        let ctx = EvalContext { scope: row, registry, params, aggregates: None };
        let mut key = Vec::with_capacity(key_items.len());
        for item in &key_items {
            key.push(expr::value(&item.expr, &ctx)?);
        }
        match groups.iter_mut().find(|(k, _)| keys_equal(k, &key)) {
            Some((_, members)) => members.push(row.clone()),
            None => groups.push((key, vec![row.clone()])),
        }
    }

    if groups.is_empty() {
        // `count()` etc. over zero input rows still produce one output row
        // (spec.md §7's empty-collection rules apply per-group, and the
        // whole-input-empty case is exactly one group of zero rows).
        groups.push((Vec::new(), Vec::new()));
    }

    let mut out = Vec::with_capacity(groups.len());
    for (_, members) in &groups {
        let mut all_calls = Vec::new();
        for item in items {
            collect_aggregate_calls(&item.expr, registry, &mut all_calls);
        }
        let mut finalized = HashMap::new();
        for (key, name, args) in &all_calls {
            let mut reducer = registry.new_reducer(name, args.len())?;
            for member in members {
                let ctx = EvalContext { scope: member, registry, params, aggregates: None };
                let mut values = Vec::with_capacity(args.len());
                for a in args {
                    values.push(expr::value(a, &ctx)?);
                }
                reducer.reduce(&values)?;
            }
            finalized.insert(key.clone(), reducer.finalize());
        }
        let representative = members.first().cloned().unwrap_or_default();
        out.push(project_row(&representative, items, registry, params, Some(&finalized))?);
    }

    Ok(out)
}

fn keys_equal(a: &[Value], b: &[Value]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.structural_eq(y))
}

fn project_row(
    row: &Scope,
    items: &[ProjectionItem],
    registry: &Registry,
    params: &PropertyMap,
    aggregates: Option<&HashMap<String, Value>>,
) -> Result<HashMap<String, Value>> {
    let ctx = EvalContext { scope: row, registry, params, aggregates };
    let mut out = HashMap::new();
    for item in items {
        if matches!(item.expr, Expr::Star) {
            out.extend(row.to_row());
            continue;
        }
        out.insert(item_name(item), expr::value(&item.expr, &ctx)?);
    }
    Ok(out)
}

/// Applies the ORDER BY → SKIP/LIMIT → DISTINCT lifecycle to an already
/// projected row set.
pub fn finish(
    mut rows: Vec<HashMap<String, Value>>,
    order_by: &[OrderExpr],
    skip: Option<&Expr>,
    limit: Option<&Expr>,
    distinct: bool,
    registry: &Registry,
    params: &PropertyMap,
) -> Result<Vec<HashMap<String, Value>>> {
    if !order_by.is_empty() {
        let mut keyed: Vec<(Vec<Value>, HashMap<String, Value>)> = Vec::with_capacity(rows.len());
        for row in rows {
            let scope = Scope::from_row(row.clone());
            let ctx = EvalContext { scope: &scope, registry, params, aggregates: None };
            let mut key = Vec::with_capacity(order_by.len());
            for o in order_by {
                key.push(expr::value(&o.expr, &ctx)?);
            }
            keyed.push((key, row));
        }
        keyed.sort_by(|(a, _), (b, _)| {
            for (i, o) in order_by.iter().enumerate() {
                let ord = crate::model::flow_cmp(&a[i], &b[i]).unwrap_or(std::cmp::Ordering::Equal);
                let ord = if o.ascending { ord } else { ord.reverse() };
                if ord != std::cmp::Ordering::Equal {
                    return ord;
                }
            }
            std::cmp::Ordering::Equal
        });
        rows = keyed.into_iter().map(|(_, row)| row).collect();
    }

    let dummy_scope = Scope::new();
    let skip_n = match skip {
        Some(e) => {
            let ctx = EvalContext { scope: &dummy_scope, registry, params, aggregates: None };
            expr::value(e, &ctx)?.as_int().unwrap_or(0).max(0) as usize
        }
        None => 0,
    };
    let limit_n = match limit {
        Some(e) => {
            let ctx = EvalContext { scope: &dummy_scope, registry, params, aggregates: None };
            Some(expr::value(e, &ctx)?.as_int().unwrap_or(0).max(0) as usize)
        }
        None => None,
    };

    rows = rows.into_iter().skip(skip_n).collect();
    if let Some(n) = limit_n {
        rows.truncate(n);
    }

    if distinct {
        let mut seen: Vec<HashMap<String, Value>> = Vec::new();
        rows.retain(|row| {
            let dup = seen.iter().any(|s| rows_equal(s, row));
            if !dup {
                seen.push(row.clone());
            }
            !dup
        });
    }

    Ok(rows)
}

fn rows_equal(a: &HashMap<String, Value>, b: &HashMap<String, Value>) -> bool {
    a.len() == b.len() && a.iter().all(|(k, v)| b.get(k).map(|bv| bv.structural_eq(v)).unwrap_or(false))
}
