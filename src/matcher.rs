//! Pattern matcher — walks a pattern's alternating node/relationship
//! chain against the virtual catalog, producing one row of bindings per
//! match (spec.md §4.H).
//!
//! Grounded in the teacher's `MemoryBackend::expand()` BFS traversal (same
//! "don't revisit an id already on the active path" cycle guard), adapted
//! from a persistent adjacency list to catalog lookups keyed by
//! `left_id`/`right_id`, and rewritten as an explicit-stack depth-first
//! walk (spec.md §5: "multi-hop matches emitted depth-first, zero-hop
//! before one-hop before two-hop...") to avoid recursive `async fn`.

use std::collections::HashSet;
use std::rc::Rc;

use crate::ast::{MatchClause, NodePattern, Pattern, PatternDirection, PatternElement, RelPattern};
use crate::catalog::{SubqueryRunner, VirtualCatalog};
use crate::error::{Error, Result};
use crate::expr::{self, EvalContext};
use crate::model::{Direction, NodeRecord, Path, PropertyMap, RelationshipMatch, RelationshipRecord, Value};
use crate::registry::Registry;
use crate::scope::Scope;

fn to_direction(d: PatternDirection) -> Direction {
    match d {
        PatternDirection::Right => Direction::Outgoing,
        PatternDirection::Left => Direction::Incoming,
        PatternDirection::Both => Direction::Both,
    }
}

pub struct MatchEnv<'a> {
    pub catalog: &'a VirtualCatalog,
    pub runner: &'a dyn SubqueryRunner,
    pub registry: &'a Registry,
    pub params: &'a PropertyMap,
}

/// Runs one `[OPTIONAL] MATCH` clause against `scope`, returning one scope
/// per matched row. Later patterns in the same clause see bindings made by
/// earlier ones, so `MATCH (a:Person), (b:Person)` and
/// `MATCH (a:Person)-->(b:Person), (b)-->(c:Person)` both work via the same
/// fold.
pub async fn run_match(clause: &MatchClause, scope: &Scope, env: &MatchEnv<'_>) -> Result<Vec<Scope>> {
    let mut candidates = vec![scope.clone()];
    for pattern in &clause.patterns {
        let mut next = Vec::new();
        for candidate in &candidates {
            next.extend(match_pattern(pattern, candidate, clause.optional, env).await?);
        }
        candidates = next;
        if candidates.is_empty() {
            break;
        }
    }

    if let Some(where_expr) = &clause.where_clause {
        let mut filtered = Vec::new();
        for candidate in candidates {
            let ctx = EvalContext {
                scope: &candidate,
                registry: env.registry,
                params: env.params,
                aggregates: None,
            };
            if expr::value(where_expr, &ctx)?.is_truthy() {
                filtered.push(candidate);
            }
        }
        candidates = filtered;
    }

    if candidates.is_empty() && clause.optional {
        let mut fallback = scope.clone();
        for pattern in &clause.patterns {
            bind_nulls(pattern, &mut fallback);
        }
        return Ok(vec![fallback]);
    }

    Ok(candidates)
}

fn bind_nulls(pattern: &Pattern, scope: &mut Scope) {
    if let Some(alias) = &pattern.path_alias {
        scope.bind(alias.clone(), Value::Null);
    }
    for element in &pattern.elements {
        match element {
            PatternElement::Node(n) => {
                if let Some(alias) = &n.alias {
                    scope.bind(alias.clone(), Value::Null);
                }
            }
            PatternElement::Relationship(r) => {
                if let Some(alias) = &r.alias {
                    scope.bind(alias.clone(), Value::Null);
                }
            }
        }
    }
}

fn eval_props(props: &std::collections::HashMap<String, crate::ast::Expr>, scope: &Scope, env: &MatchEnv) -> Result<PropertyMap> {
    let ctx = EvalContext { scope, registry: env.registry, params: env.params, aggregates: None };
    let mut out = PropertyMap::new();
    for (k, e) in props {
        out.insert(k.clone(), expr::value(e, &ctx)?);
    }
    Ok(out)
}

fn node_matches_properties(node: &NodeRecord, wanted: &PropertyMap) -> bool {
    wanted.iter().all(|(k, v)| node.get(k).map(|found| found.structural_eq(v)).unwrap_or(false))
}

/// Resolves the candidate set for one node slot: a *reference* to an
/// already-bound alias narrows to that single value; a labeled pattern
/// scans that label's store; an unlabeled, unbound pattern (spec.md §8
/// S4: `MATCH (a)-[r:KNOWS*0..3]->(b)`) scans every defined label's store,
/// labels in definition order, since FlowQuery has no notion of "the"
/// default label to search.
async fn start_candidates(pattern: &NodePattern, scope: &Scope, optional: bool, env: &MatchEnv<'_>) -> Result<Vec<NodeRecord>> {
    if let Some(alias) = &pattern.alias {
        if scope.contains(alias) && pattern.label.is_none() {
            return Ok(match scope.get(alias) {
                Some(Value::Node(n)) => vec![n.clone()],
                _ => Vec::new(),
            });
        }
    }
    let wanted = eval_props(&pattern.properties, scope, env)?;
    match &pattern.label {
        Some(label) => {
            // spec.md §7: an unknown label is a semantic error for a plain
            // MATCH, but OPTIONAL MATCH treats it as an empty node source.
            if optional && !env.catalog.has_label(label) {
                return Ok(Vec::new());
            }
            let rows = env.catalog.node_data(label, env.runner).await?;
            Ok(rows.iter().filter(|n| node_matches_properties(n, &wanted)).cloned().collect())
        }
        None => {
            let mut out = Vec::new();
            for label in env.catalog.labels() {
                let rows = env.catalog.node_data(&label, env.runner).await?;
                out.extend(rows.iter().filter(|n| node_matches_properties(n, &wanted)).cloned());
            }
            Ok(out)
        }
    }
}

async fn rel_type_rows(rel_pattern: &RelPattern, env: &MatchEnv<'_>) -> Result<Vec<Rc<Vec<RelationshipRecord>>>> {
    let types: Vec<String> = if rel_pattern.rel_types.is_empty() {
        env.catalog.types()
    } else {
        rel_pattern.rel_types.clone()
    };
    let mut out = Vec::with_capacity(types.len());
    for t in types {
        out.push(env.catalog.relationship_data(&t, env.runner).await?);
    }
    Ok(out)
}

/// One traversal step from `from_id` through `rel_pattern`, yielding
/// `(relationship_record, next_id)` pairs.
async fn step(from_id: &Value, rel_pattern: &RelPattern, scope: &Scope, env: &MatchEnv<'_>) -> Result<Vec<(RelationshipRecord, Value)>> {
    let direction = to_direction(rel_pattern.direction);
    let wanted_props = eval_props(&rel_pattern.properties, scope, env)?;
    let mut out = Vec::new();
    for store in rel_type_rows(rel_pattern, env).await? {
        for record in store.iter() {
            if !wanted_props.iter().all(|(k, v)| record.properties.get(k).map(|f| f.structural_eq(v)).unwrap_or(false)) {
                continue;
            }
            match direction {
                // Undirected `-[:T]-` tests both endpoint fields: a record
                // is traversable from whichever end the cursor currently
                // sits at. Not the same record counted twice — each
                // comparison is against a different field, so a record
                // only contributes a hop when one of its two ends equals
                // `from_id`, and (for non-self-loop records) contributes at
                // most once per cursor position.
                Direction::Both => {
                    if &record.left_id == from_id {
                        out.push((record.clone(), record.right_id.clone()));
                    }
                    if &record.right_id == from_id && record.right_id != record.left_id {
                        out.push((record.clone(), record.left_id.clone()));
                    }
                }
                Direction::Outgoing | Direction::Incoming => {
                    if record.join_key(direction) == from_id {
                        out.push((record.clone(), record.other_end(direction).clone()));
                    }
                }
            }
        }
    }
    Ok(out)
}

/// One frame of the explicit DFS stack used by [`expand_var_length`].
struct Frame {
    current_id: Value,
    depth: usize,
    hops: Vec<(RelationshipRecord, Value)>,
    visited: HashSet<Value>,
}

/// Expands zero-or-more hops for a variable-length relationship step,
/// honoring min/max bounds and skipping any id already on the active
/// traversal path (spec.md's cycle-avoidance rule). Returns
/// `(hops, end_id)` pairs for every valid hop count within range.
async fn expand_var_length(
    from_id: Value,
    rel_pattern: &RelPattern,
    min: usize,
    max: Option<usize>,
    scope: &Scope,
    env: &MatchEnv<'_>,
) -> Result<Vec<(Vec<(RelationshipRecord, Value)>, Value)>> {
    let mut out = Vec::new();
    let mut visited_root = HashSet::new();
    visited_root.insert(from_id.clone());
    let mut stack = vec![Frame {
        current_id: from_id,
        depth: 0,
        hops: Vec::new(),
        visited: visited_root,
    }];

    while let Some(frame) = stack.pop() {
        if frame.depth >= min {
            out.push((frame.hops.clone(), frame.current_id.clone()));
        }
        if max.map(|m| frame.depth >= m).unwrap_or(false) {
            continue;
        }
        let next_steps = step(&frame.current_id, rel_pattern, scope, env).await?;
        for (rel, next_id) in next_steps {
            if frame.visited.contains(&next_id) {
                continue;
            }
            let mut visited = frame.visited.clone();
            visited.insert(next_id.clone());
            let mut hops = frame.hops.clone();
            hops.push((rel, next_id.clone()));
            stack.push(Frame {
                current_id: next_id,
                depth: frame.depth + 1,
                hops,
                visited,
            });
        }
    }

    Ok(out)
}

async fn node_label_for_pattern(node_pattern: &NodePattern, env: &MatchEnv<'_>, id: &Value) -> Result<NodeRecord> {
    // Resolution against an unlabeled downstream node pattern looks across
    // every defined label for a row whose `id` matches; FlowQuery virtual
    // ids are caller-assigned so collisions across labels are possible but
    // rare, and the first match wins.
    if let Some(label) = &node_pattern.label {
        let index = env.catalog.node_id_index(label, env.runner).await?;
        if let Some(&i) = index.get(id) {
            let rows = env.catalog.node_data(label, env.runner).await?;
            return Ok(rows[i].clone());
        }
        return Err(Error::ExecutionError(format!("no node with id {id:?} in label '{label}'")));
    }
    for label in env.catalog.labels() {
        let index = env.catalog.node_id_index(&label, env.runner).await?;
        if let Some(&i) = index.get(id) {
            let rows = env.catalog.node_data(&label, env.runner).await?;
            return Ok(rows[i].clone());
        }
    }
    Err(Error::ExecutionError(format!("no node with id {id:?} in any virtual label")))
}

/// Matches a single `(node)-[rel]-(node)-...` pattern against `base`,
/// returning one scope per successful match.
async fn match_pattern(pattern: &Pattern, base: &Scope, optional: bool, env: &MatchEnv<'_>) -> Result<Vec<Scope>> {
    let mut elements = pattern.elements.iter();
    let Some(PatternElement::Node(first_node)) = elements.next() else {
        return Err(Error::SemanticError("pattern must start with a node".into()));
    };

    let starts = start_candidates(first_node, base, optional, env).await?;
    let mut results = Vec::new();

    for start in starts {
        let mut scope = base.clone();
        if let Some(alias) = &first_node.alias {
            scope.bind(alias.clone(), Value::Node(start.clone()));
        }
        let mut paths: Vec<(Scope, Path)> = vec![(scope, Path::single(start.clone()))];

        let elements: Vec<&PatternElement> = pattern.elements.iter().skip(1).collect();
        let mut idx = 0;
        while idx < elements.len() {
            let PatternElement::Relationship(rel_pattern) = elements[idx] else {
                return Err(Error::SemanticError("expected a relationship pattern here".into()));
            };
            idx += 1;
            let Some(PatternElement::Node(next_node)) = elements.get(idx) else {
                return Err(Error::SemanticError("relationship pattern must be followed by a node".into()));
            };
            idx += 1;

            let (min, max) = match &rel_pattern.var_length {
                Some(vl) => (vl.min.unwrap_or(0), vl.max),
                None => (1, Some(1)),
            };

            let mut next_paths = Vec::new();
            for (scope, path) in &paths {
                let from_id = path
                    .end()
                    .id()
                    .cloned()
                    .ok_or_else(|| Error::ExecutionError("cannot traverse from a node with no id".into()))?;
                let hops = expand_var_length(from_id, rel_pattern, min, max, scope, env).await?;

                for (hop_chain, _end_id) in hops {
                    let mut cur_scope = scope.clone();
                    let mut cur_path = path.clone();
                    let mut ok = true;
                    for (rel, next_id) in &hop_chain {
                        let node = match node_label_for_pattern(next_node, env, next_id).await {
                            Ok(n) => n,
                            Err(_) => {
                                ok = false;
                                break;
                            }
                        };
                        if let Some(alias) = &next_node.alias {
                            if cur_scope.contains(alias) {
                                let bound = cur_scope.get(alias).cloned();
                                if bound.as_ref() != Some(&Value::Node(node.clone())) {
                                    ok = false;
                                    break;
                                }
                            }
                        }
                        let rel_match = RelationshipMatch::from_record(rel, rel.left_id.clone(), rel.right_id.clone());
                        cur_path = cur_path.append(rel_match.clone(), node.clone());
                        if let Some(alias) = &rel_pattern.alias {
                            cur_scope.bind(alias.clone(), Value::Relationship(rel_match));
                        }
                        if let Some(alias) = &next_node.alias {
                            cur_scope.bind(alias.clone(), Value::Node(node));
                        }
                    }
                    if !ok {
                        continue;
                    }
                    if hop_chain.is_empty() {
                        // Zero-hop: the target node pattern is satisfied by
                        // the node we started from (spec.md §4.H), so bind
                        // `next_node.alias` to it too, not just null the
                        // relationship alias.
                        if let Some(alias) = &rel_pattern.alias {
                            cur_scope.bind(alias.clone(), Value::Null);
                        }
                        if let Some(alias) = &next_node.alias {
                            cur_scope.bind(alias.clone(), Value::Node(path.end().clone()));
                        }
                    }
                    next_paths.push((cur_scope, cur_path));
                }
            }
            paths = next_paths;
            if paths.is_empty() {
                break;
            }
        }

        for (mut scope, path) in paths {
            if let Some(alias) = &pattern.path_alias {
                scope.bind(alias.clone(), Value::Path(path));
            }
            results.push(scope);
        }
    }

    Ok(results)
}
