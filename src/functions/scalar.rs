//! Scalar built-ins. Most propagate `Null` when their first argument is
//! `Null` (spec.md §7's null-propagation contract); functions that
//! legitimately accept null (`coalesce`, `type`, `labels`, `keys`) are the
//! explicit exceptions, called out per function below.

use crate::error::{Error, Result};
use crate::model::{PropertyMap, Value};

fn type_error(function: &str, got: &Value) -> Error {
    Error::SemanticError(format!("{function}() does not accept a value of type {}", got.type_name()))
}

pub fn to_lower(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.to_lowercase())),
        other => Err(type_error("toLower", other)),
    }
}

pub fn to_upper(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.to_uppercase())),
        other => Err(type_error("toUpper", other)),
    }
}

pub fn trim(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.trim().to_string())),
        other => Err(type_error("trim", other)),
    }
}

pub fn reverse(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::String(s.chars().rev().collect())),
        Value::List(items) => {
            let mut items = items.clone();
            items.reverse();
            Ok(Value::List(items))
        }
        other => Err(type_error("reverse", other)),
    }
}

pub fn split(args: &[Value]) -> Result<Value> {
    match (&args[0], &args[1]) {
        (Value::Null, _) | (_, Value::Null) => Ok(Value::Null),
        (Value::String(s), Value::String(sep)) => Ok(Value::List(
            s.split(sep.as_str()).map(|part| Value::String(part.to_string())).collect(),
        )),
        (other, _) => Err(type_error("split", other)),
    }
}

pub fn replace(args: &[Value]) -> Result<Value> {
    match (&args[0], &args[1], &args[2]) {
        (Value::Null, _, _) => Ok(Value::Null),
        (Value::String(s), Value::String(from), Value::String(to)) => {
            Ok(Value::String(s.replace(from.as_str(), to)))
        }
        (other, _, _) => Err(type_error("replace", other)),
    }
}

pub fn substring(args: &[Value]) -> Result<Value> {
    let s = match &args[0] {
        Value::Null => return Ok(Value::Null),
        Value::String(s) => s,
        other => return Err(type_error("substring", other)),
    };
    let chars: Vec<char> = s.chars().collect();
    let start = args[1].as_int().unwrap_or(0).max(0) as usize;
    let length = args
        .get(2)
        .and_then(Value::as_int)
        .map(|n| n.max(0) as usize)
        .unwrap_or(chars.len().saturating_sub(start));
    let end = (start + length).min(chars.len());
    let start = start.min(chars.len());
    Ok(Value::String(chars[start..end].iter().collect()))
}

pub fn size(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::String(s) => Ok(Value::Int(s.chars().count() as i64)),
        Value::List(items) => Ok(Value::Int(items.len() as i64)),
        Value::Map(map) => Ok(Value::Int(map.len() as i64)),
        other => Err(type_error("size", other)),
    }
}

pub fn round(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Float(f.round())),
        other => Err(type_error("round", other)),
    }
}

pub fn abs(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(Value::Int(i.abs())),
        Value::Float(f) => Ok(Value::Float(f.abs())),
        other => Err(type_error("abs", other)),
    }
}

pub fn sqrt(args: &[Value]) -> Result<Value> {
    match args[0].as_float() {
        Some(f) => Ok(Value::Float(f.sqrt())),
        None if args[0].is_null() => Ok(Value::Null),
        None => Err(type_error("sqrt", &args[0])),
    }
}

pub fn floor(args: &[Value]) -> Result<Value> {
    match args[0].as_float() {
        Some(f) => Ok(Value::Float(f.floor())),
        None if args[0].is_null() => Ok(Value::Null),
        None => Err(type_error("floor", &args[0])),
    }
}

pub fn ceil(args: &[Value]) -> Result<Value> {
    match args[0].as_float() {
        Some(f) => Ok(Value::Float(f.ceil())),
        None if args[0].is_null() => Ok(Value::Null),
        None => Err(type_error("ceil", &args[0])),
    }
}

pub fn to_integer(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(Value::Int(*i)),
        Value::Float(f) => Ok(Value::Int(*f as i64)),
        Value::String(s) => Ok(s.trim().parse::<i64>().map(Value::Int).unwrap_or(Value::Null)),
        Value::Bool(b) => Ok(Value::Int(if *b { 1 } else { 0 })),
        other => Err(type_error("toInteger", other)),
    }
}

pub fn to_float(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Int(i) => Ok(Value::Float(*i as f64)),
        Value::Float(f) => Ok(Value::Float(*f)),
        Value::String(s) => Ok(s.trim().parse::<f64>().map(Value::Float).unwrap_or(Value::Null)),
        other => Err(type_error("toFloat", other)),
    }
}

pub fn to_string_fn(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        other => Ok(Value::String(other.to_string())),
    }
}

/// `keys(node|relationship|map)` — tolerates null by returning an empty list.
pub fn keys(args: &[Value]) -> Result<Value> {
    let keys: Vec<Value> = match &args[0] {
        Value::Null => Vec::new(),
        Value::Node(n) => n.fields.keys().cloned().map(Value::String).collect(),
        Value::Relationship(r) => r.properties.keys().cloned().map(Value::String).collect(),
        Value::Map(m) => m.keys().cloned().map(Value::String).collect(),
        other => return Err(type_error("keys", other)),
    };
    Ok(Value::List(keys))
}

pub fn properties(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Node(n) => Ok(Value::Map(n.fields.clone())),
        Value::Relationship(r) => Ok(Value::Map(r.properties.clone())),
        Value::Map(m) => Ok(Value::Map(m.clone())),
        other => Err(type_error("properties", other)),
    }
}

pub fn head(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(items.first().cloned().unwrap_or(Value::Null)),
        other => Err(type_error("head", other)),
    }
}

pub fn last(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(items.last().cloned().unwrap_or(Value::Null)),
        other => Err(type_error("last", other)),
    }
}

pub fn tail(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::List(items) => Ok(Value::List(items.iter().skip(1).cloned().collect())),
        other => Err(type_error("tail", other)),
    }
}

pub fn range(args: &[Value]) -> Result<Value> {
    if args[0].is_null() || args[1].is_null() || args.get(2).map(Value::is_null).unwrap_or(false) {
        return Ok(Value::Null);
    }
    let start = args[0].as_int().ok_or_else(|| type_error("range", &args[0]))?;
    let end = args[1].as_int().ok_or_else(|| type_error("range", &args[1]))?;
    let step = args.get(2).and_then(Value::as_int).unwrap_or(1);
    if step == 0 {
        return Err(Error::SemanticError("range() step must not be zero".into()));
    }
    let mut out = Vec::new();
    let mut cur = start;
    if step > 0 {
        while cur <= end {
            out.push(Value::Int(cur));
            cur += step;
        }
    } else {
        while cur >= end {
            out.push(Value::Int(cur));
            cur += step;
        }
    }
    Ok(Value::List(out))
}

pub fn join(args: &[Value]) -> Result<Value> {
    let items = match &args[0] {
        Value::Null => return Ok(Value::Null),
        Value::List(items) => items,
        other => return Err(type_error("join", other)),
    };
    let sep = match args.get(1) {
        Some(Value::String(s)) => s.as_str(),
        None => "",
        Some(other) => return Err(type_error("join", other)),
    };
    let parts: Vec<String> = items.iter().map(|v| v.to_string()).collect();
    Ok(Value::String(parts.join(sep)))
}

pub fn stringify(args: &[Value]) -> Result<Value> {
    let json = super::to_serde_json(&args[0]);
    Ok(Value::String(serde_json::to_string(&json)?))
}

/// `coalesce` is the one scalar function defined explicitly in terms of
/// null — it never propagates, it consumes nulls looking for the first
/// non-null argument.
pub fn coalesce(args: &[Value]) -> Result<Value> {
    Ok(args.iter().find(|v| !v.is_null()).cloned().unwrap_or(Value::Null))
}

pub fn id_fn(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Node(n) => Ok(n.id().cloned().unwrap_or(Value::Null)),
        Value::Relationship(r) => Ok(Value::Map(PropertyMap::from(vec![
            ("left".to_string(), r.start_node_id.clone()),
            ("right".to_string(), r.end_node_id.clone()),
        ]))),
        other => Err(type_error("id", other)),
    }
}

pub fn element_id(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Node(n) => Ok(Value::String(format!("{}:{}", n.label, n.id().map(|v| v.to_string()).unwrap_or_default()))),
        Value::Relationship(r) => Ok(Value::String(format!(
            "{}:{}->{}",
            r.rel_type, r.start_node_id, r.end_node_id
        ))),
        other => Err(type_error("elementId", other)),
    }
}

pub fn type_fn(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Relationship(r) => Ok(Value::String(r.rel_type.clone())),
        Value::Null => Ok(Value::Null),
        other => Err(type_error("type", other)),
    }
}

pub fn labels(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Node(n) => Ok(Value::List(vec![Value::String(n.label.clone())])),
        Value::Null => Ok(Value::List(Vec::new())),
        other => Err(type_error("labels", other)),
    }
}

pub fn nodes(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Path(p) => Ok(Value::List(p.nodes.iter().cloned().map(Value::Node).collect())),
        other => Err(type_error("nodes", other)),
    }
}

pub fn relationships(args: &[Value]) -> Result<Value> {
    match &args[0] {
        Value::Null => Ok(Value::Null),
        Value::Path(p) => Ok(Value::List(p.relationships.iter().cloned().map(Value::Relationship).collect())),
        other => Err(type_error("relationships", other)),
    }
}
