//! Built-in function definitions, grouped by category (spec.md §4.C).

pub mod aggregate;
pub mod predicate;
pub mod scalar;
pub mod temporal;

use crate::model::Value;
use crate::registry::{Arity, FunctionDescriptor};

/// Static table fed into the process-wide built-in registry. Order is
/// insertion order only; lookup is by name.
pub fn builtins() -> Vec<(&'static str, FunctionDescriptor)> {
    use FunctionDescriptor::{Aggregate, Predicate, Scalar};

    vec![
        ("toLower", Scalar { arity: Arity::exact(1), func: scalar::to_lower }),
        ("toUpper", Scalar { arity: Arity::exact(1), func: scalar::to_upper }),
        ("trim", Scalar { arity: Arity::exact(1), func: scalar::trim }),
        ("reverse", Scalar { arity: Arity::exact(1), func: scalar::reverse }),
        ("split", Scalar { arity: Arity::exact(2), func: scalar::split }),
        ("replace", Scalar { arity: Arity::exact(3), func: scalar::replace }),
        ("substring", Scalar { arity: Arity::range(2, 3), func: scalar::substring }),
        ("size", Scalar { arity: Arity::exact(1), func: scalar::size }),
        ("round", Scalar { arity: Arity::exact(1), func: scalar::round }),
        ("abs", Scalar { arity: Arity::exact(1), func: scalar::abs }),
        ("sqrt", Scalar { arity: Arity::exact(1), func: scalar::sqrt }),
        ("floor", Scalar { arity: Arity::exact(1), func: scalar::floor }),
        ("ceil", Scalar { arity: Arity::exact(1), func: scalar::ceil }),
        ("toInteger", Scalar { arity: Arity::exact(1), func: scalar::to_integer }),
        ("toFloat", Scalar { arity: Arity::exact(1), func: scalar::to_float }),
        ("toString", Scalar { arity: Arity::exact(1), func: scalar::to_string_fn }),
        ("keys", Scalar { arity: Arity::exact(1), func: scalar::keys }),
        ("properties", Scalar { arity: Arity::exact(1), func: scalar::properties }),
        ("head", Scalar { arity: Arity::exact(1), func: scalar::head }),
        ("last", Scalar { arity: Arity::exact(1), func: scalar::last }),
        ("tail", Scalar { arity: Arity::exact(1), func: scalar::tail }),
        ("range", Scalar { arity: Arity::range(2, 3), func: scalar::range }),
        ("join", Scalar { arity: Arity::range(1, 2), func: scalar::join }),
        ("stringify", Scalar { arity: Arity::exact(1), func: scalar::stringify }),
        ("toJson", Scalar { arity: Arity::exact(1), func: scalar::stringify }),
        ("coalesce", Scalar { arity: Arity::at_least(1), func: scalar::coalesce }),
        ("id", Scalar { arity: Arity::exact(1), func: scalar::id_fn }),
        ("elementId", Scalar { arity: Arity::exact(1), func: scalar::element_id }),
        ("type", Scalar { arity: Arity::exact(1), func: scalar::type_fn }),
        ("labels", Scalar { arity: Arity::exact(1), func: scalar::labels }),
        ("nodes", Scalar { arity: Arity::exact(1), func: scalar::nodes }),
        ("relationships", Scalar { arity: Arity::exact(1), func: scalar::relationships }),
        ("date", Scalar { arity: Arity::range(0, 1), func: temporal::date }),
        ("time", Scalar { arity: Arity::range(0, 1), func: temporal::time }),
        ("localtime", Scalar { arity: Arity::range(0, 1), func: temporal::localtime }),
        ("datetime", Scalar { arity: Arity::range(0, 1), func: temporal::datetime }),
        ("localdatetime", Scalar { arity: Arity::range(0, 1), func: temporal::localdatetime }),
        ("duration", Scalar { arity: Arity::exact(1), func: temporal::duration }),
        ("exists", Predicate { arity: Arity::exact(1), func: predicate::exists }),
        ("isEmpty", Predicate { arity: Arity::exact(1), func: predicate::is_empty }),
        ("all", Predicate { arity: Arity::exact(1), func: predicate::comprehension_unreachable }),
        ("any", Predicate { arity: Arity::exact(1), func: predicate::comprehension_unreachable }),
        ("none", Predicate { arity: Arity::exact(1), func: predicate::comprehension_unreachable }),
        ("single", Predicate { arity: Arity::exact(1), func: predicate::comprehension_unreachable }),
        ("count", Aggregate { arity: Arity::range(0, 1), reducer: || Box::new(aggregate::CountReducer::default()) }),
        ("sum", Aggregate { arity: Arity::exact(1), reducer: || Box::new(aggregate::SumReducer::default()) }),
        ("avg", Aggregate { arity: Arity::exact(1), reducer: || Box::new(aggregate::AvgReducer::default()) }),
        ("min", Aggregate { arity: Arity::exact(1), reducer: || Box::new(aggregate::MinMaxReducer::min()) }),
        ("max", Aggregate { arity: Arity::exact(1), reducer: || Box::new(aggregate::MinMaxReducer::max()) }),
        ("collect", Aggregate { arity: Arity::exact(1), reducer: || Box::new(aggregate::CollectReducer::default()) }),
    ]
}

/// Converts a [`Value`] into plain `serde_json::Value` — natural JSON
/// shapes (numbers, strings, arrays, objects), not the tagged wire format
/// `Value`'s derive produces, since `stringify()`/`toJson()` callers expect
/// ordinary JSON text. Temporal and graph-record values fall back to their
/// `Display` rendering.
pub fn to_serde_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::List(items) => serde_json::Value::Array(items.iter().map(to_serde_json).collect()),
        Value::Map(map) => {
            serde_json::Value::Object(map.iter().map(|(k, v)| (k.clone(), to_serde_json(v))).collect())
        }
        Value::Node(n) => {
            let mut obj: serde_json::Map<String, serde_json::Value> =
                n.fields.iter().map(|(k, v)| (k.clone(), to_serde_json(v))).collect();
            obj.insert("_label".to_string(), serde_json::Value::String(n.label.clone()));
            serde_json::Value::Object(obj)
        }
        Value::Relationship(r) => {
            let mut obj: serde_json::Map<String, serde_json::Value> =
                r.properties.iter().map(|(k, v)| (k.clone(), to_serde_json(v))).collect();
            obj.insert("_type".to_string(), serde_json::Value::String(r.rel_type.clone()));
            serde_json::Value::Object(obj)
        }
        Value::Path(p) => serde_json::Value::Array(p.to_flat_values().iter().map(to_serde_json).collect()),
        other => serde_json::Value::String(other.to_string()),
    }
}

/// Converts a `serde_json::Value` into a FlowQuery [`Value`], the inverse
/// used when materializing rows from `LOAD JSON` (spec.md §6).
pub fn from_serde_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(0.0))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(from_serde_json).collect()),
        serde_json::Value::Object(map) => {
            Value::Map(map.iter().map(|(k, v)| (k.clone(), from_serde_json(v))).collect())
        }
    }
}
