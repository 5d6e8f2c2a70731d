//! Node record — a materialized row from a virtual node store.
//!
//! spec.md §3: "Node record — map of field name → value; field `id`
//! reserved." The label is carried alongside the field map because the
//! virtual catalog is organized per-label (§4.G) rather than per-node, so a
//! single `NodeRecord` always knows which store it came from.

use serde::{Deserialize, Serialize};

use super::{PropertyMap, Value};

/// A materialized node row bound to the label of the store it came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeRecord {
    pub label: String,
    /// All columns from the defining statement's result row, including the
    /// reserved `id` column.
    pub fields: PropertyMap,
}

impl NodeRecord {
    pub fn new(label: impl Into<String>, fields: PropertyMap) -> Self {
        Self {
            label: label.into(),
            fields,
        }
    }

    /// The reserved join-key field. Absent only if the defining statement's
    /// row omitted `id`, which is a catalog materialization error.
    pub fn id(&self) -> Option<&Value> {
        self.fields.get("id")
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.label == label
    }

    /// Property access used by `n.key` expressions; missing keys yield
    /// `None` so the caller can fall back to `Value::Null` (spec.md §3:
    /// "property access on null returns null").
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }
}
