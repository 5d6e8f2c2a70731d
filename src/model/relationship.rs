//! Relationship records.
//!
//! spec.md §3 distinguishes two shapes:
//! - **Relationship record**: the raw catalog row, with reserved `left_id`,
//!   `right_id`, and optional `_type` (when a pattern type-ORs several
//!   relationship types together).
//! - **Relationship match record**: what a successful pattern match binds
//!   into scope — `{ type, startNode, endNode, properties, ...properties }`,
//!   where top-level and `.properties`-nested access are both permitted.

use serde::{Deserialize, Serialize};

use super::{PropertyMap, Value};

/// Traversal direction requested by a relationship pattern (`->`, `<-`, `-`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Direction {
    Outgoing,
    Incoming,
    /// Undirected: matched symmetrically against both endpoint fields (see
    /// `matcher::step` and DESIGN.md — spec.md §4.H/§9 describe a
    /// `left_id`-only source asymmetry here that conflicts with §8's own
    /// worked example, so the symmetric reading was kept).
    Both,
}

/// A row materialized from a virtual relationship store: the reserved
/// `left_id`/`right_id` join keys, the relationship type, and any
/// remaining columns as properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipRecord {
    pub rel_type: String,
    pub left_id: Value,
    pub right_id: Value,
    pub properties: PropertyMap,
}

impl RelationshipRecord {
    pub fn new(rel_type: impl Into<String>, left_id: Value, right_id: Value, properties: PropertyMap) -> Self {
        Self {
            rel_type: rel_type.into(),
            left_id,
            right_id,
            properties,
        }
    }

    /// The endpoint id to seek by, given which direction the pattern asks
    /// this record to be found through.
    pub fn join_key(&self, direction: Direction) -> &Value {
        match direction {
            Direction::Outgoing => &self.left_id,
            Direction::Incoming => &self.right_id,
            // Documented asymmetry: undirected seeks by left_id only.
            Direction::Both => &self.left_id,
        }
    }

    pub fn other_end(&self, direction: Direction) -> &Value {
        match direction {
            Direction::Outgoing => &self.right_id,
            Direction::Incoming => &self.left_id,
            Direction::Both => &self.right_id,
        }
    }
}

/// What a pattern match binds into row scope for a relationship variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RelationshipMatch {
    pub rel_type: String,
    pub start_node_id: Value,
    pub end_node_id: Value,
    pub properties: PropertyMap,
}

impl RelationshipMatch {
    pub fn from_record(record: &RelationshipRecord, start_id: Value, end_id: Value) -> Self {
        Self {
            rel_type: record.rel_type.clone(),
            start_node_id: start_id,
            end_node_id: end_id,
            properties: record.properties.clone(),
        }
    }

    /// Reserved top-level fields plus transparent passthrough into
    /// `properties` (spec.md §3: "Direct property access is permitted both
    /// at top level and under `properties`").
    pub fn get(&self, key: &str) -> Option<Value> {
        match key {
            "type" => Some(Value::String(self.rel_type.clone())),
            "startNode" => Some(self.start_node_id.clone()),
            "endNode" => Some(self.end_node_id.clone()),
            "properties" => Some(Value::Map(self.properties.clone())),
            _ => self.properties.get(key).cloned(),
        }
    }
}
