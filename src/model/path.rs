//! Path — the materialized sequence of a matched pattern.
//!
//! spec.md §3: "ordered sequence `[node, relationship, node, relationship,
//! …, node]`; a zero-hop path is `[node]`." Wire representation (§6) is the
//! same flat array: odd positions are nodes, even positions are
//! relationship match records.

use serde::{Deserialize, Serialize};

use super::{NodeRecord, RelationshipMatch};

/// A path value: `nodes.len() == relationships.len() + 1`, always.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Path {
    pub nodes: Vec<NodeRecord>,
    pub relationships: Vec<RelationshipMatch>,
}

impl Path {
    pub fn single(node: NodeRecord) -> Self {
        Self {
            nodes: vec![node],
            relationships: Vec::new(),
        }
    }

    /// Hop count (spec.md Invariant 10: "every emitted path has odd
    /// length"; this is the hop count, flattened length is `2*len + 1`).
    pub fn len(&self) -> usize {
        self.relationships.len()
    }

    pub fn is_empty(&self) -> bool {
        self.relationships.is_empty()
    }

    pub fn start(&self) -> &NodeRecord {
        self.nodes.first().expect("Path always has at least one node")
    }

    pub fn end(&self) -> &NodeRecord {
        self.nodes.last().expect("Path always has at least one node")
    }

    pub fn append(&self, rel: RelationshipMatch, node: NodeRecord) -> Path {
        let mut nodes = self.nodes.clone();
        let mut relationships = self.relationships.clone();
        relationships.push(rel);
        nodes.push(node);
        Path { nodes, relationships }
    }

    pub fn triples(&self) -> impl Iterator<Item = (&NodeRecord, &RelationshipMatch, &NodeRecord)> {
        self.relationships
            .iter()
            .enumerate()
            .map(move |(i, rel)| (&self.nodes[i], rel, &self.nodes[i + 1]))
    }

    /// Flattens into the wire representation described by spec.md §6: a
    /// plain array alternating node and relationship-match values.
    pub fn to_flat_values(&self) -> Vec<super::Value> {
        let mut out = Vec::with_capacity(self.nodes.len() + self.relationships.len());
        out.push(super::Value::Node(self.nodes[0].clone()));
        for (rel, node) in self.relationships.iter().zip(self.nodes.iter().skip(1)) {
            out.push(super::Value::Relationship(rel.clone()));
            out.push(super::Value::Node(node.clone()));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PropertyMap, Value};

    fn node(id: i64) -> NodeRecord {
        let mut fields = PropertyMap::new();
        fields.insert("id".into(), Value::Int(id));
        NodeRecord::new("Person", fields)
    }

    fn rel(a: i64, b: i64) -> RelationshipMatch {
        RelationshipMatch {
            rel_type: "KNOWS".into(),
            start_node_id: Value::Int(a),
            end_node_id: Value::Int(b),
            properties: PropertyMap::new(),
        }
    }

    #[test]
    fn zero_hop_path_is_single_node() {
        let p = Path::single(node(1));
        assert_eq!(p.len(), 0);
        assert_eq!(p.to_flat_values().len(), 1);
    }

    #[test]
    fn multi_hop_path_has_odd_flat_length() {
        let p0 = Path::single(node(1));
        let p1 = p0.append(rel(1, 2), node(2));
        let p2 = p1.append(rel(2, 3), node(3));
        assert_eq!(p2.len(), 2);
        assert_eq!(p2.to_flat_values().len(), 5);
        assert_eq!(p2.start().id(), Some(&Value::Int(1)));
        assert_eq!(p2.end().id(), Some(&Value::Int(3)));
    }

    #[test]
    fn triples_walk_consecutive_hops() {
        let p0 = Path::single(node(1));
        let p1 = p0.append(rel(1, 2), node(2));
        let p2 = p1.append(rel(2, 3), node(3));
        let triples: Vec<_> = p2.triples().collect();
        assert_eq!(triples.len(), 2);
        assert_eq!(triples[0].0.id(), Some(&Value::Int(1)));
        assert_eq!(triples[1].2.id(), Some(&Value::Int(3)));
    }
}
