//! Virtual catalog — per-label node stores and per-type relationship
//! stores, each backed by a sub-query rather than persistent storage
//! (spec.md §4.G). A store materializes lazily: the defining sub-query
//! runs once, on the first `data()` call, and the resulting rows are
//! cached for the lifetime of the store.
//!
//! `SubqueryRunner` breaks what would otherwise be a circular dependency
//! between the catalog and the pipeline executor (a virtual label's
//! defining query can itself `MATCH` against other virtual labels): the
//! catalog only knows it can ask *something* to run a `Query` and hand
//! back rows, and the `Runner`/pipeline module supplies that something.
//! `run_query` is async (not just for symmetry — a defining sub-query may
//! itself `LOAD JSON`), so every catalog accessor that can trigger
//! materialization is async too, per spec.md §5's single-threaded
//! cooperative scheduling model (hence `?Send` throughout: `Rc`-based
//! caching is not meant to cross threads).

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use once_cell::unsync::OnceCell;

use crate::ast::Query;
use crate::error::{Error, Result};
use crate::model::{NodeRecord, RelationshipRecord, Value};

#[async_trait(?Send)]
pub trait SubqueryRunner {
    async fn run_query(&self, query: &Query) -> Result<Vec<HashMap<String, Value>>>;
}

struct NodeStore {
    query: Query,
    rows: OnceCell<Rc<Vec<NodeRecord>>>,
    id_index: OnceCell<HashMap<Value, usize>>,
}

struct RelationshipStore {
    query: Query,
    rows: OnceCell<Rc<Vec<RelationshipRecord>>>,
    left_index: OnceCell<HashMap<Value, Vec<usize>>>,
    right_index: OnceCell<HashMap<Value, Vec<usize>>>,
}

/// The full set of virtual labels/types visible to a running query.
#[derive(Default)]
pub struct VirtualCatalog {
    node_stores: RefCell<HashMap<String, NodeStore>>,
    rel_stores: RefCell<HashMap<String, RelationshipStore>>,
}

impl VirtualCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn define_label(&self, label: impl Into<String>, query: Query) {
        self.node_stores.borrow_mut().insert(
            label.into(),
            NodeStore {
                query,
                rows: OnceCell::new(),
                id_index: OnceCell::new(),
            },
        );
    }

    pub fn define_type(&self, rel_type: impl Into<String>, query: Query) {
        self.rel_stores.borrow_mut().insert(
            rel_type.into(),
            RelationshipStore {
                query,
                rows: OnceCell::new(),
                left_index: OnceCell::new(),
                right_index: OnceCell::new(),
            },
        );
    }

    /// `DELETE VIRTUAL LABEL <name>` — fails loudly if the label was never
    /// defined, rather than silently no-op'ing (spec.md §7).
    pub fn delete_label(&self, label: &str) -> Result<()> {
        self.node_stores
            .borrow_mut()
            .remove(label)
            .map(|_| ())
            .ok_or_else(|| Error::SemanticError(format!("no such virtual label '{label}'")))
    }

    pub fn delete_type(&self, rel_type: &str) -> Result<()> {
        self.rel_stores
            .borrow_mut()
            .remove(rel_type)
            .map(|_| ())
            .ok_or_else(|| Error::SemanticError(format!("no such virtual relationship type '{rel_type}'")))
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.node_stores.borrow().contains_key(label)
    }

    pub fn has_type(&self, rel_type: &str) -> bool {
        self.rel_stores.borrow().contains_key(rel_type)
    }

    pub fn labels(&self) -> Vec<String> {
        self.node_stores.borrow().keys().cloned().collect()
    }

    pub fn types(&self) -> Vec<String> {
        self.rel_stores.borrow().keys().cloned().collect()
    }

    /// Materializes (if needed) and returns every node row for `label`.
    /// OPTIONAL MATCH against an undefined label yields an empty result
    /// rather than erroring (spec.md §7); plain MATCH against one is a
    /// semantic error surfaced by the matcher, not here.
    pub async fn node_data(&self, label: &str, runner: &dyn SubqueryRunner) -> Result<Rc<Vec<NodeRecord>>> {
        if let Some(store) = self.node_stores.borrow().get(label) {
            if let Some(cached) = store.rows.get() {
                return Ok(cached.clone());
            }
        }
        let query = {
            let stores = self.node_stores.borrow();
            let store = stores
                .get(label)
                .ok_or_else(|| Error::SemanticError(format!("no such virtual label '{label}'")))?;
            store.query.clone()
        };
        let rows = runner.run_query(&query).await?;
        let records: Vec<NodeRecord> = rows
            .into_iter()
            .map(|fields| NodeRecord::new(label, fields))
            .collect();
        let records = Rc::new(records);
        let stores = self.node_stores.borrow();
        let store = stores.get(label).expect("label checked above");
        let _ = store.rows.set(records.clone());
        Ok(records)
    }

    pub async fn node_id_index(&self, label: &str, runner: &dyn SubqueryRunner) -> Result<HashMap<Value, usize>> {
        let rows = self.node_data(label, runner).await?;
        let stores = self.node_stores.borrow();
        let store = stores.get(label).expect("materialized above");
        if let Some(idx) = store.id_index.get() {
            return Ok(idx.clone());
        }
        let mut index = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            if let Some(id) = row.id() {
                index.insert(id.clone(), i);
            }
        }
        let _ = store.id_index.set(index.clone());
        Ok(index)
    }

    pub async fn relationship_data(&self, rel_type: &str, runner: &dyn SubqueryRunner) -> Result<Rc<Vec<RelationshipRecord>>> {
        if let Some(store) = self.rel_stores.borrow().get(rel_type) {
            if let Some(cached) = store.rows.get() {
                return Ok(cached.clone());
            }
        }
        let query = {
            let stores = self.rel_stores.borrow();
            let store = stores
                .get(rel_type)
                .ok_or_else(|| Error::SemanticError(format!("no such virtual relationship type '{rel_type}'")))?;
            store.query.clone()
        };
        let rows = runner.run_query(&query).await?;
        let mut records = Vec::with_capacity(rows.len());
        for mut fields in rows {
            let left_id = fields.remove("left_id").unwrap_or(Value::Null);
            let right_id = fields.remove("right_id").unwrap_or(Value::Null);
            fields.remove("_type");
            records.push(RelationshipRecord::new(rel_type, left_id, right_id, fields));
        }
        let records = Rc::new(records);
        let stores = self.rel_stores.borrow();
        let store = stores.get(rel_type).expect("type checked above");
        let _ = store.rows.set(records.clone());
        Ok(records)
    }

    pub async fn relationship_left_index(&self, rel_type: &str, runner: &dyn SubqueryRunner) -> Result<HashMap<Value, Vec<usize>>> {
        let rows = self.relationship_data(rel_type, runner).await?;
        let stores = self.rel_stores.borrow();
        let store = stores.get(rel_type).expect("materialized above");
        if let Some(idx) = store.left_index.get() {
            return Ok(idx.clone());
        }
        let mut index: HashMap<Value, Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            index.entry(row.left_id.clone()).or_default().push(i);
        }
        let _ = store.left_index.set(index.clone());
        Ok(index)
    }

    pub async fn relationship_right_index(&self, rel_type: &str, runner: &dyn SubqueryRunner) -> Result<HashMap<Value, Vec<usize>>> {
        let rows = self.relationship_data(rel_type, runner).await?;
        let stores = self.rel_stores.borrow();
        let store = stores.get(rel_type).expect("materialized above");
        if let Some(idx) = store.right_index.get() {
            return Ok(idx.clone());
        }
        let mut index: HashMap<Value, Vec<usize>> = HashMap::new();
        for (i, row) in rows.iter().enumerate() {
            index.entry(row.right_id.clone()).or_default().push(i);
        }
        let _ = store.right_index.set(index.clone());
        Ok(index)
    }
}
