//! `Runner` — the public entry point (spec.md §4.L). Wires the lexer,
//! parser, virtual catalog, function registry, and pipeline executor
//! together, and implements [`SubqueryRunner`] so the catalog can
//! materialize a virtual label/type by recursing back into the pipeline.

use std::sync::Arc;

use tracing::instrument;

use crate::ast::Query;
use crate::catalog::{SubqueryRunner, VirtualCatalog};
use crate::error::Result;
use crate::model::{PropertyMap, Value};
use crate::parser;
use crate::pipeline::{self, Env};
use crate::provider::AsyncProvider;
use crate::registry::{FunctionDescriptor, Registry};

/// The result of a completed run: one row per output record, each a map
/// from projected column name to value.
#[derive(Debug, Clone, Default)]
pub struct QueryResult {
    pub rows: Vec<PropertyMap>,
}

impl QueryResult {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, PropertyMap> {
        self.rows.iter()
    }
}

/// An embeddable FlowQuery engine instance. Each `Runner` owns its own
/// virtual catalog (so virtual labels/types defined by one `Runner` never
/// leak into another) and its own function-registry overlay.
pub struct Runner {
    registry: Registry,
    catalog: VirtualCatalog,
}

impl Default for Runner {
    fn default() -> Self {
        Self::new()
    }
}

impl Runner {
    pub fn new() -> Self {
        Runner { registry: Registry::new(), catalog: VirtualCatalog::new() }
    }

    /// Registers a custom scalar/predicate/aggregate function, shadowing
    /// any built-in of the same name for this `Runner` instance only.
    pub fn register_function(&self, name: impl Into<String>, descriptor: FunctionDescriptor) {
        self.registry.register(name, descriptor);
    }

    /// Registers a custom `CALL`/`LOAD JSON` data provider.
    pub fn register_provider(&self, name: impl Into<String>, provider: Arc<dyn AsyncProvider>) {
        self.registry.register_provider(name, provider);
    }

    /// Parses and runs a FlowQuery query string against this `Runner`'s
    /// virtual catalog.
    #[instrument(skip(self, params), fields(query_len = query.len()))]
    pub async fn run(&self, query: &str, params: PropertyMap) -> Result<QueryResult> {
        let ast = parser::parse(query, &self.registry)?;
        let rows = self.run_parsed(&ast, &params).await?;
        Ok(QueryResult { rows })
    }

    async fn run_parsed(&self, query: &Query, params: &PropertyMap) -> Result<Vec<PropertyMap>> {
        let env = Env { catalog: &self.catalog, registry: &self.registry, params, runner: self };
        pipeline::run_query(query, &env).await
    }

    pub fn catalog(&self) -> &VirtualCatalog {
        &self.catalog
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }
}

#[async_trait::async_trait(?Send)]
impl SubqueryRunner for Runner {
    async fn run_query(&self, query: &Query) -> Result<Vec<std::collections::HashMap<String, Value>>> {
        self.run_parsed(query, &PropertyMap::new()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn runs_a_literal_return() {
        let runner = Runner::new();
        let result = runner.run("RETURN 1 AS one, 'hi' AS greeting", PropertyMap::new()).await.unwrap();
        assert_eq!(result.rows.len(), 1);
        assert_eq!(result.rows[0].get("one"), Some(&Value::Int(1)));
        assert_eq!(result.rows[0].get("greeting"), Some(&Value::String("hi".into())));
    }

    #[tokio::test]
    async fn unwind_expands_a_list() {
        let runner = Runner::new();
        let result = runner.run("UNWIND [1, 2, 3] AS x RETURN x", PropertyMap::new()).await.unwrap();
        assert_eq!(result.rows.len(), 3);
    }

    #[tokio::test]
    async fn virtual_label_materializes_from_a_subquery() {
        let runner = Runner::new();
        runner
            .run(
                "CREATE VIRTUAL LABEL Person FROM { UNWIND [1, 2] AS id RETURN id AS id, 'Ada' AS name }",
                PropertyMap::new(),
            )
            .await
            .unwrap();
        let result = runner.run("MATCH (p:Person) RETURN p.name AS name", PropertyMap::new()).await.unwrap();
        assert_eq!(result.rows.len(), 2);
    }

    #[tokio::test]
    async fn delete_virtual_label_that_was_never_defined_errors() {
        let runner = Runner::new();
        let err = runner.run("DELETE VIRTUAL LABEL Ghost", PropertyMap::new()).await;
        assert!(err.is_err());
    }
}
