//! # flowquery — embeddable query engine for a Cypher-inspired language
//!
//! FlowQuery evaluates declarative pipeline queries (`WITH`/`UNWIND`/
//! `LOAD JSON`/`MATCH`/`OPTIONAL MATCH`/`WHERE`/`CALL`/`CREATE VIRTUAL`/
//! `DELETE VIRTUAL`/`RETURN`/`UNION`) against a *virtual* graph: node and
//! relationship sets are themselves defined by nested FlowQuery
//! sub-queries rather than by persistent storage.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use flowquery::{Runner, PropertyMap};
//!
//! # async fn example() -> flowquery::Result<()> {
//! let runner = Runner::new();
//! runner.run(
//!     "CREATE VIRTUAL LABEL Person FROM { UNWIND [1, 2] AS id RETURN id AS id, 'Ada' AS name }",
//!     PropertyMap::new(),
//! ).await?;
//!
//! let result = runner.run("MATCH (p:Person) RETURN p.name AS name", PropertyMap::new()).await?;
//! for row in result.iter() {
//!     println!("{:?}", row.get("name"));
//! }
//! # Ok(())
//! # }
//! ```

pub mod ast;
pub mod catalog;
pub mod error;
pub mod expr;
pub mod functions;
pub mod lexer;
pub mod matcher;
pub mod model;
pub mod parser;
pub mod pipeline;
pub mod provider;
pub mod registry;
pub mod runner;
pub mod scope;

pub use error::{Error, Result};
pub use model::{Direction, NodeRecord, Path, PropertyMap, RelationshipMatch, RelationshipRecord, Value};
pub use provider::{AsyncProvider, HttpJsonProvider, ProviderRequest};
pub use registry::{Arity, FunctionDescriptor, Reducer, Registry};
pub use runner::{QueryResult, Runner};
