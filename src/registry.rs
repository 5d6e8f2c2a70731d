//! Function registry — scalar, predicate, and aggregate functions keyed by
//! name, with arity validation and decorator-style static registration for
//! built-ins (spec.md §4.C, Design Notes §9).
//!
//! Built-ins register themselves into a process-wide [`once_cell::sync::Lazy`]
//! map the first time any registry is built, mirroring the teacher's
//! decorator-registration idiom used for storage backend capabilities.
//! `Runner::register_function`/`register_provider` then layer per-instance
//! entries on top of a clone of that baseline, so one process can host
//! multiple `Runner`s with different custom functions without one
//! instance's registrations leaking into another's.

use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::error::{Error, Result};
use crate::model::Value;
use crate::provider::AsyncProvider;

/// Inclusive/unbounded argument-count contract for a function.
#[derive(Debug, Clone, Copy)]
pub struct Arity {
    pub min: usize,
    pub max: Option<usize>,
}

impl Arity {
    pub const fn exact(n: usize) -> Self {
        Arity { min: n, max: Some(n) }
    }

    pub const fn at_least(n: usize) -> Self {
        Arity { min: n, max: None }
    }

    pub const fn range(min: usize, max: usize) -> Self {
        Arity { min, max: Some(max) }
    }

    pub fn check(&self, function: &str, got: usize) -> Result<()> {
        let ok = match self.max {
            Some(max) => got >= self.min && got <= max,
            None => got >= self.min,
        };
        if ok {
            return Ok(());
        }
        let expected = match self.max {
            Some(max) if max == self.min => format!("{max} argument(s)"),
            Some(max) => format!("{}..{} argument(s)", self.min, max),
            None => format!("at least {} argument(s)", self.min),
        };
        Err(Error::ArityError {
            function: function.to_string(),
            expected,
            got,
        })
    }
}

pub type ScalarFn = fn(&[Value]) -> Result<Value>;
pub type PredicateFn = fn(&[Value]) -> Result<bool>;

/// An aggregate function's running-state contract (spec.md §4.C): `reduce`
/// folds one row's arguments in, `finalize` produces the output value once
/// the group is exhausted.
pub trait Reducer: Send + Sync {
    fn reduce(&mut self, args: &[Value]) -> Result<()>;
    fn finalize(&self) -> Value;
}

pub type ReducerFactory = fn() -> Box<dyn Reducer>;

#[derive(Clone)]
pub enum FunctionDescriptor {
    Scalar { arity: Arity, func: ScalarFn },
    Predicate { arity: Arity, func: PredicateFn },
    Aggregate { arity: Arity, reducer: ReducerFactory },
    AsyncProvider { provider: Arc<dyn AsyncProvider> },
}

impl FunctionDescriptor {
    pub fn category(&self) -> &'static str {
        match self {
            FunctionDescriptor::Scalar { .. } => "scalar",
            FunctionDescriptor::Predicate { .. } => "predicate",
            FunctionDescriptor::Aggregate { .. } => "aggregate",
            FunctionDescriptor::AsyncProvider { .. } => "async_provider",
        }
    }
}

static BUILTINS: Lazy<HashMap<String, FunctionDescriptor>> = Lazy::new(|| {
    let mut map = HashMap::new();
    for (name, descriptor) in crate::functions::builtins() {
        map.insert(name.to_string(), descriptor);
    }
    map
});

/// A function table: the static built-ins plus whatever a `Runner` layers
/// on top via `register_function`/`register_provider`.
#[derive(Clone)]
pub struct Registry {
    overlay: Arc<RwLock<HashMap<String, FunctionDescriptor>>>,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Registry { overlay: Arc::new(RwLock::new(HashMap::new())) }
    }

    pub fn register(&self, name: impl Into<String>, descriptor: FunctionDescriptor) {
        self.overlay.write().insert(name.into(), descriptor);
    }

    pub fn register_provider(&self, name: impl Into<String>, provider: Arc<dyn AsyncProvider>) {
        self.register(name, FunctionDescriptor::AsyncProvider { provider });
    }

    /// Looks up `name`, preferring instance overlay registrations over the
    /// static built-in table so a `Runner` can shadow a built-in by name.
    pub fn lookup(&self, name: &str) -> Option<FunctionDescriptor> {
        if let Some(d) = self.overlay.read().get(name) {
            return Some(d.clone());
        }
        BUILTINS.get(name).cloned()
    }

    pub fn is_aggregate(&self, name: &str) -> bool {
        matches!(self.lookup(name), Some(FunctionDescriptor::Aggregate { .. }))
    }

    /// Introspection surface for `CALL db.functions()`-style callers.
    pub fn function_names(&self) -> Vec<String> {
        let mut names: Vec<String> = BUILTINS.keys().cloned().collect();
        names.extend(self.overlay.read().keys().cloned());
        names.sort();
        names.dedup();
        names
    }

    pub fn call_scalar(&self, name: &str, args: &[Value]) -> Result<Value> {
        match self.lookup(name) {
            Some(FunctionDescriptor::Scalar { arity, func }) => {
                arity.check(name, args.len())?;
                func(args)
            }
            Some(other) => Err(Error::SemanticError(format!(
                "'{name}' is a {} function, not scalar",
                other.category()
            ))),
            None => Err(Error::SemanticError(format!("unknown function '{name}'"))),
        }
    }

    pub fn call_predicate(&self, name: &str, args: &[Value]) -> Result<bool> {
        match self.lookup(name) {
            Some(FunctionDescriptor::Predicate { arity, func }) => {
                arity.check(name, args.len())?;
                func(args)
            }
            Some(other) => Err(Error::SemanticError(format!(
                "'{name}' is a {} function, not a predicate",
                other.category()
            ))),
            None => Err(Error::SemanticError(format!("unknown function '{name}'"))),
        }
    }

    pub fn new_reducer(&self, name: &str, argc: usize) -> Result<Box<dyn Reducer>> {
        match self.lookup(name) {
            Some(FunctionDescriptor::Aggregate { arity, reducer }) => {
                arity.check(name, argc)?;
                Ok(reducer())
            }
            Some(other) => Err(Error::SemanticError(format!(
                "'{name}' is a {} function, not an aggregate",
                other.category()
            ))),
            None => Err(Error::SemanticError(format!("unknown function '{name}'"))),
        }
    }

    pub fn provider(&self, name: &str) -> Option<Arc<dyn AsyncProvider>> {
        match self.lookup(name)? {
            FunctionDescriptor::AsyncProvider { provider } => Some(provider),
            _ => None,
        }
    }
}
