//! Row scope — the identifier bindings visible while evaluating one row.
//!
//! spec.md §9 Design Notes: "Avoid global singletons for scope state — pass
//! it explicitly to `value()`." Modeled as an explicit stack of frames
//! rather than a single flat map so that nested constructs (pattern
//! comprehensions, CASE branches binding no new names, sub-query virtual
//! definitions) can push a frame and let it fall away without disturbing
//! the caller's bindings — the same "explicit stack, no ambient state"
//! shape the teacher uses for transaction contexts in `tx::Transaction`.

use std::collections::HashMap;

use crate::model::Value;

/// One layer of bindings. Lookups walk frames from the top down so an
/// inner frame's alias shadows an outer one without mutating it — this is
/// the mechanism behind spec.md §9's "alias shadowing resolves to the
/// captured value" rule.
#[derive(Debug, Clone, Default)]
struct Frame {
    bindings: HashMap<String, Value>,
}

/// An explicit stack of bound-identifier frames, threaded through
/// expression evaluation and the pipeline rather than held globally.
#[derive(Debug, Clone, Default)]
pub struct Scope {
    frames: Vec<Frame>,
}

impl Scope {
    pub fn new() -> Self {
        Scope { frames: vec![Frame::default()] }
    }

    /// Pushes a fresh frame; bindings set after this call are visible only
    /// until the matching `pop`.
    pub fn push(&mut self) {
        self.frames.push(Frame::default());
    }

    pub fn pop(&mut self) {
        self.frames.pop();
        if self.frames.is_empty() {
            self.frames.push(Frame::default());
        }
    }

    /// Binds `name` in the innermost frame, shadowing any outer binding.
    pub fn bind(&mut self, name: impl Into<String>, value: Value) {
        self.frames
            .last_mut()
            .expect("Scope always has at least one frame")
            .bindings
            .insert(name.into(), value);
    }

    /// Resolves `name`, searching from the innermost frame outward.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.frames
            .iter()
            .rev()
            .find_map(|frame| frame.bindings.get(name))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.frames.iter().rev().any(|frame| frame.bindings.contains_key(name))
    }

    /// Flattens all visible bindings into a single row, innermost wins —
    /// used when a projection step needs a concrete snapshot (e.g. WITH *).
    pub fn to_row(&self) -> HashMap<String, Value> {
        let mut row = HashMap::new();
        for frame in &self.frames {
            for (k, v) in &frame.bindings {
                row.insert(k.clone(), v.clone());
            }
        }
        row
    }

    /// A scope seeded from a single flat row, e.g. when resuming evaluation
    /// downstream of a WITH boundary.
    pub fn from_row(row: HashMap<String, Value>) -> Self {
        Scope { frames: vec![Frame { bindings: row }] }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inner_binding_shadows_outer_without_mutating_it() {
        let mut scope = Scope::new();
        scope.bind("n", Value::Int(1));
        scope.push();
        scope.bind("n", Value::Int(2));
        assert_eq!(scope.get("n"), Some(&Value::Int(2)));
        scope.pop();
        assert_eq!(scope.get("n"), Some(&Value::Int(1)));
    }

    #[test]
    fn to_row_flattens_visible_bindings() {
        let mut scope = Scope::new();
        scope.bind("a", Value::Int(1));
        scope.push();
        scope.bind("b", Value::Int(2));
        let row = scope.to_row();
        assert_eq!(row.get("a"), Some(&Value::Int(1)));
        assert_eq!(row.get("b"), Some(&Value::Int(2)));
    }
}
