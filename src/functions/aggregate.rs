//! Aggregate built-ins: `count`, `sum`, `avg`, `min`, `max`, `collect`.
//!
//! Each is a [`Reducer`] factory — `reduce()` folds one row in, `finalize()`
//! runs once after the group is exhausted. Empty-group behavior follows
//! spec.md §7 exactly: `count`/`sum` default to `0`, `avg`/`min`/`max`
//! default to `null`, `collect` defaults to `[]`.

use std::cmp::Ordering;

use crate::model::{flow_cmp, Value};
use crate::registry::Reducer;

#[derive(Default)]
pub struct CountReducer {
    count: i64,
}

impl Reducer for CountReducer {
    fn reduce(&mut self, args: &[Value]) -> crate::error::Result<()> {
        match args.first() {
            None => self.count += 1, // count(*)
            Some(v) if !v.is_null() => self.count += 1,
            Some(_) => {}
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        Value::Int(self.count)
    }
}

#[derive(Default)]
pub struct SumReducer {
    int_total: i64,
    float_total: f64,
    saw_float: bool,
}

impl Reducer for SumReducer {
    fn reduce(&mut self, args: &[Value]) -> crate::error::Result<()> {
        match &args[0] {
            Value::Null => {}
            Value::Int(i) => self.int_total += i,
            Value::Float(f) => {
                self.saw_float = true;
                self.float_total += f;
            }
            other => {
                return Err(crate::error::Error::SemanticError(format!(
                    "sum() does not accept a value of type {}",
                    other.type_name()
                )))
            }
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        if self.saw_float {
            Value::Float(self.float_total + self.int_total as f64)
        } else {
            Value::Int(self.int_total)
        }
    }
}

#[derive(Default)]
pub struct AvgReducer {
    total: f64,
    count: i64,
}

impl Reducer for AvgReducer {
    fn reduce(&mut self, args: &[Value]) -> crate::error::Result<()> {
        if let Some(f) = args[0].as_float() {
            self.total += f;
            self.count += 1;
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        if self.count == 0 {
            Value::Null
        } else {
            Value::Float(self.total / self.count as f64)
        }
    }
}

pub struct MinMaxReducer {
    best: Option<Value>,
    want_min: bool,
}

impl MinMaxReducer {
    pub fn min() -> Self {
        MinMaxReducer { best: None, want_min: true }
    }

    pub fn max() -> Self {
        MinMaxReducer { best: None, want_min: false }
    }
}

impl Reducer for MinMaxReducer {
    fn reduce(&mut self, args: &[Value]) -> crate::error::Result<()> {
        let candidate = &args[0];
        if candidate.is_null() {
            return Ok(());
        }
        match &self.best {
            None => self.best = Some(candidate.clone()),
            Some(current) => {
                if let Some(ordering) = flow_cmp(candidate, current) {
                    let replace = if self.want_min {
                        ordering == Ordering::Less
                    } else {
                        ordering == Ordering::Greater
                    };
                    if replace {
                        self.best = Some(candidate.clone());
                    }
                }
            }
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        self.best.clone().unwrap_or(Value::Null)
    }
}

#[derive(Default)]
pub struct CollectReducer {
    items: Vec<Value>,
}

impl Reducer for CollectReducer {
    fn reduce(&mut self, args: &[Value]) -> crate::error::Result<()> {
        if !args[0].is_null() {
            self.items.push(args[0].clone());
        }
        Ok(())
    }

    fn finalize(&self) -> Value {
        Value::List(self.items.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sum_of_empty_group_is_zero() {
        let r = SumReducer::default();
        assert_eq!(r.finalize(), Value::Int(0));
    }

    #[test]
    fn avg_of_empty_group_is_null() {
        let r = AvgReducer::default();
        assert_eq!(r.finalize(), Value::Null);
    }

    #[test]
    fn collect_of_empty_group_is_empty_list() {
        let r = CollectReducer::default();
        assert_eq!(r.finalize(), Value::List(Vec::new()));
    }

    #[test]
    fn min_tracks_smallest_non_null() {
        let mut r = MinMaxReducer::min();
        r.reduce(&[Value::Int(5)]).unwrap();
        r.reduce(&[Value::Null]).unwrap();
        r.reduce(&[Value::Int(2)]).unwrap();
        assert_eq!(r.finalize(), Value::Int(2));
    }
}
