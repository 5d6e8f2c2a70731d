//! `PropertyMap` — the key-value store backing node fields, relationship
//! properties, and query parameters.

use std::collections::HashMap;

use super::Value;

/// A map of property/field names to values.
pub type PropertyMap = HashMap<String, Value>;

impl<K, V> From<Vec<(K, V)>> for Value
where
    K: Into<String>,
    V: Into<Value>,
{
    fn from(pairs: Vec<(K, V)>) -> Self {
        Value::Map(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
