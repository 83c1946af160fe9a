//! Criteria payloads for query methods.
//!
//! A `Criteria` wraps the JSON filter/selection/pagination dictionary a
//! caller passes to a query method. Before forging it may be a bare filter
//! object, a dictionary with `where`/`limit`/`skip`/`sort`/`select`/`omit`
//! keys, or a scalar primary-key shorthand. After forging it is always a
//! dictionary with a `where` object.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Criteria keys that are not part of the filter itself.
pub(crate) const MODIFIER_KEYS: [&str; 5] = ["select", "omit", "limit", "skip", "sort"];

/// A filter/selection/pagination specification describing which records an
/// operation targets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Criteria(Value);

impl Criteria {
    /// Wrap a raw criteria value.
    pub fn new(value: Value) -> Self {
        Self(value)
    }

    /// The canonical match-all criteria.
    pub fn match_all() -> Self {
        let mut map = Map::new();
        map.insert("where".to_string(), Value::Object(Map::new()));
        Self(Value::Object(map))
    }

    /// Borrow the underlying JSON value.
    pub fn value(&self) -> &Value {
        &self.0
    }

    pub(crate) fn value_mut(&mut self) -> &mut Value {
        &mut self.0
    }

    /// Unwrap into the underlying JSON value.
    pub fn into_value(self) -> Value {
        self.0
    }

    /// The effective filter: the `where` sub-object when one is present,
    /// otherwise the whole criteria object. Scalar shorthand criteria have
    /// no effective filter until they are forged.
    pub fn effective_where(&self) -> Option<&Value> {
        match &self.0 {
            Value::Object(map) => Some(map.get("where").unwrap_or(&self.0)),
            _ => None,
        }
    }

    /// A clone of this criteria with pagination, selection, and sort
    /// modifiers removed. Used for cardinality checks, where those modifiers
    /// are irrelevant and could mask an ambiguous match.
    pub fn without_modifiers(&self) -> Self {
        match &self.0 {
            Value::Object(map) => {
                let stripped: Map<String, Value> = map
                    .iter()
                    .filter(|(key, _)| !MODIFIER_KEYS.contains(&key.as_str()))
                    .map(|(key, value)| (key.clone(), value.clone()))
                    .collect();
                Self(Value::Object(stripped))
            }
            other => Self(other.clone()),
        }
    }
}

impl From<Value> for Criteria {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}
