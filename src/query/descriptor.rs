//! The query descriptor: the single mutable unit of work built by a query
//! method invocation and consumed by execution.

use crate::adapter::Record;
use crate::query::criteria::Criteria;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// The logical operation a query descriptor names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMethod {
    Find,
    Count,
    Destroy,
    DestroyOne,
    Update,
    UpdateOne,
    Archive,
    CreateEach,
}

impl QueryMethod {
    /// The public method name, as used in error messages.
    pub fn as_str(self) -> &'static str {
        match self {
            QueryMethod::Find => "find",
            QueryMethod::Count => "count",
            QueryMethod::Destroy => "destroy",
            QueryMethod::DestroyOne => "destroy_one",
            QueryMethod::Update => "update",
            QueryMethod::UpdateOne => "update_one",
            QueryMethod::Archive => "archive",
            QueryMethod::CreateEach => "create_each",
        }
    }
}

/// Side-channel configuration threaded through every step of an operation.
///
/// Recognized keys are `fetch` (return affected records from mutating
/// operations) and `connection` (session pinning, opaque to this crate).
/// Unrecognized keys are carried through to the adapter untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Meta(Map<String, Value>);

impl Meta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a meta key, builder-style.
    pub fn with(mut self, key: impl Into<String>, value: Value) -> Self {
        self.0.insert(key.into(), value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Whether affected records should be returned from mutating operations.
    pub fn fetch(&self) -> bool {
        matches!(self.0.get("fetch"), Some(Value::Bool(true)))
    }

    /// A shallow clone of this meta with `fetch: true`. The original is left
    /// untouched.
    pub fn with_fetch(&self) -> Self {
        self.clone().with("fetch", Value::Bool(true))
    }
}

/// A normalized description of one query method invocation.
///
/// `method` and `using` are fixed at creation; `criteria`, `values`, and
/// `meta` stay mutable until execution begins. Execution consumes the
/// descriptor, so nothing can observe or mutate it afterwards.
#[derive(Debug, Clone)]
pub struct QueryDescriptor {
    pub(crate) method: QueryMethod,
    pub(crate) using: String,
    pub(crate) criteria: Option<Criteria>,
    pub(crate) values: Option<Record>,
    pub(crate) new_records: Option<Vec<Record>>,
    pub(crate) meta: Meta,
}

impl QueryDescriptor {
    pub(crate) fn new(method: QueryMethod, using: impl Into<String>) -> Self {
        Self {
            method,
            using: using.into(),
            criteria: None,
            values: None,
            new_records: None,
            meta: Meta::new(),
        }
    }

    pub fn method(&self) -> QueryMethod {
        self.method
    }

    /// Identity of the target collection.
    pub fn using(&self) -> &str {
        &self.using
    }

    pub fn criteria(&self) -> Option<&Criteria> {
        self.criteria.as_ref()
    }

    pub fn meta(&self) -> &Meta {
        &self.meta
    }

    /// The criteria as a mutable dictionary, for the builder's modifier
    /// methods. Missing or scalar criteria are promoted to a dictionary;
    /// a scalar shorthand moves under `where` and is resolved against the
    /// primary key when the query is forged.
    pub(crate) fn criteria_object_mut(&mut self) -> &mut Map<String, Value> {
        let needs_reset = !matches!(
            self.criteria.as_ref().map(Criteria::value),
            Some(Value::Object(_))
        );
        if needs_reset {
            let mut map = Map::new();
            if let Some(existing) = self.criteria.take() {
                map.insert("where".to_string(), existing.into_value());
            }
            self.criteria = Some(Criteria::new(Value::Object(map)));
        }
        match self.criteria.as_mut().map(Criteria::value_mut) {
            Some(Value::Object(map)) => map,
            _ => unreachable!("criteria was just promoted to an object"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_meta_fetch_defaults_to_false() {
        assert!(!Meta::new().fetch());
        assert!(!Meta::new().with("fetch", json!("yes")).fetch());
        assert!(Meta::new().with("fetch", json!(true)).fetch());
    }

    #[test]
    fn test_with_fetch_leaves_original_untouched() {
        let meta = Meta::new().with("connection", json!("session-1"));
        let forced = meta.with_fetch();

        assert!(!meta.fetch());
        assert!(forced.fetch());
        assert_eq!(forced.get("connection"), Some(&json!("session-1")));
    }

    #[test]
    fn test_criteria_object_mut_promotes_scalar_shorthand() {
        let mut query = QueryDescriptor::new(QueryMethod::Destroy, "user");
        query.criteria = Some(Criteria::new(json!(7)));

        query.criteria_object_mut().insert("limit".to_string(), json!(1));

        assert_eq!(
            query.criteria().map(|c| c.value().clone()),
            Some(json!({ "where": 7, "limit": 1 }))
        );
    }

    #[test]
    fn test_method_names() {
        assert_eq!(QueryMethod::DestroyOne.as_str(), "destroy_one");
        assert_eq!(QueryMethod::Archive.as_str(), "archive");
    }
}
