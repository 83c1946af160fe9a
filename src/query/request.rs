//! Structured query requests.
//!
//! A `QueryRequest` carries the optional criteria and meta a caller wants to
//! install on a query in one step. It is the adaptation layer for call sites
//! that hold a `(criteria?, meta?)` pair, so that shape juggling stays at the
//! public boundary and never reaches execution.

use crate::query::criteria::Criteria;
use crate::query::descriptor::Meta;
use serde_json::Value;

/// An optional criteria plus optional meta, applied to a deferred query via
/// [`crate::query::Deferred::apply`].
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub criteria: Option<Criteria>,
    pub meta: Option<Meta>,
}

impl QueryRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_criteria(mut self, criteria: impl Into<Criteria>) -> Self {
        self.criteria = Some(criteria.into());
        self
    }

    pub fn with_meta(mut self, meta: Meta) -> Self {
        self.meta = Some(meta);
        self
    }
}

impl From<()> for QueryRequest {
    fn from((): ()) -> Self {
        Self::default()
    }
}

impl From<Value> for QueryRequest {
    fn from(criteria: Value) -> Self {
        Self::new().with_criteria(criteria)
    }
}

impl From<Criteria> for QueryRequest {
    fn from(criteria: Criteria) -> Self {
        Self::new().with_criteria(criteria)
    }
}

impl From<(Value, Meta)> for QueryRequest {
    fn from((criteria, meta): (Value, Meta)) -> Self {
        Self::new().with_criteria(criteria).with_meta(meta)
    }
}
