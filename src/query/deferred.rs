//! Deferred query builder.
//!
//! A `Deferred` represents a not-yet-executed query: it owns the query
//! descriptor and exposes the chainable modifier methods that configure it.
//! Execution consumes the builder, so a deferred query can be executed at
//! most once, and its descriptor cannot be touched after execution begins.
//!
//! # Example
//!
//! ```no_run
//! use tidewater::test_helpers::TestOrm;
//! use serde_json::json;
//!
//! let harness = TestOrm::new();
//! let users = harness.collection("user");
//!
//! // Configure lazily, execute once.
//! let destroyed = users
//!     .destroy()
//!     .where_(json!({ "age": { ">": 90 } }))
//!     .fetch()
//!     .exec()?;
//! # Ok::<(), tidewater::QueryError>(())
//! ```

use crate::adapter::Record;
use crate::collection::Collection;
use crate::query::composite::{run_archive, run_destroy_one, run_update_one};
use crate::query::criteria::Criteria;
use crate::query::descriptor::{Meta, QueryDescriptor, QueryMethod};
use crate::query::error::{CallSite, QueryError};
use crate::query::execution::{run_count, run_create_each, run_destroy, run_find, run_update};
use crate::query::request::QueryRequest;
use serde_json::Value;
use std::marker::PhantomData;

/// One executable query operation: its result type plus the run function
/// the builder hands the completed descriptor to.
pub trait Operation {
    type Output;

    const METHOD: QueryMethod;

    fn run(
        collection: &Collection,
        query: QueryDescriptor,
        origin: CallSite,
    ) -> Result<Self::Output, QueryError>;
}

macro_rules! operation {
    ($(#[$doc:meta])* $name:ident, $method:expr, $output:ty, $run:path) => {
        $(#[$doc])*
        #[derive(Debug)]
        pub struct $name;

        impl Operation for $name {
            type Output = $output;

            const METHOD: QueryMethod = $method;

            fn run(
                collection: &Collection,
                query: QueryDescriptor,
                origin: CallSite,
            ) -> Result<Self::Output, QueryError> {
                $run(collection, query, origin)
            }
        }
    };
}

operation!(
    /// Fetch all matching records.
    Find, QueryMethod::Find, Vec<Record>, run_find
);
operation!(
    /// Count matching records.
    Count, QueryMethod::Count, u64, run_count
);
operation!(
    /// Delete matching records.
    Destroy, QueryMethod::Destroy, Option<Vec<Record>>, run_destroy
);
operation!(
    /// Delete at most one matching record.
    DestroyOne, QueryMethod::DestroyOne, Option<Record>, run_destroy_one
);
operation!(
    /// Update matching records.
    Update, QueryMethod::Update, Option<Vec<Record>>, run_update
);
operation!(
    /// Update at most one matching record.
    UpdateOne, QueryMethod::UpdateOne, Option<Record>, run_update_one
);
operation!(
    /// Copy matching records into the archive collection, then delete them.
    Archive, QueryMethod::Archive, Option<Vec<Record>>, run_archive
);
operation!(
    /// Insert a batch of new records.
    CreateEach, QueryMethod::CreateEach, Option<Vec<Record>>, run_create_each
);

/// A configurable, single-use deferred query.
///
/// Modifier methods take and return the builder, so configuration chains;
/// [`Deferred::exec`] consumes it, which makes double execution and
/// post-execution modification compile-time errors.
#[must_use = "a deferred query does nothing until `.exec()` is called"]
pub struct Deferred<'c, Op: Operation> {
    collection: &'c Collection,
    query: QueryDescriptor,
    origin: CallSite,
    _op: PhantomData<Op>,
}

impl<'c, Op: Operation> Deferred<'c, Op> {
    pub(crate) fn new(collection: &'c Collection, origin: CallSite) -> Self {
        Self {
            collection,
            query: QueryDescriptor::new(Op::METHOD, collection.identity()),
            origin,
            _op: PhantomData,
        }
    }

    pub(crate) fn install_records(&mut self, records: Vec<Record>) {
        self.query.new_records = Some(records);
    }

    /// Replace the whole criteria. Accepts any criteria shape, including the
    /// scalar primary-key shorthand.
    pub fn criteria(mut self, criteria: impl Into<Criteria>) -> Self {
        self.query.criteria = Some(criteria.into());
        self
    }

    /// Set the `where` clause of the criteria.
    pub fn where_(mut self, filter: impl Into<Value>) -> Self {
        self.query
            .criteria_object_mut()
            .insert("where".to_string(), filter.into());
        self
    }

    /// Limit how many records the operation may target.
    pub fn limit(mut self, limit: u64) -> Self {
        self.query
            .criteria_object_mut()
            .insert("limit".to_string(), Value::from(limit));
        self
    }

    /// Skip past the first `skip` matching records.
    pub fn skip(mut self, skip: u64) -> Self {
        self.query
            .criteria_object_mut()
            .insert("skip".to_string(), Value::from(skip));
        self
    }

    /// Set the sort order (e.g. `"name ASC"`).
    pub fn sort(mut self, sort: impl Into<Value>) -> Self {
        self.query
            .criteria_object_mut()
            .insert("sort".to_string(), sort.into());
        self
    }

    /// Keep only the named attributes in returned records.
    pub fn select(mut self, columns: impl Into<Value>) -> Self {
        self.query
            .criteria_object_mut()
            .insert("select".to_string(), columns.into());
        self
    }

    /// Drop the named attributes from returned records.
    pub fn omit(mut self, columns: impl Into<Value>) -> Self {
        self.query
            .criteria_object_mut()
            .insert("omit".to_string(), columns.into());
        self
    }

    /// Replace the meta side channel.
    pub fn meta(mut self, meta: Meta) -> Self {
        self.query.meta = meta;
        self
    }

    /// Ask the operation to return the records it affects.
    pub fn fetch(mut self) -> Self {
        self.query.meta = self.query.meta.with_fetch();
        self
    }

    /// Apply a structured request: install its criteria and meta, when
    /// present, in one step.
    pub fn apply(mut self, request: impl Into<QueryRequest>) -> Self {
        let request = request.into();
        if let Some(criteria) = request.criteria {
            self.query.criteria = Some(criteria);
        }
        if let Some(meta) = request.meta {
            self.query.meta = meta;
        }
        self
    }

    /// Inspect the descriptor this builder has accumulated so far.
    pub fn query(&self) -> &QueryDescriptor {
        &self.query
    }

    /// Execute the query, consuming the builder.
    ///
    /// # Errors
    ///
    /// Returns `QueryError` if validation, normalization, or any storage
    /// step fails.
    pub fn exec(self) -> Result<Op::Output, QueryError> {
        Op::run(self.collection, self.query, self.origin)
    }

    /// Execute the query and deliver the outcome through a completion sink.
    ///
    /// The sink is invoked exactly once, with either the success value or
    /// the error.
    pub fn exec_with<F>(self, sink: F)
    where
        F: FnOnce(Result<Op::Output, QueryError>),
    {
        sink(self.exec());
    }
}

impl Deferred<'_, Update> {
    /// The attribute values to set on matching records.
    pub fn set(mut self, values: impl Into<Value>) -> Self {
        self.query.values = as_record(values.into());
        self
    }
}

impl Deferred<'_, UpdateOne> {
    /// The attribute values to set on the matching record.
    pub fn set(mut self, values: impl Into<Value>) -> Self {
        self.query.values = as_record(values.into());
        self
    }
}

fn as_record(value: Value) -> Option<Record> {
    match value {
        Value::Object(map) => Some(map),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestOrm;
    use serde_json::json;

    #[test]
    fn test_modifiers_accumulate_on_the_descriptor() {
        let harness = TestOrm::new();
        let users = harness.collection("user");

        let deferred = users
            .find()
            .where_(json!({ "age": { ">": 21 } }))
            .limit(10)
            .skip(2)
            .sort(json!("age ASC"));

        assert_eq!(deferred.query().method(), QueryMethod::Find);
        assert_eq!(
            deferred.query().criteria().map(|c| c.value().clone()),
            Some(json!({
                "where": { "age": { ">": 21 } },
                "limit": 10,
                "skip": 2,
                "sort": "age ASC"
            }))
        );
    }

    #[test]
    fn test_apply_installs_criteria_and_meta() {
        let harness = TestOrm::new();
        let users = harness.collection("user");

        let request = QueryRequest::new()
            .with_criteria(json!({ "name": "Foo" }))
            .with_meta(Meta::new().with("fetch", json!(true)));
        let deferred = users.destroy().apply(request);

        assert!(deferred.query().meta().fetch());
        assert_eq!(
            deferred.query().criteria().map(|c| c.value().clone()),
            Some(json!({ "name": "Foo" }))
        );
    }

    #[test]
    fn test_apply_and_modifier_chain_build_identical_descriptors() {
        let harness = TestOrm::new();
        let users = harness.collection("user");

        let via_apply = users
            .destroy()
            .apply(QueryRequest::new().with_criteria(json!({ "where": { "name": "Foo" } })));
        let via_chain = users.destroy().where_(json!({ "name": "Foo" }));

        assert_eq!(
            via_apply.query().criteria().map(|c| c.value().clone()),
            via_chain.query().criteria().map(|c| c.value().clone())
        );
    }

    #[test]
    fn test_set_ignores_non_dictionary_values() {
        let harness = TestOrm::new();
        let users = harness.collection("user");

        let deferred = users.update_one().where_(json!({ "id": 1 })).set(json!(42));
        let err = deferred.exec().expect_err("scalar values must be rejected");
        assert!(err.to_string().contains("without values to set"));
    }
}
