//! Collection handles.
//!
//! A `Collection` is a cheap, cloneable handle onto one registered
//! collection plus the ORM registry it belongs to. Its methods are the
//! public entry points of the query layer: each captures the call site,
//! builds a fresh query descriptor, and returns a [`Deferred`] builder to
//! configure and execute.
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
//! // Immediate execution:
//! users.destroy().criteria(json!({ "name": "Foo" })).exec()?;
//!
//! // Deferred configuration, executed later:
//! let pending = users.destroy_one().where_(json!({ "id": 7 }));
//! let destroyed = pending.exec()?;
//! # Ok::<(), tidewater::QueryError>(())
//! ```

use crate::adapter::{Adapter, Record};
use crate::orm::{CollectionInner, OrmInner};
use crate::query::deferred::{
    Archive, Count, CreateEach, Deferred, Destroy, DestroyOne, Find, Update, UpdateOne,
};
use crate::query::error::CallSite;
use std::sync::Arc;

/// A handle onto one registered collection.
#[derive(Clone)]
pub struct Collection {
    inner: Arc<CollectionInner>,
    orm: Arc<OrmInner>,
}

impl Collection {
    pub(crate) fn from_parts(inner: Arc<CollectionInner>, orm: Arc<OrmInner>) -> Self {
        Self { inner, orm }
    }

    /// A handle onto another collection of the same ORM.
    pub(crate) fn sibling(&self, inner: Arc<CollectionInner>) -> Self {
        Self {
            inner,
            orm: self.orm.clone(),
        }
    }

    /// The collection's identity.
    pub fn identity(&self) -> &str {
        self.inner.identity()
    }

    /// The collection's primary key attribute.
    pub fn primary_key(&self) -> &str {
        &self.inner.primary_key
    }

    pub(crate) fn adapter(&self) -> &dyn Adapter {
        self.inner.adapter.as_ref()
    }

    pub(crate) fn orm(&self) -> &OrmInner {
        &self.orm
    }

    /// Fetch records matching the criteria.
    #[track_caller]
    pub fn find(&self) -> Deferred<'_, Find> {
        Deferred::new(self, CallSite::capture("find"))
    }

    /// Count records matching the criteria.
    #[track_caller]
    pub fn count(&self) -> Deferred<'_, Count> {
        Deferred::new(self, CallSite::capture("count"))
    }

    /// Destroy records matching the criteria.
    #[track_caller]
    pub fn destroy(&self) -> Deferred<'_, Destroy> {
        Deferred::new(self, CallSite::capture("destroy"))
    }

    /// Destroy at most one record matching the criteria, failing when the
    /// criteria are ambiguous.
    #[track_caller]
    pub fn destroy_one(&self) -> Deferred<'_, DestroyOne> {
        Deferred::new(self, CallSite::capture("destroy_one"))
    }

    /// Update records matching the criteria with values given via `set`.
    #[track_caller]
    pub fn update(&self) -> Deferred<'_, Update> {
        Deferred::new(self, CallSite::capture("update"))
    }

    /// Update at most one record matching the criteria, failing when the
    /// criteria are ambiguous.
    #[track_caller]
    pub fn update_one(&self) -> Deferred<'_, UpdateOne> {
        Deferred::new(self, CallSite::capture("update_one"))
    }

    /// Archive ("soft-delete") records matching the criteria: copy them into
    /// the archive collection, then destroy the originals.
    #[track_caller]
    pub fn archive(&self) -> Deferred<'_, Archive> {
        Deferred::new(self, CallSite::capture("archive"))
    }

    /// Insert a batch of new records.
    #[track_caller]
    pub fn create_each(&self, records: Vec<Record>) -> Deferred<'_, CreateEach> {
        let mut deferred = Deferred::new(self, CallSite::capture("create_each"));
        deferred.install_records(records);
        deferred
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::TestOrm;

    #[test]
    fn test_collection_reports_identity_and_primary_key() {
        let harness = TestOrm::new();
        let users = harness.collection("user");

        assert_eq!(users.identity(), "user");
        assert_eq!(users.primary_key(), "id");
    }

    #[test]
    fn test_call_site_is_captured_per_method() {
        let harness = TestOrm::new();
        let users = harness.collection("user");

        let deferred = users.destroy_one();
        let err = deferred
            .where_(serde_json::json!({ "id": null }))
            .exec()
            .expect_err("null equality should be rejected");
        assert_eq!(err.origin().method(), "destroy_one");
    }
}
