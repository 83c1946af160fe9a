//! Integration tests for the `archive` composite operation.

use serde_json::json;
use std::sync::{Arc, Mutex};
use tidewater::test_helpers::{record, MemoryAdapter, TestOrm};
use tidewater::{
    Adapter, AdapterError, ArchiveSettings, CollectionDef, Criteria, ErrorKind, Meta, Orm,
    OrmConfig, Record, Tidewater, ARCHIVE_IDENTITY,
};

#[test]
fn test_archive_copies_matches_and_destroys_originals() {
    let harness = TestOrm::new();
    harness.seed(
        "user",
        vec![
            json!({ "id": 1, "name": "Ada", "age": 36 }),
            json!({ "id": 2, "name": "Brendan", "age": 52 }),
            json!({ "id": 3, "name": "Grace", "age": 85 }),
        ],
    );
    let users = harness.collection("user");

    users
        .archive()
        .where_(json!({ "age": { ">": 50 } }))
        .exec()
        .expect("Failed to archive");

    // The two matched records moved into the archive collection.
    let archived = harness.adapter().dump(ARCHIVE_IDENTITY);
    assert_eq!(archived.len(), 2);
    for entry in &archived {
        assert_eq!(entry.get("fromModel"), Some(&json!("user")));
        assert!(entry.get("id").is_some_and(|id| id.is_string()));
        assert!(entry.get("createdAt").is_some_and(|ts| ts.is_number()));
        let original = entry
            .get("originalRecord")
            .and_then(|v| v.as_object())
            .expect("originalRecord should be a record");
        assert!(original.get("age").and_then(|a| a.as_i64()) > Some(50));
    }

    // The primary collection no longer contains them.
    let remaining = harness.adapter().dump("user");
    assert_eq!(remaining.len(), 1);
    assert_eq!(remaining[0].get("name"), Some(&json!("Ada")));
}

#[test]
fn test_archive_with_zero_matches_still_succeeds() {
    let harness = TestOrm::new();
    harness.seed("user", vec![json!({ "id": 1, "age": 20 })]);
    let users = harness.collection("user");

    users
        .archive()
        .where_(json!({ "age": { ">": 90 } }))
        .exec()
        .expect("Failed to archive zero records");

    assert!(harness.adapter().dump(ARCHIVE_IDENTITY).is_empty());
    assert_eq!(harness.adapter().dump("user").len(), 1);
}

#[test]
fn test_archive_noop_criteria_short_circuits() {
    let harness = TestOrm::new();
    harness.seed("user", vec![json!({ "id": 1 })]);
    let users = harness.collection("user");

    let silent = users
        .archive()
        .criteria(json!(false))
        .exec()
        .expect("Failed to run no-op archive");
    assert_eq!(silent, None);

    let fetched = users
        .archive()
        .criteria(json!(false))
        .fetch()
        .exec()
        .expect("Failed to run no-op archive");
    assert_eq!(fetched, Some(Vec::new()));

    assert_eq!(harness.adapter().dump("user").len(), 1);
}

/// An adapter decorator that records every call and the meta it saw.
struct RecordingAdapter {
    inner: MemoryAdapter,
    calls: Mutex<Vec<(String, Meta)>>,
}

impl RecordingAdapter {
    fn new() -> Self {
        Self {
            inner: MemoryAdapter::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    fn note(&self, op: &str, meta: &Meta) {
        self.calls
            .lock()
            .expect("Failed to lock call log")
            .push((op.to_string(), meta.clone()));
    }

    fn calls(&self) -> Vec<(String, Meta)> {
        self.calls.lock().expect("Failed to lock call log").clone()
    }
}

impl Adapter for RecordingAdapter {
    fn find(&self, using: &str, criteria: &Criteria, meta: &Meta) -> Result<Vec<Record>, AdapterError> {
        self.note("find", meta);
        self.inner.find(using, criteria, meta)
    }

    fn count(&self, using: &str, criteria: &Criteria, meta: &Meta) -> Result<u64, AdapterError> {
        self.note("count", meta);
        self.inner.count(using, criteria, meta)
    }

    fn destroy(
        &self,
        using: &str,
        criteria: &Criteria,
        meta: &Meta,
    ) -> Result<Option<Vec<Record>>, AdapterError> {
        self.note("destroy", meta);
        self.inner.destroy(using, criteria, meta)
    }

    fn create_each(
        &self,
        using: &str,
        records: &[Record],
        meta: &Meta,
    ) -> Result<Option<Vec<Record>>, AdapterError> {
        self.note("create_each", meta);
        self.inner.create_each(using, records, meta)
    }

    fn update(
        &self,
        using: &str,
        criteria: &Criteria,
        values: &Record,
        meta: &Meta,
    ) -> Result<Option<Vec<Record>>, AdapterError> {
        self.note("update", meta);
        self.inner.update(using, criteria, values, meta)
    }
}

fn recording_orm(config: OrmConfig) -> (Orm, Arc<RecordingAdapter>) {
    let adapter = Arc::new(RecordingAdapter::new());
    let mut registry = Tidewater::new(config);
    registry.register_datastore("default", adapter.clone());
    registry.register_collection(CollectionDef::new("user", "default"));
    let orm = registry.initialize().expect("Failed to initialize ORM");
    (orm, adapter)
}

#[test]
fn test_archive_when_disabled_is_a_usage_error_and_touches_nothing() {
    let config = OrmConfig {
        archive: ArchiveSettings {
            enabled: false,
            ..ArchiveSettings::default()
        },
    };
    let (orm, adapter) = recording_orm(config);
    adapter
        .inner
        .seed("user", vec![record(json!({ "id": 1, "name": "Ada" }))]);
    let users = orm.collection("user").expect("Failed to look up collection");

    let err = users
        .archive()
        .where_(json!({}))
        .exec()
        .expect_err("archiving is disabled");

    assert!(matches!(err.kind(), ErrorKind::Usage(_)));
    assert!(err.is_usage_error());
    assert!(
        err.to_string().contains("`Archive` setting was explicitly disabled"),
        "unexpected message: {err}"
    );
    // No read or write reached the adapter.
    assert!(adapter.calls().is_empty());
    assert_eq!(adapter.inner.dump("user").len(), 1);
}

#[test]
fn test_archive_disabled_harness_reports_a_usage_error() {
    let harness = TestOrm::without_archive();
    harness.seed("user", vec![json!({ "id": 1, "name": "Ada" })]);
    let users = harness.collection("user");

    let err = users
        .archive()
        .where_(json!({}))
        .exec()
        .expect_err("archiving is disabled");

    assert!(err.is_usage_error());
    assert_eq!(harness.adapter().dump("user").len(), 1);
}

#[test]
fn test_archive_with_overridden_identity_is_a_consistency_violation() {
    let config = OrmConfig {
        archive: ArchiveSettings {
            enabled: true,
            identity: Some("graveyard".to_string()),
            ..ArchiveSettings::default()
        },
    };
    let (orm, adapter) = recording_orm(config);
    adapter
        .inner
        .seed("user", vec![record(json!({ "id": 1 }))]);
    let users = orm.collection("user").expect("Failed to look up collection");

    let err = users
        .archive()
        .where_(json!({}))
        .exec()
        .expect_err("a hijacked archive identity must be fatal");

    assert!(matches!(err.kind(), ErrorKind::ConsistencyViolation(_)));
    assert!(err.to_string().contains("graveyard"));
    // Fatal before any read or write.
    assert!(adapter.calls().is_empty());
    assert_eq!(adapter.inner.dump("user").len(), 1);
}

#[test]
fn test_archive_threads_the_same_meta_through_every_step() {
    let (orm, adapter) = recording_orm(OrmConfig::default());
    adapter
        .inner
        .seed("user", vec![record(json!({ "id": 1, "name": "Ada" }))]);
    let users = orm.collection("user").expect("Failed to look up collection");

    let meta = Meta::new().with("connection", json!("session-1"));
    users
        .archive()
        .where_(json!({}))
        .meta(meta)
        .exec()
        .expect("Failed to archive");

    let calls = adapter.calls();
    let ops: Vec<&str> = calls.iter().map(|(op, _)| op.as_str()).collect();
    assert_eq!(ops, vec!["find", "create_each", "destroy"]);
    for (op, meta) in &calls {
        assert_eq!(
            meta.get("connection"),
            Some(&json!("session-1")),
            "step `{op}` lost the pinned connection"
        );
    }
}

#[test]
fn test_archive_aborts_when_the_copy_step_fails() {
    /// Fails every `create_each`, so the archive sequence stops before the
    /// destroy step.
    struct FailingCreate(MemoryAdapter);

    impl Adapter for FailingCreate {
        fn find(&self, using: &str, criteria: &Criteria, meta: &Meta) -> Result<Vec<Record>, AdapterError> {
            self.0.find(using, criteria, meta)
        }

        fn count(&self, using: &str, criteria: &Criteria, meta: &Meta) -> Result<u64, AdapterError> {
            self.0.count(using, criteria, meta)
        }

        fn destroy(
            &self,
            using: &str,
            criteria: &Criteria,
            meta: &Meta,
        ) -> Result<Option<Vec<Record>>, AdapterError> {
            self.0.destroy(using, criteria, meta)
        }

        fn create_each(
            &self,
            _using: &str,
            _records: &[Record],
            _meta: &Meta,
        ) -> Result<Option<Vec<Record>>, AdapterError> {
            Err(AdapterError::Backend("disk full".to_string()))
        }

        fn update(
            &self,
            using: &str,
            criteria: &Criteria,
            values: &Record,
            meta: &Meta,
        ) -> Result<Option<Vec<Record>>, AdapterError> {
            self.0.update(using, criteria, values, meta)
        }
    }

    let adapter = Arc::new(FailingCreate(MemoryAdapter::new()));
    let mut registry = Tidewater::new(OrmConfig::default());
    registry.register_datastore("default", adapter.clone());
    registry.register_collection(CollectionDef::new("user", "default"));
    let orm = registry.initialize().expect("Failed to initialize ORM");

    adapter.0.seed("user", vec![record(json!({ "id": 1 }))]);
    let users = orm.collection("user").expect("Failed to look up collection");

    let err = users
        .archive()
        .where_(json!({}))
        .exec()
        .expect_err("the copy step fails");

    assert!(matches!(err.kind(), ErrorKind::Adapter(_)));
    assert!(err.to_string().contains("disk full"));
    // The originals were not destroyed.
    assert_eq!(adapter.0.dump("user").len(), 1);
}
