//! Test support: an in-memory fixture adapter and a pre-wired ORM harness.
//!
//! `MemoryAdapter` implements just enough of the criteria language for
//! realistic tests (equality, `in`, ordering comparisons, `and`/`or`, plus
//! `sort`/`skip`/`limit`/`select`/`omit` on reads). `TestOrm` wires it into
//! an initialized ORM with a couple of fixture collections.

use crate::adapter::{Adapter, AdapterError, Record};
use crate::collection::Collection;
use crate::config::{ArchiveSettings, OrmConfig};
use crate::orm::{CollectionDef, Orm, Tidewater};
use crate::query::{Criteria, Meta};
use serde_json::Value;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// An in-memory storage adapter keyed by collection identity.
#[derive(Default)]
pub struct MemoryAdapter {
    tables: Mutex<HashMap<String, Vec<Record>>>,
}

impl MemoryAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    fn tables(&self) -> MutexGuard<'_, HashMap<String, Vec<Record>>> {
        self.tables.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert fixture records directly, bypassing the query layer.
    pub fn seed(&self, using: &str, records: Vec<Record>) {
        self.tables()
            .entry(using.to_string())
            .or_default()
            .extend(records);
    }

    /// A snapshot of every record currently stored under `using`.
    pub fn dump(&self, using: &str) -> Vec<Record> {
        self.tables().get(using).cloned().unwrap_or_default()
    }

    fn where_of(criteria: &Criteria) -> Value {
        criteria
            .effective_where()
            .cloned()
            .unwrap_or(Value::Object(serde_json::Map::new()))
    }
}

impl Adapter for MemoryAdapter {
    fn find(&self, using: &str, criteria: &Criteria, _meta: &Meta) -> Result<Vec<Record>, AdapterError> {
        let filter = Self::where_of(criteria);
        let mut matches: Vec<Record> = self
            .dump(using)
            .into_iter()
            .filter(|record| matches_filter(record, &filter))
            .collect();

        if let Value::Object(map) = criteria.value() {
            if let Some(sort) = map.get("sort") {
                sort_records(&mut matches, sort)?;
            }
            if let Some(skip) = map.get("skip").and_then(Value::as_u64) {
                let skip = usize::try_from(skip).unwrap_or(usize::MAX);
                matches = matches.into_iter().skip(skip).collect();
            }
            if let Some(limit) = map.get("limit").and_then(Value::as_u64) {
                let limit = usize::try_from(limit).unwrap_or(usize::MAX);
                matches.truncate(limit);
            }
            if let Some(Value::Array(columns)) = map.get("select") {
                matches = matches
                    .into_iter()
                    .map(|record| project(&record, columns, true))
                    .collect();
            }
            if let Some(Value::Array(columns)) = map.get("omit") {
                matches = matches
                    .into_iter()
                    .map(|record| project(&record, columns, false))
                    .collect();
            }
        }
        Ok(matches)
    }

    fn count(&self, using: &str, criteria: &Criteria, _meta: &Meta) -> Result<u64, AdapterError> {
        let filter = Self::where_of(criteria);
        let total = self
            .dump(using)
            .iter()
            .filter(|record| matches_filter(record, &filter))
            .count();
        Ok(total as u64)
    }

    fn destroy(
        &self,
        using: &str,
        criteria: &Criteria,
        meta: &Meta,
    ) -> Result<Option<Vec<Record>>, AdapterError> {
        let filter = Self::where_of(criteria);
        let mut tables = self.tables();
        let table = tables.entry(using.to_string()).or_default();
        let mut destroyed = Vec::new();
        table.retain(|record| {
            if matches_filter(record, &filter) {
                destroyed.push(record.clone());
                false
            } else {
                true
            }
        });
        Ok(meta.fetch().then_some(destroyed))
    }

    fn create_each(
        &self,
        using: &str,
        records: &[Record],
        meta: &Meta,
    ) -> Result<Option<Vec<Record>>, AdapterError> {
        self.tables()
            .entry(using.to_string())
            .or_default()
            .extend(records.iter().cloned());
        Ok(meta.fetch().then(|| records.to_vec()))
    }

    fn update(
        &self,
        using: &str,
        criteria: &Criteria,
        values: &Record,
        meta: &Meta,
    ) -> Result<Option<Vec<Record>>, AdapterError> {
        let filter = Self::where_of(criteria);
        let mut tables = self.tables();
        let table = tables.entry(using.to_string()).or_default();
        let mut updated = Vec::new();
        for record in table.iter_mut() {
            if matches_filter(record, &filter) {
                for (key, value) in values {
                    record.insert(key.clone(), value.clone());
                }
                updated.push(record.clone());
            }
        }
        Ok(meta.fetch().then_some(updated))
    }
}

fn matches_filter(record: &Record, filter: &Value) -> bool {
    let Value::Object(pairs) = filter else {
        return true;
    };
    pairs.iter().all(|(key, constraint)| match key.as_str() {
        "and" => match constraint {
            Value::Array(branches) => branches.iter().all(|b| matches_filter(record, b)),
            _ => false,
        },
        "or" => match constraint {
            Value::Array(branches) => branches.iter().any(|b| matches_filter(record, b)),
            _ => false,
        },
        attribute => {
            let stored = record.get(attribute).unwrap_or(&Value::Null);
            matches_constraint(stored, constraint)
        }
    })
}

fn matches_constraint(stored: &Value, constraint: &Value) -> bool {
    match constraint {
        Value::Object(ops) => ops.iter().all(|(op, operand)| match op.as_str() {
            "in" => matches!(operand, Value::Array(items) if items.contains(stored)),
            "nin" => matches!(operand, Value::Array(items) if !items.contains(stored)),
            "!=" => stored != operand,
            ">" => compare(stored, operand) == Some(Ordering::Greater),
            ">=" => matches!(compare(stored, operand), Some(Ordering::Greater | Ordering::Equal)),
            "<" => compare(stored, operand) == Some(Ordering::Less),
            "<=" => matches!(compare(stored, operand), Some(Ordering::Less | Ordering::Equal)),
            _ => false,
        }),
        scalar => stored == scalar,
    }
}

fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64().partial_cmp(&y.as_f64()),
        (Value::String(x), Value::String(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn sort_records(records: &mut [Record], sort: &Value) -> Result<(), AdapterError> {
    let (attribute, descending) = match sort {
        Value::String(spec) => {
            let mut parts = spec.split_whitespace();
            let attribute = parts.next().unwrap_or_default().to_string();
            let descending = parts.next().is_some_and(|d| d.eq_ignore_ascii_case("DESC"));
            (attribute, descending)
        }
        Value::Object(map) => match map.iter().next() {
            Some((attribute, direction)) => (
                attribute.clone(),
                direction.as_str().is_some_and(|d| d.eq_ignore_ascii_case("DESC")),
            ),
            None => return Ok(()),
        },
        other => {
            return Err(AdapterError::Unsupported(format!(
                "sort specification {other}"
            )));
        }
    };
    records.sort_by(|a, b| {
        let left = a.get(&attribute).unwrap_or(&Value::Null);
        let right = b.get(&attribute).unwrap_or(&Value::Null);
        let ordering = compare(left, right).unwrap_or(Ordering::Equal);
        if descending {
            ordering.reverse()
        } else {
            ordering
        }
    });
    Ok(())
}

fn project(record: &Record, columns: &[Value], keep: bool) -> Record {
    record
        .iter()
        .filter(|(key, _)| {
            let named = columns.iter().any(|c| c.as_str() == Some(key.as_str()));
            if keep {
                named
            } else {
                !named
            }
        })
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

/// Convert a `json!` object literal into a [`Record`].
///
/// # Panics
///
/// Panics when the value is not a JSON object; fixtures are expected to be
/// dictionaries.
pub fn record(value: Value) -> Record {
    match value {
        Value::Object(map) => map,
        other => panic!("record fixture must be a JSON object, got: {other}"),
    }
}

/// A pre-wired ORM over a single in-memory datastore, with a `user`
/// collection (primary key `id`) and an `account` collection (primary key
/// `number`).
pub struct TestOrm {
    orm: Orm,
    adapter: Arc<MemoryAdapter>,
}

impl TestOrm {
    pub fn new() -> Self {
        Self::with_config(OrmConfig::default())
    }

    /// A harness with archiving disabled.
    pub fn without_archive() -> Self {
        Self::with_config(OrmConfig {
            archive: ArchiveSettings {
                enabled: false,
                ..ArchiveSettings::default()
            },
        })
    }

    pub fn with_config(config: OrmConfig) -> Self {
        let adapter = Arc::new(MemoryAdapter::new());
        let mut registry = Tidewater::new(config);
        registry.register_datastore("default", adapter.clone());
        registry.register_collection(CollectionDef::new("user", "default"));
        registry.register_collection(
            CollectionDef::new("account", "default").with_primary_key("number"),
        );
        let orm = registry.initialize().expect("Failed to initialize test ORM");
        Self { orm, adapter }
    }

    pub fn orm(&self) -> &Orm {
        &self.orm
    }

    pub fn adapter(&self) -> &MemoryAdapter {
        &self.adapter
    }

    pub fn collection(&self, identity: &str) -> Collection {
        self.orm
            .collection(identity)
            .expect("Failed to look up collection")
    }

    /// Seed fixture records into the backing store.
    pub fn seed(&self, using: &str, fixtures: Vec<Value>) {
        self.adapter
            .seed(using, fixtures.into_iter().map(record).collect());
    }
}

impl Default for TestOrm {
    fn default() -> Self {
        Self::new()
    }
}
