//! Storage adapter abstraction.
//!
//! Provides the `Adapter` trait that abstracts record storage behind the
//! query layer. Every primitive operation the query layer performs goes
//! through this trait, allowing different implementations (a database
//! driver, a remote service client, an in-memory store for tests) to be
//! used interchangeably.

use crate::query::{Criteria, Meta};
use std::fmt;

/// A stored record: a JSON dictionary of attribute values.
pub type Record = serde_json::Map<String, serde_json::Value>;

/// Adapter error type.
///
/// The query layer never reinterprets these; they surface to the caller
/// wrapped in [`crate::query::ErrorKind::Adapter`], unchanged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterError {
    /// The adapter does not support the requested operation or criteria
    /// modifier.
    Unsupported(String),
    /// The underlying storage backend reported a failure.
    Backend(String),
}

impl fmt::Display for AdapterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdapterError::Unsupported(s) => write!(f, "Unsupported adapter operation: {s}"),
            AdapterError::Backend(s) => write!(f, "Adapter error: {s}"),
        }
    }
}

impl std::error::Error for AdapterError {}

/// Trait for executing storage operations.
///
/// Each method receives the canonical criteria produced by the query layer
/// plus the `meta` side channel. Mutating operations return `Some(affected)`
/// when `meta.fetch()` is set, and `None` otherwise.
///
/// Implementations must not mutate `criteria` or `meta`; the query layer
/// threads the same `meta` through every step of a composite operation so
/// that all steps observe the same session context.
pub trait Adapter: Send + Sync {
    /// Fetch all records matching `criteria` from `using`.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the lookup fails.
    fn find(&self, using: &str, criteria: &Criteria, meta: &Meta) -> Result<Vec<Record>, AdapterError>;

    /// Count the records matching `criteria` in `using`.
    ///
    /// Pagination and projection modifiers are ignored; only the `where`
    /// clause participates in the count.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the count fails.
    fn count(&self, using: &str, criteria: &Criteria, meta: &Meta) -> Result<u64, AdapterError>;

    /// Delete all records matching `criteria` from `using`.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the deletion fails.
    fn destroy(
        &self,
        using: &str,
        criteria: &Criteria,
        meta: &Meta,
    ) -> Result<Option<Vec<Record>>, AdapterError>;

    /// Insert a batch of records into `using`.
    ///
    /// An empty batch is valid and inserts nothing.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the insert fails.
    fn create_each(
        &self,
        using: &str,
        records: &[Record],
        meta: &Meta,
    ) -> Result<Option<Vec<Record>>, AdapterError>;

    /// Apply `values` to all records matching `criteria` in `using`.
    ///
    /// # Errors
    ///
    /// Returns `AdapterError` if the update fails.
    fn update(
        &self,
        using: &str,
        criteria: &Criteria,
        values: &Record,
        meta: &Meta,
    ) -> Result<Option<Vec<Record>>, AdapterError>;
}
