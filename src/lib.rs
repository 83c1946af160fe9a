//! # Tidewater
//!
//! Deferred query construction and composite-operation orchestration for an
//! adapter-backed ORM core.
//!
//! Collection methods build a query descriptor and hand back a chainable,
//! single-use [`Deferred`] builder; execution normalizes the criteria and
//! drives the storage adapter, while the composite operations (`archive`,
//! `destroy_one`, `update_one`) sequence several primitive operations into a
//! single terminal outcome.

pub mod adapter;
pub mod collection;
pub mod config;
pub mod orm;
pub mod query;
pub mod test_helpers;

pub use adapter::{Adapter, AdapterError, Record};
pub use collection::Collection;
pub use config::{ArchiveSettings, OrmConfig};
pub use orm::{CollectionDef, Orm, OrmError, Tidewater, ARCHIVE_IDENTITY};
pub use query::{
    ArchiveRecord, CallSite, Criteria, Deferred, ErrorKind, Meta, Operation, QueryDescriptor,
    QueryError, QueryMethod, QueryRequest,
};
