//! Query construction and execution.
//!
//! This module implements the deferred query lifecycle: collection methods
//! build a [`QueryDescriptor`], a [`Deferred`] builder configures it through
//! chainable modifiers, and execution forges the criteria into canonical
//! form before driving the storage adapter. Composite operations sequence
//! several primitive operations behind one terminal outcome.
//!
//! # Architecture
//!
//! - **Descriptor**: the mutable unit of work ([`QueryDescriptor`], [`Meta`])
//! - **Criteria**: filter/selection/pagination payloads ([`Criteria`])
//! - **Guard**: pre-normalization rejection of ambiguous filters
//! - **Forge**: criteria normalization and no-op classification
//! - **Deferred**: the chainable, single-use builder ([`Deferred`])
//! - **Execution**: primitive operations against the adapter
//! - **Composite**: `archive`, `destroy_one`, `update_one` orchestration
//! - **Error**: the [`QueryError`] envelope and [`ErrorKind`] taxonomy

// The mutable unit of work
pub mod descriptor;
#[doc(inline)]
pub use descriptor::{Meta, QueryDescriptor, QueryMethod};

// Criteria payloads
pub mod criteria;
#[doc(inline)]
pub use criteria::Criteria;

// Structured request adaptation
pub mod request;
#[doc(inline)]
pub use request::QueryRequest;

// Pre-normalization guard
pub(crate) mod guard;

// Criteria normalization
pub(crate) mod forge;

// Deferred builder and the operation markers
pub mod deferred;
#[doc(inline)]
pub use deferred::{
    Archive, Count, CreateEach, Deferred, Destroy, DestroyOne, Find, Operation, Update, UpdateOne,
};

// Primitive execution
pub(crate) mod execution;

// Composite orchestration
pub mod composite;
#[doc(inline)]
pub use composite::ArchiveRecord;

// Error envelope and taxonomy
pub mod error;
#[doc(inline)]
pub use error::{CallSite, ErrorKind, QueryError};
