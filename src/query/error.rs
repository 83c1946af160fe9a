//! Error types for query construction and execution.
//!
//! This module provides the `QueryError` envelope returned by every query
//! method, together with the `ErrorKind` taxonomy and the `CallSite` origin
//! captured at the public method boundary.

use crate::adapter::AdapterError;
use crate::query::criteria::Criteria;
use std::fmt;
use std::panic::Location;

/// The call site at which a query method was invoked.
///
/// Captured synchronously, before any work happens, so that an error surfaced
/// later in the operation sequence can still be traced back to the line of
/// code that started it.
#[derive(Debug, Clone, Copy)]
pub struct CallSite {
    method: &'static str,
    location: &'static Location<'static>,
}

impl CallSite {
    #[track_caller]
    pub(crate) fn capture(method: &'static str) -> Self {
        Self {
            method,
            location: Location::caller(),
        }
    }

    /// Name of the query method that was invoked (e.g. `"destroy_one"`).
    pub fn method(&self) -> &'static str {
        self.method
    }

    /// Source location of the invocation.
    pub fn location(&self) -> &'static Location<'static> {
        self.location
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, ".{}() at {}", self.method, self.location)
    }
}

/// Classification of query failures.
#[derive(Debug)]
pub enum ErrorKind {
    /// Criteria failed structural validation; carries human-readable details.
    InvalidCriteria { details: String },
    /// An equality filter contained an explicit absence-of-value marker
    /// (JSON `null`).
    UndefinedInWhereClause,
    /// A single-record operation matched more than one record.
    TooManyMatches {
        method: &'static str,
        total: u64,
        criteria: Criteria,
    },
    /// The operation was invoked in a configuration that forbids it.
    Usage(String),
    /// An internal invariant about reserved configuration was violated.
    ConsistencyViolation(String),
    /// An error from the storage adapter, propagated uninterpreted.
    Adapter(AdapterError),
}

/// Error returned by query construction and execution.
///
/// Wraps an [`ErrorKind`] together with the [`CallSite`] captured when the
/// query method was invoked.
#[derive(Debug)]
pub struct QueryError {
    kind: ErrorKind,
    origin: CallSite,
}

impl QueryError {
    pub(crate) fn new(kind: ErrorKind, origin: CallSite) -> Self {
        Self { kind, origin }
    }

    /// The failure classification.
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// The call site that started the failed operation.
    pub fn origin(&self) -> CallSite {
        self.origin
    }

    /// Returns `true` when the error is a usage error (misuse of the API or
    /// of the current configuration).
    pub fn is_usage_error(&self) -> bool {
        matches!(
            self.kind,
            ErrorKind::InvalidCriteria { .. }
                | ErrorKind::UndefinedInWhereClause
                | ErrorKind::Usage(_)
        )
    }
}

impl fmt::Display for QueryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ErrorKind::InvalidCriteria { details } => {
                write!(f, "Invalid criteria.\nDetails:\n  {details}")
            }
            ErrorKind::UndefinedInWhereClause => {
                write!(
                    f,
                    "Passing undefined in WHERE clause is not allowed: the intent of an \
                     absent value in an equality filter is ambiguous. Filter on a concrete \
                     value instead."
                )
            }
            ErrorKind::TooManyMatches {
                method,
                total,
                criteria,
            } => {
                let criteria_dump = serde_json::to_string_pretty(criteria)
                    .unwrap_or_else(|_| String::from("(unprintable criteria)"));
                write!(
                    f,
                    "Preventing `.{method}()`: found too many ({total}) matching records.\n\
                     \n\
                     Criteria used:\n\
                     \u{b7}\u{b7}\u{b7}\n\
                     {criteria_dump}\n\
                     \u{b7}\u{b7}\u{b7}"
                )
            }
            ErrorKind::Usage(message) => write!(f, "{message}"),
            ErrorKind::ConsistencyViolation(message) => {
                write!(f, "Consistency violation: {message}")
            }
            ErrorKind::Adapter(err) => write!(f, "{err}"),
        }
    }
}

impl std::error::Error for QueryError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match &self.kind {
            ErrorKind::Adapter(err) => Some(err),
            _ => None,
        }
    }
}
