//! Pre-normalization criteria guard.
//!
//! Rejects criteria whose equality filters contain the explicit
//! absence-of-value marker (JSON `null`). The intent of an absent value in
//! an equality position is ambiguous, so the delete-style and update-style
//! methods refuse such criteria before normalization runs.

use crate::query::criteria::Criteria;
use crate::query::error::{CallSite, ErrorKind, QueryError};
use serde_json::Value;

/// Fail with `UndefinedInWhereClause` when any top-level key of the
/// effective filter (the `where` sub-object if present, else the whole
/// criteria) maps to the absence marker.
///
/// Missing criteria and scalar shorthand have no filter object to inspect
/// and pass through.
pub(crate) fn reject_undefined_in_where_clause(
    criteria: Option<&Criteria>,
    origin: CallSite,
) -> Result<(), QueryError> {
    let Some(criteria) = criteria else {
        return Ok(());
    };
    if let Some(Value::Object(filter)) = criteria.effective_where() {
        for value in filter.values() {
            if value.is_null() {
                return Err(QueryError::new(ErrorKind::UndefinedInWhereClause, origin));
            }
        }
    }
    Ok(())
}
