//! Composite operations.
//!
//! `archive`, `destroy_one`, and `update_one` each sequence two or three
//! primitive operations into a higher-level operation with a single terminal
//! outcome. Steps run strictly in order; the first failing step aborts the
//! sequence and its error is surfaced unchanged. There is no rollback: these
//! are best-effort sequences, not transactions.

use crate::adapter::Record;
use crate::collection::Collection;
use crate::orm::ARCHIVE_IDENTITY;
use crate::query::descriptor::{QueryDescriptor, QueryMethod};
use crate::query::error::{CallSite, ErrorKind, QueryError};
use crate::query::execution::{
    noop_fetch_result, run_count, run_create_each, run_destroy, run_find, run_update,
};
use crate::query::forge::{forge, ForgeError};
use crate::query::guard::reject_undefined_in_where_clause;
use chrono::Utc;
use serde::Serialize;
use serde_json::Value;
use uuid::Uuid;

/// A record copied into the archive collection, wrapping the original
/// verbatim together with its source collection identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveRecord {
    pub id: String,
    pub created_at: i64,
    pub original_record: Record,
    pub from_model: String,
}

impl ArchiveRecord {
    pub(crate) fn wrap(original_record: Record, from_model: &str) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            created_at: Utc::now().timestamp_millis(),
            original_record,
            from_model: from_model.to_string(),
        }
    }

    pub(crate) fn into_record(self) -> Record {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Record::new(),
        }
    }
}

/// Archive (soft-delete): copy every record matching the criteria into the
/// archive collection, then destroy the originals.
///
/// Returns the absence marker on success. Matching zero records is not
/// special-cased: every step still runs, with empty collections.
pub(crate) fn run_archive(
    collection: &Collection,
    mut query: QueryDescriptor,
    origin: CallSite,
) -> Result<Option<Vec<Record>>, QueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("archive", using = query.using()).entered();

    match forge(&mut query, collection.orm()) {
        Ok(()) => {}
        Err(ForgeError::NoOp) => return Ok(noop_fetch_result(query.meta())),
        Err(ForgeError::InvalidCriteria { details }) => {
            return Err(QueryError::new(ErrorKind::InvalidCriteria { details }, origin));
        }
    }

    // Bail now if archival has been disabled.
    let Some(archive) = collection.orm().archive_collection() else {
        return Err(QueryError::new(
            ErrorKind::Usage(
                "Since the `Archive` setting was explicitly disabled, `.archive()` cannot be used."
                    .to_string(),
            ),
            origin,
        ));
    };
    if archive.identity() != ARCHIVE_IDENTITY {
        return Err(QueryError::new(
            ErrorKind::ConsistencyViolation(format!(
                "cannot override the `identity` of the built-in archive collection \
                 (expected `{ARCHIVE_IDENTITY}`, but instead got `{}`)",
                archive.identity()
            )),
            origin,
        ));
    }
    let archive = collection.sibling(archive);

    // The same canonical criteria drives both the read and the delete, so
    // the two steps target the same record set.
    let criteria = query.criteria.take();

    let mut find_query = QueryDescriptor::new(QueryMethod::Find, query.using());
    find_query.criteria = criteria.clone();
    find_query.meta = query.meta.clone();
    let found = run_find(collection, find_query, origin)?;

    log::debug!(
        "archiving {} record(s) from `{}` into `{}`",
        found.len(),
        query.using(),
        ARCHIVE_IDENTITY
    );
    let archives: Vec<Record> = found
        .into_iter()
        .map(|record| ArchiveRecord::wrap(record, collection.identity()).into_record())
        .collect();

    let mut create_query = QueryDescriptor::new(QueryMethod::CreateEach, ARCHIVE_IDENTITY);
    create_query.new_records = Some(archives);
    create_query.meta = query.meta.clone();
    run_create_each(&archive, create_query, origin)?;

    let mut destroy_query = QueryDescriptor::new(QueryMethod::Destroy, query.using());
    destroy_query.criteria = criteria;
    destroy_query.meta = query.meta.clone();
    run_destroy(collection, destroy_query, origin)?;

    Ok(None)
}

/// Destroy at most one record, returning the destroyed record.
///
/// A count over the modifier-stripped criteria enforces the at-most-one
/// invariant before any deletion happens. The count-then-destroy sequence is
/// not atomic; a concurrent insert between the two steps can slip through.
pub(crate) fn run_destroy_one(
    collection: &Collection,
    query: QueryDescriptor,
    origin: CallSite,
) -> Result<Option<Record>, QueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("destroy_one", using = query.using()).entered();

    run_exactly_one(collection, query, origin, QueryMethod::Destroy)
}

/// Update at most one record, returning the updated record.
pub(crate) fn run_update_one(
    collection: &Collection,
    query: QueryDescriptor,
    origin: CallSite,
) -> Result<Option<Record>, QueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("update_one", using = query.using()).entered();

    run_exactly_one(collection, query, origin, QueryMethod::Update)
}

/// Shared sequence for the single-record mutating operations: guard, forge,
/// count the modifier-stripped criteria, then run the underlying bulk
/// operation with `fetch` forced so the affected record can be returned.
fn run_exactly_one(
    collection: &Collection,
    mut query: QueryDescriptor,
    origin: CallSite,
    primitive: QueryMethod,
) -> Result<Option<Record>, QueryError> {
    reject_undefined_in_where_clause(query.criteria(), origin)?;
    match forge(&mut query, collection.orm()) {
        Ok(()) => {}
        Err(ForgeError::NoOp) => return Ok(None),
        Err(ForgeError::InvalidCriteria { details }) => {
            return Err(QueryError::new(ErrorKind::InvalidCriteria { details }, origin));
        }
    }

    // Pagination, selection, and sort modifiers are irrelevant to the
    // cardinality check and could mask an ambiguous match.
    let stripped = query
        .criteria
        .take()
        .unwrap_or_else(crate::query::criteria::Criteria::match_all)
        .without_modifiers();

    let mut count_query = QueryDescriptor::new(QueryMethod::Count, query.using());
    count_query.criteria = Some(stripped.clone());
    count_query.meta = query.meta.clone();
    let total = run_count(collection, count_query, origin)?;

    if total > 1 {
        return Err(QueryError::new(
            ErrorKind::TooManyMatches {
                method: query.method().as_str(),
                total,
                criteria: stripped,
            },
            origin,
        ));
    }

    let mut one_query = QueryDescriptor::new(primitive, query.using());
    one_query.criteria = Some(stripped);
    one_query.values = query.values.take();
    one_query.meta = query.meta.with_fetch();

    let affected = match primitive {
        QueryMethod::Update => run_update(collection, one_query, origin)?,
        _ => run_destroy(collection, one_query, origin)?,
    };

    // `fetch` was forced, so the bulk operation always reports its affected
    // records; cardinality was just verified to be at most one.
    Ok(affected.and_then(|records| records.into_iter().next()))
}
