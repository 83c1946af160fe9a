//! Primitive query execution.
//!
//! One run function per primitive operation (`find`, `count`, `destroy`,
//! `create_each`, `update`). Each follows the same sequence: guard (for
//! delete-style methods), forge, then a single adapter call, with the `meta`
//! side channel threaded through unchanged. Composite operations in
//! [`super::composite`] sequence these primitives.

use crate::adapter::Record;
use crate::collection::Collection;
use crate::query::criteria::Criteria;
use crate::query::descriptor::{Meta, QueryDescriptor};
use crate::query::error::{CallSite, ErrorKind, QueryError};
use crate::query::forge::{forge, ForgeError};
use crate::query::guard::reject_undefined_in_where_clause;

/// The no-op result policy for fetch-sensitive operations: an empty sequence
/// when affected records were requested, the absence marker otherwise.
pub(crate) fn noop_fetch_result(meta: &Meta) -> Option<Vec<Record>> {
    if meta.fetch() {
        Some(Vec::new())
    } else {
        None
    }
}

fn forge_or_invalid(
    query: &mut QueryDescriptor,
    collection: &Collection,
    origin: CallSite,
) -> Result<Option<ForgeError>, QueryError> {
    match forge(query, collection.orm()) {
        Ok(()) => Ok(None),
        Err(ForgeError::NoOp) => {
            log::debug!(
                "`.{}()` on `{}` is a no-op; skipping the adapter",
                query.method().as_str(),
                query.using()
            );
            Ok(Some(ForgeError::NoOp))
        }
        Err(ForgeError::InvalidCriteria { details }) => Err(QueryError::new(
            ErrorKind::InvalidCriteria { details },
            origin,
        )),
    }
}

fn forged_criteria(query: &mut QueryDescriptor) -> Criteria {
    query.criteria.take().unwrap_or_else(Criteria::match_all)
}

pub(crate) fn run_find(
    collection: &Collection,
    mut query: QueryDescriptor,
    origin: CallSite,
) -> Result<Vec<Record>, QueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("find", using = query.using()).entered();

    if forge_or_invalid(&mut query, collection, origin)?.is_some() {
        return Ok(Vec::new());
    }
    let criteria = forged_criteria(&mut query);
    collection
        .adapter()
        .find(query.using(), &criteria, query.meta())
        .map_err(|err| QueryError::new(ErrorKind::Adapter(err), origin))
}

pub(crate) fn run_count(
    collection: &Collection,
    mut query: QueryDescriptor,
    origin: CallSite,
) -> Result<u64, QueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("count", using = query.using()).entered();

    if forge_or_invalid(&mut query, collection, origin)?.is_some() {
        return Ok(0);
    }
    let criteria = forged_criteria(&mut query);
    collection
        .adapter()
        .count(query.using(), &criteria, query.meta())
        .map_err(|err| QueryError::new(ErrorKind::Adapter(err), origin))
}

pub(crate) fn run_destroy(
    collection: &Collection,
    mut query: QueryDescriptor,
    origin: CallSite,
) -> Result<Option<Vec<Record>>, QueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("destroy", using = query.using()).entered();

    reject_undefined_in_where_clause(query.criteria(), origin)?;
    if forge_or_invalid(&mut query, collection, origin)?.is_some() {
        return Ok(noop_fetch_result(query.meta()));
    }
    let criteria = forged_criteria(&mut query);
    collection
        .adapter()
        .destroy(query.using(), &criteria, query.meta())
        .map_err(|err| QueryError::new(ErrorKind::Adapter(err), origin))
}

pub(crate) fn run_create_each(
    collection: &Collection,
    query: QueryDescriptor,
    origin: CallSite,
) -> Result<Option<Vec<Record>>, QueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("create_each", using = query.using()).entered();

    let Some(records) = query.new_records else {
        return Err(QueryError::new(
            ErrorKind::Usage(format!(
                "Cannot `.create_each()` into `{}` without a batch of new records.",
                query.using
            )),
            origin,
        ));
    };
    collection
        .adapter()
        .create_each(&query.using, &records, &query.meta)
        .map_err(|err| QueryError::new(ErrorKind::Adapter(err), origin))
}

pub(crate) fn run_update(
    collection: &Collection,
    mut query: QueryDescriptor,
    origin: CallSite,
) -> Result<Option<Vec<Record>>, QueryError> {
    #[cfg(feature = "tracing")]
    let _span = tracing::debug_span!("update", using = query.using()).entered();

    let Some(values) = query.values.take() else {
        return Err(QueryError::new(
            ErrorKind::Usage(format!(
                "Cannot `.{}()` without values to set. Provide them with `.set()`.",
                query.method().as_str()
            )),
            origin,
        ));
    };
    if forge_or_invalid(&mut query, collection, origin)?.is_some() {
        return Ok(noop_fetch_result(query.meta()));
    }
    let criteria = forged_criteria(&mut query);
    collection
        .adapter()
        .update(query.using(), &criteria, &values, query.meta())
        .map_err(|err| QueryError::new(ErrorKind::Adapter(err), origin))
}
