//! Criteria normalization ("forging").
//!
//! Rewrites a query descriptor's criteria into canonical form — a dictionary
//! that always carries a `where` object — or classifies the criteria as
//! invalid or as a provable no-op. The rest of the query layer only ever
//! executes canonical criteria.

use crate::orm::OrmInner;
use crate::query::criteria::{Criteria, MODIFIER_KEYS};
use crate::query::descriptor::QueryDescriptor;
use serde_json::{Map, Value};

/// Classification raised while forging. `NoOp` is not a failure: callers
/// resolve it through the no-op result policy and never surface it.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ForgeError {
    InvalidCriteria { details: String },
    NoOp,
}

fn invalid(details: impl Into<String>) -> ForgeError {
    ForgeError::InvalidCriteria {
        details: details.into(),
    }
}

/// Normalize `query.criteria` in place.
///
/// Missing criteria become the canonical match-all. Scalar shorthand is
/// resolved against the target collection's primary key. Already-canonical
/// criteria pass through unchanged, so forging is idempotent.
pub(crate) fn forge(query: &mut QueryDescriptor, orm: &OrmInner) -> Result<(), ForgeError> {
    let primary_key = orm
        .primary_key_of(query.using())
        .ok_or_else(|| invalid(format!("unknown collection `{}`", query.using())))?;

    let raw = match query.criteria.take() {
        Some(criteria) => criteria.into_value(),
        None => Value::Object(Map::new()),
    };
    let canonical = normalize_criteria(raw, primary_key)?;
    query.criteria = Some(Criteria::new(canonical));
    Ok(())
}

fn normalize_criteria(raw: Value, primary_key: &str) -> Result<Value, ForgeError> {
    let map = match raw {
        Value::Bool(false) => return Err(ForgeError::NoOp),
        Value::Bool(true) => {
            return Err(invalid("`true` is not a usable criteria"));
        }
        Value::Null => {
            return Err(invalid("cannot use a criteria of `null`; omit the criteria instead"));
        }
        Value::Array(_) => {
            return Err(invalid("a criteria cannot be an array; use `{ \"in\": [...] }`"));
        }
        scalar @ (Value::Number(_) | Value::String(_)) => {
            let mut filter = Map::new();
            filter.insert(primary_key.to_string(), scalar);
            let mut map = Map::new();
            map.insert("where".to_string(), Value::Object(filter));
            map
        }
        Value::Object(map) => map,
    };

    let mut where_clause: Option<Value> = None;
    let mut modifiers = Map::new();
    let mut loose = Map::new();
    for (key, value) in map {
        if key == "where" {
            where_clause = Some(value);
        } else if MODIFIER_KEYS.contains(&key.as_str()) {
            modifiers.insert(key, value);
        } else {
            loose.insert(key, value);
        }
    }

    // Loose filter keys are hoisted into `where` only when no explicit
    // `where` clause was given.
    let where_clause = match where_clause {
        Some(explicit) => {
            if let Some(key) = loose.keys().next() {
                return Err(invalid(format!(
                    "cannot mix an explicit `where` clause with the loose filter key `{key}`"
                )));
            }
            normalize_where(explicit, primary_key)?
        }
        None => Value::Object(loose),
    };
    if filter_matches_nothing(&where_clause)? {
        return Err(ForgeError::NoOp);
    }

    let mut canonical = Map::new();
    canonical.insert("where".to_string(), where_clause);
    for (key, value) in modifiers {
        canonical.insert(key.clone(), normalize_modifier(&key, value)?);
    }
    Ok(Value::Object(canonical))
}

/// An explicit `where` value must be a dictionary; scalar shorthand inside
/// `where` (left there by the builder) resolves against the primary key.
fn normalize_where(value: Value, primary_key: &str) -> Result<Value, ForgeError> {
    match value {
        Value::Object(map) => Ok(Value::Object(map)),
        Value::Null => Ok(Value::Object(Map::new())),
        scalar @ (Value::Number(_) | Value::String(_)) => {
            let mut filter = Map::new();
            filter.insert(primary_key.to_string(), scalar);
            Ok(Value::Object(filter))
        }
        other => Err(invalid(format!(
            "`where` must be a dictionary of filters, but got: {other}"
        ))),
    }
}

/// Whether a filter provably matches nothing, validating operator objects
/// along the way.
///
/// An empty `in` list makes its own conjunct impossible, so it empties the
/// whole filter at the top level and under `and`. Inside `or` it only
/// eliminates that one disjunct; the `or` matches nothing only when every
/// disjunct does.
fn filter_matches_nothing(filter: &Value) -> Result<bool, ForgeError> {
    let Value::Object(pairs) = filter else {
        return Ok(false);
    };
    for (key, value) in pairs {
        match (key.as_str(), value) {
            ("and", Value::Array(branches)) => {
                for branch in branches {
                    if filter_matches_nothing(branch)? {
                        return Ok(true);
                    }
                }
            }
            ("or", Value::Array(branches)) => {
                let mut all_impossible = !branches.is_empty();
                for branch in branches {
                    if !filter_matches_nothing(branch)? {
                        all_impossible = false;
                    }
                }
                if all_impossible {
                    return Ok(true);
                }
            }
            ("and" | "or", other) => {
                return Err(invalid(format!("`{key}` must be an array of filters, but got: {other}")));
            }
            (_, Value::Object(constraint)) => {
                if let Some(candidates) = constraint.get("in") {
                    match candidates {
                        Value::Array(items) if items.is_empty() => return Ok(true),
                        Value::Array(_) => {}
                        other => {
                            return Err(invalid(format!(
                                "`in` must be an array of candidate values, but got: {other}"
                            )));
                        }
                    }
                }
            }
            _ => {}
        }
    }
    Ok(false)
}

fn normalize_modifier(key: &str, value: Value) -> Result<Value, ForgeError> {
    match key {
        "limit" => match value.as_u64() {
            Some(0) => Err(ForgeError::NoOp),
            Some(limit) => Ok(Value::from(limit)),
            None => Err(invalid(format!("`limit` must be a non-negative integer, but got: {value}"))),
        },
        "skip" => match value.as_u64() {
            Some(skip) => Ok(Value::from(skip)),
            None => Err(invalid(format!("`skip` must be a non-negative integer, but got: {value}"))),
        },
        "sort" => match value {
            Value::String(_) | Value::Array(_) | Value::Object(_) => Ok(value),
            other => Err(invalid(format!(
                "`sort` must be a string, array, or dictionary, but got: {other}"
            ))),
        },
        "select" | "omit" => match &value {
            Value::Array(columns) if columns.iter().all(Value::is_string) => Ok(value),
            other => Err(invalid(format!("`{key}` must be an array of column names, but got: {other}"))),
        },
        _ => Ok(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::descriptor::QueryMethod;
    use crate::test_helpers::TestOrm;
    use serde_json::json;

    fn forge_criteria(criteria: Value) -> Result<Value, ForgeError> {
        let harness = TestOrm::new();
        let collection = harness.collection("user");
        let mut query = QueryDescriptor::new(QueryMethod::Find, "user");
        query.criteria = Some(Criteria::new(criteria));
        forge(&mut query, collection.orm())?;
        Ok(query
            .criteria()
            .map(|c| c.value().clone())
            .unwrap_or(Value::Null))
    }

    #[test]
    fn test_missing_criteria_becomes_match_all() {
        let harness = TestOrm::new();
        let collection = harness.collection("user");
        let mut query = QueryDescriptor::new(QueryMethod::Find, "user");
        forge(&mut query, collection.orm()).expect("Failed to forge empty criteria");
        assert_eq!(
            query.criteria().map(|c| c.value().clone()),
            Some(json!({ "where": {} }))
        );
    }

    #[test]
    fn test_scalar_shorthand_resolves_primary_key() {
        let canonical = forge_criteria(json!(7)).expect("Failed to forge shorthand");
        assert_eq!(canonical, json!({ "where": { "id": 7 } }));
    }

    #[test]
    fn test_loose_keys_are_hoisted_into_where() {
        let canonical =
            forge_criteria(json!({ "name": "Foo", "limit": 3 })).expect("Failed to forge");
        assert_eq!(canonical, json!({ "where": { "name": "Foo" }, "limit": 3 }));
    }

    #[test]
    fn test_mixing_where_and_loose_keys_is_invalid() {
        let err = forge_criteria(json!({ "where": { "id": 1 }, "name": "Foo" }))
            .expect_err("mixed criteria should be invalid");
        assert!(matches!(err, ForgeError::InvalidCriteria { .. }));
    }

    #[test]
    fn test_false_criteria_is_a_noop() {
        assert_eq!(forge_criteria(json!(false)), Err(ForgeError::NoOp));
    }

    #[test]
    fn test_limit_zero_is_a_noop() {
        assert_eq!(
            forge_criteria(json!({ "where": {}, "limit": 0 })),
            Err(ForgeError::NoOp)
        );
    }

    #[test]
    fn test_empty_in_list_is_a_noop() {
        assert_eq!(
            forge_criteria(json!({ "id": { "in": [] } })),
            Err(ForgeError::NoOp)
        );
        assert_eq!(
            forge_criteria(json!({ "and": [{ "id": { "in": [] } }, { "name": "Foo" }] })),
            Err(ForgeError::NoOp)
        );
    }

    #[test]
    fn test_or_with_one_impossible_disjunct_is_not_a_noop() {
        // The satisfiable disjunct keeps the query alive; only that one
        // branch matches nothing.
        let criteria = json!({ "or": [{ "id": { "in": [] } }, { "name": "Foo" }] });
        let canonical = forge_criteria(criteria.clone()).expect("a satisfiable `or` must forge");
        assert_eq!(canonical, json!({ "where": criteria }));
    }

    #[test]
    fn test_or_with_every_disjunct_impossible_is_a_noop() {
        assert_eq!(
            forge_criteria(json!({ "or": [{ "id": { "in": [] } }] })),
            Err(ForgeError::NoOp)
        );
        assert_eq!(
            forge_criteria(json!({
                "or": [{ "id": { "in": [] } }, { "name": { "in": [] } }]
            })),
            Err(ForgeError::NoOp)
        );
    }

    #[test]
    fn test_array_criteria_is_invalid() {
        let err = forge_criteria(json!([1, 2])).expect_err("array criteria should be invalid");
        let ForgeError::InvalidCriteria { details } = err else {
            panic!("expected InvalidCriteria");
        };
        assert!(details.contains("array"));
    }

    #[test]
    fn test_negative_limit_is_invalid() {
        let err = forge_criteria(json!({ "limit": -1 })).expect_err("negative limit");
        assert!(matches!(err, ForgeError::InvalidCriteria { .. }));
    }

    #[test]
    fn test_forging_is_idempotent() {
        let once = forge_criteria(json!({ "name": "Foo", "limit": 3 })).expect("first forge");
        let twice = forge_criteria(once.clone()).expect("second forge");
        assert_eq!(once, twice);
    }
}
