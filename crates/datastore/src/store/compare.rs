//! Structural comparison of entities.
//!
//! Used to decide whether an existing record already equals the data being
//! written, in which case the write is skipped.

use std::cmp::Ordering;

use serde_json::{Number, Value};

use crate::core::{Document, Entity};
use crate::error::StorageResult;

/// Compares two entities through their serialized documents.
///
/// Object keys compare regardless of order, arrays compare element by
/// element in order. With `fields`, only those top-level fields are compared;
/// a field missing from both sides counts as equal.
pub fn structurally_equal<T: Entity>(
    left: &T,
    right: &T,
    fields: Option<&[String]>,
) -> StorageResult<bool> {
    let left = left.to_document()?;
    let right = right.to_document()?;
    Ok(documents_equal(&left, &right, fields))
}

/// Compares two documents, optionally restricted to a set of fields.
pub fn documents_equal(left: &Document, right: &Document, fields: Option<&[String]>) -> bool {
    match fields {
        Some(fields) => fields
            .iter()
            .all(|field| values_equal(left.get(field), right.get(field))),
        None => {
            left.len() == right.len()
                && left
                    .iter()
                    .all(|(key, value)| values_equal(Some(value), right.get(key)))
        }
    }
}

fn values_equal(left: Option<&Value>, right: Option<&Value>) -> bool {
    match (left, right) {
        (None, None) => true,
        (Some(Value::Object(a)), Some(Value::Object(b))) => documents_equal(a, b, None),
        (Some(Value::Array(a)), Some(Value::Array(b))) => {
            a.len() == b.len()
                && a.iter()
                    .zip(b.iter())
                    .all(|(x, y)| values_equal(Some(x), Some(y)))
        }
        (Some(Value::Number(a)), Some(Value::Number(b))) => {
            compare_numbers(a, b) == Some(Ordering::Equal)
        }
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Orders two JSON numbers.
///
/// Integers compare exactly; floating point is used only when at least one
/// side is a float, so `2` equals `2.0` but distinct integers beyond 2^53
/// stay distinct.
pub fn compare_numbers(a: &Number, b: &Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (a.as_i64(), b.as_i64()) {
        return Some(x.cmp(&y));
    }
    if let (Some(x), Some(y)) = (a.as_u64(), b.as_u64()) {
        return Some(x.cmp(&y));
    }
    if a.is_f64() || b.is_f64() {
        return a.as_f64()?.partial_cmp(&b.as_f64()?);
    }
    // One side is a negative i64, the other a u64 above i64::MAX.
    match (a.as_i64(), b.as_i64()) {
        (Some(_), None) => Some(Ordering::Less),
        (None, Some(_)) => Some(Ordering::Greater),
        _ => None,
    }
}
