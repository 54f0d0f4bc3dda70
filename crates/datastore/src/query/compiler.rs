//! Compilation of [`QueryFilter`] predicates into engine-native filters.
//!
//! The native dialect is a JSON object in the style of document stores:
//! literal values are written as-is, operator sets as `{"$gt": ..}` objects
//! and disjunctions as `"$or": [..]`.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Operators, Predicate, QueryFilter};

/// Key under which disjunctions are attached.
pub const OR_KEY: &str = "$or";

/// Operator wrapped around every field of a negated sub-filter.
pub const NOT_EQUAL: &str = "$ne";

/// A compiled, engine-native filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NativeFilter(Map<String, Value>);

impl NativeFilter {
    /// Creates an empty filter.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the compiled value for a key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// Returns true if the filter has no clauses.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Number of top-level clauses.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the top-level clauses.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Returns the underlying JSON object.
    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }

    /// Consumes the filter, returning the underlying JSON object.
    pub fn into_map(self) -> Map<String, Value> {
        self.0
    }

    /// Converts into a JSON value.
    pub fn into_value(self) -> Value {
        Value::Object(self.0)
    }

    fn insert(&mut self, key: String, value: Value) {
        self.0.insert(key, value);
    }
}

impl From<Map<String, Value>> for NativeFilter {
    fn from(map: Map<String, Value>) -> Self {
        Self(map)
    }
}

impl fmt::Display for NativeFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", Value::Object(self.0.clone()))
    }
}

/// Compiles the predicate part of a filter.
///
/// Steps, applied depth-first:
///
/// 1. Each condition writes its field onto the result. A later condition on
///    the same field replaces an earlier one; conditions are not merged.
/// 2. Each `and` branch is compiled and shallow-merged into the result, in
///    list order, overwriting fields already present.
/// 3. A non-empty `or` list is attached as `"$or": [branch, ..]`.
/// 4. `not` is compiled and every key of its result is written onto the
///    result wrapped as `{"$ne": value}`.
///
/// Negation is per field, not logical: `not { a: 1 }` gives `{a: {$ne: 1}}`,
/// but `not { or: [..] }` gives `{"$or": {"$ne": [..]}}` rather than the
/// De Morgan conjunction of negations, and `not` of an operator set gives a
/// literal inequality against that operator object. Callers needing logical
/// negation of a compound filter must express it explicitly.
///
/// Pagination, sort order and projection are cursor options and are left to
/// the engine. The result depends only on the filter value.
pub fn compile(filter: &QueryFilter) -> NativeFilter {
    let mut result = NativeFilter::new();

    for condition in &filter.conditions {
        result.insert(condition.field.clone(), compile_predicate(&condition.predicate));
    }

    for branch in &filter.and {
        for (key, value) in compile(branch).into_map() {
            result.insert(key, value);
        }
    }

    if !filter.or.is_empty() {
        let branches: Vec<Value> = filter
            .or
            .iter()
            .map(|branch| compile(branch).into_value())
            .collect();
        result.insert(OR_KEY.to_string(), Value::Array(branches));
    }

    if let Some(negated) = &filter.not {
        for (key, value) in compile(negated).into_map() {
            let mut negation = Map::new();
            negation.insert(NOT_EQUAL.to_string(), value);
            result.insert(key, Value::Object(negation));
        }
    }

    result
}

fn compile_predicate(predicate: &Predicate) -> Value {
    match predicate {
        Predicate::Value(value) => value.clone(),
        Predicate::Operators(operators) => Value::Object(compile_operators(operators)),
    }
}

fn compile_operators(operators: &Operators) -> Map<String, Value> {
    let mut map = Map::new();
    let scalar = [
        ("$eq", &operators.eq),
        ("$ne", &operators.ne),
        ("$gt", &operators.gt),
        ("$gte", &operators.gte),
        ("$lt", &operators.lt),
        ("$lte", &operators.lte),
    ];
    for (key, value) in scalar {
        if let Some(value) = value {
            map.insert(key.to_string(), value.clone());
        }
    }
    if let Some(values) = &operators.in_ {
        map.insert("$in".to_string(), Value::Array(values.clone()));
    }
    if let Some(values) = &operators.nin {
        map.insert("$nin".to_string(), Value::Array(values.clone()));
    }
    if let Some(pattern) = &operators.regex {
        map.insert("$regex".to_string(), Value::String(pattern.clone()));
    }
    map
}
