//! Evaluation of compiled filters over JSON documents.

use std::cmp::Ordering;
use std::collections::HashMap;

use regex::Regex;
use serde_json::{Map, Value};

use crate::core::Document;
use crate::error::BackendError;
use crate::query::compiler::OR_KEY;
use crate::query::{NativeFilter, Projection, SortKey, SortOrder};
use crate::store::compare_numbers;

/// A compiled filter, ready to be evaluated against many documents.
///
/// Every `$regex` pattern is compiled once, when the matcher is built.
#[derive(Debug)]
pub struct Matcher<'f> {
    filter: &'f Map<String, Value>,
    patterns: HashMap<&'f str, Regex>,
}

impl<'f> Matcher<'f> {
    /// Prepares `filter` for evaluation.
    pub fn new(filter: &'f NativeFilter) -> Result<Self, BackendError> {
        let mut patterns = HashMap::new();
        collect_patterns(filter.as_map(), &mut patterns)?;
        Ok(Self {
            filter: filter.as_map(),
            patterns,
        })
    }

    /// Returns true if `document` satisfies the filter.
    pub fn matches(&self, document: &Document) -> Result<bool, BackendError> {
        self.matches_map(document, self.filter)
    }

    fn matches_map(
        &self,
        document: &Document,
        filter: &Map<String, Value>,
    ) -> Result<bool, BackendError> {
        for (key, expected) in filter {
            let satisfied = if key == OR_KEY {
                self.matches_any(document, expected)?
            } else if key.starts_with('$') {
                return Err(BackendError::QueryError {
                    message: format!("unsupported top-level operator '{}'", key),
                });
            } else {
                self.matches_field(lookup(document, key), expected)?
            };
            if !satisfied {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn matches_any(&self, document: &Document, branches: &Value) -> Result<bool, BackendError> {
        let Value::Array(branches) = branches else {
            return Err(BackendError::QueryError {
                message: format!("'{}' expects an array, got {}", OR_KEY, branches),
            });
        };
        for branch in branches {
            let Value::Object(branch) = branch else {
                return Err(BackendError::QueryError {
                    message: format!("'{}' branch must be an object, got {}", OR_KEY, branch),
                });
            };
            if self.matches_map(document, branch)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn matches_field(
        &self,
        actual: Option<&Value>,
        expected: &Value,
    ) -> Result<bool, BackendError> {
        let Some(operators) = operator_object(expected) else {
            return Ok(literal_eq(actual, expected));
        };

        for (operator, operand) in operators {
            let satisfied = match operator.as_str() {
                "$eq" => literal_eq(actual, operand),
                "$ne" => !literal_eq(actual, operand),
                "$gt" => compare(actual, operand).is_some_and(|o| o == Ordering::Greater),
                "$gte" => compare(actual, operand).is_some_and(|o| o != Ordering::Less),
                "$lt" => compare(actual, operand).is_some_and(|o| o == Ordering::Less),
                "$lte" => compare(actual, operand).is_some_and(|o| o != Ordering::Greater),
                "$in" => array_operand(operator, operand)?
                    .iter()
                    .any(|candidate| literal_eq(actual, candidate)),
                "$nin" => !array_operand(operator, operand)?
                    .iter()
                    .any(|candidate| literal_eq(actual, candidate)),
                "$regex" => {
                    let regex = operand
                        .as_str()
                        .and_then(|pattern| self.patterns.get(pattern))
                        .ok_or_else(|| BackendError::QueryError {
                            message: format!("'$regex' expects a string, got {}", operand),
                        })?;
                    matches!(actual, Some(Value::String(s)) if regex.is_match(s))
                }
                other => {
                    return Err(BackendError::QueryError {
                        message: format!("unsupported operator '{}'", other),
                    });
                }
            };
            if !satisfied {
                return Ok(false);
            }
        }
        Ok(true)
    }
}

fn collect_patterns<'f>(
    filter: &'f Map<String, Value>,
    patterns: &mut HashMap<&'f str, Regex>,
) -> Result<(), BackendError> {
    for (key, value) in filter {
        if key == OR_KEY {
            for branch in value.as_array().into_iter().flatten() {
                if let Value::Object(branch) = branch {
                    collect_patterns(branch, patterns)?;
                }
            }
        } else if let Some(pattern) = operator_object(value)
            .and_then(|operators| operators.get("$regex"))
            .and_then(Value::as_str)
        {
            if !patterns.contains_key(pattern) {
                patterns.insert(pattern, Regex::new(pattern)?);
            }
        }
    }
    Ok(())
}

/// Resolves a dotted path against a document.
pub fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Returns the operator map if every key of `value` is an operator.
fn operator_object(value: &Value) -> Option<&Map<String, Value>> {
    match value {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => {
            Some(map)
        }
        _ => None,
    }
}

fn array_operand<'a>(operator: &str, operand: &'a Value) -> Result<&'a Vec<Value>, BackendError> {
    operand.as_array().ok_or_else(|| BackendError::QueryError {
        message: format!("'{}' expects an array, got {}", operator, operand),
    })
}

/// Missing fields compare equal to `null`.
fn literal_eq(actual: Option<&Value>, expected: &Value) -> bool {
    match (actual, expected) {
        (None, Value::Null) => true,
        (None, _) => false,
        (Some(Value::Number(a)), Value::Number(b)) => {
            compare_numbers(a, b) == Some(Ordering::Equal)
        }
        (Some(a), b) => a == b,
    }
}

/// Orders values of the same kind; values of different kinds do not compare.
fn compare(actual: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (actual?, operand) {
        (Value::Number(a), Value::Number(b)) => compare_numbers(a, b),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

fn type_rank(value: Option<&Value>) -> u8 {
    match value {
        None | Some(Value::Null) => 0,
        Some(Value::Number(_)) => 1,
        Some(Value::String(_)) => 2,
        Some(Value::Object(_)) => 3,
        Some(Value::Array(_)) => 4,
        Some(Value::Bool(_)) => 5,
    }
}

/// Total order used for sorting: by kind first, then by value.
fn sort_cmp(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    type_rank(a).cmp(&type_rank(b)).then_with(|| match (a, b) {
        (Some(Value::Number(x)), Some(Value::Number(y))) => {
            compare_numbers(x, y).unwrap_or(Ordering::Equal)
        }
        (Some(Value::String(x)), Some(Value::String(y))) => x.cmp(y),
        (Some(Value::Bool(x)), Some(Value::Bool(y))) => x.cmp(y),
        (Some(x), Some(y)) => x.to_string().cmp(&y.to_string()),
        _ => Ordering::Equal,
    })
}

/// Sorts documents by the given keys, earlier keys first. Stable.
pub fn sort_documents(documents: &mut [Document], keys: &[SortKey]) {
    if keys.is_empty() {
        return;
    }
    documents.sort_by(|a, b| {
        keys.iter().fold(Ordering::Equal, |ordering, key| {
            ordering.then_with(|| {
                let ordering = sort_cmp(lookup(a, &key.field), lookup(b, &key.field));
                match key.order {
                    SortOrder::Ascending => ordering,
                    SortOrder::Descending => ordering.reverse(),
                }
            })
        })
    });
}

/// Applies a field projection to a document.
pub fn project(document: Document, projection: &Projection) -> Document {
    match projection {
        Projection::Include(fields) => document
            .into_iter()
            .filter(|(key, _)| fields.contains(key))
            .collect(),
        Projection::Exclude(fields) => document
            .into_iter()
            .filter(|(key, _)| !fields.contains(key))
            .collect(),
    }
}
