//! Composable query filters.
//!
//! A [`QueryFilter`] describes a predicate (conditions combined with `and`,
//! `or` and `not`) plus cursor-level options (pagination, sort order and
//! field projection). Filters are engine-agnostic; [`compile`] turns the
//! predicate part into a [`NativeFilter`] that engines evaluate.
//!
//! # Example
//!
//! ```
//! use helios_datastore::query::{Condition, Operators, QueryFilter, SortKey};
//! use serde_json::json;
//!
//! let filter = QueryFilter::new()
//!     .with_condition(Condition::eq("status", "active"))
//!     .with_condition(Condition::new("age", Operators::new().gte(18).lt(65)))
//!     .with_or(QueryFilter::new().with_condition(Condition::eq("role", "admin")))
//!     .with_sort(SortKey::descending("created_at"))
//!     .with_page(2)
//!     .with_limit(10);
//!
//! let native = filter.compile();
//! assert_eq!(native.get("status"), Some(&json!("active")));
//! assert_eq!(native.get("age"), Some(&json!({"$gte": 18, "$lt": 65})));
//! ```

pub mod compiler;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use compiler::{NativeFilter, compile};

/// A recursive, engine-agnostic query filter.
///
/// Conditions in one filter are implicitly ANDed. `and` and `or` branches are
/// filters in their own right. See [`compile`] for the exact semantics,
/// including the per-field behavior of `not`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QueryFilter {
    /// Field conditions, ANDed.
    pub conditions: Vec<Condition>,

    /// Sub-filters merged into this one.
    pub and: Vec<QueryFilter>,

    /// Sub-filters of which at least one must match.
    pub or: Vec<QueryFilter>,

    /// Sub-filter whose fields are negated one by one.
    pub not: Option<Box<QueryFilter>>,

    /// 1-indexed page number. Ignored without `limit`.
    pub page: Option<u64>,

    /// Maximum number of results.
    pub limit: Option<u64>,

    /// Sort keys, highest priority first.
    pub sort: Vec<SortKey>,

    /// Field projection.
    pub fields: Option<Projection>,
}

impl QueryFilter {
    /// Creates an empty filter that matches everything.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a filter from a list of conditions.
    pub fn from_conditions(conditions: Vec<Condition>) -> Self {
        Self {
            conditions,
            ..Default::default()
        }
    }

    /// Adds a condition.
    pub fn with_condition(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Adds an `and` branch.
    pub fn with_and(mut self, filter: QueryFilter) -> Self {
        self.and.push(filter);
        self
    }

    /// Adds an `or` branch.
    pub fn with_or(mut self, filter: QueryFilter) -> Self {
        self.or.push(filter);
        self
    }

    /// Sets the negated sub-filter.
    pub fn with_not(mut self, filter: QueryFilter) -> Self {
        self.not = Some(Box::new(filter));
        self
    }

    /// Sets the page number (1-indexed).
    pub fn with_page(mut self, page: u64) -> Self {
        self.page = Some(page);
        self
    }

    /// Sets the result limit.
    pub fn with_limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Appends a sort key.
    pub fn with_sort(mut self, key: SortKey) -> Self {
        self.sort.push(key);
        self
    }

    /// Sets the field projection.
    pub fn with_projection(mut self, projection: Projection) -> Self {
        self.fields = Some(projection);
        self
    }

    /// Compiles the predicate part of this filter.
    pub fn compile(&self) -> NativeFilter {
        compile(self)
    }

    /// Returns the number of records to skip, if pagination applies.
    ///
    /// `page` without `limit` has no effect, and page `0` is treated as page `1`.
    pub fn skip(&self) -> Option<u64> {
        match (self.page, self.limit) {
            (Some(page), Some(limit)) => Some(page.saturating_sub(1).saturating_mul(limit)),
            _ => None,
        }
    }

    /// Returns true if the predicate part is empty (matches everything).
    pub fn is_match_all(&self) -> bool {
        self.conditions.is_empty()
            && self.and.is_empty()
            && self.or.is_empty()
            && self.not.is_none()
    }
}

/// A condition on a single field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    /// The field name. Dotted paths address nested fields.
    pub field: String,
    /// What the field must satisfy.
    pub predicate: Predicate,
}

impl Condition {
    /// Creates a condition from a field and predicate.
    pub fn new(field: impl Into<String>, predicate: impl Into<Predicate>) -> Self {
        Self {
            field: field.into(),
            predicate: predicate.into(),
        }
    }

    /// Shorthand for a literal equality condition.
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Predicate::Value(value.into()))
    }
}

/// The right-hand side of a condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Predicate {
    /// A literal value, shorthand for `eq`.
    Value(Value),
    /// A set of comparison operators, all of which must hold.
    Operators(Operators),
}

impl From<Operators> for Predicate {
    fn from(operators: Operators) -> Self {
        Predicate::Operators(operators)
    }
}

impl From<Value> for Predicate {
    fn from(value: Value) -> Self {
        Predicate::Value(value)
    }
}

/// Comparison operators for one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Operators {
    /// Equal to.
    pub eq: Option<Value>,
    /// Not equal to.
    pub ne: Option<Value>,
    /// Greater than.
    pub gt: Option<Value>,
    /// Greater than or equal to.
    pub gte: Option<Value>,
    /// Less than.
    pub lt: Option<Value>,
    /// Less than or equal to.
    pub lte: Option<Value>,
    /// One of.
    #[serde(rename = "in")]
    pub in_: Option<Vec<Value>>,
    /// None of.
    pub nin: Option<Vec<Value>>,
    /// Matches the regular expression.
    pub regex: Option<String>,
}

impl Operators {
    /// Creates an empty operator set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets `eq`.
    pub fn eq(mut self, value: impl Into<Value>) -> Self {
        self.eq = Some(value.into());
        self
    }

    /// Sets `ne`.
    pub fn ne(mut self, value: impl Into<Value>) -> Self {
        self.ne = Some(value.into());
        self
    }

    /// Sets `gt`.
    pub fn gt(mut self, value: impl Into<Value>) -> Self {
        self.gt = Some(value.into());
        self
    }

    /// Sets `gte`.
    pub fn gte(mut self, value: impl Into<Value>) -> Self {
        self.gte = Some(value.into());
        self
    }

    /// Sets `lt`.
    pub fn lt(mut self, value: impl Into<Value>) -> Self {
        self.lt = Some(value.into());
        self
    }

    /// Sets `lte`.
    pub fn lte(mut self, value: impl Into<Value>) -> Self {
        self.lte = Some(value.into());
        self
    }

    /// Field must equal one of `values`.
    pub fn is_in<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.in_ = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Field must equal none of `values`.
    pub fn not_in<I, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.nin = Some(values.into_iter().map(Into::into).collect());
        self
    }

    /// Field must be a string matching `pattern`.
    pub fn regex(mut self, pattern: impl Into<String>) -> Self {
        self.regex = Some(pattern.into());
        self
    }

    /// Returns true if no operator is set.
    pub fn is_empty(&self) -> bool {
        self.eq.is_none()
            && self.ne.is_none()
            && self.gt.is_none()
            && self.gte.is_none()
            && self.lt.is_none()
            && self.lte.is_none()
            && self.in_.is_none()
            && self.nin.is_none()
            && self.regex.is_none()
    }
}

/// Sort direction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    /// Ascending order.
    #[default]
    Ascending,
    /// Descending order.
    Descending,
}

/// A single sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortKey {
    /// The field to sort by.
    pub field: String,
    /// The sort direction.
    pub order: SortOrder,
}

impl SortKey {
    /// Ascending key on `field`.
    pub fn ascending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Ascending,
        }
    }

    /// Descending key on `field`.
    pub fn descending(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            order: SortOrder::Descending,
        }
    }

    /// Parses a sort key (e.g., "-created_at" for descending).
    pub fn parse(s: &str) -> Self {
        if let Some(stripped) = s.strip_prefix('-') {
            Self::descending(stripped)
        } else {
            Self::ascending(s)
        }
    }
}

/// Which fields to return.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Projection {
    /// Only these fields.
    Include(Vec<String>),
    /// All fields except these.
    Exclude(Vec<String>),
}
