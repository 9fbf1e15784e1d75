//! Database-agnostic criteria builder for paranoid storage.
//!
//! A [`Query`] is bound to a registered [`DocumentType`] and starts out with
//! that type's default scope. The default scope is kept apart from the
//! caller's own filters so that `unscoped`, `with_deleted` and named scopes
//! can remove it instead of merely masking it. Backends read the effective
//! predicate list from [`Query::selector`]; every filter is joined with AND.

use std::cmp::Ordering;
use std::sync::Arc;

use serde_json::Value as JsonValue;

use crate::document::Attributes;
use crate::schema::DocumentType;
use crate::{ParanoiaError, Timestamp};

/// A value that can be bound to a query parameter or an update.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Strings(Vec<String>),
    Datetime(Timestamp),
    Json(JsonValue),
    Null,
}

impl Value {
    /// The stored (JSON) form of this value.
    pub fn to_json(&self) -> JsonValue {
        match self {
            Value::String(s) => JsonValue::String(s.clone()),
            Value::Int(n) => JsonValue::from(*n),
            Value::Float(n) => JsonValue::from(*n),
            Value::Bool(b) => JsonValue::Bool(*b),
            Value::Strings(v) => JsonValue::from(v.clone()),
            Value::Datetime(dt) => dt.to_json(),
            Value::Json(v) => v.clone(),
            Value::Null => JsonValue::Null,
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&String> for Value {
    fn from(s: &String) -> Self {
        Value::String(s.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<Vec<String>> for Value {
    fn from(v: Vec<String>) -> Self {
        Value::Strings(v)
    }
}

impl<'a> From<Vec<&'a str>> for Value {
    fn from(v: Vec<&'a str>) -> Self {
        Value::Strings(v.into_iter().map(|s| s.to_string()).collect())
    }
}

impl From<Timestamp> for Value {
    fn from(dt: Timestamp) -> Self {
        Value::Datetime(dt)
    }
}

impl From<JsonValue> for Value {
    fn from(v: JsonValue) -> Self {
        Value::Json(v)
    }
}

/// Filter conditions for queries.
#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    /// field = value
    Eq(String, Value),
    /// field != value
    Ne(String, Value),
    /// field > value
    Gt(String, Value),
    /// field >= value
    Gte(String, Value),
    /// field < value
    Lt(String, Value),
    /// field <= value
    Lte(String, Value),
    /// field IN (values)
    In(String, Value),
    /// field IS NULL (absent or null)
    IsNull(String),
    /// field IS NOT NULL
    IsNotNull(String),
}

impl Filter {
    /// The (possibly dotted) field path this filter constrains.
    pub fn field(&self) -> &str {
        match self {
            Filter::Eq(field, _)
            | Filter::Ne(field, _)
            | Filter::Gt(field, _)
            | Filter::Gte(field, _)
            | Filter::Lt(field, _)
            | Filter::Lte(field, _)
            | Filter::In(field, _)
            | Filter::IsNull(field)
            | Filter::IsNotNull(field) => field,
        }
    }

    /// Evaluate the filter against a stored document.
    pub fn matches(&self, document: &Attributes) -> bool {
        let stored = lookup(document, self.field()).filter(|v| !v.is_null());
        match self {
            Filter::Eq(_, value) => equals(stored, value),
            Filter::Ne(_, value) => !equals(stored, value),
            Filter::Gt(_, value) => compare(stored, value) == Some(Ordering::Greater),
            Filter::Gte(_, value) => matches!(
                compare(stored, value),
                Some(Ordering::Greater | Ordering::Equal)
            ),
            Filter::Lt(_, value) => compare(stored, value) == Some(Ordering::Less),
            Filter::Lte(_, value) => matches!(
                compare(stored, value),
                Some(Ordering::Less | Ordering::Equal)
            ),
            Filter::In(_, Value::Strings(values)) => stored
                .and_then(JsonValue::as_str)
                .is_some_and(|s| values.iter().any(|v| v == s)),
            Filter::In(_, value) => equals(stored, value),
            Filter::IsNull(_) => stored.is_none(),
            Filter::IsNotNull(_) => stored.is_some(),
        }
    }
}

fn equals(stored: Option<&JsonValue>, value: &Value) -> bool {
    match (stored, value.to_json()) {
        (None, JsonValue::Null) => true,
        (None, _) => false,
        (Some(stored), expected) => match (stored.as_f64(), expected.as_f64()) {
            (Some(a), Some(b)) => a.partial_cmp(&b) == Some(Ordering::Equal),
            _ => *stored == expected,
        },
    }
}

fn compare(stored: Option<&JsonValue>, value: &Value) -> Option<Ordering> {
    let stored = stored?;
    let expected = value.to_json();
    match (stored, &expected) {
        (JsonValue::Number(a), JsonValue::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (JsonValue::String(a), JsonValue::String(b)) => Some(a.cmp(b)),
        (JsonValue::Bool(a), JsonValue::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Resolve a dotted path (`phones.0.deletedAt`) inside a document. Numeric
/// segments index into arrays.
pub fn lookup<'a>(document: &'a Attributes, path: &str) -> Option<&'a JsonValue> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = match current {
            JsonValue::Object(map) => map.get(segment)?,
            JsonValue::Array(items) => items.get(segment.parse::<usize>().ok()?)?,
            _ => return None,
        };
    }
    Some(current)
}

/// Sort order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Order {
    Asc,
    Desc,
}

/// A named scope installed on a document type.
///
/// Applying the scope first lifts every default-scope filter on one of the
/// `lifts` fields, then adds `filters`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scope {
    pub filters: Vec<Filter>,
    pub lifts: Vec<String>,
}

impl Scope {
    pub fn new(filters: Vec<Filter>) -> Self {
        Self {
            filters,
            lifts: Vec::new(),
        }
    }

    /// Replace the default-scope constraint on `field` instead of ANDing
    /// with it.
    pub fn lifting(mut self, field: impl Into<String>) -> Self {
        self.lifts.push(field.into());
        self
    }
}

/// A SELECT query builder bound to a document type.
#[derive(Debug, Clone)]
pub struct Query {
    document_type: Arc<DocumentType>,
    /// Default-scope filters still in effect.
    pub default_scope: Vec<Filter>,
    /// Caller filters.
    pub filters: Vec<Filter>,
    /// Order by clauses.
    pub order_by: Vec<(String, Order)>,
    /// Maximum number of results.
    pub limit: Option<u64>,
    /// Offset for pagination.
    pub offset: Option<u64>,
}

impl Query {
    /// Create a default-scoped query for a document type.
    pub fn new(document_type: &Arc<DocumentType>) -> Self {
        Self {
            default_scope: document_type.default_scope().to_vec(),
            document_type: Arc::clone(document_type),
            filters: Vec::new(),
            order_by: Vec::new(),
            limit: None,
            offset: None,
        }
    }

    pub fn document_type(&self) -> &Arc<DocumentType> {
        &self.document_type
    }

    /// The collection the query runs against.
    pub fn collection(&self) -> &str {
        self.document_type.collection()
    }

    /// Effective predicate list: remaining default scope, then caller filters.
    pub fn selector(&self) -> Vec<Filter> {
        self.default_scope
            .iter()
            .chain(self.filters.iter())
            .cloned()
            .collect()
    }

    /// Whether a stored document satisfies every predicate of the selector.
    pub fn matches(&self, document: &Attributes) -> bool {
        self.default_scope
            .iter()
            .chain(self.filters.iter())
            .all(|filter| filter.matches(document))
    }

    /// Drop the whole default scope for this query.
    pub fn unscoped(mut self) -> Self {
        self.default_scope.clear();
        self
    }

    /// Drop only the deletion-marker constraints from the default scope,
    /// keeping any other default predicates. No-op for non-paranoid types.
    pub fn with_deleted(mut self) -> Self {
        if let Some(paranoia) = self.document_type.paranoia() {
            self.default_scope
                .retain(|filter| !paranoia.is_marker_field(filter.field()));
        }
        self
    }

    /// Restrict the query to soft-deleted documents.
    pub fn deleted(self) -> Result<Self, ParanoiaError> {
        self.scoped(crate::paranoia::DELETED_SCOPE)
    }

    /// Apply a named scope registered on the document type.
    pub fn scoped(mut self, name: &str) -> Result<Self, ParanoiaError> {
        let scope = self
            .document_type
            .scope(name)
            .cloned()
            .ok_or_else(|| ParanoiaError::UnknownScope {
                document: self.document_type.name().to_string(),
                scope: name.to_string(),
            })?;
        self.default_scope
            .retain(|filter| !scope.lifts.iter().any(|f| f == filter.field()));
        self.filters.extend(scope.filters);
        Ok(self)
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality filter (shorthand for Filter::Eq).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }

    /// Add an inequality filter.
    pub fn ne(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Ne(field.into(), value.into()))
    }

    /// Add an IN filter (shorthand for Filter::In).
    pub fn r#in(self, field: impl Into<String>, values: impl Into<Value>) -> Self {
        self.filter(Filter::In(field.into(), values.into()))
    }

    /// Add a greater-than filter.
    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gt(field.into(), value.into()))
    }

    /// Add a greater-than-or-equal filter.
    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Gte(field.into(), value.into()))
    }

    /// Add a less-than filter.
    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lt(field.into(), value.into()))
    }

    /// Add a less-than-or-equal filter.
    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Lte(field.into(), value.into()))
    }

    /// Add an order-by clause.
    pub fn order_by(mut self, field: impl Into<String>, order: Order) -> Self {
        self.order_by.push((field.into(), order));
        self
    }

    /// Set the maximum number of results.
    pub fn limit(mut self, limit: u64) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the offset for pagination.
    pub fn offset(mut self, offset: u64) -> Self {
        self.offset = Some(offset);
        self
    }
}

/// A DELETE query builder for top-level records.
#[derive(Debug, Clone)]
pub struct Delete {
    /// The collection to delete from.
    pub collection: String,
    /// Filter conditions.
    pub filters: Vec<Filter>,
}

impl Delete {
    pub fn new(collection: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            filters: Vec::new(),
        }
    }

    /// Add a filter condition.
    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }

    /// Add an equality filter (shorthand).
    pub fn eq(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.filter(Filter::Eq(field.into(), value.into()))
    }
}

/// One field-level operation of a targeted update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOp {
    /// Set the value at a dotted path.
    Set(String, Value),
    /// Remove the value at a dotted path.
    Unset(String),
    /// Append a document to the array at a dotted path.
    Push(String, Attributes),
    /// Remove the element whose `_id` equals the given id from the array at a
    /// dotted path.
    Pull(String, String),
    /// Set a field of the array element whose `_id` equals the given id:
    /// container path, element id, field, value.
    SetIn(String, String, String, Value),
    /// Remove a field of the array element whose `_id` equals the given id.
    UnsetIn(String, String, String),
}

/// A targeted field-level update against one stored record.
///
/// Embedded documents are updated through their root record. Elements of an
/// embeds-many array are addressed by their `_id` (`SetIn`, `UnsetIn`,
/// `Pull`), never by position.
#[derive(Debug, Clone, PartialEq)]
pub struct Update {
    pub collection: String,
    pub id: String,
    pub ops: Vec<UpdateOp>,
}

impl Update {
    pub fn new(collection: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            collection: collection.into(),
            id: id.into(),
            ops: Vec::new(),
        }
    }

    pub fn set(mut self, path: impl Into<String>, value: impl Into<Value>) -> Self {
        self.ops.push(UpdateOp::Set(path.into(), value.into()));
        self
    }

    pub fn unset(mut self, path: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Unset(path.into()));
        self
    }

    pub fn push(mut self, path: impl Into<String>, document: Attributes) -> Self {
        self.ops.push(UpdateOp::Push(path.into(), document));
        self
    }

    pub fn pull(mut self, path: impl Into<String>, id: impl Into<String>) -> Self {
        self.ops.push(UpdateOp::Pull(path.into(), id.into()));
        self
    }

    pub fn set_in(
        mut self,
        container: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self {
        self.ops.push(UpdateOp::SetIn(
            container.into(),
            id.into(),
            field.into(),
            value.into(),
        ));
        self
    }

    pub fn unset_in(
        mut self,
        container: impl Into<String>,
        id: impl Into<String>,
        field: impl Into<String>,
    ) -> Self {
        self.ops
            .push(UpdateOp::UnsetIn(container.into(), id.into(), field.into()));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
