//! SurrealDB implementation of DocumentStore.
//!
//! Documents keep their own `_id` field; SurrealDB's record `id` is never
//! read back (`OMIT id`). Array elements are addressed by `_id`
//! (`phones[WHERE _id = $id].deletedAt`); numeric segments of nested paths
//! are rewritten from `phones.1.deletedAt` to `phones[1].deletedAt`.

use async_trait::async_trait;
use paranoid_storage::{
    Attributes, Delete, DocumentStore, Filter, ID_FIELD, Order, ParanoiaError, Query, Update,
    UpdateOp, Value,
};
use serde::Deserialize;
use serde_json::Value as JsonValue;
use std::ops::Deref;
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Client;
use tracing::debug;

/// Helper struct for deserializing count() results from SurrealDB.
#[derive(Debug, Deserialize)]
struct CountResult {
    count: u64,
}

/// Wrapper around the SurrealDB client.
///
/// `DocumentStore` cannot be implemented on `Surreal<Client>` directly since
/// both are foreign to this crate.
#[derive(Clone)]
pub struct SurrealStore(Surreal<Client>);

impl SurrealStore {
    pub fn new(db: Surreal<Client>) -> Self {
        Self(db)
    }

    pub fn inner(&self) -> &Surreal<Client> {
        &self.0
    }
}

impl Deref for SurrealStore {
    type Target = Surreal<Client>;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

fn storage_error(e: surrealdb::Error) -> ParanoiaError {
    ParanoiaError::StorageError(e.to_string())
}

/// Rewrite numeric segments of a dotted path as index accessors.
pub(crate) fn field_path(path: &str) -> String {
    let mut out = String::new();
    for segment in path.split('.') {
        if !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit()) {
            out.push('[');
            out.push_str(segment);
            out.push(']');
        } else {
            if !out.is_empty() {
                out.push('.');
            }
            out.push_str(segment);
        }
    }
    out
}

fn is_null(value: &Value) -> bool {
    matches!(value, Value::Null | Value::Json(JsonValue::Null))
}

/// Build a WHERE clause from filters for SurrealQL.
pub(crate) fn build_where_clause(filters: &[Filter]) -> String {
    if filters.is_empty() {
        return String::new();
    }

    let clauses: Vec<String> = filters
        .iter()
        .enumerate()
        .map(|(i, filter)| {
            let param = format!("$p{}", i);
            match filter {
                Filter::Eq(field, value) if is_null(value) => {
                    let field = field_path(field);
                    format!("({} IS NONE OR {} IS NULL)", field, field)
                }
                Filter::Ne(field, value) if is_null(value) => {
                    let field = field_path(field);
                    format!("({} IS NOT NONE AND {} IS NOT NULL)", field, field)
                }
                Filter::Eq(field, _) => format!("{} = {}", field_path(field), param),
                Filter::Ne(field, _) => format!("{} != {}", field_path(field), param),
                Filter::Gt(field, _) => format!("{} > {}", field_path(field), param),
                Filter::Gte(field, _) => format!("{} >= {}", field_path(field), param),
                Filter::Lt(field, _) => format!("{} < {}", field_path(field), param),
                Filter::Lte(field, _) => format!("{} <= {}", field_path(field), param),
                Filter::In(field, _) => format!("{} CONTAINS {}", param, field_path(field)),
                // An absent field reads as NONE, an explicit null as NULL.
                Filter::IsNull(field) => {
                    let field = field_path(field);
                    format!("({} IS NONE OR {} IS NULL)", field, field)
                }
                Filter::IsNotNull(field) => {
                    let field = field_path(field);
                    format!("({} IS NOT NONE AND {} IS NOT NULL)", field, field)
                }
            }
        })
        .collect();

    format!(" WHERE {}", clauses.join(" AND "))
}

/// Build ORDER BY clause for SurrealQL.
pub(crate) fn build_order_clause(order_by: &[(String, Order)]) -> String {
    if order_by.is_empty() {
        return String::new();
    }

    let clauses: Vec<String> = order_by
        .iter()
        .map(|(field, order)| {
            let dir = match order {
                Order::Asc => "ASC",
                Order::Desc => "DESC",
            };
            format!("{} {}", field_path(field), dir)
        })
        .collect();

    format!(" ORDER BY {}", clauses.join(", "))
}

pub(crate) fn build_select(query: &Query, filters: &[Filter]) -> String {
    let mut sql = format!(
        "SELECT * OMIT id FROM {}{}{}",
        query.collection(),
        build_where_clause(filters),
        build_order_clause(&query.order_by)
    );
    if let Some(limit) = query.limit {
        sql.push_str(&format!(" LIMIT {}", limit));
    }
    if let Some(offset) = query.offset {
        sql.push_str(&format!(" START {}", offset));
    }
    sql
}

/// Build the SET list of an UPDATE; the i-th op binds `$u{i}`.
pub(crate) fn build_set_clause(ops: &[UpdateOp]) -> String {
    let assignments: Vec<String> = ops
        .iter()
        .enumerate()
        .map(|(i, op)| {
            let param = format!("$u{}", i);
            match op {
                UpdateOp::Set(path, _) => format!("{} = {}", field_path(path), param),
                UpdateOp::Unset(path) => format!("{} = NONE", field_path(path)),
                UpdateOp::Push(path, _) => {
                    let path = field_path(path);
                    format!("{} = array::append({} ?? [], {})", path, path, param)
                }
                UpdateOp::Pull(path, _) => {
                    let path = field_path(path);
                    format!("{} = {}[WHERE {} != {}]", path, path, ID_FIELD, param)
                }
                UpdateOp::SetIn(container, _, field, _) => format!(
                    "{}[WHERE {} = {}_id].{} = {}",
                    field_path(container),
                    ID_FIELD,
                    param,
                    field_path(field),
                    param
                ),
                UpdateOp::UnsetIn(container, _, field) => format!(
                    "{}[WHERE {} = {}_id].{} = NONE",
                    field_path(container),
                    ID_FIELD,
                    param,
                    field_path(field)
                ),
            }
        })
        .collect();
    assignments.join(", ")
}

/// Helper to bind a Value to a SurrealDB query.
fn bind_value<'a, C: surrealdb::Connection>(
    q: surrealdb::method::Query<'a, C>,
    param: &str,
    value: &Value,
) -> surrealdb::method::Query<'a, C> {
    match value {
        Value::String(s) => q.bind((param.to_owned(), s.clone())),
        Value::Int(n) => q.bind((param.to_owned(), *n)),
        Value::Float(n) => q.bind((param.to_owned(), *n)),
        Value::Bool(b) => q.bind((param.to_owned(), *b)),
        Value::Strings(v) => q.bind((param.to_owned(), v.clone())),
        // Stored as the fixed-width RFC 3339 string.
        Value::Datetime(t) => q.bind((param.to_owned(), t.to_string())),
        Value::Json(v) => q.bind((param.to_owned(), v.clone())),
        Value::Null => q.bind((param.to_owned(), Option::<String>::None)),
    }
}

fn bind_filters<'a, C: surrealdb::Connection>(
    mut q: surrealdb::method::Query<'a, C>,
    filters: &[Filter],
) -> surrealdb::method::Query<'a, C> {
    for (i, filter) in filters.iter().enumerate() {
        let param = format!("p{}", i);
        q = match filter {
            Filter::Eq(_, v) | Filter::Ne(_, v) if is_null(v) => q,
            Filter::Eq(_, v)
            | Filter::Ne(_, v)
            | Filter::Gt(_, v)
            | Filter::Gte(_, v)
            | Filter::Lt(_, v)
            | Filter::Lte(_, v)
            | Filter::In(_, v) => bind_value(q, &param, v),
            Filter::IsNull(_) | Filter::IsNotNull(_) => q,
        };
    }
    q
}

fn into_attributes(rows: Vec<JsonValue>) -> Vec<Attributes> {
    rows.into_iter()
        .filter_map(|row| match row {
            JsonValue::Object(map) => Some(map),
            _ => None,
        })
        .collect()
}

#[async_trait]
impl DocumentStore for SurrealStore {
    async fn fetch(&self, query: &Query) -> Result<Vec<Attributes>, ParanoiaError> {
        let filters = query.selector();
        let sql = build_select(query, &filters);
        debug!(%sql, "fetch");

        let rows: Vec<JsonValue> = bind_filters(self.0.query(&sql), &filters)
            .await
            .map_err(storage_error)?
            .take(0)
            .map_err(storage_error)?;

        Ok(into_attributes(rows))
    }

    async fn count(&self, query: &Query) -> Result<u64, ParanoiaError> {
        let filters = query.selector();
        let sql = format!(
            "SELECT count() FROM {}{} GROUP ALL",
            query.collection(),
            build_where_clause(&filters)
        );

        let result: Option<CountResult> = bind_filters(self.0.query(&sql), &filters)
            .await
            .map_err(storage_error)?
            .take(0)
            .map_err(storage_error)?;

        Ok(result.map(|r| r.count).unwrap_or(0))
    }

    async fn find_raw(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Attributes>, ParanoiaError> {
        let sql = format!(
            "SELECT * OMIT id FROM {} WHERE {} = $id LIMIT 1",
            collection, ID_FIELD
        );
        let rows: Vec<JsonValue> = self
            .0
            .query(&sql)
            .bind(("id", id.to_string()))
            .await
            .map_err(storage_error)?
            .take(0)
            .map_err(storage_error)?;

        Ok(into_attributes(rows).into_iter().next())
    }

    async fn insert(&self, collection: &str, document: &Attributes) -> Result<u64, ParanoiaError> {
        let id = document
            .get(ID_FIELD)
            .and_then(JsonValue::as_str)
            .ok_or_else(|| {
                ParanoiaError::StorageError(format!("document for {} has no {}", collection, ID_FIELD))
            })?;
        if self.find_raw(collection, id).await?.is_some() {
            return Err(ParanoiaError::StorageError(format!(
                "duplicate key {} in {}",
                id, collection
            )));
        }

        self.0
            .query(format!("INSERT INTO {} $item", collection))
            .bind(("item", JsonValue::Object(document.clone())))
            .await
            .map_err(storage_error)?;

        Ok(1)
    }

    async fn update(&self, update: &Update) -> Result<u64, ParanoiaError> {
        if update.is_empty() {
            return Ok(self.find_raw(&update.collection, &update.id).await?.map_or(0, |_| 1));
        }

        let sql = format!(
            "UPDATE {} SET {} WHERE {} = $id RETURN {}",
            update.collection,
            build_set_clause(&update.ops),
            ID_FIELD,
            ID_FIELD
        );
        debug!(%sql, "update");

        let mut q = self.0.query(&sql).bind(("id", update.id.clone()));
        for (i, op) in update.ops.iter().enumerate() {
            let param = format!("u{}", i);
            q = match op {
                UpdateOp::Set(_, v) => bind_value(q, &param, v),
                UpdateOp::Unset(_) => q,
                UpdateOp::Push(_, document) => {
                    q.bind((param, JsonValue::Object(document.clone())))
                }
                UpdateOp::Pull(_, id) => q.bind((param, id.clone())),
                UpdateOp::SetIn(_, id, _, v) => {
                    bind_value(q, &param, v).bind((format!("{}_id", param), id.clone()))
                }
                UpdateOp::UnsetIn(_, id, _) => q.bind((format!("{}_id", param), id.clone())),
            };
        }

        let rows: Vec<JsonValue> = q
            .await
            .map_err(storage_error)?
            .take(0)
            .map_err(storage_error)?;

        Ok(rows.len() as u64)
    }

    async fn delete(&self, delete: &Delete) -> Result<u64, ParanoiaError> {
        let sql = format!(
            "DELETE FROM {}{} RETURN BEFORE",
            delete.collection,
            build_where_clause(&delete.filters)
        );
        debug!(%sql, "delete");

        let rows: Vec<JsonValue> = bind_filters(self.0.query(&sql), &delete.filters)
            .await
            .map_err(storage_error)?
            .take(0)
            .map_err(storage_error)?;

        Ok(rows.len() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use paranoid_storage::{DocumentType, Mapper};

    #[test]
    fn numeric_segments_become_indexes() {
        assert_eq!(field_path("deletedAt"), "deletedAt");
        assert_eq!(field_path("phones.1.deletedAt"), "phones[1].deletedAt");
        assert_eq!(field_path("a.b.0"), "a.b[0]");
    }

    #[test]
    fn default_scope_treats_missing_marker_as_null() {
        let mapper = Mapper::in_memory();
        mapper
            .register(DocumentType::builder("Post").collection("posts").paranoid().build())
            .unwrap();
        let query = mapper.query("Post").unwrap().eq("title", "a").limit(5);

        assert_eq!(
            build_select(&query, &query.selector()),
            "SELECT * OMIT id FROM posts WHERE (deletedAt IS NONE OR deletedAt IS NULL) \
             AND title = $p1 LIMIT 5"
        );
    }

    #[test]
    fn deleted_scope_selects_marked_documents() {
        let mapper = Mapper::in_memory();
        mapper
            .register(DocumentType::builder("Post").collection("posts").paranoid().build())
            .unwrap();
        let query = mapper
            .query("Post")
            .unwrap()
            .deleted()
            .unwrap()
            .order_by("deletedAt", Order::Desc);

        assert_eq!(
            build_select(&query, &query.selector()),
            "SELECT * OMIT id FROM posts WHERE (deletedAt IS NOT NONE AND deletedAt IS NOT NULL) \
             ORDER BY deletedAt DESC"
        );
    }

    #[test]
    fn update_ops_render_as_assignments() {
        let update = Update::new("people", "p1")
            .set("paranoidPhones.0.deletedAt", "2024-01-01T00:00:00.000000Z")
            .unset("score")
            .push("paranoidPhones", Attributes::new())
            .pull("paranoidPhones", "ph1");

        assert_eq!(
            build_set_clause(&update.ops),
            "paranoidPhones[0].deletedAt = $u0, score = NONE, \
             paranoidPhones = array::append(paranoidPhones ?? [], $u2), \
             paranoidPhones = paranoidPhones[WHERE _id != $u3]"
        );
    }

    #[test]
    fn element_ops_select_by_id() {
        let update = Update::new("people", "p1")
            .pull("paranoidPhones", "a")
            .set_in("paranoidPhones", "b", "deletedAt", "2024-01-01T00:00:00.000000Z")
            .unset_in("paranoidPhones", "c", "deletedAt");

        assert_eq!(
            build_set_clause(&update.ops),
            "paranoidPhones = paranoidPhones[WHERE _id != $u0], \
             paranoidPhones[WHERE _id = $u1_id].deletedAt = $u1, \
             paranoidPhones[WHERE _id = $u2_id].deletedAt = NONE"
        );
    }

    #[test]
    fn null_equality_matches_missing_fields() {
        let filters = vec![
            Filter::Eq("deletedAt".to_string(), Value::Json(JsonValue::Null)),
            Filter::Ne("removedAt".to_string(), Value::Null),
        ];
        assert_eq!(
            build_where_clause(&filters),
            " WHERE (deletedAt IS NONE OR deletedAt IS NULL) \
             AND (removedAt IS NOT NONE AND removedAt IS NOT NULL)"
        );
    }

    #[test]
    fn in_filter_checks_membership() {
        let filters = vec![Filter::In(
            "_id".to_string(),
            Value::Strings(vec!["a".to_string(), "b".to_string()]),
        )];
        assert_eq!(build_where_clause(&filters), " WHERE $p0 CONTAINS _id");
    }
}
