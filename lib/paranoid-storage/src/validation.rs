//! Validators run before insert.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::document::{Document, ID_FIELD};
use crate::query::Value;
use crate::{Mapper, ParanoiaError, Query};

/// A failed validation on one field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field, self.message)
    }
}

/// A check run against a document before it is stored.
#[async_trait]
pub trait Validator: Send + Sync + fmt::Debug {
    async fn validate(
        &self,
        document: &Document,
        mapper: &Mapper,
    ) -> Result<Option<ValidationError>, ParanoiaError>;
}

/// Uniqueness among the documents visible through the default scope.
///
/// Soft-deleted documents do not collide.
#[derive(Debug, Clone)]
pub struct Uniqueness {
    field: String,
    scope: Vec<String>,
}

impl Uniqueness {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            scope: Vec::new(),
        }
    }

    /// Only documents with equal values in `field` collide.
    pub fn scope(mut self, field: impl Into<String>) -> Self {
        self.scope.push(field.into());
        self
    }
}

/// Uniqueness including soft-deleted documents of a paranoid type.
#[derive(Debug, Clone)]
pub struct UniquenessIncludingDeleted {
    inner: Uniqueness,
}

impl UniquenessIncludingDeleted {
    pub fn new(field: impl Into<String>) -> Self {
        Self {
            inner: Uniqueness::new(field),
        }
    }

    pub fn scope(mut self, field: impl Into<String>) -> Self {
        self.inner = self.inner.scope(field);
        self
    }
}

impl Uniqueness {
    async fn check(
        &self,
        document: &Document,
        mapper: &Mapper,
        include_deleted: bool,
    ) -> Result<Option<ValidationError>, ParanoiaError> {
        // Embedded documents are not addressable by a collection query.
        if document.document_type().is_embedded() {
            return Ok(None);
        }

        let value_of = |name: &str| Value::Json(document.get(name).cloned().unwrap_or(JsonValue::Null));

        let mut query = Query::new(document.document_type());
        if include_deleted {
            query = query.with_deleted();
        }
        query = query.eq(self.field.as_str(), value_of(&self.field));
        for field in &self.scope {
            query = query.eq(field.as_str(), value_of(field));
        }
        if let Some(id) = document.id() {
            query = query.ne(ID_FIELD, id);
        }

        if mapper.exists(&query).await? {
            return Ok(Some(ValidationError::new(
                self.field.as_str(),
                "has already been taken",
            )));
        }
        Ok(None)
    }
}

#[async_trait]
impl Validator for Uniqueness {
    async fn validate(
        &self,
        document: &Document,
        mapper: &Mapper,
    ) -> Result<Option<ValidationError>, ParanoiaError> {
        self.check(document, mapper, false).await
    }
}

#[async_trait]
impl Validator for UniquenessIncludingDeleted {
    async fn validate(
        &self,
        document: &Document,
        mapper: &Mapper,
    ) -> Result<Option<ValidationError>, ParanoiaError> {
        self.inner.check(document, mapper, true).await
    }
}

impl Document {
    /// Run every validator of the type, replacing the recorded errors.
    pub async fn validate(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        let document_type = Arc::clone(self.document_type());
        let mut errors = Vec::new();
        for validator in document_type.validators() {
            if let Some(error) = validator.validate(self, mapper).await? {
                errors.push(error);
            }
        }
        self.errors = errors;
        Ok(self.errors.is_empty())
    }
}
