//! Storage backend abstraction.

use async_trait::async_trait;

use crate::document::Attributes;
use crate::{Delete, ParanoiaError, Query, Update};

/// Trait for executing queries and targeted updates against a document
/// store.
///
/// Implemented by backend types (e.g. [`crate::MemoryStore`], `SurrealStore`).
/// Every method addresses at most one collection; single-document updates
/// are expected to be atomic in the backend, and nothing here spans more
/// than one call.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Execute a SELECT query and return the raw stored documents.
    async fn fetch(&self, query: &Query) -> Result<Vec<Attributes>, ParanoiaError>;

    /// Execute a SELECT query and return at most one result.
    async fn fetch_optional(&self, query: &Query) -> Result<Option<Attributes>, ParanoiaError> {
        let mut query = query.clone();
        query.limit = Some(1);
        Ok(self.fetch(&query).await?.into_iter().next())
    }

    /// Count the documents matching a query (limit and offset ignored).
    async fn count(&self, query: &Query) -> Result<u64, ParanoiaError>;

    /// Check if any documents match the query.
    async fn exists(&self, query: &Query) -> Result<bool, ParanoiaError> {
        Ok(self.count(query).await? > 0)
    }

    /// Fetch one stored record by id, ignoring every scope.
    async fn find_raw(
        &self,
        collection: &str,
        id: &str,
    ) -> Result<Option<Attributes>, ParanoiaError>;

    /// Insert a top-level document.
    async fn insert(&self, collection: &str, document: &Attributes) -> Result<u64, ParanoiaError>;

    /// Apply a targeted field-level update and return the number of records
    /// matched.
    async fn update(&self, update: &Update) -> Result<u64, ParanoiaError>;

    /// Execute a DELETE query and return the number of records removed.
    async fn delete(&self, delete: &Delete) -> Result<u64, ParanoiaError>;
}
