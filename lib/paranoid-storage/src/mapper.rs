//! Document type registry bound to a store.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use tracing::info;

use crate::document::{Attributes, Document, ID_FIELD};
use crate::schema::DocumentType;
use crate::{DocumentStore, MemoryStore, ParanoiaError, Query};

/// Registered document types plus the store they are persisted in.
pub struct Mapper {
    store: Arc<dyn DocumentStore>,
    types: RwLock<HashMap<String, Arc<DocumentType>>>,
}

impl Mapper {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            types: RwLock::new(HashMap::new()),
        }
    }

    /// A mapper over a fresh [`MemoryStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }

    pub fn with_store(store: impl DocumentStore + 'static) -> Self {
        Self::new(Arc::new(store))
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Register a document type, replacing any type of the same name.
    pub fn register(&self, document_type: DocumentType) -> Result<Arc<DocumentType>, ParanoiaError> {
        let document_type = Arc::new(document_type);
        info!(
            document = %document_type.name(),
            collection = %document_type.collection(),
            paranoid = document_type.is_paranoid(),
            "registered document type"
        );
        self.types
            .write()
            .map_err(|e| ParanoiaError::StorageError(e.to_string()))?
            .insert(document_type.name().to_string(), Arc::clone(&document_type));
        Ok(document_type)
    }

    pub fn document_type(&self, name: &str) -> Result<Arc<DocumentType>, ParanoiaError> {
        self.types
            .read()
            .map_err(|e| ParanoiaError::StorageError(e.to_string()))?
            .get(name)
            .cloned()
            .ok_or_else(|| ParanoiaError::UnknownType(name.to_string()))
    }

    /// A default-scoped query over a registered type.
    pub fn query(&self, name: &str) -> Result<Query, ParanoiaError> {
        Ok(Query::new(&self.document_type(name)?))
    }

    /// Build a new, unsaved document.
    pub fn build(&self, name: &str, attributes: Attributes) -> Result<Document, ParanoiaError> {
        Ok(Document::build(&self.document_type(name)?, attributes))
    }

    /// Build, validate and insert a document.
    pub async fn create(&self, name: &str, attributes: Attributes) -> Result<Document, ParanoiaError> {
        let mut document = self.build(name, attributes)?;
        document.insert(self).await?;
        Ok(document)
    }

    /// Find a document by id through the default scope.
    ///
    /// A soft-deleted document is `NotFound` just like an absent one.
    pub async fn find(&self, name: &str, id: &str) -> Result<Document, ParanoiaError> {
        let query = self.query(name)?.eq(ID_FIELD, id);
        self.first(&query)
            .await?
            .ok_or_else(|| ParanoiaError::NotFound(format!("{} {}", name, id)))
    }

    pub async fn fetch(&self, query: &Query) -> Result<Vec<Document>, ParanoiaError> {
        let rows = self.store.fetch(query).await?;
        Ok(rows
            .into_iter()
            .map(|attributes| Document::from_stored(query.document_type(), attributes, None))
            .collect())
    }

    pub async fn first(&self, query: &Query) -> Result<Option<Document>, ParanoiaError> {
        Ok(self
            .store
            .fetch_optional(query)
            .await?
            .map(|attributes| Document::from_stored(query.document_type(), attributes, None)))
    }

    pub async fn count(&self, query: &Query) -> Result<u64, ParanoiaError> {
        self.store.count(query).await
    }

    pub async fn exists(&self, query: &Query) -> Result<bool, ParanoiaError> {
        self.store.exists(query).await
    }
}

impl std::fmt::Debug for Mapper {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let types: Vec<String> = self
            .types
            .read()
            .map(|types| types.keys().cloned().collect())
            .unwrap_or_default();
        f.debug_struct("Mapper").field("types", &types).finish()
    }
}
