//! Persistence operations on [`Document`].
//!
//! Every delete-family entry point lives here and dispatches once: paranoid
//! types go through [`Paranoid`](crate::Paranoid), ordinary types remove the
//! stored record.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;
use uuid::Uuid;

use crate::callbacks::Event;
use crate::cascade;
use crate::document::{Attributes, Document, Embedding, ID_FIELD};
use crate::paranoia::{RestoreOptions, SoftDeletable};
use crate::query::{Delete, Update, Value, lookup};
use crate::relation::{RelationKind, Visibility};
use crate::{Mapper, ParanoiaError};

/// What a destroy does once its dependents are processed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Removal {
    /// Set the deletion marker.
    Soft,
    /// Remove the stored record, optionally inside the `Remove` chain too.
    Hard { remove_hooks: bool },
}

impl Document {
    /// Validate and insert a new top-level document, assigning an id when
    /// none is set.
    pub async fn insert(&mut self, mapper: &Mapper) -> Result<(), ParanoiaError> {
        if self.document_type().is_embedded() {
            return Err(ParanoiaError::StorageError(format!(
                "{} is embedded; create it through its owner",
                self.document_type().name()
            )));
        }
        if !self.validate(mapper).await? {
            return Err(ParanoiaError::Validation(self.errors.clone()));
        }
        if self.id().is_none() {
            self.attributes.insert(
                ID_FIELD.to_string(),
                JsonValue::String(Uuid::new_v4().to_string()),
            );
        }

        mapper
            .store()
            .insert(self.document_type().collection(), &self.attributes)
            .await?;
        self.new_record = false;

        debug!(
            document = %self.document_type().name(),
            id = ?self.id(),
            "inserted"
        );
        Ok(())
    }

    /// Replace the in-memory attributes with the stored ones, ignoring every
    /// scope. The `destroyed` flag is left as it is.
    pub async fn reload(&mut self, mapper: &Mapper) -> Result<(), ParanoiaError> {
        let (attributes, index) = self.stored(mapper).await?.ok_or_else(|| {
            ParanoiaError::NotFound(format!(
                "{} {}",
                self.document_type().name(),
                self.id().unwrap_or_default()
            ))
        })?;
        self.attributes = attributes;
        if let Some(embedding) = self.embedding.as_mut() {
            embedding.index = index;
        }
        Ok(())
    }

    /// The stored attributes of this document, plus its current array
    /// position when it is an embeds-many element.
    async fn stored(
        &self,
        mapper: &Mapper,
    ) -> Result<Option<(Attributes, Option<usize>)>, ParanoiaError> {
        let Some((collection, root_id)) = self.root() else {
            return Ok(None);
        };
        let Some(root) = mapper.store().find_raw(&collection, &root_id).await? else {
            return Ok(None);
        };
        let Some(embedding) = self.embedding() else {
            return Ok(Some((root, None)));
        };

        let found = match (lookup(&root, &embedding.container), self.id()) {
            (Some(JsonValue::Array(items)), Some(id)) if embedding.is_array_element() => items
                .iter()
                .enumerate()
                .find_map(|(index, item)| match item {
                    JsonValue::Object(attributes)
                        if attributes.get(ID_FIELD).and_then(JsonValue::as_str) == Some(id) =>
                    {
                        Some((attributes.clone(), Some(index)))
                    }
                    _ => None,
                }),
            (Some(JsonValue::Object(attributes)), _) if !embedding.is_array_element() => {
                Some((attributes.clone(), None))
            }
            _ => None,
        };
        Ok(found)
    }

    /// Set a field in memory and persist only that field.
    pub async fn set(
        &mut self,
        mapper: &Mapper,
        name: &str,
        value: impl Into<Value>,
    ) -> Result<(), ParanoiaError> {
        let value = value.into();
        if let Some(update) = self.update_for() {
            let update = self.set_field(update, name, value.clone());
            mapper.store().update(&update).await?;
        }
        self.attributes.insert(name.to_string(), value.to_json());
        Ok(())
    }

    /// Remove a field in memory and in storage.
    pub async fn unset(&mut self, mapper: &Mapper, name: &str) -> Result<(), ParanoiaError> {
        if let Some(update) = self.update_for() {
            mapper
                .store()
                .update(&self.unset_field(update, name))
                .await?;
        }
        self.attributes.remove(name);
        Ok(())
    }

    /// Create a document inside an embeds-one or embeds-many relation.
    ///
    /// The child is written into this document's stored record when this
    /// document is persisted, and into memory either way.
    pub async fn create_embedded(
        &mut self,
        mapper: &Mapper,
        relation: &str,
        attributes: Attributes,
    ) -> Result<Document, ParanoiaError> {
        let document_type = Arc::clone(self.document_type());
        let relation = document_type
            .relation(relation)
            .ok_or_else(|| ParanoiaError::UnknownRelation {
                document: document_type.name().to_string(),
                relation: relation.to_string(),
            })?;
        let target = mapper.document_type(relation.target())?;

        let mut child = Document::build(&target, attributes);
        if child.id().is_none() {
            child.attributes.insert(
                ID_FIELD.to_string(),
                JsonValue::String(Uuid::new_v4().to_string()),
            );
        }

        let container = self.field_path(relation.name());
        let index = match relation.kind() {
            RelationKind::EmbedsMany => {
                let items = self
                    .attributes
                    .entry(relation.name().to_string())
                    .or_insert_with(|| JsonValue::Array(Vec::new()));
                if !items.is_array() {
                    *items = JsonValue::Array(Vec::new());
                }
                let index = items.as_array().map_or(0, Vec::len);
                if let JsonValue::Array(items) = items {
                    items.push(JsonValue::Object(child.attributes.clone()));
                }
                if let Some(update) = self.update_for() {
                    mapper
                        .store()
                        .update(&update.push(container.as_str(), child.attributes.clone()))
                        .await?;
                }
                Some(index)
            }
            RelationKind::EmbedsOne => {
                self.attributes.insert(
                    relation.name().to_string(),
                    JsonValue::Object(child.attributes.clone()),
                );
                if let Some(update) = self.update_for() {
                    mapper
                        .store()
                        .update(&update.set(
                            container.as_str(),
                            JsonValue::Object(child.attributes.clone()),
                        ))
                        .await?;
                }
                None
            }
            _ => {
                return Err(ParanoiaError::StorageError(format!(
                    "{} on {} is not an embedded relation",
                    relation.name(),
                    document_type.name()
                )));
            }
        };

        child.new_record = self.new_record;
        child.embedding = self.root().map(|(root_collection, root_id)| Embedding {
            root_collection,
            root_id,
            container,
            index,
        });
        Ok(child)
    }

    /// Default-scoped documents of an embedded relation, read from storage
    /// when this document is persisted.
    pub async fn embedded(
        &mut self,
        mapper: &Mapper,
        relation: &str,
    ) -> Result<Vec<Document>, ParanoiaError> {
        self.embedded_with(mapper, relation, Visibility::Scoped).await
    }

    /// Every document of an embedded relation, soft-deleted ones included.
    pub async fn embedded_unscoped(
        &mut self,
        mapper: &Mapper,
        relation: &str,
    ) -> Result<Vec<Document>, ParanoiaError> {
        self.embedded_with(mapper, relation, Visibility::IncludeDeleted)
            .await
    }

    async fn embedded_with(
        &mut self,
        mapper: &Mapper,
        relation: &str,
        visibility: Visibility,
    ) -> Result<Vec<Document>, ParanoiaError> {
        let document_type = Arc::clone(self.document_type());
        let declared = document_type.relation(relation).ok_or_else(|| {
            ParanoiaError::UnknownRelation {
                document: document_type.name().to_string(),
                relation: relation.to_string(),
            }
        })?;
        let target = mapper.document_type(declared.target())?;

        // Siblings may have been changed through their own handles.
        let stored = if self.new_record {
            None
        } else {
            self.stored(mapper).await?
        };
        if let Some((stored, index)) = stored {
            match stored.get(declared.name()) {
                Some(value) => {
                    self.attributes
                        .insert(declared.name().to_string(), value.clone());
                }
                None => {
                    self.attributes.remove(declared.name());
                }
            }
            if let Some(embedding) = self.embedding.as_mut() {
                embedding.index = index;
            }
        }
        Ok(self.embedded_documents(&target, declared.name(), visibility))
    }

    /// Soft delete for paranoid types, permanent delete otherwise. No
    /// destroy hooks run.
    pub async fn delete(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        match self.paranoid_mut() {
            Some(mut paranoid) => paranoid.delete(mapper).await,
            None => {
                self.ensure_writable()?;
                self.delete_from_storage(mapper).await?;
                Ok(true)
            }
        }
    }

    pub async fn remove(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        self.delete(mapper).await
    }

    /// Remove the stored record regardless of paranoia, without hooks.
    pub async fn hard_delete(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        match self.paranoid_mut() {
            Some(mut paranoid) => paranoid.hard_delete(mapper).await,
            None => {
                self.ensure_writable()?;
                self.delete_from_storage(mapper).await?;
                Ok(true)
            }
        }
    }

    /// Run the `Destroy` hooks around dependent processing and deletion
    /// (soft for paranoid types).
    pub async fn destroy(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        match self.paranoid_mut() {
            Some(mut paranoid) => paranoid.destroy(mapper).await,
            None => {
                self.destroy_with(mapper, Removal::Hard { remove_hooks: false })
                    .await
            }
        }
    }

    /// Run the `Destroy` and `Remove` hooks around dependent processing and
    /// permanent removal.
    pub async fn hard_destroy(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        match self.paranoid_mut() {
            Some(mut paranoid) => paranoid.hard_destroy(mapper).await,
            None => {
                self.destroy_with(mapper, Removal::Hard { remove_hooks: true })
                    .await
            }
        }
    }

    pub async fn restore(
        &mut self,
        mapper: &Mapper,
        options: RestoreOptions,
    ) -> Result<bool, ParanoiaError> {
        let name = self.document_type().name().to_string();
        match self.paranoid_mut() {
            Some(mut paranoid) => paranoid.restore(mapper, options).await,
            None => Err(ParanoiaError::NotParanoid(name)),
        }
    }

    pub async fn restore_relations(&mut self, mapper: &Mapper) -> Result<(), ParanoiaError> {
        let name = self.document_type().name().to_string();
        match self.paranoid_mut() {
            Some(mut paranoid) => paranoid.restore_relations(mapper).await,
            None => Err(ParanoiaError::NotParanoid(name)),
        }
    }

    pub(crate) fn ensure_writable(&self) -> Result<(), ParanoiaError> {
        if self.is_readonly() {
            return Err(ParanoiaError::ReadonlyDocument(
                self.document_type().name().to_string(),
            ));
        }
        Ok(())
    }

    pub(crate) async fn destroy_with(
        &mut self,
        mapper: &Mapper,
        removal: Removal,
    ) -> Result<bool, ParanoiaError> {
        self.ensure_writable()?;
        let document_type = Arc::clone(self.document_type());
        let callbacks = document_type.callbacks();

        let Some(destroying) = callbacks.enter(Event::Destroy, self) else {
            return Ok(false);
        };
        let removing = match removal {
            Removal::Hard { remove_hooks: true } => match callbacks.enter(Event::Remove, self) {
                Some(entered) => Some(entered),
                None => {
                    callbacks.exit(destroying, self, false);
                    return Ok(false);
                }
            },
            _ => None,
        };

        let result = self.destroy_core(mapper, removal).await;
        let completed = matches!(result, Ok(true));
        if let Some(removing) = removing {
            callbacks.exit(removing, self, completed);
        }
        callbacks.exit(destroying, self, completed);
        result
    }

    async fn destroy_core(&mut self, mapper: &Mapper, removal: Removal) -> Result<bool, ParanoiaError> {
        if !cascade::destroy_dependents(self, mapper).await? {
            return Ok(false);
        }
        match removal {
            Removal::Soft => match self.paranoid_mut() {
                Some(mut paranoid) => paranoid.mark_deleted(mapper).await?,
                None => {
                    return Err(ParanoiaError::NotParanoid(
                        self.document_type().name().to_string(),
                    ));
                }
            },
            Removal::Hard { .. } => self.delete_from_storage(mapper).await?,
        }
        Ok(true)
    }

    /// Remove the stored record: the top-level record for root documents,
    /// the array element or sub-document for embedded ones.
    pub(crate) async fn delete_from_storage(&mut self, mapper: &Mapper) -> Result<(), ParanoiaError> {
        if !self.new_record {
            match (self.embedding(), self.id()) {
                (Some(embedding), id) => {
                    let update = Update::new(
                        embedding.root_collection.as_str(),
                        embedding.root_id.as_str(),
                    );
                    let update = match (embedding.index, id) {
                        (Some(_), Some(id)) => update.pull(embedding.container.as_str(), id),
                        _ => update.unset(embedding.position()),
                    };
                    mapper.store().update(&update).await?;
                }
                (None, Some(id)) => {
                    mapper
                        .store()
                        .delete(&Delete::new(self.document_type().collection()).eq(ID_FIELD, id))
                        .await?;
                }
                (None, None) => {}
            }
        }
        self.destroyed = true;

        debug!(
            document = %self.document_type().name(),
            id = ?self.id(),
            "deleted from storage"
        );
        Ok(())
    }
}
