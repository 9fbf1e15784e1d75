//! Soft deletion.
//!
//! A paranoid document type carries a deletion marker: a timestamp field
//! (`deletedAt` unless configured otherwise) and optionally a boolean flag
//! mirroring it. Deleting such a document sets the marker with a targeted
//! update instead of removing the record, and the type's default scope hides
//! marked documents from ordinary queries.
//!
//! # State machine
//!
//! ```text
//!            remove / delete / destroy             hard_delete / hard_destroy
//!  ACTIVE  ──────────────────────────▶  SOFT_DELETED  ──────────────────────▶  HARD_DELETED
//!    ▲                                      │
//!    └──────────────── restore ◀────────────┘
//! ```
//!
//! `hard_delete` and `hard_destroy` reach `HARD_DELETED` from either state.
//!
//! [`Paranoid`] wraps a [`Document`] of a paranoid type and exposes these
//! transitions; [`Document`] itself dispatches to it so callers use the same
//! entry points for paranoid and ordinary documents.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::callbacks::Event;
use crate::cascade;
use crate::configuration::Configuration;
use crate::persistence::Removal;
use crate::query::{Filter, Scope, Value};
use crate::schema::{Field, FieldKind};
use crate::{Document, Mapper, ParanoiaError, Timestamp};

/// Name of the scope selecting only soft-deleted documents.
pub const DELETED_SCOPE: &str = "deleted";

/// Marker field names of a paranoid document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Paranoia {
    field: String,
    flag: Option<String>,
}

impl Paranoia {
    pub fn from_configuration(configuration: &Configuration) -> Self {
        Self {
            field: configuration.paranoid_field.clone(),
            flag: configuration.flag_field.clone(),
        }
    }

    /// Timestamp field.
    pub fn field(&self) -> &str {
        &self.field
    }

    /// Boolean flag field, when configured.
    pub fn flag(&self) -> Option<&str> {
        self.flag.as_deref()
    }

    pub fn is_marker_field(&self, name: &str) -> bool {
        self.field == name || self.flag.as_deref() == Some(name)
    }

    /// Schema fields carrying the marker.
    pub fn fields(&self) -> Vec<Field> {
        let mut fields = vec![Field::new(self.field.as_str(), FieldKind::Datetime)];
        if let Some(flag) = &self.flag {
            fields.push(Field::new(flag.as_str(), FieldKind::Boolean).with_default(false));
        }
        fields
    }

    /// Default-scope filters hiding soft-deleted documents.
    pub fn default_filters(&self) -> Vec<Filter> {
        match &self.flag {
            Some(flag) => vec![Filter::Eq(flag.clone(), Value::Bool(false))],
            None => vec![Filter::IsNull(self.field.clone())],
        }
    }

    /// The `deleted` scope, replacing the default marker filters.
    pub fn deleted_scope(&self) -> Scope {
        match &self.flag {
            Some(flag) => Scope::new(vec![Filter::Eq(flag.clone(), Value::Bool(true))])
                .lifting(self.field.as_str())
                .lifting(flag.as_str()),
            None => Scope::new(vec![Filter::IsNotNull(self.field.clone())])
                .lifting(self.field.as_str()),
        }
    }
}

/// Options for [`Paranoid::restore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RestoreOptions {
    /// Also restore dependents declared with `Dependent::Destroy`.
    pub recursive: bool,
}

impl RestoreOptions {
    pub fn recursive() -> Self {
        Self { recursive: true }
    }
}

/// Capability of documents that can carry a deletion marker.
#[async_trait]
pub trait SoftDeletable: Send {
    /// Whether the deletion marker is set in memory.
    fn is_deleted(&self) -> bool;

    /// Set the marker in storage and memory, and mark the instance
    /// destroyed.
    async fn mark_deleted(&mut self, mapper: &Mapper) -> Result<(), ParanoiaError>;

    /// Clear the marker in storage and memory, and clear the destroyed flag.
    async fn clear_deletion_marker(&mut self, mapper: &Mapper) -> Result<(), ParanoiaError>;
}

/// Soft-deletion view of a paranoid [`Document`].
#[derive(Debug)]
pub struct Paranoid<'a> {
    document: &'a mut Document,
    paranoia: Paranoia,
}

impl<'a> Paranoid<'a> {
    pub(crate) fn new(document: &'a mut Document, paranoia: Paranoia) -> Self {
        Self { document, paranoia }
    }

    pub fn document(&self) -> &Document {
        self.document
    }

    pub fn paranoia(&self) -> &Paranoia {
        &self.paranoia
    }

    pub fn deleted_at(&self) -> Option<Timestamp> {
        self.document.deleted_at()
    }

    /// Soft delete, running the `Remove` hooks around the marker update.
    ///
    /// Returns `false` when a hook halts the chain.
    pub async fn remove(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        self.document.ensure_writable()?;
        let document_type = Arc::clone(self.document.document_type());
        let callbacks = document_type.callbacks();

        let Some(entered) = callbacks.enter(Event::Remove, self.document) else {
            return Ok(false);
        };
        let result = self.mark_deleted(mapper).await;
        callbacks.exit(entered, self.document, result.is_ok());
        result.map(|()| true)
    }

    pub async fn delete(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        self.remove(mapper).await
    }

    /// Remove the stored record, skipping soft deletion and every hook.
    pub async fn hard_delete(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        self.document.ensure_writable()?;
        self.document.delete_from_storage(mapper).await?;
        Ok(true)
    }

    /// Soft destroy: `Destroy` hooks around dependent processing and the
    /// marker update.
    pub async fn destroy(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        self.document.destroy_with(mapper, Removal::Soft).await
    }

    /// Permanent destroy: `Destroy` and `Remove` hooks around dependent
    /// processing and the record removal.
    ///
    /// Fails with [`ParanoiaError::DeleteRestriction`] when a restricted
    /// relation still has dependents, and returns `false` when a
    /// `RestrictWithError` relation aborts.
    pub async fn hard_destroy(&mut self, mapper: &Mapper) -> Result<bool, ParanoiaError> {
        self.document
            .destroy_with(mapper, Removal::Hard { remove_hooks: true })
            .await
    }

    /// Clear the deletion marker, running the `Restore` hooks around it.
    ///
    /// Restoring a document that is not deleted still clears the marker
    /// fields and runs the hooks.
    pub async fn restore(
        &mut self,
        mapper: &Mapper,
        options: RestoreOptions,
    ) -> Result<bool, ParanoiaError> {
        let document_type = Arc::clone(self.document.document_type());
        let callbacks = document_type.callbacks();

        let Some(entered) = callbacks.enter(Event::Restore, self.document) else {
            return Ok(false);
        };
        let mut result = self.clear_deletion_marker(mapper).await;
        if result.is_ok() && options.recursive {
            result = cascade::restore_relations(self.document, mapper).await;
        }
        callbacks.exit(entered, self.document, result.is_ok());
        result.map(|()| true)
    }

    /// Restore every paranoid dependent declared with `Dependent::Destroy`,
    /// recursively. Embedded relations are left alone.
    ///
    /// Cycles of such relations recurse without bound.
    pub async fn restore_relations(&mut self, mapper: &Mapper) -> Result<(), ParanoiaError> {
        cascade::restore_relations(self.document, mapper).await
    }
}

#[async_trait]
impl<'a> SoftDeletable for Paranoid<'a> {
    fn is_deleted(&self) -> bool {
        self.document.marker_set()
    }

    async fn mark_deleted(&mut self, mapper: &Mapper) -> Result<(), ParanoiaError> {
        let now = Timestamp::now();

        if let Some(update) = self.document.update_for() {
            let mut update = self.document.set_field(update, &self.paranoia.field, now);
            if let Some(flag) = &self.paranoia.flag {
                update = self.document.set_field(update, flag, true);
            }
            mapper.store().update(&update).await?;
        }

        self.document
            .attributes
            .insert(self.paranoia.field.clone(), now.to_json());
        if let Some(flag) = &self.paranoia.flag {
            self.document
                .attributes
                .insert(flag.clone(), serde_json::Value::Bool(true));
        }
        self.document.destroyed = true;

        debug!(
            document = %self.document.document_type().name(),
            id = ?self.document.id(),
            deleted_at = %now,
            "soft deleted"
        );
        Ok(())
    }

    async fn clear_deletion_marker(&mut self, mapper: &Mapper) -> Result<(), ParanoiaError> {
        if let Some(update) = self.document.update_for() {
            let mut update = self.document.unset_field(update, &self.paranoia.field);
            if let Some(flag) = &self.paranoia.flag {
                update = self.document.set_field(update, flag, false);
            }
            mapper.store().update(&update).await?;
        }

        self.document.attributes.remove(&self.paranoia.field);
        if let Some(flag) = &self.paranoia.flag {
            self.document
                .attributes
                .insert(flag.clone(), serde_json::Value::Bool(false));
        }
        self.document.destroyed = false;

        debug!(
            document = %self.document.document_type().name(),
            id = ?self.document.id(),
            "restored"
        );
        Ok(())
    }
}
