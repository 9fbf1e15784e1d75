//! Document type declarations.
//!
//! A [`DocumentType`] is built once with [`DocumentTypeBuilder`] and then
//! registered on a [`crate::Mapper`]. Everything about it, including the
//! paranoia marker fields, is fixed at that point.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value as JsonValue;
use tracing::debug;

use crate::callbacks::{Callbacks, Event, Flow, Interceptor};
use crate::configuration::{Configuration, current_configuration};
use crate::document::{Document, ID_FIELD};
use crate::paranoia::{DELETED_SCOPE, Paranoia};
use crate::query::{Filter, Scope};
use crate::relation::Relation;
use crate::validation::Validator;

/// Stored kind of a declared field (database-agnostic).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Integer,
    Float,
    Boolean,
    Datetime,
    Array,
    Json,
}

/// A declared field with an optional default applied to new documents.
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    name: String,
    kind: FieldKind,
    default: Option<JsonValue>,
}

impl Field {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn with_default(mut self, default: impl Into<JsonValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> FieldKind {
        self.kind
    }

    pub fn default(&self) -> Option<&JsonValue> {
        self.default.as_ref()
    }
}

/// Schema of a registered document type.
#[derive(Debug)]
pub struct DocumentType {
    name: String,
    collection: String,
    embedded: bool,
    fields: Vec<Field>,
    default_scope: Vec<Filter>,
    scopes: BTreeMap<String, Scope>,
    relations: Vec<Relation>,
    callbacks: Callbacks,
    validators: Vec<Arc<dyn Validator>>,
    paranoia: Option<Paranoia>,
}

impl DocumentType {
    pub fn builder(name: impl Into<String>) -> DocumentTypeBuilder {
        DocumentTypeBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Collection holding top-level records of this type. Unused for
    /// embedded types, which live inside their owner's record.
    pub fn collection(&self) -> &str {
        &self.collection
    }

    pub fn is_embedded(&self) -> bool {
        self.embedded
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|field| field.name == name)
    }

    pub fn default_scope(&self) -> &[Filter] {
        &self.default_scope
    }

    pub fn scope(&self, name: &str) -> Option<&Scope> {
        self.scopes.get(name)
    }

    pub fn relations(&self) -> &[Relation] {
        &self.relations
    }

    pub fn relation(&self, name: &str) -> Option<&Relation> {
        self.relations.iter().find(|relation| relation.name() == name)
    }

    pub fn callbacks(&self) -> &Callbacks {
        &self.callbacks
    }

    pub fn validators(&self) -> &[Arc<dyn Validator>] {
        &self.validators
    }

    /// Marker fields of a paranoid type; `None` for ordinary types.
    pub fn paranoia(&self) -> Option<&Paranoia> {
        self.paranoia.as_ref()
    }

    pub fn is_paranoid(&self) -> bool {
        self.paranoia.is_some()
    }
}

/// Builder for [`DocumentType`].
pub struct DocumentTypeBuilder {
    name: String,
    collection: Option<String>,
    embedded: bool,
    fields: Vec<Field>,
    default_scope: Vec<Filter>,
    scopes: BTreeMap<String, Scope>,
    relations: Vec<Relation>,
    callbacks: Callbacks,
    validators: Vec<Arc<dyn Validator>>,
    paranoia: Option<Paranoia>,
}

impl DocumentTypeBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            collection: None,
            embedded: false,
            fields: vec![Field::new(ID_FIELD, FieldKind::Text)],
            default_scope: Vec::new(),
            scopes: BTreeMap::new(),
            relations: Vec::new(),
            callbacks: Callbacks::default(),
            validators: Vec::new(),
            paranoia: None,
        }
    }

    /// Override the collection name (defaults to the type name).
    pub fn collection(mut self, collection: impl Into<String>) -> Self {
        self.collection = Some(collection.into());
        self
    }

    /// Mark the type as stored inside an owning document.
    pub fn embedded(mut self) -> Self {
        self.embedded = true;
        self
    }

    pub fn field(mut self, field: Field) -> Self {
        self.fields.retain(|existing| existing.name != field.name);
        self.fields.push(field);
        self
    }

    /// Add a filter to the default scope.
    pub fn default_scope(mut self, filter: Filter) -> Self {
        self.default_scope.push(filter);
        self
    }

    pub fn scope(mut self, name: impl Into<String>, scope: Scope) -> Self {
        self.scopes.insert(name.into(), scope);
        self
    }

    pub fn relation(mut self, relation: Relation) -> Self {
        self.relations.push(relation);
        self
    }

    pub fn before(
        mut self,
        event: Event,
        hook: impl Fn(&mut Document) -> Flow + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.before(event, hook);
        self
    }

    pub fn around(mut self, event: Event, interceptor: impl Interceptor + 'static) -> Self {
        self.callbacks.around(event, interceptor);
        self
    }

    pub fn after(
        mut self,
        event: Event,
        hook: impl Fn(&mut Document) + Send + Sync + 'static,
    ) -> Self {
        self.callbacks.after(event, hook);
        self
    }

    pub fn validates(mut self, validator: impl Validator + 'static) -> Self {
        self.validators.push(Arc::new(validator));
        self
    }

    /// Make the type paranoid using the process-wide configuration as it
    /// is right now.
    pub fn paranoid(self) -> Self {
        let configuration = current_configuration();
        self.paranoid_with(&configuration)
    }

    /// Make the type paranoid with explicit marker field names.
    pub fn paranoid_with(mut self, configuration: &Configuration) -> Self {
        self.paranoia = Some(Paranoia::from_configuration(configuration));
        self
    }

    pub fn build(mut self) -> DocumentType {
        if let Some(paranoia) = &self.paranoia {
            for field in paranoia.fields() {
                self.fields.retain(|existing| existing.name != field.name);
                self.fields.push(field);
            }
            self.default_scope
                .retain(|filter| !paranoia.is_marker_field(filter.field()));
            self.default_scope.extend(paranoia.default_filters());
            self.scopes
                .insert(DELETED_SCOPE.to_string(), paranoia.deleted_scope());
            debug!(
                document = %self.name,
                field = %paranoia.field(),
                flag = ?paranoia.flag(),
                "installed paranoid scopes"
            );
        }

        DocumentType {
            collection: self.collection.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            embedded: self.embedded,
            fields: self.fields,
            default_scope: self.default_scope,
            scopes: self.scopes,
            relations: self.relations,
            callbacks: self.callbacks,
            validators: self.validators,
            paranoia: self.paranoia,
        }
    }
}
