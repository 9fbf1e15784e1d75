//! Dynamic document instances.

use std::sync::Arc;

use serde_json::{Map, Value as JsonValue};

use crate::paranoia::Paranoid;
use crate::query::{Update, Value, lookup};
use crate::relation::Visibility;
use crate::schema::DocumentType;
use crate::validation::ValidationError;
use crate::{Query, Timestamp};

/// Stored form of a document.
pub type Attributes = Map<String, JsonValue>;

/// Identity field assigned at insert.
pub const ID_FIELD: &str = "_id";

/// Where an embedded document lives inside its root record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Embedding {
    /// Collection of the top-level record holding the aggregate.
    pub root_collection: String,
    /// Id of that top-level record.
    pub root_id: String,
    /// Dotted path of the relation inside the root (`phones`,
    /// `addresses.0.phones`).
    pub container: String,
    /// Array position for embeds-many when the document was loaded; `None`
    /// for embeds-one. Targeted updates address array elements by `_id`;
    /// the position only names containers nested below this document.
    pub index: Option<usize>,
}

impl Embedding {
    pub fn is_array_element(&self) -> bool {
        self.index.is_some()
    }

    /// Dotted path of this document inside the root record at load time.
    pub fn position(&self) -> String {
        match self.index {
            Some(index) => format!("{}.{}", self.container, index),
            None => self.container.clone(),
        }
    }
}

/// A document of some registered type, with its lifecycle state.
#[derive(Debug, Clone)]
pub struct Document {
    document_type: Arc<DocumentType>,
    pub(crate) attributes: Attributes,
    pub(crate) new_record: bool,
    pub(crate) destroyed: bool,
    readonly: bool,
    pub(crate) embedding: Option<Embedding>,
    pub(crate) errors: Vec<ValidationError>,
}

impl Document {
    /// A new, unsaved document with field defaults applied.
    pub fn new(document_type: &Arc<DocumentType>) -> Self {
        let mut attributes = Attributes::new();
        for field in document_type.fields() {
            if let Some(default) = field.default() {
                attributes.insert(field.name().to_string(), default.clone());
            }
        }
        Self {
            document_type: Arc::clone(document_type),
            attributes,
            new_record: true,
            destroyed: false,
            readonly: false,
            embedding: None,
            errors: Vec::new(),
        }
    }

    /// A new, unsaved document with the given attributes over the defaults.
    pub fn build(document_type: &Arc<DocumentType>, attributes: Attributes) -> Self {
        let mut document = Self::new(document_type);
        document.attributes.extend(attributes);
        document
    }

    pub(crate) fn from_stored(
        document_type: &Arc<DocumentType>,
        attributes: Attributes,
        embedding: Option<Embedding>,
    ) -> Self {
        Self {
            document_type: Arc::clone(document_type),
            attributes,
            new_record: false,
            destroyed: false,
            readonly: false,
            embedding,
            errors: Vec::new(),
        }
    }

    pub fn document_type(&self) -> &Arc<DocumentType> {
        &self.document_type
    }

    pub fn id(&self) -> Option<&str> {
        self.attributes.get(ID_FIELD).and_then(JsonValue::as_str)
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.attributes.get(name)
    }

    pub fn attributes(&self) -> &Attributes {
        &self.attributes
    }

    /// Declared field names, then any other attribute present in memory.
    pub fn attribute_names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self
            .document_type
            .fields()
            .iter()
            .map(|field| field.name())
            .collect();
        for name in self.attributes.keys() {
            if !names.contains(&name.as_str()) {
                names.push(name);
            }
        }
        names
    }

    pub fn has_attribute(&self, name: &str) -> bool {
        self.document_type.field(name).is_some() || self.attributes.contains_key(name)
    }

    /// Change an attribute in memory only.
    pub fn assign(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.attributes.insert(name.into(), value.into().to_json());
    }

    /// Key suitable for URLs; `None` until the document has been stored.
    pub fn to_param(&self) -> Option<String> {
        if self.new_record {
            None
        } else {
            self.id().map(str::to_string)
        }
    }

    pub fn is_new_record(&self) -> bool {
        self.new_record
    }

    /// Paranoid documents stay persisted while soft-deleted; ordinary ones
    /// stop being persisted once destroyed.
    pub fn is_persisted(&self) -> bool {
        if self.document_type.is_paranoid() {
            !self.new_record
        } else {
            !self.new_record && !self.destroyed
        }
    }

    /// True after any delete-family operation, or while a deletion marker is
    /// set.
    pub fn is_destroyed(&self) -> bool {
        self.destroyed || self.marker_set()
    }

    pub fn is_deleted(&self) -> bool {
        self.is_destroyed()
    }

    pub(crate) fn marker_set(&self) -> bool {
        self.document_type.paranoia().is_some_and(|paranoia| {
            self.attributes
                .get(paranoia.field())
                .is_some_and(|value| !value.is_null())
        })
    }

    /// The deletion timestamp of a soft-deleted paranoid document.
    pub fn deleted_at(&self) -> Option<Timestamp> {
        let paranoia = self.document_type.paranoia()?;
        self.attributes
            .get(paranoia.field())
            .and_then(Timestamp::from_json)
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    pub fn set_readonly(&mut self, readonly: bool) {
        self.readonly = readonly;
    }

    pub fn errors(&self) -> &[ValidationError] {
        &self.errors
    }

    pub fn embedding(&self) -> Option<&Embedding> {
        self.embedding.as_ref()
    }

    pub fn is_embedded(&self) -> bool {
        self.embedding.is_some()
    }

    /// Paranoid view of this document; `None` for ordinary types.
    pub fn paranoid_mut(&mut self) -> Option<Paranoid<'_>> {
        let paranoia = self.document_type.paranoia()?.clone();
        Some(Paranoid::new(self, paranoia))
    }

    /// Add a set of one of this document's fields to `update`.
    pub(crate) fn set_field(&self, update: Update, name: &str, value: impl Into<Value>) -> Update {
        match (&self.embedding, self.id()) {
            (Some(embedding), Some(id)) if embedding.is_array_element() => {
                update.set_in(embedding.container.as_str(), id, name, value)
            }
            _ => update.set(self.field_path(name), value),
        }
    }

    /// Add an unset of one of this document's fields to `update`.
    pub(crate) fn unset_field(&self, update: Update, name: &str) -> Update {
        match (&self.embedding, self.id()) {
            (Some(embedding), Some(id)) if embedding.is_array_element() => {
                update.unset_in(embedding.container.as_str(), id, name)
            }
            _ => update.unset(self.field_path(name)),
        }
    }

    /// Path of a field inside the stored record that holds this document.
    pub fn field_path(&self, name: &str) -> String {
        match &self.embedding {
            Some(embedding) => format!("{}.{}", embedding.position(), name),
            None => name.to_string(),
        }
    }

    /// An empty targeted update addressed at the stored record holding this
    /// document, or `None` if there is no such record.
    pub fn update_for(&self) -> Option<Update> {
        if self.new_record {
            return None;
        }
        match &self.embedding {
            Some(embedding) => Some(Update::new(
                embedding.root_collection.as_str(),
                embedding.root_id.as_str(),
            )),
            None => Some(Update::new(self.document_type.collection(), self.id()?)),
        }
    }

    /// Root record coordinates: own collection and id, or the embedding's.
    pub(crate) fn root(&self) -> Option<(String, String)> {
        match &self.embedding {
            Some(embedding) => Some((embedding.root_collection.clone(), embedding.root_id.clone())),
            None => Some((
                self.document_type.collection().to_string(),
                self.id()?.to_string(),
            )),
        }
    }

    /// Documents of `target` embedded under `name`, built from the in-memory
    /// attributes.
    pub(crate) fn embedded_documents(
        &self,
        target: &Arc<DocumentType>,
        name: &str,
        visibility: Visibility,
    ) -> Vec<Document> {
        let Some(stored) = self.attributes.get(name) else {
            return Vec::new();
        };
        let container = self.field_path(name);
        let root = self.root();

        let embed = |attributes: &Attributes, index: Option<usize>| {
            let embedding = root.as_ref().map(|(collection, id)| Embedding {
                root_collection: collection.clone(),
                root_id: id.clone(),
                container: container.clone(),
                index,
            });
            let mut document = Document::from_stored(target, attributes.clone(), embedding);
            document.new_record = self.new_record;
            document
        };

        let visible = |attributes: &Attributes| match visibility {
            Visibility::Scoped => Query::new(target).matches(attributes),
            Visibility::IncludeDeleted => true,
        };

        match stored {
            JsonValue::Object(attributes) if visible(attributes) => vec![embed(attributes, None)],
            JsonValue::Array(items) => items
                .iter()
                .enumerate()
                .filter_map(|(index, item)| match item {
                    JsonValue::Object(attributes) if visible(attributes) => {
                        Some(embed(attributes, Some(index)))
                    }
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Read a nested value of this document by dotted path.
    pub fn lookup(&self, path: &str) -> Option<&JsonValue> {
        lookup(&self.attributes, path)
    }
}
