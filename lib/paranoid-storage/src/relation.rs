//! Relation declarations and traversal.

use crate::document::{Document, ID_FIELD};
use crate::{Mapper, ParanoiaError, Query};

/// What happens to related documents when the owner is destroyed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dependent {
    /// Destroy each dependent, running its own hooks and dependents.
    Destroy,
    /// Delete each dependent without hooks.
    Delete,
    /// Clear the foreign key on each dependent.
    Nullify,
    /// Fail with `DeleteRestriction` while dependents exist.
    Restrict,
    /// Record an error on the owner and abort the destroy while dependents
    /// exist.
    RestrictWithError,
}

/// How a relation is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RelationKind {
    /// Target holds `foreign_key` = owner id; at most one.
    HasOne { foreign_key: String },
    /// Target holds `foreign_key` = owner id.
    HasMany { foreign_key: String },
    /// Owner holds `foreign_key` = target id.
    BelongsTo { foreign_key: String },
    /// Owner holds an array of target ids in `ids_field`.
    HasAndBelongsToMany { ids_field: String },
    /// Target stored as an object under the relation name.
    EmbedsOne,
    /// Targets stored as an array under the relation name.
    EmbedsMany,
}

/// A declared relation of a document type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relation {
    name: String,
    target: String,
    kind: RelationKind,
    dependent: Option<Dependent>,
}

impl Relation {
    pub fn new(name: impl Into<String>, target: impl Into<String>, kind: RelationKind) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            kind,
            dependent: None,
        }
    }

    pub fn has_one(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            target,
            RelationKind::HasOne {
                foreign_key: foreign_key.into(),
            },
        )
    }

    pub fn has_many(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            target,
            RelationKind::HasMany {
                foreign_key: foreign_key.into(),
            },
        )
    }

    pub fn belongs_to(
        name: impl Into<String>,
        target: impl Into<String>,
        foreign_key: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            target,
            RelationKind::BelongsTo {
                foreign_key: foreign_key.into(),
            },
        )
    }

    pub fn has_and_belongs_to_many(
        name: impl Into<String>,
        target: impl Into<String>,
        ids_field: impl Into<String>,
    ) -> Self {
        Self::new(
            name,
            target,
            RelationKind::HasAndBelongsToMany {
                ids_field: ids_field.into(),
            },
        )
    }

    pub fn embeds_one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationKind::EmbedsOne)
    }

    pub fn embeds_many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self::new(name, target, RelationKind::EmbedsMany)
    }

    /// Set the cascade policy.
    pub fn dependent(mut self, dependent: Dependent) -> Self {
        self.dependent = Some(dependent);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn kind(&self) -> &RelationKind {
        &self.kind
    }

    pub fn dependent_policy(&self) -> Option<Dependent> {
        self.dependent
    }

    pub fn is_embedded(&self) -> bool {
        matches!(self.kind, RelationKind::EmbedsOne | RelationKind::EmbedsMany)
    }

    /// Relations followed by a recursive restore: declared `Destroy` and
    /// stored as separate records.
    pub fn cascades_restore(&self) -> bool {
        self.dependent == Some(Dependent::Destroy) && !self.is_embedded()
    }
}

/// Which related documents a traversal sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Through the target type's default scope.
    Scoped,
    /// Every stored document, soft-deleted or not.
    IncludeDeleted,
}

/// The current value of a relation.
#[derive(Debug, Clone)]
pub enum Related {
    One(Document),
    Many(Vec<Document>),
}

impl Related {
    /// Treat a single related document and a collection uniformly.
    pub fn into_documents(self) -> Vec<Document> {
        match self {
            Related::One(document) => vec![document],
            Related::Many(documents) => documents,
        }
    }
}

impl Document {
    /// Load the current value of a relation.
    ///
    /// Returns `None` for a singular relation with nothing on the other end.
    pub async fn related(
        &self,
        mapper: &Mapper,
        name: &str,
        visibility: Visibility,
    ) -> Result<Option<Related>, ParanoiaError> {
        let relation = self.document_type().relation(name).ok_or_else(|| {
            ParanoiaError::UnknownRelation {
                document: self.document_type().name().to_string(),
                relation: name.to_string(),
            }
        })?;
        let target = mapper.document_type(relation.target())?;

        let mut query = Query::new(&target);
        if visibility == Visibility::IncludeDeleted {
            query = query.unscoped();
        }

        let related = match relation.kind() {
            RelationKind::HasOne { foreign_key } => {
                let Some(id) = self.id() else {
                    return Ok(None);
                };
                mapper
                    .first(&query.eq(foreign_key.as_str(), id))
                    .await?
                    .map(Related::One)
            }
            RelationKind::HasMany { foreign_key } => {
                let Some(id) = self.id() else {
                    return Ok(Some(Related::Many(Vec::new())));
                };
                Some(Related::Many(
                    mapper.fetch(&query.eq(foreign_key.as_str(), id)).await?,
                ))
            }
            RelationKind::BelongsTo { foreign_key } => {
                let Some(id) = self.get(foreign_key).and_then(serde_json::Value::as_str) else {
                    return Ok(None);
                };
                mapper
                    .first(&query.eq(ID_FIELD, id))
                    .await?
                    .map(Related::One)
            }
            RelationKind::HasAndBelongsToMany { ids_field } => {
                let ids: Vec<String> = self
                    .get(ids_field)
                    .and_then(serde_json::Value::as_array)
                    .map(|ids| {
                        ids.iter()
                            .filter_map(|id| id.as_str().map(str::to_string))
                            .collect()
                    })
                    .unwrap_or_default();
                if ids.is_empty() {
                    Some(Related::Many(Vec::new()))
                } else {
                    Some(Related::Many(mapper.fetch(&query.r#in(ID_FIELD, ids)).await?))
                }
            }
            RelationKind::EmbedsOne => self
                .embedded_documents(&target, relation.name(), visibility)
                .into_iter()
                .next()
                .map(Related::One),
            RelationKind::EmbedsMany => Some(Related::Many(self.embedded_documents(
                &target,
                relation.name(),
                visibility,
            ))),
        };

        Ok(related)
    }
}
