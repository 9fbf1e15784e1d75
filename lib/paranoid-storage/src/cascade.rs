//! Dependent processing on destroy, and cascading restore.
//!
//! Both walk the relation graph recursively through `destroy` and `restore`,
//! so they return boxed futures. Neither guards against cycles: a cycle of
//! `Dependent::Destroy` relations between paranoid types recurses until the
//! stack or the store gives out.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::document::Document;
use crate::paranoia::RestoreOptions;
use crate::relation::{Dependent, RelationKind, Visibility};
use crate::validation::ValidationError;
use crate::{Mapper, ParanoiaError};

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Apply every relation's dependent policy, in declaration order.
///
/// Resolves to `Ok(false)` when a `RestrictWithError` relation aborts the
/// destroy. Relations processed before a failure stay processed.
pub(crate) fn destroy_dependents<'a>(
    document: &'a mut Document,
    mapper: &'a Mapper,
) -> BoxFuture<'a, Result<bool, ParanoiaError>> {
    Box::pin(async move {
        let document_type = Arc::clone(document.document_type());

        for relation in document_type.relations() {
            let Some(policy) = relation.dependent_policy() else {
                continue;
            };
            let dependents = match document
                .related(mapper, relation.name(), Visibility::Scoped)
                .await?
            {
                Some(related) => related.into_documents(),
                None => continue,
            };
            if dependents.is_empty() {
                continue;
            }

            match policy {
                Dependent::Destroy => {
                    for mut dependent in dependents {
                        // A halted child does not stop the owner.
                        dependent.destroy(mapper).await?;
                    }
                }
                Dependent::Delete => {
                    for mut dependent in dependents {
                        dependent.delete(mapper).await?;
                    }
                }
                Dependent::Nullify => match relation.kind() {
                    RelationKind::HasOne { foreign_key } | RelationKind::HasMany { foreign_key } => {
                        for mut dependent in dependents {
                            dependent.unset(mapper, foreign_key).await?;
                        }
                    }
                    _ => {}
                },
                Dependent::Restrict => {
                    warn!(
                        document = %document_type.name(),
                        relation = %relation.name(),
                        dependents = dependents.len(),
                        "destroy restricted by dependents"
                    );
                    return Err(ParanoiaError::DeleteRestriction {
                        document: document_type.name().to_string(),
                        relation: relation.name().to_string(),
                    });
                }
                Dependent::RestrictWithError => {
                    warn!(
                        document = %document_type.name(),
                        relation = %relation.name(),
                        dependents = dependents.len(),
                        "destroy aborted by dependents"
                    );
                    document.errors.push(ValidationError::new(
                        relation.name(),
                        "is not empty",
                    ));
                    return Ok(false);
                }
            }

            debug!(
                document = %document_type.name(),
                relation = %relation.name(),
                ?policy,
                "processed dependents"
            );
        }

        Ok(true)
    })
}

/// Restore, recursively, every paranoid document reachable through a
/// stored `Dependent::Destroy` relation. Soft-deleted dependents are
/// included; ordinary and embedded dependents are left alone.
pub(crate) fn restore_relations<'a>(
    document: &'a Document,
    mapper: &'a Mapper,
) -> BoxFuture<'a, Result<(), ParanoiaError>> {
    Box::pin(async move {
        let document_type = Arc::clone(document.document_type());

        for relation in document_type.relations() {
            if !relation.cascades_restore() {
                continue;
            }
            if !mapper.document_type(relation.target())?.is_paranoid() {
                continue;
            }
            let Some(related) = document
                .related(mapper, relation.name(), Visibility::IncludeDeleted)
                .await?
            else {
                continue;
            };

            for mut dependent in related.into_documents() {
                if let Some(mut paranoid) = dependent.paranoid_mut() {
                    paranoid.restore(mapper, RestoreOptions::recursive()).await?;
                }
            }

            debug!(
                document = %document_type.name(),
                relation = %relation.name(),
                "restored dependents"
            );
        }

        Ok(())
    })
}
