use thiserror::Error;

use crate::validation::ValidationError;

#[derive(Error, Debug)]
pub enum ParanoiaError {
    #[error("Document is read-only: {0}")]
    ReadonlyDocument(String),

    #[error("Cannot delete {document} because of dependent '{relation}'")]
    DeleteRestriction { document: String, relation: String },

    #[error("Document type is not paranoid: {0}")]
    NotParanoid(String),

    #[error("Unknown document type: {0}")]
    UnknownType(String),

    #[error("Unknown relation '{relation}' on {document}")]
    UnknownRelation { document: String, relation: String },

    #[error("Unknown scope '{scope}' on {document}")]
    UnknownScope { document: String, scope: String },

    #[error("Validation failed: {}", format_validation_errors(.0))]
    Validation(Vec<ValidationError>),

    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Not found: {0}")]
    NotFound(String),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}
