//! Paranoid Storage - soft deletion for document-mapped storage.
//!
//! Document types registered as paranoid carry a deletion marker instead of
//! being removed: `delete` sets the marker with a targeted field update, the
//! type's default scope hides marked documents, and `restore` clears the
//! marker again, optionally walking `Dependent::Destroy` relations.
//!
//! # Core Concepts
//!
//! - **Marker**: a timestamp field (`deletedAt` by default) and, when
//!   configured, a boolean flag (`isDeleted`). Null or absent means visible.
//! - **Default scope**: filters every query carries unless it asks for
//!   `unscoped`, `with_deleted` or the `deleted` scope.
//! - **Destroyed**: in-memory flag set by every delete-family operation.
//!
//! # Types
//!
//! - [`Mapper`]: registry of [`DocumentType`]s bound to a [`DocumentStore`]
//! - [`Document`]: a dynamic document with its lifecycle state
//! - [`Paranoid`]: soft-deletion view of a paranoid document
//! - [`Query`]: criteria builder with default-scope handling
//! - [`MemoryStore`]: in-process [`DocumentStore`]
//!
//! # Example
//!
//! ```text
//! let mapper = Mapper::in_memory();
//! mapper.register(DocumentType::builder("Post").paranoid().build())?;
//!
//! let mut post = mapper.create("Post", Attributes::new()).await?;
//! post.delete(&mapper).await?;                    // soft delete
//! assert_eq!(mapper.count(&mapper.query("Post")?).await?, 0);
//! post.restore(&mapper, RestoreOptions::default()).await?;
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod callbacks;
mod cascade;
mod configuration;
mod connection;
mod document;
mod error;
mod mapper;
mod memory;
mod paranoia;
mod persistence;
mod query;
mod relation;
mod schema;
mod store;
mod time;
mod validation;

pub use callbacks::{AfterHook, BeforeHook, Callbacks, Event, Flow, Interceptor};
pub use configuration::{
    Configuration, DEFAULT_FLAG_FIELD, DEFAULT_PARANOID_FIELD, configure, current_configuration,
    reset,
};
pub use connection::{ConnectionConfig, StoreConnection};
pub use document::{Attributes, Document, Embedding, ID_FIELD};
pub use error::ParanoiaError;
pub use mapper::Mapper;
pub use memory::MemoryStore;
pub use paranoia::{DELETED_SCOPE, Paranoia, Paranoid, RestoreOptions, SoftDeletable};
pub use query::{Delete, Filter, Order, Query, Scope, Update, UpdateOp, Value, lookup};
pub use relation::{Dependent, Related, Relation, RelationKind, Visibility};
pub use schema::{DocumentType, DocumentTypeBuilder, Field, FieldKind};
pub use store::DocumentStore;
pub use time::Timestamp;
pub use validation::{Uniqueness, UniquenessIncludingDeleted, ValidationError, Validator};
