//! SurrealDB backend for paranoid-storage.
//!
//! # Example
//!
//! ```text
//! use paranoid_storage::{Mapper, StoreConnection};
//! use paranoid_storage_surreal::SurrealStore;
//!
//! let store = SurrealStore::connect(ConnectionConfig::Namespaced {
//!     url: "ws://localhost:8000".into(),
//!     namespace: "app".into(),
//!     database: "main".into(),
//! })
//! .await?;
//! let mapper = Mapper::with_store(store);
//! ```

#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::unwrap_in_result)
)]

mod connection;
mod store;

pub use store::SurrealStore;

// Re-export core types for convenience
pub use paranoid_storage::{ConnectionConfig, DocumentStore, Mapper, ParanoiaError, StoreConnection};
