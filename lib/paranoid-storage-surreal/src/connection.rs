//! Opening a SurrealDB connection.

use async_trait::async_trait;
use paranoid_storage::{ConnectionConfig, ParanoiaError, StoreConnection};
use surrealdb::Surreal;
use surrealdb::engine::remote::ws::Ws;
use tracing::info;

use crate::SurrealStore;

/// Strip the scheme; the `Ws` engine takes a bare `host:port`.
fn address(url: &str) -> &str {
    url.split_once("://").map_or(url, |(_, rest)| rest)
}

#[async_trait]
impl StoreConnection for SurrealStore {
    async fn connect(config: impl Into<ConnectionConfig> + Send) -> Result<Self, ParanoiaError> {
        let config = config.into();
        let db = Surreal::new::<Ws>(address(config.url()))
            .await
            .map_err(|e| ParanoiaError::StorageError(e.to_string()))?;

        if let ConnectionConfig::Namespaced {
            namespace,
            database,
            ..
        } = &config
        {
            db.use_ns(namespace.as_str())
                .use_db(database.as_str())
                .await
                .map_err(|e| ParanoiaError::StorageError(e.to_string()))?;
        }

        info!(url = %config.url(), "connected to SurrealDB");
        Ok(SurrealStore::new(db))
    }
}
