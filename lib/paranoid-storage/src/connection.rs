//! Backend connection setup.

use async_trait::async_trait;

use crate::ParanoiaError;

/// Connection configuration for store backends.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionConfig {
    /// Connect using a database URL string.
    Url(String),
    /// Connect to a URL and select a namespace and database on it.
    Namespaced {
        url: String,
        namespace: String,
        database: String,
    },
}

impl ConnectionConfig {
    pub fn url(&self) -> &str {
        match self {
            ConnectionConfig::Url(url) | ConnectionConfig::Namespaced { url, .. } => url,
        }
    }
}

impl From<&str> for ConnectionConfig {
    fn from(url: &str) -> Self {
        ConnectionConfig::Url(url.to_string())
    }
}

impl From<String> for ConnectionConfig {
    fn from(url: String) -> Self {
        ConnectionConfig::Url(url)
    }
}

impl From<&String> for ConnectionConfig {
    fn from(url: &String) -> Self {
        ConnectionConfig::Url(url.clone())
    }
}

/// Trait for stores that open their own connection.
#[async_trait]
pub trait StoreConnection: Sized + Send + Sync {
    /// Connect to the database using the provided configuration.
    async fn connect(config: impl Into<ConnectionConfig> + Send) -> Result<Self, ParanoiaError>;
}
