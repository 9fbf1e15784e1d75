//! Marker field configuration.
//!
//! A [`Configuration`] is read once when a paranoid document type is
//! registered. The process-wide value returned by [`current_configuration`]
//! is only a convenience default for [`crate::DocumentTypeBuilder::paranoid`];
//! changing it later does not affect types that are already registered.

use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::info;

pub const DEFAULT_PARANOID_FIELD: &str = "deletedAt";
pub const DEFAULT_FLAG_FIELD: &str = "isDeleted";

/// Names of the fields that carry the deletion state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Configuration {
    /// Timestamp field; null or absent means the document is visible.
    pub paranoid_field: String,
    /// Optional boolean mirror of the deletion state.
    pub flag_field: Option<String>,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            paranoid_field: DEFAULT_PARANOID_FIELD.to_string(),
            flag_field: None,
        }
    }
}

impl Configuration {
    pub fn new(paranoid_field: impl Into<String>) -> Self {
        Self {
            paranoid_field: paranoid_field.into(),
            flag_field: None,
        }
    }

    /// Enable the boolean flag under its default name.
    pub fn with_flag(self) -> Self {
        self.with_flag_field(DEFAULT_FLAG_FIELD)
    }

    pub fn with_flag_field(mut self, flag_field: impl Into<String>) -> Self {
        self.flag_field = Some(flag_field.into());
        self
    }
}

static CONFIGURATION: RwLock<Option<Configuration>> = RwLock::new(None);

/// Mutate the process-wide configuration in place.
///
/// Call once at startup, before registering document types.
pub fn configure<F>(f: F)
where
    F: FnOnce(&mut Configuration),
{
    let mut guard = CONFIGURATION
        .write()
        .unwrap_or_else(PoisonError::into_inner);
    let configuration = guard.get_or_insert_with(Configuration::default);
    f(configuration);
    info!(
        paranoid_field = %configuration.paranoid_field,
        flag_field = ?configuration.flag_field,
        "paranoia configured"
    );
}

/// Snapshot of the process-wide configuration, created with defaults on
/// first access.
pub fn current_configuration() -> Configuration {
    if let Some(configuration) = CONFIGURATION
        .read()
        .unwrap_or_else(PoisonError::into_inner)
        .as_ref()
    {
        return configuration.clone();
    }

    CONFIGURATION
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .get_or_insert_with(Configuration::default)
        .clone()
}

/// Discard the process-wide configuration; the next access recreates the
/// defaults.
pub fn reset() {
    CONFIGURATION
        .write()
        .unwrap_or_else(PoisonError::into_inner)
        .take();
    info!("paranoia configuration reset");
}
