//! Secret references

use serde::{Deserialize, Serialize};

use crate::path::ConfigPath;

/// Declares that a configuration field is backed by a secret.
///
/// When the field's literal value is absent from the resolved tree, the
/// value is fetched from `provider` under `secret`. Providers return a map
/// of strings per secret; `key` selects one entry, and defaults to the last
/// segment of `field`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SecretReference {
    /// Provider identifier
    pub provider: String,

    /// Secret identifier within the provider
    pub secret: String,

    /// Entry within the secret's key/value map
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// Configuration field this secret fills in
    pub field: ConfigPath,
}

impl SecretReference {
    pub fn new(provider: impl Into<String>, secret: impl Into<String>, field: ConfigPath) -> Self {
        Self {
            provider: provider.into(),
            secret: secret.into(),
            key: None,
            field,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// The map entry to read from the fetched secret.
    pub fn entry_key(&self) -> &str {
        self.key
            .as_deref()
            .or_else(|| self.field.last())
            .unwrap_or("value")
    }
}
