//! Lazy resolution of secret-backed configuration fields

use std::sync::Arc;

use strata_types::{ConfigPath, ConfigValue, SecretReference};
use tracing::debug;

use crate::error::Result;
use crate::manager::SecretsManager;

/// Fills secret-backed fields from the secrets manager.
///
/// A field is only fetched when its literal value is absent (missing,
/// null or an empty string) in the resolved tree.
pub struct SecretResolver {
    manager: Arc<SecretsManager>,
    references: Vec<SecretReference>,
}

impl SecretResolver {
    pub fn new(manager: Arc<SecretsManager>, references: Vec<SecretReference>) -> Self {
        Self {
            manager,
            references,
        }
    }

    pub fn references(&self) -> &[SecretReference] {
        &self.references
    }

    pub fn manager(&self) -> &Arc<SecretsManager> {
        &self.manager
    }

    /// References whose field has no literal value in `tree`.
    pub fn pending<'a>(&'a self, tree: &ConfigValue) -> Vec<&'a SecretReference> {
        self.references
            .iter()
            .filter(|r| !has_literal(tree, &r.field))
            .collect()
    }

    /// Value of `field`, fetching it only if the tree lacks a literal.
    ///
    /// Returns `None` for a field with neither a literal nor a reference.
    pub fn resolve_field(
        &self,
        tree: &ConfigValue,
        field: &ConfigPath,
    ) -> Result<Option<ConfigValue>> {
        if has_literal(tree, field) {
            return Ok(tree.get_path(field).cloned());
        }
        match self.references.iter().find(|r| &r.field == field) {
            Some(reference) => self.fetch(reference).map(Some),
            None => Ok(None),
        }
    }

    /// Copy of `tree` with every pending secret-backed field filled in.
    pub fn resolve_all(&self, tree: &ConfigValue) -> Result<ConfigValue> {
        let mut resolved = tree.clone();
        for reference in self.pending(tree) {
            let value = self.fetch(reference)?;
            resolved.set_path(&reference.field, value);
        }
        Ok(resolved)
    }

    fn fetch(&self, reference: &SecretReference) -> Result<ConfigValue> {
        debug!(
            provider = %reference.provider,
            secret = %reference.secret,
            field = %reference.field,
            "Resolving secret-backed field"
        );
        let value = self.manager.get_secret_key(
            &reference.provider,
            &reference.secret,
            reference.entry_key(),
        )?;
        Ok(ConfigValue::String(value))
    }
}

fn has_literal(tree: &ConfigValue, field: &ConfigPath) -> bool {
    match tree.get_path(field) {
        None | Some(ConfigValue::Null) => false,
        Some(ConfigValue::String(s)) => !s.is_empty(),
        Some(_) => true,
    }
}
