//! Secret values

use std::collections::BTreeMap;
use std::sync::Arc;

/// A fetched secret: a map of named string entries.
///
/// Cheap to clone; the `Debug` output never includes the entries' values.
#[derive(Clone, PartialEq, Eq)]
pub struct SecretValue(Arc<BTreeMap<String, String>>);

impl SecretValue {
    pub fn new(entries: BTreeMap<String, String>) -> Self {
        Self(Arc::new(entries))
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// The only entry, if the secret has exactly one.
    pub fn single(&self) -> Option<&str> {
        if self.0.len() == 1 {
            self.0.values().next().map(String::as_str)
        } else {
            None
        }
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Borrow the raw entries.
    pub fn expose(&self) -> &BTreeMap<String, String> {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretValue")
            .field("keys", &self.0.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_is_redacted() {
        let value = SecretValue::new([("password".to_string(), "hunter2".to_string())].into());
        let rendered = format!("{:?}", value);
        assert!(rendered.contains("password"));
        assert!(!rendered.contains("hunter2"));
        assert_eq!(value.single(), Some("hunter2"));
    }
}
