//! Secrets manager
//!
//! Registry of providers sharing one single-flight cache.

use std::collections::BTreeMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{info, instrument};

use crate::backend::SecretBackend;
use crate::cache::{CacheEntry, SecretCache};
use crate::error::{Result, SecretError};
use crate::value::SecretValue;

/// Looks up secrets by `(provider, secret_id)` through a read-through cache.
#[derive(Default)]
pub struct SecretsManager {
    providers: RwLock<BTreeMap<String, Arc<dyn SecretBackend>>>,
    cache: SecretCache,
}

impl SecretsManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a backend under its own id, replacing any previous one.
    ///
    /// Replacing a provider drops its cached values.
    pub fn register(&self, backend: Arc<dyn SecretBackend>) {
        let id = backend.id().to_string();
        let replaced = self
            .providers
            .write()
            .insert(id.clone(), backend)
            .is_some();
        if replaced {
            self.cache.invalidate_provider(&id);
        }
        info!(provider = %id, replaced, "Registered secret provider");
    }

    pub fn with_backend(self, backend: Arc<dyn SecretBackend>) -> Self {
        self.register(backend);
        self
    }

    pub fn providers(&self) -> Vec<String> {
        self.providers.read().keys().cloned().collect()
    }

    fn backend(&self, provider: &str) -> Result<Arc<dyn SecretBackend>> {
        self.providers
            .read()
            .get(provider)
            .cloned()
            .ok_or_else(|| SecretError::UnknownProvider(provider.to_string()))
    }

    /// Fetch a secret, consulting the cache first.
    #[instrument(skip(self))]
    pub fn get_secret(&self, provider: &str, secret_id: &str) -> Result<SecretValue> {
        let backend = self.backend(provider)?;
        self.cache
            .get_or_fetch(provider, secret_id, || backend.fetch(secret_id))
    }

    /// Fetch one entry of a secret.
    pub fn get_secret_key(&self, provider: &str, secret_id: &str, key: &str) -> Result<String> {
        let value = self.get_secret(provider, secret_id)?;
        value
            .get(key)
            .map(str::to_string)
            .ok_or_else(|| SecretError::MissingKey {
                provider: provider.to_string(),
                secret: secret_id.to_string(),
                key: key.to_string(),
            })
    }

    /// Drop one cached secret so the next read refetches it.
    pub fn invalidate(&self, provider: &str, secret_id: &str) -> bool {
        self.cache.invalidate(provider, secret_id)
    }

    /// Drop every cached secret of a provider, e.g. after it rotated keys.
    pub fn invalidate_provider(&self, provider: &str) -> usize {
        self.cache.invalidate_provider(provider)
    }

    /// Cached entry metadata, if the secret is cached.
    pub fn cached(&self, provider: &str, secret_id: &str) -> Option<CacheEntry> {
        self.cache.entry(provider, secret_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::InMemoryBackend;
    use std::time::Duration;

    fn manager() -> (SecretsManager, Arc<InMemoryBackend>) {
        let backend = Arc::new(
            InMemoryBackend::new("mem").with_secret("db", [("user", "app"), ("password", "pw")]),
        );
        let manager = SecretsManager::new().with_backend(backend.clone());
        (manager, backend)
    }

    #[test]
    fn test_two_reads_one_fetch_then_invalidate() {
        let (manager, backend) = manager();
        manager.get_secret("mem", "db").unwrap();
        manager.get_secret("mem", "db").unwrap();
        assert_eq!(backend.fetch_count(), 1);

        manager.invalidate("mem", "db");
        manager.get_secret("mem", "db").unwrap();
        assert_eq!(backend.fetch_count(), 2);
    }

    #[test]
    fn test_get_secret_key() {
        let (manager, _) = manager();
        assert_eq!(manager.get_secret_key("mem", "db", "user").unwrap(), "app");
        assert!(matches!(
            manager.get_secret_key("mem", "db", "token"),
            Err(SecretError::MissingKey { .. })
        ));
        assert!(manager.cached("mem", "db").is_some());
    }

    #[test]
    fn test_unknown_provider() {
        let (manager, _) = manager();
        assert!(matches!(
            manager.get_secret("vault", "db"),
            Err(SecretError::UnknownProvider(_))
        ));
    }

    #[test]
    fn test_unavailable_is_surfaced_and_not_cached() {
        let (manager, backend) = manager();
        backend.set_unavailable(true);
        assert!(matches!(
            manager.get_secret("mem", "db"),
            Err(SecretError::ProviderUnavailable { .. })
        ));

        backend.set_unavailable(false);
        assert!(manager.get_secret("mem", "db").is_ok());
        assert_eq!(backend.fetch_count(), 2);
    }

    #[test]
    fn test_concurrent_get_secret_single_fetch() {
        let backend = Arc::new(
            InMemoryBackend::new("mem")
                .with_delay(Duration::from_millis(100))
                .with_secret("db", [("password", "pw")]),
        );
        let manager = SecretsManager::new().with_backend(backend.clone());

        let barrier = std::sync::Barrier::new(6);

        std::thread::scope(|s| {
            for _ in 0..6 {
                s.spawn(|| {
                    barrier.wait();
                    manager.get_secret("mem", "db").unwrap()
                });
            }
        });
        assert_eq!(backend.fetch_count(), 1);
    }

    #[test]
    fn test_reregister_drops_cache() {
        let (manager, _) = manager();
        manager.get_secret("mem", "db").unwrap();

        let rotated = Arc::new(InMemoryBackend::new("mem").with_secret("db", [("password", "new")]));
        manager.register(rotated);
        assert_eq!(
            manager.get_secret_key("mem", "db", "password").unwrap(),
            "new"
        );
    }
}
