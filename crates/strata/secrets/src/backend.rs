//! Secret backend trait and the in-memory backend

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use parking_lot::RwLock;

use crate::error::{Result, SecretError};
use crate::value::SecretValue;

/// A source of secrets.
///
/// Implementations perform the actual remote or local lookup; caching and
/// fetch de-duplication are layered on top by [`crate::SecretsManager`].
pub trait SecretBackend: Send + Sync {
    /// Provider identifier this backend is registered under.
    fn id(&self) -> &str;

    /// Fetch a secret's key/value map.
    fn fetch(&self, secret_id: &str) -> Result<SecretValue>;
}

/// Backend holding secrets in memory.
///
/// Counts fetches so callers can assert how often the backend was hit.
pub struct InMemoryBackend {
    id: String,
    secrets: RwLock<HashMap<String, SecretValue>>,
    denied: RwLock<Vec<String>>,
    fetches: AtomicUsize,
    unavailable: AtomicBool,
    delay: Option<Duration>,
}

impl InMemoryBackend {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            secrets: RwLock::new(HashMap::new()),
            denied: RwLock::new(Vec::new()),
            fetches: AtomicUsize::new(0),
            unavailable: AtomicBool::new(false),
            delay: None,
        }
    }

    /// Sleep this long inside every fetch.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_secret<I, K, V>(self, secret_id: &str, entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.insert(secret_id, entries);
        self
    }

    /// Insert or replace a secret.
    pub fn insert<I, K, V>(&self, secret_id: &str, entries: I)
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let entries: BTreeMap<String, String> = entries
            .into_iter()
            .map(|(k, v)| (k.into(), v.into()))
            .collect();
        self.secrets
            .write()
            .insert(secret_id.to_string(), SecretValue::new(entries));
    }

    /// Reject every fetch of this secret with `AccessDenied`.
    pub fn deny(&self, secret_id: &str) {
        self.denied.write().push(secret_id.to_string());
    }

    /// Toggle simulated provider outage.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of fetches issued against this backend.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

impl SecretBackend for InMemoryBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch(&self, secret_id: &str) -> Result<SecretValue> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(SecretError::unavailable(&self.id, "backend offline"));
        }
        if self.denied.read().iter().any(|d| d == secret_id) {
            return Err(SecretError::access_denied(&self.id, secret_id, "denied"));
        }
        self.secrets
            .read()
            .get(secret_id)
            .cloned()
            .ok_or_else(|| SecretError::not_found(&self.id, secret_id))
    }
}
