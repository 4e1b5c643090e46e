//! Strata Secrets - Secret providers behind a single-flight cache
//!
//! Secrets are addressed by `(provider, secret_id)` and returned as a map
//! of string entries. The [`SecretsManager`] keeps a read-through cache in
//! front of every registered [`SecretBackend`]:
//! - cached reads never block
//! - concurrent misses for the same key share one backend fetch
//! - failed fetches are never cached
//! - values stay cached until invalidated
//!
//! Backends: [`InMemoryBackend`] for tests and embedding,
//! [`EncryptedFileBackend`] for a local encrypted file and [`HttpBackend`]
//! for a remote secret-manager API.

pub mod backend;
pub mod cache;
pub mod error;
pub mod file;
pub mod http;
pub mod manager;
pub mod resolver;
pub mod value;

pub use backend::{InMemoryBackend, SecretBackend};
pub use cache::{CacheEntry, SecretCache};
pub use error::{Result, SecretError};
pub use file::EncryptedFileBackend;
pub use http::HttpBackend;
pub use manager::SecretsManager;
pub use resolver::SecretResolver;
pub use value::SecretValue;
