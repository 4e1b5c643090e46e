//! Local encrypted-file backend
//!
//! Secrets are stored in a single JSON document. The document header names
//! the key derivation: Argon2id over the passphrase with a per-file random
//! salt and the stored cost parameters. Each entry holds a random 24-byte
//! nonce and the XChaCha20-Poly1305 ciphertext of the secret's JSON-encoded
//! key/value map, with the secret id bound in as associated data.
//!
//! The document is re-read on every fetch, so rotating the file is picked
//! up by the next cache miss. The passphrase is read at fetch time too: a
//! missing key variable makes this provider unavailable without affecting
//! any other provider.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use base64::Engine;
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};
use parking_lot::Mutex;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::backend::SecretBackend;
use crate::error::{Result, SecretError};
use crate::value::SecretValue;

const FORMAT_VERSION: u32 = 1;
const KDF_ALGORITHM: &str = "argon2id";
const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 24;
const KEY_LEN: usize = 32;

/// Argon2id cost parameters, stored in the document header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory cost in KiB
    pub m_cost: u32,
    /// Number of passes
    pub t_cost: u32,
    /// Degree of parallelism
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: argon2::Params::DEFAULT_M_COST,
            t_cost: argon2::Params::DEFAULT_T_COST,
            p_cost: argon2::Params::DEFAULT_P_COST,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct KdfHeader {
    algorithm: String,
    salt: String,
    #[serde(flatten)]
    params: KdfParams,
}

#[derive(Debug, Serialize, Deserialize)]
struct SecretsDocument {
    version: u32,
    kdf: KdfHeader,
    #[serde(default)]
    secrets: BTreeMap<String, SealedEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct SealedEntry {
    nonce: String,
    ciphertext: String,
}

enum Passphrase {
    Fixed(String),
    Env(String),
}

struct DerivedKey {
    header: KdfHeader,
    passphrase: String,
    key: [u8; KEY_LEN],
}

/// Backend reading secrets from a local encrypted file.
pub struct EncryptedFileBackend {
    id: String,
    path: PathBuf,
    passphrase: Passphrase,
    params: KdfParams,
    derived: Mutex<Option<DerivedKey>>,
}

impl EncryptedFileBackend {
    /// Create a backend keyed by a passphrase.
    pub fn new(id: impl Into<String>, path: impl Into<PathBuf>, passphrase: &str) -> Self {
        Self::with_passphrase(id, path, Passphrase::Fixed(passphrase.to_string()))
    }

    /// Create a backend whose passphrase is read from `key_env` on each use.
    pub fn from_env(id: impl Into<String>, path: impl Into<PathBuf>, key_env: &str) -> Self {
        Self::with_passphrase(id, path, Passphrase::Env(key_env.to_string()))
    }

    fn with_passphrase(
        id: impl Into<String>,
        path: impl Into<PathBuf>,
        passphrase: Passphrase,
    ) -> Self {
        Self {
            id: id.into(),
            path: path.into(),
            passphrase,
            params: KdfParams::default(),
            derived: Mutex::new(None),
        }
    }

    /// Cost parameters used when this backend creates a new document.
    pub fn with_kdf_params(mut self, params: KdfParams) -> Self {
        self.params = params;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Encrypt and store a secret, replacing any existing entry.
    pub fn write_secret(&self, secret_id: &str, entries: &BTreeMap<String, String>) -> Result<()> {
        let mut document = if self.path.exists() {
            self.read_document()?
        } else {
            let mut salt = [0u8; SALT_LEN];
            rand::thread_rng().fill(&mut salt);
            SecretsDocument {
                version: FORMAT_VERSION,
                kdf: KdfHeader {
                    algorithm: KDF_ALGORITHM.to_string(),
                    salt: base64::engine::general_purpose::STANDARD.encode(salt),
                    params: self.params,
                },
                secrets: BTreeMap::new(),
            }
        };

        let key = self.key_for(&document.kdf)?;
        let plaintext =
            serde_json::to_vec(entries).map_err(|e| SecretError::unavailable(&self.id, e))?;
        let sealed = self.seal(&key, secret_id, &plaintext)?;
        document.secrets.insert(secret_id.to_string(), sealed);

        let bytes = serde_json::to_vec_pretty(&document)
            .map_err(|e| SecretError::unavailable(&self.id, e))?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| SecretError::unavailable(&self.id, e))?;
        }
        std::fs::write(&self.path, bytes).map_err(|e| SecretError::unavailable(&self.id, e))?;
        debug!(provider = %self.id, secret = %secret_id, "Stored encrypted secret");
        Ok(())
    }

    fn read_document(&self) -> Result<SecretsDocument> {
        let raw = std::fs::read(&self.path).map_err(|e| {
            SecretError::unavailable(&self.id, format!("{}: {}", self.path.display(), e))
        })?;
        let document: SecretsDocument = serde_json::from_slice(&raw).map_err(|e| {
            SecretError::unavailable(&self.id, format!("{}: {}", self.path.display(), e))
        })?;
        if document.version != FORMAT_VERSION {
            return Err(SecretError::unavailable(
                &self.id,
                format!("unsupported secrets file version {}", document.version),
            ));
        }
        Ok(document)
    }

    fn passphrase(&self) -> Result<String> {
        match &self.passphrase {
            Passphrase::Fixed(passphrase) => Ok(passphrase.clone()),
            Passphrase::Env(var) => std::env::var(var)
                .ok()
                .filter(|v| !v.is_empty())
                .ok_or_else(|| {
                    SecretError::unavailable(&self.id, format!("key variable {} is not set", var))
                }),
        }
    }

    /// Derive (or reuse) the file key for `header`.
    fn key_for(&self, header: &KdfHeader) -> Result<[u8; KEY_LEN]> {
        let passphrase = self.passphrase()?;
        let mut derived = self.derived.lock();
        if let Some(cached) = derived.as_ref() {
            if cached.header == *header && cached.passphrase == passphrase {
                return Ok(cached.key);
            }
        }

        if header.algorithm != KDF_ALGORITHM {
            return Err(SecretError::unavailable(
                &self.id,
                format!("unsupported key derivation {}", header.algorithm),
            ));
        }
        let salt = base64::engine::general_purpose::STANDARD
            .decode(&header.salt)
            .map_err(|_| SecretError::unavailable(&self.id, "malformed salt"))?;
        let params = argon2::Params::new(
            header.params.m_cost,
            header.params.t_cost,
            header.params.p_cost,
            Some(KEY_LEN),
        )
        .map_err(|e| SecretError::unavailable(&self.id, e))?;

        let mut key = [0u8; KEY_LEN];
        argon2::Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params)
            .hash_password_into(passphrase.as_bytes(), &salt, &mut key)
            .map_err(|e| SecretError::unavailable(&self.id, e))?;
        debug!(provider = %self.id, "Derived secrets file key");

        *derived = Some(DerivedKey {
            header: header.clone(),
            passphrase,
            key,
        });
        Ok(key)
    }

    fn seal(&self, key: &[u8; KEY_LEN], secret_id: &str, plaintext: &[u8]) -> Result<SealedEntry> {
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill(&mut nonce);

        let ciphertext = XChaCha20Poly1305::new(Key::from_slice(key))
            .encrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: plaintext,
                    aad: secret_id.as_bytes(),
                },
            )
            .map_err(|_| SecretError::unavailable(&self.id, "encryption failed"))?;

        let b64 = base64::engine::general_purpose::STANDARD;
        Ok(SealedEntry {
            nonce: b64.encode(nonce),
            ciphertext: b64.encode(ciphertext),
        })
    }

    fn open(&self, key: &[u8; KEY_LEN], secret_id: &str, entry: &SealedEntry) -> Result<Vec<u8>> {
        let b64 = base64::engine::general_purpose::STANDARD;
        let malformed = |what: &str| {
            SecretError::unavailable(&self.id, format!("malformed {} for {}", what, secret_id))
        };

        let nonce = b64.decode(&entry.nonce).map_err(|_| malformed("nonce"))?;
        if nonce.len() != NONCE_LEN {
            return Err(malformed("nonce"));
        }
        let ciphertext = b64
            .decode(&entry.ciphertext)
            .map_err(|_| malformed("ciphertext"))?;

        XChaCha20Poly1305::new(Key::from_slice(key))
            .decrypt(
                XNonce::from_slice(&nonce),
                Payload {
                    msg: &ciphertext,
                    aad: secret_id.as_bytes(),
                },
            )
            .map_err(|_| {
                SecretError::access_denied(
                    &self.id,
                    secret_id,
                    "authentication failed (wrong key or tampered entry)",
                )
            })
    }
}

impl SecretBackend for EncryptedFileBackend {
    fn id(&self) -> &str {
        &self.id
    }

    fn fetch(&self, secret_id: &str) -> Result<SecretValue> {
        let document = self.read_document()?;
        let entry = document
            .secrets
            .get(secret_id)
            .ok_or_else(|| SecretError::not_found(&self.id, secret_id))?;
        let key = self.key_for(&document.kdf)?;
        let plaintext = self.open(&key, secret_id, entry)?;
        let entries: BTreeMap<String, String> = serde_json::from_slice(&plaintext)
            .map_err(|e| SecretError::unavailable(&self.id, e))?;
        Ok(SecretValue::new(entries))
    }
}
