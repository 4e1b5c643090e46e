//! Error types for secret lookup.
//!
//! Errors are `Clone` because a single fetch result is handed to every
//! caller waiting on it.

use thiserror::Error;

/// Errors that can occur while fetching secrets.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SecretError {
    /// The provider has no secret with this id.
    #[error("secret not found: {provider}/{secret}")]
    NotFound { provider: String, secret: String },

    /// The provider could not be reached or returned a transient failure.
    #[error("secret provider {provider} unavailable: {reason}")]
    ProviderUnavailable { provider: String, reason: String },

    /// The caller is not permitted to read the secret.
    #[error("access denied to secret {provider}/{secret}: {reason}")]
    AccessDenied {
        provider: String,
        secret: String,
        reason: String,
    },

    /// No provider is registered under this id.
    #[error("unknown secret provider: {0}")]
    UnknownProvider(String),

    /// The secret exists but has no entry under the requested key.
    #[error("secret {provider}/{secret} has no key '{key}'")]
    MissingKey {
        provider: String,
        secret: String,
        key: String,
    },
}

impl SecretError {
    pub fn not_found(provider: &str, secret: &str) -> Self {
        Self::NotFound {
            provider: provider.to_string(),
            secret: secret.to_string(),
        }
    }

    pub fn unavailable(provider: &str, reason: impl ToString) -> Self {
        Self::ProviderUnavailable {
            provider: provider.to_string(),
            reason: reason.to_string(),
        }
    }

    pub fn access_denied(provider: &str, secret: &str, reason: impl ToString) -> Self {
        Self::AccessDenied {
            provider: provider.to_string(),
            secret: secret.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for secret operations.
pub type Result<T> = std::result::Result<T, SecretError>;
