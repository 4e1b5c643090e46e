//! Error types for profile loading and resolution.

use thiserror::Error;

/// Errors that can occur while loading or resolving profiles.
#[derive(Debug, Error)]
pub enum ProfileError {
    /// No document exists for the profile name.
    #[error("profile not found: {0}")]
    NotFound(String),

    /// The inheritance chain loops back on itself.
    #[error("inheritance cycle detected: {}", .chain.join(" -> "))]
    CycleDetected { chain: Vec<String> },

    /// Profile names may only contain letters, digits, `-`, `_` and `.`.
    #[error("invalid profile name: {0:?}")]
    InvalidName(String),

    /// The `extends` key is present but is not a string.
    #[error("profile {profile}: 'extends' must be a profile name")]
    InvalidExtends { profile: String },

    /// The document could not be parsed.
    #[error("failed to parse profile {profile}: {reason}")]
    Parse { profile: String, reason: String },

    /// IO error while reading a profile document.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProfileError {
    pub(crate) fn parse(profile: &str, reason: impl ToString) -> Self {
        Self::Parse {
            profile: profile.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Result type for profile operations.
pub type Result<T> = std::result::Result<T, ProfileError>;
