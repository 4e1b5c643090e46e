//! Error types for environment switching.

use strata_profiles::ProfileError;
use strata_types::ValidationMessage;
use thiserror::Error;

/// Errors that can occur during a switch or restore.
#[derive(Debug, Error)]
pub enum SwitchError {
    /// No environment with this name is configured.
    #[error("unknown environment: {0}")]
    UnknownEnvironment(String),

    /// The target profile could not be resolved.
    #[error("profile resolution failed: {0}")]
    Profile(#[from] ProfileError),

    /// The resolved configuration has blocking validation messages.
    #[error("validation failed with {} blocking message(s)", .0.len())]
    Validation(Vec<ValidationMessage>),

    /// One or more prerequisites do not hold.
    #[error("prerequisites not met: {}", .0.join("; "))]
    PrerequisiteNotMet(Vec<String>),

    /// The operator declined or mistyped the confirmation.
    #[error("confirmation declined for environment {environment}")]
    ConfirmationDeclined { environment: String },

    /// The backup could not be written or did not verify.
    #[error("backup write failed: {0}")]
    BackupWriteFailure(String),

    /// Another switch or restore holds the critical section.
    #[error("another switch is in progress")]
    ConcurrentSwitchRejected,

    /// No backup with this id exists.
    #[error("backup not found: {0}")]
    BackupNotFound(String),

    /// A stored backup or active file cannot be decoded.
    #[error("corrupt state file {path}: {reason}")]
    CorruptState { path: String, reason: String },

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl SwitchError {
    /// One line per underlying problem, for printing.
    pub fn messages(&self) -> Vec<String> {
        match self {
            SwitchError::Validation(messages) => messages.iter().map(|m| m.to_string()).collect(),
            SwitchError::PrerequisiteNotMet(failures) => failures.clone(),
            other => vec![other.to_string()],
        }
    }
}

/// Result type for switch operations.
pub type Result<T> = std::result::Result<T, SwitchError>;
