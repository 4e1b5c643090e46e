//! CLI error types

use strata_profiles::ProfileError;
use strata_secrets::SecretError;
use strata_switch::SwitchError;
use thiserror::Error;

/// CLI error types
#[derive(Debug, Error)]
pub enum CliError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Profile resolution failed
    #[error(transparent)]
    Profile(#[from] ProfileError),

    /// Validation found blocking messages
    #[error("Validation failed: {errors} error(s), {warnings} warning(s)")]
    Validation { errors: usize, warnings: usize },

    /// Switch, restore or prune failed
    #[error(transparent)]
    Switch(#[from] SwitchError),

    /// Secret lookup failed
    #[error(transparent)]
    Secret(#[from] SecretError),

    /// Operator aborted at a prompt
    #[error("Aborted")]
    Aborted,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// One line per problem, in the order they were found.
    pub fn messages(&self) -> Vec<String> {
        match self {
            CliError::Switch(err) => err.messages(),
            other => vec![other.to_string()],
        }
    }
}

/// Result type for CLI operations
pub type CliResult<T> = Result<T, CliError>;
