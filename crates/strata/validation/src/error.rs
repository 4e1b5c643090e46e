//! Error types for validation

use strata_types::{Severity, ValidationMessage};
use thiserror::Error;

/// Raised by the report-and-fail mode when blocking messages exist.
#[derive(Debug, Clone, Error)]
pub enum ValidationError {
    /// At least one blocking message was produced. Carries every message
    /// from the run, blocking or not.
    #[error("configuration validation failed: {}", summarize(.messages))]
    Failed { messages: Vec<ValidationMessage> },
}

impl ValidationError {
    pub fn messages(&self) -> &[ValidationMessage] {
        match self {
            ValidationError::Failed { messages } => messages,
        }
    }
}

fn summarize(messages: &[ValidationMessage]) -> String {
    let errors = messages
        .iter()
        .filter(|m| m.severity == Severity::Error)
        .count();
    let warnings = messages
        .iter()
        .filter(|m| m.severity == Severity::Warning)
        .count();
    format!("{} error(s), {} warning(s)", errors, warnings)
}

/// Result type for validation operations.
pub type Result<T> = std::result::Result<T, ValidationError>;
