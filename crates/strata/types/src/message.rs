//! Validation messages

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::path::ConfigPath;
use crate::value::ConfigValue;

/// Severity of a validation message.
///
/// Ordered so that `Error` is the most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Info => write!(f, "INFO"),
            Severity::Warning => write!(f, "WARNING"),
            Severity::Error => write!(f, "ERROR"),
        }
    }
}

/// A single finding produced by a validation rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationMessage {
    pub severity: Severity,

    /// Dot path of the offending field
    pub field: ConfigPath,

    /// Human-readable description
    pub message: String,

    /// The value that triggered the message, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offending_value: Option<ConfigValue>,
}

impl ValidationMessage {
    pub fn new(severity: Severity, field: ConfigPath, message: impl Into<String>) -> Self {
        Self {
            severity,
            field,
            message: message.into(),
            offending_value: None,
        }
    }

    pub fn error(field: ConfigPath, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, field, message)
    }

    pub fn warning(field: ConfigPath, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, field, message)
    }

    pub fn info(field: ConfigPath, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, field, message)
    }

    /// Attach the value that triggered this message.
    pub fn with_value(mut self, value: ConfigValue) -> Self {
        self.offending_value = Some(value);
        self
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for ValidationMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.severity, self.field, self.message)?;
        if let Some(value) = &self.offending_value {
            write!(f, " (got: {})", value.display_scalar())?;
        }
        Ok(())
    }
}
