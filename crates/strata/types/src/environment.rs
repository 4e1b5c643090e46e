//! Environment descriptors

use serde::{Deserialize, Serialize};

/// Static description of a switchable environment.
///
/// Descriptors come from deployment configuration and are never created
/// at runtime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentDescriptor {
    /// Environment name (e.g. "staging")
    pub name: String,

    /// Profile resolved when this environment becomes active
    #[serde(rename = "profile")]
    pub source_profile: String,

    /// Names of prerequisite predicates that must hold before switching
    #[serde(default)]
    pub prerequisites: Vec<String>,

    /// Whether the operator must echo the environment name to confirm
    #[serde(default)]
    pub confirmation_required: bool,

    /// Protected environments are validated in strict mode
    #[serde(default)]
    pub protected: bool,
}

impl EnvironmentDescriptor {
    /// Descriptor with no gates.
    pub fn new(name: impl Into<String>, source_profile: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source_profile: source_profile.into(),
            prerequisites: Vec::new(),
            confirmation_required: false,
            protected: false,
        }
    }

    pub fn with_prerequisite(mut self, name: impl Into<String>) -> Self {
        self.prerequisites.push(name.into());
        self
    }

    pub fn with_confirmation(mut self) -> Self {
        self.confirmation_required = true;
        self
    }

    pub fn protected(mut self) -> Self {
        self.protected = true;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deserialize_with_defaults() {
        let desc: EnvironmentDescriptor =
            serde_json::from_str(r#"{"name":"dev","profile":"development"}"#).unwrap();
        assert_eq!(desc, EnvironmentDescriptor::new("dev", "development"));
    }
}
