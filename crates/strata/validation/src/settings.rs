//! Validation settings
//!
//! Designates which fields each default rule inspects. Every field has a
//! default so an empty `[validation]` table is valid.

use serde::{Deserialize, Serialize};

/// Field designations and denylists for the default rule set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationSettings {
    /// Dot paths that must be present and non-null
    pub required_fields: Vec<String>,

    /// Dot paths that must hold absolute URLs when present
    pub url_fields: Vec<String>,

    /// Dot paths that must hold ports in 1..=65535 when present
    pub port_fields: Vec<String>,

    /// Sections describing data stores, checked for transport encryption
    pub data_store_fields: Vec<String>,

    /// Placeholder secret values that must never ship
    pub weak_secret_denylist: Vec<String>,

    /// Key-name fragments that mark a field as secret-bearing
    pub secret_key_markers: Vec<String>,
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            required_fields: strings(&["app.name", "app.environment"]),
            url_fields: strings(&["database.url", "cache.url", "api.baseUrl"]),
            port_fields: strings(&["server.port", "database.port", "cache.port"]),
            data_store_fields: strings(&["database", "cache"]),
            weak_secret_denylist: strings(&[
                "changeme",
                "change_me",
                "change-me",
                "password",
                "secret",
                "admin",
                "default",
                "123456",
                "12345678",
                "test",
                "example",
                "placeholder",
                "your-secret-here",
            ]),
            secret_key_markers: strings(&[
                "password",
                "passwd",
                "secret",
                "token",
                "apikey",
                "privatekey",
                "credential",
            ]),
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_table_keeps_other_defaults() {
        let settings: ValidationSettings =
            toml::from_str("required_fields = [\"service.name\"]\n").unwrap();
        assert_eq!(settings.required_fields, vec!["service.name"]);
        assert_eq!(settings.port_fields, ValidationSettings::default().port_fields);
    }
}
