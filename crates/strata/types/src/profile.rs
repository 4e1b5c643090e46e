//! Profiles and resolved configurations

use serde::{Deserialize, Serialize};

use crate::path::ConfigPath;
use crate::value::{ConfigMap, ConfigValue, ValueKind};

/// A named configuration document before merging.
///
/// Profiles are immutable once loaded. The `extends` key of the source
/// document has already been removed and moved into `parent`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Profile name (identity)
    pub name: String,

    /// Raw, unresolved key tree
    pub tree: ConfigMap,

    /// Name of the parent profile, if any
    pub parent: Option<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>, tree: ConfigMap, parent: Option<String>) -> Self {
        Self {
            name: name.into(),
            tree,
            parent,
        }
    }
}

/// A replacement where parent and child disagree on the kind of value.
///
/// These are not errors: the child value wins wholesale. They are kept on
/// the resolved configuration so tooling can surface them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeTypeConflict {
    /// Path at which the override happened
    pub path: ConfigPath,

    /// Profile whose value won
    pub profile: String,

    /// Kind of the replaced value
    pub parent_kind: ValueKind,

    /// Kind of the winning value
    pub child_kind: ValueKind,
}

impl std::fmt::Display for MergeTypeConflict {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}: {} from profile '{}' replaces inherited {}",
            self.path, self.child_kind, self.profile, self.parent_kind
        )
    }
}

/// A string leaf that still holds `${NAME}` placeholders after expansion.
///
/// Only placeholders whose variable was unset are listed. Text produced by
/// the `$${` escape is literal and never appears here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnresolvedPlaceholder {
    /// Path of the string leaf
    pub path: ConfigPath,

    /// Variable names left unexpanded, in order of first appearance
    pub names: Vec<String>,
}

/// The fully merged, placeholder-expanded tree for one profile.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedConfig {
    /// Name of the profile that was resolved
    pub name: String,

    /// Resolution chain, root ancestor first, requested profile last
    pub chain: Vec<String>,

    /// Merged tree (always a map)
    pub tree: ConfigValue,

    /// Kind-changing overrides observed while merging
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub overrides: Vec<MergeTypeConflict>,

    /// Leaves whose placeholders were left unexpanded
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub unresolved: Vec<UnresolvedPlaceholder>,
}

impl ResolvedConfig {
    /// Look up a value by dot path.
    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        self.tree.get(path)
    }

    /// Unexpanded placeholder names recorded for the leaf at `path`.
    pub fn unresolved_at(&self, path: &ConfigPath) -> Option<&[String]> {
        self.unresolved
            .iter()
            .find(|u| &u.path == path)
            .map(|u| u.names.as_slice())
    }
}
