//! Profile stores
//!
//! A store returns the raw, unresolved content of a named profile. The
//! filesystem store reads `config/<name>.<ext>`; the in-memory store backs
//! tests and embedded use.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use strata_types::{ConfigValue, Profile};
use tracing::debug;

use crate::error::{ProfileError, Result};

/// Key naming the parent profile in a document.
pub const EXTENDS_KEY: &str = "extends";

/// Document formats understood by the filesystem store, in probe order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Yaml,
    Json,
    Toml,
}

impl DocumentFormat {
    /// File extensions probed for each profile, in order.
    pub const EXTENSIONS: [(&'static str, DocumentFormat); 4] = [
        ("yaml", DocumentFormat::Yaml),
        ("yml", DocumentFormat::Yaml),
        ("json", DocumentFormat::Json),
        ("toml", DocumentFormat::Toml),
    ];

    pub fn from_extension(ext: &str) -> Option<Self> {
        Self::EXTENSIONS
            .iter()
            .find(|(candidate, _)| candidate.eq_ignore_ascii_case(ext))
            .map(|(_, format)| *format)
    }

    /// Parse a document into a value tree.
    pub fn parse(self, profile: &str, contents: &str) -> Result<ConfigValue> {
        match self {
            DocumentFormat::Yaml => {
                serde_yaml::from_str(contents).map_err(|e| ProfileError::parse(profile, e))
            }
            DocumentFormat::Json => {
                serde_json::from_str(contents).map_err(|e| ProfileError::parse(profile, e))
            }
            DocumentFormat::Toml => {
                toml::from_str(contents).map_err(|e| ProfileError::parse(profile, e))
            }
        }
    }
}

/// Source of raw profile documents.
pub trait ProfileStore: Send + Sync {
    /// Load a profile by name.
    fn load(&self, name: &str) -> Result<Profile>;

    /// List the names of all available profiles, sorted.
    fn list(&self) -> Result<Vec<String>>;
}

/// Build a [`Profile`] from a parsed document, splitting off `extends`.
///
/// An empty document (null root) is an empty profile.
pub fn profile_from_document(name: &str, document: ConfigValue) -> Result<Profile> {
    let mut tree = match document {
        ConfigValue::Map(map) => map,
        ConfigValue::Null => BTreeMap::new(),
        other => {
            return Err(ProfileError::parse(
                name,
                format!("document root must be a map, found {}", other.kind()),
            ))
        }
    };

    let parent = match tree.remove(EXTENDS_KEY) {
        None | Some(ConfigValue::Null) => None,
        Some(ConfigValue::String(parent)) if !parent.trim().is_empty() => {
            Some(parent.trim().to_string())
        }
        Some(_) => {
            return Err(ProfileError::InvalidExtends {
                profile: name.to_string(),
            })
        }
    };

    Ok(Profile::new(name, tree, parent))
}

/// Reject names that could address files outside the profile directory.
pub fn validate_profile_name(name: &str) -> Result<()> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));
    if valid {
        Ok(())
    } else {
        Err(ProfileError::InvalidName(name.to_string()))
    }
}

/// Filesystem-backed profile store.
#[derive(Debug, Clone)]
pub struct FsProfileStore {
    dir: PathBuf,
}

impl FsProfileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Locate the document for `name`, probing extensions in order.
    fn locate(&self, name: &str) -> Option<(PathBuf, DocumentFormat)> {
        DocumentFormat::EXTENSIONS.iter().find_map(|(ext, format)| {
            let path = self.dir.join(format!("{}.{}", name, ext));
            path.is_file().then_some((path, *format))
        })
    }
}

impl ProfileStore for FsProfileStore {
    fn load(&self, name: &str) -> Result<Profile> {
        validate_profile_name(name)?;
        let (path, format) = self
            .locate(name)
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))?;

        debug!(profile = name, path = %path.display(), "Loading profile document");
        let contents = std::fs::read_to_string(&path)?;
        let document = format.parse(name, &contents)?;
        profile_from_document(name, document)
    }

    fn list(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut names = Vec::new();
        for entry in std::fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if !path.is_file() {
                continue;
            }
            let known_ext = path
                .extension()
                .and_then(|e| e.to_str())
                .and_then(DocumentFormat::from_extension)
                .is_some();
            if let (true, Some(stem)) = (known_ext, path.file_stem().and_then(|s| s.to_str())) {
                if validate_profile_name(stem).is_ok() {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }
}

/// In-memory profile store.
#[derive(Debug, Clone, Default)]
pub struct InMemoryProfileStore {
    profiles: BTreeMap<String, Profile>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a profile, replacing any existing one with the same name.
    pub fn insert(&mut self, profile: Profile) {
        self.profiles.insert(profile.name.clone(), profile);
    }

    /// Add a profile from a document tree, honouring its `extends` key.
    pub fn with_document(mut self, name: &str, document: ConfigValue) -> Result<Self> {
        let profile = profile_from_document(name, document)?;
        self.insert(profile);
        Ok(self)
    }

    /// Add a profile from YAML text.
    pub fn with_yaml(self, name: &str, yaml: &str) -> Result<Self> {
        let document = DocumentFormat::Yaml.parse(name, yaml)?;
        self.with_document(name, document)
    }
}

impl ProfileStore for InMemoryProfileStore {
    fn load(&self, name: &str) -> Result<Profile> {
        self.profiles
            .get(name)
            .cloned()
            .ok_or_else(|| ProfileError::NotFound(name.to_string()))
    }

    fn list(&self) -> Result<Vec<String>> {
        Ok(self.profiles.keys().cloned().collect())
    }
}
