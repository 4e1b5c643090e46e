//! Engine configuration (`strata.toml`)

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use strata_profiles::{FsProfileStore, ProfileResolver, DEFAULT_PREFIXES};
use strata_secrets::{
    EncryptedFileBackend, HttpBackend, SecretBackend, SecretResolver, SecretsManager,
};
use strata_switch::{ActivePointer, BackupStore, PrerequisiteRegistry, PrerequisiteSpec};
use strata_types::{EnvironmentDescriptor, SecretReference};
use strata_validation::{ValidationSettings, Validator};
use tracing::{debug, warn};

use crate::error::{CliError, CliResult};

/// File name looked up in the project root.
pub const CONFIG_FILE: &str = "strata.toml";

/// Engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StrataConfig {
    /// Directory holding profile documents, relative to the root
    pub config_dir: PathBuf,

    /// Directory holding the active environment file
    pub state_dir: PathBuf,

    /// Directory holding backups
    pub backup_dir: PathBuf,

    pub validation: ValidationSettings,
    pub binding: BindingConfig,
    pub environments: Vec<EnvironmentDescriptor>,
    pub prerequisites: BTreeMap<String, PrerequisiteSpec>,
    pub secrets: SecretsConfig,
}

impl Default for StrataConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("config"),
            state_dir: PathBuf::from(".strata"),
            backup_dir: PathBuf::from(".strata/backups"),
            validation: ValidationSettings::default(),
            binding: BindingConfig::default(),
            environments: Vec::new(),
            prerequisites: BTreeMap::new(),
            secrets: SecretsConfig::default(),
        }
    }
}

/// Environment-variable binding
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BindingConfig {
    /// Variable prefixes bound onto top-level sections
    pub prefixes: Vec<String>,

    /// Also bind when switching environments
    pub on_switch: bool,
}

impl Default for BindingConfig {
    fn default() -> Self {
        Self {
            prefixes: DEFAULT_PREFIXES.iter().map(|p| p.to_string()).collect(),
            on_switch: false,
        }
    }
}

/// Secret providers and secret-backed fields
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    pub providers: BTreeMap<String, ProviderConfig>,
    pub references: Vec<SecretReference>,
}

/// Secret backend definition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum ProviderConfig {
    /// Local encrypted file
    File { path: PathBuf, key_env: String },

    /// Remote secret-manager API
    Http {
        base_url: String,
        #[serde(default)]
        token_env: Option<String>,
    },
}

impl StrataConfig {
    /// Load configuration.
    ///
    /// An explicit path must exist. Otherwise `<root>/strata.toml` is tried,
    /// then the user config directory, then defaults.
    pub fn load(path: Option<&Path>, root: &Path) -> CliResult<Self> {
        let config_path = match path {
            Some(p) if !p.exists() => {
                return Err(CliError::Config(format!(
                    "config file not found: {}",
                    p.display()
                )))
            }
            Some(p) => Some(p.to_path_buf()),
            None => [Some(root.join(CONFIG_FILE)), Self::user_config_path()]
                .into_iter()
                .flatten()
                .find(|p| p.exists()),
        };

        match config_path {
            Some(config_path) => {
                debug!(path = %config_path.display(), "Loading configuration");
                let contents = std::fs::read_to_string(&config_path)?;
                toml::from_str(&contents)
                    .map_err(|e| CliError::Config(format!("{}: {}", config_path.display(), e)))
            }
            None => {
                debug!("No configuration file found, using defaults");
                Ok(StrataConfig::default())
            }
        }
    }

    /// `<config dir>/strata/config.toml`, if a config dir exists
    fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("strata").join("config.toml"))
    }
}

/// Configuration anchored at a project root.
#[derive(Debug, Clone)]
pub struct Workspace {
    pub root: PathBuf,
    pub config: StrataConfig,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>, config: StrataConfig) -> Self {
        Self {
            root: root.into(),
            config,
        }
    }

    fn path(&self, relative: &Path) -> PathBuf {
        self.root.join(relative)
    }

    pub fn profile_dir(&self) -> PathBuf {
        self.path(&self.config.config_dir)
    }

    pub fn active_file(&self) -> PathBuf {
        self.path(&self.config.state_dir).join("active.json")
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.path(&self.config.backup_dir)
    }

    pub fn resolver(&self) -> ProfileResolver {
        ProfileResolver::new(Arc::new(FsProfileStore::new(self.profile_dir())))
    }

    pub fn validator(&self) -> Validator {
        Validator::new(&self.config.validation)
    }

    pub fn prerequisites(&self) -> PrerequisiteRegistry {
        PrerequisiteRegistry::from_specs(&self.config.prerequisites)
    }

    pub fn active_pointer(&self) -> ActivePointer {
        ActivePointer::new(self.active_file())
    }

    pub fn backup_store(&self) -> BackupStore {
        BackupStore::new(self.backup_dir())
    }

    /// Build a secrets manager with every configured provider.
    ///
    /// File providers read their key when first used, so one provider with
    /// a missing key never blocks the others. A provider that cannot be
    /// built at all is skipped with a warning.
    pub fn secrets_manager(&self) -> SecretsManager {
        let manager = SecretsManager::new();
        for (id, provider) in &self.config.secrets.providers {
            let backend: Arc<dyn SecretBackend> = match provider {
                ProviderConfig::File { path, key_env } => Arc::new(EncryptedFileBackend::from_env(
                    id.clone(),
                    self.path(path),
                    key_env,
                )),
                ProviderConfig::Http {
                    base_url,
                    token_env,
                } => match HttpBackend::new(id.clone(), base_url.clone()) {
                    Ok(backend) => Arc::new(match token_env {
                        Some(var) => backend.with_token_env(var),
                        None => backend,
                    }),
                    Err(e) => {
                        warn!(provider = %id, error = %e, "Skipping secret provider");
                        continue;
                    }
                },
            };
            manager.register(backend);
        }
        manager
    }

    /// Resolver for the configured secret-backed fields.
    pub fn secret_resolver(&self) -> SecretResolver {
        SecretResolver::new(
            Arc::new(self.secrets_manager()),
            self.config.secrets.references.clone(),
        )
    }
}
