//! Strata Types - Core data model for layered configuration
//!
//! This crate defines the types shared by every Strata component:
//! - Configuration values as a tagged tree (`ConfigValue`)
//! - Dot paths into that tree (`ConfigPath`)
//! - Profiles and resolved configurations
//! - Severity-tagged validation messages
//! - Environment descriptors and secret references

pub mod environment;
pub mod message;
pub mod path;
pub mod profile;
pub mod secret;
pub mod value;

pub use environment::EnvironmentDescriptor;
pub use message::{Severity, ValidationMessage};
pub use path::{ConfigPath, PathError};
pub use profile::{MergeTypeConflict, Profile, ResolvedConfig, UnresolvedPlaceholder};
pub use secret::SecretReference;
pub use value::{ConfigMap, ConfigValue, ValueKind};
