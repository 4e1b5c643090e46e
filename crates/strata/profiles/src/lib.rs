//! Strata Profiles - Loading and resolving layered configuration profiles
//!
//! Profiles are named documents that may name a parent via `extends`.
//! Resolution walks the inheritance chain, deep-merges it top-down and
//! expands `${NAME}` placeholders from the environment.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use strata_profiles::{InMemoryProfileStore, ProfileResolver};
//!
//! let store = InMemoryProfileStore::new()
//!     .with_yaml("base", "app:\n  name: x\ndb:\n  pool: 5\n").unwrap()
//!     .with_yaml("dev", "extends: base\ndb:\n  pool: 10\n").unwrap();
//!
//! let resolved = ProfileResolver::new(Arc::new(store)).resolve("dev").unwrap();
//! assert_eq!(resolved.get("db.pool").and_then(|v| v.as_i64()), Some(10));
//! assert_eq!(resolved.get("app.name").and_then(|v| v.as_str()), Some("x"));
//! ```

pub mod binding;
pub mod error;
pub mod interpolate;
pub mod merge;
pub mod resolver;
pub mod store;

pub use binding::{bind_environment, DEFAULT_PREFIXES};
pub use error::{ProfileError, Result};
pub use interpolate::{interpolate, interpolate_tree, unresolved_placeholders};
pub use merge::{merge, merge_into};
pub use resolver::ProfileResolver;
pub use store::{
    profile_from_document, DocumentFormat, FsProfileStore, InMemoryProfileStore, ProfileStore,
    EXTENDS_KEY,
};
