//! Profile resolver
//!
//! Resolution walks the `extends` chain with an explicit visit path, merges
//! the chain top-down (root ancestor first) and finally expands `${NAME}`
//! placeholders. Nothing is cached; each call re-reads the store and the
//! environment, so repeated calls with unchanged inputs return equal trees.

use std::borrow::Cow;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use strata_types::{ConfigPath, ConfigValue, Profile, ResolvedConfig};
use tracing::{debug, instrument};

use crate::binding::bind_environment;
use crate::error::{ProfileError, Result};
use crate::interpolate::interpolate_tree;
use crate::merge::merge_into;
use crate::store::ProfileStore;

/// Resolves named profiles against a store.
#[derive(Clone)]
pub struct ProfileResolver {
    store: Arc<dyn ProfileStore>,

    /// Pinned environment; `None` reads the process environment per call
    env: Option<BTreeMap<String, String>>,
}

impl std::fmt::Debug for ProfileResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProfileResolver")
            .field("pinned_env", &self.env.is_some())
            .finish()
    }
}

impl ProfileResolver {
    pub fn new(store: Arc<dyn ProfileStore>) -> Self {
        Self { store, env: None }
    }

    /// Pin the variables used for placeholder expansion and binding.
    pub fn with_env(mut self, env: BTreeMap<String, String>) -> Self {
        self.env = Some(env);
        self
    }

    pub fn store(&self) -> &Arc<dyn ProfileStore> {
        &self.store
    }

    /// List the profiles available in the underlying store.
    pub fn profiles(&self) -> Result<Vec<String>> {
        self.store.list()
    }

    fn environment(&self) -> Cow<'_, BTreeMap<String, String>> {
        match &self.env {
            Some(env) => Cow::Borrowed(env),
            None => Cow::Owned(std::env::vars().collect()),
        }
    }

    /// Load `name` and all of its ancestors, requested profile first.
    ///
    /// Fails with [`ProfileError::CycleDetected`] as soon as a name repeats
    /// on the current path. The chain reported starts at the first
    /// occurrence of the repeated name, e.g. `[a, b, a]`.
    pub fn ancestry(&self, name: &str) -> Result<Vec<Profile>> {
        let mut path: Vec<String> = Vec::new();
        let mut visited: HashSet<String> = HashSet::new();
        let mut profiles = Vec::new();
        let mut next = Some(name.to_string());

        while let Some(current) = next.take() {
            if visited.contains(&current) {
                let start = path.iter().position(|n| *n == current).unwrap_or(0);
                let mut chain = path[start..].to_vec();
                chain.push(current);
                return Err(ProfileError::CycleDetected { chain });
            }

            let profile = self.store.load(&current)?;
            debug!(
                profile = %profile.name,
                parent = ?profile.parent,
                "Loaded profile in inheritance chain"
            );
            next = profile.parent.clone();
            visited.insert(current.clone());
            path.push(current);
            profiles.push(profile);
        }

        Ok(profiles)
    }

    /// Resolve a profile into a merged, placeholder-expanded tree.
    #[instrument(skip(self))]
    pub fn resolve(&self, name: &str) -> Result<ResolvedConfig> {
        let env = self.environment();
        self.resolve_with(name, &env)
    }

    /// Resolve, then overlay prefix-grouped environment variables.
    #[instrument(skip(self, prefixes))]
    pub fn resolve_bound(&self, name: &str, prefixes: &[String]) -> Result<ResolvedConfig> {
        let env = self.environment();
        let mut resolved = self.resolve_with(name, &env)?;
        let bound = bind_environment(&mut resolved.tree, &env, prefixes);
        resolved
            .unresolved
            .retain(|u| !bound.iter().any(|path| u.path.starts_with(path)));
        debug!(profile = name, bound = bound.len(), "Bound environment variables");
        Ok(resolved)
    }

    fn resolve_with(&self, name: &str, env: &BTreeMap<String, String>) -> Result<ResolvedConfig> {
        let ancestry = self.ancestry(name)?;

        let mut tree = ConfigValue::empty_map();
        let mut overrides = Vec::new();
        for profile in ancestry.iter().rev() {
            merge_into(
                &mut tree,
                ConfigValue::Map(profile.tree.clone()),
                &profile.name,
                &ConfigPath::root(),
                &mut overrides,
            );
        }

        let unresolved = interpolate_tree(&mut tree, env);

        let chain: Vec<String> = ancestry.iter().rev().map(|p| p.name.clone()).collect();
        debug!(profile = name, chain = ?chain, overrides = overrides.len(), "Resolved profile");

        Ok(ResolvedConfig {
            name: name.to_string(),
            chain,
            tree,
            overrides,
            unresolved,
        })
    }
}
