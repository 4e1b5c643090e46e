//! Prefix-grouped environment variable binding.
//!
//! Variables such as `DATABASE_POOL_SIZE` are overlaid onto the tree at
//! `database.pool_size`. An existing key whose name matches once case,
//! `_` and `-` are ignored is reused, so `DATABASE_POOLSIZE` and
//! `DATABASE_POOL_SIZE` both bind to an existing `database.poolSize`.

use std::collections::BTreeMap;

use strata_types::{ConfigPath, ConfigValue};
use tracing::debug;

/// Default variable prefixes.
pub const DEFAULT_PREFIXES: [&str; 3] = ["DATABASE", "CACHE", "FEATURE"];

/// Overlay prefixed variables from `env` onto `tree`.
///
/// Returns the paths that were written, in variable-name order.
pub fn bind_environment(
    tree: &mut ConfigValue,
    env: &BTreeMap<String, String>,
    prefixes: &[String],
) -> Vec<ConfigPath> {
    let mut bound = Vec::new();

    for (name, raw) in env {
        let Some((prefix, remainder)) = split_prefix(name, prefixes) else {
            continue;
        };

        let section = prefix.to_ascii_lowercase();
        let key = existing_key(tree, &section, remainder)
            .unwrap_or_else(|| remainder.to_ascii_lowercase());
        let path = ConfigPath::from_segments([section, key]);

        debug!(variable = %name, path = %path, "Binding environment variable");
        tree.set_path(&path, parse_scalar(raw));
        bound.push(path);
    }

    bound
}

/// Split `NAME` into a configured prefix and a non-empty remainder.
fn split_prefix<'a>(name: &'a str, prefixes: &[String]) -> Option<(&'a str, &'a str)> {
    prefixes.iter().find_map(|prefix| {
        let rest = name.strip_prefix(prefix.as_str())?.strip_prefix('_')?;
        (!rest.is_empty()).then(|| (&name[..prefix.len()], rest))
    })
}

fn existing_key(tree: &ConfigValue, section: &str, remainder: &str) -> Option<String> {
    let wanted = normalize(remainder);
    tree.get(section)?
        .as_map()?
        .keys()
        .find(|key| normalize(key) == wanted)
        .cloned()
}

fn normalize(key: &str) -> String {
    key.chars()
        .filter(|c| *c != '_' && *c != '-')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Interpret a variable's text as a bool, integer or float where it looks like one.
pub fn parse_scalar(raw: &str) -> ConfigValue {
    let trimmed = raw.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "true" => return ConfigValue::Bool(true),
        "false" => return ConfigValue::Bool(false),
        _ => {}
    }
    if let Ok(i) = trimmed.parse::<i64>() {
        return ConfigValue::Integer(i);
    }
    if trimmed.contains('.') {
        if let Ok(f) = trimmed.parse::<f64>() {
            if f.is_finite() {
                return ConfigValue::Float(f);
            }
        }
    }
    ConfigValue::String(raw.to_string())
}
