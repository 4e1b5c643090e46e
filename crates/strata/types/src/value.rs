//! Configuration values
//!
//! Profile documents are arbitrary nested trees. They are held as a tagged
//! variant so that merge and validation logic can match on structure.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::path::ConfigPath;

/// Ordered map of keys to values.
pub type ConfigMap = BTreeMap<String, ConfigValue>;

/// A node in a configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(untagged)]
pub enum ConfigValue {
    #[default]
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
    List(Vec<ConfigValue>),
    Map(ConfigMap),
}

/// The structural kind of a value, without its payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueKind {
    Null,
    Bool,
    Integer,
    Float,
    String,
    List,
    Map,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Integer => "integer",
            ValueKind::Float => "float",
            ValueKind::String => "string",
            ValueKind::List => "list",
            ValueKind::Map => "map",
        };
        f.write_str(name)
    }
}

impl ConfigValue {
    /// An empty map.
    pub fn empty_map() -> Self {
        ConfigValue::Map(ConfigMap::new())
    }

    pub fn kind(&self) -> ValueKind {
        match self {
            ConfigValue::Null => ValueKind::Null,
            ConfigValue::Bool(_) => ValueKind::Bool,
            ConfigValue::Integer(_) => ValueKind::Integer,
            ConfigValue::Float(_) => ValueKind::Float,
            ConfigValue::String(_) => ValueKind::String,
            ConfigValue::List(_) => ValueKind::List,
            ConfigValue::Map(_) => ValueKind::Map,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, ConfigValue::Null)
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[ConfigValue]> {
        match self {
            ConfigValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&ConfigMap> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_map_mut(&mut self) -> Option<&mut ConfigMap> {
        match self {
            ConfigValue::Map(map) => Some(map),
            _ => None,
        }
    }

    /// Look up the value at `path`. List segments are parsed as indices.
    pub fn get_path(&self, path: &ConfigPath) -> Option<&ConfigValue> {
        let mut current = self;
        for segment in path.segments() {
            current = match current {
                ConfigValue::Map(map) => map.get(segment)?,
                ConfigValue::List(items) => items.get(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(current)
    }

    /// Convenience wrapper around [`ConfigValue::get_path`] for literal paths.
    pub fn get(&self, path: &str) -> Option<&ConfigValue> {
        let path = ConfigPath::parse(path).ok()?;
        self.get_path(&path)
    }

    /// Set the value at `path`, creating intermediate maps as needed.
    ///
    /// Any non-map value sitting on the way to `path` is replaced with a map.
    /// Setting the root path replaces the whole tree.
    pub fn set_path(&mut self, path: &ConfigPath, value: ConfigValue) {
        let Some((last, parents)) = path.segments().split_last() else {
            *self = value;
            return;
        };

        let mut current = self;
        for segment in parents {
            current = ensure_map(current)
                .entry(segment.clone())
                .or_insert_with(ConfigValue::empty_map);
        }
        ensure_map(current).insert(last.clone(), value);
    }

    /// Remove and return the value at `path`. Only map entries can be removed.
    pub fn remove_path(&mut self, path: &ConfigPath) -> Option<ConfigValue> {
        let (last, parents) = path.segments().split_last()?;
        let mut current = self;
        for segment in parents {
            current = match current {
                ConfigValue::Map(map) => map.get_mut(segment)?,
                ConfigValue::List(items) => items.get_mut(segment.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        current.as_map_mut()?.remove(last)
    }

    /// Visit every leaf (non-map, non-list value) with its path, depth first.
    ///
    /// Empty maps and lists are not visited.
    pub fn visit_leaves<F>(&self, mut visit: F)
    where
        F: FnMut(&ConfigPath, &ConfigValue),
    {
        let mut stack = vec![(ConfigPath::root(), self)];
        while let Some((path, value)) = stack.pop() {
            match value {
                ConfigValue::Map(map) => {
                    for (key, child) in map.iter().rev() {
                        stack.push((path.child(key.clone()), child));
                    }
                }
                ConfigValue::List(items) => {
                    for (index, child) in items.iter().enumerate().rev() {
                        stack.push((path.index(index), child));
                    }
                }
                leaf => visit(&path, leaf),
            }
        }
    }

    /// Apply `f` to every string leaf in place, passing the leaf's path.
    ///
    /// A leaf is replaced when `f` returns `Some`.
    pub fn map_strings<F>(&mut self, f: &mut F)
    where
        F: FnMut(&ConfigPath, &str) -> Option<String>,
    {
        self.map_strings_at(&ConfigPath::root(), f);
    }

    fn map_strings_at<F>(&mut self, path: &ConfigPath, f: &mut F)
    where
        F: FnMut(&ConfigPath, &str) -> Option<String>,
    {
        match self {
            ConfigValue::String(s) => {
                if let Some(replacement) = f(path, s) {
                    *s = replacement;
                }
            }
            ConfigValue::List(items) => {
                for (index, item) in items.iter_mut().enumerate() {
                    item.map_strings_at(&path.index(index), f);
                }
            }
            ConfigValue::Map(map) => {
                for (key, item) in map.iter_mut() {
                    item.map_strings_at(&path.child(key.clone()), f);
                }
            }
            _ => {}
        }
    }

    /// Render a scalar for human-readable messages. Containers render as JSON.
    pub fn display_scalar(&self) -> String {
        match self {
            ConfigValue::Null => "null".to_string(),
            ConfigValue::Bool(b) => b.to_string(),
            ConfigValue::Integer(i) => i.to_string(),
            ConfigValue::Float(f) => f.to_string(),
            ConfigValue::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_else(|_| format!("{:?}", other)),
        }
    }
}

/// Replace `value` with an empty map unless it already is one.
fn ensure_map(value: &mut ConfigValue) -> &mut ConfigMap {
    if !matches!(value, ConfigValue::Map(_)) {
        *value = ConfigValue::empty_map();
    }
    match value {
        ConfigValue::Map(map) => map,
        _ => unreachable!("value was just replaced with a map"),
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        ConfigValue::String(value.to_string())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        ConfigValue::String(value)
    }
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        ConfigValue::Bool(value)
    }
}

impl From<i64> for ConfigValue {
    fn from(value: i64) -> Self {
        ConfigValue::Integer(value)
    }
}

impl From<f64> for ConfigValue {
    fn from(value: f64) -> Self {
        ConfigValue::Float(value)
    }
}

impl From<ConfigMap> for ConfigValue {
    fn from(value: ConfigMap) -> Self {
        ConfigValue::Map(value)
    }
}

impl From<Vec<ConfigValue>> for ConfigValue {
    fn from(value: Vec<ConfigValue>) -> Self {
        ConfigValue::List(value)
    }
}

impl From<serde_json::Value> for ConfigValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => ConfigValue::Null,
            serde_json::Value::Bool(b) => ConfigValue::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => ConfigValue::Integer(i),
                None => ConfigValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(s) => ConfigValue::String(s),
            serde_json::Value::Array(items) => {
                ConfigValue::List(items.into_iter().map(ConfigValue::from).collect())
            }
            serde_json::Value::Object(map) => ConfigValue::Map(
                map.into_iter()
                    .map(|(k, v)| (k, ConfigValue::from(v)))
                    .collect(),
            ),
        }
    }
}
