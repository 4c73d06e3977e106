// ── Preference store seam ──
//
// Durable key/value preferences: DNS nameserver and range plus one
// `"<id>.disabled"` flag per identity. Writes are batched so a group of
// keys lands atomically.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// A stored preference value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ConfigValue {
    Bool(bool),
    Str(String),
}

impl From<bool> for ConfigValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ConfigValue {
    fn from(value: &str) -> Self {
        Self::Str(value.to_owned())
    }
}

impl From<String> for ConfigValue {
    fn from(value: String) -> Self {
        Self::Str(value)
    }
}

/// One change in an atomic preference write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigEdit {
    Set { key: String, value: ConfigValue },
    Remove { key: String },
}

impl ConfigEdit {
    pub fn set(key: impl Into<String>, value: impl Into<ConfigValue>) -> Self {
        Self::Set {
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn remove(key: impl Into<String>) -> Self {
        Self::Remove { key: key.into() }
    }
}

/// Apply edits to an in-memory map, in order.
pub fn apply_edits(map: &mut BTreeMap<String, ConfigValue>, edits: Vec<ConfigEdit>) {
    for edit in edits {
        match edit {
            ConfigEdit::Set { key, value } => {
                map.insert(key, value);
            }
            ConfigEdit::Remove { key } => {
                map.remove(&key);
            }
        }
    }
}

/// Durable preference storage.
pub trait ConfigStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<ConfigValue>, CoreError>;

    /// Apply every edit or none of them.
    fn apply(&self, edits: Vec<ConfigEdit>) -> Result<(), CoreError>;

    /// String value of `key`; booleans are rendered as `true`/`false`.
    fn get_string(&self, key: &str) -> Result<Option<String>, CoreError> {
        Ok(self.get(key)?.map(|value| match value {
            ConfigValue::Str(s) => s,
            ConfigValue::Bool(b) => b.to_string(),
        }))
    }

    /// Boolean value of `key`; the strings `"true"`/`"false"` also parse.
    fn get_bool(&self, key: &str) -> Result<Option<bool>, CoreError> {
        match self.get(key)? {
            None => Ok(None),
            Some(ConfigValue::Bool(b)) => Ok(Some(b)),
            Some(ConfigValue::Str(s)) => s.parse().map(Some).map_err(|_| CoreError::ConfigStore {
                message: format!("{key} is not a boolean: {s:?}"),
            }),
        }
    }
}

// ── In-memory implementation ─────────────────────────────────────────

#[derive(Default)]
pub struct MemoryConfigStore {
    values: RwLock<BTreeMap<String, ConfigValue>>,
}

impl MemoryConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored preference.
    pub fn entries(&self) -> BTreeMap<String, ConfigValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConfigStore for MemoryConfigStore {
    fn get(&self, key: &str) -> Result<Option<ConfigValue>, CoreError> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn apply(&self, edits: Vec<ConfigEdit>) -> Result<(), CoreError> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);
        apply_edits(&mut values, edits);
        Ok(())
    }
}
