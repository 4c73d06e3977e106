// ── TOML preference store ──
//
// Flat key/value table in `prefs.toml`. Identity ids contain `:` and `/`,
// so keys are written as quoted TOML keys.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{PoisonError, RwLock};

use tracing::debug;
use zet_core::prefs::apply_edits;
use zet_core::{ConfigEdit, ConfigStore, ConfigValue, CoreError};

use crate::{ConfigError, write_atomic};

/// [`ConfigStore`] persisted as a TOML file.
///
/// The whole table is cached in memory; every `apply` rewrites the file
/// atomically before the cache is updated.
pub struct TomlConfigStore {
    path: PathBuf,
    values: RwLock<BTreeMap<String, ConfigValue>>,
}

impl TomlConfigStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let values = match std::fs::read_to_string(&path) {
            Ok(text) => toml::from_str(&text).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(Self {
            path,
            values: RwLock::new(values),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> BTreeMap<String, ConfigValue> {
        self.values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl ConfigStore for TomlConfigStore {
    fn get(&self, key: &str) -> Result<Option<ConfigValue>, CoreError> {
        let values = self.values.read().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(key).cloned())
    }

    fn apply(&self, edits: Vec<ConfigEdit>) -> Result<(), CoreError> {
        let mut values = self.values.write().unwrap_or_else(PoisonError::into_inner);

        let mut next = values.clone();
        apply_edits(&mut next, edits);

        let text = toml::to_string(&next).map_err(|e| CoreError::ConfigStore {
            message: e.to_string(),
        })?;
        write_atomic(&self.path, text.as_bytes()).map_err(|e| CoreError::ConfigStore {
            message: format!("{}: {e}", self.path.display()),
        })?;

        debug!(path = %self.path.display(), keys = next.len(), "preferences written");
        *values = next;
        Ok(())
    }
}
