// ── Credential store ──
//
// `credentials.json` indexes every alias with its certificate chain and
// whether a private key exists for it. The keys themselves never touch the
// file: they live in a `SecretVault`, the OS keyring by default, under the
// alias as the user name.

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use zet_core::{CoreError, CredentialEntry, CredentialStore};

use crate::{ConfigError, write_atomic};

/// Keyring service name private keys are filed under.
pub const KEYRING_SERVICE: &str = "zet";

// ── Secret vaults ───────────────────────────────────────────────────

/// Storage for private keys, addressed by credential alias.
pub trait SecretVault: Send + Sync {
    fn load(&self, alias: &str) -> Result<Option<SecretString>, CoreError>;

    fn store(&self, alias: &str, key: &SecretString) -> Result<(), CoreError>;

    /// Remove a key. Removing an absent key is not an error.
    fn remove(&self, alias: &str) -> Result<(), CoreError>;
}

/// [`SecretVault`] backed by the platform keyring.
pub struct KeyringVault {
    service: String,
}

impl KeyringVault {
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, alias: &str) -> Result<keyring::Entry, CoreError> {
        keyring::Entry::new(&self.service, alias).map_err(|e| keyring_error(alias, &e))
    }
}

impl Default for KeyringVault {
    fn default() -> Self {
        Self::new(KEYRING_SERVICE)
    }
}

impl SecretVault for KeyringVault {
    fn load(&self, alias: &str) -> Result<Option<SecretString>, CoreError> {
        match self.entry(alias)?.get_password() {
            Ok(key) => Ok(Some(SecretString::from(key))),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(e) => Err(keyring_error(alias, &e)),
        }
    }

    fn store(&self, alias: &str, key: &SecretString) -> Result<(), CoreError> {
        self.entry(alias)?
            .set_password(key.expose_secret())
            .map_err(|e| keyring_error(alias, &e))
    }

    fn remove(&self, alias: &str) -> Result<(), CoreError> {
        match self.entry(alias)?.delete_credential() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(e) => Err(keyring_error(alias, &e)),
        }
    }
}

fn keyring_error(alias: &str, err: &keyring::Error) -> CoreError {
    CoreError::CredentialStore {
        alias: alias.to_owned(),
        message: format!("keyring: {err}"),
    }
}

// ── Index file ──────────────────────────────────────────────────────

#[derive(Debug, Default, Serialize, Deserialize)]
struct CredentialFile {
    #[serde(default)]
    entries: BTreeMap<String, IndexEntry>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IndexEntry {
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    has_private_key: bool,
    #[serde(default)]
    certificate_chain: Vec<String>,
}

/// [`CredentialStore`] persisted as a JSON index plus a [`SecretVault`].
pub struct FileCredentialStore {
    path: PathBuf,
    vault: Arc<dyn SecretVault>,
    index: RwLock<BTreeMap<String, IndexEntry>>,
}

impl FileCredentialStore {
    /// Open the store at `path`. A missing file is an empty store.
    pub fn open(path: impl Into<PathBuf>, vault: Arc<dyn SecretVault>) -> Result<Self, ConfigError> {
        let path = path.into();
        let file: CredentialFile = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| ConfigError::Parse {
                path: path.clone(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => CredentialFile::default(),
            Err(e) => return Err(e.into()),
        };

        Ok(Self {
            path,
            vault,
            index: RwLock::new(file.entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write `next` to disk, then make it the live index.
    fn commit(
        &self,
        current: &mut BTreeMap<String, IndexEntry>,
        next: BTreeMap<String, IndexEntry>,
        alias: &str,
    ) -> Result<(), CoreError> {
        let store_error = |message: String| CoreError::CredentialStore {
            alias: alias.to_owned(),
            message,
        };

        let file = CredentialFile { entries: next };
        let bytes = serde_json::to_vec_pretty(&file).map_err(|e| store_error(e.to_string()))?;
        write_atomic(&self.path, &bytes)
            .map_err(|e| store_error(format!("{}: {e}", self.path.display())))?;

        debug!(path = %self.path.display(), entries = file.entries.len(), "credential index written");
        *current = file.entries;
        Ok(())
    }
}

impl CredentialStore for FileCredentialStore {
    fn list_aliases(&self) -> Result<BTreeSet<String>, CoreError> {
        let index = self.index.read().unwrap_or_else(PoisonError::into_inner);
        Ok(index.keys().cloned().collect())
    }

    fn entry(&self, alias: &str) -> Result<Option<CredentialEntry>, CoreError> {
        let Some(stored) = self
            .index
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(alias)
            .cloned()
        else {
            return Ok(None);
        };

        let private_key = if stored.has_private_key {
            let key = self.vault.load(alias)?;
            if key.is_none() {
                warn!(alias, "private key missing from keyring");
            }
            key
        } else {
            None
        };

        Ok(Some(CredentialEntry {
            alias: alias.to_owned(),
            private_key,
            certificate_chain: stored.certificate_chain,
        }))
    }

    fn set_entry(&self, entry: CredentialEntry) -> Result<(), CoreError> {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let had_key = index.get(&entry.alias).is_some_and(|e| e.has_private_key);

        if let Some(key) = &entry.private_key {
            self.vault.store(&entry.alias, key)?;
        }

        let mut next = index.clone();
        next.insert(
            entry.alias.clone(),
            IndexEntry {
                has_private_key: entry.private_key.is_some(),
                certificate_chain: entry.certificate_chain,
            },
        );
        self.commit(&mut index, next, &entry.alias)?;

        if had_key && entry.private_key.is_none() {
            self.vault.remove(&entry.alias)?;
        }
        Ok(())
    }

    fn delete_entry(&self, alias: &str) -> Result<(), CoreError> {
        let mut index = self.index.write().unwrap_or_else(PoisonError::into_inner);
        let Some(stored) = index.get(alias) else {
            return Ok(());
        };
        let had_key = stored.has_private_key;

        let mut next = index.clone();
        next.remove(alias);
        self.commit(&mut index, next, alias)?;

        if had_key {
            self.vault.remove(alias)?;
        }
        Ok(())
    }
}
