//! Settings and durable stores for zet.
//!
//! TOML settings loaded through figment (defaults, `config.toml`, `ZET_`
//! environment), plus the file-backed [`TomlConfigStore`] and
//! [`FileCredentialStore`] that the controller persists into.

mod credentials;
mod prefs;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use zet_api::IpcConfig;

pub use credentials::{FileCredentialStore, KEYRING_SERVICE, KeyringVault, SecretVault};
pub use prefs::TomlConfigStore;

const PREFS_FILE: &str = "prefs.toml";
const CREDENTIALS_FILE: &str = "credentials.json";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("failed to parse {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Top-level settings shared by every zet front end.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct Settings {
    #[serde(default)]
    pub engine: EngineSettings,

    #[serde(default)]
    pub storage: StorageSettings,

    #[serde(default)]
    pub log: LogSettings,
}

/// Where the tunnel engine listens.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct EngineSettings {
    pub command_socket: PathBuf,
    pub event_socket: PathBuf,

    /// Per-command timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        let ipc = IpcConfig::default();
        Self {
            command_socket: ipc.command_socket,
            event_socket: ipc.event_socket,
            timeout_secs: default_timeout(),
        }
    }
}

fn default_timeout() -> u64 {
    30
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct StorageSettings {
    /// Directory holding `prefs.toml` and `credentials.json`.
    pub state_dir: PathBuf,

    /// Keyring service private keys are stored under.
    #[serde(default = "default_keyring_service")]
    pub keyring_service: String,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            state_dir: data_dir(),
            keyring_service: default_keyring_service(),
        }
    }
}

fn default_keyring_service() -> String {
    KEYRING_SERVICE.to_owned()
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct LogSettings {
    /// Also write JSON logs to a daily rolling file.
    #[serde(default)]
    pub file: bool,

    pub dir: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            file: false,
            dir: data_dir().join("logs"),
        }
    }
}

impl Settings {
    /// Engine IPC endpoints and timeout.
    pub fn ipc_config(&self) -> IpcConfig {
        IpcConfig {
            command_socket: self.engine.command_socket.clone(),
            event_socket: self.engine.event_socket.clone(),
            timeout: Duration::from_secs(self.engine.timeout_secs),
            ..IpcConfig::default()
        }
    }

    pub fn prefs_path(&self) -> PathBuf {
        self.storage.state_dir.join(PREFS_FILE)
    }

    pub fn credentials_path(&self) -> PathBuf {
        self.storage.state_dir.join(CREDENTIALS_FILE)
    }

    /// Open the preference and credential stores under `state_dir`, with
    /// private keys in the platform keyring.
    pub fn open_stores(&self) -> Result<(TomlConfigStore, FileCredentialStore), ConfigError> {
        Ok((
            TomlConfigStore::open(self.prefs_path())?,
            FileCredentialStore::open(
                self.credentials_path(),
                Arc::new(KeyringVault::new(&self.storage.keyring_service)),
            )?,
        ))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.engine.timeout_secs == 0 {
            return Err(ConfigError::Validation {
                field: "engine.timeout_secs".into(),
                reason: "must be at least 1".into(),
            });
        }
        Ok(())
    }
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("io", "zet", "zet")
}

fn home_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".zet");
    p
}

/// Resolve the settings file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback().join("config.toml"),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn data_dir() -> PathBuf {
    project_dirs().map_or_else(home_fallback, |dirs| dirs.data_dir().to_path_buf())
}

// ── Loading / saving ────────────────────────────────────────────────

/// The provider chain: defaults, then the TOML file at `path`, then
/// `ZET_`-prefixed environment variables (`ZET_ENGINE__TIMEOUT_SECS=5`).
pub fn figment(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ZET_").split("__"))
}

/// Load settings from the canonical path.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&config_path())
}

/// Load settings from `path`. A missing file yields defaults.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let settings: Settings = figment(path).extract()?;
    settings.validate()?;
    Ok(settings)
}

/// Serialize settings to TOML at `path`, creating parent directories.
pub fn save_settings(settings: &Settings, path: &Path) -> Result<(), ConfigError> {
    let toml_str = toml::to_string_pretty(settings)?;
    write_atomic(path, toml_str.as_bytes())?;
    Ok(())
}

/// Replace `path` with `contents` via a temp file in the same directory.
///
/// The temp file is created owner-readable only and renamed over the
/// target, so readers see the old or the new file and nothing between.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(contents)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|e| e.error)?;
    Ok(())
}
