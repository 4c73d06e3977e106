//! CLI configuration: thin wrapper around `zet_config`.
//!
//! Resolves the settings file from `--config`, applies the socket and
//! timeout flag overrides, and wires the durable stores into a
//! `Controller`.

use std::path::PathBuf;
use std::sync::Arc;

use zet_core::{Controller, ControllerConfig, IpcEngine};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use zet_config::{Settings, config_path, load_settings_from, save_settings};

/// The settings file in effect: `--config` / `ZET_CONFIG`, else the
/// platform default.
pub fn settings_path(global: &GlobalOpts) -> PathBuf {
    global.config.clone().unwrap_or_else(config_path)
}

/// Load settings and apply CLI flag overrides.
pub fn resolve_settings(global: &GlobalOpts) -> Result<Settings, CliError> {
    let mut settings = load_settings_from(&settings_path(global))?;

    if let Some(ref path) = global.command_socket {
        settings.engine.command_socket.clone_from(path);
    }
    if let Some(ref path) = global.event_socket {
        settings.engine.event_socket.clone_from(path);
    }
    if let Some(timeout) = global.timeout {
        if timeout == 0 {
            return Err(CliError::Validation {
                field: "timeout".into(),
                reason: "must be at least 1 second".into(),
            });
        }
        settings.engine.timeout_secs = timeout;
    }
    Ok(settings)
}

/// Build a controller over the IPC engine and the file-backed stores.
/// The controller is not started.
pub fn build_controller(settings: &Settings) -> Result<Controller, CliError> {
    let (prefs, credentials) = settings.open_stores()?;
    let engine = IpcEngine::new(settings.ipc_config());

    Ok(Controller::new(
        ControllerConfig::default(),
        Arc::new(engine),
        Arc::new(credentials),
        Arc::new(prefs),
    ))
}
