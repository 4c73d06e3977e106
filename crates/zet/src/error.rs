//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with help text.

use miette::Diagnostic;
use thiserror::Error;

use zet_config::ConfigError;
use zet_core::CoreError;

pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const NOT_FOUND: i32 = 4;
    pub const ENGINE: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Engine ───────────────────────────────────────────────────────
    #[error("Tunnel engine unavailable: {reason}")]
    #[diagnostic(
        code(zet::engine_unavailable),
        help(
            "Check that the tunnel engine is running and that its sockets are\n\
             reachable. Override the paths with --command-socket / --event-socket."
        )
    )]
    EngineUnavailable { reason: String },

    #[error("Engine rejected {command}: {message}")]
    #[diagnostic(code(zet::engine_command))]
    EngineCommand { command: String, message: String },

    #[error("Engine did not answer {command} within {seconds}s")]
    #[diagnostic(
        code(zet::timeout),
        help("Increase the timeout with --timeout or engine.timeout_secs.")
    )]
    Timeout { command: String, seconds: u64 },

    // ── Identities ───────────────────────────────────────────────────
    #[error("Identity '{id}' not found")]
    #[diagnostic(
        code(zet::not_found),
        help("Run: zet identities list to see loaded identities")
    )]
    NotFound { id: String },

    #[error("Identity '{id}' is already loaded")]
    #[diagnostic(code(zet::duplicate))]
    Duplicate { id: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(zet::validation))]
    Validation { field: String, reason: String },

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(zet::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Configuration / storage ──────────────────────────────────────
    #[error(transparent)]
    #[diagnostic(
        code(zet::config),
        help("Inspect the settings with: zet config show")
    )]
    Config(#[from] ConfigError),

    #[error("Storage error: {message}")]
    #[diagnostic(code(zet::storage))]
    Storage { message: String },

    #[error("Internal error: {message}")]
    #[diagnostic(code(zet::internal))]
    Internal { message: String },

    // ── IO ───────────────────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::EngineUnavailable { .. } | Self::EngineCommand { .. } => exit_code::ENGINE,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::EngineUnavailable { reason } => Self::EngineUnavailable { reason },
            CoreError::NotRunning | CoreError::AlreadyStarted => Self::EngineUnavailable {
                reason: err.to_string(),
            },
            CoreError::EngineTimeout {
                command,
                timeout_secs,
            } => Self::Timeout {
                command,
                seconds: timeout_secs,
            },
            CoreError::EngineCommand {
                command, message, ..
            } => Self::EngineCommand { command, message },
            CoreError::IdentityNotFound { id }
            | CoreError::UnknownEventTarget { identifier: id } => Self::NotFound { id },
            CoreError::DuplicateIdentity { id } => Self::Duplicate { id },
            CoreError::InvalidConfig { message } => Self::Validation {
                field: "identity".into(),
                reason: message,
            },
            CoreError::CredentialStore { alias, message } => Self::Storage {
                message: format!("{alias}: {message}"),
            },
            CoreError::ConfigStore { message } => Self::Storage { message },
            CoreError::Internal(message) => Self::Internal { message },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_timeouts_get_their_own_exit_code() {
        let err = CliError::from(CoreError::EngineTimeout {
            command: "Enroll".into(),
            timeout_secs: 30,
        });
        assert_eq!(err.exit_code(), exit_code::TIMEOUT);
    }

    #[test]
    fn missing_identity_is_not_found() {
        let err = CliError::from(CoreError::IdentityNotFound { id: "x".into() });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(
            CliError::from(CoreError::NotRunning).exit_code(),
            exit_code::ENGINE
        );
    }
}
