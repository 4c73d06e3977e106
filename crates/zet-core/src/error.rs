// ── Core error types ──
//
// User-facing errors from zet-core. Consumers never see socket or JSON
// framing failures directly: `CoreError::engine` translates transport
// errors into domain variants, tagged with the command that failed.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Engine errors ────────────────────────────────────────────────
    #[error("Engine command {command} failed: {message}")]
    EngineCommand {
        command: String,
        message: String,
        /// Engine-reported error code, when the engine supplies one.
        code: Option<i64>,
    },

    #[error("Engine command {command} timed out after {timeout_secs}s")]
    EngineTimeout { command: String, timeout_secs: u64 },

    #[error("Tunnel engine unavailable: {reason}")]
    EngineUnavailable { reason: String },

    #[error("Tunnel engine is not running")]
    NotRunning,

    #[error("Tunnel engine already started")]
    AlreadyStarted,

    // ── Identity errors ──────────────────────────────────────────────
    /// An event addressed an identity that is not registered. Built for
    /// logging only; never returned from a public operation.
    #[error("Event for unknown identity {identifier}")]
    UnknownEventTarget { identifier: String },

    #[error("Identity already loaded: {id}")]
    DuplicateIdentity { id: String },

    #[error("Identity not found: {id}")]
    IdentityNotFound { id: String },

    // ── Store errors ─────────────────────────────────────────────────
    #[error("Credential store error for {alias}: {message}")]
    CredentialStore { alias: String, message: String },

    #[error("Config store error: {message}")]
    ConfigStore { message: String },

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Invalid identity configuration: {message}")]
    InvalidConfig { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Translate a transport error for engine command `command`.
    pub fn engine(command: &str, err: zet_api::Error) -> Self {
        match err {
            zet_api::Error::Command { message, code } => Self::EngineCommand {
                command: command.to_owned(),
                message,
                code,
            },
            zet_api::Error::Timeout { timeout_secs } => Self::EngineTimeout {
                command: command.to_owned(),
                timeout_secs,
            },
            other => Self::from(other),
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<zet_api::Error> for CoreError {
    fn from(err: zet_api::Error) -> Self {
        match err {
            e @ (zet_api::Error::Connect { .. }
            | zet_api::Error::Closed
            | zet_api::Error::Io(_)
            | zet_api::Error::Framing(_)) => Self::EngineUnavailable {
                reason: e.to_string(),
            },
            zet_api::Error::Timeout { timeout_secs } => Self::EngineTimeout {
                command: "unknown".into(),
                timeout_secs,
            },
            zet_api::Error::Command { message, code } => Self::EngineCommand {
                command: "unknown".into(),
                message,
                code,
            },
            zet_api::Error::Deserialization { message, body: _ } => {
                Self::Internal(format!("Deserialization error: {message}"))
            }
            zet_api::Error::Serialization(e) => {
                Self::Internal(format!("Serialization error: {e}"))
            }
        }
    }
}
