// ── Command API ──
//
// Every user-initiated identity operation flows through the `Command`
// enum. The controller's single command processor executes them in
// arrival order against the engine.

use std::sync::Arc;

use crate::error::CoreError;
use crate::model::{Identity, IdentityConfig};

/// A command envelope sent through the command channel.
/// Contains the command and a oneshot response channel.
pub(crate) struct CommandEnvelope {
    pub command: Command,
    pub response_tx: tokio::sync::oneshot::Sender<Result<CommandResult, CoreError>>,
}

/// All user-initiated operations against the tunnel engine.
#[derive(Debug, Clone)]
pub enum Command {
    // ── Identity lifecycle ───────────────────────────────────────────
    LoadIdentity { id: String, config: IdentityConfig },
    Enroll { jwt: String },
    SetEnabled { id: String, enabled: bool },
    DeleteIdentity { id: String },
    RefreshIdentity { id: String },

    // ── Diagnostics ──────────────────────────────────────────────────
    Dump { id: String },

    // ── DNS ──────────────────────────────────────────────────────────
    SetUpstreamDns { servers: Vec<String> },
}

impl Command {
    /// Operation name for logs; never includes arguments.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadIdentity { .. } => "load_identity",
            Self::Enroll { .. } => "enroll",
            Self::SetEnabled { .. } => "set_enabled",
            Self::DeleteIdentity { .. } => "delete_identity",
            Self::RefreshIdentity { .. } => "refresh_identity",
            Self::Dump { .. } => "dump",
            Self::SetUpstreamDns { .. } => "set_upstream_dns",
        }
    }
}

/// Result of a command execution.
#[derive(Debug)]
pub enum CommandResult {
    Ok,
    Identity(Arc<Identity>),
    Enrolled(IdentityConfig),
    Dump(String),
}
