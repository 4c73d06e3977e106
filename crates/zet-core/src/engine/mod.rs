// ── Tunnel engine seam ──
//
// The engine runs out of process and does the actual tunneling. The core
// drives it through this object-safe trait; `IpcEngine` is the production
// implementation and tests supply scripted fakes.

mod ipc;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use serde_json::Value;

use crate::error::CoreError;
use crate::model::{IdentityConfig, Service};

pub use ipc::IpcEngine;

/// Commands the engine executes on behalf of the coordinator.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineCommand {
    LoadIdentity {
        id: String,
        config: IdentityConfig,
        disabled: bool,
    },
    Enroll {
        jwt: String,
        use_keychain: bool,
    },
    OnOff {
        id: String,
        on: bool,
    },
    RefreshIdentity {
        id: String,
    },
    Dump {
        id: String,
    },
    SetUpstreamDns {
        servers: Vec<String>,
    },
    RemoveIdentity {
        id: String,
    },
}

impl EngineCommand {
    /// Command name used in logs and errors.
    pub fn name(&self) -> &'static str {
        match self {
            Self::LoadIdentity { .. } => "LoadIdentity",
            Self::Enroll { .. } => "Enroll",
            Self::OnOff { .. } => "IdentityOnOff",
            Self::RefreshIdentity { .. } => "RefreshIdentity",
            Self::Dump { .. } => "ZitiDump",
            Self::SetUpstreamDns { .. } => "SetUpstreamDNS",
            Self::RemoveIdentity { .. } => "RemoveIdentity",
        }
    }
}

/// Events emitted by the engine, addressed to one identity.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    /// Connection context: display name, controller, status string.
    Context {
        identifier: String,
        name: String,
        controller: String,
        status: String,
    },
    /// Incremental service change; removals apply before additions.
    Service {
        identifier: String,
        added: Vec<Service>,
        removed: Vec<String>,
    },
    /// Controller API address change.
    Api {
        identifier: String,
        controller: Option<String>,
    },
    /// Anything this build does not understand.
    Other { kind: String },
}

impl EngineEvent {
    pub fn identifier(&self) -> Option<&str> {
        match self {
            Self::Context { identifier, .. }
            | Self::Service { identifier, .. }
            | Self::Api { identifier, .. } => Some(identifier),
            Self::Other { .. } => None,
        }
    }
}

/// The external tunneling engine.
pub trait TunnelEngine: Send + Sync {
    /// Configure the tunnel DNS nameserver and address range.
    fn setup_dns<'a>(
        &'a self,
        nameserver: &'a str,
        range: &'a str,
    ) -> BoxFuture<'a, Result<(), CoreError>>;

    /// Start tunneling. Called once, after [`setup_dns`](Self::setup_dns).
    fn start(&self) -> BoxFuture<'_, Result<(), CoreError>>;

    /// The engine event stream. Not restartable: later calls yield an
    /// empty stream.
    fn events(&self) -> BoxStream<'static, EngineEvent>;

    /// Execute one command, returning the engine's reply payload
    /// (`Value::Null` when the engine sends none).
    fn execute(&self, command: EngineCommand) -> BoxFuture<'_, Result<Value, CoreError>>;

    /// Instantaneous upload throughput, bytes per second.
    fn up_rate(&self) -> f64;

    /// Instantaneous download throughput, bytes per second.
    fn down_rate(&self) -> f64;
}
