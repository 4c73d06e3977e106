//! Control core for the zet zero-trust tunnel client.
//!
//! This crate owns identity state and coordinates an out-of-process tunnel
//! engine:
//!
//! - **[`Controller`]**: Central facade. [`start()`](Controller::start)
//!   configures DNS, starts the engine, spawns the event loop and stats
//!   poller, and restores stored identities. User commands are routed
//!   through an `mpsc` channel to a single command processor.
//!
//! - **[`IdentityRegistry`]**: `DashMap` index of loaded identities with a
//!   `watch`-published ordered snapshot.
//!
//! - **[`IdentityStream`]**: Subscription handle vended by the registry.
//!
//! - **Seams**: [`TunnelEngine`], [`CredentialStore`], and [`ConfigStore`]
//!   are injected, with in-memory implementations here and durable ones in
//!   `zet-config`.

pub mod command;
pub mod config;
pub mod controller;
pub mod convert;
pub mod credentials;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod model;
pub mod prefs;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use command::{Command, CommandResult};
pub use config::{ControllerConfig, DnsSettings, NAMESERVER_KEY, RANGE_KEY, disabled_key};
pub use controller::{Controller, EngineState, TunnelRates};
pub use credentials::{
    CredentialEntry, CredentialStore, MemoryCredentialStore, encode_certificate,
    split_pem_bundle,
};
pub use engine::{EngineCommand, EngineEvent, IpcEngine, TunnelEngine};
pub use error::CoreError;
pub use prefs::{ConfigEdit, ConfigStore, ConfigValue, MemoryConfigStore};
pub use store::IdentityRegistry;
pub use stream::{IdentityFilter, IdentityStream};

pub use model::{
    Identity, IdentityConfig, IdentityMaterial, IdentityStatus, Service, ServiceDns,
    derive_identity_key,
};
