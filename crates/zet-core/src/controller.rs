// ── Controller abstraction ──
//
// Full lifecycle management for one tunnel engine. Handles the staged
// startup, background event dispatch and stats polling, command routing,
// and reactive identity streaming through the IdentityRegistry.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use serde::Serialize;
use serde_json::Value;
use tokio::sync::{Mutex, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::command::{Command, CommandEnvelope, CommandResult};
use crate::config::{ControllerConfig, DnsSettings, NAMESERVER_KEY, RANGE_KEY, disabled_key};
use crate::credentials::CredentialStore;
use crate::dispatch::event_loop;
use crate::engine::{EngineCommand, TunnelEngine};
use crate::error::CoreError;
use crate::model::{
    Identity, IdentityConfig, IdentityMaterial, IdentityStatus, KEYCHAIN_PREFIX, Service,
    ca_alias_prefix, controller_url_for, derive_identity_key, is_identity_alias,
};
use crate::prefs::{ConfigEdit, ConfigStore};
use crate::store::IdentityRegistry;
use crate::stream::IdentityStream;

// ── EngineState ──────────────────────────────────────────────────

/// Lifecycle state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum EngineState {
    Stopped,
    Starting,
    Running,
    Failed,
}

// ── TunnelRates ──────────────────────────────────────────────────

/// Instantaneous tunnel throughput in bytes per second.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TunnelRates {
    pub up: f64,
    pub down: f64,
}

// ── Controller ───────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<ControllerInner>`. Owns the identity
/// registry and coordinates the engine, credential store, and preference
/// store around it.
#[derive(Clone)]
pub struct Controller {
    inner: Arc<ControllerInner>,
}

struct ControllerInner {
    config: ControllerConfig,
    engine: Arc<dyn TunnelEngine>,
    credentials: Arc<dyn CredentialStore>,
    prefs: Arc<dyn ConfigStore>,
    registry: Arc<IdentityRegistry>,
    state: watch::Sender<EngineState>,
    rates: watch::Sender<TunnelRates>,
    command_tx: mpsc::Sender<CommandEnvelope>,
    command_rx: Mutex<Option<mpsc::Receiver<CommandEnvelope>>>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

impl Controller {
    /// Create a controller around its collaborators. Does NOT start the
    /// engine -- call [`start()`](Self::start).
    pub fn new(
        config: ControllerConfig,
        engine: Arc<dyn TunnelEngine>,
        credentials: Arc<dyn CredentialStore>,
        prefs: Arc<dyn ConfigStore>,
    ) -> Self {
        let (state, _) = watch::channel(EngineState::Stopped);
        let (rates, _) = watch::channel(TunnelRates::default());
        let (command_tx, command_rx) = mpsc::channel(config.command_channel_size.max(1));

        Self {
            inner: Arc::new(ControllerInner {
                config,
                engine,
                credentials,
                prefs,
                registry: Arc::new(IdentityRegistry::new()),
                state,
                rates,
                command_tx,
                command_rx: Mutex::new(Some(command_rx)),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    // ── Lifecycle ────────────────────────────────────────────────

    /// Start the engine and restore stored identities.
    ///
    /// Stages run in order: read DNS settings, configure and start the
    /// engine, spawn the event loop and stats poller, load every identity
    /// found in the credential store. User commands are accepted once the
    /// state reaches [`Running`](EngineState::Running).
    pub async fn start(&self) -> Result<(), CoreError> {
        let Some(command_rx) = self.inner.command_rx.lock().await.take() else {
            return Err(CoreError::AlreadyStarted);
        };

        self.inner.state.send_replace(EngineState::Starting);

        let dns = match self.dns_settings() {
            Ok(dns) => dns,
            Err(e) => return Err(self.fail_start(e)),
        };
        debug!(nameserver = %dns.nameserver, range = %dns.range, "configuring engine DNS");

        let engine = &self.inner.engine;
        if let Err(e) = engine.setup_dns(&dns.nameserver, &dns.range).await {
            return Err(self.fail_start(e));
        }
        if let Err(e) = engine.start().await {
            return Err(self.fail_start(e));
        }

        {
            let mut handles = self.inner.task_handles.lock().await;
            let cancel = self.inner.cancel.clone();

            handles.push(tokio::spawn(event_loop(
                engine.events(),
                Arc::clone(&self.inner.registry),
                cancel.clone(),
            )));
            handles.push(tokio::spawn(stats_poll_task(
                self.clone(),
                self.inner.config.stats_interval,
                cancel,
            )));
            handles.push(tokio::spawn(command_processor_task(
                self.clone(),
                command_rx,
            )));
        }

        self.restore_identities().await;

        self.inner.state.send_replace(EngineState::Running);
        info!(identities = self.inner.registry.len(), "tunnel engine running");
        Ok(())
    }

    /// Stop background tasks and return to [`Stopped`](EngineState::Stopped).
    ///
    /// Commands still queued are answered with [`CoreError::NotRunning`].
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let handles: Vec<JoinHandle<()>> = self.inner.task_handles.lock().await.drain(..).collect();
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.state.send_replace(EngineState::Stopped);
        debug!("controller stopped");
    }

    fn fail_start(&self, err: CoreError) -> CoreError {
        error!(error = %err, "tunnel engine failed to start");
        self.inner.state.send_replace(EngineState::Failed);
        err
    }

    // ── Command execution ────────────────────────────────────────

    /// Execute a command.
    ///
    /// Sends the command through the internal channel to the command
    /// processor task and awaits the result.
    pub async fn execute(&self, cmd: Command) -> Result<CommandResult, CoreError> {
        if *self.inner.state.borrow() != EngineState::Running {
            return Err(CoreError::NotRunning);
        }

        let (tx, rx) = oneshot::channel();

        self.inner
            .command_tx
            .send(CommandEnvelope {
                command: cmd,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::NotRunning)?;

        rx.await.map_err(|_| CoreError::NotRunning)?
    }

    // ── Typed convenience wrappers ───────────────────────────────

    /// Load an identity into the engine and register it.
    pub async fn load_config(
        &self,
        id: impl Into<String>,
        config: IdentityConfig,
    ) -> Result<Arc<Identity>, CoreError> {
        let result = self
            .execute(Command::LoadIdentity {
                id: id.into(),
                config,
            })
            .await?;
        match result {
            CommandResult::Identity(identity) => Ok(identity),
            other => Err(unexpected(&other)),
        }
    }

    /// Enroll with a one-time token and load the resulting identity.
    pub async fn enroll(&self, jwt: impl Into<String>) -> Result<IdentityConfig, CoreError> {
        match self.execute(Command::Enroll { jwt: jwt.into() }).await? {
            CommandResult::Enrolled(config) => Ok(config),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn set_enabled(
        &self,
        id: impl Into<String>,
        enabled: bool,
    ) -> Result<Arc<Identity>, CoreError> {
        let result = self
            .execute(Command::SetEnabled {
                id: id.into(),
                enabled,
            })
            .await?;
        match result {
            CommandResult::Identity(identity) => Ok(identity),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn delete(&self, id: impl Into<String>) -> Result<(), CoreError> {
        self.execute(Command::DeleteIdentity { id: id.into() })
            .await
            .map(drop)
    }

    pub async fn refresh(&self, id: impl Into<String>) -> Result<(), CoreError> {
        self.execute(Command::RefreshIdentity { id: id.into() })
            .await
            .map(drop)
    }

    /// Engine diagnostic dump for one identity.
    pub async fn dump(&self, id: impl Into<String>) -> Result<String, CoreError> {
        match self.execute(Command::Dump { id: id.into() }).await? {
            CommandResult::Dump(text) => Ok(text),
            other => Err(unexpected(&other)),
        }
    }

    pub async fn set_upstream_dns(&self, servers: Vec<String>) -> Result<(), CoreError> {
        self.execute(Command::SetUpstreamDns { servers })
            .await
            .map(drop)
    }

    // ── DNS settings ─────────────────────────────────────────────

    /// Persisted DNS settings, with defaults for absent keys.
    pub fn dns_settings(&self) -> Result<DnsSettings, CoreError> {
        let prefs = &self.inner.prefs;
        let defaults = DnsSettings::default();
        Ok(DnsSettings {
            nameserver: prefs
                .get_string(NAMESERVER_KEY)?
                .unwrap_or(defaults.nameserver),
            range: prefs.get_string(RANGE_KEY)?.unwrap_or(defaults.range),
        })
    }

    /// Persist both DNS keys in one write. Takes effect at the next start.
    pub fn set_dns_settings(&self, dns: &DnsSettings) -> Result<(), CoreError> {
        self.inner.prefs.apply(vec![
            ConfigEdit::set(NAMESERVER_KEY, dns.nameserver.as_str()),
            ConfigEdit::set(RANGE_KEY, dns.range.as_str()),
        ])
    }

    // ── State observation ────────────────────────────────────────

    /// Subscribe to lifecycle state changes.
    pub fn state(&self) -> watch::Receiver<EngineState> {
        self.inner.state.subscribe()
    }

    /// Subscribe to throughput samples from the stats poller.
    pub fn rates(&self) -> watch::Receiver<TunnelRates> {
        self.inner.rates.subscribe()
    }

    pub fn identities(&self) -> IdentityStream {
        self.inner.registry.subscribe()
    }

    pub fn identities_snapshot(&self) -> Arc<Vec<Arc<Identity>>> {
        self.inner.registry.snapshot()
    }

    pub fn identity(&self, id: &str) -> Option<Arc<Identity>> {
        self.inner.registry.lookup(id)
    }

    /// Services of one identity, ordered by service id.
    pub fn services(&self, id: &str) -> Option<Vec<Service>> {
        self.inner
            .registry
            .lookup(id)
            .map(|identity| identity.services.values().cloned().collect())
    }

    // ── Startup restore ──────────────────────────────────────────

    /// Load every identity found in the credential store, concurrently.
    /// Individual failures are logged and skipped.
    async fn restore_identities(&self) {
        let stored = match self.stored_identities() {
            Ok(stored) => stored,
            Err(e) => {
                error!(error = %e, "cannot enumerate stored identities");
                return;
            }
        };
        debug!(count = stored.len(), "restoring stored identities");

        let loads = stored
            .into_iter()
            .map(|(id, config)| self.load_identity(id, config));
        for result in join_all(loads).await {
            if let Err(e) = result {
                debug_assert!(
                    !matches!(e, CoreError::DuplicateIdentity { .. }),
                    "stored identity restored twice: {e}"
                );
                warn!(error = %e, "stored identity not loaded");
            }
        }
    }

    fn stored_identities(&self) -> Result<Vec<(String, IdentityConfig)>, CoreError> {
        let aliases = self.inner.credentials.list_aliases()?;

        let mut stored = Vec::new();
        for alias in aliases.iter().filter(|alias| is_identity_alias(alias)) {
            match self.stored_identity(&aliases, alias) {
                Ok(config) => stored.push((alias.clone(), config)),
                Err(e) => warn!(identity = %alias, error = %e, "skipping stored identity"),
            }
        }
        Ok(stored)
    }

    /// Rebuild an identity's configuration from its credential entries.
    fn stored_identity(
        &self,
        aliases: &BTreeSet<String>,
        alias: &str,
    ) -> Result<IdentityConfig, CoreError> {
        let credentials = &self.inner.credentials;
        let cert = credentials
            .certificate(alias)?
            .ok_or_else(|| CoreError::InvalidConfig {
                message: format!("no certificate stored for {alias}"),
            })?;

        let prefix = ca_alias_prefix(&derive_identity_key(alias));
        let mut ca = String::new();
        for ca_alias in aliases.iter().filter(|a| a.starts_with(&prefix)) {
            for pem in credentials.certificate_chain(ca_alias)? {
                ca.push_str(&pem);
            }
        }

        Ok(IdentityConfig {
            controller_url: controller_url_for(alias).unwrap_or_default(),
            id: IdentityMaterial {
                key: format!("{KEYCHAIN_PREFIX}{alias}"),
                cert,
                ca: (!ca.is_empty()).then_some(ca),
            },
        })
    }

    // ── Command implementations ──────────────────────────────────

    async fn load_identity(
        &self,
        id: String,
        config: IdentityConfig,
    ) -> Result<Arc<Identity>, CoreError> {
        let registry = &self.inner.registry;
        if registry.lookup(&id).is_some() {
            let err = CoreError::DuplicateIdentity { id };
            error!(error = %err, "refusing to load identity twice");
            return Err(err);
        }

        let disabled = self
            .inner
            .prefs
            .get_bool(&disabled_key(&id))?
            .unwrap_or(false);

        self.inner
            .engine
            .execute(EngineCommand::LoadIdentity {
                id: id.clone(),
                config,
                disabled,
            })
            .await?;

        let identity = registry.register(&id, !disabled).inspect_err(|e| {
            error!(error = %e, "identity registered concurrently");
        })?;
        info!(identity = %id, enabled = !disabled, "identity loaded");
        Ok(identity)
    }

    async fn enroll_identity(&self, jwt: String) -> Result<IdentityConfig, CoreError> {
        let reply = self
            .inner
            .engine
            .execute(EngineCommand::Enroll {
                jwt,
                use_keychain: true,
            })
            .await?;

        let config: IdentityConfig =
            serde_json::from_value(reply).map_err(|e| CoreError::InvalidConfig {
                message: format!("enrollment reply: {e}"),
            })?;
        let alias = config.key_alias().to_owned();

        self.inner
            .credentials
            .update_key_entry(&alias, &config.id.cert, config.id.ca.as_deref())?;
        self.load_identity(alias.clone(), config.clone()).await?;

        info!(identity = %alias, "identity enrolled");
        Ok(config)
    }

    /// The disabled flag is persisted before the engine is asked; on engine
    /// failure the flag and the in-memory state disagree until the next
    /// toggle or restart.
    async fn toggle_identity(&self, id: &str, on: bool) -> Result<Arc<Identity>, CoreError> {
        let registry = &self.inner.registry;
        if registry.lookup(id).is_none() {
            return Err(CoreError::IdentityNotFound { id: id.to_owned() });
        }

        self.inner
            .prefs
            .apply(vec![ConfigEdit::set(disabled_key(id), !on)])?;

        self.inner
            .engine
            .execute(EngineCommand::OnOff {
                id: id.to_owned(),
                on,
            })
            .await?;

        registry
            .update(id, |identity| {
                identity.enabled = on;
                identity.status = if on {
                    IdentityStatus::Enabled
                } else {
                    IdentityStatus::Disabled
                };
            })
            .ok_or_else(|| CoreError::IdentityNotFound { id: id.to_owned() })
    }

    async fn delete_identity(&self, id: &str) -> Result<(), CoreError> {
        if self.inner.registry.lookup(id).is_none() {
            return Err(CoreError::IdentityNotFound { id: id.to_owned() });
        }

        if let Err(e) = self.toggle_identity(id, false).await {
            warn!(identity = %id, error = %e, "disable before delete failed");
        }
        let removal = EngineCommand::RemoveIdentity { id: id.to_owned() };
        if let Err(e) = self.inner.engine.execute(removal).await {
            warn!(identity = %id, error = %e, "engine identity removal failed");
        }

        self.inner.registry.remove(id);
        self.delete_credentials(id);

        info!(identity = %id, "identity deleted");
        Ok(())
    }

    /// Remove the identity's key entry and every CA entry. Failures are
    /// logged and swallowed.
    fn delete_credentials(&self, id: &str) {
        let credentials = &self.inner.credentials;
        if let Err(e) = credentials.delete_entry(id) {
            warn!(identity = %id, error = %e, "cannot delete identity key entry");
        }

        let prefix = ca_alias_prefix(&derive_identity_key(id));
        let aliases = match credentials.list_aliases() {
            Ok(aliases) => aliases,
            Err(e) => {
                warn!(identity = %id, error = %e, "cannot enumerate CA entries");
                return;
            }
        };
        for alias in aliases.iter().filter(|a| a.starts_with(&prefix)) {
            if let Err(e) = credentials.delete_entry(alias) {
                warn!(alias = %alias, error = %e, "cannot delete CA entry");
            }
        }
    }

    async fn refresh_identity(&self, id: String) -> Result<(), CoreError> {
        if self.inner.registry.lookup(&id).is_none() {
            return Err(CoreError::IdentityNotFound { id });
        }
        self.inner
            .engine
            .execute(EngineCommand::RefreshIdentity { id })
            .await
            .map(drop)
    }

    async fn dump_identity(&self, id: String) -> Result<String, CoreError> {
        let reply = self
            .inner
            .engine
            .execute(EngineCommand::Dump { id: id.clone() })
            .await?;
        Ok(extract_dump(&id, &reply))
    }
}

// ── Background tasks ─────────────────────────────────────────────

/// Sample engine throughput on a fixed period and republish it.
async fn stats_poll_task(controller: Controller, period: Duration, cancel: CancellationToken) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let engine = &controller.inner.engine;
                controller.inner.rates.send_replace(TunnelRates {
                    up: engine.up_rate(),
                    down: engine.down_rate(),
                });
            }
        }
    }
}

/// Process commands from the mpsc channel one at a time.
async fn command_processor_task(controller: Controller, mut rx: mpsc::Receiver<CommandEnvelope>) {
    let cancel = controller.inner.cancel.clone();

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            envelope = rx.recv() => {
                let Some(envelope) = envelope else { break };
                let name = envelope.command.name();
                let result = route_command(&controller, envelope.command).await;
                if let Err(ref e) = result {
                    warn!(command = name, error = %e, "command failed");
                }
                let _ = envelope.response_tx.send(result);
            }
        }
    }
}

// ── Command routing ──────────────────────────────────────────────

async fn route_command(controller: &Controller, cmd: Command) -> Result<CommandResult, CoreError> {
    match cmd {
        Command::LoadIdentity { id, config } => controller
            .load_identity(id, config)
            .await
            .map(CommandResult::Identity),

        Command::Enroll { jwt } => controller
            .enroll_identity(jwt)
            .await
            .map(CommandResult::Enrolled),

        Command::SetEnabled { id, enabled } => controller
            .toggle_identity(&id, enabled)
            .await
            .map(CommandResult::Identity),

        Command::DeleteIdentity { id } => controller
            .delete_identity(&id)
            .await
            .map(|()| CommandResult::Ok),

        Command::RefreshIdentity { id } => controller
            .refresh_identity(id)
            .await
            .map(|()| CommandResult::Ok),

        Command::Dump { id } => controller.dump_identity(id).await.map(CommandResult::Dump),

        Command::SetUpstreamDns { servers } => controller
            .inner
            .engine
            .execute(EngineCommand::SetUpstreamDns { servers })
            .await
            .map(|_| CommandResult::Ok),
    }
}

// ── Helpers ──────────────────────────────────────────────────────

/// Unwrap a dump reply.
///
/// A single-key object keyed by `id` with a primitive value yields that
/// value's text; anything else yields the serialized reply.
pub fn extract_dump(id: &str, reply: &Value) -> String {
    let primitive = match reply {
        Value::Object(map) if map.len() == 1 => match map.get(id) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            Some(Value::Bool(b)) => Some(b.to_string()),
            _ => None,
        },
        _ => None,
    };
    primitive.unwrap_or_else(|| reply.to_string())
}

fn unexpected(result: &CommandResult) -> CoreError {
    CoreError::Internal(format!("unexpected command result: {result:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn dump_extracts_primitive_under_id() {
        assert_eq!(extract_dump("a", &json!({ "a": "state: ok" })), "state: ok");
        assert_eq!(extract_dump("a", &json!({ "a": 42 })), "42");
        assert_eq!(extract_dump("a", &json!({ "a": true })), "true");
    }

    #[test]
    fn dump_serializes_everything_else() {
        assert_eq!(extract_dump("a", &json!({ "a": null })), r#"{"a":null}"#);
        assert_eq!(
            extract_dump("a", &json!({ "a": { "nested": 1 } })),
            r#"{"a":{"nested":1}}"#
        );
        assert_eq!(
            extract_dump("a", &json!({ "a": "x", "b": "y" })),
            r#"{"a":"x","b":"y"}"#
        );
        assert_eq!(extract_dump("a", &json!({ "b": "x" })), r#"{"b":"x"}"#);
        assert_eq!(extract_dump("a", &json!("bare")), r#""bare""#);
    }

    #[test]
    fn engine_state_displays_variant_name() {
        assert_eq!(EngineState::Running.to_string(), "Running");
    }
}
