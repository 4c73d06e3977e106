// Shared test doubles for controller integration tests.
#![allow(dead_code, clippy::unwrap_used)]

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::future::BoxFuture;
use futures_util::stream::BoxStream;
use futures_util::{FutureExt, StreamExt};
use serde_json::Value;
use tokio::sync::{Notify, mpsc};
use tokio_stream::wrappers::UnboundedReceiverStream;

use zet_core::{
    Controller, ControllerConfig, CoreError, CredentialEntry, CredentialStore, EngineCommand,
    EngineEvent, Identity, MemoryConfigStore, MemoryCredentialStore, TunnelEngine,
};

// ── FakeEngine ──────────────────────────────────────────────────────

/// Everything the controller asked the engine to do, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    SetupDns { nameserver: String, range: String },
    Start,
    Command(EngineCommand),
}

/// Scripted in-memory engine.
///
/// Commands succeed with `Value::Null` unless a reply is queued for their
/// name. Events pushed with [`push_event`](Self::push_event) reach the
/// controller's event loop in order.
pub struct FakeEngine {
    calls: Mutex<Vec<Call>>,
    replies: Mutex<HashMap<&'static str, VecDeque<Result<Value, String>>>>,
    holds: Mutex<HashMap<&'static str, Arc<Notify>>>,
    fail_start: Mutex<Option<String>>,
    rates: Mutex<(f64, f64)>,
    events_tx: mpsc::UnboundedSender<EngineEvent>,
    events_rx: Mutex<Option<mpsc::UnboundedReceiver<EngineEvent>>>,
}

impl FakeEngine {
    pub fn new() -> Arc<Self> {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(HashMap::new()),
            holds: Mutex::new(HashMap::new()),
            fail_start: Mutex::new(None),
            rates: Mutex::new((0.0, 0.0)),
            events_tx,
            events_rx: Mutex::new(Some(events_rx)),
        })
    }

    pub fn reply_next(&self, command: &'static str, reply: Value) {
        self.queue(command, Ok(reply));
    }

    pub fn fail_next(&self, command: &'static str, message: &str) {
        self.queue(command, Err(message.to_owned()));
    }

    /// Park the next `command` until the returned handle is notified.
    pub fn hold_next(&self, command: &'static str) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        self.holds.lock().unwrap().insert(command, Arc::clone(&gate));
        gate
    }

    pub fn fail_start(&self, message: &str) {
        *self.fail_start.lock().unwrap() = Some(message.to_owned());
    }

    pub fn set_rates(&self, up: f64, down: f64) {
        *self.rates.lock().unwrap() = (up, down);
    }

    pub fn push_event(&self, event: EngineEvent) {
        self.events_tx.send(event).unwrap();
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn commands(&self) -> Vec<EngineCommand> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Command(command) => Some(command),
                _ => None,
            })
            .collect()
    }

    pub fn command_names(&self) -> Vec<&'static str> {
        self.commands().iter().map(EngineCommand::name).collect()
    }

    fn queue(&self, command: &'static str, reply: Result<Value, String>) {
        self.replies
            .lock()
            .unwrap()
            .entry(command)
            .or_default()
            .push_back(reply);
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

impl TunnelEngine for FakeEngine {
    fn setup_dns<'a>(
        &'a self,
        nameserver: &'a str,
        range: &'a str,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        self.record(Call::SetupDns {
            nameserver: nameserver.to_owned(),
            range: range.to_owned(),
        });
        async { Ok(()) }.boxed()
    }

    fn start(&self) -> BoxFuture<'_, Result<(), CoreError>> {
        self.record(Call::Start);
        let failure = self.fail_start.lock().unwrap().take();
        async move {
            match failure {
                Some(reason) => Err(CoreError::EngineUnavailable { reason }),
                None => Ok(()),
            }
        }
        .boxed()
    }

    fn events(&self) -> BoxStream<'static, EngineEvent> {
        match self.events_rx.lock().unwrap().take() {
            Some(rx) => UnboundedReceiverStream::new(rx).boxed(),
            None => futures_util::stream::empty().boxed(),
        }
    }

    fn execute(&self, command: EngineCommand) -> BoxFuture<'_, Result<Value, CoreError>> {
        let name = command.name();
        self.record(Call::Command(command));
        let reply = self
            .replies
            .lock()
            .unwrap()
            .get_mut(name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Ok(Value::Null));
        let gate = self.holds.lock().unwrap().remove(name);

        async move {
            if let Some(gate) = gate {
                gate.notified().await;
            }
            // Let other tasks run, as a real round trip would.
            tokio::task::yield_now().await;
            reply.map_err(|message| CoreError::EngineCommand {
                command: name.to_owned(),
                message,
                code: None,
            })
        }
        .boxed()
    }

    fn up_rate(&self) -> f64 {
        self.rates.lock().unwrap().0
    }

    fn down_rate(&self) -> f64 {
        self.rates.lock().unwrap().1
    }
}

// ── Credential store that cannot delete ─────────────────────────────

/// Wraps a memory store; every delete fails.
#[derive(Default)]
pub struct UndeletableCredentialStore {
    inner: MemoryCredentialStore,
}

impl CredentialStore for UndeletableCredentialStore {
    fn list_aliases(&self) -> Result<BTreeSet<String>, CoreError> {
        self.inner.list_aliases()
    }

    fn entry(&self, alias: &str) -> Result<Option<CredentialEntry>, CoreError> {
        self.inner.entry(alias)
    }

    fn set_entry(&self, entry: CredentialEntry) -> Result<(), CoreError> {
        self.inner.set_entry(entry)
    }

    fn delete_entry(&self, alias: &str) -> Result<(), CoreError> {
        Err(CoreError::CredentialStore {
            alias: alias.to_owned(),
            message: "keystore is read-only".into(),
        })
    }
}

// ── Harness ─────────────────────────────────────────────────────────

pub struct Harness {
    pub controller: Controller,
    pub engine: Arc<FakeEngine>,
    pub credentials: Arc<dyn CredentialStore>,
    pub prefs: Arc<MemoryConfigStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_credentials(Arc::new(MemoryCredentialStore::new()))
    }

    pub fn with_credentials(credentials: Arc<dyn CredentialStore>) -> Self {
        let engine = FakeEngine::new();
        let prefs = Arc::new(MemoryConfigStore::new());
        let controller = Controller::new(
            ControllerConfig::default(),
            engine.clone(),
            Arc::clone(&credentials),
            prefs.clone(),
        );
        Self {
            controller,
            engine,
            credentials,
            prefs,
        }
    }

    pub async fn started() -> Self {
        let harness = Self::new();
        harness.controller.start().await.unwrap();
        harness
    }
}

/// Wait until `predicate` holds for the identity `id`.
pub async fn wait_for_identity<F>(controller: &Controller, id: &str, predicate: F) -> Arc<Identity>
where
    F: Fn(&Identity) -> bool,
{
    let mut stream = controller.identities();
    let wait = async {
        loop {
            if let Some(identity) = controller.identity(id) {
                if predicate(&identity) {
                    return identity;
                }
            }
            stream.changed().await.unwrap();
        }
    };
    tokio::time::timeout(Duration::from_secs(5), wait).await.unwrap()
}

pub fn pem(body: &str) -> String {
    zet_core::encode_certificate(body.as_bytes())
}
