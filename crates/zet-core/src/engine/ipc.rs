// ── IPC-backed engine ──
//
// Drives an out-of-process engine over its command and event sockets.
// Metrics events never reach the dispatcher: they are cached here so the
// stats poller reads rates without touching the sockets.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use arc_swap::ArcSwap;
use futures_util::future::{self, BoxFuture};
use futures_util::stream::{self, BoxStream};
use futures_util::{FutureExt, StreamExt};
use serde_json::Value;
use tracing::warn;

use zet_api::{ConnectRetry, Event, IpcClient, IpcConfig, MetricsEvent, Request, SetupDnsData};

use super::{EngineCommand, EngineEvent, TunnelEngine};
use crate::error::CoreError;

pub struct IpcEngine {
    client: IpcClient,
    event_socket: PathBuf,
    event_retry: ConnectRetry,
    events_taken: AtomicBool,
    metrics: Arc<ArcSwap<MetricsEvent>>,
}

impl IpcEngine {
    pub fn new(config: IpcConfig) -> Self {
        let event_socket = config.event_socket.clone();
        let event_retry = config.event_retry.clone();
        Self {
            client: IpcClient::new(config),
            event_socket,
            event_retry,
            events_taken: AtomicBool::new(false),
            metrics: Arc::new(ArcSwap::from_pointee(MetricsEvent::default())),
        }
    }

    async fn send(&self, request: Request) -> Result<Value, CoreError> {
        let name = request.name();
        self.client
            .send(&request)
            .await
            .map(Option::unwrap_or_default)
            .map_err(|e| CoreError::engine(name, e))
    }
}

impl TunnelEngine for IpcEngine {
    fn setup_dns<'a>(
        &'a self,
        nameserver: &'a str,
        range: &'a str,
    ) -> BoxFuture<'a, Result<(), CoreError>> {
        async move {
            self.send(Request::SetupDns(SetupDnsData {
                nameserver: nameserver.to_owned(),
                range: range.to_owned(),
            }))
            .await
            .map(drop)
        }
        .boxed()
    }

    fn start(&self) -> BoxFuture<'_, Result<(), CoreError>> {
        async move { self.send(Request::Start).await.map(drop) }.boxed()
    }

    fn events(&self) -> BoxStream<'static, EngineEvent> {
        if self.events_taken.swap(true, Ordering::SeqCst) {
            warn!("engine event stream requested twice; returning an empty stream");
            return stream::empty().boxed();
        }

        let metrics = Arc::clone(&self.metrics);
        zet_api::event_stream(self.event_socket.clone(), self.event_retry.clone())
            .filter_map(move |event| {
                let mapped = match event {
                    Event::Metrics(sample) => {
                        metrics.store(Arc::new(sample));
                        None
                    }
                    other => Some(EngineEvent::from(other)),
                };
                future::ready(mapped)
            })
            .boxed()
    }

    fn execute(&self, command: EngineCommand) -> BoxFuture<'_, Result<Value, CoreError>> {
        async move {
            let request = Request::try_from(command)?;
            self.send(request).await
        }
        .boxed()
    }

    fn up_rate(&self) -> f64 {
        self.metrics.load().up
    }

    fn down_rate(&self) -> f64 {
        self.metrics.load().down
    }
}
