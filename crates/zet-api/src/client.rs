// ── Command socket client ──
//
// One request line out, one response line back. The connection is opened
// lazily and dropped on any transport failure so the next request starts
// from a clean line boundary.

use std::path::PathBuf;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::Value;
use tokio::net::UnixStream;
use tokio::sync::Mutex;
use tokio_util::codec::{Framed, LinesCodec};

use crate::error::Error;
use crate::events::ConnectRetry;
use crate::wire::{Request, Response};

/// Upper bound on a single JSON line from the engine (dumps can be large).
pub(crate) const MAX_LINE_LENGTH: usize = 8 * 1024 * 1024;

const DEFAULT_COMMAND_SOCKET: &str = "/tmp/.ziti/ziti-edge-tunnel.sock";
const DEFAULT_EVENT_SOCKET: &str = "/tmp/.ziti/ziti-edge-tunnel-event.sock";

type LineConnection = Framed<UnixStream, LinesCodec>;

// ── IpcConfig ────────────────────────────────────────────────────────

/// Where the engine listens and how long to wait for it.
#[derive(Debug, Clone)]
pub struct IpcConfig {
    pub command_socket: PathBuf,
    pub event_socket: PathBuf,
    /// Per-request timeout, covering connect, write, and the reply.
    pub timeout: Duration,
    /// Backoff for connecting the event socket.
    pub event_retry: ConnectRetry,
}

impl Default for IpcConfig {
    fn default() -> Self {
        Self {
            command_socket: PathBuf::from(DEFAULT_COMMAND_SOCKET),
            event_socket: PathBuf::from(DEFAULT_EVENT_SOCKET),
            timeout: Duration::from_secs(30),
            event_retry: ConnectRetry::default(),
        }
    }
}

// ── IpcClient ────────────────────────────────────────────────────────

/// Serialized request/response client for the engine command socket.
///
/// Requests are processed strictly one at a time: the connection mutex is
/// held from write until the matching response line is read.
pub struct IpcClient {
    config: IpcConfig,
    conn: Mutex<Option<LineConnection>>,
}

impl IpcClient {
    pub fn new(config: IpcConfig) -> Self {
        Self {
            config,
            conn: Mutex::new(None),
        }
    }

    /// Send one request and wait for its response.
    ///
    /// Returns the response's `Data` field on success. `Success: false`
    /// maps to [`Error::Command`]; no reply within the configured timeout
    /// maps to [`Error::Timeout`].
    pub async fn send(&self, request: &Request) -> Result<Option<Value>, Error> {
        let line = serde_json::to_string(request)?;
        let timeout = self.config.timeout;

        tracing::debug!(command = request.name(), "sending engine command");

        let mut slot = self.conn.lock().await;
        let response = match tokio::time::timeout(timeout, self.round_trip(&mut slot, line)).await
        {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                if e.is_unavailable() {
                    tracing::warn!(command = request.name(), error = %e, "engine connection lost");
                }
                *slot = None;
                return Err(e);
            }
            Err(_) => {
                // A late reply would desynchronize the line stream.
                *slot = None;
                return Err(Error::Timeout {
                    timeout_secs: timeout.as_secs(),
                });
            }
        };
        drop(slot);

        if response.success {
            tracing::debug!(command = request.name(), "engine command succeeded");
            Ok(response.data)
        } else {
            let message = response
                .error
                .unwrap_or_else(|| "engine reported failure without a message".into());
            tracing::debug!(
                command = request.name(),
                code = ?response.code,
                error = %message,
                "engine command rejected"
            );
            Err(Error::Command {
                message,
                code: response.code,
            })
        }
    }

    async fn round_trip(
        &self,
        slot: &mut Option<LineConnection>,
        line: String,
    ) -> Result<Response, Error> {
        if slot.is_none() {
            *slot = Some(self.connect().await?);
        }
        let conn = slot.as_mut().ok_or(Error::Closed)?;

        conn.send(line).await?;
        let reply = conn.next().await.ok_or(Error::Closed)??;

        serde_json::from_str(&reply).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body: reply,
        })
    }

    async fn connect(&self) -> Result<LineConnection, Error> {
        let path = &self.config.command_socket;
        let stream = UnixStream::connect(path)
            .await
            .map_err(|source| Error::Connect {
                path: path.display().to_string(),
                source,
            })?;
        tracing::info!(socket = %path.display(), "connected to engine command socket");
        Ok(Framed::new(
            stream,
            LinesCodec::new_with_max_length(MAX_LINE_LENGTH),
        ))
    }
}
