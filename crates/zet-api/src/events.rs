// ── Event socket reader ──
//
// The event socket never carries requests; the engine writes one JSON
// object per line for as long as it runs.

use std::path::{Path, PathBuf};
use std::time::Duration;

use futures_core::Stream;
use futures_util::StreamExt;
use tokio::io::AsyncRead;
use tokio::net::UnixStream;
use tokio_util::codec::{FramedRead, LinesCodec, LinesCodecError};

use crate::client::MAX_LINE_LENGTH;
use crate::wire::{Event, parse_event};

/// Parse newline-delimited events from any byte source.
///
/// Blank and unparseable lines are logged and skipped. The stream ends
/// when the reader reaches EOF or fails.
pub fn read_events<R>(reader: R) -> impl Stream<Item = Event> + Send
where
    R: AsyncRead + Unpin + Send + 'static,
{
    let mut lines = FramedRead::new(reader, LinesCodec::new_with_max_length(MAX_LINE_LENGTH));

    async_stream::stream! {
        while let Some(frame) = lines.next().await {
            match frame {
                Ok(line) if line.trim().is_empty() => {}
                Ok(line) => match parse_event(&line) {
                    Ok(event) => {
                        tracing::trace!(op = event.op(), "engine event");
                        yield event;
                    }
                    Err(e) => tracing::debug!(error = %e, "skipping unparseable engine event"),
                },
                Err(LinesCodecError::MaxLineLengthExceeded) => {
                    tracing::warn!(max = MAX_LINE_LENGTH, "skipping oversized engine event line");
                }
                Err(LinesCodecError::Io(e)) => {
                    tracing::warn!(error = %e, "engine event socket read failed");
                    break;
                }
            }
        }
        tracing::debug!("engine event reader finished");
    }
}

/// Connect to the event socket at `path` and stream its events.
///
/// The connect is retried per `retry`; when every attempt fails the error
/// is logged and the stream is empty. A stream that ends is not reopened.
pub fn event_stream(
    path: impl Into<PathBuf>,
    retry: ConnectRetry,
) -> impl Stream<Item = Event> + Send {
    let path = path.into();

    async_stream::stream! {
        let Some(socket) = connect_with_retry(&path, &retry).await else {
            return;
        };
        tracing::info!(socket = %path.display(), "connected to engine event socket");

        let mut events = std::pin::pin!(read_events(socket));
        while let Some(event) = events.next().await {
            yield event;
        }
    }
}

async fn connect_with_retry(path: &Path, retry: &ConnectRetry) -> Option<UnixStream> {
    let mut attempt: u32 = 0;
    loop {
        match UnixStream::connect(path).await {
            Ok(socket) => return Some(socket),
            Err(e) if attempt < retry.max_retries => {
                let delay = retry.backoff(attempt);
                tracing::debug!(
                    socket = %path.display(),
                    error = %e,
                    attempt,
                    delay_ms = delay.as_millis(),
                    "engine event socket not ready, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                tracing::error!(
                    socket = %path.display(),
                    error = %e,
                    attempts = attempt + 1,
                    "cannot connect to engine event socket"
                );
                return None;
            }
        }
    }
}

// ── ConnectRetry ─────────────────────────────────────────────────────

/// Exponential backoff for the event socket connect.
#[derive(Debug, Clone)]
pub struct ConnectRetry {
    /// Delay before the first retry. Default: 100ms.
    pub initial_delay: Duration,
    /// Upper bound on a single delay. Default: 2s.
    pub max_delay: Duration,
    /// Retries after the first attempt. Default: 6.
    pub max_retries: u32,
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(2),
            max_retries: 6,
        }
    }
}

impl ConnectRetry {
    /// Never retry.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2_u32.saturating_pow(attempt);
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::wire::ContextEvent;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn skips_garbage_and_blank_lines() {
        let mock = tokio_test::io::Builder::new()
            .read(b"not json\n\n")
            .read(b"{\"Op\":\"context\",\"Identifier\":\"a\",\"Status\":\"OK\"}\n")
            .read(b"{\"Identifier\":\"no-op\"}\n")
            .build();

        let events: Vec<Event> = read_events(mock).collect().await;
        assert_eq!(
            events,
            vec![Event::Context(ContextEvent {
                identifier: "a".into(),
                name: String::new(),
                controller: String::new(),
                status: "OK".into(),
            })]
        );
    }

    #[tokio::test]
    async fn lines_split_across_reads_are_reassembled() {
        let mock = tokio_test::io::Builder::new()
            .read(b"{\"Op\":\"metr")
            .read(b"ics\",\"Up\":1.5,\"Down\":2.0}\n")
            .build();

        let events: Vec<Event> = read_events(mock).collect().await;
        assert_eq!(events.len(), 1);
        let Event::Metrics(metrics) = &events[0] else {
            panic!("expected metrics event");
        };
        assert!((metrics.up - 1.5).abs() < f64::EPSILON);
        assert!((metrics.down - 2.0).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn missing_socket_yields_empty_stream() {
        let dir = tempfile::tempdir().unwrap();
        let retry = ConnectRetry {
            initial_delay: Duration::from_millis(5),
            max_retries: 2,
            ..ConnectRetry::default()
        };
        let events: Vec<Event> = event_stream(dir.path().join("absent.sock"), retry)
            .collect()
            .await;
        assert!(events.is_empty());
    }

    #[test]
    fn backoff_doubles_up_to_cap() {
        let retry = ConnectRetry::default();
        assert_eq!(retry.backoff(0), Duration::from_millis(100));
        assert_eq!(retry.backoff(1), Duration::from_millis(200));
        assert_eq!(retry.backoff(3), Duration::from_millis(800));
        assert_eq!(retry.backoff(10), Duration::from_secs(2));
        assert_eq!(retry.backoff(40), Duration::from_secs(2));
    }
}
