use thiserror::Error;

/// Top-level error type for the `zet-api` crate.
///
/// Covers every failure mode of the engine IPC surface: socket
/// connection, framing, timeouts, and command rejections.
/// `zet-core` maps these into domain errors.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection ──────────────────────────────────────────────────
    /// Could not connect to an engine socket.
    #[error("Cannot connect to engine socket {path}: {source}")]
    Connect {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The engine closed the command socket mid-request.
    #[error("Engine closed the command socket")]
    Closed,

    /// Socket I/O failure after the connection was established.
    #[error("Engine socket I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Line framing failure (oversized line, invalid UTF-8).
    #[error("Engine framing error: {0}")]
    Framing(String),

    /// No response within the configured timeout.
    #[error("Engine request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Command ─────────────────────────────────────────────────────
    /// The engine answered with `Success: false`.
    #[error("Engine rejected command: {message}")]
    Command { message: String, code: Option<i64> },

    // ── Data ────────────────────────────────────────────────────────
    /// A response line was not valid JSON, with the raw line for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    /// A request could not be encoded.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if the engine is unreachable rather than refusing
    /// the request.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Connect { .. } | Self::Closed | Self::Io(_))
    }
}

impl From<tokio_util::codec::LinesCodecError> for Error {
    fn from(err: tokio_util::codec::LinesCodecError) -> Self {
        match err {
            tokio_util::codec::LinesCodecError::Io(e) => Self::Io(e),
            tokio_util::codec::LinesCodecError::MaxLineLengthExceeded => {
                Self::Framing("line exceeds maximum length".into())
            }
        }
    }
}
