// zet-api: Async client for the tunnel engine's IPC sockets.
//
// The engine runs out of process and exposes two Unix sockets: a command
// socket (request/response, one JSON object per line) and an event socket
// (an unbounded stream of JSON objects, one per line).

pub mod client;
pub mod error;
pub mod events;
pub mod wire;

pub use client::{IpcClient, IpcConfig};
pub use error::Error;
pub use events::{ConnectRetry, event_stream, read_events};
pub use wire::{
    ApiEvent, ContextEvent, EnrollData, Event, IdentifierData, LoadIdentityData, MetricsEvent,
    OnOffData, Request, Response, ServiceDns, ServiceEvent, ServiceRecord, SetupDnsData,
    UpstreamDnsData,
};
