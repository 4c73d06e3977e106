// ── Runtime controller configuration ──
//
// Tuning for the controller's background tasks plus the DNS settings the
// engine is started with. Core never reads config files; the CLI builds a
// `ControllerConfig` and hands it in.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Preference key holding the tunnel DNS nameserver address.
pub const NAMESERVER_KEY: &str = "nameserver";
/// Preference key holding the tunnel DNS address range (CIDR).
pub const RANGE_KEY: &str = "range";

const DEFAULT_NAMESERVER: &str = "100.64.0.2";
const DEFAULT_RANGE: &str = "100.64.0.0/10";

/// Preference key for an identity's persisted disabled flag.
pub fn disabled_key(id: &str) -> String {
    format!("{id}.disabled")
}

/// Controller task tuning.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// How often the stats poller samples engine throughput.
    pub stats_interval: Duration,
    /// Capacity of the user command channel.
    pub command_channel_size: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            stats_interval: Duration::from_secs(1),
            command_channel_size: 64,
        }
    }
}

/// Tunnel DNS configuration handed to the engine at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DnsSettings {
    pub nameserver: String,
    pub range: String,
}

impl Default for DnsSettings {
    fn default() -> Self {
        Self {
            nameserver: DEFAULT_NAMESERVER.into(),
            range: DEFAULT_RANGE.into(),
        }
    }
}
