// ── Identity domain types ──

use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use super::identity_key::derive_identity_key;

/// Connection status of an identity.
///
/// `Loading` until the engine reports a context; engine-reported strings
/// other than `"OK"` are kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityStatus {
    Loading,
    Active,
    Enabled,
    Disabled,
    Other(String),
}

impl IdentityStatus {
    /// Map an engine context status string.
    pub fn from_engine(status: &str) -> Self {
        if status == "OK" {
            Self::Active
        } else {
            Self::Other(status.to_owned())
        }
    }
}

impl fmt::Display for IdentityStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Loading => f.write_str("Loading"),
            Self::Active => f.write_str("Active"),
            Self::Enabled => f.write_str("Enabled"),
            Self::Disabled => f.write_str("Disabled"),
            Self::Other(status) => f.write_str(status),
        }
    }
}

impl Serialize for IdentityStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// DNS intercept for a service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ServiceDns {
    pub hostname: String,
    pub port: Option<u16>,
}

/// A network service reachable through one identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub dns: Option<ServiceDns>,
}

/// One enrolled network identity and its live state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Identity {
    /// Engine-facing key, typically `ziti://[user@]host[:port][/path]`.
    pub id: String,
    /// Short key derived from `id`; also names the identity's CA aliases.
    pub derived_name: String,
    pub display_name: String,
    pub status: IdentityStatus,
    pub controller_address: String,
    pub enabled: bool,
    pub services: BTreeMap<String, Service>,
    pub last_event: Option<DateTime<Utc>>,
}

impl Identity {
    pub fn new(id: impl Into<String>, enabled: bool) -> Self {
        let id = id.into();
        Self {
            derived_name: derive_identity_key(&id),
            display_name: id.clone(),
            status: if enabled {
                IdentityStatus::Loading
            } else {
                IdentityStatus::Disabled
            },
            controller_address: String::new(),
            enabled,
            services: BTreeMap::new(),
            last_event: None,
            id,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == IdentityStatus::Active
    }

    /// Apply an incremental service change: removals first, then additions,
    /// so a service present in both ends up added.
    pub fn apply_service_delta<'a>(
        &mut self,
        removed: impl IntoIterator<Item = &'a str>,
        added: impl IntoIterator<Item = Service>,
    ) {
        for id in removed {
            self.services.remove(id);
        }
        for service in added {
            self.services.insert(service.id.clone(), service);
        }
    }
}
