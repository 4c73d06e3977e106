// ── Domain model ──
//
// Canonical identity and service types. Engine wire payloads are
// converted into these in `convert`; consumers depend only on this module.

pub mod identity;
pub mod identity_config;
pub mod identity_key;

// ── Re-exports ──────────────────────────────────────────────────────

pub use identity::{Identity, IdentityStatus, Service, ServiceDns};
pub use identity_config::{IdentityConfig, IdentityMaterial, KEYCHAIN_PREFIX};
pub use identity_key::{
    ca_alias_prefix, controller_url_for, derive_identity_key, is_identity_alias,
};
