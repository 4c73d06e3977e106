// ── Filter predicates for identity snapshots ──
//
// Used by the CLI to filter snapshots without round-tripping the engine.

use crate::model::Identity;

/// Filter predicate for identity collections.
pub enum IdentityFilter {
    All,
    Enabled,
    Disabled,
    Active,
    Custom(Box<dyn Fn(&Identity) -> bool + Send + Sync>),
}

impl IdentityFilter {
    pub fn matches(&self, identity: &Identity) -> bool {
        match self {
            Self::All => true,
            Self::Enabled => identity.enabled,
            Self::Disabled => !identity.enabled,
            Self::Active => identity.is_active(),
            Self::Custom(f) => f(identity),
        }
    }
}
