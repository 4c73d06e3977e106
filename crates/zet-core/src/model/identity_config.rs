// ── Identity configuration document ──
//
// The JSON document the engine loads an identity from. The private key is
// never inline: `id.key` references a credential store alias.

use serde::{Deserialize, Serialize};

/// Prefix marking a key reference held in the credential store.
pub const KEYCHAIN_PREFIX: &str = "keychain:";

/// Key material references for an identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityMaterial {
    /// Key reference, e.g. `keychain:ziti://ctrl:443/alice`.
    pub key: String,
    /// Client certificate (PEM).
    pub cert: String,
    /// CA bundle (concatenated PEM), if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ca: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityConfig {
    #[serde(rename = "ztAPI")]
    pub controller_url: String,
    pub id: IdentityMaterial,
}

impl IdentityConfig {
    /// Credential store alias the key reference points at.
    pub fn key_alias(&self) -> &str {
        self.id
            .key
            .strip_prefix(KEYCHAIN_PREFIX)
            .unwrap_or(&self.id.key)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn wire_shape_uses_zt_api() {
        let cfg: IdentityConfig = serde_json::from_value(json!({
            "ztAPI": "https://ctrl.example:443",
            "id": { "key": "keychain:ziti://ctrl.example:443/alice", "cert": "PEM" }
        }))
        .unwrap();

        assert_eq!(cfg.controller_url, "https://ctrl.example:443");
        assert_eq!(cfg.key_alias(), "ziti://ctrl.example:443/alice");
        assert!(cfg.id.ca.is_none());
        assert!(serde_json::to_value(&cfg).unwrap().get("ztAPI").is_some());
    }

    #[test]
    fn key_without_prefix_is_its_own_alias() {
        let cfg = IdentityConfig {
            controller_url: String::new(),
            id: IdentityMaterial {
                key: "plain".into(),
                cert: String::new(),
                ca: None,
            },
        };
        assert_eq!(cfg.key_alias(), "plain");
    }
}
