// ── Credential store seam ──
//
// Private keys and certificate chains addressable by alias. Identity
// entries live under their id (`ziti://...`); the CA certificates of an
// identity live under `ziti:<derived key>/ca-<n>`.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::{PoisonError, RwLock};

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use secrecy::SecretString;
use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{ca_alias_prefix, derive_identity_key};

const PEM_BEGIN: &str = "-----BEGIN CERTIFICATE-----";
const PEM_END: &str = "-----END CERTIFICATE-----";
const PEM_LINE_WIDTH: usize = 64;

/// One credential store entry.
#[derive(Clone)]
pub struct CredentialEntry {
    pub alias: String,
    /// Absent for trusted-certificate entries (CA certs).
    pub private_key: Option<SecretString>,
    /// PEM blocks, leaf first.
    pub certificate_chain: Vec<String>,
}

impl fmt::Debug for CredentialEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialEntry")
            .field("alias", &self.alias)
            .field("has_private_key", &self.private_key.is_some())
            .field("certificates", &self.certificate_chain.len())
            .finish()
    }
}

/// Durable key/certificate storage.
///
/// Implementors provide the four primitive operations; certificate lookup
/// and enrollment updates are derived from them.
pub trait CredentialStore: Send + Sync {
    fn list_aliases(&self) -> Result<BTreeSet<String>, CoreError>;

    fn entry(&self, alias: &str) -> Result<Option<CredentialEntry>, CoreError>;

    /// Insert or replace the entry under `entry.alias`.
    fn set_entry(&self, entry: CredentialEntry) -> Result<(), CoreError>;

    /// Delete an entry. Deleting an absent alias is not an error.
    fn delete_entry(&self, alias: &str) -> Result<(), CoreError>;

    fn certificate_chain(&self, alias: &str) -> Result<Vec<String>, CoreError> {
        Ok(self
            .entry(alias)?
            .map(|entry| entry.certificate_chain)
            .unwrap_or_default())
    }

    /// The leaf certificate stored under `alias`.
    fn certificate(&self, alias: &str) -> Result<Option<String>, CoreError> {
        Ok(self.certificate_chain(alias)?.into_iter().next())
    }

    /// Store the certificates issued at enrollment.
    ///
    /// The identity entry keeps its private key and gets `cert_pem` as its
    /// chain. Each certificate in `ca_pem` replaces the identity's previous
    /// CA entries.
    fn update_key_entry(
        &self,
        alias: &str,
        cert_pem: &str,
        ca_pem: Option<&str>,
    ) -> Result<(), CoreError> {
        let malformed = |e: std::io::Error| CoreError::CredentialStore {
            alias: alias.to_owned(),
            message: format!("malformed PEM: {e}"),
        };

        let chain = split_pem_bundle(cert_pem).map_err(malformed)?;
        if chain.is_empty() {
            return Err(CoreError::CredentialStore {
                alias: alias.to_owned(),
                message: "no certificate in enrollment reply".into(),
            });
        }

        let private_key = self.entry(alias)?.and_then(|entry| entry.private_key);
        if private_key.is_none() {
            warn!(alias, "no private key stored for enrolled identity");
        }
        self.set_entry(CredentialEntry {
            alias: alias.to_owned(),
            private_key,
            certificate_chain: chain,
        })?;

        let prefix = ca_alias_prefix(&derive_identity_key(alias));
        for stale in self.list_aliases()?.iter().filter(|a| a.starts_with(&prefix)) {
            self.delete_entry(stale)?;
        }
        let cas = split_pem_bundle(ca_pem.unwrap_or_default()).map_err(malformed)?;
        for (index, cert) in cas.into_iter().enumerate() {
            let ca_alias = format!("{prefix}ca-{index}");
            debug!(alias = %ca_alias, "storing CA certificate");
            self.set_entry(CredentialEntry {
                alias: ca_alias,
                private_key: None,
                certificate_chain: vec![cert],
            })?;
        }
        Ok(())
    }
}

/// Split a concatenated PEM bundle into individual certificate blocks.
///
/// Only `CERTIFICATE` sections are kept; keys and text around the blocks
/// are skipped. Each block is re-encoded in canonical form.
pub fn split_pem_bundle(bundle: &str) -> std::io::Result<Vec<String>> {
    let mut reader = bundle.as_bytes();
    let ders = rustls_pemfile::certs(&mut reader)?;
    Ok(ders.iter().map(|der| encode_certificate(der)).collect())
}

/// PEM-encode one DER certificate with 64-column lines.
pub fn encode_certificate(der: &[u8]) -> String {
    let body = STANDARD.encode(der);
    let mut pem = String::with_capacity(body.len() + body.len() / PEM_LINE_WIDTH + 64);
    pem.push_str(PEM_BEGIN);
    for (i, c) in body.chars().enumerate() {
        if i % PEM_LINE_WIDTH == 0 {
            pem.push('\n');
        }
        pem.push(c);
    }
    pem.push('\n');
    pem.push_str(PEM_END);
    pem.push('\n');
    pem
}

// ── In-memory implementation ─────────────────────────────────────────

/// Volatile credential store, for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryCredentialStore {
    entries: RwLock<BTreeMap<String, CredentialEntry>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl CredentialStore for MemoryCredentialStore {
    fn list_aliases(&self) -> Result<BTreeSet<String>, CoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.keys().cloned().collect())
    }

    fn entry(&self, alias: &str) -> Result<Option<CredentialEntry>, CoreError> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        Ok(entries.get(alias).cloned())
    }

    fn set_entry(&self, entry: CredentialEntry) -> Result<(), CoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.insert(entry.alias.clone(), entry);
        Ok(())
    }

    fn delete_entry(&self, alias: &str) -> Result<(), CoreError> {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        entries.remove(alias);
        Ok(())
    }
}
