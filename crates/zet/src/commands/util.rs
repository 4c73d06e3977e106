//! Shared helpers for command handlers.

use std::io::{IsTerminal, Read};
use std::path::Path;
use std::time::Duration;

use tokio::time::{Instant, timeout};
use tracing::debug;
use zet_core::{Controller, Identity, IdentityFilter, IdentityStatus};

use crate::cli::StatusFilter;
use crate::error::CliError;

pub fn identity_filter(filter: StatusFilter) -> IdentityFilter {
    match filter {
        StatusFilter::All => IdentityFilter::All,
        StatusFilter::Enabled => IdentityFilter::Enabled,
        StatusFilter::Disabled => IdentityFilter::Disabled,
        StatusFilter::Active => IdentityFilter::Active,
    }
}

/// How long the identity set must stay unchanged before it counts as settled.
const QUIET_SPELL: Duration = Duration::from_millis(250);

/// Wait for the engine to report on every enabled identity.
///
/// Returns once no enabled identity is `Loading` and the set has been quiet
/// for a short spell, so trailing service events land too. Gives up after
/// `limit` and leaves the caller to print whatever state there is.
pub async fn await_settled(controller: &Controller, limit: Duration) {
    let deadline = Instant::now() + limit;
    let loading = IdentityFilter::Custom(Box::new(|identity: &Identity| {
        identity.enabled && identity.status == IdentityStatus::Loading
    }));
    let mut identities = controller.identities();

    loop {
        let pending = identities.filtered(&loading).len();
        let remaining = deadline.saturating_duration_since(Instant::now());
        let wait = if pending == 0 {
            QUIET_SPELL.min(remaining)
        } else {
            remaining
        };

        match timeout(wait, identities.changed()).await {
            Ok(Some(_)) => {}
            Ok(None) => return,
            Err(_) => {
                if pending > 0 {
                    debug!(pending, "identities still loading; reading state anyway");
                }
                return;
            }
        }
    }
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, action: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    if !std::io::stdin().is_terminal() {
        return Err(CliError::NonInteractiveRequiresYes {
            action: action.into(),
        });
    }
    dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))
}

/// Read an enrollment token from `path`, or stdin for `-`.
pub fn read_token(path: &Path) -> Result<String, CliError> {
    let raw = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };

    let token = raw.trim();
    if token.is_empty() {
        return Err(CliError::Validation {
            field: "jwt".into(),
            reason: format!("{} is empty", path.display()),
        });
    }
    Ok(token.to_owned())
}

/// Human-readable throughput, e.g. `1.2 KB/s`.
#[allow(
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::as_conversions
)]
pub fn format_rate(bytes_per_sec: f64) -> String {
    let bytes = bytes_per_sec.max(0.0).round() as u64;
    format!("{}/s", bytesize::ByteSize::b(bytes))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn negative_rates_clamp_to_zero() {
        assert_eq!(format_rate(-5.0), format_rate(0.0));
        assert!(format_rate(0.0).ends_with("/s"));
    }

    #[test]
    fn token_is_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("alice.jwt");
        std::fs::write(&path, "  eyJhbGciOi.payload.sig\n").unwrap();
        assert_eq!(read_token(&path).unwrap(), "eyJhbGciOi.payload.sig");

        std::fs::write(&path, "\n").unwrap();
        assert!(matches!(read_token(&path), Err(CliError::Validation { .. })));
    }
}
