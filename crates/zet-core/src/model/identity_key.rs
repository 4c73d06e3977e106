// ── Identity key derivation ──
//
// Identity ids are URIs (`ziti://[user@]host[:port][/path]`). Every place
// that needs the short key (registry entries, startup enumeration, CA alias
// cleanup on delete) goes through `derive_identity_key`.

use percent_encoding::percent_decode_str;
use url::Url;

const IDENTITY_SCHEME: &str = "ziti";

/// Short key for an identity id.
///
/// The URI user-info if present, else the path with one leading `/`
/// stripped, else the id itself (also for ids that are not URIs). User-info
/// and path are percent-decoded.
pub fn derive_identity_key(id: &str) -> String {
    let Ok(url) = Url::parse(id) else {
        return id.to_owned();
    };
    if url.cannot_be_a_base() {
        return id.to_owned();
    }
    if !url.username().is_empty() {
        return decode(url.username());
    }
    let path = url.path();
    let path = path.strip_prefix('/').unwrap_or(path);
    if path.is_empty() {
        id.to_owned()
    } else {
        decode(path)
    }
}

fn decode(component: &str) -> String {
    percent_decode_str(component)
        .decode_utf8_lossy()
        .into_owned()
}

/// Alias prefix shared by every CA certificate stored for an identity.
pub fn ca_alias_prefix(derived: &str) -> String {
    format!("{IDENTITY_SCHEME}:{derived}/")
}

/// Whether a credential store alias names an identity (`ziti://...`)
/// rather than one of its CA certificates (`ziti:<key>/...`).
pub fn is_identity_alias(alias: &str) -> bool {
    Url::parse(alias).is_ok_and(|url| url.scheme() == IDENTITY_SCHEME && !url.cannot_be_a_base())
}

/// Controller API URL for an identity alias: `https://host[:port]`.
pub fn controller_url_for(alias: &str) -> Option<String> {
    let url = Url::parse(alias).ok()?;
    let host = url.host_str().filter(|h| !h.is_empty())?;
    Some(match url.port() {
        Some(port) => format!("https://{host}:{port}"),
        None => format!("https://{host}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_info_wins() {
        assert_eq!(
            derive_identity_key("ziti://alice@controller.example:443/x"),
            "alice"
        );
    }

    #[test]
    fn path_without_leading_slash() {
        assert_eq!(derive_identity_key("ziti:///bob"), "bob");
        assert_eq!(derive_identity_key("ziti://ctrl:443/team/carol"), "team/carol");
    }

    #[test]
    fn escaped_components_are_decoded() {
        assert_eq!(derive_identity_key("ziti://a%40b@ctrl.example:443"), "a@b");
        assert_eq!(derive_identity_key("ziti:///dev%20box"), "dev box");
    }

    #[test]
    fn falls_back_to_id() {
        assert_eq!(derive_identity_key("ziti://ctrl:443"), "ziti://ctrl:443");
        assert_eq!(derive_identity_key("not a uri"), "not a uri");
    }

    #[test]
    fn ca_aliases_are_not_identities() {
        assert!(is_identity_alias("ziti://ctrl:443/alice"));
        assert!(!is_identity_alias("ziti:alice/ca-0"));
        assert!(!is_identity_alias("https://ctrl:443/alice"));
        assert!(ca_alias_prefix("alice") == "ziti:alice/");
    }

    #[test]
    fn controller_url_keeps_port() {
        assert_eq!(
            controller_url_for("ziti://ctrl.example:1280/alice").as_deref(),
            Some("https://ctrl.example:1280")
        );
        assert_eq!(
            controller_url_for("ziti://alice@ctrl.example").as_deref(),
            Some("https://ctrl.example")
        );
        assert_eq!(controller_url_for("ziti:///bob"), None);
    }
}
