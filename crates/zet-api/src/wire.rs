// ── IPC wire types ──
//
// Everything the engine sends or receives, one JSON object per line.
// Field names are PascalCase on the wire.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// ── Requests ─────────────────────────────────────────────────────────

/// A command sent over the command socket.
///
/// Serialized adjacently tagged: `{"Command": "<Name>", "Data": {...}}`.
/// Unit variants omit `Data`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "Command", content = "Data")]
pub enum Request {
    #[serde(rename = "SetupDNS")]
    SetupDns(SetupDnsData),
    Start,
    LoadIdentity(LoadIdentityData),
    Enroll(EnrollData),
    IdentityOnOff(OnOffData),
    RefreshIdentity(IdentifierData),
    #[serde(rename = "ZitiDump")]
    Dump(IdentifierData),
    #[serde(rename = "SetUpstreamDNS")]
    SetUpstreamDns(UpstreamDnsData),
    RemoveIdentity(IdentifierData),
}

impl Request {
    /// The command name as it appears on the wire.
    pub fn name(&self) -> &'static str {
        match self {
            Self::SetupDns(_) => "SetupDNS",
            Self::Start => "Start",
            Self::LoadIdentity(_) => "LoadIdentity",
            Self::Enroll(_) => "Enroll",
            Self::IdentityOnOff(_) => "IdentityOnOff",
            Self::RefreshIdentity(_) => "RefreshIdentity",
            Self::Dump(_) => "ZitiDump",
            Self::SetUpstreamDns(_) => "SetUpstreamDNS",
            Self::RemoveIdentity(_) => "RemoveIdentity",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SetupDnsData {
    pub nameserver: String,
    pub range: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct LoadIdentityData {
    pub identifier: String,
    /// Identity configuration document (`{"ztAPI": ..., "id": {...}}`).
    pub config: Value,
    pub disabled: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EnrollData {
    pub jwt: String,
    pub use_keychain: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OnOffData {
    pub identifier: String,
    pub on_off: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct IdentifierData {
    pub identifier: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct UpstreamDnsData {
    pub servers: Vec<String>,
}

// ── Responses ────────────────────────────────────────────────────────

/// The engine's answer to exactly one [`Request`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Response {
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl Response {
    pub fn ok(data: Option<Value>) -> Self {
        Self {
            success: true,
            error: None,
            code: None,
            data,
        }
    }

    pub fn failure(message: impl Into<String>, code: Option<i64>) -> Self {
        Self {
            success: false,
            error: Some(message.into()),
            code,
            data: None,
        }
    }
}

// ── Events ───────────────────────────────────────────────────────────

/// A parsed line from the event socket, discriminated by its `"Op"` field.
///
/// Unrecognized ops are preserved as [`Event::Unknown`] with the raw body
/// so newer engines never break older clients.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    Context(ContextEvent),
    Service(ServiceEvent),
    Api(ApiEvent),
    Metrics(MetricsEvent),
    Unknown { op: String, body: Value },
}

impl Event {
    /// The `"Op"` discriminator this event was parsed from.
    pub fn op(&self) -> &str {
        match self {
            Self::Context(_) => "context",
            Self::Service(_) => "service",
            Self::Api(_) => "api",
            Self::Metrics(_) => "metrics",
            Self::Unknown { op, .. } => op,
        }
    }
}

/// Identity connection context changed (name, controller, status).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ContextEvent {
    pub identifier: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub controller: String,
    #[serde(default)]
    pub status: String,
}

/// Incremental change to an identity's service set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceEvent {
    pub identifier: String,
    #[serde(default)]
    pub added_services: Vec<ServiceRecord>,
    #[serde(default)]
    pub removed_services: Vec<ServiceRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceRecord {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns: Option<ServiceDns>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ServiceDns {
    pub hostname: String,
    #[serde(default)]
    pub port: Option<u16>,
}

/// Controller API address change notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ApiEvent {
    pub identifier: String,
    #[serde(default)]
    pub new_controller_address: Option<String>,
}

/// Instantaneous throughput counters in bytes per second.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct MetricsEvent {
    #[serde(default)]
    pub up: f64,
    #[serde(default)]
    pub down: f64,
}

/// Parse one event line.
///
/// Known ops deserialize into their typed payload; unknown ops keep the raw
/// body. Lines without an `"Op"` field or with a malformed payload for a
/// known op are errors.
pub fn parse_event(line: &str) -> Result<Event, serde_json::Error> {
    let body: Value = serde_json::from_str(line)?;
    let op = body
        .get("Op")
        .and_then(Value::as_str)
        .map(str::to_owned)
        .ok_or_else(|| <serde_json::Error as serde::de::Error>::missing_field("Op"))?;

    let event = match op.as_str() {
        "context" => Event::Context(serde_json::from_value(body)?),
        "service" => Event::Service(serde_json::from_value(body)?),
        "api" => Event::Api(serde_json::from_value(body)?),
        "metrics" => Event::Metrics(serde_json::from_value(body)?),
        _ => Event::Unknown {
            op: op.clone(),
            body,
        },
    };
    Ok(event)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn unit_request_omits_data() {
        let line = serde_json::to_string(&Request::Start).unwrap();
        assert_eq!(line, r#"{"Command":"Start"}"#);
    }

    #[test]
    fn request_uses_wire_names() {
        let req = Request::Dump(IdentifierData {
            identifier: "ziti://ctrl:443/alice".into(),
        });
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(
            value,
            json!({"Command": "ZitiDump", "Data": {"Identifier": "ziti://ctrl:443/alice"}})
        );
        assert_eq!(req.name(), "ZitiDump");
    }

    #[test]
    fn on_off_request_round_trips_through_server_parse() {
        let req = Request::IdentityOnOff(OnOffData {
            identifier: "id".into(),
            on_off: false,
        });
        let line = serde_json::to_string(&req).unwrap();
        assert!(line.contains(r#""OnOff":false"#));
        let parsed: Request = serde_json::from_str(&line).unwrap();
        assert_eq!(parsed, req);
    }

    #[test]
    fn response_defaults_optional_fields() {
        let resp: Response = serde_json::from_str(r#"{"Success":true}"#).unwrap();
        assert_eq!(resp, Response::ok(None));
    }

    #[test]
    fn parse_context_event() {
        let event = parse_event(
            r#"{"Op":"context","Identifier":"a","Name":"Alice","Controller":"ctrl:443","Status":"OK"}"#,
        )
        .unwrap();
        assert_eq!(
            event,
            Event::Context(ContextEvent {
                identifier: "a".into(),
                name: "Alice".into(),
                controller: "ctrl:443".into(),
                status: "OK".into(),
            })
        );
    }

    #[test]
    fn parse_service_event_with_dns() {
        let event = parse_event(
            r#"{"Op":"service","Identifier":"a","AddedServices":[{"Id":"s1","Name":"web","Dns":{"Hostname":"web.ziti","Port":443}}]}"#,
        )
        .unwrap();
        let Event::Service(svc) = event else {
            panic!("expected service event");
        };
        assert_eq!(svc.added_services.len(), 1);
        assert!(svc.removed_services.is_empty());
        assert_eq!(
            svc.added_services[0].dns,
            Some(ServiceDns {
                hostname: "web.ziti".into(),
                port: Some(443),
            })
        );
    }

    #[test]
    fn unknown_op_keeps_body() {
        let event = parse_event(r#"{"Op":"mfa","Identifier":"a"}"#).unwrap();
        assert_eq!(event.op(), "mfa");
        assert!(matches!(event, Event::Unknown { ref body, .. } if body["Identifier"] == "a"));
    }

    #[test]
    fn missing_op_is_an_error() {
        assert!(parse_event(r#"{"Identifier":"a"}"#).is_err());
    }
}
