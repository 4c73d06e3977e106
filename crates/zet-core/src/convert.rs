// ── Wire-to-domain conversions ──
//
// Bridges `zet_api` wire types and `zet_core` domain types in both
// directions: engine events into `EngineEvent`, engine commands into
// IPC requests.

use zet_api::{
    EnrollData, Event, IdentifierData, LoadIdentityData, OnOffData, Request, ServiceRecord,
    UpstreamDnsData,
};

use crate::engine::{EngineCommand, EngineEvent};
use crate::error::CoreError;
use crate::model::{Service, ServiceDns};

// ── Events ─────────────────────────────────────────────────────────

impl From<ServiceRecord> for Service {
    fn from(record: ServiceRecord) -> Self {
        Self {
            id: record.id,
            name: record.name,
            dns: record.dns.map(|dns| ServiceDns {
                hostname: dns.hostname,
                port: dns.port,
            }),
        }
    }
}

impl From<Event> for EngineEvent {
    fn from(event: Event) -> Self {
        match event {
            Event::Context(ctx) => Self::Context {
                identifier: ctx.identifier,
                name: ctx.name,
                controller: ctx.controller,
                status: ctx.status,
            },
            Event::Service(svc) => Self::Service {
                identifier: svc.identifier,
                added: svc.added_services.into_iter().map(Service::from).collect(),
                removed: svc.removed_services.into_iter().map(|s| s.id).collect(),
            },
            Event::Api(api) => Self::Api {
                identifier: api.identifier,
                controller: api.new_controller_address,
            },
            Event::Metrics(_) => Self::Other {
                kind: "metrics".into(),
            },
            Event::Unknown { op, .. } => Self::Other { kind: op },
        }
    }
}

// ── Commands ───────────────────────────────────────────────────────

impl TryFrom<EngineCommand> for Request {
    type Error = CoreError;

    fn try_from(command: EngineCommand) -> Result<Self, Self::Error> {
        Ok(match command {
            EngineCommand::LoadIdentity {
                id,
                config,
                disabled,
            } => Self::LoadIdentity(LoadIdentityData {
                identifier: id,
                config: serde_json::to_value(&config).map_err(|e| CoreError::InvalidConfig {
                    message: e.to_string(),
                })?,
                disabled,
            }),
            EngineCommand::Enroll { jwt, use_keychain } => {
                Self::Enroll(EnrollData { jwt, use_keychain })
            }
            EngineCommand::OnOff { id, on } => Self::IdentityOnOff(OnOffData {
                identifier: id,
                on_off: on,
            }),
            EngineCommand::RefreshIdentity { id } => {
                Self::RefreshIdentity(IdentifierData { identifier: id })
            }
            EngineCommand::Dump { id } => Self::Dump(IdentifierData { identifier: id }),
            EngineCommand::SetUpstreamDns { servers } => {
                Self::SetUpstreamDns(UpstreamDnsData { servers })
            }
            EngineCommand::RemoveIdentity { id } => {
                Self::RemoveIdentity(IdentifierData { identifier: id })
            }
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::{IdentityConfig, IdentityMaterial};
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use zet_api::ServiceEvent;

    #[test]
    fn service_event_keeps_removed_ids_only() {
        let event = EngineEvent::from(Event::Service(ServiceEvent {
            identifier: "a".into(),
            added_services: vec![ServiceRecord {
                id: "s1".into(),
                name: "web".into(),
                dns: Some(zet_api::ServiceDns {
                    hostname: "web.ziti".into(),
                    port: None,
                }),
            }],
            removed_services: vec![ServiceRecord {
                id: "s0".into(),
                name: "old".into(),
                dns: None,
            }],
        }));

        let EngineEvent::Service { added, removed, .. } = event else {
            panic!("expected service event");
        };
        assert_eq!(removed, vec!["s0".to_owned()]);
        assert_eq!(added[0].dns.as_ref().unwrap().hostname, "web.ziti");
    }

    #[test]
    fn unknown_op_becomes_other() {
        let event = EngineEvent::from(Event::Unknown {
            op: "mfa".into(),
            body: json!({}),
        });
        assert_eq!(event, EngineEvent::Other { kind: "mfa".into() });
        assert_eq!(event.identifier(), None);
    }

    #[test]
    fn load_identity_embeds_config_document() {
        let request = Request::try_from(EngineCommand::LoadIdentity {
            id: "ziti://ctrl:443/alice".into(),
            config: IdentityConfig {
                controller_url: "https://ctrl:443".into(),
                id: IdentityMaterial {
                    key: "keychain:ziti://ctrl:443/alice".into(),
                    cert: "CERT".into(),
                    ca: None,
                },
            },
            disabled: true,
        })
        .unwrap();

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "Command": "LoadIdentity",
                "Data": {
                    "Identifier": "ziti://ctrl:443/alice",
                    "Config": {
                        "ztAPI": "https://ctrl:443",
                        "id": { "key": "keychain:ziti://ctrl:443/alice", "cert": "CERT" }
                    },
                    "Disabled": true
                }
            })
        );
    }
}
