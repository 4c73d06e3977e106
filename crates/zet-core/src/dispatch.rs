// ── Event dispatcher ──
//
// Routes each engine event to the identity it addresses. Events never
// create or remove identities; events for unknown identities are dropped.

use std::sync::Arc;

use chrono::Utc;
use futures_util::StreamExt;
use futures_util::stream::BoxStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::engine::EngineEvent;
use crate::error::CoreError;
use crate::model::IdentityStatus;
use crate::store::IdentityRegistry;

/// Apply one event to the registry. Returns `true` if an identity changed.
pub fn apply_event(registry: &IdentityRegistry, event: EngineEvent) -> bool {
    let now = Utc::now();

    let updated = match event {
        EngineEvent::Context {
            identifier,
            name,
            controller,
            status,
        } => {
            let updated = registry.update(&identifier, |identity| {
                identity.display_name = name;
                identity.controller_address = controller;
                identity.status = IdentityStatus::from_engine(&status);
                identity.last_event = Some(now);
            });
            log_unknown(updated.is_some(), &identifier, "context");
            updated.is_some()
        }

        EngineEvent::Service {
            identifier,
            added,
            removed,
        } => {
            let updated = registry.update(&identifier, |identity| {
                identity.apply_service_delta(removed.iter().map(String::as_str), added);
                identity.last_event = Some(now);
            });
            log_unknown(updated.is_some(), &identifier, "service");
            updated.is_some()
        }

        EngineEvent::Api {
            identifier,
            controller,
        } => {
            debug!(identity = %identifier, ?controller, "controller API address changed");
            false
        }

        EngineEvent::Other { kind } => {
            debug!(kind = %kind, "ignoring unhandled engine event");
            false
        }
    };

    if updated {
        registry.record_event(now);
    }
    updated
}

fn log_unknown(found: bool, identifier: &str, kind: &str) {
    if !found {
        let err = CoreError::UnknownEventTarget {
            identifier: identifier.to_owned(),
        };
        info!(kind, "{err}; dropping event");
    }
}

/// Consume the engine event stream until it ends or `cancel` fires.
pub async fn event_loop(
    mut events: BoxStream<'static, EngineEvent>,
    registry: Arc<IdentityRegistry>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.next() => {
                let Some(event) = event else {
                    warn!("engine event stream ended");
                    break;
                };
                trace!(identity = ?event.identifier(), "engine event");
                apply_event(&registry, event);
            }
        }
    }
    debug!("event loop exiting");
}
