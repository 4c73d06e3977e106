// ── Identity registry ──
//
// Concurrent identity index with push-based change notification via
// `watch` channels. Every mutation rebuilds the ordered snapshot that
// subscribers receive.

use std::sync::{Arc, Mutex, PoisonError};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tokio::sync::watch;

use crate::error::CoreError;
use crate::model::Identity;
use crate::stream::IdentityStream;

type Snapshot = Arc<Vec<Arc<Identity>>>;

/// In-memory index of loaded identities, keyed by identity id.
///
/// Only the command path creates or removes entries; the event dispatcher
/// mutates fields of existing entries through [`update`](Self::update).
pub struct IdentityRegistry {
    by_id: DashMap<String, Arc<Identity>>,

    /// Ordered snapshot (by id), rebuilt on mutation.
    snapshot: watch::Sender<Snapshot>,

    /// Time of the last engine event applied to any identity.
    last_event: watch::Sender<Option<DateTime<Utc>>>,

    /// Serializes snapshot rebuilds so a stale rebuild never lands last.
    publish_lock: Mutex<()>,
}

impl IdentityRegistry {
    pub fn new() -> Self {
        let (snapshot, _) = watch::channel(Arc::new(Vec::new()));
        let (last_event, _) = watch::channel(None);

        Self {
            by_id: DashMap::new(),
            snapshot,
            last_event,
            publish_lock: Mutex::new(()),
        }
    }

    /// Create and index a new identity.
    ///
    /// Status starts as `Loading`, or `Disabled` when `enabled` is false.
    pub fn register(&self, id: &str, enabled: bool) -> Result<Arc<Identity>, CoreError> {
        let identity = match self.by_id.entry(id.to_owned()) {
            Entry::Occupied(_) => {
                return Err(CoreError::DuplicateIdentity { id: id.to_owned() });
            }
            Entry::Vacant(slot) => {
                let identity = Arc::new(Identity::new(id, enabled));
                slot.insert(Arc::clone(&identity));
                identity
            }
        };

        self.publish();
        Ok(identity)
    }

    pub fn lookup(&self, id: &str) -> Option<Arc<Identity>> {
        self.by_id.get(id).map(|r| Arc::clone(r.value()))
    }

    /// Remove an identity. Later updates for `id` are no-ops.
    pub fn remove(&self, id: &str) -> Option<Arc<Identity>> {
        let removed = self.by_id.remove(id).map(|(_, v)| v);
        if removed.is_some() {
            self.publish();
        }
        removed
    }

    /// Mutate one identity in place.
    ///
    /// The closure runs under the entry's shard lock, so every field it
    /// writes becomes visible in the same published snapshot. Returns the
    /// updated identity, or `None` if `id` is not registered.
    pub fn update<F>(&self, id: &str, mutate: F) -> Option<Arc<Identity>>
    where
        F: FnOnce(&mut Identity),
    {
        let updated = {
            let mut entry = self.by_id.get_mut(id)?;
            mutate(Arc::make_mut(entry.value_mut()));
            Arc::clone(entry.value())
        };

        self.publish();
        Some(updated)
    }

    /// Current snapshot, ordered by id (cheap `Arc` clone).
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> IdentityStream {
        IdentityStream::new(self.snapshot.subscribe())
    }

    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }

    // ── Event metadata ───────────────────────────────────────────────

    pub fn last_event(&self) -> Option<DateTime<Utc>> {
        *self.last_event.borrow()
    }

    pub(crate) fn record_event(&self, at: DateTime<Utc>) {
        self.last_event.send_modify(|last| *last = Some(at));
    }

    // ── Private helpers ──────────────────────────────────────────────

    fn publish(&self) {
        let _guard = self
            .publish_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let mut values: Vec<Arc<Identity>> =
            self.by_id.iter().map(|r| Arc::clone(r.value())).collect();
        values.sort_by(|a, b| a.id.cmp(&b.id));

        // `send_modify` updates unconditionally, even with zero receivers.
        self.snapshot.send_modify(|snap| *snap = Arc::new(values));
    }
}

impl Default for IdentityRegistry {
    fn default() -> Self {
        Self::new()
    }
}
