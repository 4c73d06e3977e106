// ── Reactive identity streams ──
//
// Subscription types for consuming identity changes from the registry.

mod filter;

use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use futures_core::Stream;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::model::Identity;

pub use filter::IdentityFilter;

type Snapshot = Arc<Vec<Arc<Identity>>>;

/// A subscription to the identity set.
///
/// Provides both point-in-time snapshot access and reactive change
/// notification via [`changed`](Self::changed) or by converting to a `Stream`.
pub struct IdentityStream {
    current: Snapshot,
    receiver: watch::Receiver<Snapshot>,
}

impl IdentityStream {
    pub(crate) fn new(receiver: watch::Receiver<Snapshot>) -> Self {
        let current = receiver.borrow().clone();
        Self { current, receiver }
    }

    /// Get the snapshot captured at creation time (or at the last `changed`).
    pub fn current(&self) -> &Snapshot {
        &self.current
    }

    /// Get the latest snapshot (may have changed since creation).
    pub fn latest(&self) -> Snapshot {
        self.receiver.borrow().clone()
    }

    /// Wait for the next change, returning the new snapshot.
    /// Returns `None` once the registry has been dropped.
    pub async fn changed(&mut self) -> Option<Snapshot> {
        self.receiver.changed().await.ok()?;
        let snap = self.receiver.borrow_and_update().clone();
        self.current = snap.clone();
        Some(snap)
    }

    /// Identities in the latest snapshot that pass `filter`.
    pub fn filtered(&self, filter: &IdentityFilter) -> Vec<Arc<Identity>> {
        self.latest()
            .iter()
            .filter(|identity| filter.matches(identity))
            .cloned()
            .collect()
    }

    /// Convert into a `Stream` for use with `StreamExt` combinators.
    ///
    /// The first item is the current snapshot.
    pub fn into_stream(self) -> IdentityWatchStream {
        IdentityWatchStream {
            inner: WatchStream::new(self.receiver),
        }
    }
}

/// `Stream` adapter backed by a `watch::Receiver`.
pub struct IdentityWatchStream {
    inner: WatchStream<Snapshot>,
}

impl Stream for IdentityWatchStream {
    type Item = Snapshot;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner).poll_next(cx)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use futures_util::StreamExt;

    use crate::store::IdentityRegistry;

    use super::*;

    #[tokio::test]
    async fn changed_yields_new_snapshot() {
        let registry = IdentityRegistry::new();
        let mut stream = registry.subscribe();
        assert!(stream.current().is_empty());

        registry.register("a", true).unwrap();

        let snap = stream.changed().await.unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(stream.current().len(), 1);
    }

    #[tokio::test]
    async fn into_stream_starts_with_current_snapshot() {
        let registry = IdentityRegistry::new();
        registry.register("a", true).unwrap();

        let mut stream = registry.subscribe().into_stream();
        let first = stream.next().await.unwrap();
        assert_eq!(first[0].id, "a");
    }

    #[test]
    fn filtered_applies_predicate() {
        let registry = IdentityRegistry::new();
        registry.register("on", true).unwrap();
        registry.register("off", false).unwrap();

        let stream = registry.subscribe();
        let disabled = stream.filtered(&IdentityFilter::Disabled);
        assert_eq!(disabled.len(), 1);
        assert_eq!(disabled[0].id, "off");
    }
}
