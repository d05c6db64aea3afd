//! Per-source lifecycle notifications.
//!
//! Each source owns its own [`EventSink`]; there is no global registry.
//! Emission is synchronous and runs listeners in subscription order, which
//! is what guarantees the documented `tile.load` before `tile.stats`
//! sequencing at the completion handler.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::SourceError;
use crate::tile::{BucketStats, Tile};

/// A lifecycle notification fired by a source.
#[derive(Clone)]
pub enum SourceEvent {
    /// A load or reload failed for a tile. No automatic retry follows;
    /// diagnostics and retry policy belong to the listener.
    TileError {
        tile: Arc<Tile>,
        error: Arc<SourceError>,
    },
    /// A tile finished loading and has data attached.
    TileLoad { tile: Arc<Tile> },
    /// Bucket statistics for a freshly parsed tile. Always follows the
    /// corresponding `TileLoad`.
    TileStats { stats: BucketStats },
    /// A tile entered the retention structure.
    TileAdd { tile: Arc<Tile> },
    /// A tile left the retention structure.
    TileRemove { tile: Arc<Tile> },
}

impl SourceEvent {
    /// Wire name of the event, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            SourceEvent::TileError { .. } => "tile.error",
            SourceEvent::TileLoad { .. } => "tile.load",
            SourceEvent::TileStats { .. } => "tile.stats",
            SourceEvent::TileAdd { .. } => "tile.add",
            SourceEvent::TileRemove { .. } => "tile.remove",
        }
    }
}

impl std::fmt::Debug for SourceEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceEvent").field("name", &self.name()).finish()
    }
}

/// Handle identifying a subscription, for later removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriberId(u64);

type Listener = Arc<dyn Fn(&SourceEvent) + Send + Sync>;

/// Subscribe/emit bus owned by a single source instance.
#[derive(Default)]
pub struct EventSink {
    listeners: RwLock<Vec<(SubscriberId, Listener)>>,
    next_id: AtomicU64,
}

impl EventSink {
    /// Create an empty sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a listener. Listeners run synchronously on the emitting
    /// task, in subscription order.
    pub fn subscribe<F>(&self, listener: F) -> SubscriberId
    where
        F: Fn(&SourceEvent) + Send + Sync + 'static,
    {
        let id = SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.listeners.write().push((id, Arc::new(listener)));
        id
    }

    /// Remove a listener. Returns whether it was still registered.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    /// Fire an event to all listeners.
    ///
    /// Delivery runs against a snapshot taken before the first listener is
    /// invoked, so listeners may subscribe or unsubscribe (including
    /// themselves) during delivery without blocking the emitting task. A
    /// listener removed mid-delivery still receives the in-flight event;
    /// one added mid-delivery first sees the next one.
    pub fn emit(&self, event: &SourceEvent) {
        tracing::trace!(event = event.name(), "emit");
        let listeners = self.listeners.read().clone();
        for (_, listener) in &listeners {
            listener(event);
        }
    }

    /// Number of registered listeners.
    pub fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

impl std::fmt::Debug for EventSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSink")
            .field("listeners", &self.listener_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coord::TileCoord;
    use crate::tile::TileId;
    use parking_lot::Mutex;

    fn tile() -> Arc<Tile> {
        Arc::new(Tile::new(TileCoord::new(1, 0, 0), TileId::allocate()))
    }

    #[test]
    fn test_listeners_run_in_subscription_order() {
        let sink = EventSink::new();
        let seen = Arc::new(Mutex::new(Vec::new()));

        for tag in ["first", "second", "third"] {
            let seen = seen.clone();
            sink.subscribe(move |_| seen.lock().push(tag));
        }

        sink.emit(&SourceEvent::TileAdd { tile: tile() });
        assert_eq!(*seen.lock(), vec!["first", "second", "third"]);
    }

    #[test]
    fn test_unsubscribe_stops_delivery() {
        let sink = EventSink::new();
        let count = Arc::new(Mutex::new(0usize));

        let count_cb = count.clone();
        let id = sink.subscribe(move |_| *count_cb.lock() += 1);

        sink.emit(&SourceEvent::TileAdd { tile: tile() });
        assert!(sink.unsubscribe(id));
        assert!(!sink.unsubscribe(id));
        sink.emit(&SourceEvent::TileRemove { tile: tile() });

        assert_eq!(*count.lock(), 1);
    }

    #[test]
    fn test_one_shot_listener_unsubscribes_itself_during_delivery() {
        // Error listeners that detach after the first notification must not
        // block the emitting task by re-entering the sink.
        let sink = Arc::new(EventSink::new());
        let fired = Arc::new(Mutex::new(0usize));
        let own_id = Arc::new(Mutex::new(None));

        let (sink_cb, fired_cb, own_id_cb) = (sink.clone(), fired.clone(), own_id.clone());
        let id = sink.subscribe(move |_| {
            *fired_cb.lock() += 1;
            if let Some(id) = own_id_cb.lock().take() {
                sink_cb.unsubscribe(id);
            }
        });
        *own_id.lock() = Some(id);

        sink.emit(&SourceEvent::TileAdd { tile: tile() });
        assert_eq!(sink.listener_count(), 0);

        sink.emit(&SourceEvent::TileAdd { tile: tile() });
        assert_eq!(*fired.lock(), 1);
    }

    #[test]
    fn test_listener_may_subscribe_during_delivery() {
        let sink = Arc::new(EventSink::new());
        let late_fired = Arc::new(Mutex::new(0usize));

        let (sink_cb, late_cb) = (sink.clone(), late_fired.clone());
        sink.subscribe(move |_| {
            let late = late_cb.clone();
            sink_cb.subscribe(move |_| *late.lock() += 1);
        });

        // The listener added mid-delivery only sees subsequent events.
        sink.emit(&SourceEvent::TileAdd { tile: tile() });
        assert_eq!(*late_fired.lock(), 0);
        assert_eq!(sink.listener_count(), 2);

        sink.emit(&SourceEvent::TileAdd { tile: tile() });
        assert_eq!(*late_fired.lock(), 1);
    }

    #[test]
    fn test_event_names() {
        assert_eq!(SourceEvent::TileLoad { tile: tile() }.name(), "tile.load");
        assert_eq!(
            SourceEvent::TileStats {
                stats: BucketStats::default()
            }
            .name(),
            "tile.stats"
        );
    }
}
