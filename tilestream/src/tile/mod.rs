//! Per-tile lifecycle state.
//!
//! A [`Tile`] is owned by the external retention structure and shared with
//! this crate as an `Arc`. The source adapter mutates the aborted and
//! redo-pending flags, the worker affinity and the payload; it never owns
//! tile storage. All mutable state is behind atomics or a mutex so that a
//! completion callback arriving from the worker pool can touch the same
//! tile the retention structure holds.
//!
//! # State machine
//!
//! ```text
//! Unrequested ──► Dispatched (affinity set) ──► Loaded
//!                      │                          │
//!                      ├──────────► Errored       │ reload()
//!                      │                          ▼
//!                      └──────────► Aborted ◄── Dispatched
//! ```
//!
//! `Aborted` is terminal: late results for an aborted tile are discarded at
//! the completion handler. `Errored` has no automatic recovery transition.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::Mutex;

use crate::coord::TileCoord;
use crate::dispatch::WorkerId;

/// Unique identifier for a tile, assigned by the retention structure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileId(pub u64);

impl TileId {
    /// Allocate a fresh process-unique id.
    pub fn allocate() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        Self(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// Per-bucket statistics attached to a parsed tile by the worker.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BucketStats {
    /// Number of buckets produced for the tile.
    pub buckets: usize,
    /// Total features across all buckets.
    pub features: usize,
    /// Parsed payload size in bytes.
    pub bytes: usize,
}

/// Parsed tile data returned from a worker.
///
/// The payload is opaque to this crate; geometry decoding happens in the
/// worker and rendering elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TileData {
    /// Opaque parsed tile payload.
    pub payload: Bytes,
    /// Bucket statistics reported alongside the payload.
    pub stats: BucketStats,
}

/// Lifecycle state of a tile, as observed by the source adapter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TileState {
    /// No dispatch has happened yet.
    Unrequested,
    /// A load or reload is in flight; worker affinity is set.
    Dispatched,
    /// Parsed data is attached.
    Loaded,
    /// A worker reported a failure; no automatic recovery.
    Errored,
    /// Aborted by the retention structure; terminal.
    Aborted,
}

/// A single tile tracked by the loading pipeline.
pub struct Tile {
    uid: TileId,
    coord: TileCoord,
    /// Worker bound to this tile after the first successful dispatch,
    /// reused for reloads until unload.
    worker: Mutex<Option<WorkerId>>,
    aborted: AtomicBool,
    errored: AtomicBool,
    redo_pending: AtomicBool,
    payload: Mutex<Option<TileData>>,
    /// Bumped each time a placement pass runs over this tile.
    placement_generation: AtomicU64,
}

impl Tile {
    /// Create a tile in the `Unrequested` state.
    pub fn new(coord: TileCoord, uid: TileId) -> Self {
        Self {
            uid,
            coord,
            worker: Mutex::new(None),
            aborted: AtomicBool::new(false),
            errored: AtomicBool::new(false),
            redo_pending: AtomicBool::new(false),
            payload: Mutex::new(None),
            placement_generation: AtomicU64::new(0),
        }
    }

    /// The tile's unique id.
    pub fn uid(&self) -> TileId {
        self.uid
    }

    /// The tile's coordinate.
    pub fn coord(&self) -> TileCoord {
        self.coord
    }

    /// The worker bound to this tile, if any dispatch has completed.
    pub fn worker(&self) -> Option<WorkerId> {
        *self.worker.lock()
    }

    /// Bind the tile to a worker. Affinity is set exactly once per tile
    /// lifetime; a second call is ignored and returns `false`.
    pub fn bind_worker(&self, worker: WorkerId) -> bool {
        let mut slot = self.worker.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(worker);
        true
    }

    /// Clear worker affinity. Called on unload, after which the tile may be
    /// dispatched to any worker again.
    pub fn clear_worker(&self) {
        *self.worker.lock() = None;
    }

    /// Whether the tile has been aborted.
    pub fn is_aborted(&self) -> bool {
        self.aborted.load(Ordering::Acquire)
    }

    /// Mark the tile aborted. Late results will be discarded.
    pub fn mark_aborted(&self) {
        self.aborted.store(true, Ordering::Release);
    }

    /// Mark the tile errored.
    pub fn mark_errored(&self) {
        self.errored.store(true, Ordering::Release);
    }

    /// Whether a redo-placement pass is pending for this tile.
    pub fn redo_pending(&self) -> bool {
        self.redo_pending.load(Ordering::Acquire)
    }

    /// Request a redo-placement pass on the next successful load.
    pub fn set_redo_pending(&self) {
        self.redo_pending.store(true, Ordering::Release);
    }

    /// Clear the redo-pending flag, returning whether it was set.
    pub fn take_redo_pending(&self) -> bool {
        self.redo_pending.swap(false, Ordering::AcqRel)
    }

    /// Attach parsed data to the tile.
    pub fn set_data(&self, data: TileData) {
        *self.payload.lock() = Some(data);
        self.errored.store(false, Ordering::Release);
    }

    /// Read the attached data, if any.
    pub fn data(&self) -> Option<TileData> {
        self.payload.lock().clone()
    }

    /// Drop the attached data. Called on unload; renderer-owned resources
    /// are released by the caller.
    pub fn clear_data(&self) {
        *self.payload.lock() = None;
    }

    /// Run a placement pass over this tile under the given view.
    ///
    /// Placement math itself lives with the renderer; this records that a
    /// pass happened and under which view parameters.
    pub fn redo_placement(&self, angle: f64, pitch: f64) {
        let generation = self.placement_generation.fetch_add(1, Ordering::AcqRel) + 1;
        tracing::debug!(
            tile = %self.coord,
            angle,
            pitch,
            generation,
            "placement pass"
        );
    }

    /// How many placement passes have run over this tile.
    pub fn placement_generation(&self) -> u64 {
        self.placement_generation.load(Ordering::Acquire)
    }

    /// The tile's current lifecycle state.
    pub fn state(&self) -> TileState {
        if self.is_aborted() {
            TileState::Aborted
        } else if self.errored.load(Ordering::Acquire) {
            TileState::Errored
        } else if self.payload.lock().is_some() {
            TileState::Loaded
        } else if self.worker.lock().is_some() {
            TileState::Dispatched
        } else {
            TileState::Unrequested
        }
    }
}

impl std::fmt::Debug for Tile {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Tile")
            .field("uid", &self.uid)
            .field("coord", &self.coord)
            .field("state", &self.state())
            .finish()
    }
}
