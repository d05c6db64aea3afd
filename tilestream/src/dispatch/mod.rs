//! Worker-pool dispatch abstraction.
//!
//! The pool itself (thread/process management, scheduling) is an external
//! collaborator. This module defines the named-request protocol the source
//! adapter speaks to it: fire-and-forget messages with optional per-request
//! completion callbacks, and a worker hint that pins follow-up requests to
//! the worker already holding state for a tile.

use bytes::Bytes;

use crate::coord::TileCoord;
use crate::error::SourceError;
use crate::tile::{TileData, TileId};

/// Identifier of a worker inside the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkerId(pub usize);

/// Completion callback registered with a load or reload request.
///
/// Invoked exactly once with the worker's result. Abort and remove requests
/// carry no callback.
pub type DispatchCallback = Box<dyn FnOnce(Result<TileData, SourceError>) + Send + 'static>;

/// Parameters for a tile load or reload request.
///
/// Built fresh for every call and discarded once the completion callback
/// runs or the tile is aborted; never persisted.
#[derive(Debug, Clone)]
pub struct TileParams {
    /// Resource URL for the tile (template already expanded).
    pub url: String,
    /// Tile uid the response will be correlated with.
    pub uid: TileId,
    /// Tile coordinate.
    pub coord: TileCoord,
    /// Requested zoom level.
    pub zoom: u8,
    /// Effective tile size: the source's tile size times the overscaling
    /// factor.
    pub tile_size: u32,
    /// Id of the source issuing the request.
    pub source: String,
    /// Overscaling factor for this request (power of two >= 1).
    pub overscaling: u32,
    /// View angle at dispatch time.
    pub angle: f64,
    /// View pitch at dispatch time.
    pub pitch: f64,
    /// Whether collision debugging is enabled.
    pub collision_debug: bool,
    /// Raw tile bytes decoded from the offline store, when the request
    /// should not fetch over the network.
    pub tile_data: Option<Bytes>,
}

/// A named request sent to the worker pool.
#[derive(Debug, Clone)]
pub enum WorkerMessage {
    /// Parse a tile for the first time.
    LoadTile(TileParams),
    /// Re-parse a tile on the worker already holding its state.
    ReloadTile(TileParams),
    /// Advisory stop signal for an in-flight tile. Best effort: a result
    /// may still arrive and is discarded at the completion handler.
    AbortTile { uid: TileId, source: String },
    /// Drop worker-held state for a tile.
    RemoveTile { uid: TileId, source: String },
}

impl WorkerMessage {
    /// Protocol name of the request, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            WorkerMessage::LoadTile(_) => "load tile",
            WorkerMessage::ReloadTile(_) => "reload tile",
            WorkerMessage::AbortTile { .. } => "abort tile",
            WorkerMessage::RemoveTile { .. } => "remove tile",
        }
    }
}

/// Channel to the external worker pool.
///
/// Implementations route `msg` to a worker and invoke `done` (if supplied)
/// exactly once with the worker's response. When `worker` is `Some`, the
/// request MUST be delivered to that worker as long as the pool holds state
/// for the tile's uid; a pool that cannot honor the hint must fail the
/// request rather than silently rerouting it. When `worker` is `None`, the
/// pool picks any available worker and the return value identifies it.
pub trait Dispatcher: Send + Sync {
    /// Send a named request, optionally pinned to a worker, registering an
    /// optional completion callback. Returns the accepting worker.
    fn send(
        &self,
        msg: WorkerMessage,
        worker: Option<WorkerId>,
        done: Option<DispatchCallback>,
    ) -> WorkerId;
}
