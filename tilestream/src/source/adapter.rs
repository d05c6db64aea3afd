//! The vector tile source adapter.
//!
//! Single entry point for per-tile load/abort/unload. Loads are dispatched
//! either directly to the worker pool (remote sources) or through the
//! offline store's read-and-decode path; every outcome converges on
//! [`VectorSource::on_tile_result`], which mutates tile state and fires
//! lifecycle events.

use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::OnceCell;
use tracing::{debug, warn};

use crate::coord::overscaling;
use crate::dispatch::{DispatchCallback, Dispatcher, TileParams, WorkerMessage};
use crate::error::SourceError;
use crate::events::{EventSink, SourceEvent};
use crate::store::{BoxFuture, OfflineStore, StoreError, StoreReader};
use crate::tile::{Tile, TileData};

use super::config::{SourceConfig, SourceMetadata, ViewContext, ViewTransform};

/// The external tile retention structure ("pyramid").
///
/// Tracks which tiles are currently wanted for the view and owns tile
/// storage. The adapter only forwards to it.
pub trait TileRetention: Send + Sync {
    /// Whether every wanted tile is loaded.
    fn loaded(&self) -> bool;
    /// Recompute the wanted tile set for a new view.
    fn update(&self, transform: &ViewTransform);
    /// Re-request every retained tile.
    fn reload(&self);
}

/// Asynchronous metadata resolution seam (TileJSON fetch).
pub trait MetadataResolver: Send + Sync {
    /// Fetch and parse the source's metadata document.
    fn resolve(&self) -> BoxFuture<'static, Result<SourceMetadata, SourceError>>;
}

/// Factory for the source's offline store handle.
///
/// Invoked at most once per source instance, on the first offline load;
/// the resulting handle is shared read-only across all tile reads.
pub type StoreOpener =
    Box<dyn Fn() -> BoxFuture<'static, Result<Arc<dyn OfflineStore>, StoreError>> + Send + Sync>;

/// External collaborators handed to a source at construction.
pub struct SourceDeps {
    /// Channel to the worker pool, shared across sources.
    pub dispatcher: Arc<dyn Dispatcher>,
    /// Offline store factory, for sources served from a local package.
    pub store_opener: Option<StoreOpener>,
    /// Metadata resolution, for remote sources.
    pub metadata_resolver: Option<Arc<dyn MetadataResolver>>,
}

impl SourceDeps {
    /// Deps with only a dispatcher; no offline store, no metadata.
    pub fn new(dispatcher: Arc<dyn Dispatcher>) -> Self {
        Self {
            dispatcher,
            store_opener: None,
            metadata_resolver: None,
        }
    }
}

struct SourceInner {
    id: String,
    config: SourceConfig,
    /// Resolved zoom bounds and url templates; starts from the config and
    /// is replaced when metadata resolution completes.
    metadata: RwLock<SourceMetadata>,
    view: RwLock<ViewContext>,
    dispatcher: Arc<dyn Dispatcher>,
    retention: RwLock<Option<Arc<dyn TileRetention>>>,
    store_opener: Option<StoreOpener>,
    /// Lazily created on the first offline read, then shared across tiles
    /// for the lifetime of the source.
    store: OnceCell<Arc<dyn OfflineStore>>,
    events: EventSink,
}

/// A vector tile source.
///
/// Cheap to clone; clones share all state. Completion callbacks hold a
/// clone so that late worker responses find their way back to
/// [`on_tile_result`](VectorSource::on_tile_result).
#[derive(Clone)]
pub struct VectorSource {
    inner: Arc<SourceInner>,
}

impl VectorSource {
    /// Create a source.
    ///
    /// Validates the configuration synchronously: an invalid tile size
    /// fails here with [`SourceError::Configuration`] and builds nothing.
    /// When a metadata resolver is supplied, resolution is started in the
    /// background (this requires a tokio runtime) and the adapter serves
    /// the configured zoom bounds until it completes.
    pub fn new(
        id: impl Into<String>,
        config: SourceConfig,
        deps: SourceDeps,
    ) -> Result<Self, SourceError> {
        config.validate()?;

        let metadata = SourceMetadata {
            minzoom: config.minzoom,
            maxzoom: config.maxzoom,
            tiles: config.url.iter().cloned().collect(),
        };

        let source = Self {
            inner: Arc::new(SourceInner {
                id: id.into(),
                config,
                metadata: RwLock::new(metadata),
                view: RwLock::new(ViewContext::default()),
                dispatcher: deps.dispatcher,
                retention: RwLock::new(None),
                store_opener: deps.store_opener,
                store: OnceCell::new(),
                events: EventSink::new(),
            }),
        };

        if let Some(resolver) = deps.metadata_resolver {
            let background = source.clone();
            tokio::spawn(async move {
                match resolver.resolve().await {
                    Ok(metadata) => {
                        debug!(
                            source = %background.inner.id,
                            minzoom = metadata.minzoom,
                            maxzoom = metadata.maxzoom,
                            templates = metadata.tiles.len(),
                            "metadata resolved"
                        );
                        *background.inner.metadata.write() = metadata;
                    }
                    Err(e) => {
                        warn!(source = %background.inner.id, error = %e, "metadata resolution failed");
                    }
                }
            });
        }

        Ok(source)
    }

    /// The source id carried in every worker message.
    pub fn id(&self) -> &str {
        &self.inner.id
    }

    /// The source's static configuration.
    pub fn config(&self) -> &SourceConfig {
        &self.inner.config
    }

    /// Current maximum zoom (resolved metadata, or the configured bound).
    pub fn maxzoom(&self) -> u8 {
        self.inner.metadata.read().maxzoom
    }

    /// Current minimum zoom.
    pub fn minzoom(&self) -> u8 {
        self.inner.metadata.read().minzoom
    }

    /// The source's event sink; subscribe here for lifecycle events.
    pub fn events(&self) -> &EventSink {
        &self.inner.events
    }

    /// Bind view state used when building dispatch requests.
    pub fn attach(&self, view: ViewContext) {
        *self.inner.view.write() = view;
    }

    /// Bind the retention structure that owns tile storage.
    pub fn set_retention(&self, retention: Arc<dyn TileRetention>) {
        *self.inner.retention.write() = Some(retention);
    }

    /// Whether the retention structure reports all wanted tiles loaded.
    /// `false` while no retention structure is bound.
    pub fn is_loaded(&self) -> bool {
        self.inner
            .retention
            .read()
            .as_ref()
            .map(|r| r.loaded())
            .unwrap_or(false)
    }

    /// Forward a view change to the retention structure. No-op when absent.
    pub fn update(&self, transform: &ViewTransform) {
        if let Some(retention) = self.inner.retention.read().as_ref() {
            retention.update(transform);
        }
    }

    /// Ask the retention structure to re-request every tile. No-op when
    /// absent.
    pub fn reload(&self) {
        if let Some(retention) = self.inner.retention.read().as_ref() {
            retention.reload();
        }
    }

    /// Load or reload a tile.
    ///
    /// Reload path: a tile with worker affinity is re-parsed on that
    /// worker. First load: remote sources dispatch to any worker; offline
    /// sources read and decode the blob first and embed the bytes in the
    /// request. Either way the accepting worker becomes the tile's
    /// affinity, set exactly once.
    ///
    /// Callers must not issue overlapping load/reload requests for the
    /// same tile; at most one may be outstanding.
    pub async fn load_tile(&self, tile: &Arc<Tile>) {
        let mut params = self.tile_params(tile);

        if let Some(worker) = tile.worker() {
            debug!(source = %self.inner.id, tile = %tile.coord(), worker = worker.0, "reload tile");
            self.inner.dispatcher.send(
                WorkerMessage::ReloadTile(params),
                Some(worker),
                Some(self.completion(tile)),
            );
            return;
        }

        if self.has_remote_tiles() {
            debug!(source = %self.inner.id, tile = %tile.coord(), url = %params.url, "load tile");
            let worker = self.inner.dispatcher.send(
                WorkerMessage::LoadTile(params),
                None,
                Some(self.completion(tile)),
            );
            tile.bind_worker(worker);
            return;
        }

        // Offline path: read and decode before dispatching.
        match self.read_offline(tile.coord()).await {
            Ok(data) => {
                params.tile_data = Some(data);
                let worker = self.inner.dispatcher.send(
                    WorkerMessage::LoadTile(params),
                    None,
                    Some(self.completion(tile)),
                );
                tile.bind_worker(worker);
            }
            Err(e) => self.on_tile_result(tile, Err(e)),
        }
    }

    /// Single convergence point for every load/reload outcome.
    ///
    /// Aborted tiles drop the result silently. Errors fire `tile.error`
    /// with no automatic retry. On success the data is attached, a pending
    /// redo-placement pass runs synchronously, then `tile.load` and
    /// `tile.stats` fire in that order.
    pub fn on_tile_result(&self, tile: &Arc<Tile>, result: Result<TileData, SourceError>) {
        if tile.is_aborted() {
            debug!(source = %self.inner.id, tile = %tile.coord(), "dropping stale result for aborted tile");
            return;
        }

        match result {
            Err(error) => {
                warn!(source = %self.inner.id, tile = %tile.coord(), error = %error, "tile failed");
                tile.mark_errored();
                self.inner.events.emit(&SourceEvent::TileError {
                    tile: Arc::clone(tile),
                    error: Arc::new(error),
                });
            }
            Ok(data) => {
                let stats = data.stats.clone();
                tile.set_data(data);

                if tile.take_redo_pending() {
                    self.redo_tile_placement(tile);
                }

                self.inner.events.emit(&SourceEvent::TileLoad {
                    tile: Arc::clone(tile),
                });
                self.inner.events.emit(&SourceEvent::TileStats { stats });
            }
        }
    }

    /// Abort an in-flight tile.
    ///
    /// Sets the aborted flag (checked at the convergence point, so a late
    /// result is discarded) and sends a best-effort stop signal to the
    /// bound worker. Calling this before any dispatch is a caller contract
    /// violation; the flag is still set but no worker message goes out.
    pub fn abort_tile(&self, tile: &Arc<Tile>) {
        tile.mark_aborted();
        match tile.worker() {
            Some(worker) => {
                self.inner.dispatcher.send(
                    WorkerMessage::AbortTile {
                        uid: tile.uid(),
                        source: self.inner.id.clone(),
                    },
                    Some(worker),
                    None,
                );
            }
            None => {
                warn!(source = %self.inner.id, tile = %tile.coord(), "abort before dispatch");
            }
        }
    }

    /// Notify listeners that a tile entered the retention structure.
    pub fn add_tile(&self, tile: &Arc<Tile>) {
        self.inner.events.emit(&SourceEvent::TileAdd {
            tile: Arc::clone(tile),
        });
    }

    /// Notify listeners that a tile left the retention structure.
    pub fn remove_tile(&self, tile: &Arc<Tile>) {
        self.inner.events.emit(&SourceEvent::TileRemove {
            tile: Arc::clone(tile),
        });
    }

    /// Release a tile's resources.
    ///
    /// Drops the renderer-owned payload, tells the bound worker to drop
    /// its state and clears the tile's affinity.
    pub fn unload_tile(&self, tile: &Arc<Tile>) {
        tile.clear_data();
        if let Some(worker) = tile.worker() {
            self.inner.dispatcher.send(
                WorkerMessage::RemoveTile {
                    uid: tile.uid(),
                    source: self.inner.id.clone(),
                },
                Some(worker),
                None,
            );
        }
        tile.clear_worker();
    }

    /// Run a redo-placement pass over a tile, unconditionally.
    pub fn redo_tile_placement(&self, tile: &Arc<Tile>) {
        let view = *self.inner.view.read();
        tile.redo_placement(view.angle, view.pitch);
    }

    fn has_remote_tiles(&self) -> bool {
        !self.inner.metadata.read().tiles.is_empty()
    }

    fn url_template(&self) -> String {
        self.inner
            .metadata
            .read()
            .tiles
            .first()
            .cloned()
            .unwrap_or_else(|| "{z}/{x}/{y}".to_string())
    }

    /// Build the dispatch parameters for a tile. A fresh value per call;
    /// requests are never persisted.
    fn tile_params(&self, tile: &Arc<Tile>) -> TileParams {
        let coord = tile.coord();
        let overscaling = overscaling(coord.z, self.maxzoom());
        let view = *self.inner.view.read();

        TileParams {
            url: coord.url(&self.url_template()),
            uid: tile.uid(),
            coord,
            zoom: coord.z,
            tile_size: self.inner.config.tile_size.saturating_mul(overscaling),
            source: self.inner.id.clone(),
            overscaling,
            angle: view.angle,
            pitch: view.pitch,
            collision_debug: view.collision_debug,
            tile_data: None,
        }
    }

    fn completion(&self, tile: &Arc<Tile>) -> DispatchCallback {
        let source = self.clone();
        let tile = Arc::clone(tile);
        Box::new(move |result| source.on_tile_result(&tile, result))
    }

    async fn read_offline(&self, coord: crate::coord::TileCoord) -> Result<bytes::Bytes, SourceError> {
        let opener = self.inner.store_opener.as_ref().ok_or_else(|| {
            SourceError::Configuration(
                "source has neither a tile url template nor an offline store".to_string(),
            )
        })?;

        let store = self
            .inner
            .store
            .get_or_try_init(|| opener())
            .await
            .map_err(SourceError::StoreRead)?;

        let reader = StoreReader::new(Arc::clone(store));
        Ok(reader.read_tile(coord).await?)
    }
}

impl std::fmt::Debug for VectorSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorSource")
            .field("id", &self.inner.id)
            .field("maxzoom", &self.maxzoom())
            .field("offline", &self.inner.store_opener.is_some())
            .finish()
    }
}
