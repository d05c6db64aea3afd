//! Tilestream - vector tile dispatch and offline decoding pipeline.
//!
//! This library coordinates asynchronous tile loading across an external
//! worker pool. Tiles are acquired over one of two paths: remote sources
//! dispatch a URL to a worker for fetching and parsing; offline sources
//! read a blob from a local packaged store, decode it (base64, then
//! inflate) and hand the raw bytes to a worker inline. Both paths converge
//! on a single completion handler that drives the per-tile lifecycle
//! (load, error, abort, unload, redo-placement) and notifies listeners
//! through a per-source event sink.
//!
//! # Overview
//!
//! - [`source::VectorSource`] - the adapter owning configuration and the
//!   per-tile operations
//! - [`dispatch::Dispatcher`] - seam to the external worker pool
//! - [`store::OfflineStore`] / [`store::StoreReader`] - packaged tile
//!   store access and blob decoding
//! - [`tile::Tile`] - shared per-tile state (affinity, flags, payload)
//! - [`events::EventSink`] - per-source lifecycle notifications

pub mod coord;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod logging;
pub mod source;
pub mod store;
pub mod tile;

pub use error::SourceError;
pub use source::{SourceConfig, SourceDeps, VectorSource};
