//! Vector tile source: configuration, external seams and the adapter.
//!
//! A [`VectorSource`] is the single entry point for per-tile work. The
//! retention structure decides *which* tiles are wanted and calls
//! [`VectorSource::load_tile`] per tile; the adapter decides *how* each
//! tile is acquired (remote dispatch, or offline read-and-decode) and
//! funnels every outcome through one completion handler that mutates tile
//! state and fires [`crate::events::SourceEvent`]s.

mod adapter;
mod config;

pub use adapter::{MetadataResolver, SourceDeps, StoreOpener, TileRetention, VectorSource};
pub use config::{
    SourceConfig, SourceMetadata, ViewContext, ViewTransform, DEFAULT_MAXZOOM, DEFAULT_MINZOOM,
    REQUIRED_TILE_SIZE,
};
