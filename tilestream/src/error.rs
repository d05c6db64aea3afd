//! Source-level error types.
//!
//! Construction errors are returned synchronously. Everything that happens
//! after a tile has been dispatched funnels through the source's completion
//! handler and is reported via a `tile.error` event instead of being thrown
//! across an async boundary.

use thiserror::Error;

use crate::store::StoreError;

/// Errors reported by a tile source.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Invalid source configuration. Fatal and synchronous: construction
    /// fails before any state is built.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A worker reported a failure while loading or reloading a tile.
    /// Recovered at tile granularity via `tile.error`; never retried
    /// automatically.
    #[error("Dispatch error: {0}")]
    Dispatch(String),

    /// The offline store failed to produce a decodable blob. Surfaced
    /// through the same `tile.error` channel as dispatch failures.
    #[error("Store read error: {0}")]
    StoreRead(#[from] StoreError),
}
