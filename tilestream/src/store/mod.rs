//! Offline packaged tile store.
//!
//! A packaged store holds pre-rendered tile blobs keyed by
//! `(zoom_level, tile_column, tile_row)` with a top-left row origin, the
//! opposite of the bottom-left `z/x/y` scheme the rest of the pipeline
//! uses. Blobs are
//! stored text-safe: raw tile bytes are deflate-compressed and then base64
//! encoded. Reading a tile therefore flips the row, fetches one blob and
//! runs the two transforms in reverse.
//!
//! There is no caching and no retry here: every load or reload re-reads and
//! re-decodes. Failures surface as [`StoreError`] and reach listeners
//! through the same `tile.error` channel as dispatch failures.

mod file;
mod memory;

pub use file::FileStore;
pub use memory::MemoryStore;

use std::future::Future;
use std::io::Read;
use std::pin::Pin;
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use bytes::Bytes;
use flate2::read::{GzDecoder, ZlibDecoder};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use thiserror::Error;
use tracing::debug;

use crate::coord::{flip_row, TileCoord};

/// Errors that can occur while reading from an offline store.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No blob exists for the requested key.
    #[error("No tile at zoom {zoom}, column {column}, row {row}")]
    MissingTile { zoom: u8, column: u32, row: u32 },

    /// I/O fault while querying the store.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The blob could not be base64-decoded or decompressed.
    #[error("Blob decode error: {0}")]
    Decode(String),
}

/// Boxed future type for dyn-compatible async methods.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Read-only access to a packaged tile store.
///
/// Keys use the store's own top-left row origin; callers coming from
/// `z/x/y` space go through [`StoreReader`], which applies the flip. The
/// handle is shared across all tile reads of a source instance and must be
/// safe under concurrent outstanding reads for different tiles.
pub trait OfflineStore: Send + Sync {
    /// Fetch the blob stored for `(zoom, column, row)`, or `None` when the
    /// row is absent.
    fn get(&self, zoom: u8, column: u32, row: u32) -> BoxFuture<'_, Result<Option<Bytes>, StoreError>>;
}

/// Decode a stored blob to raw tile bytes.
///
/// Reverses the text-safe encoding (base64) and then decompresses. Both
/// gzip and zlib framing are accepted; packaged stores have shipped both.
pub fn decode_blob(blob: &[u8]) -> Result<Bytes, StoreError> {
    let compressed = BASE64
        .decode(blob)
        .map_err(|e| StoreError::Decode(format!("base64: {}", e)))?;

    let mut raw = Vec::new();
    if compressed.starts_with(&[0x1f, 0x8b]) {
        GzDecoder::new(compressed.as_slice())
            .read_to_end(&mut raw)
            .map_err(|e| StoreError::Decode(format!("gzip: {}", e)))?;
    } else {
        ZlibDecoder::new(compressed.as_slice())
            .read_to_end(&mut raw)
            .map_err(|e| StoreError::Decode(format!("deflate: {}", e)))?;
    }
    Ok(Bytes::from(raw))
}

/// Encode raw tile bytes into the store's blob framing (deflate + base64).
///
/// Inverse of [`decode_blob`]; used by fixture builders and tests.
pub fn encode_blob(data: &[u8]) -> Vec<u8> {
    use std::io::Write;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    // Writing to a Vec cannot fail.
    encoder.write_all(data).expect("deflate to memory");
    let compressed = encoder.finish().expect("deflate to memory");
    BASE64.encode(compressed).into_bytes()
}

/// Reads and decodes tiles from an offline store.
///
/// Translates `z/x/y` coordinates into the store's top-left row origin,
/// issues exactly one read per call and decodes the blob. Cloning shares
/// the underlying store handle.
#[derive(Clone)]
pub struct StoreReader {
    store: Arc<dyn OfflineStore>,
}

impl StoreReader {
    /// Create a reader over a shared store handle.
    pub fn new(store: Arc<dyn OfflineStore>) -> Self {
        Self { store }
    }

    /// Read and decode the tile at `coord`.
    ///
    /// A missing row is an error here: the caller asked for a tile the
    /// package was expected to contain.
    pub async fn read_tile(&self, coord: TileCoord) -> Result<Bytes, StoreError> {
        let row = flip_row(coord.z, coord.y);
        debug!(tile = %coord, store_row = row, "offline store read");

        let blob = self
            .store
            .get(coord.z, coord.x, row)
            .await?
            .ok_or(StoreError::MissingTile {
                zoom: coord.z,
                column: coord.x,
                row,
            })?;

        decode_blob(&blob)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_decode_blob_rejects_garbage_base64() {
        let err = decode_blob(b"!!not base64!!").unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn test_decode_blob_rejects_uncompressed_payload() {
        // Valid base64 of bytes that are neither gzip nor zlib.
        let blob = BASE64.encode(b"plain bytes").into_bytes();
        let err = decode_blob(&blob).unwrap_err();
        assert!(matches!(err, StoreError::Decode(_)));
    }

    #[test]
    fn test_decode_blob_accepts_gzip_framing() {
        use flate2::write::GzEncoder;
        use std::io::Write;

        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"gzip framed tile").unwrap();
        let blob = BASE64.encode(encoder.finish().unwrap()).into_bytes();

        assert_eq!(decode_blob(&blob).unwrap().as_ref(), b"gzip framed tile");
    }

    #[test]
    fn test_round_trip_empty_input() {
        assert_eq!(decode_blob(&encode_blob(b"")).unwrap().as_ref(), b"");
    }

    #[tokio::test]
    async fn test_read_tile_flips_row() {
        // Bottom-left-origin (5, 3, 10) lives at top-left-origin row 21.
        let mut store = MemoryStore::new();
        store.insert(5, 3, 21, encode_blob(b"tile 5/3/10"));

        let reader = StoreReader::new(Arc::new(store));
        let data = reader.read_tile(TileCoord::new(5, 3, 10)).await.unwrap();
        assert_eq!(data.as_ref(), b"tile 5/3/10");
    }

    #[tokio::test]
    async fn test_read_tile_missing_row() {
        let reader = StoreReader::new(Arc::new(MemoryStore::new()));
        let err = reader.read_tile(TileCoord::new(5, 3, 10)).await.unwrap_err();
        match err {
            StoreError::MissingTile { zoom, column, row } => {
                assert_eq!((zoom, column, row), (5, 3, 21));
            }
            other => panic!("expected MissingTile, got {other}"),
        }
    }

    proptest! {
        #[test]
        fn prop_decode_inverts_encode(data in proptest::collection::vec(any::<u8>(), 0..2048)) {
            let decoded = decode_blob(&encode_blob(&data)).unwrap();
            prop_assert_eq!(decoded.as_ref(), data.as_slice());
        }
    }
}
