//! Directory-backed offline store.
//!
//! Lays packaged tiles out as `<root>/<zoom>/<column>/<row>.b64z`, one blob
//! per file in the store's text-safe framing. This is the on-disk form a
//! package unpacks to; reads go through `tokio::fs` so the calling task is
//! never blocked on disk.

use std::path::PathBuf;

use bytes::Bytes;

use super::{BoxFuture, OfflineStore, StoreError};

/// Offline store reading blobs from a directory tree.
#[derive(Debug, Clone)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    /// Open a store rooted at `root`. The directory is not scanned up
    /// front; missing rows are discovered per read.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn blob_path(&self, zoom: u8, column: u32, row: u32) -> PathBuf {
        self.root
            .join(zoom.to_string())
            .join(column.to_string())
            .join(format!("{row}.b64z"))
    }
}

impl OfflineStore for FileStore {
    fn get(&self, zoom: u8, column: u32, row: u32) -> BoxFuture<'_, Result<Option<Bytes>, StoreError>> {
        let path = self.blob_path(zoom, column, row);
        Box::pin(async move {
            match tokio::fs::read(&path).await {
                Ok(blob) => Ok(Some(Bytes::from(blob))),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(StoreError::Io(e)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::encode_blob;

    #[tokio::test]
    async fn test_get_reads_blob_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());

        let blob_dir = dir.path().join("7").join("42");
        std::fs::create_dir_all(&blob_dir).unwrap();
        std::fs::write(blob_dir.join("99.b64z"), encode_blob(b"packaged")).unwrap();

        let blob = store.get(7, 42, 99).await.unwrap().unwrap();
        assert_eq!(blob, Bytes::from(encode_blob(b"packaged")));
    }

    #[tokio::test]
    async fn test_get_missing_row_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        assert!(store.get(7, 42, 99).await.unwrap().is_none());
    }
}
