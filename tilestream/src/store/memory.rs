//! In-memory offline store.
//!
//! Backed by a plain `HashMap` built up front and shared read-only, which
//! matches how packaged stores behave at runtime: the package is immutable
//! once opened. Used for tests and for fixtures shipped in memory.

use std::collections::HashMap;

use bytes::Bytes;

use super::{BoxFuture, OfflineStore, StoreError};

/// Immutable-after-build in-memory tile store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    rows: HashMap<(u8, u32, u32), Bytes>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a blob under `(zoom, column, row)`. Rows use the store's
    /// top-left origin; no flipping happens here.
    pub fn insert(&mut self, zoom: u8, column: u32, row: u32, blob: impl Into<Bytes>) {
        self.rows.insert((zoom, column, row), blob.into());
    }

    /// Number of stored rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the store holds no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

impl OfflineStore for MemoryStore {
    fn get(&self, zoom: u8, column: u32, row: u32) -> BoxFuture<'_, Result<Option<Bytes>, StoreError>> {
        let blob = self.rows.get(&(zoom, column, row)).cloned();
        Box::pin(async move { Ok(blob) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_present_and_absent() {
        let mut store = MemoryStore::new();
        store.insert(3, 1, 2, Bytes::from_static(b"blob"));
        assert_eq!(store.len(), 1);

        let hit = store.get(3, 1, 2).await.unwrap();
        assert_eq!(hit.unwrap().as_ref(), b"blob");

        let miss = store.get(3, 1, 3).await.unwrap();
        assert!(miss.is_none());
    }

    #[test]
    fn test_empty_store() {
        let store = MemoryStore::new();
        assert!(store.is_empty());
    }
}
