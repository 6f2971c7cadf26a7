use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use bytes::Bytes;

use super::{BlobStore, BlobStoreError};
use crate::hash::Hash;

/// In-memory blob store keyed by BLAKE3 hash
#[derive(Debug, Clone, Default)]
pub struct MemoryBlobStore {
    inner: Arc<RwLock<HashMap<Hash, Bytes>>>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held
    pub fn len(&self) -> usize {
        self.inner.read().map(|blobs| blobs.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn poisoned(e: impl std::fmt::Display) -> BlobStoreError {
    BlobStoreError::Default(anyhow::anyhow!("memory blob store lock poisoned: {}", e))
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, data: Vec<u8>) -> Result<Hash, BlobStoreError> {
        let hash = Hash::of(&data);
        let mut blobs = self.inner.write().map_err(poisoned)?;
        blobs.entry(hash).or_insert_with(|| Bytes::from(data));
        Ok(hash)
    }

    async fn get(&self, hash: &Hash) -> Result<Bytes, BlobStoreError> {
        let blobs = self.inner.read().map_err(poisoned)?;
        blobs.get(hash).cloned().ok_or(BlobStoreError::NotFound(*hash))
    }

    async fn has(&self, hash: &Hash) -> Result<bool, BlobStoreError> {
        let blobs = self.inner.read().map_err(poisoned)?;
        Ok(blobs.contains_key(hash))
    }
}
