use std::future::IntoFuture;
use std::ops::Deref;
use std::path::Path;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use iroh_blobs::{
    api::blobs::{BlobStatus, Blobs},
    store::{fs::FsStore, mem::MemStore},
    BlobsProtocol,
};

use super::{BlobStore, BlobStoreError};
use crate::hash::Hash;

/// Blob store backed by a local iroh-blobs store.
///  iroh-blobs addresses content by its BLAKE3 root hash, which is
///  the same content id the directory layer uses.
#[derive(Clone, Debug)]
pub struct BlobsStore {
    pub inner: Arc<BlobsProtocol>,
}

impl Deref for BlobsStore {
    type Target = Arc<BlobsProtocol>;
    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl BlobsStore {
    /// Load a blob store persisted at the given path
    pub async fn fs(path: &Path) -> Result<Self, BlobStoreError> {
        tracing::debug!("BlobsStore::fs called with path: {:?}", path);
        let store = FsStore::load(path).await?;
        let blobs = BlobsProtocol::new(&store, None);
        Ok(Self {
            inner: Arc::new(blobs),
        })
    }

    /// Load a memory blobs store
    pub async fn memory() -> Result<Self, BlobStoreError> {
        let store = MemStore::new();
        let blobs = BlobsProtocol::new(&store, None);
        Ok(Self {
            inner: Arc::new(blobs),
        })
    }

    /// Get a handle to the underlying blobs client against
    ///  the store
    pub fn blobs(&self) -> &Blobs {
        self.inner.store().blobs()
    }
}

#[async_trait]
impl BlobStore for BlobsStore {
    async fn put(&self, data: Vec<u8>) -> Result<Hash, BlobStoreError> {
        let hash = self.blobs().add_bytes(data).into_future().await?.hash;
        Ok(hash.into())
    }

    async fn get(&self, hash: &Hash) -> Result<Bytes, BlobStoreError> {
        if !self.has(hash).await? {
            tracing::debug!("BlobsStore::get: hash {} not found", hash);
            return Err(BlobStoreError::NotFound(*hash));
        }
        let bytes = self.blobs().get_bytes(iroh_blobs::Hash::from(*hash)).await?;
        Ok(bytes)
    }

    async fn has(&self, hash: &Hash) -> Result<bool, BlobStoreError> {
        let stat = self
            .blobs()
            .status(iroh_blobs::Hash::from(*hash))
            .await
            .map_err(|err| BlobStoreError::Default(anyhow!(err)))?;
        Ok(matches!(stat, BlobStatus::Complete { .. }))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn test_fs_store_put_get() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let store = BlobsStore::fs(&temp_dir.path().join("blobs"))
            .await
            .unwrap();

        let hash = store.put(b"directory bytes".to_vec()).await.unwrap();
        assert_eq!(hash, Hash::of(b"directory bytes"));
        assert!(store.has(&hash).await.unwrap());

        let data = store.get(&hash).await.unwrap();
        assert_eq!(&data[..], b"directory bytes");
    }

    #[tokio::test]
    async fn test_memory_store_missing() {
        let store = BlobsStore::memory().await.unwrap();
        let missing = Hash::of(b"nope");
        assert!(!store.has(&missing).await.unwrap());
        assert!(matches!(
            store.get(&missing).await,
            Err(BlobStoreError::NotFound(_))
        ));
    }
}
