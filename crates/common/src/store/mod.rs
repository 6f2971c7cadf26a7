//! Content-addressed blob storage
//!
//! The directory layer only ever needs two things from a blob store:
//!  put some bytes and learn their BLAKE3 hash, and get bytes back by
//!  that hash. [`BlobStore`] is that contract; [`MemoryBlobStore`] and
//!  the iroh-blobs backed [`BlobsStore`] implement it.

mod blobs_store;
mod memory;

use async_trait::async_trait;
use bytes::Bytes;

use crate::hash::Hash;

pub use blobs_store::BlobsStore;
pub use memory::MemoryBlobStore;

#[derive(Debug, thiserror::Error)]
pub enum BlobStoreError {
    #[error("blobs store error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("blob store i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("blob not found: {0}")]
    NotFound(Hash),
    #[error("store returned content id {got} for bytes hashing to {expected}")]
    ContentIdMismatch { expected: Hash, got: Hash },
    #[error("export bao error: {0}")]
    ExportBao(#[from] iroh_blobs::api::ExportBaoError),
    #[error("request error: {0}")]
    Request(#[from] iroh_blobs::api::RequestError),
}

#[async_trait]
pub trait BlobStore: Send + Sync + std::fmt::Debug {
    /// Store bytes, returning their content id
    async fn put(&self, data: Vec<u8>) -> Result<Hash, BlobStoreError>;

    /// Fetch bytes by content id. Missing blobs are [`BlobStoreError::NotFound`].
    async fn get(&self, hash: &Hash) -> Result<Bytes, BlobStoreError>;

    /// Whether the blob is fully present
    async fn has(&self, hash: &Hash) -> Result<bool, BlobStoreError>;
}

/// Store bytes and check the store agrees on their BLAKE3 content id
pub async fn put_verified(store: &dyn BlobStore, data: Vec<u8>) -> Result<Hash, BlobStoreError> {
    let expected = Hash::of(&data);
    let got = store.put(data).await?;
    if got != expected {
        return Err(BlobStoreError::ContentIdMismatch { expected, got });
    }
    Ok(got)
}
