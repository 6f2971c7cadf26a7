use async_trait::async_trait;

use crate::hash::Hash;

/// Size of an ed25519 public key in bytes
pub const PUBLIC_KEY_SIZE: usize = 32;

/// The current value of a registry pointer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistryEntry {
    pub public_key: [u8; PUBLIC_KEY_SIZE],
    pub revision: u64,
    /// Content id of the object the pointer refers to
    pub hash: Hash,
}

impl RegistryEntry {
    pub fn new(public_key: [u8; PUBLIC_KEY_SIZE], revision: u64, hash: Hash) -> Self {
        Self {
            public_key,
            revision,
            hash,
        }
    }

    /// The entry that supersedes this one with new content
    pub fn next(&self, hash: Hash) -> Self {
        Self {
            public_key: self.public_key,
            revision: self.revision + 1,
            hash,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("registry error: {0}")]
    Default(#[from] anyhow::Error),
    /// A set was attempted with a revision not newer than the current one
    #[error("stale revision {attempted} for {key}, current is {current}")]
    StaleRevision {
        key: String,
        attempted: u64,
        current: u64,
    },
}

#[async_trait]
pub trait Registry: Send + Sync + std::fmt::Debug {
    /// Get the current entry for a public key, if any was ever set
    async fn get(
        &self,
        public_key: &[u8; PUBLIC_KEY_SIZE],
    ) -> Result<Option<RegistryEntry>, RegistryError>;

    /// Publish a new entry
    ///
    /// Should fail with `RegistryError::StaleRevision` when the entry's
    ///  revision is not greater than the stored one. Concurrent writers
    ///  race; the last accepted revision wins.
    async fn set(&self, entry: RegistryEntry) -> Result<(), RegistryError>;
}
