use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Size of a BLAKE3 digest in bytes
pub const HASH_SIZE: usize = 32;

/// A BLAKE3 content identifier.
///
/// Every directory object and every trie node is addressed by the
///  hash of its canonical encoding.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
pub struct Hash([u8; HASH_SIZE]);

#[derive(Debug, thiserror::Error)]
pub enum HashError {
    #[error("invalid hash length: expected {HASH_SIZE}, got {0}")]
    InvalidLength(usize),
    #[error("invalid hash hex: {0}")]
    Hex(#[from] hex::FromHexError),
}

impl Hash {
    /// Hash a byte slice with BLAKE3
    pub fn of(data: &[u8]) -> Self {
        Hash(*blake3::hash(data).as_bytes())
    }

    pub const fn from_bytes(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; HASH_SIZE] {
        &self.0
    }

    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }
}

impl From<[u8; HASH_SIZE]> for Hash {
    fn from(bytes: [u8; HASH_SIZE]) -> Self {
        Hash(bytes)
    }
}

impl TryFrom<&[u8]> for Hash {
    type Error = HashError;
    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; HASH_SIZE] = bytes
            .try_into()
            .map_err(|_| HashError::InvalidLength(bytes.len()))?;
        Ok(Hash(bytes))
    }
}

impl From<Hash> for iroh_blobs::Hash {
    fn from(hash: Hash) -> Self {
        iroh_blobs::Hash::from_bytes(hash.0)
    }
}

impl From<iroh_blobs::Hash> for Hash {
    fn from(hash: iroh_blobs::Hash) -> Self {
        Hash(*hash.as_bytes())
    }
}

impl FromStr for Hash {
    type Err = HashError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.strip_prefix("0x").unwrap_or(s);
        let mut buff = [0; HASH_SIZE];
        hex::decode_to_slice(s, &mut buff)?;
        Ok(Hash(buff))
    }
}

impl fmt::Display for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Hash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Hash({})", self.to_hex())
    }
}
