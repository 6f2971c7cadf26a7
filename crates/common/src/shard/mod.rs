/**
 * Hash-trie sharding for large directories.
 *  Once a directory outgrows its inline limit its entries move into a
 *  hash array mapped trie whose nodes are stored as blobs. Each
 *  internal node holds a bitmap of occupied slots, and each slot is
 *  either a small bucket of entries or the content id of a deeper node.
 *  The root descriptor lives in the directory header.
 */
mod config;
mod hamt;
mod iter;
mod key;
mod node;

pub use config::{ShardingConfig, MAX_BITS_PER_LEVEL};
pub use hamt::Hamt;
pub use iter::{ShardItem, ShardIter, ShardPosition};
pub use key::{slot_for, ShardKey, HASH_BITS};
pub use node::{HamtChild, HamtNode, ShardEntry};

use crate::dir::CodecError;
use crate::store::BlobStoreError;

#[derive(Debug, thiserror::Error)]
pub enum ShardError {
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),
    #[error("invalid sharding config: {0}")]
    InvalidConfig(String),
    #[error("hash bits exhausted at depth {0}")]
    DepthExhausted(u32),
    #[error("corrupt trie node: {0}")]
    Corrupt(String),
    #[error("invalid trie path: {0}")]
    InvalidPath(String),
}
