//! Path-level file system operations over directory objects
//!
//! [`FileSystem`] resolves a `/`-separated path into a chain of directory
//!  objects starting from a root registry pointer, applies one change to
//!  the last of them and writes the chain back: each rewritten directory
//!  gets a new content id, which is linked into its parent, up to the
//!  nearest directory published through the registry.

mod entries;
mod file_system;
mod list;
mod metadata;

pub use file_system::FileSystem;
pub use list::{ListEntry, ListOptions, ListStream};
pub use metadata::{DirMetadata, FileMetadata, Metadata};

use crate::config::ConfigError;
use crate::cursor::CursorError;
use crate::dir::CodecError;
use crate::registry::RegistryError;
use crate::shard::ShardError;
use crate::store::BlobStoreError;

#[derive(Debug, thiserror::Error)]
pub enum FsError {
    #[error("default error: {0}")]
    Default(#[from] anyhow::Error),
    #[error("invalid path: {0:?}")]
    InvalidPath(String),
    #[error("path already exists: {0}")]
    PathAlreadyExists(String),
    #[error("codec error: {0}")]
    Codec(#[from] CodecError),
    #[error("shard error: {0}")]
    Shard(#[from] ShardError),
    #[error("cursor error: {0}")]
    Cursor(#[from] CursorError),
    #[error("blob store error: {0}")]
    BlobStore(#[from] BlobStoreError),
    #[error("registry error: {0}")]
    Registry(#[from] RegistryError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Split a path into its names. Empty segments are ignored, so `""`
///  and `"/"` both name the root.
pub(crate) fn split_path(path: &str) -> Result<Vec<String>, FsError> {
    path.split('/')
        .filter(|part| !part.is_empty())
        .map(|part| match part {
            "." | ".." => Err(FsError::InvalidPath(path.to_string())),
            _ => Ok(part.to_string()),
        })
        .collect()
}
