/**
 * File system configuration.
 *  Sharding parameters for new directories
 *  and listing defaults, loaded from TOML.
 */
pub mod config;
/**
 * Opaque resume tokens for directory listings.
 */
pub mod cursor;
/**
 * Directory objects and their deterministic
 *  binary encoding.
 */
pub mod dir;
/**
 * Path-level operations: put, get, delete,
 *  list and metadata over a tree of directory
 *  objects rooted at a registry pointer.
 */
pub mod fs;
pub mod hash;
/**
 * Mutable pointers by public key.
 */
pub mod registry;
/**
 * Hash-trie sharding for large directories.
 */
pub mod shard;
/**
 * Content-addressed blob storage.
 *  A small trait, an in-memory store and a
 *  light wrapper around iroh-blobs.
 */
pub mod store;

pub mod prelude {
    pub use crate::config::{FsConfig, ListingConfig};
    pub use crate::cursor::{Cursor, CursorError};
    pub use crate::dir::{
        BlobLocation, CodecError, DirLink, DirRef, Directory, Entry, EntryKind, FileRef,
    };
    pub use crate::fs::{FileSystem, FsError, ListEntry, ListOptions, Metadata};
    pub use crate::hash::Hash;
    pub use crate::registry::{MemoryRegistry, Registry, RegistryEntry};
    pub use crate::shard::ShardingConfig;
    pub use crate::store::{BlobStore, BlobsStore, MemoryBlobStore};
}
