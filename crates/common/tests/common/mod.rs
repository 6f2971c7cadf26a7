//! Shared test utilities for file system integration tests
#![allow(dead_code)]

use std::sync::{Arc, Once};

use common::config::FsConfig;
use common::dir::FileRef;
use common::fs::{FileSystem, ListEntry, ListOptions};
use common::hash::Hash;
use common::registry::MemoryRegistry;
use common::shard::ShardingConfig;
use common::store::{BlobsStore, MemoryBlobStore};
use futures::TryStreamExt;
use tempfile::TempDir;

pub const ROOT_KEY: [u8; 32] = [0x42; 32];

static TRACING: Once = Once::new();

/// Route logs to the test writer, filtered by `RUST_LOG`
pub fn init_tracing() {
    TRACING.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Set up a file system over an on-disk iroh blob store
pub async fn setup_test_env() -> (FileSystem, BlobsStore, MemoryRegistry, TempDir) {
    init_tracing();
    let temp_dir = TempDir::new().unwrap();
    let blob_path = temp_dir.path().join("blobs");

    let blobs = BlobsStore::fs(&blob_path).await.unwrap();
    let registry = MemoryRegistry::new();

    let fs = FileSystem::new(
        Arc::new(blobs.clone()),
        Arc::new(registry.clone()),
        ROOT_KEY,
        FsConfig::default(),
    )
    .unwrap();

    (fs, blobs, registry, temp_dir)
}

/// Set up an in-memory file system with the given config
pub fn setup_memory_env(config: FsConfig) -> (FileSystem, MemoryBlobStore, MemoryRegistry) {
    init_tracing();
    let blobs = MemoryBlobStore::new();
    let registry = MemoryRegistry::new();
    let fs = FileSystem::new(
        Arc::new(blobs.clone()),
        Arc::new(registry.clone()),
        ROOT_KEY,
        config,
    )
    .unwrap();
    (fs, blobs, registry)
}

/// A config that shards past `max_inline_entries` with a small trie
pub fn small_sharding(max_inline_entries: u64) -> FsConfig {
    FsConfig {
        sharding: ShardingConfig {
            bits_per_level: 2,
            max_inline_entries,
            bucket_capacity: 2,
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn file(seed: u64) -> FileRef {
    FileRef::new(Hash::of(&seed.to_le_bytes()), seed).with_timestamp(1_700_000_000 + seed, None)
}

/// Write `count` files named `file-<i>` under `dir`
pub async fn populate(fs: &FileSystem, dir: &str, count: u64) {
    for i in 0..count {
        fs.put_file(&format!("{dir}/file-{i}"), file(i)).await.unwrap();
    }
}

pub async fn list_all(fs: &FileSystem, path: &str, options: ListOptions) -> Vec<ListEntry> {
    fs.list(path, options)
        .await
        .unwrap()
        .try_collect()
        .await
        .unwrap()
}

/// Page through a directory `page_size` entries at a time
pub async fn list_paged(fs: &FileSystem, path: &str, page_size: usize) -> Vec<Vec<ListEntry>> {
    let mut pages = Vec::new();
    let mut cursor: Option<String> = None;
    loop {
        let options = ListOptions {
            cursor: cursor.clone(),
            limit: Some(page_size),
        };
        let page = list_all(fs, path, options).await;
        if page.is_empty() {
            break;
        }
        cursor = page.last().map(|entry| entry.cursor.clone());
        pages.push(page);
    }
    pages
}
