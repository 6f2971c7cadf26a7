use std::sync::Arc;

use crate::dir::{Directory, Entry, EntryKind, ShardRoot, ShardingMeta};
use crate::shard::{Hamt, ShardError, ShardingConfig};
use crate::store::BlobStore;

/// Entry access for one directory object, flat or sharded.
///
/// Flat directories hold their entries in `dirs` and `files`. Once a
///  directory holds more than its inline limit, every entry moves into a
///  trie and the header records the trie root; it stays sharded after
///  that, whatever its size.
#[derive(Clone, Debug)]
pub(crate) struct DirEntries {
    store: Arc<dyn BlobStore>,
    config: ShardingConfig,
}

impl DirEntries {
    pub fn new(store: Arc<dyn BlobStore>, config: ShardingConfig) -> Self {
        Self { store, config }
    }

    /// The trie addressing recorded in a header, falling back to ours
    fn config_for(&self, meta: Option<&ShardingMeta>) -> ShardingConfig {
        match meta {
            Some(meta) => ShardingConfig::from_params(meta.config, self.config.bucket_capacity),
            None => self.config,
        }
    }

    /// The trie behind a sharded directory, or `None` for a flat one
    pub fn trie(&self, dir: &Directory) -> Result<Option<(Hamt, ShardRoot)>, ShardError> {
        let Some(meta) = dir.sharding() else {
            return Ok(None);
        };
        let Some(root) = meta.root else {
            return Ok(None);
        };
        let hamt = Hamt::new(self.store.clone(), self.config_for(Some(meta)))?;
        Ok(Some((hamt, root)))
    }

    pub fn len(dir: &Directory) -> u64 {
        match dir.sharding().and_then(|meta| meta.root) {
            Some(root) => root.total_entries,
            None => dir.inline_len() as u64,
        }
    }

    pub async fn get(
        &self,
        dir: &Directory,
        kind: EntryKind,
        name: &str,
    ) -> Result<Option<Entry>, ShardError> {
        match self.trie(dir)? {
            Some((hamt, root)) => hamt.get(&root, kind, name).await,
            None => Ok(dir.get_inline(kind, name)),
        }
    }

    /// Insert or replace an entry, returning the replaced one
    pub async fn insert(
        &self,
        dir: &mut Directory,
        name: &str,
        entry: Entry,
    ) -> Result<Option<Entry>, ShardError> {
        if let Some((hamt, root)) = self.trie(dir)? {
            let (root, replaced) = hamt.insert(&root, name, entry).await?;
            set_root(dir, root);
            return Ok(replaced);
        }

        let replaced = dir.insert_inline(name.to_string(), entry);
        let limit = self.config_for(dir.sharding()).max_inline_entries;
        if dir.inline_len() as u64 > limit {
            self.activate(dir).await?;
        }
        Ok(replaced)
    }

    /// Remove an entry, returning it if it was present
    pub async fn remove(
        &self,
        dir: &mut Directory,
        kind: EntryKind,
        name: &str,
    ) -> Result<Option<Entry>, ShardError> {
        match self.trie(dir)? {
            Some((hamt, root)) => {
                let (root, removed) = hamt.remove(&root, kind, name).await?;
                if removed.is_some() {
                    set_root(dir, root);
                }
                Ok(removed)
            }
            None => Ok(dir.remove_inline(kind, name)),
        }
    }

    /// Move every inline entry into a freshly built trie
    async fn activate(&self, dir: &mut Directory) -> Result<(), ShardError> {
        let config = self.config_for(dir.sharding());
        let hamt = Hamt::new(self.store.clone(), config)?;
        let entries = dir.inline_entries();
        let count = entries.len();
        let root = hamt.build(entries).await?;

        dir.dirs.clear();
        dir.files.clear();
        dir.header.sharding = Some(ShardingMeta {
            config: config.params(),
            root: Some(root),
        });

        tracing::info!(
            "DirEntries::activate: sharded directory with {} entries into trie {} (depth {})",
            count,
            root.cid,
            root.depth
        );
        Ok(())
    }
}

fn set_root(dir: &mut Directory, root: ShardRoot) {
    if let Some(meta) = dir.header.sharding.as_mut() {
        meta.root = Some(root);
    }
}
