use std::collections::BTreeMap;
use std::sync::Arc;

use crate::dir::{Entry, EntryKind, ShardRoot};
use crate::hash::Hash;
use crate::store::{put_verified, BlobStore};

use super::config::ShardingConfig;
use super::iter::{ShardIter, ShardPosition};
use super::key::ShardKey;
use super::node::{bucket_find, bucket_insert, HamtChild, HamtNode, ShardEntry};
use super::ShardError;

/// A hash trie of directory entries persisted in a blob store.
///
/// Nodes are immutable values. Every mutation loads the nodes on the
///  path to the affected bucket, rewrites them bottom-up and returns the
///  new root descriptor; the previous root stays valid.
#[derive(Clone, Debug)]
pub struct Hamt {
    store: Arc<dyn BlobStore>,
    config: ShardingConfig,
}

impl Hamt {
    pub fn new(store: Arc<dyn BlobStore>, config: ShardingConfig) -> Result<Self, ShardError> {
        config.validate()?;
        Ok(Self { store, config })
    }

    pub fn config(&self) -> &ShardingConfig {
        &self.config
    }

    pub fn key(&self, kind: EntryKind, name: &str) -> ShardKey {
        ShardKey::new(kind, name, self.config.hash_function)
    }

    pub async fn load_node(&self, cid: &Hash) -> Result<HamtNode, ShardError> {
        tracing::debug!("Hamt::load_node: loading trie node {}", cid);
        let data = self.store.get(cid).await?;
        HamtNode::decode(&data, &self.config)
    }

    async fn store_node(&self, node: &HamtNode) -> Result<Hash, ShardError> {
        let data = node.encode()?;
        Ok(put_verified(self.store.as_ref(), data).await?)
    }

    async fn store_pending(&self, pending: Vec<Vec<u8>>) -> Result<(), ShardError> {
        for data in pending {
            put_verified(self.store.as_ref(), data).await?;
        }
        Ok(())
    }

    /// Build an internal node over `entries` at `depth`.
    ///
    /// Slots holding more than a bucket's worth of entries become deeper
    ///  nodes; their encodings are appended to `pending` children first.
    ///  Returns the node and the deepest level reached.
    fn build_node(
        &self,
        entries: Vec<ShardEntry>,
        depth: u32,
        pending: &mut Vec<Vec<u8>>,
    ) -> Result<(HamtNode, u32), ShardError> {
        let mut groups: BTreeMap<usize, Vec<ShardEntry>> = BTreeMap::new();
        for entry in entries {
            let slot = entry
                .key
                .slot(depth, self.config.bits_per_level)
                .ok_or(ShardError::DepthExhausted(depth))?;
            groups.entry(slot).or_default().push(entry);
        }

        let mut node = HamtNode::new();
        let mut deepest = depth;
        let mut count = 0;
        for (slot, mut group) in groups {
            count += group.len() as u64;
            if group.len() <= self.config.bucket_capacity {
                group.sort_by(|a, b| a.key.traversal_cmp(&b.key));
                node.set_child(slot, HamtChild::Bucket(group));
            } else {
                let (child, child_depth) = self.build_node(group, depth + 1, pending)?;
                let (cid, data) = child.cid()?;
                pending.push(data);
                deepest = deepest.max(child_depth);
                node.set_child(slot, HamtChild::Node(cid));
            }
        }
        node.set_count(count);
        Ok((node, deepest))
    }

    /// Build and persist a trie holding `entries`
    pub async fn build(&self, entries: Vec<(String, Entry)>) -> Result<ShardRoot, ShardError> {
        let entries: Vec<ShardEntry> = entries
            .into_iter()
            .map(|(name, entry)| ShardEntry::new(name, entry, &self.config))
            .collect();
        let total_entries = entries.len() as u64;

        let mut pending = Vec::new();
        let (root, depth) = self.build_node(entries, 0, &mut pending)?;
        self.store_pending(pending).await?;
        let cid = self.store_node(&root).await?;

        tracing::debug!(
            "Hamt::build: built trie {} with {} entries, depth {}",
            cid,
            total_entries,
            depth
        );
        Ok(ShardRoot {
            cid,
            total_entries,
            depth,
        })
    }

    pub async fn get(
        &self,
        root: &ShardRoot,
        kind: EntryKind,
        name: &str,
    ) -> Result<Option<Entry>, ShardError> {
        let key = self.key(kind, name);
        let mut node = self.load_node(&root.cid).await?;
        let mut depth = 0;
        loop {
            let slot = key
                .slot(depth, self.config.bits_per_level)
                .ok_or(ShardError::DepthExhausted(depth))?;
            match node.child(slot) {
                None => return Ok(None),
                Some(HamtChild::Bucket(bucket)) => {
                    return Ok(bucket_find(bucket, &key).map(|i| bucket[i].entry.clone()))
                }
                Some(HamtChild::Node(cid)) => {
                    let cid = *cid;
                    node = self.load_node(&cid).await?;
                    depth += 1;
                }
            }
        }
    }

    /// Insert or replace an entry, returning the new root and the replaced entry
    pub async fn insert(
        &self,
        root: &ShardRoot,
        name: &str,
        entry: Entry,
    ) -> Result<(ShardRoot, Option<Entry>), ShardError> {
        let new = ShardEntry::new(name, entry, &self.config);
        let mut path: Vec<(HamtNode, usize)> = Vec::new();
        let mut pending = Vec::new();
        let mut node = self.load_node(&root.cid).await?;
        let mut depth = 0;

        let (replaced, reached) = loop {
            let slot = new
                .key
                .slot(depth, self.config.bits_per_level)
                .ok_or(ShardError::DepthExhausted(depth))?;
            match node.child(slot).cloned() {
                None => {
                    node.set_child(slot, HamtChild::Bucket(vec![new]));
                    break (None, depth);
                }
                Some(HamtChild::Bucket(mut bucket)) => {
                    if bucket_find(&bucket, &new.key).is_some()
                        || bucket.len() < self.config.bucket_capacity
                    {
                        let replaced = bucket_insert(&mut bucket, new);
                        node.set_child(slot, HamtChild::Bucket(bucket));
                        break (replaced, depth);
                    }
                    // full bucket: split into a deeper node
                    bucket.push(new);
                    let (child, child_depth) = self.build_node(bucket, depth + 1, &mut pending)?;
                    let (cid, data) = child.cid()?;
                    pending.push(data);
                    node.set_child(slot, HamtChild::Node(cid));
                    tracing::debug!(
                        "Hamt::insert: split bucket at depth {} slot {} into {}",
                        depth,
                        slot,
                        cid
                    );
                    break (None, child_depth);
                }
                Some(HamtChild::Node(cid)) => {
                    let child = self.load_node(&cid).await?;
                    path.push((node, slot));
                    node = child;
                    depth += 1;
                }
            }
        };

        let added = u64::from(replaced.is_none());
        node.set_count(node.count() + added);
        self.store_pending(pending).await?;
        let mut cid = self.store_node(&node).await?;
        for (mut parent, slot) in path.into_iter().rev() {
            parent.set_child(slot, HamtChild::Node(cid));
            parent.set_count(parent.count() + added);
            cid = self.store_node(&parent).await?;
        }

        Ok((
            ShardRoot {
                cid,
                total_entries: root.total_entries + added,
                depth: root.depth.max(reached),
            },
            replaced,
        ))
    }

    /// Remove an entry, returning the new root and the removed entry.
    ///
    /// Under-full buckets are left as they are; only nodes left with no
    ///  children at all are unlinked from their parent.
    pub async fn remove(
        &self,
        root: &ShardRoot,
        kind: EntryKind,
        name: &str,
    ) -> Result<(ShardRoot, Option<Entry>), ShardError> {
        let key = self.key(kind, name);
        let mut path: Vec<(HamtNode, usize)> = Vec::new();
        let mut node = self.load_node(&root.cid).await?;
        let mut depth = 0;

        let removed = loop {
            let slot = key
                .slot(depth, self.config.bits_per_level)
                .ok_or(ShardError::DepthExhausted(depth))?;
            match node.child(slot).cloned() {
                None => return Ok((*root, None)),
                Some(HamtChild::Bucket(mut bucket)) => {
                    let Some(index) = bucket_find(&bucket, &key) else {
                        return Ok((*root, None));
                    };
                    let removed = bucket.remove(index).entry;
                    if bucket.is_empty() {
                        node.remove_child(slot);
                    } else {
                        node.set_child(slot, HamtChild::Bucket(bucket));
                    }
                    break removed;
                }
                Some(HamtChild::Node(cid)) => {
                    let child = self.load_node(&cid).await?;
                    path.push((node, slot));
                    node = child;
                    depth += 1;
                }
            }
        };

        node.set_count(node.count().saturating_sub(1));
        let mut child = node;
        for (mut parent, slot) in path.into_iter().rev() {
            if child.is_empty() {
                parent.remove_child(slot);
            } else {
                let cid = self.store_node(&child).await?;
                parent.set_child(slot, HamtChild::Node(cid));
            }
            parent.set_count(parent.count().saturating_sub(1));
            child = parent;
        }
        let cid = self.store_node(&child).await?;

        Ok((
            ShardRoot {
                cid,
                total_entries: root.total_entries.saturating_sub(1),
                depth: root.depth,
            },
            Some(removed),
        ))
    }

    /// Traverse every entry from the start
    pub fn iter(&self, root: &ShardRoot) -> ShardIter {
        ShardIter::new(self.clone(), root.cid)
    }

    /// Traverse every entry ordered after `position`
    pub async fn iter_from(
        &self,
        root: &ShardRoot,
        position: &ShardPosition,
    ) -> Result<ShardIter, ShardError> {
        ShardIter::resume(self.clone(), root.cid, position).await
    }
}
