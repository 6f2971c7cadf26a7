use std::cmp::Ordering;
use std::collections::VecDeque;

use crate::dir::{Entry, EntryKind};
use crate::hash::Hash;

use super::hamt::Hamt;
use super::key::ShardKey;
use super::node::{HamtChild, HamtNode, ShardEntry};
use super::ShardError;

/// An entry produced by a trie traversal
#[derive(Debug, Clone, PartialEq)]
pub struct ShardItem {
    pub name: String,
    pub entry: Entry,
    /// Slot taken at each internal level, then the index within the bucket
    pub path: Vec<u32>,
}

/// Where a previous traversal stopped
#[derive(Debug, Clone, PartialEq)]
pub struct ShardPosition {
    pub kind: EntryKind,
    pub name: String,
    /// The item path recorded when the entry was produced, if any
    pub path: Vec<u32>,
}

struct Frame {
    node: HamtNode,
    next_slot: usize,
    path: Vec<u32>,
}

/// Depth-first traversal of a trie in ascending slot order.
///
/// Nodes are loaded lazily as the traversal reaches them.
pub struct ShardIter {
    hamt: Hamt,
    root: Option<Hash>,
    stack: Vec<Frame>,
    pending: VecDeque<ShardItem>,
}

impl std::fmt::Debug for ShardIter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardIter")
            .field("depth", &self.stack.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ShardIter {
    pub(crate) fn new(hamt: Hamt, root: Hash) -> Self {
        Self {
            hamt,
            root: Some(root),
            stack: Vec::new(),
            pending: VecDeque::new(),
        }
    }

    /// Re-enter the trie along the slots of `position` so the next item
    ///  is the first one ordered after it.
    ///
    /// Each recorded slot must match the slot the entry's hash selects
    ///  at that level, otherwise the position came from another
    ///  directory or another trie configuration.
    pub(crate) async fn resume(
        hamt: Hamt,
        root: Hash,
        position: &ShardPosition,
    ) -> Result<Self, ShardError> {
        let bits = hamt.config().bits_per_level;
        let key = hamt.key(position.kind, &position.name);

        if let Some((_, slots)) = position.path.split_last() {
            for (level, recorded) in slots.iter().enumerate() {
                let expected = key.slot(level as u32, bits).ok_or_else(|| {
                    ShardError::InvalidPath(format!("path is deeper than the hash allows ({level})"))
                })?;
                if *recorded as usize != expected {
                    return Err(ShardError::InvalidPath(format!(
                        "slot {recorded} at level {level} does not match {expected}"
                    )));
                }
            }
        }

        let mut iter = Self {
            hamt,
            root: None,
            stack: Vec::new(),
            pending: VecDeque::new(),
        };

        let mut node = iter.hamt.load_node(&root).await?;
        let mut path = Vec::new();
        let mut depth = 0;
        loop {
            let slot = key
                .slot(depth, bits)
                .ok_or(ShardError::DepthExhausted(depth))?;
            let child = node.child(slot).cloned();
            let mut child_path = path.clone();
            child_path.push(slot as u32);
            iter.stack.push(Frame {
                node,
                next_slot: slot + 1,
                path,
            });
            match child {
                None => break,
                Some(HamtChild::Bucket(entries)) => {
                    iter.queue_bucket(entries, child_path, Some(&key));
                    break;
                }
                Some(HamtChild::Node(cid)) => {
                    node = iter.hamt.load_node(&cid).await?;
                    path = child_path;
                    depth += 1;
                }
            }
        }

        tracing::debug!(
            "ShardIter::resume: resuming after {} {} at depth {}",
            position.kind,
            position.name,
            depth
        );
        Ok(iter)
    }

    fn queue_bucket(&mut self, entries: Vec<ShardEntry>, path: Vec<u32>, after: Option<&ShardKey>) {
        for (index, entry) in entries.into_iter().enumerate() {
            if let Some(after) = after {
                if entry.key.traversal_cmp(after) != Ordering::Greater {
                    continue;
                }
            }
            let mut item_path = path.clone();
            item_path.push(index as u32);
            self.pending.push_back(ShardItem {
                name: entry.key.name,
                entry: entry.entry,
                path: item_path,
            });
        }
    }

    pub async fn next(&mut self) -> Result<Option<ShardItem>, ShardError> {
        if let Some(root) = self.root.take() {
            let node = self.hamt.load_node(&root).await?;
            self.stack.push(Frame {
                node,
                next_slot: 0,
                path: Vec::new(),
            });
        }

        loop {
            if let Some(item) = self.pending.pop_front() {
                return Ok(Some(item));
            }
            let Some(frame) = self.stack.last_mut() else {
                return Ok(None);
            };
            let Some(slot) = frame.node.next_occupied(frame.next_slot) else {
                self.stack.pop();
                continue;
            };
            frame.next_slot = slot + 1;
            let mut path = frame.path.clone();
            path.push(slot as u32);
            match frame.node.child(slot).cloned() {
                Some(HamtChild::Bucket(entries)) => self.queue_bucket(entries, path, None),
                Some(HamtChild::Node(cid)) => {
                    let node = self.hamt.load_node(&cid).await?;
                    self.stack.push(Frame {
                        node,
                        next_slot: 0,
                        path,
                    });
                }
                None => {}
            }
        }
    }
}
