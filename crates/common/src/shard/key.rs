use std::cmp::Ordering;

use crate::dir::{EntryKind, HashFunction};

/// Width of the trie key hash in bits
pub const HASH_BITS: u32 = 256;

/// The hashed identity of an entry in the trie.
///
/// Files and directories are separate namespaces, so the kind is
///  part of the key: `d:<name>` or `f:<name>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShardKey {
    pub kind: EntryKind,
    pub name: String,
    hash: [u8; 32],
}

impl ShardKey {
    pub fn new(kind: EntryKind, name: impl Into<String>, hash_function: HashFunction) -> Self {
        let name = name.into();
        let hash = match hash_function {
            HashFunction::Blake3 => *blake3::hash(&trie_key(kind, &name)).as_bytes(),
        };
        Self { kind, name, hash }
    }

    pub fn hash(&self) -> &[u8; 32] {
        &self.hash
    }

    pub fn trie_key(&self) -> Vec<u8> {
        trie_key(self.kind, &self.name)
    }

    /// Slot this key occupies at `depth`, or `None` once the hash is used up
    pub fn slot(&self, depth: u32, bits_per_level: u8) -> Option<usize> {
        slot_for(&self.hash, depth, bits_per_level)
    }

    /// Traversal order: by hash, then by trie key
    pub fn traversal_cmp(&self, other: &ShardKey) -> Ordering {
        self.hash
            .cmp(&other.hash)
            .then_with(|| self.trie_key().cmp(&other.trie_key()))
    }
}

fn trie_key(kind: EntryKind, name: &str) -> Vec<u8> {
    let prefix: &[u8] = match kind {
        EntryKind::Directory => b"d:",
        EntryKind::File => b"f:",
    };
    let mut key = Vec::with_capacity(prefix.len() + name.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(name.as_bytes());
    key
}

/// Take `bits_per_level` bits of `hash` for `depth`, most significant first.
///
/// Reading from the top of the hash makes ascending slot order at every
///  level the same as ascending hash order.
pub fn slot_for(hash: &[u8; 32], depth: u32, bits_per_level: u8) -> Option<usize> {
    let bits = u32::from(bits_per_level);
    let start = depth.checked_mul(bits)?;
    let end = start.checked_add(bits)?;
    if end > HASH_BITS {
        return None;
    }
    let mut slot = 0usize;
    for offset in start..end {
        let byte = hash[(offset / 8) as usize];
        let bit = (byte >> (7 - offset % 8)) & 1;
        slot = (slot << 1) | bit as usize;
    }
    Some(slot)
}
