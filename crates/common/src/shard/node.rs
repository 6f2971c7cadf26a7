use ciborium::value::Value;

use crate::dir::{
    decode_value, encode_value, into_array, into_bytes, into_text, into_u64, into_u8, uint,
    CborValue, CodecError, DirRef, Entry, FileRef,
};
use crate::hash::Hash;

use super::config::ShardingConfig;
use super::key::ShardKey;
use super::ShardError;

const CHILD_BUCKET: u64 = 0;
const CHILD_NODE: u64 = 1;
const KIND_DIRECTORY: u8 = 0;
const KIND_FILE: u8 = 1;

/// A named entry stored in a trie bucket
#[derive(Debug, Clone, PartialEq)]
pub struct ShardEntry {
    pub key: ShardKey,
    pub entry: Entry,
}

impl ShardEntry {
    pub fn new(name: impl Into<String>, entry: Entry, config: &ShardingConfig) -> Self {
        let key = ShardKey::new(entry.kind(), name, config.hash_function);
        Self { key, entry }
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    fn to_cbor(&self) -> Value {
        let (kind, value) = match &self.entry {
            Entry::Directory(dir) => (KIND_DIRECTORY, dir.to_cbor()),
            Entry::File(file) => (KIND_FILE, file.to_cbor()),
        };
        Value::Array(vec![
            uint(u64::from(kind)),
            Value::Text(self.key.name.clone()),
            value,
        ])
    }

    fn from_cbor(value: Value, config: &ShardingConfig) -> Result<Self, CodecError> {
        let [kind, name, value]: [Value; 3] =
            into_array(value, "shard entry")?
                .try_into()
                .map_err(|_| CodecError::UnexpectedType {
                    field: "shard entry",
                    expected: "3-element array",
                })?;
        let name = into_text(name, "shard entry name")?;
        let entry = match into_u8(kind, "shard entry kind")? {
            KIND_DIRECTORY => Entry::Directory(DirRef::from_cbor(value)?),
            KIND_FILE => Entry::File(FileRef::from_cbor(value)?),
            other => {
                return Err(CodecError::UnknownField {
                    context: "shard entry kind",
                    key: other.to_string(),
                })
            }
        };
        Ok(ShardEntry::new(name, entry, config))
    }
}

/// Insert into a bucket kept in traversal order, replacing an equal key
pub(crate) fn bucket_insert(bucket: &mut Vec<ShardEntry>, entry: ShardEntry) -> Option<Entry> {
    match bucket.binary_search_by(|item| item.key.traversal_cmp(&entry.key)) {
        Ok(index) => Some(std::mem::replace(&mut bucket[index], entry).entry),
        Err(index) => {
            bucket.insert(index, entry);
            None
        }
    }
}

pub(crate) fn bucket_find(bucket: &[ShardEntry], key: &ShardKey) -> Option<usize> {
    bucket
        .binary_search_by(|item| item.key.traversal_cmp(key))
        .ok()
}

/// A slot of an internal node
#[derive(Debug, Clone, PartialEq)]
pub enum HamtChild {
    /// Entries held directly, in traversal order
    Bucket(Vec<ShardEntry>),
    /// Content id of a deeper internal node
    Node(Hash),
}

/// An internal trie node: a bitmap of occupied slots and one child
///  per set bit, in ascending slot order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct HamtNode {
    bitmap: u32,
    children: Vec<HamtChild>,
    /// Entries in this node's subtree
    count: u64,
}

impl HamtNode {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn bitmap(&self) -> u32 {
        self.bitmap
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub(crate) fn set_count(&mut self, count: u64) {
        self.count = count;
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    fn has_slot(&self, slot: usize) -> bool {
        slot < 32 && self.bitmap & (1u32 << slot) != 0
    }

    fn index_of(&self, slot: usize) -> usize {
        let below = if slot == 0 { 0 } else { self.bitmap & (u32::MAX >> (32 - slot)) };
        below.count_ones() as usize
    }

    pub fn child(&self, slot: usize) -> Option<&HamtChild> {
        if self.has_slot(slot) {
            self.children.get(self.index_of(slot))
        } else {
            None
        }
    }

    pub(crate) fn set_child(&mut self, slot: usize, child: HamtChild) {
        let index = self.index_of(slot);
        if self.has_slot(slot) {
            self.children[index] = child;
        } else {
            self.bitmap |= 1u32 << slot;
            self.children.insert(index, child);
        }
    }

    pub(crate) fn remove_child(&mut self, slot: usize) -> Option<HamtChild> {
        if !self.has_slot(slot) {
            return None;
        }
        let index = self.index_of(slot);
        self.bitmap &= !(1u32 << slot);
        Some(self.children.remove(index))
    }

    /// The lowest occupied slot at or after `from`
    pub fn next_occupied(&self, from: usize) -> Option<usize> {
        if from >= 32 {
            return None;
        }
        let masked = self.bitmap & (u32::MAX << from);
        if masked == 0 {
            None
        } else {
            Some(masked.trailing_zeros() as usize)
        }
    }

    /// Slots in ascending order with their children
    pub fn occupied(&self) -> impl Iterator<Item = (usize, &HamtChild)> + '_ {
        let mut from = 0;
        std::iter::from_fn(move || {
            let slot = self.next_occupied(from)?;
            from = slot + 1;
            self.child(slot).map(|child| (slot, child))
        })
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let children = self
            .children
            .iter()
            .map(|child| match child {
                HamtChild::Bucket(entries) => Value::Array(vec![
                    uint(CHILD_BUCKET),
                    Value::Array(entries.iter().map(ShardEntry::to_cbor).collect()),
                ]),
                HamtChild::Node(cid) => Value::Array(vec![
                    uint(CHILD_NODE),
                    Value::Bytes(cid.as_bytes().to_vec()),
                ]),
            })
            .collect();
        encode_value(&Value::Array(vec![
            uint(u64::from(self.bitmap)),
            Value::Array(children),
            uint(self.count),
        ]))
    }

    pub fn decode(data: &[u8], config: &ShardingConfig) -> Result<Self, ShardError> {
        let [bitmap, children, count]: [Value; 3] = into_array(decode_value(data)?, "trie node")?
            .try_into()
            .map_err(|_| CodecError::UnexpectedType {
                field: "trie node",
                expected: "3-element array",
            })?;

        let bitmap = u32::try_from(into_u64(bitmap, "trie bitmap")?)
            .map_err(|_| CodecError::IntegerOutOfRange("trie bitmap"))?;
        let count = into_u64(count, "trie count")?;

        let fanout = config.fanout();
        if fanout < 32 && bitmap >> fanout != 0 {
            return Err(ShardError::Corrupt(format!(
                "bitmap {bitmap:#x} has slots beyond fanout {fanout}"
            )));
        }

        let mut decoded = Vec::new();
        for child in into_array(children, "trie children")? {
            let [tag, payload]: [Value; 2] = into_array(child, "trie child")?
                .try_into()
                .map_err(|_| CodecError::UnexpectedType {
                    field: "trie child",
                    expected: "2-element array",
                })?;
            let child = match into_u64(tag, "trie child tag")? {
                CHILD_BUCKET => {
                    let entries = into_array(payload, "trie bucket")?
                        .into_iter()
                        .map(|value| ShardEntry::from_cbor(value, config))
                        .collect::<Result<Vec<_>, _>>()?;
                    if entries.is_empty() {
                        return Err(ShardError::Corrupt("empty bucket".to_string()));
                    }
                    HamtChild::Bucket(entries)
                }
                CHILD_NODE => {
                    let bytes = into_bytes(payload, "trie child cid")?;
                    let cid = Hash::try_from(bytes.as_slice())
                        .map_err(|_| CodecError::BadHashLength(bytes.len()))?;
                    HamtChild::Node(cid)
                }
                other => {
                    return Err(ShardError::Corrupt(format!("unknown trie child tag {other}")))
                }
            };
            decoded.push(child);
        }

        if decoded.len() != bitmap.count_ones() as usize {
            return Err(ShardError::Corrupt(format!(
                "bitmap has {} slots but node has {} children",
                bitmap.count_ones(),
                decoded.len()
            )));
        }

        Ok(Self {
            bitmap,
            children: decoded,
            count,
        })
    }

    pub fn cid(&self) -> Result<(Hash, Vec<u8>), CodecError> {
        let data = self.encode()?;
        Ok((Hash::of(&data), data))
    }
}
