use std::collections::BTreeMap;

use ciborium::value::Value;
use ciborium_ll::Header;

use super::cbor::{
    into_map, into_text, text, write_head, write_value, CborValue, CodecError, Reader,
};
use super::dir_ref::DirRef;
use super::entry::{Entry, EntryKind};
use super::file_ref::FileRef;
use super::header::{DirHeader, ShardingMeta};

/// Magic tag identifying the directory format and version
pub const MAGIC: &str = "S5.pro";
/// Marker prefixed to every encoded directory object
pub const DIR_MARKER: [u8; 2] = [0x5f, 0x5d];
/// Smallest possible encoded body: `[magic, {}, {}, {}]`
const MIN_BODY_LEN: usize = 1 + 1 + MAGIC.len() + 3;

/// A directory object, the unit that gets hashed and addressed.
///
/// `dirs` and `files` are separate namespaces. When the header carries a
///  populated sharding root both maps are empty and the entries live in
///  the trie instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Directory {
    pub magic: String,
    pub header: DirHeader,
    pub dirs: BTreeMap<String, DirRef>,
    pub files: BTreeMap<String, FileRef>,
}

impl Default for Directory {
    fn default() -> Self {
        Self::new()
    }
}

impl Directory {
    pub fn new() -> Self {
        Self {
            magic: MAGIC.to_string(),
            header: DirHeader::default(),
            dirs: BTreeMap::new(),
            files: BTreeMap::new(),
        }
    }

    /// Encode to the canonical byte form that gets hashed
    pub fn serialize(&self) -> Result<Vec<u8>, CodecError> {
        // BTreeMap<String, _> iterates in byte-wise key order
        let dirs = Value::Map(
            self.dirs
                .iter()
                .map(|(name, dir)| (Value::Text(name.clone()), dir.to_cbor()))
                .collect(),
        );
        let files = Value::Map(
            self.files
                .iter()
                .map(|(name, file)| (Value::Text(name.clone()), file.to_cbor()))
                .collect(),
        );

        let mut out = DIR_MARKER.to_vec();
        write_head(&mut out, Header::Array(Some(4)))?;
        write_value(&mut out, &text(&self.magic))?;
        self.header.write(&mut out)?;
        write_value(&mut out, &dirs)?;
        write_value(&mut out, &files)?;
        Ok(out)
    }

    /// Decode a directory object. Input without the marker is accepted.
    pub fn deserialize(data: &[u8]) -> Result<Self, CodecError> {
        let body = data.strip_prefix(&DIR_MARKER[..]).unwrap_or(data);
        if body.len() < MIN_BODY_LEN {
            return Err(CodecError::TooShort(data.len()));
        }

        let mut reader = Reader::new(body);
        let mut remaining = reader.array("directory")?;
        if let Some(len) = remaining.filter(|len| *len != 4) {
            return Err(CodecError::TopLevelArity(len));
        }

        let mut dir = Directory::new();
        let mut count = 0;
        while reader.more(&mut remaining)? {
            match count {
                0 => {
                    let magic = into_text(reader.value()?, "magic")?;
                    if magic != MAGIC {
                        return Err(CodecError::BadMagic(magic));
                    }
                    dir.magic = magic;
                }
                1 => dir.header = DirHeader::read(&mut reader)?,
                2 => dir.dirs = decode_dirs(reader.value()?)?,
                3 => dir.files = decode_files(reader.value()?)?,
                _ => {
                    reader.value()?;
                }
            }
            count += 1;
        }
        if count != 4 {
            return Err(CodecError::TopLevelArity(count));
        }
        reader.finish()?;

        if dir.is_sharded() && dir.inline_len() > 0 {
            return Err(CodecError::InlineEntriesWhileSharded(dir.inline_len()));
        }
        Ok(dir)
    }

    pub fn sharding(&self) -> Option<&ShardingMeta> {
        self.header.sharding.as_ref()
    }

    /// Whether the entries live in a trie rather than inline
    pub fn is_sharded(&self) -> bool {
        self.header
            .sharding
            .as_ref()
            .map(|s| s.root.is_some())
            .unwrap_or(false)
    }

    /// Number of entries held inline
    pub fn inline_len(&self) -> usize {
        self.dirs.len() + self.files.len()
    }

    /// Look up an inline entry
    pub fn get_inline(&self, kind: EntryKind, name: &str) -> Option<Entry> {
        match kind {
            EntryKind::Directory => self.dirs.get(name).cloned().map(Entry::Directory),
            EntryKind::File => self.files.get(name).cloned().map(Entry::File),
        }
    }

    /// Insert an inline entry, returning the one it replaced
    pub fn insert_inline(&mut self, name: String, entry: Entry) -> Option<Entry> {
        match entry {
            Entry::Directory(dir) => self.dirs.insert(name, dir).map(Entry::Directory),
            Entry::File(file) => self.files.insert(name, file).map(Entry::File),
        }
    }

    pub fn remove_inline(&mut self, kind: EntryKind, name: &str) -> Option<Entry> {
        match kind {
            EntryKind::Directory => self.dirs.remove(name).map(Entry::Directory),
            EntryKind::File => self.files.remove(name).map(Entry::File),
        }
    }

    /// Inline entries in listing order: byte-wise by name, directories
    ///  before files on equal names
    pub fn inline_entries(&self) -> Vec<(String, Entry)> {
        let mut entries: Vec<(String, Entry)> = self
            .dirs
            .iter()
            .map(|(name, dir)| (name.clone(), Entry::Directory(dir.clone())))
            .chain(
                self.files
                    .iter()
                    .map(|(name, file)| (name.clone(), Entry::File(file.clone()))),
            )
            .collect();
        entries.sort_by(|a, b| {
            a.0.as_bytes()
                .cmp(b.0.as_bytes())
                .then(a.1.kind().cmp(&b.1.kind()))
        });
        entries
    }
}

fn decode_dirs(value: Value) -> Result<BTreeMap<String, DirRef>, CodecError> {
    let mut dirs = BTreeMap::new();
    for (name, value) in into_map(value, "dirs")? {
        let name = into_text(name, "directory name")?;
        let dir = DirRef::from_cbor(value)?;
        if dirs.insert(name.clone(), dir).is_some() {
            return Err(CodecError::DuplicateKey {
                context: "dirs",
                key: name,
            });
        }
    }
    Ok(dirs)
}

fn decode_files(value: Value) -> Result<BTreeMap<String, FileRef>, CodecError> {
    let mut files = BTreeMap::new();
    for (name, value) in into_map(value, "files")? {
        let name = into_text(name, "file name")?;
        let file = FileRef::from_cbor(value)?;
        if files.insert(name.clone(), file).is_some() {
            return Err(CodecError::DuplicateKey {
                context: "files",
                key: name,
            });
        }
    }
    Ok(files)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::dir::DirLink;
    use crate::hash::Hash;

    #[test]
    fn test_empty_directory() {
        let bytes = Directory::new().serialize().unwrap();
        assert_eq!(hex::encode(&bytes), "5f5d846653352e70726fa0a0a0");
        assert_eq!(Directory::deserialize(&bytes).unwrap(), Directory::new());
    }

    #[test]
    fn test_marker_optional_on_decode() {
        let bytes = Directory::new().serialize().unwrap();
        let decoded = Directory::deserialize(&bytes[2..]).unwrap();
        assert_eq!(decoded, Directory::new());
    }

    #[test]
    fn test_insertion_order_irrelevant() {
        let mut forward = Directory::new();
        let mut backward = Directory::new();
        for name in ["z", "a", "m"] {
            forward
                .files
                .insert(name.to_string(), FileRef::new(Hash::of(name.as_bytes()), 1));
        }
        for name in ["a", "m", "z"] {
            backward
                .files
                .insert(name.to_string(), FileRef::new(Hash::of(name.as_bytes()), 1));
        }
        assert_eq!(forward.serialize().unwrap(), backward.serialize().unwrap());
    }

    #[test]
    fn test_inline_entries_merge_order() {
        let mut dir = Directory::new();
        let link = DirLink::FixedHashBlake3(Hash::default());
        dir.files
            .insert("b".into(), FileRef::new(Hash::default(), 0));
        dir.files
            .insert("a".into(), FileRef::new(Hash::default(), 0));
        dir.dirs.insert("b".into(), DirRef::new(link));
        dir.dirs.insert("c".into(), DirRef::new(link));

        let order: Vec<_> = dir
            .inline_entries()
            .into_iter()
            .map(|(name, entry)| (name, entry.kind()))
            .collect();
        assert_eq!(
            order,
            vec![
                ("a".to_string(), EntryKind::File),
                ("b".to_string(), EntryKind::Directory),
                ("b".to_string(), EntryKind::File),
                ("c".to_string(), EntryKind::Directory),
            ]
        );
    }

    #[test]
    fn test_long_version_chain() {
        let mut file = FileRef::new(Hash::of(b"0"), 0);
        for i in 1..400u64 {
            file = FileRef::new(Hash::of(&i.to_le_bytes()), i).with_prev(file);
        }
        let mut dir = Directory::new();
        dir.files.insert("doc.txt".into(), file);

        let bytes = dir.serialize().unwrap();
        let decoded = Directory::deserialize(&bytes).unwrap();
        assert_eq!(decoded.files["doc.txt"].version_count(), 400);
        assert_eq!(decoded.serialize().unwrap(), bytes);
    }

    #[test]
    fn test_inline_entries_rejected_when_sharded() {
        let mut dir = Directory::new();
        dir.header.sharding = Some(ShardingMeta {
            root: Some(crate::dir::ShardRoot {
                cid: Hash::of(b"root"),
                total_entries: 1,
                depth: 0,
            }),
            ..Default::default()
        });
        let sharded = dir.serialize().unwrap();
        assert!(Directory::deserialize(&sharded).unwrap().is_sharded());

        dir.files
            .insert("stray".into(), FileRef::new(Hash::default(), 0));
        let bytes = dir.serialize().unwrap();
        assert!(matches!(
            Directory::deserialize(&bytes),
            Err(CodecError::InlineEntriesWhileSharded(1))
        ));

        // configured but not yet activated keeps entries inline
        dir.header.sharding = Some(ShardingMeta::default());
        assert_eq!(Directory::deserialize(&dir.serialize().unwrap()).unwrap(), dir);
    }

    #[test]
    fn test_too_short() {
        assert!(matches!(
            Directory::deserialize(&[0x5f, 0x5d, 0x84]),
            Err(CodecError::TooShort(3))
        ));
    }
}
