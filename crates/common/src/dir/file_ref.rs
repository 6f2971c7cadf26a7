use std::path::Path;

use ciborium::value::Value;

use crate::hash::Hash;

use super::cbor::{
    into_array, into_bytes, into_hash, into_map, into_text, into_u32, into_u64, into_u8, text,
    uint, CborValue, CodecError,
};
use super::extra::Extra;

// integer keys of an encoded file reference
const KEY_HASH_TYPE: u64 = 1;
const KEY_HASH: u64 = 3;
const KEY_SIZE: u64 = 4;
const KEY_MEDIA_TYPE: u64 = 6;
const KEY_TIMESTAMP: u64 = 7;
const KEY_TIMESTAMP_NANOS: u64 = 8;
const KEY_LOCATIONS: u64 = 9;
const KEY_EXTRA: u64 = 22;
const KEY_PREV: u64 = 23;

/// Where the bytes of a blob can be fetched from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BlobLocation {
    /// The blob itself, inline
    Identity(Vec<u8>),
    Http(String),
    MultihashSha1(Vec<u8>),
    MultihashSha2_256(Vec<u8>),
    MultihashBlake3(Vec<u8>),
    MultihashMd5(Vec<u8>),
}

impl BlobLocation {
    pub const TAG_IDENTITY: u64 = 0x00;
    pub const TAG_HTTP: u64 = 0x01;
    pub const TAG_SHA1: u64 = 0x11;
    pub const TAG_SHA2_256: u64 = 0x12;
    pub const TAG_BLAKE3: u64 = 0x1e;
    pub const TAG_MD5: u64 = 0xd5;

    pub fn tag(&self) -> u64 {
        match self {
            BlobLocation::Identity(_) => Self::TAG_IDENTITY,
            BlobLocation::Http(_) => Self::TAG_HTTP,
            BlobLocation::MultihashSha1(_) => Self::TAG_SHA1,
            BlobLocation::MultihashSha2_256(_) => Self::TAG_SHA2_256,
            BlobLocation::MultihashBlake3(_) => Self::TAG_BLAKE3,
            BlobLocation::MultihashMd5(_) => Self::TAG_MD5,
        }
    }
}

impl CborValue for BlobLocation {
    fn to_cbor(&self) -> Value {
        let payload = match self {
            BlobLocation::Http(url) => Value::Text(url.clone()),
            BlobLocation::Identity(bytes)
            | BlobLocation::MultihashSha1(bytes)
            | BlobLocation::MultihashSha2_256(bytes)
            | BlobLocation::MultihashBlake3(bytes)
            | BlobLocation::MultihashMd5(bytes) => Value::Bytes(bytes.clone()),
        };
        Value::Array(vec![uint(self.tag()), payload])
    }

    fn from_cbor(value: Value) -> Result<Self, CodecError> {
        let items = into_array(value, "blob location")?;
        let [tag, payload]: [Value; 2] = items.try_into().map_err(|_| {
            CodecError::UnexpectedType {
                field: "blob location",
                expected: "2-element array",
            }
        })?;
        let tag = into_u64(tag, "blob location tag")?;
        let location = match tag {
            Self::TAG_IDENTITY => BlobLocation::Identity(into_bytes(payload, "inline blob")?),
            Self::TAG_HTTP => BlobLocation::Http(into_text(payload, "http url")?),
            Self::TAG_SHA1 => BlobLocation::MultihashSha1(into_bytes(payload, "sha1 multihash")?),
            Self::TAG_SHA2_256 => {
                BlobLocation::MultihashSha2_256(into_bytes(payload, "sha256 multihash")?)
            }
            Self::TAG_BLAKE3 => {
                BlobLocation::MultihashBlake3(into_bytes(payload, "blake3 multihash")?)
            }
            Self::TAG_MD5 => BlobLocation::MultihashMd5(into_bytes(payload, "md5 multihash")?),
            other => return Err(CodecError::UnknownLocationTag(other)),
        };
        Ok(location)
    }
}

/// A reference to an immutable file blob.
///
/// `prev` chains to the reference this one superseded; the chain is
///  owned and only ever grows at the head.
#[derive(Debug, Clone, PartialEq)]
pub struct FileRef {
    pub hash: Hash,
    pub size: u64,
    pub media_type: Option<String>,
    /// Modification time, seconds since the unix epoch
    pub timestamp: Option<u64>,
    pub timestamp_subsec_nanos: Option<u32>,
    pub locations: Option<Vec<BlobLocation>>,
    pub hash_type: Option<u8>,
    pub extra: Option<Extra>,
    pub prev: Option<Box<FileRef>>,
}

impl FileRef {
    pub fn new(hash: Hash, size: u64) -> Self {
        Self {
            hash,
            size,
            media_type: None,
            timestamp: None,
            timestamp_subsec_nanos: None,
            locations: None,
            hash_type: None,
            extra: None,
            prev: None,
        }
    }

    pub fn with_timestamp(mut self, seconds: u64, nanos: Option<u32>) -> Self {
        self.timestamp = Some(seconds);
        self.timestamp_subsec_nanos = nanos;
        self
    }

    pub fn with_media_type(mut self, media_type: impl Into<String>) -> Self {
        self.media_type = Some(media_type.into());
        self
    }

    /// Fill in the media type from the extension of `name`, if it is known
    pub fn with_media_type_from_name(mut self, name: &str) -> Self {
        if let Some(mime) = mime_guess::from_path(Path::new(name)).first() {
            self.media_type = Some(mime.essence_str().to_string());
        }
        self
    }

    pub fn with_location(mut self, location: BlobLocation) -> Self {
        self.locations.get_or_insert_with(Vec::new).push(location);
        self
    }

    pub fn with_prev(mut self, prev: FileRef) -> Self {
        self.prev = Some(Box::new(prev));
        self
    }

    /// Iterate this reference followed by every older version
    pub fn history(&self) -> impl Iterator<Item = &FileRef> {
        std::iter::successors(Some(self), |f| f.prev.as_deref())
    }

    /// Number of versions in the chain, including this one
    pub fn version_count(&self) -> usize {
        self.history().count()
    }
}

impl FileRef {
    /// Map entries for this version alone, with `prev` as the encoded
    ///  older chain if there is one
    fn fields(&self, prev: Option<Value>) -> Vec<(Value, Value)> {
        let mut map = Vec::with_capacity(9);
        if let Some(hash_type) = self.hash_type {
            map.push((uint(KEY_HASH_TYPE), uint(u64::from(hash_type))));
        }
        map.push((uint(KEY_HASH), Value::Bytes(self.hash.as_bytes().to_vec())));
        map.push((uint(KEY_SIZE), uint(self.size)));
        if let Some(media_type) = &self.media_type {
            map.push((uint(KEY_MEDIA_TYPE), text(media_type)));
        }
        if let Some(timestamp) = self.timestamp {
            map.push((uint(KEY_TIMESTAMP), uint(timestamp)));
        }
        if let Some(nanos) = self.timestamp_subsec_nanos {
            map.push((uint(KEY_TIMESTAMP_NANOS), uint(u64::from(nanos))));
        }
        if let Some(locations) = &self.locations {
            map.push((
                uint(KEY_LOCATIONS),
                Value::Array(locations.iter().map(CborValue::to_cbor).collect()),
            ));
        }
        if let Some(extra) = &self.extra {
            map.push((uint(KEY_EXTRA), extra.to_cbor()));
        }
        if let Some(prev) = prev {
            map.push((uint(KEY_PREV), prev));
        }
        map
    }

    /// Decode one version, handing back its still encoded `prev`
    fn from_fields(value: Value) -> Result<(Self, Option<Value>), CodecError> {
        let mut hash = None;
        let mut size = None;
        let mut prev = None;
        let mut file = FileRef::new(Hash::default(), 0);
        let mut seen = Vec::new();

        for (key, value) in into_map(value, "file reference")? {
            let key = into_u64(key, "file reference key")?;
            if seen.contains(&key) {
                return Err(CodecError::DuplicateKey {
                    context: "file reference",
                    key: key.to_string(),
                });
            }
            seen.push(key);
            match key {
                KEY_HASH_TYPE => file.hash_type = Some(into_u8(value, "hash type")?),
                KEY_HASH => hash = Some(into_hash(value, "file hash")?),
                KEY_SIZE => size = Some(into_u64(value, "file size")?),
                KEY_MEDIA_TYPE => file.media_type = Some(into_text(value, "media type")?),
                KEY_TIMESTAMP => file.timestamp = Some(into_u64(value, "timestamp")?),
                KEY_TIMESTAMP_NANOS => {
                    file.timestamp_subsec_nanos = Some(into_u32(value, "timestamp nanos")?)
                }
                KEY_LOCATIONS => {
                    file.locations = Some(
                        into_array(value, "locations")?
                            .into_iter()
                            .map(BlobLocation::from_cbor)
                            .collect::<Result<_, _>>()?,
                    )
                }
                KEY_EXTRA => file.extra = Some(Extra::from_cbor(value)?),
                KEY_PREV => prev = Some(value),
                other => {
                    return Err(CodecError::UnknownField {
                        context: "file reference",
                        key: other.to_string(),
                    })
                }
            }
        }

        file.hash = hash.ok_or(CodecError::MissingField("file hash"))?;
        file.size = size.ok_or(CodecError::MissingField("file size"))?;
        Ok((file, prev))
    }
}

// The version chain is walked in loops, not by recursion, so its
// length is not bounded by the call stack.
impl CborValue for FileRef {
    fn to_cbor(&self) -> Value {
        let older: Vec<&FileRef> = self.history().skip(1).collect();
        let prev = older
            .into_iter()
            .rev()
            .fold(None, |prev, file| Some(Value::Map(file.fields(prev))));
        Value::Map(self.fields(prev))
    }

    fn from_cbor(value: Value) -> Result<Self, CodecError> {
        let (mut head, mut next) = Self::from_fields(value)?;
        let mut older = Vec::new();
        while let Some(value) = next.take() {
            let (file, prev) = Self::from_fields(value)?;
            older.push(file);
            next = prev;
        }

        let mut chain: Option<Box<FileRef>> = None;
        while let Some(mut file) = older.pop() {
            file.prev = chain;
            chain = Some(Box::new(file));
        }
        head.prev = chain;
        Ok(head)
    }
}
