use ciborium::value::Value;

use crate::hash::{Hash, HASH_SIZE};

use super::cbor::{into_bytes, into_map, into_u32, into_u64, uint, CborValue, CodecError};
use super::extra::Extra;

const KEY_LINK: u64 = 2;
const KEY_TS_SECONDS: u64 = 7;
const KEY_TS_NANOS: u64 = 8;
const KEY_EXTRA: u64 = 22;

/// Encoded size of a directory link: one tag byte and a 32 byte payload
pub const DIR_LINK_SIZE: usize = 1 + HASH_SIZE;

/// Where a child directory object lives.
///
/// Registry pointers and bare ed25519 keys share the `0xed` tag
///  and both resolve through the registry, so they are one variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DirLink {
    /// Immutable: the BLAKE3 hash of the child directory object
    FixedHashBlake3(Hash),
    /// Mutable: the public key of a registry pointer
    MutableRegistryEd25519([u8; 32]),
}

impl DirLink {
    pub const TAG_FIXED_HASH_BLAKE3: u8 = 0x1e;
    pub const TAG_MUTABLE_REGISTRY_ED25519: u8 = 0xed;

    pub fn to_bytes(&self) -> [u8; DIR_LINK_SIZE] {
        let mut out = [0; DIR_LINK_SIZE];
        let (tag, payload) = match self {
            DirLink::FixedHashBlake3(hash) => (Self::TAG_FIXED_HASH_BLAKE3, hash.as_bytes()),
            DirLink::MutableRegistryEd25519(key) => (Self::TAG_MUTABLE_REGISTRY_ED25519, key),
        };
        out[0] = tag;
        out[1..].copy_from_slice(payload);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CodecError> {
        if bytes.len() != DIR_LINK_SIZE {
            return Err(CodecError::BadLinkLength(bytes.len()));
        }
        let mut payload = [0; HASH_SIZE];
        payload.copy_from_slice(&bytes[1..]);
        match bytes[0] {
            Self::TAG_FIXED_HASH_BLAKE3 => Ok(DirLink::FixedHashBlake3(Hash::from_bytes(payload))),
            Self::TAG_MUTABLE_REGISTRY_ED25519 => Ok(DirLink::MutableRegistryEd25519(payload)),
            other => Err(CodecError::UnknownLinkTag(other)),
        }
    }

    pub fn is_mutable(&self) -> bool {
        matches!(self, DirLink::MutableRegistryEd25519(_))
    }
}

/// A reference to a child directory
#[derive(Debug, Clone, PartialEq)]
pub struct DirRef {
    pub link: DirLink,
    /// Creation time, seconds since the unix epoch
    pub ts_seconds: Option<u64>,
    pub ts_nanos: Option<u32>,
    pub extra: Option<Extra>,
}

impl DirRef {
    pub fn new(link: DirLink) -> Self {
        Self {
            link,
            ts_seconds: None,
            ts_nanos: None,
            extra: None,
        }
    }

    pub fn with_created(mut self, seconds: u64, nanos: Option<u32>) -> Self {
        self.ts_seconds = Some(seconds);
        self.ts_nanos = nanos;
        self
    }
}

impl CborValue for DirRef {
    fn to_cbor(&self) -> Value {
        let mut map = vec![(uint(KEY_LINK), Value::Bytes(self.link.to_bytes().to_vec()))];
        if let Some(seconds) = self.ts_seconds {
            map.push((uint(KEY_TS_SECONDS), uint(seconds)));
        }
        if let Some(nanos) = self.ts_nanos {
            map.push((uint(KEY_TS_NANOS), uint(u64::from(nanos))));
        }
        if let Some(extra) = &self.extra {
            map.push((uint(KEY_EXTRA), extra.to_cbor()));
        }
        Value::Map(map)
    }

    fn from_cbor(value: Value) -> Result<Self, CodecError> {
        let mut link = None;
        let mut ts_seconds = None;
        let mut ts_nanos = None;
        let mut extra = None;

        for (key, value) in into_map(value, "directory reference")? {
            let key = into_u64(key, "directory reference key")?;
            let duplicate = match key {
                KEY_LINK => link
                    .replace(DirLink::from_bytes(&into_bytes(value, "directory link")?)?)
                    .is_some(),
                KEY_TS_SECONDS => ts_seconds
                    .replace(into_u64(value, "created seconds")?)
                    .is_some(),
                KEY_TS_NANOS => ts_nanos
                    .replace(into_u32(value, "created nanos")?)
                    .is_some(),
                KEY_EXTRA => extra.replace(Extra::from_cbor(value)?).is_some(),
                other => {
                    return Err(CodecError::UnknownField {
                        context: "directory reference",
                        key: other.to_string(),
                    })
                }
            };
            if duplicate {
                return Err(CodecError::DuplicateKey {
                    context: "directory reference",
                    key: key.to_string(),
                });
            }
        }

        Ok(DirRef {
            link: link.ok_or(CodecError::MissingField("directory link"))?,
            ts_seconds,
            ts_nanos,
            extra,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_link_layout() {
        let hash = Hash::of(b"child");
        let bytes = DirLink::FixedHashBlake3(hash).to_bytes();
        assert_eq!(bytes.len(), 33);
        assert_eq!(bytes[0], 0x1e);
        assert_eq!(&bytes[1..], hash.as_bytes());

        let bytes = DirLink::MutableRegistryEd25519([7; 32]).to_bytes();
        assert_eq!(bytes[0], 0xed);
        assert_eq!(
            DirLink::from_bytes(&bytes).unwrap(),
            DirLink::MutableRegistryEd25519([7; 32])
        );
    }

    #[test]
    fn test_link_wrong_length() {
        assert!(matches!(
            DirLink::from_bytes(&[0x1e; 32]),
            Err(CodecError::BadLinkLength(32))
        ));
        assert!(matches!(
            DirLink::from_bytes(&[0x1e; 34]),
            Err(CodecError::BadLinkLength(34))
        ));
    }

    #[test]
    fn test_link_unknown_tag() {
        let mut bytes = [0u8; 33];
        bytes[0] = 0x42;
        assert!(matches!(
            DirLink::from_bytes(&bytes),
            Err(CodecError::UnknownLinkTag(0x42))
        ));
    }

    #[test]
    fn test_dir_ref_roundtrip() {
        let mut extra = Extra::new();
        extra.insert("label", Value::Text("photos".into()));
        let mut dir = DirRef::new(DirLink::FixedHashBlake3(Hash::of(b"d")))
            .with_created(1_700_000_000, Some(5));
        dir.extra = Some(extra);

        let decoded = DirRef::decode(&dir.encode().unwrap()).unwrap();
        assert_eq!(decoded, dir);
    }

    #[test]
    fn test_dir_ref_missing_link() {
        let value = Value::Map(vec![(uint(KEY_TS_SECONDS), uint(1))]);
        assert!(matches!(
            DirRef::from_cbor(value),
            Err(CodecError::MissingField("directory link"))
        ));
    }
}
