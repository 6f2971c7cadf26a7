use std::collections::BTreeMap;

use ciborium::value::Value;
use ciborium_ll::Header;
use serde::{Deserialize, Serialize};

use crate::hash::Hash;

use super::cbor::{
    encode_value, into_hash, into_map, into_text, into_u32, into_u64, into_u8, sorted_text_map,
    text, uint, write_head, write_value, CborValue, CodecError, RawValue, Reader,
};

/// Header key holding the sharding metadata
pub const SHARDING_KEY: &str = "sharding";

const SHARDING_TYPE_HAMT: &str = "hamt";

/// Hash used to place names in the trie
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HashFunction {
    #[default]
    Blake3,
}

impl HashFunction {
    pub fn selector(&self) -> u64 {
        match self {
            HashFunction::Blake3 => 1,
        }
    }

    pub fn from_selector(selector: u64) -> Result<Self, CodecError> {
        match selector {
            1 => Ok(HashFunction::Blake3),
            other => Err(CodecError::UnsupportedHashFunction(other)),
        }
    }
}

/// Trie parameters recorded alongside a sharded directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardingParams {
    pub bits_per_level: u8,
    pub max_inline_entries: u64,
    pub hash_function: HashFunction,
}

impl Default for ShardingParams {
    fn default() -> Self {
        Self {
            bits_per_level: 5,
            max_inline_entries: 1000,
            hash_function: HashFunction::Blake3,
        }
    }
}

impl CborValue for ShardingParams {
    fn to_cbor(&self) -> Value {
        sorted_text_map(vec![
            ("bitsPerLevel".into(), uint(u64::from(self.bits_per_level))),
            ("maxInlineEntries".into(), uint(self.max_inline_entries)),
            ("hashFunction".into(), uint(self.hash_function.selector())),
        ])
    }

    fn from_cbor(value: Value) -> Result<Self, CodecError> {
        let mut bits_per_level = None;
        let mut max_inline_entries = None;
        let mut hash_function = None;
        for (key, value) in into_map(value, "sharding config")? {
            match into_text(key, "sharding config key")?.as_str() {
                "bitsPerLevel" => bits_per_level = Some(into_u8(value, "bitsPerLevel")?),
                "maxInlineEntries" => {
                    max_inline_entries = Some(into_u64(value, "maxInlineEntries")?)
                }
                "hashFunction" => {
                    hash_function = Some(HashFunction::from_selector(into_u64(
                        value,
                        "hashFunction",
                    )?)?)
                }
                other => {
                    return Err(CodecError::UnknownField {
                        context: "sharding config",
                        key: other.to_string(),
                    })
                }
            }
        }
        Ok(Self {
            bits_per_level: bits_per_level.ok_or(CodecError::MissingField("bitsPerLevel"))?,
            max_inline_entries: max_inline_entries
                .ok_or(CodecError::MissingField("maxInlineEntries"))?,
            hash_function: hash_function.ok_or(CodecError::MissingField("hashFunction"))?,
        })
    }
}

/// Descriptor of the root trie node of a sharded directory
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShardRoot {
    pub cid: Hash,
    pub total_entries: u64,
    pub depth: u32,
}

impl CborValue for ShardRoot {
    fn to_cbor(&self) -> Value {
        sorted_text_map(vec![
            ("cid".into(), Value::Bytes(self.cid.as_bytes().to_vec())),
            ("totalEntries".into(), uint(self.total_entries)),
            ("depth".into(), uint(u64::from(self.depth))),
        ])
    }

    fn from_cbor(value: Value) -> Result<Self, CodecError> {
        let mut cid = None;
        let mut total_entries = None;
        let mut depth = None;
        for (key, value) in into_map(value, "sharding root")? {
            match into_text(key, "sharding root key")?.as_str() {
                "cid" => cid = Some(into_hash(value, "root cid")?),
                "totalEntries" => total_entries = Some(into_u64(value, "totalEntries")?),
                "depth" => depth = Some(into_u32(value, "depth")?),
                other => {
                    return Err(CodecError::UnknownField {
                        context: "sharding root",
                        key: other.to_string(),
                    })
                }
            }
        }
        Ok(Self {
            cid: cid.ok_or(CodecError::MissingField("cid"))?,
            total_entries: total_entries.ok_or(CodecError::MissingField("totalEntries"))?,
            depth: depth.ok_or(CodecError::MissingField("depth"))?,
        })
    }
}

/// Sharding metadata stored in the directory header.
///
/// The directory is sharded exactly when `root` is set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ShardingMeta {
    pub config: ShardingParams,
    pub root: Option<ShardRoot>,
}

impl CborValue for ShardingMeta {
    fn to_cbor(&self) -> Value {
        let mut entries = vec![
            ("type".to_string(), text(SHARDING_TYPE_HAMT)),
            ("config".to_string(), self.config.to_cbor()),
        ];
        if let Some(root) = &self.root {
            entries.push(("root".to_string(), root.to_cbor()));
        }
        sorted_text_map(entries)
    }

    fn from_cbor(value: Value) -> Result<Self, CodecError> {
        let mut kind = None;
        let mut config = None;
        let mut root = None;
        for (key, value) in into_map(value, "sharding")? {
            match into_text(key, "sharding key")?.as_str() {
                "type" => kind = Some(into_text(value, "sharding type")?),
                "config" => config = Some(ShardingParams::from_cbor(value)?),
                "root" => root = Some(ShardRoot::from_cbor(value)?),
                other => {
                    return Err(CodecError::UnknownField {
                        context: "sharding",
                        key: other.to_string(),
                    })
                }
            }
        }
        match kind {
            Some(kind) if kind == SHARDING_TYPE_HAMT => {}
            Some(kind) => return Err(CodecError::UnsupportedSharding(kind)),
            None => return Err(CodecError::MissingField("sharding type")),
        }
        Ok(Self {
            config: config.ok_or(CodecError::MissingField("sharding config"))?,
            root,
        })
    }
}

/// The extensible directory header.
///
/// Keys other than [`SHARDING_KEY`] are kept as the exact bytes they
///  were decoded from and written back unchanged.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirHeader {
    pub sharding: Option<ShardingMeta>,
    pub other: BTreeMap<String, RawValue>,
}

impl DirHeader {
    pub fn is_empty(&self) -> bool {
        self.sharding.is_none() && self.other.is_empty()
    }

    pub fn encode(&self) -> Result<Vec<u8>, CodecError> {
        let mut buf = Vec::new();
        self.write(&mut buf)?;
        Ok(buf)
    }

    pub fn decode(data: &[u8]) -> Result<Self, CodecError> {
        let mut reader = Reader::new(data);
        let header = Self::read(&mut reader)?;
        reader.finish()?;
        Ok(header)
    }

    /// Append the header map, keys sorted byte-wise
    pub(crate) fn write(&self, buf: &mut Vec<u8>) -> Result<(), CodecError> {
        let sharding = self
            .sharding
            .as_ref()
            .map(|sharding| encode_value(&sharding.to_cbor()))
            .transpose()?;
        let mut entries: Vec<(&str, &[u8])> = self
            .other
            .iter()
            .map(|(key, value)| (key.as_str(), value.as_bytes()))
            .collect();
        if let Some(sharding) = &sharding {
            entries.push((SHARDING_KEY, sharding.as_slice()));
        }
        entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));

        write_head(buf, Header::Map(Some(entries.len())))?;
        for (key, value) in entries {
            write_value(buf, &text(key))?;
            buf.extend_from_slice(value);
        }
        Ok(())
    }

    pub(crate) fn read(reader: &mut Reader<'_>) -> Result<Self, CodecError> {
        let mut header = DirHeader::default();
        let mut remaining = reader.map("header")?;
        while reader.more(&mut remaining)? {
            let key = into_text(reader.value()?, "header key")?;
            let duplicate = if key == SHARDING_KEY {
                header
                    .sharding
                    .replace(ShardingMeta::from_cbor(reader.value()?)?)
                    .is_some()
            } else {
                let raw = RawValue::from_bytes(reader.raw()?.to_vec())?;
                header.other.insert(key.clone(), raw).is_some()
            };
            if duplicate {
                return Err(CodecError::DuplicateKey {
                    context: "header",
                    key,
                });
            }
        }
        Ok(header)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_empty_header_is_empty_map() {
        assert_eq!(DirHeader::default().encode().unwrap(), vec![0xa0]);
    }

    #[test]
    fn test_sharding_roundtrip() {
        let header = DirHeader {
            sharding: Some(ShardingMeta {
                config: ShardingParams::default(),
                root: Some(ShardRoot {
                    cid: Hash::of(b"root"),
                    total_entries: 1001,
                    depth: 2,
                }),
            }),
            other: BTreeMap::new(),
        };
        let decoded = DirHeader::decode(&header.encode().unwrap()).unwrap();
        assert_eq!(decoded, header);
    }

    #[test]
    fn test_unknown_keys_preserved() {
        let mut other = BTreeMap::new();
        other.insert(
            "zz".to_string(),
            RawValue::from_value(&Value::Text("last".into())).unwrap(),
        );
        other.insert(
            "aa".to_string(),
            RawValue::from_value(&Value::Array(vec![uint(1), uint(2)])).unwrap(),
        );
        let header = DirHeader {
            sharding: Some(ShardingMeta::default()),
            other,
        };
        let encoded = header.encode().unwrap();
        let decoded = DirHeader::decode(&encoded).unwrap();
        assert_eq!(decoded, header);
        assert_eq!(decoded.encode().unwrap(), encoded);
    }

    #[test]
    fn test_unknown_values_kept_verbatim() {
        // {"x": 1} with 1 in a one-byte argument, {"y": 1.0} as float16
        for hex_header in ["a161781801", "a16179f93c00"] {
            let bytes = hex::decode(hex_header).unwrap();
            let header = DirHeader::decode(&bytes).unwrap();
            assert_eq!(header.encode().unwrap(), bytes);
        }

        let header = DirHeader::decode(&hex::decode("a161781801").unwrap()).unwrap();
        assert_eq!(header.other["x"].as_bytes(), &[0x18, 0x01]);
        assert_eq!(header.other["x"].to_value().unwrap(), uint(1));
    }

    #[test]
    fn test_duplicate_header_key_rejected() {
        let bytes = hex::decode("a2617801617802").unwrap();
        assert!(matches!(
            DirHeader::decode(&bytes),
            Err(CodecError::DuplicateKey { .. })
        ));
    }

    #[test]
    fn test_unsupported_sharding_type() {
        let value = Value::Map(vec![
            (text("type"), text("btree")),
            (text("config"), ShardingParams::default().to_cbor()),
        ]);
        assert!(matches!(
            ShardingMeta::from_cbor(value),
            Err(CodecError::UnsupportedSharding(_))
        ));
    }

    #[test]
    fn test_unsupported_hash_function() {
        assert!(matches!(
            HashFunction::from_selector(0),
            Err(CodecError::UnsupportedHashFunction(0))
        ));
    }
}
