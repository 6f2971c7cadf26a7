use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use ciborium::value::Value;

use crate::dir::{
    decode_value, encode_value, into_array, into_map, into_text, into_u32, into_u64,
    sorted_text_map, text, uint, CodecError, Entry,
};

pub use crate::dir::EntryKind;

#[derive(Debug, thiserror::Error)]
pub enum CursorError {
    #[error("cursor is not valid base64url: {0}")]
    Encoding(#[from] base64::DecodeError),
    #[error("malformed cursor: {0}")]
    Malformed(#[from] CodecError),
    #[error("cursor does not apply to this directory: {0}")]
    Inapplicable(String),
}

/// An opaque position in a directory listing.
///
/// Names the last entry handed out. Listings of sharded directories
///  also record the trie path that led to it, and only those cursors
///  resume a sharded listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    pub position: String,
    pub kind: EntryKind,
    /// Timestamp of the entry when the cursor was issued. Informational
    ///  only: resuming goes by name and kind, so an entry modified since
    ///  is still treated as the position.
    pub timestamp: Option<u64>,
    pub path: Option<Vec<u32>>,
}

impl Cursor {
    pub fn new(position: impl Into<String>, kind: EntryKind) -> Self {
        Self {
            position: position.into(),
            kind,
            timestamp: None,
            path: None,
        }
    }

    /// A cursor positioned on `entry`
    pub fn at(name: &str, entry: &Entry, path: Option<Vec<u32>>) -> Self {
        Self {
            position: name.to_string(),
            kind: entry.kind(),
            timestamp: entry.timestamp(),
            path,
        }
    }

    pub fn with_path(mut self, path: Vec<u32>) -> Self {
        self.path = Some(path);
        self
    }

    pub fn encode(&self) -> Result<String, CursorError> {
        let mut entries = vec![
            ("position".to_string(), Value::Text(self.position.clone())),
            ("kind".to_string(), text(self.kind.as_str())),
        ];
        if let Some(timestamp) = self.timestamp {
            entries.push(("timestamp".to_string(), uint(timestamp)));
        }
        if let Some(path) = &self.path {
            entries.push((
                "path".to_string(),
                Value::Array(path.iter().map(|i| uint(u64::from(*i))).collect()),
            ));
        }
        let bytes = encode_value(&sorted_text_map(entries))?;
        Ok(URL_SAFE_NO_PAD.encode(bytes))
    }

    pub fn decode(token: &str) -> Result<Self, CursorError> {
        let bytes = URL_SAFE_NO_PAD.decode(token)?;
        let mut position = None;
        let mut kind = None;
        let mut timestamp = None;
        let mut path = None;
        for (key, value) in into_map(decode_value(&bytes)?, "cursor")? {
            let key = into_text(key, "cursor key")?;
            let duplicate = match key.as_str() {
                "position" => position
                    .replace(into_text(value, "cursor position")?)
                    .is_some(),
                "kind" => {
                    let raw = into_text(value, "cursor kind")?;
                    let parsed = EntryKind::parse(&raw).ok_or(CodecError::UnknownField {
                        context: "cursor kind",
                        key: raw,
                    })?;
                    kind.replace(parsed).is_some()
                }
                "timestamp" => timestamp
                    .replace(into_u64(value, "cursor timestamp")?)
                    .is_some(),
                "path" => {
                    let indices = into_array(value, "cursor path")?
                        .into_iter()
                        .map(|v| into_u32(v, "cursor path index"))
                        .collect::<Result<Vec<_>, _>>()?;
                    path.replace(indices).is_some()
                }
                _ => {
                    return Err(CodecError::UnknownField {
                        context: "cursor",
                        key,
                    }
                    .into())
                }
            };
            if duplicate {
                return Err(CodecError::DuplicateKey {
                    context: "cursor",
                    key,
                }
                .into());
            }
        }
        Ok(Self {
            position: position.ok_or(CodecError::MissingField("cursor position"))?,
            kind: kind.ok_or(CodecError::MissingField("cursor kind"))?,
            timestamp,
            path,
        })
    }
}

impl std::fmt::Display for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {:?}", self.kind, self.position)?;
        if let Some(path) = &self.path {
            write!(f, " at {path:?}")?;
        }
        Ok(())
    }
}
