//! Low-level CBOR helpers shared by every encoded type.
//!
//! All values pass through [`ciborium::Value`] so that the emitted
//!  map order is whatever the caller built, never a schema's field order.
//!
//! Reading and writing walk the item tree with an explicit stack over
//!  [`ciborium_ll`] headers, so nesting depth is bounded by memory
//!  rather than by the call stack. Version chains nest one map per
//!  version and have no fixed depth limit.

use ciborium::value::{Integer, Value};
use ciborium_ll::{simple, Decoder, Encoder, Header};

/// CBOR tag for a positive bignum
const TAG_POSITIVE_BIGNUM: u64 = 2;

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("input too short: {0} bytes")]
    TooShort(usize),
    #[error("malformed cbor: {0}")]
    Cbor(String),
    #[error("failed to encode cbor: {0}")]
    Encode(String),
    #[error("{0} trailing bytes after value")]
    TrailingBytes(usize),
    #[error("expected a 4-element top level array, got {0} elements")]
    TopLevelArity(usize),
    #[error("bad magic: {0:?}")]
    BadMagic(String),
    #[error("unexpected type for {field}: expected {expected}")]
    UnexpectedType {
        field: &'static str,
        expected: &'static str,
    },
    #[error("missing required field: {0}")]
    MissingField(&'static str),
    #[error("unknown field {key} in {context}")]
    UnknownField { context: &'static str, key: String },
    #[error("duplicate key {key:?} in {context}")]
    DuplicateKey { context: &'static str, key: String },
    #[error("integer out of range for {0}")]
    IntegerOutOfRange(&'static str),
    #[error("directory link must be 33 bytes, got {0}")]
    BadLinkLength(usize),
    #[error("unknown directory link tag: {0:#04x}")]
    UnknownLinkTag(u8),
    #[error("unknown blob location tag: {0:#x}")]
    UnknownLocationTag(u64),
    #[error("hash must be 32 bytes, got {0}")]
    BadHashLength(usize),
    #[error("unsupported sharding type: {0:?}")]
    UnsupportedSharding(String),
    #[error("unsupported hash function selector: {0}")]
    UnsupportedHashFunction(u64),
    #[error("sharded directory carries {0} inline entries")]
    InlineEntriesWhileSharded(usize),
}

/// A type with a canonical CBOR value representation
pub trait CborValue: Sized {
    fn to_cbor(&self) -> Value;
    fn from_cbor(value: Value) -> Result<Self, CodecError>;

    fn encode(&self) -> Result<Vec<u8>, CodecError> {
        encode_value(&self.to_cbor())
    }

    fn decode(data: &[u8]) -> Result<Self, CodecError> {
        Self::from_cbor(decode_value(data)?)
    }
}

pub fn encode_value(value: &Value) -> Result<Vec<u8>, CodecError> {
    let mut buf = Vec::new();
    write_value(&mut buf, value)?;
    Ok(buf)
}

/// Decode exactly one CBOR value, rejecting anything left over
pub fn decode_value(data: &[u8]) -> Result<Value, CodecError> {
    let mut reader = Reader::new(data);
    let value = reader.value()?;
    reader.finish()?;
    Ok(value)
}

fn read_error<E: std::fmt::Debug>(e: ciborium_ll::Error<E>) -> CodecError {
    CodecError::Cbor(format!("{e:?}"))
}

fn write_error<E: std::fmt::Debug>(e: E) -> CodecError {
    CodecError::Encode(format!("{e:?}"))
}

/// Append a single item head
pub(crate) fn write_head(buf: &mut Vec<u8>, header: Header) -> Result<(), CodecError> {
    Encoder::from(buf).push(header).map_err(write_error)
}

/// Append the encoding of `value`
pub(crate) fn write_value(buf: &mut Vec<u8>, value: &Value) -> Result<(), CodecError> {
    let mut encoder = Encoder::from(buf);
    let mut stack = vec![value];
    while let Some(value) = stack.pop() {
        let written = match value {
            Value::Integer(n) => {
                let n = i128::from(*n);
                let header = u64::try_from(n)
                    .map(Header::Positive)
                    .or_else(|_| u64::try_from(-1 - n).map(Header::Negative))
                    .map_err(|_| CodecError::Encode(format!("integer {n} out of range")))?;
                encoder.push(header)
            }
            Value::Bytes(bytes) => encoder.bytes(bytes, None::<usize>),
            Value::Text(s) => encoder.text(s, None::<usize>),
            Value::Float(f) => encoder.push(Header::Float(*f)),
            Value::Bool(b) => encoder.push(Header::Simple(if *b {
                simple::TRUE
            } else {
                simple::FALSE
            })),
            Value::Null => encoder.push(Header::Simple(simple::NULL)),
            Value::Tag(tag, inner) => {
                stack.push(inner.as_ref());
                encoder.push(Header::Tag(*tag))
            }
            Value::Array(items) => {
                stack.extend(items.iter().rev());
                encoder.push(Header::Array(Some(items.len())))
            }
            Value::Map(entries) => {
                for (key, value) in entries.iter().rev() {
                    stack.push(value);
                    stack.push(key);
                }
                encoder.push(Header::Map(Some(entries.len())))
            }
            other => return Err(CodecError::Encode(format!("unsupported value {other:?}"))),
        };
        written.map_err(write_error)?;
    }
    Ok(())
}

/// A container being filled while reading
enum Frame {
    Array {
        items: Vec<Value>,
        remaining: Option<usize>,
    },
    Map {
        entries: Vec<(Value, Value)>,
        key: Option<Value>,
        remaining: Option<usize>,
    },
    Tag(u64),
}

// upper bound on capacity reserved from an untrusted length
const MAX_PREALLOC: usize = 1024;

/// Pull-based reader over one encoded buffer
pub(crate) struct Reader<'a> {
    data: &'a [u8],
    decoder: Decoder<&'a [u8]>,
}

impl<'a> Reader<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            decoder: Decoder::from(data),
        }
    }

    pub fn pull(&mut self) -> Result<Header, CodecError> {
        self.decoder.pull().map_err(read_error)
    }

    /// Open an array, returning its length (`None` when indefinite)
    pub fn array(&mut self, field: &'static str) -> Result<Option<usize>, CodecError> {
        match self.pull()? {
            Header::Array(len) => Ok(len),
            _ => Err(CodecError::UnexpectedType {
                field,
                expected: "array",
            }),
        }
    }

    /// Open a map, returning its length (`None` when indefinite)
    pub fn map(&mut self, field: &'static str) -> Result<Option<usize>, CodecError> {
        match self.pull()? {
            Header::Map(len) => Ok(len),
            _ => Err(CodecError::UnexpectedType {
                field,
                expected: "map",
            }),
        }
    }

    /// Whether another item (or map entry) follows in an open container
    pub fn more(&mut self, remaining: &mut Option<usize>) -> Result<bool, CodecError> {
        match remaining {
            Some(0) => Ok(false),
            Some(n) => {
                *n -= 1;
                Ok(true)
            }
            None => match self.pull()? {
                Header::Break => Ok(false),
                header => {
                    self.decoder.push(header);
                    Ok(true)
                }
            },
        }
    }

    /// Read one complete item
    pub fn value(&mut self) -> Result<Value, CodecError> {
        let mut stack: Vec<Frame> = Vec::new();
        loop {
            let offset = self.decoder.offset();
            let mut done = match self.pull()? {
                Header::Positive(n) => Value::Integer(Integer::from(n)),
                Header::Negative(n) => Value::Integer(
                    Integer::try_from(-1 - i128::from(n))
                        .map_err(|_| CodecError::Cbor(format!("negative integer at {offset}")))?,
                ),
                Header::Float(f) => Value::Float(f),
                Header::Simple(simple::FALSE) => Value::Bool(false),
                Header::Simple(simple::TRUE) => Value::Bool(true),
                Header::Simple(simple::NULL | simple::UNDEFINED) => Value::Null,
                Header::Simple(other) => {
                    return Err(CodecError::Cbor(format!(
                        "unassigned simple value {other} at {offset}"
                    )))
                }
                Header::Bytes(len) => Value::Bytes(self.bytes(len)?),
                Header::Text(len) => Value::Text(self.text(len)?),
                Header::Tag(tag) => {
                    stack.push(Frame::Tag(tag));
                    continue;
                }
                Header::Array(Some(0)) => Value::Array(Vec::new()),
                Header::Array(remaining) => {
                    let items = Vec::with_capacity(remaining.unwrap_or(0).min(MAX_PREALLOC));
                    stack.push(Frame::Array { items, remaining });
                    continue;
                }
                Header::Map(Some(0)) => Value::Map(Vec::new()),
                Header::Map(remaining) => {
                    let entries = Vec::with_capacity(remaining.unwrap_or(0).min(MAX_PREALLOC));
                    stack.push(Frame::Map {
                        entries,
                        key: None,
                        remaining,
                    });
                    continue;
                }
                Header::Break => match stack.pop() {
                    Some(Frame::Array {
                        items,
                        remaining: None,
                    }) => Value::Array(items),
                    Some(Frame::Map {
                        entries,
                        key: None,
                        remaining: None,
                    }) => Value::Map(entries),
                    _ => return Err(CodecError::Cbor(format!("unexpected break at {offset}"))),
                },
            };

            // hand the finished item to its parents, closing every
            // container it completes
            loop {
                let Some(frame) = stack.pop() else {
                    return Ok(done);
                };
                match frame {
                    Frame::Tag(tag) => done = Value::Tag(tag, Box::new(done)),
                    Frame::Array {
                        mut items,
                        remaining,
                    } => {
                        items.push(done);
                        if remaining == Some(items.len()) {
                            done = Value::Array(items);
                        } else {
                            stack.push(Frame::Array { items, remaining });
                            break;
                        }
                    }
                    Frame::Map {
                        entries,
                        key: None,
                        remaining,
                    } => {
                        stack.push(Frame::Map {
                            entries,
                            key: Some(done),
                            remaining,
                        });
                        break;
                    }
                    Frame::Map {
                        mut entries,
                        key: Some(key),
                        remaining,
                    } => {
                        entries.push((key, done));
                        if remaining == Some(entries.len()) {
                            done = Value::Map(entries);
                        } else {
                            stack.push(Frame::Map {
                                entries,
                                key: None,
                                remaining,
                            });
                            break;
                        }
                    }
                }
            }
        }
    }

    /// Read one complete item and return its encoding exactly as it
    ///  appears in the input
    pub fn raw(&mut self) -> Result<&'a [u8], CodecError> {
        let start = self.decoder.offset();
        self.value()?;
        let end = self.decoder.offset();
        let data: &'a [u8] = self.data;
        data.get(start..end)
            .ok_or_else(|| CodecError::Cbor(format!("item span {start}..{end} out of bounds")))
    }

    /// Fail if any input is left
    pub fn finish(mut self) -> Result<(), CodecError> {
        let offset = self.decoder.offset();
        if offset < self.data.len() {
            return Err(CodecError::TrailingBytes(self.data.len() - offset));
        }
        Ok(())
    }

    fn bytes(&mut self, len: Option<usize>) -> Result<Vec<u8>, CodecError> {
        let mut out = Vec::new();
        let mut buf = [0u8; 4096];
        let mut segments = self.decoder.bytes(len);
        while let Some(mut segment) = segments.pull().map_err(read_error)? {
            while let Some(chunk) = segment.pull(&mut buf).map_err(read_error)? {
                out.extend_from_slice(chunk);
            }
        }
        Ok(out)
    }

    fn text(&mut self, len: Option<usize>) -> Result<String, CodecError> {
        let mut out = String::new();
        let mut buf = [0u8; 4096];
        let mut segments = self.decoder.text(len);
        while let Some(mut segment) = segments.pull().map_err(read_error)? {
            while let Some(chunk) = segment.pull(&mut buf).map_err(read_error)? {
                out.push_str(chunk);
            }
        }
        Ok(out)
    }
}

/// One encoded CBOR item, kept byte-for-byte.
///
/// Used for values this crate does not interpret, so that decoding and
///  re-encoding a directory never rewrites them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawValue(Vec<u8>);

impl RawValue {
    pub fn from_value(value: &Value) -> Result<Self, CodecError> {
        Ok(Self(encode_value(value)?))
    }

    /// Wrap already encoded bytes, which must hold exactly one item
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self, CodecError> {
        decode_value(&bytes)?;
        Ok(Self(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn to_value(&self) -> Result<Value, CodecError> {
        decode_value(&self.0)
    }
}

pub(crate) fn uint(n: u64) -> Value {
    Value::Integer(Integer::from(n))
}

pub(crate) fn text(s: &str) -> Value {
    Value::Text(s.to_string())
}

pub(crate) fn into_u64(value: Value, field: &'static str) -> Result<u64, CodecError> {
    match value {
        Value::Integer(i) => u64::try_from(i).map_err(|_| CodecError::IntegerOutOfRange(field)),
        Value::Tag(TAG_POSITIVE_BIGNUM, inner) => match *inner {
            Value::Bytes(bytes) if bytes.len() <= 8 => {
                Ok(bytes.iter().fold(0u64, |acc, b| (acc << 8) | u64::from(*b)))
            }
            Value::Bytes(_) => Err(CodecError::IntegerOutOfRange(field)),
            _ => Err(CodecError::UnexpectedType {
                field,
                expected: "bignum bytes",
            }),
        },
        _ => Err(CodecError::UnexpectedType {
            field,
            expected: "unsigned integer",
        }),
    }
}

pub(crate) fn into_u32(value: Value, field: &'static str) -> Result<u32, CodecError> {
    u32::try_from(into_u64(value, field)?).map_err(|_| CodecError::IntegerOutOfRange(field))
}

pub(crate) fn into_u8(value: Value, field: &'static str) -> Result<u8, CodecError> {
    u8::try_from(into_u64(value, field)?).map_err(|_| CodecError::IntegerOutOfRange(field))
}

pub(crate) fn into_text(value: Value, field: &'static str) -> Result<String, CodecError> {
    match value {
        Value::Text(s) => Ok(s),
        _ => Err(CodecError::UnexpectedType {
            field,
            expected: "text",
        }),
    }
}

pub(crate) fn into_bytes(value: Value, field: &'static str) -> Result<Vec<u8>, CodecError> {
    match value {
        Value::Bytes(b) => Ok(b),
        _ => Err(CodecError::UnexpectedType {
            field,
            expected: "bytes",
        }),
    }
}

pub(crate) fn into_map(
    value: Value,
    field: &'static str,
) -> Result<Vec<(Value, Value)>, CodecError> {
    match value {
        Value::Map(entries) => Ok(entries),
        _ => Err(CodecError::UnexpectedType {
            field,
            expected: "map",
        }),
    }
}

pub(crate) fn into_array(value: Value, field: &'static str) -> Result<Vec<Value>, CodecError> {
    match value {
        Value::Array(items) => Ok(items),
        _ => Err(CodecError::UnexpectedType {
            field,
            expected: "array",
        }),
    }
}

pub(crate) fn into_hash(value: Value, field: &'static str) -> Result<crate::hash::Hash, CodecError> {
    let bytes = into_bytes(value, field)?;
    crate::hash::Hash::try_from(bytes.as_slice()).map_err(|_| CodecError::BadHashLength(bytes.len()))
}

/// Encode a string-keyed map, sorting keys byte-wise first
pub(crate) fn sorted_text_map(mut entries: Vec<(String, Value)>) -> Value {
    entries.sort_by(|a, b| a.0.as_bytes().cmp(b.0.as_bytes()));
    Value::Map(
        entries
            .into_iter()
            .map(|(k, v)| (Value::Text(k), v))
            .collect(),
    )
}
