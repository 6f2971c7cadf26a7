//! Directory objects and their binary encoding
//!
//! A directory is serialized as the marker `0x5f 0x5d` followed by a CBOR
//!  array of four elements:
//!
//! ```text
//! [ "S5.pro", header: {text => any}, dirs: {name => DirRef}, files: {name => FileRef} ]
//! ```
//!
//! The encoding is hashed to produce the directory's content identifier,
//!  so it must be byte-for-byte deterministic:
//!
//! - name tables and headers are emitted sorted by key, byte-wise
//! - references use small integer keys, emitted in ascending order
//! - optional fields are omitted, never written as null
//! - integers always take their shortest unsigned form, up to 64 bits
//! - extension maps ([`Extra`]) keep their insertion order
//! - header values this crate does not interpret are written back as
//!   the exact bytes they were read from
//!
//! Decoding never guesses. Anything outside the schema fails with a
//!  [`CodecError`].

mod cbor;
mod dir_ref;
mod directory;
mod entry;
mod extra;
mod file_ref;
mod header;

pub use cbor::{decode_value, encode_value, CborValue, CodecError, RawValue};
pub use dir_ref::{DirLink, DirRef, DIR_LINK_SIZE};
pub use directory::{Directory, DIR_MARKER, MAGIC};
pub use entry::{Entry, EntryKind};
pub use extra::Extra;
pub use file_ref::{BlobLocation, FileRef};
pub use header::{
    DirHeader, HashFunction, ShardRoot, ShardingMeta, ShardingParams, SHARDING_KEY,
};

pub(crate) use cbor::{
    into_array, into_bytes, into_map, into_text, into_u32, into_u64, into_u8, sorted_text_map,
    text, uint,
};
