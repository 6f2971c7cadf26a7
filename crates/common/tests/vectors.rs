//! Reference vectors for the directory encoding

use common::dir::{
    CodecError, DirLink, DirRef, Directory, FileRef, ShardRoot, ShardingMeta, ShardingParams,
};
use common::hash::Hash;

const EMPTY: &str = "5f5d846653352e70726fa0a0a0";

const SINGLE_FILE: &str = "5f5d846653352e70726fa0a0a168746573742e747874a2035820\
0000000000000000000000000000000000000000000000000000000000000000\
04190400";

const MULTIPLE_FILES: &str = "5f5d846653352e70726fa0a0a3\
65612e747874a2035820\
0202020202020202020202020202020202020202020202020202020202020202\
0402\
656d2e747874a2035820\
0303030303030303030303030303030303030303030303030303030303030303\
0419012c\
657a2e747874a2035820\
0101010101010101010101010101010101010101010101010101010101010101\
0401";

const MIXED: &str = "5f5d846653352e70726fa0a2\
64646f6373a20258211e\
aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
071a6553f100\
646b657973a1025821ed\
bbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbbb\
a169726561646d652e6d64a5035820\
cccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccccc\
04182a066d746578742f6d61726b646f776e071a6553f101081901f4";

const UNICODE: &str = "5f5d846653352e70726fa0a0a3\
655a65627261a2035820\
0606060606060606060606060606060606060606060606060606060606060606\
0406\
69636166c3a92e747874a2035820\
0505050505050505050505050505050505050505050505050505050505050505\
0405\
6de697a5e69cace8aa9e2e747874a2035820\
0404040404040404040404040404040404040404040404040404040404040404\
0404";

const MAX_SIZE: &str = "5f5d846653352e70726fa0a0a168687567652e62696ea2035820\
0707070707070707070707070707070707070707070707070707070707070707\
041bffffffffffffffff";

const VERSION_CHAIN: &str = "5f5d846653352e70726fa0a0a167646f632e747874a4035820\
1313131313131313131313131313131313131313131313131313131313131313\
04030719012c17a4035820\
1212121212121212121212121212121212121212121212121212121212121212\
04020718c817a3035820\
1111111111111111111111111111111111111111111111111111111111111111\
0401071864";

const SHARDED_HEADER: &str = "5f5d846653352e70726fa1687368617264696e67a3\
66636f6e666967a36c626974735065724c6576656c056c6861736846756e6374696f6e01\
706d6178496e6c696e65456e74726965731903e8\
64726f6f74a3636369645820\
eeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeeee\
656465707468026c746f74616c456e74726965731903e9\
64747970656468616d74a0a0";

fn filled(byte: u8) -> Hash {
    Hash::from([byte; 32])
}

/// Decode, compare, and check the structure re-encodes to the same bytes
fn check(vector: &str, expected: &Directory) {
    let bytes = hex::decode(vector).unwrap();
    let decoded = Directory::deserialize(&bytes).unwrap();
    assert_eq!(&decoded, expected);
    assert_eq!(hex::encode(decoded.serialize().unwrap()), vector);
    assert_eq!(hex::encode(expected.serialize().unwrap()), vector);
}

#[test]
fn test_empty_directory() {
    check(EMPTY, &Directory::new());
}

#[test]
fn test_single_file() {
    let mut dir = Directory::new();
    dir.files
        .insert("test.txt".into(), FileRef::new(Hash::default(), 1024));
    check(SINGLE_FILE, &dir);
}

#[test]
fn test_multiple_files_in_any_insertion_order() {
    let mut dir = Directory::new();
    dir.files.insert("z.txt".into(), FileRef::new(filled(1), 1));
    dir.files.insert("a.txt".into(), FileRef::new(filled(2), 2));
    dir.files.insert("m.txt".into(), FileRef::new(filled(3), 300));
    check(MULTIPLE_FILES, &dir);

    let mut sorted = Directory::new();
    sorted.files.insert("a.txt".into(), FileRef::new(filled(2), 2));
    sorted.files.insert("m.txt".into(), FileRef::new(filled(3), 300));
    sorted.files.insert("z.txt".into(), FileRef::new(filled(1), 1));
    assert_eq!(sorted.serialize().unwrap(), dir.serialize().unwrap());
}

#[test]
fn test_mixed_files_and_dirs() {
    let mut dir = Directory::new();
    dir.dirs.insert(
        "docs".into(),
        DirRef::new(DirLink::FixedHashBlake3(filled(0xaa))).with_created(1_700_000_000, None),
    );
    dir.dirs.insert(
        "keys".into(),
        DirRef::new(DirLink::MutableRegistryEd25519([0xbb; 32])),
    );
    dir.files.insert(
        "readme.md".into(),
        FileRef::new(filled(0xcc), 42)
            .with_media_type("text/markdown")
            .with_timestamp(1_700_000_001, Some(500)),
    );
    check(MIXED, &dir);
}

#[test]
fn test_unicode_names_sort_bytewise() {
    let mut dir = Directory::new();
    dir.files.insert("日本語.txt".into(), FileRef::new(filled(4), 4));
    dir.files.insert("café.txt".into(), FileRef::new(filled(5), 5));
    dir.files.insert("Zebra".into(), FileRef::new(filled(6), 6));
    check(UNICODE, &dir);
}

#[test]
fn test_max_size() {
    let mut dir = Directory::new();
    dir.files
        .insert("huge.bin".into(), FileRef::new(filled(7), u64::MAX));
    check(MAX_SIZE, &dir);
}

#[test]
fn test_version_chain() {
    let v1 = FileRef::new(filled(0x11), 1).with_timestamp(100, None);
    let v2 = FileRef::new(filled(0x12), 2)
        .with_timestamp(200, None)
        .with_prev(v1);
    let v3 = FileRef::new(filled(0x13), 3)
        .with_timestamp(300, None)
        .with_prev(v2);
    let mut dir = Directory::new();
    dir.files.insert("doc.txt".into(), v3);
    check(VERSION_CHAIN, &dir);

    let decoded = Directory::deserialize(&hex::decode(VERSION_CHAIN).unwrap()).unwrap();
    let sizes: Vec<_> = decoded.files["doc.txt"].history().map(|f| f.size).collect();
    assert_eq!(sizes, vec![3, 2, 1]);
}

#[test]
fn test_sharded_header() {
    let mut dir = Directory::new();
    dir.header.sharding = Some(ShardingMeta {
        config: ShardingParams::default(),
        root: Some(ShardRoot {
            cid: filled(0xee),
            total_entries: 1001,
            depth: 2,
        }),
    });
    check(SHARDED_HEADER, &dir);
    assert!(dir.is_sharded());
}

#[test]
fn test_unknown_header_values_survive_reencoding() {
    // {"x": 1} with 1 in a one-byte argument
    let non_minimal_int = "5f5d846653352e70726fa161781801a0a0";
    // {"y": 1.5} as a float64
    let wide_float = "5f5d846653352e70726fa16179fb3ff8000000000000a0a0";
    for vector in [non_minimal_int, wide_float] {
        let decoded = Directory::deserialize(&hex::decode(vector).unwrap()).unwrap();
        assert_eq!(hex::encode(decoded.serialize().unwrap()), vector);
    }

    // unknown keys sort in with the sharding key
    let mut dir = Directory::deserialize(&hex::decode(non_minimal_int).unwrap()).unwrap();
    dir.header.sharding = Some(ShardingMeta::default());
    let decoded = Directory::deserialize(&dir.serialize().unwrap()).unwrap();
    assert_eq!(decoded, dir);
    assert_eq!(decoded.header.other["x"].as_bytes(), &[0x18, 0x01]);
}

#[test]
fn test_sharded_directory_with_inline_entries_rejected() {
    let inline_file = "a168746573742e747874a2035820\
0000000000000000000000000000000000000000000000000000000000000000\
04190400";
    let vector = format!(
        "{}{}",
        SHARDED_HEADER.strip_suffix("a0").unwrap(),
        inline_file
    );
    assert!(matches!(
        Directory::deserialize(&hex::decode(vector).unwrap()),
        Err(CodecError::InlineEntriesWhileSharded(1))
    ));
}

#[test]
fn test_marker_is_optional() {
    let bytes = hex::decode(SINGLE_FILE).unwrap();
    let without_marker = Directory::deserialize(&bytes[2..]).unwrap();
    assert_eq!(without_marker, Directory::deserialize(&bytes).unwrap());
}

#[test]
fn test_bignum_size_accepted() {
    // size 1024 as a tag 2 bignum instead of a plain integer
    let mut bytes = hex::decode(SINGLE_FILE).unwrap();
    bytes.truncate(bytes.len() - 3);
    bytes.extend_from_slice(&[0xc2, 0x42, 0x04, 0x00]);
    let decoded = Directory::deserialize(&bytes).unwrap();
    assert_eq!(decoded.files["test.txt"].size, 1024);
    assert_eq!(hex::encode(decoded.serialize().unwrap()), SINGLE_FILE);
}

#[test]
fn test_truncated_input() {
    let bytes = hex::decode(SINGLE_FILE).unwrap();
    for len in [0, 1, 2, 5, 20, bytes.len() - 1] {
        assert!(
            Directory::deserialize(&bytes[..len]).is_err(),
            "truncated to {len} bytes"
        );
    }
    assert!(matches!(
        Directory::deserialize(&bytes[..4]),
        Err(CodecError::TooShort(4))
    ));
}

#[test]
fn test_wrong_magic() {
    let vector = EMPTY.replace("53352e70726f", "53352e70726e");
    assert!(matches!(
        Directory::deserialize(&hex::decode(vector).unwrap()),
        Err(CodecError::BadMagic(_))
    ));
}

#[test]
fn test_wrong_arity() {
    // five elements: a trailing empty map after files
    let bytes = hex::decode("5f5d856653352e70726fa0a0a0a0").unwrap();
    assert!(matches!(
        Directory::deserialize(&bytes),
        Err(CodecError::TopLevelArity(5))
    ));
    // three elements
    let bytes = hex::decode("5f5d836653352e70726fa0a0").unwrap();
    assert!(Directory::deserialize(&bytes).is_err());
}

#[test]
fn test_bad_link() {
    // link of 32 bytes instead of 33
    let short = "5f5d846653352e70726fa0a164646f6373a10258201e\
aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa\
a0";
    assert!(matches!(
        Directory::deserialize(&hex::decode(short).unwrap()),
        Err(CodecError::BadLinkLength(32))
    ));

    // unknown link tag
    let unknown = MIXED.replace("0258211e", "02582199");
    assert!(matches!(
        Directory::deserialize(&hex::decode(unknown).unwrap()),
        Err(CodecError::UnknownLinkTag(0x99))
    ));
}
