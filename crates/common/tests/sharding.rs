//! Integration tests for sharding activation

mod common;

use ::common::config::FsConfig;
use ::common::dir::{Directory, EntryKind};
use ::common::fs::{ListOptions, Metadata};

#[tokio::test]
async fn test_default_threshold() {
    let (fs, _, _) = common::setup_memory_env(FsConfig::default());
    common::populate(&fs, "/many", 1000).await;

    let dir = fs.get_directory("/many").await.unwrap().unwrap();
    assert!(!dir.is_sharded());
    assert!(dir.header.sharding.is_none());
    assert_eq!(dir.files.len(), 1000);

    fs.put_file("/many/file-1000", common::file(1000))
        .await
        .unwrap();

    let dir = fs.get_directory("/many").await.unwrap().unwrap();
    assert!(dir.is_sharded());
    assert!(dir.files.is_empty() && dir.dirs.is_empty());
    let meta = dir.sharding().unwrap();
    assert_eq!(meta.config.bits_per_level, 5);
    assert_eq!(meta.config.max_inline_entries, 1000);
    assert_eq!(meta.root.unwrap().total_entries, 1001);

    for i in (0..=1000).step_by(97) {
        let file = fs.get_file(&format!("/many/file-{i}")).await.unwrap();
        assert_eq!(file, Some(common::file(i)), "file-{i}");
    }
    let listed = common::list_all(&fs, "/many", ListOptions::default()).await;
    assert_eq!(listed.len(), 1001);
}

#[tokio::test]
async fn test_sharded_directory_survives_reencoding() {
    let (fs, _, _) = common::setup_memory_env(common::small_sharding(8));
    common::populate(&fs, "/d", 30).await;

    let dir = fs.get_directory("/d").await.unwrap().unwrap();
    let bytes = dir.serialize().unwrap();
    let decoded = Directory::deserialize(&bytes).unwrap();
    assert_eq!(decoded, dir);
    assert_eq!(decoded.serialize().unwrap(), bytes);
}

#[tokio::test]
async fn test_mutations_in_sharded_directory() {
    let (fs, _, _) = common::setup_memory_env(common::small_sharding(8));
    common::populate(&fs, "/d", 40).await;
    fs.create_directory("/d/sub").await.unwrap();
    fs.put_file("/d/sub/inner.txt", common::file(7)).await.unwrap();

    assert!(fs.get("/d/sub").await.unwrap().unwrap().is_dir());
    assert_eq!(
        fs.get_file("/d/sub/inner.txt").await.unwrap(),
        Some(common::file(7))
    );

    // overwrite keeps history inside the trie too
    fs.put_file("/d/file-3", common::file(300)).await.unwrap();
    let history = fs.file_history("/d/file-3").await.unwrap().unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].size, 3);

    for i in 0..40 {
        assert!(fs.delete(&format!("/d/file-{i}")).await.unwrap());
    }
    assert!(!fs.delete("/d/file-0").await.unwrap());

    // below the threshold but still sharded
    let dir = fs.get_directory("/d").await.unwrap().unwrap();
    assert!(dir.is_sharded());
    let listed = common::list_all(&fs, "/d", ListOptions::default()).await;
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].name, "sub");
    assert_eq!(listed[0].kind(), EntryKind::Directory);
}

#[tokio::test]
async fn test_metadata_is_the_same_flat_or_sharded() {
    let (flat, _, _) = common::setup_memory_env(FsConfig::default());
    let (sharded, _, _) = common::setup_memory_env(common::small_sharding(4));
    for fs in [&flat, &sharded] {
        common::populate(fs, "/d", 12).await;
        fs.create_directory("/d/x").await.unwrap();
    }

    let (Some(Metadata::Directory(a)), Some(Metadata::Directory(b))) = (
        flat.get_metadata("/d").await.unwrap(),
        sharded.get_metadata("/d").await.unwrap(),
    ) else {
        panic!("expected directory metadata");
    };
    assert!(!a.sharded);
    assert!(b.sharded);
    assert_eq!(a.file_count, 12);
    assert_eq!(a.directory_count, 1);
    assert_eq!((a.file_count, a.directory_count), (b.file_count, b.directory_count));
    assert_eq!(a.total_size, (0..12).sum::<u64>());
    assert_eq!(a.total_size, b.total_size);
    assert_eq!(a.oldest_timestamp, Some(1_700_000_000));
    assert_eq!(a.oldest_timestamp, b.oldest_timestamp);
}
