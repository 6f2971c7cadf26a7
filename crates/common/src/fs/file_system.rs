use std::sync::Arc;

use crate::config::FsConfig;
use crate::dir::{DirLink, DirRef, Directory, Entry, EntryKind, FileRef};
use crate::hash::Hash;
use crate::registry::{Registry, RegistryEntry, PUBLIC_KEY_SIZE};
use crate::store::{put_verified, BlobStore};

use super::entries::DirEntries;
use super::list::{list_directory, ListOptions, ListStream};
use super::metadata::{DirMetadata, FileMetadata, Metadata};
use super::{split_path, FsError};

/// How a loaded directory gets written back
#[derive(Debug, Clone)]
enum Source {
    /// Published under a registry key
    Registry {
        key: [u8; PUBLIC_KEY_SIZE],
        current: Option<RegistryEntry>,
    },
    /// Linked by content id from its parent, under `name`
    Parent { name: String, dir_ref: Option<DirRef> },
}

#[derive(Debug, Clone)]
struct Loaded {
    dir: Directory,
    source: Source,
}

/// A file system rooted at a registry pointer.
///
/// Every mutation loads the directories along the path, changes the
///  last one and writes them back bottom-up. A missing root pointer
///  reads as an empty directory. Concurrent writers race at the
///  registry; the last accepted revision wins.
#[derive(Clone, Debug)]
pub struct FileSystem {
    store: Arc<dyn BlobStore>,
    registry: Arc<dyn Registry>,
    root_key: [u8; PUBLIC_KEY_SIZE],
    config: FsConfig,
    entries: DirEntries,
}

impl FileSystem {
    pub fn new(
        store: Arc<dyn BlobStore>,
        registry: Arc<dyn Registry>,
        root_key: [u8; PUBLIC_KEY_SIZE],
        config: FsConfig,
    ) -> Result<Self, FsError> {
        config.validate()?;
        let entries = DirEntries::new(store.clone(), config.sharding);
        Ok(Self {
            store,
            registry,
            root_key,
            config,
            entries,
        })
    }

    pub fn config(&self) -> &FsConfig {
        &self.config
    }

    pub fn root_key(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.root_key
    }

    pub fn store(&self) -> &Arc<dyn BlobStore> {
        &self.store
    }

    /// Store file content and return a reference to it, typed by name
    pub async fn put_blob(&self, name: &str, data: Vec<u8>) -> Result<FileRef, FsError> {
        let size = data.len() as u64;
        let hash = put_verified(self.store.as_ref(), data).await?;
        let (seconds, nanos) = now();
        Ok(FileRef::new(hash, size)
            .with_media_type_from_name(name)
            .with_timestamp(seconds, Some(nanos)))
    }

    /// Write a file reference at `path`, creating missing parents.
    ///
    /// Overwriting keeps the previous reference as `prev` unless the
    ///  new reference already carries its own history.
    pub async fn put_file(&self, path: &str, mut file: FileRef) -> Result<(), FsError> {
        let (parents, name) = split_parent(path)?;
        let mut stack = self.open(&parents, true).await?.ok_or_else(|| {
            FsError::InvalidPath(path.to_string())
        })?;
        let target = last_mut(&mut stack)?;

        if file.prev.is_none() {
            if let Some(Entry::File(previous)) = self
                .entries
                .get(&target.dir, EntryKind::File, &name)
                .await?
            {
                file.prev = Some(Box::new(previous));
            }
        }

        tracing::debug!("FileSystem::put_file: writing {} ({} bytes)", path, file.size);
        self.entries
            .insert(&mut target.dir, &name, Entry::File(file))
            .await?;
        self.commit(stack).await
    }

    /// Create an empty directory at `path`, creating missing parents
    pub async fn create_directory(&self, path: &str) -> Result<DirRef, FsError> {
        let hash = put_verified(self.store.as_ref(), Directory::new().serialize()?).await?;
        let (seconds, nanos) = now();
        let dir_ref = DirRef::new(DirLink::FixedHashBlake3(hash)).with_created(seconds, Some(nanos));
        self.link_directory(path, dir_ref.clone()).await?;
        Ok(dir_ref)
    }

    /// Link the directory published under `public_key` at `path`.
    ///
    /// Writes below it publish new revisions of that key and leave
    ///  its parents untouched.
    pub async fn create_mutable_directory(
        &self,
        path: &str,
        public_key: [u8; PUBLIC_KEY_SIZE],
    ) -> Result<DirRef, FsError> {
        let (seconds, nanos) = now();
        let dir_ref =
            DirRef::new(DirLink::MutableRegistryEd25519(public_key)).with_created(seconds, Some(nanos));
        self.link_directory(path, dir_ref.clone()).await?;
        Ok(dir_ref)
    }

    async fn link_directory(&self, path: &str, dir_ref: DirRef) -> Result<(), FsError> {
        let (parents, name) = split_parent(path)?;
        let mut stack = self.open(&parents, true).await?.ok_or_else(|| {
            FsError::InvalidPath(path.to_string())
        })?;
        let target = last_mut(&mut stack)?;

        if self
            .entries
            .get(&target.dir, EntryKind::Directory, &name)
            .await?
            .is_some()
        {
            return Err(FsError::PathAlreadyExists(path.to_string()));
        }

        tracing::debug!("FileSystem::link_directory: creating {}", path);
        self.entries
            .insert(&mut target.dir, &name, Entry::Directory(dir_ref))
            .await?;
        self.commit(stack).await
    }

    /// The entry at `path`, preferring a file over a directory of the same name
    pub async fn get(&self, path: &str) -> Result<Option<Entry>, FsError> {
        let (parents, name) = split_parent(path)?;
        let Some(parent) = self.resolve(&parents).await? else {
            return Ok(None);
        };
        if let Some(file) = self.entries.get(&parent, EntryKind::File, &name).await? {
            return Ok(Some(file));
        }
        Ok(self
            .entries
            .get(&parent, EntryKind::Directory, &name)
            .await?)
    }

    pub async fn get_file(&self, path: &str) -> Result<Option<FileRef>, FsError> {
        let (parents, name) = split_parent(path)?;
        let Some(parent) = self.resolve(&parents).await? else {
            return Ok(None);
        };
        match self.entries.get(&parent, EntryKind::File, &name).await? {
            Some(Entry::File(file)) => Ok(Some(file)),
            _ => Ok(None),
        }
    }

    /// The directory object at `path`; the root always exists
    pub async fn get_directory(&self, path: &str) -> Result<Option<Directory>, FsError> {
        self.resolve(&split_path(path)?).await
    }

    /// Remove the file at `path`, or the directory if there is no such file.
    ///
    /// Returns whether anything was removed.
    pub async fn delete(&self, path: &str) -> Result<bool, FsError> {
        let (parents, name) = split_parent(path)?;
        let Some(mut stack) = self.open(&parents, false).await? else {
            return Ok(false);
        };
        let target = last_mut(&mut stack)?;

        let mut removed = self
            .entries
            .remove(&mut target.dir, EntryKind::File, &name)
            .await?;
        if removed.is_none() {
            removed = self
                .entries
                .remove(&mut target.dir, EntryKind::Directory, &name)
                .await?;
        }
        let Some(removed) = removed else {
            return Ok(false);
        };

        tracing::debug!("FileSystem::delete: removed {} {}", removed.kind(), path);
        self.commit(stack).await?;
        Ok(true)
    }

    /// List the directory at `path`. A missing directory lists as empty.
    pub async fn list(&self, path: &str, options: ListOptions) -> Result<ListStream, FsError> {
        let dir = self
            .resolve(&split_path(path)?)
            .await?
            .unwrap_or_default();
        list_directory(
            &self.entries,
            dir,
            &options,
            self.config.listing.default_limit,
        )
        .await
    }

    pub async fn get_metadata(&self, path: &str) -> Result<Option<Metadata>, FsError> {
        let segments = split_path(path)?;
        let Some((name, parents)) = segments.split_last() else {
            let root = self.load_registry(&self.root_key).await?.0;
            return Ok(Some(Metadata::Directory(
                self.dir_metadata("", None, root).await?,
            )));
        };

        let Some(entry) = self.get(path).await? else {
            return Ok(None);
        };
        match entry {
            Entry::File(file) => Ok(Some(Metadata::File(FileMetadata::new(name, &file)))),
            Entry::Directory(dir_ref) => {
                let dir = self.load(&dir_ref).await?.0;
                tracing::debug!(
                    "FileSystem::get_metadata: gathering {} under {:?}",
                    name,
                    parents
                );
                Ok(Some(Metadata::Directory(
                    self.dir_metadata(name, Some(&dir_ref), dir).await?,
                )))
            }
        }
    }

    async fn dir_metadata(
        &self,
        name: &str,
        dir_ref: Option<&DirRef>,
        dir: Directory,
    ) -> Result<DirMetadata, FsError> {
        let mut meta = DirMetadata::new(name, dir_ref, dir.is_sharded());
        tracing::debug!(
            "collecting metadata over {} entries of {:?}",
            DirEntries::len(&dir),
            name
        );
        match self.entries.trie(&dir)? {
            Some((hamt, root)) => {
                let mut iter = hamt.iter(&root);
                while let Some(item) = iter.next().await? {
                    meta.add(&item.entry);
                }
            }
            None => {
                for (_, entry) in dir.inline_entries() {
                    meta.add(&entry);
                }
            }
        }
        Ok(meta)
    }

    /// Every version of the file at `path`, newest first.
    ///
    /// Each version is returned without its own `prev` chain.
    pub async fn file_history(&self, path: &str) -> Result<Option<Vec<FileRef>>, FsError> {
        let Some(file) = self.get_file(path).await? else {
            return Ok(None);
        };
        Ok(Some(
            file.history()
                .map(|version| FileRef {
                    prev: None,
                    ..version.clone()
                })
                .collect(),
        ))
    }

    async fn load_registry(
        &self,
        key: &[u8; PUBLIC_KEY_SIZE],
    ) -> Result<(Directory, Option<RegistryEntry>), FsError> {
        let Some(current) = self.registry.get(key).await? else {
            return Ok((Directory::new(), None));
        };
        let dir = self.load_blob(&current.hash).await?;
        Ok((dir, Some(current)))
    }

    async fn load_blob(&self, hash: &Hash) -> Result<Directory, FsError> {
        tracing::debug!("FileSystem::load_blob: loading directory {}", hash);
        let data = self.store.get(hash).await?;
        Ok(Directory::deserialize(&data)?)
    }

    /// Load the directory a reference points at
    async fn load(&self, dir_ref: &DirRef) -> Result<(Directory, Option<RegistryEntry>), FsError> {
        match &dir_ref.link {
            DirLink::FixedHashBlake3(hash) => Ok((self.load_blob(hash).await?, None)),
            DirLink::MutableRegistryEd25519(key) => self.load_registry(key).await,
        }
    }

    /// Follow `segments` from the root, or `None` if a directory is missing
    async fn resolve(&self, segments: &[String]) -> Result<Option<Directory>, FsError> {
        let mut dir = self.load_registry(&self.root_key).await?.0;
        for segment in segments {
            match self
                .entries
                .get(&dir, EntryKind::Directory, segment)
                .await?
            {
                Some(Entry::Directory(dir_ref)) => dir = self.load(&dir_ref).await?.0,
                _ => return Ok(None),
            }
        }
        Ok(Some(dir))
    }

    /// Load the chain of directories from the root down through `segments`.
    ///
    /// Missing directories are started empty when `create` is set;
    ///  otherwise a missing directory yields `None`.
    async fn open(&self, segments: &[String], create: bool) -> Result<Option<Vec<Loaded>>, FsError> {
        let (root, current) = self.load_registry(&self.root_key).await?;
        let mut stack = vec![Loaded {
            dir: root,
            source: Source::Registry {
                key: self.root_key,
                current,
            },
        }];

        for segment in segments {
            let parent = last_mut(&mut stack)?;
            let child = match self
                .entries
                .get(&parent.dir, EntryKind::Directory, segment)
                .await?
            {
                Some(Entry::Directory(dir_ref)) => {
                    let (dir, current) = self.load(&dir_ref).await?;
                    let source = match dir_ref.link {
                        DirLink::MutableRegistryEd25519(key) => Source::Registry { key, current },
                        DirLink::FixedHashBlake3(_) => Source::Parent {
                            name: segment.clone(),
                            dir_ref: Some(dir_ref),
                        },
                    };
                    Loaded { dir, source }
                }
                _ if create => {
                    tracing::debug!("FileSystem::open: creating missing directory {}", segment);
                    Loaded {
                        dir: Directory::new(),
                        source: Source::Parent {
                            name: segment.clone(),
                            dir_ref: None,
                        },
                    }
                }
                _ => return Ok(None),
            };
            stack.push(child);
        }
        Ok(Some(stack))
    }

    /// Write a loaded chain back, deepest first, stopping at the first
    ///  directory published through the registry
    async fn commit(&self, mut stack: Vec<Loaded>) -> Result<(), FsError> {
        while let Some(Loaded { dir, source }) = stack.pop() {
            let hash = put_verified(self.store.as_ref(), dir.serialize()?).await?;
            match source {
                Source::Registry { key, current } => {
                    let entry = match current {
                        Some(current) => current.next(hash),
                        None => RegistryEntry::new(key, 0, hash),
                    };
                    tracing::debug!(
                        "FileSystem::commit: publishing {} at revision {} for {}",
                        hash,
                        entry.revision,
                        hex::encode(key)
                    );
                    self.registry.set(entry).await?;
                    return Ok(());
                }
                Source::Parent { name, dir_ref } => {
                    let dir_ref = match dir_ref {
                        Some(mut dir_ref) => {
                            dir_ref.link = DirLink::FixedHashBlake3(hash);
                            dir_ref
                        }
                        None => {
                            let (seconds, nanos) = now();
                            DirRef::new(DirLink::FixedHashBlake3(hash))
                                .with_created(seconds, Some(nanos))
                        }
                    };
                    let parent = last_mut(&mut stack)?;
                    self.entries
                        .insert(&mut parent.dir, &name, Entry::Directory(dir_ref))
                        .await?;
                }
            }
        }
        Ok(())
    }
}

fn split_parent(path: &str) -> Result<(Vec<String>, String), FsError> {
    let mut segments = split_path(path)?;
    let name = segments
        .pop()
        .ok_or_else(|| FsError::InvalidPath(path.to_string()))?;
    Ok((segments, name))
}

fn last_mut(stack: &mut [Loaded]) -> Result<&mut Loaded, FsError> {
    stack
        .last_mut()
        .ok_or_else(|| FsError::Default(anyhow::anyhow!("directory has no parent")))
}

fn now() -> (u64, u32) {
    let now = chrono::Utc::now();
    (
        u64::try_from(now.timestamp()).unwrap_or_default(),
        now.timestamp_subsec_nanos(),
    )
}
