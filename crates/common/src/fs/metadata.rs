use crate::dir::{DirLink, DirRef, Entry, FileRef};
use crate::hash::Hash;

#[derive(Debug, Clone, PartialEq)]
pub enum Metadata {
    File(FileMetadata),
    Directory(DirMetadata),
}

impl Metadata {
    pub fn name(&self) -> &str {
        match self {
            Metadata::File(file) => &file.name,
            Metadata::Directory(dir) => &dir.name,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Metadata::Directory(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FileMetadata {
    pub name: String,
    pub hash: Hash,
    pub size: u64,
    pub media_type: Option<String>,
    pub timestamp: Option<u64>,
    /// Number of versions including this one
    pub version_count: usize,
}

impl FileMetadata {
    pub(crate) fn new(name: &str, file: &FileRef) -> Self {
        Self {
            name: name.to_string(),
            hash: file.hash,
            size: file.size,
            media_type: file.media_type.clone(),
            timestamp: file.timestamp,
            version_count: file.version_count(),
        }
    }
}

/// Facts about a directory gathered from its immediate entries
#[derive(Debug, Clone, PartialEq, Default)]
pub struct DirMetadata {
    pub name: String,
    /// How the parent links to it; the root has no link
    pub link: Option<DirLink>,
    pub created: Option<u64>,
    pub file_count: u64,
    pub directory_count: u64,
    /// Sum of the sizes of the immediate files
    pub total_size: u64,
    pub oldest_timestamp: Option<u64>,
    pub newest_timestamp: Option<u64>,
    pub sharded: bool,
}

impl DirMetadata {
    pub(crate) fn new(name: &str, dir_ref: Option<&DirRef>, sharded: bool) -> Self {
        Self {
            name: name.to_string(),
            link: dir_ref.map(|r| r.link),
            created: dir_ref.and_then(|r| r.ts_seconds),
            sharded,
            ..Default::default()
        }
    }

    pub(crate) fn add(&mut self, entry: &Entry) {
        match entry {
            Entry::File(file) => {
                self.file_count += 1;
                self.total_size = self.total_size.saturating_add(file.size);
            }
            Entry::Directory(_) => self.directory_count += 1,
        }
        if let Some(ts) = entry.timestamp() {
            self.oldest_timestamp = Some(self.oldest_timestamp.map_or(ts, |t| t.min(ts)));
            self.newest_timestamp = Some(self.newest_timestamp.map_or(ts, |t| t.max(ts)));
        }
    }
}
