use std::fmt;

use super::dir_ref::DirRef;
use super::file_ref::FileRef;

/// Which namespace of a directory an entry lives in.
///
/// Directories order before files when names tie.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryKind {
    Directory,
    File,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::Directory => "directory",
            EntryKind::File => "file",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "directory" => Some(EntryKind::Directory),
            "file" => Some(EntryKind::File),
            _ => None,
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directory entry of either kind
#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Directory(DirRef),
    File(FileRef),
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self {
            Entry::Directory(_) => EntryKind::Directory,
            Entry::File(_) => EntryKind::File,
        }
    }

    /// Modification time for files, creation time for directories
    pub fn timestamp(&self) -> Option<u64> {
        match self {
            Entry::Directory(dir) => dir.ts_seconds,
            Entry::File(file) => file.timestamp,
        }
    }

    pub fn as_file(&self) -> Option<&FileRef> {
        match self {
            Entry::File(file) => Some(file),
            Entry::Directory(_) => None,
        }
    }

    pub fn as_dir(&self) -> Option<&DirRef> {
        match self {
            Entry::Directory(dir) => Some(dir),
            Entry::File(_) => None,
        }
    }

    pub fn is_dir(&self) -> bool {
        matches!(self, Entry::Directory(_))
    }

    pub fn is_file(&self) -> bool {
        matches!(self, Entry::File(_))
    }
}
