use std::cmp::Ordering;

use futures::stream::{self, BoxStream, StreamExt};

use crate::cursor::{Cursor, CursorError};
use crate::dir::{Directory, Entry, EntryKind};
use crate::shard::{ShardError, ShardItem, ShardPosition};

use super::entries::DirEntries;
use super::FsError;

/// Entries of one directory, pulled lazily
pub type ListStream = BoxStream<'static, Result<ListEntry, FsError>>;

#[derive(Debug, Clone, Default)]
pub struct ListOptions {
    /// Token from a previous [`ListEntry::cursor`]; the listing
    ///  continues after that entry
    pub cursor: Option<String>,
    /// At most this many entries, unlimited when `None` and the
    ///  configured default is 0
    pub limit: Option<usize>,
}

impl ListOptions {
    pub fn after(cursor: impl Into<String>) -> Self {
        Self {
            cursor: Some(cursor.into()),
            limit: None,
        }
    }

    pub fn with_limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListEntry {
    pub name: String,
    pub entry: Entry,
    /// Resume token positioned on this entry
    pub cursor: String,
}

impl ListEntry {
    fn new(name: String, entry: Entry, path: Option<Vec<u32>>) -> Result<Self, FsError> {
        let cursor = Cursor::at(&name, &entry, path).encode()?;
        Ok(Self {
            name,
            entry,
            cursor,
        })
    }

    pub fn kind(&self) -> EntryKind {
        self.entry.kind()
    }

    /// File size; directories have none
    pub fn size(&self) -> Option<u64> {
        self.entry.as_file().map(|file| file.size)
    }

    pub fn timestamp(&self) -> Option<u64> {
        self.entry.timestamp()
    }
}

/// Flat listing order: byte-wise by name, directories first on equal names
fn flat_cmp(name: &str, kind: EntryKind, other_name: &str, other_kind: EntryKind) -> Ordering {
    name.as_bytes()
        .cmp(other_name.as_bytes())
        .then(kind.cmp(&other_kind))
}

pub(crate) async fn list_directory(
    entries: &DirEntries,
    dir: Directory,
    options: &ListOptions,
    default_limit: usize,
) -> Result<ListStream, FsError> {
    let cursor = options.cursor.as_deref().map(Cursor::decode).transpose()?;
    let limit = options.limit.unwrap_or(default_limit);

    let stream = match entries.trie(&dir)? {
        Some((hamt, root)) => {
            let iter = match &cursor {
                Some(cursor) => {
                    // flat and trie listings order entries differently, so a
                    // position taken before sharding activated has no place here
                    let Some(path) = cursor.path.clone() else {
                        return Err(CursorError::Inapplicable(
                            "cursor was issued before the directory was sharded".to_string(),
                        )
                        .into());
                    };
                    if hamt.get(&root, cursor.kind, &cursor.position).await?.is_none() {
                        tracing::warn!(
                            "list_directory: cursor entry {} no longer exists, resuming after its position",
                            cursor
                        );
                    }
                    let position = ShardPosition {
                        kind: cursor.kind,
                        name: cursor.position.clone(),
                        path,
                    };
                    hamt.iter_from(&root, &position)
                        .await
                        .map_err(|e| match e {
                            ShardError::InvalidPath(reason) => {
                                FsError::Cursor(CursorError::Inapplicable(reason))
                            }
                            e => FsError::Shard(e),
                        })?
                }
                None => hamt.iter(&root),
            };
            stream::try_unfold(iter, |mut iter| async move {
                let Some(ShardItem { name, entry, path }) = iter.next().await? else {
                    return Ok::<_, FsError>(None);
                };
                Ok(Some((ListEntry::new(name, entry, Some(path))?, iter)))
            })
            .boxed()
        }
        None => {
            let mut items = dir.inline_entries();
            if let Some(cursor) = &cursor {
                if cursor.path.is_some() {
                    return Err(CursorError::Inapplicable(
                        "trie path given for a directory that is not sharded".to_string(),
                    )
                    .into());
                }
                let start = items.partition_point(|(name, entry)| {
                    flat_cmp(name, entry.kind(), &cursor.position, cursor.kind) != Ordering::Greater
                });
                let found = start > 0 && {
                    let (name, entry) = &items[start - 1];
                    name == &cursor.position && entry.kind() == cursor.kind
                };
                if !found {
                    tracing::warn!(
                        "list_directory: cursor entry {} no longer exists, resuming after its position",
                        cursor
                    );
                }
                items.drain(..start);
            }
            stream::iter(
                items
                    .into_iter()
                    .map(|(name, entry)| ListEntry::new(name, entry, None)),
            )
            .boxed()
        }
    };

    Ok(if limit > 0 {
        stream.take(limit).boxed()
    } else {
        stream
    })
}
