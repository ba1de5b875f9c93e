//! Lazy directory tree walker
//!
//! Entries are produced one at a time from a stack of open directory listings,
//! children sorted by name, so the order is deterministic. In [`ScanOrder::TopDown`]
//! a directory is yielded before its contents; in [`ScanOrder::BottomUp`] after them.
//! Symlinks are reported as leaves and never descended into.

use mirrorsync_types::{DirEntry, EntryKind, Error, FileSystem, RelativePath, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::vec;
use tracing::{trace, warn};

/// Traversal order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanOrder {
    /// Parents before their descendants
    TopDown,
    /// Descendants before their parents
    BottomUp,
}

/// One entry found under the scanned root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanEntry {
    /// Path relative to the scanned root
    pub relative_path: RelativePath,
    /// Entry type, symlinks not followed
    pub kind: EntryKind,
}

/// A directory below the root that could not be listed.
/// Its subtree is missing from the walk.
#[derive(Debug, Clone)]
pub struct UnreadableDir {
    /// Path of the directory relative to the scanned root
    pub relative_path: RelativePath,
    /// Why listing failed
    pub error: Error,
}

/// Item produced by [`TreeScanner::next_entry`]
pub type ScanResult = std::result::Result<ScanEntry, UnreadableDir>;

struct Frame {
    dir: Option<RelativePath>,
    entries: vec::IntoIter<DirEntry>,
}

/// Walks a tree through a [`FileSystem`]
pub struct TreeScanner {
    fs: Arc<dyn FileSystem>,
    root: PathBuf,
    order: ScanOrder,
    stack: Vec<Frame>,
}

impl TreeScanner {
    /// Open `root` for scanning.
    ///
    /// Fails with [`Error::Path`] if the root does not exist, is not a directory
    /// or cannot be listed.
    pub async fn new(fs: Arc<dyn FileSystem>, root: impl Into<PathBuf>, order: ScanOrder) -> Result<Self> {
        let root = root.into();

        match fs.metadata(&root).await {
            Ok(Some(metadata)) if metadata.is_dir() => {}
            Ok(Some(_)) => return Err(Error::path_error(&root, "not a directory")),
            Ok(None) => return Err(Error::path_error(&root, "does not exist")),
            Err(e) => return Err(Error::path_error(&root, e.to_string())),
        }

        let entries = Self::list(fs.as_ref(), &root)
            .await
            .map_err(|e| Error::path_error(&root, format!("cannot be listed: {}", e)))?;

        Ok(Self {
            fs,
            root,
            order,
            stack: vec![Frame { dir: None, entries }],
        })
    }

    /// Root being scanned
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Next entry of the walk, `None` once the tree is exhausted.
    ///
    /// An `Err` reports a subdirectory that could not be listed; the walk can be
    /// continued past it.
    pub async fn next_entry(&mut self) -> Option<ScanResult> {
        loop {
            let frame = self.stack.last_mut()?;
            let Some(entry) = frame.entries.next() else {
                let finished = self.stack.pop()?;
                match (self.order, finished.dir) {
                    (ScanOrder::BottomUp, Some(dir)) => {
                        return Some(Ok(ScanEntry {
                            relative_path: dir,
                            kind: EntryKind::Directory,
                        }))
                    }
                    _ => continue,
                }
            };

            let relative_path = RelativePath::child_of(frame.dir.as_ref(), &entry.name);
            if entry.kind != EntryKind::Directory {
                trace!("Scanned {} ({:?})", relative_path, entry.kind);
                return Some(Ok(ScanEntry {
                    relative_path,
                    kind: entry.kind,
                }));
            }

            let absolute = relative_path.resolve(&self.root);
            match Self::list(self.fs.as_ref(), &absolute).await {
                Ok(entries) => {
                    self.stack.push(Frame {
                        dir: Some(relative_path.clone()),
                        entries,
                    });
                    if self.order == ScanOrder::TopDown {
                        return Some(Ok(ScanEntry {
                            relative_path,
                            kind: EntryKind::Directory,
                        }));
                    }
                }
                Err(error) => {
                    warn!("Skipping unreadable directory {}: {}", absolute.display(), error);
                    return Some(Err(UnreadableDir {
                        relative_path,
                        error,
                    }));
                }
            }
        }
    }

    /// Drain the whole walk into entries and unreadable directories
    pub async fn collect(mut self) -> (Vec<ScanEntry>, Vec<UnreadableDir>) {
        let mut entries = Vec::new();
        let mut unreadable = Vec::new();
        while let Some(item) = self.next_entry().await {
            match item {
                Ok(entry) => entries.push(entry),
                Err(dir) => unreadable.push(dir),
            }
        }
        (entries, unreadable)
    }

    async fn list(fs: &dyn FileSystem, dir: &Path) -> Result<vec::IntoIter<DirEntry>> {
        let mut entries = fs.read_dir(dir).await?;
        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries.into_iter())
    }
}

impl std::fmt::Debug for TreeScanner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TreeScanner")
            .field("root", &self.root)
            .field("order", &self.order)
            .field("depth", &self.stack.len())
            .finish_non_exhaustive()
    }
}
