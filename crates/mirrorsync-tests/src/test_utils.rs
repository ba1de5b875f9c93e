//! Unified test utilities for mirrorsync integration tests
//!
//! Helpers here panic on I/O failure: they only run inside tests, where a
//! broken fixture should fail loudly.

use async_trait::async_trait;
use mirrorsync_io::{digest_bytes, LocalFileSystem};
use mirrorsync_types::{
    DirEntry, Digest, EntryMetadata, Error, FileReader, FileSystem, Result,
};
use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Deterministic pseudo-random content, distinct for distinct seeds
pub fn generate_test_data(size: usize, seed: u64) -> Vec<u8> {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    let mut data = Vec::with_capacity(size);
    let mut hasher = DefaultHasher::new();
    seed.hash(&mut hasher);

    for i in 0..size {
        i.hash(&mut hasher);
        data.push((hasher.finish() % 256) as u8);
    }
    data
}

/// Write `contents` to `root/relative`, creating parent directories
pub fn write_file(root: &Path, relative: &str, contents: impl AsRef<[u8]>) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).expect("Failed to create parent directory");
    }
    fs::write(&path, contents).expect("Failed to write test file");
    path
}

/// Create `root/relative` and any missing parents
pub fn create_dir(root: &Path, relative: &str) -> PathBuf {
    let path = root.join(relative);
    fs::create_dir_all(&path).expect("Failed to create test directory");
    path
}

/// Build a tree of text files from `(relative path, contents)` pairs
pub fn create_tree(root: &Path, files: &[(&str, &str)]) {
    fs::create_dir_all(root).expect("Failed to create tree root");
    for (relative, contents) in files {
        write_file(root, relative, contents);
    }
}

/// What a snapshot records for one path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotEntry {
    /// A directory
    Directory,
    /// A regular file and the digest of its content
    File(Digest),
    /// A symlink or special file
    Other,
}

/// Every path below a root, keyed by path relative to the root
pub type TreeSnapshot = BTreeMap<PathBuf, SnapshotEntry>;

/// Walk `root` without following symlinks and record every entry below it
pub fn snapshot_tree(root: &Path) -> TreeSnapshot {
    let mut snapshot = TreeSnapshot::new();

    for entry in WalkDir::new(root).min_depth(1).follow_links(false) {
        let entry = entry.expect("Failed to walk tree");
        let relative = entry
            .path()
            .strip_prefix(root)
            .expect("Walked path outside root")
            .to_path_buf();

        let file_type = entry.file_type();
        let recorded = if file_type.is_dir() {
            SnapshotEntry::Directory
        } else if file_type.is_file() {
            let content = fs::read(entry.path()).expect("Failed to read file");
            SnapshotEntry::File(digest_bytes(&content))
        } else {
            SnapshotEntry::Other
        };
        snapshot.insert(relative, recorded);
    }

    snapshot
}

/// Only the regular files of a snapshot
pub fn file_digests(snapshot: &TreeSnapshot) -> BTreeMap<PathBuf, Digest> {
    snapshot
        .iter()
        .filter_map(|(path, entry)| match entry {
            SnapshotEntry::File(digest) => Some((path.clone(), *digest)),
            _ => None,
        })
        .collect()
}

/// Local filesystem that appends a byte to every written file named `target`,
/// so the copy no longer matches its source.
#[derive(Debug)]
pub struct CorruptingFileSystem {
    inner: LocalFileSystem,
    target: OsString,
}

impl CorruptingFileSystem {
    /// Corrupt writes to files with this file name
    pub fn new(target: impl Into<OsString>) -> Self {
        Self {
            inner: LocalFileSystem::new(),
            target: target.into(),
        }
    }
}

#[async_trait]
impl FileSystem for CorruptingFileSystem {
    async fn metadata(&self, path: &Path) -> Result<Option<EntryMetadata>> {
        self.inner.metadata(path).await
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        self.inner.read_dir(path).await
    }

    async fn open_read(&self, path: &Path) -> Result<FileReader> {
        self.inner.open_read(path).await
    }

    async fn write_file_from(&self, source: &Path, target: &Path) -> Result<u64> {
        let bytes = self.inner.write_file_from(source, target).await?;
        if target.file_name() == Some(self.target.as_os_str()) {
            let mut content = fs::read(target).map_err(|e| Error::io(target, &e))?;
            content.push(0xff);
            fs::write(target, content).map_err(|e| Error::io(target, &e))?;
        }
        Ok(bytes)
    }

    async fn remove_file(&self, path: &Path) -> Result<()> {
        self.inner.remove_file(path).await
    }

    async fn remove_empty_dir(&self, path: &Path) -> Result<()> {
        self.inner.remove_empty_dir(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> Result<()> {
        self.inner.create_dir_all(path).await
    }
}
