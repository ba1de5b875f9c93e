//! Core data types for mirrorsync
//!
//! These types carry one sync cycle from the source scan to the final outcome:
//! [`RelativePath`] is the join key between the two trees, [`FileEntry`] and
//! [`CopyTask`] describe work found by the diff stage, [`CopyOutcome`] is what a
//! worker reports back and [`SyncOutcome`] is the aggregate returned to the caller.

use crate::{EntryError, Error, Result};
use chrono::{DateTime, Utc};
#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};
use std::ffi::OsStr;
use std::fmt;
use std::path::{Component, Path, PathBuf};
use std::time::{Duration, SystemTime};

/// Unique identifier for a sync cycle
pub type CycleId = uuid::Uuid;

/// A path relative to a tree root.
///
/// Never empty and never escapes the root: only normal components are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(try_from = "PathBuf", into = "PathBuf"))]
pub struct RelativePath(PathBuf);

impl RelativePath {
    /// Validate and normalize a relative path
    pub fn new<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        if path.as_os_str().is_empty() {
            return Err(Error::invalid_path(path, "path is empty"));
        }

        for component in path.components() {
            match component {
                Component::Normal(_) => {}
                Component::ParentDir => {
                    return Err(Error::invalid_path(path, "path must not contain '..'"));
                }
                Component::CurDir => {
                    return Err(Error::invalid_path(path, "path must not contain '.'"));
                }
                Component::RootDir | Component::Prefix(_) => {
                    return Err(Error::invalid_path(path, "path must be relative"));
                }
            }
        }

        // Drops duplicate and trailing separators
        Ok(Self(path.components().collect()))
    }

    /// Express `path` relative to `root`
    pub fn from_root(root: &Path, path: &Path) -> Result<Self> {
        let relative = path.strip_prefix(root).map_err(|_| {
            Error::invalid_path(path, format!("not under root '{}'", root.display()))
        })?;
        Self::new(relative)
    }

    /// Path of the entry `name` inside `parent`, or at the root when `parent` is `None`.
    ///
    /// `name` must be a single directory entry name as returned by a directory listing.
    pub fn child_of(parent: Option<&RelativePath>, name: &OsStr) -> Self {
        debug_assert!(
            matches!(
                Path::new(name).components().collect::<Vec<_>>().as_slice(),
                [Component::Normal(_)]
            ),
            "directory entry name must be a single component"
        );
        match parent {
            Some(parent) => Self(parent.0.join(name)),
            None => Self(PathBuf::from(name)),
        }
    }

    /// Parent directory, `None` for entries directly under the root
    pub fn parent(&self) -> Option<RelativePath> {
        self.0
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .map(|parent| Self(parent.to_path_buf()))
    }

    /// Final component
    pub fn file_name(&self) -> &OsStr {
        // Validation guarantees at least one normal component
        self.0.file_name().unwrap_or_else(|| self.0.as_os_str())
    }

    /// Number of components
    pub fn depth(&self) -> usize {
        self.0.components().count()
    }

    /// Whether `self` is `ancestor` or lies beneath it
    pub fn is_within(&self, ancestor: &RelativePath) -> bool {
        self.0.starts_with(&ancestor.0)
    }

    /// Absolute location of this path under `root`
    pub fn resolve(&self, root: &Path) -> PathBuf {
        root.join(&self.0)
    }

    /// Borrow as a [`Path`]
    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for RelativePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

impl AsRef<Path> for RelativePath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl TryFrom<PathBuf> for RelativePath {
    type Error = Error;

    fn try_from(path: PathBuf) -> Result<Self> {
        Self::new(path)
    }
}

impl TryFrom<&str> for RelativePath {
    type Error = Error;

    fn try_from(path: &str) -> Result<Self> {
        Self::new(path)
    }
}

impl From<RelativePath> for PathBuf {
    fn from(path: RelativePath) -> Self {
        path.0
    }
}

/// Fixed-length content fingerprint of a file
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; Digest::LEN]);

impl Digest {
    /// Digest length in bytes
    pub const LEN: usize = 32;

    /// Wrap raw digest bytes
    pub const fn from_bytes(bytes: [u8; Self::LEN]) -> Self {
        Self(bytes)
    }

    /// Raw digest bytes
    pub fn as_bytes(&self) -> &[u8; Self::LEN] {
        &self.0
    }

    /// Lowercase hexadecimal representation
    pub fn to_hex(&self) -> String {
        use fmt::Write;
        self.0
            .iter()
            .fold(String::with_capacity(Self::LEN * 2), |mut hex, byte| {
                let _ = write!(hex, "{:02x}", byte);
                hex
            })
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", &self.to_hex()[..16])
    }
}

/// Type of a filesystem entry, as seen without following symlinks
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum EntryKind {
    /// Regular file
    File,
    /// Directory
    Directory,
    /// Symbolic link (never followed)
    Symlink,
    /// Sockets, devices, fifos
    Other,
}

/// Stat result for a single path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryMetadata {
    /// Entry type
    pub kind: EntryKind,
    /// Size in bytes
    pub len: u64,
    /// Last modification time, when the platform reports one
    pub modified: Option<SystemTime>,
}

impl EntryMetadata {
    /// Whether the entry is a regular file
    pub fn is_file(&self) -> bool {
        self.kind == EntryKind::File
    }

    /// Whether the entry is a directory
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Directory
    }
}

/// One item of a directory listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    /// Entry name within its directory
    pub name: std::ffi::OsString,
    /// Entry type
    pub kind: EntryKind,
}

/// A file discovered in the source tree during one cycle
#[derive(Debug, Clone)]
pub struct FileEntry {
    /// Path relative to both roots
    pub relative_path: RelativePath,
    /// Absolute path under the source root
    pub source_path: PathBuf,
    /// Absolute path under the replica root
    pub replica_path: PathBuf,
    /// Source content digest, filled in once computed
    pub digest: Option<Digest>,
}

impl FileEntry {
    /// Create an entry for `relative_path` under the two roots
    pub fn new(relative_path: RelativePath, source_root: &Path, replica_root: &Path) -> Self {
        Self {
            source_path: relative_path.resolve(source_root),
            replica_path: relative_path.resolve(replica_root),
            relative_path,
            digest: None,
        }
    }

    /// Turn this entry into a pending copy
    pub fn into_task(self) -> CopyTask {
        CopyTask {
            relative_path: self.relative_path,
            source_path: self.source_path,
            replica_path: self.replica_path,
        }
    }
}

/// One pending copy, consumed exactly once by the worker pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyTask {
    /// Path relative to both roots
    pub relative_path: RelativePath,
    /// File to read
    pub source_path: PathBuf,
    /// File to write
    pub replica_path: PathBuf,
}

/// Result of executing one [`CopyTask`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CopyOutcome {
    /// Path relative to both roots
    pub relative_path: RelativePath,
    /// Bytes written to the replica
    pub bytes_copied: u64,
    /// Failure, if the copy or its verification did not succeed
    pub error: Option<EntryError>,
}

impl CopyOutcome {
    /// A verified copy
    pub fn success(relative_path: RelativePath, bytes_copied: u64) -> Self {
        Self {
            relative_path,
            bytes_copied,
            error: None,
        }
    }

    /// A failed copy
    pub fn failure(relative_path: RelativePath, error: &Error) -> Self {
        Self {
            error: Some(EntryError::from_error(relative_path.clone(), error)),
            relative_path,
            bytes_copied: 0,
        }
    }

    /// Whether the copy succeeded and was verified
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Phases of a sync cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SyncPhase {
    /// No cycle running
    #[default]
    Idle,
    /// Walking the source tree and dispatching copies
    Scanning,
    /// Waiting for dispatched copies to finish
    Copying,
    /// Removing orphaned replica entries
    Deleting,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Scanning => "scanning",
            Self::Copying => "copying",
            Self::Deleting => "deleting",
        };
        f.write_str(name)
    }
}

/// Structured events emitted while a cycle runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The cycle entered a new phase
    PhaseChanged(SyncPhase),
    /// A replica directory was created
    CreatedDir(RelativePath),
    /// A file was copied and verified
    Copied {
        /// Path relative to both roots
        path: RelativePath,
        /// Bytes written
        bytes: u64,
    },
    /// An orphaned replica file was removed
    RemovedFile(RelativePath),
    /// An orphaned, empty replica directory was removed
    RemovedDir(RelativePath),
    /// An entry failed
    Error(EntryError),
}

/// Aggregate result of one sync cycle
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SyncOutcome {
    /// Cycle identifier
    pub cycle_id: CycleId,
    /// Wall clock time the cycle started
    pub started_at: DateTime<Utc>,
    /// Time taken by the cycle
    pub duration: Duration,
    /// Files copied and verified
    pub files_copied: u64,
    /// Source files whose replica was already identical
    pub files_unchanged: u64,
    /// Bytes written to the replica
    pub bytes_copied: u64,
    /// Replica directories created
    pub directories_created: u64,
    /// Orphaned replica files removed
    pub files_removed: u64,
    /// Orphaned replica directories removed
    pub directories_removed: u64,
    /// Per-entry failures
    pub errors: Vec<EntryError>,
    /// The cycle stopped early because cancellation was requested
    pub cancelled: bool,
}

impl SyncOutcome {
    /// Create an empty outcome for a cycle starting now
    pub fn new() -> Self {
        Self {
            cycle_id: uuid::Uuid::new_v4(),
            started_at: Utc::now(),
            duration: Duration::default(),
            files_copied: 0,
            files_unchanged: 0,
            bytes_copied: 0,
            directories_created: 0,
            files_removed: 0,
            directories_removed: 0,
            errors: Vec::new(),
            cancelled: false,
        }
    }

    /// Fold one copy outcome into the totals
    pub fn record_copy(&mut self, outcome: CopyOutcome) {
        match outcome.error {
            None => {
                self.files_copied += 1;
                self.bytes_copied += outcome.bytes_copied;
            }
            Some(error) => self.errors.push(error),
        }
    }

    /// Record a per-entry failure
    pub fn record_error(&mut self, error: EntryError) {
        self.errors.push(error);
    }

    /// Number of copy and removal actions taken
    pub fn total_actions(&self) -> u64 {
        self.files_copied + self.files_removed + self.directories_removed
    }

    /// No entry failed and the cycle ran to completion
    pub fn is_clean(&self) -> bool {
        self.errors.is_empty() && !self.cancelled
    }
}

impl Default for SyncOutcome {
    fn default() -> Self {
        Self::new()
    }
}
