//! Seams between the sync core and its collaborators
//!
//! The core only touches the filesystem through [`FileSystem`] and only reports
//! what it did through [`EventSink`]. Neither trait assumes a particular backend,
//! which lets tests substitute faulty filesystems or recording sinks.

use crate::SyncEvent;
#[cfg(feature = "async")]
use crate::{DirEntry, EntryMetadata, Result};
#[cfg(feature = "async")]
use async_trait::async_trait;
#[cfg(feature = "async")]
use std::path::Path;

/// Boxed reader returned by [`FileSystem::open_read`]
#[cfg(feature = "async")]
pub type FileReader = Box<dyn tokio::io::AsyncRead + Send + Unpin>;

/// Filesystem primitives used by the sync core
#[cfg(feature = "async")]
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Stat a path without following symlinks. `Ok(None)` if nothing exists there.
    async fn metadata(&self, path: &Path) -> Result<Option<EntryMetadata>>;

    /// List the entries of a directory, in no particular order
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Open a file for streaming reads
    async fn open_read(&self, path: &Path) -> Result<FileReader>;

    /// Replace `target` with the content of `source`, carrying over modification
    /// time and permission bits. Returns the number of bytes written.
    async fn write_file_from(&self, source: &Path, target: &Path) -> Result<u64>;

    /// Remove a file or symlink
    async fn remove_file(&self, path: &Path) -> Result<()>;

    /// Remove a directory, failing if it is not empty
    async fn remove_empty_dir(&self, path: &Path) -> Result<()>;

    /// Create a directory and any missing parents
    async fn create_dir_all(&self, path: &Path) -> Result<()>;
}

/// Receiver of structured sync events.
///
/// Called from worker tasks as well as the orchestrator, so implementations must be
/// cheap and thread safe.
pub trait EventSink: Send + Sync {
    /// Handle one event
    fn emit(&self, event: &SyncEvent);
}
