//! Change detection and copy dispatch
//!
//! The source tree is walked top-down. Every directory is mirrored before anything
//! inside it, and every file whose replica is missing or differs is handed to the
//! [`WorkerPool`]. What the walk saw is kept in a [`SourceSnapshot`] for the
//! deletion pass.

use crate::events::record_failure;
use crate::pool::WorkerPool;
use crate::scanner::{ScanOrder, TreeScanner};
use mirrorsync_io::DigestComputer;
use mirrorsync_types::{
    CompareMode, EntryKind, EntryMetadata, Error, EventSink, FileEntry, FileSystem, RelativePath,
    Result, SyncEvent, SyncOutcome,
};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace};

/// Type of change detected for a source file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// Nothing exists at the replica path
    Added,
    /// The replica entry differs from the source file
    Modified,
    /// The replica file is identical
    Unchanged,
}

impl ChangeType {
    /// Whether the file has to be copied
    pub fn needs_copy(self) -> bool {
        !matches!(self, Self::Unchanged)
    }
}

/// Relative paths seen in the source during one walk
#[derive(Debug, Clone, Default)]
pub struct SourceSnapshot {
    files: HashSet<RelativePath>,
    directories: HashSet<RelativePath>,
    unreadable: Vec<RelativePath>,
}

impl SourceSnapshot {
    /// Create an empty snapshot
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a source file
    pub fn add_file(&mut self, path: RelativePath) {
        self.files.insert(path);
    }

    /// Record a source directory
    pub fn add_directory(&mut self, path: RelativePath) {
        self.directories.insert(path);
    }

    /// Record a source directory whose contents are unknown
    pub fn add_unreadable(&mut self, path: RelativePath) {
        self.unreadable.push(path);
    }

    /// Whether the source has a file at `path`
    pub fn contains_file(&self, path: &RelativePath) -> bool {
        self.files.contains(path)
    }

    /// Whether the source has a directory at `path`
    pub fn contains_directory(&self, path: &RelativePath) -> bool {
        self.directories.contains(path)
    }

    /// Whether `path` lies in a source subtree that could not be listed
    pub fn is_protected(&self, path: &RelativePath) -> bool {
        self.unreadable.iter().any(|dir| path.is_within(dir))
    }

    /// Number of source files seen
    pub fn file_count(&self) -> usize {
        self.files.len()
    }

    /// Number of source directories seen
    pub fn directory_count(&self) -> usize {
        self.directories.len()
    }
}

/// Compares the source tree against the replica and dispatches copies
pub struct DiffStage {
    fs: Arc<dyn FileSystem>,
    digests: DigestComputer,
    compare_mode: CompareMode,
    sink: Arc<dyn EventSink>,
    source_root: PathBuf,
    replica_root: PathBuf,
}

impl DiffStage {
    /// Create a stage for one source/replica pair
    pub fn new(
        fs: Arc<dyn FileSystem>,
        digests: DigestComputer,
        compare_mode: CompareMode,
        sink: Arc<dyn EventSink>,
        source_root: impl Into<PathBuf>,
        replica_root: impl Into<PathBuf>,
    ) -> Self {
        Self {
            fs,
            digests,
            compare_mode,
            sink,
            source_root: source_root.into(),
            replica_root: replica_root.into(),
        }
    }

    /// Walk the source, mirror directories and submit copies to `pool`.
    ///
    /// Stops dispatching when `cancel` fires; the returned snapshot is then
    /// incomplete. Fails only if the source root cannot be enumerated.
    pub async fn run(
        &self,
        pool: &mut WorkerPool,
        outcome: &mut SyncOutcome,
        cancel: &CancellationToken,
    ) -> Result<SourceSnapshot> {
        let mut scanner =
            TreeScanner::new(Arc::clone(&self.fs), &self.source_root, ScanOrder::TopDown).await?;
        let mut snapshot = SourceSnapshot::new();

        while let Some(item) = scanner.next_entry().await {
            if cancel.is_cancelled() {
                info!("Cancellation requested, no further copies will be dispatched");
                break;
            }

            let entry = match item {
                Ok(entry) => entry,
                Err(unreadable) => {
                    record_failure(outcome, self.sink.as_ref(), &unreadable.relative_path, &unreadable.error);
                    snapshot.add_unreadable(unreadable.relative_path);
                    continue;
                }
            };

            match entry.kind {
                EntryKind::Directory => {
                    self.mirror_directory(&entry.relative_path, outcome).await;
                    snapshot.add_directory(entry.relative_path);
                }
                EntryKind::File => {
                    self.dispatch_file(&entry.relative_path, pool, outcome).await;
                    snapshot.add_file(entry.relative_path);
                }
                EntryKind::Symlink | EntryKind::Other => {
                    debug!("Skipping {} ({:?})", entry.relative_path, entry.kind);
                }
            }
        }

        info!(
            "Scanned {} files and {} directories, {} copies dispatched",
            snapshot.file_count(),
            snapshot.directory_count(),
            pool.pending()
        );
        Ok(snapshot)
    }

    /// Decide whether the replica copy of `entry` is stale.
    /// The source digest is stored in `entry` when one is computed.
    pub async fn detect_change(&self, entry: &mut FileEntry) -> Result<ChangeType> {
        let Some(replica) = self.fs.metadata(&entry.replica_path).await? else {
            return Ok(ChangeType::Added);
        };

        match replica.kind {
            EntryKind::Directory => {
                return Err(Error::io_message(
                    &entry.replica_path,
                    "replica has a directory where the source has a file",
                ))
            }
            EntryKind::Symlink | EntryKind::Other => return Ok(ChangeType::Modified),
            EntryKind::File => {}
        }

        if self.compare_mode == CompareMode::QuickCheck {
            if let Some(change) = self.quick_check(&entry.source_path, &replica).await? {
                return Ok(change);
            }
        }

        let (source_digest, replica_digest) = tokio::try_join!(
            self.digests.digest_file(&entry.source_path),
            self.digests.digest_file(&entry.replica_path),
        )?;
        entry.digest = Some(source_digest);

        if source_digest == replica_digest {
            Ok(ChangeType::Unchanged)
        } else {
            Ok(ChangeType::Modified)
        }
    }

    /// Size and mtime shortcut. `None` means digests have to decide.
    async fn quick_check(&self, source: &Path, replica: &EntryMetadata) -> Result<Option<ChangeType>> {
        let Some(metadata) = self.fs.metadata(source).await? else {
            return Err(Error::io_message(source, "source file disappeared"));
        };

        if metadata.len != replica.len {
            return Ok(Some(ChangeType::Modified));
        }
        match (metadata.modified, replica.modified) {
            (Some(a), Some(b)) if a == b => Ok(Some(ChangeType::Unchanged)),
            _ => Ok(None),
        }
    }

    async fn dispatch_file(&self, path: &RelativePath, pool: &mut WorkerPool, outcome: &mut SyncOutcome) {
        let mut entry = FileEntry::new(path.clone(), &self.source_root, &self.replica_root);

        match self.detect_change(&mut entry).await {
            Ok(ChangeType::Unchanged) => {
                trace!("Unchanged: {}", path);
                outcome.files_unchanged += 1;
            }
            Ok(change) => {
                debug!("{:?}: {}", change, path);
                pool.submit(entry.into_task()).await;
            }
            Err(error) => record_failure(outcome, self.sink.as_ref(), path, &error),
        }
    }

    /// Make sure the replica has a directory at `path`, replacing any non-directory there
    async fn mirror_directory(&self, path: &RelativePath, outcome: &mut SyncOutcome) {
        let replica_path = path.resolve(&self.replica_root);
        if let Err(error) = self.ensure_directory(path, &replica_path, outcome).await {
            record_failure(outcome, self.sink.as_ref(), path, &error);
        }
    }

    async fn ensure_directory(&self, path: &RelativePath, replica_path: &Path, outcome: &mut SyncOutcome) -> Result<()> {
        match self.fs.metadata(replica_path).await? {
            Some(metadata) if metadata.is_dir() => return Ok(()),
            Some(_) => {
                self.fs.remove_file(replica_path).await?;
                outcome.files_removed += 1;
                self.sink.emit(&SyncEvent::RemovedFile(path.clone()));
            }
            None => {}
        }

        self.fs.create_dir_all(replica_path).await?;
        outcome.directories_created += 1;
        self.sink.emit(&SyncEvent::CreatedDir(path.clone()));
        Ok(())
    }
}

impl std::fmt::Debug for DiffStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiffStage")
            .field("source_root", &self.source_root)
            .field("replica_root", &self.replica_root)
            .field("compare_mode", &self.compare_mode)
            .finish_non_exhaustive()
    }
}
