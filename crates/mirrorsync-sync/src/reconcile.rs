//! Removal of replica entries that no longer exist in the source
//!
//! The replica is walked bottom-up so a directory is only considered after all of
//! its children. Directories are removed only when already empty; anything left
//! inside (a failed removal, a protected subtree) keeps its parent in place.

use crate::diff::SourceSnapshot;
use crate::events::record_failure;
use crate::scanner::{ScanOrder, TreeScanner};
use mirrorsync_types::{
    EntryKind, Error, EventSink, FileSystem, RelativePath, Result, SyncEvent, SyncOutcome,
};
use std::path::Path;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Removes orphaned replica entries
pub struct DeletionReconciler {
    fs: Arc<dyn FileSystem>,
    sink: Arc<dyn EventSink>,
}

impl DeletionReconciler {
    /// Create a reconciler
    pub fn new(fs: Arc<dyn FileSystem>, sink: Arc<dyn EventSink>) -> Self {
        Self { fs, sink }
    }

    /// Remove every entry under `replica_root` with no counterpart in `snapshot`.
    ///
    /// Per-entry failures are recorded in `outcome`; only an unreadable replica root
    /// is returned as an error. Stops between entries when `cancel` fires.
    pub async fn reconcile(
        &self,
        replica_root: &Path,
        snapshot: &SourceSnapshot,
        outcome: &mut SyncOutcome,
        cancel: &CancellationToken,
    ) -> Result<()> {
        let mut scanner = TreeScanner::new(Arc::clone(&self.fs), replica_root, ScanOrder::BottomUp).await?;

        while let Some(item) = scanner.next_entry().await {
            if cancel.is_cancelled() {
                info!("Cancellation requested, stopping deletion pass");
                break;
            }

            let entry = match item {
                Ok(entry) => entry,
                Err(unreadable) => {
                    record_failure(outcome, self.sink.as_ref(), &unreadable.relative_path, &unreadable.error);
                    continue;
                }
            };

            let path = &entry.relative_path;
            if snapshot.is_protected(path) {
                debug!("Keeping {}: source subtree was not readable", path);
                continue;
            }

            match entry.kind {
                EntryKind::Directory if snapshot.contains_directory(path) => {}
                EntryKind::Directory => self.remove_directory(replica_root, path, outcome).await,
                _ if snapshot.contains_file(path) => {}
                _ => self.remove_file(replica_root, path, outcome).await,
            }
        }

        Ok(())
    }

    async fn remove_file(&self, replica_root: &Path, path: &RelativePath, outcome: &mut SyncOutcome) {
        let absolute = path.resolve(replica_root);
        match self.fs.remove_file(&absolute).await {
            Ok(()) => {
                outcome.files_removed += 1;
                self.sink.emit(&SyncEvent::RemovedFile(path.clone()));
            }
            Err(e) => {
                let error = Error::deletion(&absolute, e.to_string());
                record_failure(outcome, self.sink.as_ref(), path, &error);
            }
        }
    }

    async fn remove_directory(&self, replica_root: &Path, path: &RelativePath, outcome: &mut SyncOutcome) {
        let absolute = path.resolve(replica_root);
        match self.fs.remove_empty_dir(&absolute).await {
            Ok(()) => {
                outcome.directories_removed += 1;
                self.sink.emit(&SyncEvent::RemovedDir(path.clone()));
            }
            Err(e) => {
                let error = Error::deletion(&absolute, e.to_string());
                record_failure(outcome, self.sink.as_ref(), path, &error);
            }
        }
    }
}

impl std::fmt::Debug for DeletionReconciler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeletionReconciler").finish_non_exhaustive()
    }
}
