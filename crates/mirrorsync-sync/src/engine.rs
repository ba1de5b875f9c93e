//! Main synchronization engine

use crate::{
    diff::DiffStage,
    events::TracingEventSink,
    pool::WorkerPool,
    reconcile::DeletionReconciler,
};
use mirrorsync_io::{CopyVerifier, DigestComputer, LocalFileSystem};
use mirrorsync_types::{
    ChunkSize, CompareMode, Error, EventSink, FileSystem, Result, SyncEvent, SyncOutcome,
    SyncPhase, WorkerCount,
};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{watch, Mutex};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Synchronization options
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncOptions {
    /// Maximum number of copies in flight
    pub worker_count: WorkerCount,
    /// How stale replica files are detected
    pub compare_mode: CompareMode,
    /// Read size used when computing digests
    pub chunk_size: ChunkSize,
}

impl SyncOptions {
    /// Set the worker count
    pub fn with_worker_count(mut self, worker_count: WorkerCount) -> Self {
        self.worker_count = worker_count;
        self
    }

    /// Set the compare mode
    pub fn with_compare_mode(mut self, compare_mode: CompareMode) -> Self {
        self.compare_mode = compare_mode;
        self
    }

    /// Set the digest chunk size
    pub fn with_chunk_size(mut self, chunk_size: ChunkSize) -> Self {
        self.chunk_size = chunk_size;
        self
    }
}

/// Main synchronization engine.
///
/// Runs one cycle at a time; a second call to [`SyncEngine::sync`] waits for the
/// running cycle to finish.
pub struct SyncEngine {
    fs: Arc<dyn FileSystem>,
    sink: Arc<dyn EventSink>,
    options: SyncOptions,
    cycle_lock: Mutex<()>,
    phase: watch::Sender<SyncPhase>,
}

impl SyncEngine {
    /// Create an engine on the local filesystem, logging through `tracing`
    pub fn new(options: SyncOptions) -> Self {
        Self::with_components(
            Arc::new(LocalFileSystem::new()),
            Arc::new(TracingEventSink),
            options,
        )
    }

    /// Create an engine with a custom filesystem provider and event sink
    pub fn with_components(fs: Arc<dyn FileSystem>, sink: Arc<dyn EventSink>, options: SyncOptions) -> Self {
        let (phase, _) = watch::channel(SyncPhase::Idle);
        Self {
            fs,
            sink,
            options,
            cycle_lock: Mutex::new(()),
            phase,
        }
    }

    /// Options this engine was built with
    pub fn options(&self) -> &SyncOptions {
        &self.options
    }

    /// Current phase
    pub fn phase(&self) -> SyncPhase {
        *self.phase.borrow()
    }

    /// Watch phase transitions
    pub fn subscribe_phase(&self) -> watch::Receiver<SyncPhase> {
        self.phase.subscribe()
    }

    /// Run one cycle to completion
    pub async fn sync(&self, source: &Path, replica: &Path) -> Result<SyncOutcome> {
        self.sync_with_cancel(source, replica, &CancellationToken::new())
            .await
    }

    /// Run one cycle, stopping early if `cancel` fires.
    ///
    /// Per-entry failures are collected in the returned outcome. An error is
    /// returned only when a root cannot be enumerated or the replica root cannot
    /// be created.
    pub async fn sync_with_cancel(
        &self,
        source: &Path,
        replica: &Path,
        cancel: &CancellationToken,
    ) -> Result<SyncOutcome> {
        let _cycle = self.cycle_lock.lock().await;
        let start_time = Instant::now();
        let mut outcome = SyncOutcome::new();

        info!(
            cycle_id = %outcome.cycle_id,
            "Starting sync: {} -> {}",
            source.display(),
            replica.display()
        );

        let result = self.run_cycle(source, replica, cancel, &mut outcome).await;
        self.set_phase(SyncPhase::Idle);
        outcome.duration = start_time.elapsed();

        match result {
            Ok(()) => {
                info!(
                    cycle_id = %outcome.cycle_id,
                    "Sync completed: {} copied, {} unchanged, {} files and {} directories removed, {} errors in {:?}",
                    outcome.files_copied,
                    outcome.files_unchanged,
                    outcome.files_removed,
                    outcome.directories_removed,
                    outcome.errors.len(),
                    outcome.duration
                );
                Ok(outcome)
            }
            Err(e) => {
                error!(cycle_id = %outcome.cycle_id, "Sync failed: {}", e);
                Err(e)
            }
        }
    }

    async fn run_cycle(
        &self,
        source: &Path,
        replica: &Path,
        cancel: &CancellationToken,
        outcome: &mut SyncOutcome,
    ) -> Result<()> {
        self.set_phase(SyncPhase::Scanning);
        self.ensure_replica_root(replica).await?;

        let digests = DigestComputer::new(Arc::clone(&self.fs), self.options.chunk_size);
        let copier = CopyVerifier::new(Arc::clone(&self.fs), self.options.chunk_size);
        let mut pool = WorkerPool::new(copier, self.options.worker_count, Arc::clone(&self.sink));
        let stage = DiffStage::new(
            Arc::clone(&self.fs),
            digests,
            self.options.compare_mode,
            Arc::clone(&self.sink),
            source,
            replica,
        );

        let scanned = stage.run(&mut pool, outcome, cancel).await;

        // Every dispatched copy finishes before anything is deleted, even if the scan failed
        self.set_phase(SyncPhase::Copying);
        for copy in pool.drain().await {
            outcome.record_copy(copy);
        }
        let snapshot = scanned?;

        if cancel.is_cancelled() {
            warn!("Sync cancelled, skipping deletion pass");
            outcome.cancelled = true;
            return Ok(());
        }

        self.set_phase(SyncPhase::Deleting);
        DeletionReconciler::new(Arc::clone(&self.fs), Arc::clone(&self.sink))
            .reconcile(replica, &snapshot, outcome, cancel)
            .await?;
        outcome.cancelled = cancel.is_cancelled();

        Ok(())
    }

    /// Create the replica root if needed
    async fn ensure_replica_root(&self, replica: &Path) -> Result<()> {
        match self.fs.metadata(replica).await {
            Ok(Some(metadata)) if metadata.is_dir() => Ok(()),
            Ok(Some(_)) => Err(Error::path_error(replica, "exists and is not a directory")),
            Ok(None) => {
                info!("Creating replica directory {}", replica.display());
                self.fs
                    .create_dir_all(replica)
                    .await
                    .map_err(|e| Error::path_error(replica, format!("cannot be created: {}", e)))
            }
            Err(e) => Err(Error::path_error(replica, e.to_string())),
        }
    }

    fn set_phase(&self, phase: SyncPhase) {
        if self.phase.send_replace(phase) != phase {
            self.sink.emit(&SyncEvent::PhaseChanged(phase));
        }
    }
}

impl std::fmt::Debug for SyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncEngine")
            .field("options", &self.options)
            .field("phase", &self.phase())
            .finish_non_exhaustive()
    }
}

/// Mirror `source` onto `replica` with `worker_count` parallel copies.
///
/// Fails with [`Error::Config`] if `worker_count` is out of range.
pub async fn sync(
    source: impl AsRef<Path>,
    replica: impl AsRef<Path>,
    worker_count: usize,
) -> Result<SyncOutcome> {
    let worker_count = WorkerCount::new(worker_count).map_err(Error::config)?;
    SyncEngine::new(SyncOptions::default().with_worker_count(worker_count))
        .sync(source.as_ref(), replica.as_ref())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::CollectingEventSink;
    use mirrorsync_types::ErrorKind;
    use std::fs;
    use tempfile::TempDir;

    fn engine(sink: Arc<CollectingEventSink>) -> SyncEngine {
        SyncEngine::with_components(
            Arc::new(LocalFileSystem::new()),
            sink,
            SyncOptions::default().with_worker_count(WorkerCount::new(4).unwrap()),
        )
    }

    #[tokio::test]
    async fn test_sync_creates_replica_root() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("nested/replica");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), "content").unwrap();

        let outcome = engine(Arc::new(CollectingEventSink::new()))
            .sync(&source, &replica)
            .await
            .unwrap();

        assert!(outcome.is_clean());
        assert_eq!(outcome.files_copied, 1);
        assert_eq!(fs::read_to_string(replica.join("a.txt")).unwrap(), "content");
    }

    #[tokio::test]
    async fn test_phases_are_reported_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        fs::create_dir_all(&source).unwrap();
        fs::write(source.join("a.txt"), "content").unwrap();

        let sink = Arc::new(CollectingEventSink::new());
        let engine = engine(sink.clone());
        engine.sync(&source, &temp_dir.path().join("replica")).await.unwrap();

        let phases: Vec<SyncPhase> = sink
            .events()
            .into_iter()
            .filter_map(|event| match event {
                SyncEvent::PhaseChanged(phase) => Some(phase),
                _ => None,
            })
            .collect();
        assert_eq!(
            phases,
            vec![
                SyncPhase::Scanning,
                SyncPhase::Copying,
                SyncPhase::Deleting,
                SyncPhase::Idle
            ]
        );
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_missing_source_is_fatal_and_returns_to_idle() {
        let temp_dir = TempDir::new().unwrap();
        let engine = engine(Arc::new(CollectingEventSink::new()));

        let error = engine
            .sync(&temp_dir.path().join("missing"), &temp_dir.path().join("replica"))
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Path);
        assert_eq!(engine.phase(), SyncPhase::Idle);
    }

    #[tokio::test]
    async fn test_replica_root_that_is_a_file_is_fatal() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        fs::create_dir_all(&source).unwrap();
        fs::write(&replica, "file").unwrap();

        let error = engine(Arc::new(CollectingEventSink::new()))
            .sync(&source, &replica)
            .await
            .unwrap_err();

        assert!(error.is_fatal());
    }

    #[tokio::test]
    async fn test_cancelled_cycle_skips_deletion() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        fs::create_dir_all(&source).unwrap();
        fs::create_dir_all(&replica).unwrap();
        fs::write(source.join("a.txt"), "a").unwrap();
        fs::write(replica.join("orphan.txt"), "stale").unwrap();

        let cancel = CancellationToken::new();
        cancel.cancel();

        let outcome = engine(Arc::new(CollectingEventSink::new()))
            .sync_with_cancel(&source, &replica, &cancel)
            .await
            .unwrap();

        assert!(outcome.cancelled);
        assert!(!outcome.is_clean());
        assert_eq!(outcome.files_removed, 0);
        assert!(replica.join("orphan.txt").exists());
    }

    #[tokio::test]
    async fn test_free_function_rejects_zero_workers() {
        let temp_dir = TempDir::new().unwrap();
        let error = sync(temp_dir.path(), temp_dir.path().join("replica"), 0)
            .await
            .unwrap_err();

        assert_eq!(error.kind(), ErrorKind::Config);
        assert!(!temp_dir.path().join("replica").exists());
    }

    #[tokio::test]
    async fn test_concurrent_calls_are_serialized() {
        let temp_dir = TempDir::new().unwrap();
        let source = temp_dir.path().join("source");
        let replica = temp_dir.path().join("replica");
        fs::create_dir_all(&source).unwrap();
        for i in 0..10 {
            fs::write(source.join(format!("f{}.txt", i)), format!("{}", i)).unwrap();
        }

        let engine = engine(Arc::new(CollectingEventSink::new()));
        let (first, second) = tokio::join!(engine.sync(&source, &replica), engine.sync(&source, &replica));
        let (first, second) = (first.unwrap(), second.unwrap());

        assert_eq!(first.files_copied + second.files_copied, 10);
        assert_eq!(first.files_unchanged + second.files_unchanged, 10);
    }
}
