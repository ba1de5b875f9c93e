//! Bounded pool of copy workers
//!
//! Each submitted [`CopyTask`] runs on its own tokio task, holding one semaphore
//! permit for its whole lifetime. [`WorkerPool::submit`] waits for a free permit,
//! so the dispatcher never has more than `worker_count` copies in flight.
//! [`WorkerPool::drain`] is the barrier: it returns only once every submitted task
//! has produced its [`CopyOutcome`].

use futures::future::join_all;
use mirrorsync_io::CopyVerifier;
use mirrorsync_types::{
    CopyOutcome, CopyTask, Error, EventSink, RelativePath, SyncEvent, WorkerCount,
};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Runs copy-and-verify tasks with bounded parallelism
pub struct WorkerPool {
    copier: CopyVerifier,
    sink: Arc<dyn EventSink>,
    permits: Arc<Semaphore>,
    worker_count: WorkerCount,
    in_flight: Vec<(RelativePath, JoinHandle<CopyOutcome>)>,
}

impl WorkerPool {
    /// Create a pool running at most `worker_count` copies at once
    pub fn new(copier: CopyVerifier, worker_count: WorkerCount, sink: Arc<dyn EventSink>) -> Self {
        Self {
            copier,
            sink,
            permits: Arc::new(Semaphore::new(worker_count.get())),
            worker_count,
            in_flight: Vec::new(),
        }
    }

    /// Configured parallelism
    pub fn worker_count(&self) -> WorkerCount {
        self.worker_count
    }

    /// Tasks submitted since the last drain
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    /// Start `task` as soon as a worker is free
    pub async fn submit(&mut self, task: CopyTask) {
        // The semaphore is never closed, so acquiring cannot fail
        let permit = Arc::clone(&self.permits).acquire_owned().await.ok();
        let copier = self.copier.clone();
        let sink = Arc::clone(&self.sink);
        let relative_path = task.relative_path.clone();

        debug!("Dispatching copy of {}", relative_path);
        let handle = tokio::spawn(async move {
            let _permit = permit;
            let outcome = copier.execute(task).await;
            match &outcome.error {
                None => sink.emit(&SyncEvent::Copied {
                    path: outcome.relative_path.clone(),
                    bytes: outcome.bytes_copied,
                }),
                Some(error) => sink.emit(&SyncEvent::Error(error.clone())),
            }
            outcome
        });

        self.in_flight.push((relative_path, handle));
    }

    /// Wait for every submitted task and return one outcome per task
    pub async fn drain(&mut self) -> Vec<CopyOutcome> {
        let (paths, handles): (Vec<_>, Vec<_>) = std::mem::take(&mut self.in_flight).into_iter().unzip();
        debug!("Waiting for {} copies to finish", handles.len());

        join_all(handles)
            .await
            .into_iter()
            .zip(paths)
            .map(|(joined, path)| match joined {
                Ok(outcome) => outcome,
                Err(join_error) => {
                    error!("Copy task for {} did not complete: {}", path, join_error);
                    let error = Error::io_message(
                        path.as_path(),
                        format!("copy task did not complete: {}", join_error),
                    );
                    let outcome = CopyOutcome::failure(path, &error);
                    if let Some(entry_error) = &outcome.error {
                        self.sink.emit(&SyncEvent::Error(entry_error.clone()));
                    }
                    outcome
                }
            })
            .collect()
    }
}

impl std::fmt::Debug for WorkerPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorkerPool")
            .field("worker_count", &self.worker_count)
            .field("pending", &self.in_flight.len())
            .finish_non_exhaustive()
    }
}
