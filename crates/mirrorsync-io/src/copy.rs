//! Copy-and-verify unit
//!
//! Copies one file with its metadata, then digests both sides again. A mismatch
//! is reported as an integrity error; the written file stays in place and will be
//! picked up as changed on the next cycle. Nothing is retried here.

use crate::DigestComputer;
use mirrorsync_types::{ChunkSize, CopyOutcome, CopyTask, Error, FileSystem, Result};
use std::sync::Arc;
use tracing::{debug, warn};

/// Executes [`CopyTask`]s
#[derive(Clone)]
pub struct CopyVerifier {
    fs: Arc<dyn FileSystem>,
    digests: DigestComputer,
}

impl std::fmt::Debug for CopyVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CopyVerifier")
            .field("digests", &self.digests)
            .finish_non_exhaustive()
    }
}

impl CopyVerifier {
    /// Create a copier using `fs` for all I/O
    pub fn new(fs: Arc<dyn FileSystem>, chunk_size: ChunkSize) -> Self {
        let digests = DigestComputer::new(Arc::clone(&fs), chunk_size);
        Self { fs, digests }
    }

    /// Copy `task.source_path` over `task.replica_path` and verify the result.
    /// Returns the number of bytes written.
    pub async fn copy_and_verify(&self, task: &CopyTask) -> Result<u64> {
        if let Some(parent) = task.replica_path.parent() {
            self.fs.create_dir_all(parent).await?;
        }

        let bytes = self
            .fs
            .write_file_from(&task.source_path, &task.replica_path)
            .await?;

        let (expected, actual) = tokio::try_join!(
            self.digests.digest_file(&task.source_path),
            self.digests.digest_file(&task.replica_path),
        )?;

        if expected != actual {
            warn!(
                "Digest mismatch after copying {} to {}",
                task.source_path.display(),
                task.replica_path.display()
            );
            return Err(Error::integrity(&task.replica_path, &expected, &actual));
        }

        debug!("Copied and verified {} ({} bytes)", task.relative_path, bytes);
        Ok(bytes)
    }

    /// Run a task to completion, folding any failure into the outcome
    pub async fn execute(&self, task: CopyTask) -> CopyOutcome {
        match self.copy_and_verify(&task).await {
            Ok(bytes) => CopyOutcome::success(task.relative_path, bytes),
            Err(error) => CopyOutcome::failure(task.relative_path, &error),
        }
    }
}
