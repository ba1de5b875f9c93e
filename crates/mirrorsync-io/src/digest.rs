//! Streaming content digests
//!
//! Files are read in fixed-size chunks and folded into a BLAKE3 hasher, so memory
//! use does not depend on file size and the result does not depend on how the
//! reads were split.

use mirrorsync_types::{ChunkSize, Digest, Error, FileSystem, Result};
use std::path::Path;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::trace;

/// Digest of an in-memory byte slice
pub fn digest_bytes(data: &[u8]) -> Digest {
    Digest::from_bytes(*blake3::hash(data).as_bytes())
}

/// Fold everything `reader` yields into a digest, reading `chunk_size` bytes at a time.
///
/// `path` is only used to label errors.
pub async fn digest_reader<R>(mut reader: R, chunk_size: ChunkSize, path: &Path) -> Result<Digest>
where
    R: AsyncRead + Unpin,
{
    let mut hasher = blake3::Hasher::new();
    let mut buffer = vec![0u8; chunk_size.get()];

    loop {
        let read = reader
            .read(&mut buffer)
            .await
            .map_err(|e| Error::io(path, &e))?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
    }

    Ok(Digest::from_bytes(*hasher.finalize().as_bytes()))
}

/// Computes content digests through a [`FileSystem`]
#[derive(Clone)]
pub struct DigestComputer {
    fs: Arc<dyn FileSystem>,
    chunk_size: ChunkSize,
}

impl DigestComputer {
    /// Create a digest computer reading `chunk_size` bytes at a time
    pub fn new(fs: Arc<dyn FileSystem>, chunk_size: ChunkSize) -> Self {
        Self { fs, chunk_size }
    }

    /// Chunk size used for reads
    pub fn chunk_size(&self) -> ChunkSize {
        self.chunk_size
    }

    /// Digest the file at `path`. Fails if it cannot be opened or a read fails;
    /// no retry is attempted.
    pub async fn digest_file(&self, path: &Path) -> Result<Digest> {
        let reader = self.fs.open_read(path).await?;
        let digest = digest_reader(reader, self.chunk_size, path).await?;
        trace!("Digest of {}: {}", path.display(), digest);
        Ok(digest)
    }
}

impl std::fmt::Debug for DigestComputer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DigestComputer")
            .field("chunk_size", &self.chunk_size)
            .finish_non_exhaustive()
    }
}
