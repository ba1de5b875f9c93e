//! Filesystem provider, content digests and verified copies for mirrorsync
//!
//! This crate holds everything in mirrorsync that touches file content:
//!
//! - **Filesystem provider**: [`LocalFileSystem`], the `tokio::fs` backed
//!   implementation of [`mirrorsync_types::FileSystem`]
//! - **Digests**: streaming BLAKE3 fingerprints computed in fixed-size chunks
//! - **Verified copies**: [`CopyVerifier`] copies a file with its metadata and
//!   checks the replica against the source afterwards
//!
//! # Examples
//!
//! ```rust,no_run
//! use mirrorsync_io::{CopyVerifier, LocalFileSystem};
//! use mirrorsync_types::{ChunkSize, FileEntry, RelativePath};
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let copier = CopyVerifier::new(Arc::new(LocalFileSystem::new()), ChunkSize::default());
//! let task = FileEntry::new(
//!     RelativePath::new("docs/readme.txt")?,
//!     Path::new("/data/source"),
//!     Path::new("/data/replica"),
//! )
//! .into_task();
//! let bytes = copier.copy_and_verify(&task).await?;
//! println!("Copied {} bytes", bytes);
//! # Ok(())
//! # }
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod copy;
pub mod digest;
pub mod fs;

pub use copy::CopyVerifier;
pub use digest::{digest_bytes, digest_reader, DigestComputer};
pub use fs::LocalFileSystem;
