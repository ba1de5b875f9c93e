//! One-directional directory mirroring for mirrorsync
//!
//! This crate implements a sync cycle that makes a replica tree an exact copy of a
//! source tree:
//!
//! - **Tree scanning**: lazy, deterministic walks in top-down or bottom-up order
//! - **Change detection**: content digests decide which files are copied, with an
//!   opt-in size and mtime shortcut
//! - **Bounded copying**: a worker pool runs copy-and-verify tasks in parallel and
//!   is fully drained before anything is deleted
//! - **Reconciliation**: a bottom-up replica walk removes orphaned files and empty
//!   orphaned directories
//! - **Events**: everything the cycle does is reported through an [`EventSink`]
//!
//! # Examples
//!
//! ```rust,no_run
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let outcome = mirrorsync_sync::sync("/data/source", "/data/replica", 4).await?;
//! println!(
//!     "Copied {} files, removed {} files and {} directories",
//!     outcome.files_copied, outcome.files_removed, outcome.directories_removed
//! );
//! # Ok(())
//! # }
//! ```
//!
//! [`EventSink`]: mirrorsync_types::EventSink

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod diff;
pub mod engine;
pub mod events;
pub mod pool;
pub mod reconcile;
pub mod scanner;

pub use diff::{ChangeType, DiffStage, SourceSnapshot};
pub use engine::{sync, SyncEngine, SyncOptions};
pub use events::{CollectingEventSink, FanOutSink, NullEventSink, TracingEventSink};
pub use pool::WorkerPool;
pub use reconcile::DeletionReconciler;
pub use scanner::{ScanEntry, ScanOrder, ScanResult, TreeScanner, UnreadableDir};
pub use tokio_util::sync::CancellationToken;
