//! Core data model and error handling for mirrorsync
//!
//! This crate provides the foundational types shared by every mirrorsync crate:
//!
//! - **Error handling**: the cycle error taxonomy with severity and fatality
//! - **Data model**: relative paths, digests, copy tasks and cycle outcomes
//! - **Traits**: the filesystem provider and event sink seams used by the core
//! - **Configuration**: validated worker counts and chunk sizes
//!
//! # Features
//!
//! - `std` (default): Enable standard library features
//! - `async`: Enable the async [`FileSystem`] trait
//! - `serde`: Enable serialization support
//!
//! # Examples
//!
//! ```rust
//! use mirrorsync_types::{CopyOutcome, RelativePath, SyncOutcome};
//!
//! let mut outcome = SyncOutcome::new();
//! let path = RelativePath::new("docs/readme.txt").unwrap();
//! outcome.record_copy(CopyOutcome::success(path, 1024));
//! assert_eq!(outcome.files_copied, 1);
//! ```

#![deny(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod result;
pub mod traits;
pub mod types;

// Re-export commonly used types
pub use config::{ChunkSize, CompareMode, WorkerCount};
pub use error::{EntryError, Error, ErrorKind, ErrorSeverity};
pub use result::Result;
pub use traits::*;
pub use types::*;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_creation() {
        let outcome = SyncOutcome::new();
        assert_eq!(outcome.files_copied, 0);
        assert_eq!(outcome.files_removed, 0);
        assert!(outcome.is_clean());
    }

    #[test]
    fn test_cancelled_outcome_is_not_clean() {
        let mut outcome = SyncOutcome::new();
        outcome.cancelled = true;
        assert!(!outcome.is_clean());
    }

    #[test]
    fn test_error_severity() {
        let io_error = Error::io_message("/replica/a", "boom");
        assert_eq!(io_error.severity(), ErrorSeverity::Medium);

        let config_error = Error::config("invalid config");
        assert_eq!(config_error.severity(), ErrorSeverity::High);
        assert!(!config_error.is_recoverable());
    }
}
