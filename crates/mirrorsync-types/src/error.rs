//! Error types and handling for mirrorsync
//!
//! Errors fall into two groups. A [`Error::Path`] means one of the tree roots is
//! unusable and aborts the whole cycle. Every other variant describes a problem with
//! a single entry; those are collected into the cycle outcome as [`EntryError`]s and
//! never interrupt processing of sibling entries.

use crate::{Digest, RelativePath};
use std::path::{Path, PathBuf};

/// Error severity level
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ErrorSeverity {
    /// Low severity - the entry is left as is and nothing else is affected
    Low,
    /// Medium severity - the entry will be retried on the next cycle
    Medium,
    /// High severity - the cycle cannot proceed
    High,
    /// Critical severity - the driver should stop
    Critical,
}

/// Main error type for mirrorsync operations
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// Source or replica root is invalid or unreachable
    #[error("Invalid root '{path}': {message}")]
    Path {
        /// Root path that could not be used
        path: PathBuf,
        /// Description of the failure
        message: String,
    },

    /// A single read, write or stat failed
    #[error("I/O error at '{path}': {message}")]
    Io {
        /// Path of the entry being accessed
        path: PathBuf,
        /// Error message from the I/O operation
        message: String,
    },

    /// Post-copy digest verification failed
    #[error("Integrity check failed for '{path}': source digest {expected}, replica digest {actual}")]
    Integrity {
        /// Replica path that failed verification
        path: PathBuf,
        /// Digest of the source file
        expected: String,
        /// Digest of the freshly written replica file
        actual: String,
    },

    /// Removing an orphaned replica entry failed
    #[error("Failed to remove '{path}': {message}")]
    Deletion {
        /// Path of the entry that was left in place
        path: PathBuf,
        /// Reason the removal failed
        message: String,
    },

    /// A path could not be expressed relative to its tree root
    #[error("Invalid relative path '{path}': {message}")]
    InvalidPath {
        /// Offending path
        path: PathBuf,
        /// Reason the path was rejected
        message: String,
    },

    /// Configuration error
    #[error("Configuration error: {message}")]
    Config {
        /// Error message describing the configuration issue
        message: String,
    },

    /// Operation cancelled
    #[error("Operation cancelled")]
    Cancelled,
}

/// Error kind for categorizing errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    /// Root path errors
    Path,
    /// Per-entry I/O errors
    Io,
    /// Digest mismatch after a copy
    Integrity,
    /// Removal failures
    Deletion,
    /// Relative path validation errors
    InvalidPath,
    /// Configuration errors
    Config,
    /// Cancellation
    Cancelled,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Path => "path",
            Self::Io => "io",
            Self::Integrity => "integrity",
            Self::Deletion => "deletion",
            Self::InvalidPath => "invalid_path",
            Self::Config => "config",
            Self::Cancelled => "cancelled",
        };
        f.write_str(name)
    }
}

impl Error {
    /// Get the error kind
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Path { .. } => ErrorKind::Path,
            Self::Io { .. } => ErrorKind::Io,
            Self::Integrity { .. } => ErrorKind::Integrity,
            Self::Deletion { .. } => ErrorKind::Deletion,
            Self::InvalidPath { .. } => ErrorKind::InvalidPath,
            Self::Config { .. } => ErrorKind::Config,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Get the error severity level
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Path { .. } | Self::Config { .. } | Self::InvalidPath { .. } => {
                ErrorSeverity::High
            }
            Self::Io { .. } | Self::Integrity { .. } => ErrorSeverity::Medium,
            Self::Deletion { .. } | Self::Cancelled => ErrorSeverity::Low,
        }
    }

    /// Whether this error aborts the current sync cycle
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Path { .. })
    }

    /// Check if a later cycle may succeed where this one failed
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Path { .. } | Self::Io { .. } | Self::Integrity { .. } | Self::Deletion { .. } => {
                true
            }
            Self::InvalidPath { .. } | Self::Config { .. } | Self::Cancelled => false,
        }
    }

    /// Path the error refers to, if any
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::Path { path, .. }
            | Self::Io { path, .. }
            | Self::Integrity { path, .. }
            | Self::Deletion { path, .. }
            | Self::InvalidPath { path, .. } => Some(path),
            Self::Config { .. } | Self::Cancelled => None,
        }
    }

    /// Create a root path error
    pub fn path_error<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Path {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an I/O error for the given path
    pub fn io<P: Into<PathBuf>>(path: P, error: &std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: error.to_string(),
        }
    }

    /// Create an I/O error with a custom message
    pub fn io_message<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Io {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an integrity error from the two mismatching digests
    pub fn integrity<P: Into<PathBuf>>(path: P, expected: &Digest, actual: &Digest) -> Self {
        Self::Integrity {
            path: path.into(),
            expected: expected.to_hex(),
            actual: actual.to_hex(),
        }
    }

    /// Create a deletion error
    pub fn deletion<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::Deletion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a relative path validation error
    pub fn invalid_path<P: Into<PathBuf>, S: Into<String>>(path: P, message: S) -> Self {
        Self::InvalidPath {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a new configuration error
    pub fn config<S: Into<String>>(message: S) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

/// A per-entry failure recorded in a cycle outcome
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct EntryError {
    /// Relative path of the entry
    pub path: RelativePath,
    /// Error category
    pub kind: ErrorKind,
    /// Human readable description
    pub message: String,
}

impl EntryError {
    /// Create a new entry error
    pub fn new(path: RelativePath, kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            path,
            kind,
            message: message.into(),
        }
    }

    /// Capture an [`Error`] against the entry it happened on
    pub fn from_error(path: RelativePath, error: &Error) -> Self {
        Self::new(path, error.kind(), error.to_string())
    }
}

impl std::fmt::Display for EntryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.path, self.kind, self.message)
    }
}
