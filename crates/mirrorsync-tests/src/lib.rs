//! Integration test support for mirrorsync
//!
//! Tree builders and snapshots used by the cross-crate tests in `tests/`.
//! Snapshots are taken with `walkdir`, independently of the engine's own
//! scanner, so the tests do not grade the engine with its own code.

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Unified test utilities
pub mod test_utils;
