//! JSON output structures for `--json`

use mirrorsync_types::{EntryError, Error as SyncError, ErrorKind, SyncOutcome};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// One line of `--json` output, describing a single cycle
#[derive(Debug, Serialize, Deserialize)]
pub struct CycleResultJson {
    /// Cycle metadata
    pub metadata: CycleMetadata,
    /// Counters; absent when the cycle aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<CycleStatsJson>,
    /// Overall result
    pub result: CycleResult,
}

/// Cycle metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct CycleMetadata {
    /// mirrorsync version
    pub version: String,
    /// Cycle number since the process started
    pub cycle: u64,
    /// Engine cycle identifier
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cycle_id: Option<String>,
    /// When the cycle started (RFC 3339)
    pub started_at: String,
    /// Source root
    pub source_path: String,
    /// Replica root
    pub replica_path: String,
}

/// Cycle counters
#[derive(Debug, Serialize, Deserialize)]
pub struct CycleStatsJson {
    /// Files copied and verified
    pub files_copied: u64,
    /// Files already identical
    pub files_unchanged: u64,
    /// Bytes written to the replica
    pub bytes_copied: u64,
    /// Replica directories created
    pub directories_created: u64,
    /// Orphaned files removed
    pub files_removed: u64,
    /// Orphaned directories removed
    pub directories_removed: u64,
    /// Wall clock time
    pub duration_seconds: f64,
}

/// How a cycle ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CycleStatus {
    /// Every entry was mirrored
    Success,
    /// Completed with per-entry errors
    Partial,
    /// Stopped early on request
    Cancelled,
    /// Aborted by a fatal error
    Failed,
}

/// Overall result
#[derive(Debug, Serialize, Deserialize)]
pub struct CycleResult {
    /// Status
    pub status: CycleStatus,
    /// Summary line
    pub message: String,
    /// Per-entry failures, or the fatal error
    pub errors: Vec<ErrorJson>,
}

/// A single failure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorJson {
    /// Path the failure refers to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Error category
    pub kind: ErrorKind,
    /// Description
    pub message: String,
}

impl From<&EntryError> for ErrorJson {
    fn from(error: &EntryError) -> Self {
        Self {
            path: Some(error.path.to_string()),
            kind: error.kind,
            message: error.message.clone(),
        }
    }
}

impl CycleResultJson {
    /// Describe a cycle that produced an outcome
    pub fn from_outcome(cycle: u64, source: &Path, replica: &Path, outcome: &SyncOutcome) -> Self {
        let (status, message) = if outcome.cancelled {
            (
                CycleStatus::Cancelled,
                "Cycle cancelled before completion".to_string(),
            )
        } else if outcome.errors.is_empty() {
            (
                CycleStatus::Success,
                format!(
                    "Mirrored with {} copies and {} removals",
                    outcome.files_copied,
                    outcome.files_removed + outcome.directories_removed
                ),
            )
        } else {
            (
                CycleStatus::Partial,
                format!("Completed with {} errors", outcome.errors.len()),
            )
        };

        Self {
            metadata: CycleMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                cycle,
                cycle_id: Some(outcome.cycle_id.to_string()),
                started_at: outcome.started_at.to_rfc3339(),
                source_path: source.display().to_string(),
                replica_path: replica.display().to_string(),
            },
            stats: Some(CycleStatsJson {
                files_copied: outcome.files_copied,
                files_unchanged: outcome.files_unchanged,
                bytes_copied: outcome.bytes_copied,
                directories_created: outcome.directories_created,
                files_removed: outcome.files_removed,
                directories_removed: outcome.directories_removed,
                duration_seconds: outcome.duration.as_secs_f64(),
            }),
            result: CycleResult {
                status,
                message,
                errors: outcome.errors.iter().map(ErrorJson::from).collect(),
            },
        }
    }

    /// Describe a cycle that aborted with a fatal error
    pub fn from_error(cycle: u64, source: &Path, replica: &Path, error: &SyncError) -> Self {
        Self {
            metadata: CycleMetadata {
                version: env!("CARGO_PKG_VERSION").to_string(),
                cycle,
                cycle_id: None,
                started_at: chrono::Utc::now().to_rfc3339(),
                source_path: source.display().to_string(),
                replica_path: replica.display().to_string(),
            },
            stats: None,
            result: CycleResult {
                status: CycleStatus::Failed,
                message: error.to_string(),
                errors: vec![ErrorJson {
                    path: error.path().map(|p| p.display().to_string()),
                    kind: error.kind(),
                    message: error.to_string(),
                }],
            },
        }
    }
}
