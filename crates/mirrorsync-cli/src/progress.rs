//! Live progress for a running cycle

use crate::display::format_bytes;
use indicatif::{ProgressBar, ProgressStyle};
use mirrorsync_types::{EventSink, SyncEvent};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Counters shown on the spinner
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProgressCounts {
    /// Files copied so far
    pub copied: u64,
    /// Bytes copied so far
    pub bytes: u64,
    /// Files and directories removed so far
    pub removed: u64,
    /// Entry errors so far
    pub errors: u64,
}

/// Event sink driving an `indicatif` spinner.
///
/// Events arrive from worker tasks, so the counters are atomics and the bar
/// is only ever touched through its own internal lock.
pub struct ProgressSink {
    bar: ProgressBar,
    copied: AtomicU64,
    bytes: AtomicU64,
    removed: AtomicU64,
    errors: AtomicU64,
}

impl ProgressSink {
    /// Create a spinner drawing to stderr
    pub fn new() -> Self {
        Self::with_bar(ProgressBar::new_spinner())
    }

    fn with_bar(bar: ProgressBar) -> Self {
        bar.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{prefix:.bold}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        Self {
            bar,
            copied: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            removed: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    /// Reset the counters and start spinning for a new cycle
    pub fn start_cycle(&self, cycle: u64) {
        self.copied.store(0, Ordering::Relaxed);
        self.bytes.store(0, Ordering::Relaxed);
        self.removed.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);

        self.bar.reset();
        self.bar.set_prefix("scanning");
        self.bar.set_message(format!("cycle {}", cycle));
        self.bar.enable_steady_tick(Duration::from_millis(100));
    }

    /// Stop spinning and clear the line
    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }

    /// Current counter values
    pub fn counts(&self) -> ProgressCounts {
        ProgressCounts {
            copied: self.copied.load(Ordering::Relaxed),
            bytes: self.bytes.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }

    fn refresh(&self) {
        let counts = self.counts();
        let mut message = format!(
            "{} copied ({}), {} removed",
            counts.copied,
            format_bytes(counts.bytes),
            counts.removed
        );
        if counts.errors > 0 {
            message.push_str(&format!(", {} errors", counts.errors));
        }
        self.bar.set_message(message);
    }
}

impl std::fmt::Debug for ProgressSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressSink")
            .field("counts", &self.counts())
            .finish_non_exhaustive()
    }
}

impl Default for ProgressSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for ProgressSink {
    fn emit(&self, event: &SyncEvent) {
        match event {
            SyncEvent::PhaseChanged(phase) => {
                self.bar.set_prefix(phase.to_string());
                return;
            }
            SyncEvent::Copied { bytes, .. } => {
                self.copied.fetch_add(1, Ordering::Relaxed);
                self.bytes.fetch_add(*bytes, Ordering::Relaxed);
            }
            SyncEvent::RemovedFile(_) | SyncEvent::RemovedDir(_) => {
                self.removed.fetch_add(1, Ordering::Relaxed);
            }
            SyncEvent::Error(_) => {
                self.errors.fetch_add(1, Ordering::Relaxed);
            }
            SyncEvent::CreatedDir(_) => return,
        }
        self.refresh();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirrorsync_types::{EntryError, ErrorKind, RelativePath, SyncPhase};

    fn hidden() -> ProgressSink {
        ProgressSink::with_bar(ProgressBar::hidden())
    }

    fn rel(path: &str) -> RelativePath {
        RelativePath::new(path).unwrap()
    }

    #[test]
    fn test_counts_events() {
        let sink = hidden();
        sink.start_cycle(1);

        sink.emit(&SyncEvent::PhaseChanged(SyncPhase::Copying));
        sink.emit(&SyncEvent::Copied {
            path: rel("a.txt"),
            bytes: 100,
        });
        sink.emit(&SyncEvent::Copied {
            path: rel("b.txt"),
            bytes: 28,
        });
        sink.emit(&SyncEvent::CreatedDir(rel("dir")));
        sink.emit(&SyncEvent::RemovedFile(rel("old.txt")));
        sink.emit(&SyncEvent::RemovedDir(rel("old")));
        sink.emit(&SyncEvent::Error(EntryError::new(
            rel("bad.txt"),
            ErrorKind::Io,
            "permission denied",
        )));

        assert_eq!(
            sink.counts(),
            ProgressCounts {
                copied: 2,
                bytes: 128,
                removed: 2,
                errors: 1,
            }
        );
        assert_eq!(sink.bar.prefix(), "copying");
        assert!(sink.bar.message().contains("1 errors"));
    }

    #[test]
    fn test_start_cycle_resets_counts() {
        let sink = hidden();
        sink.start_cycle(1);
        sink.emit(&SyncEvent::RemovedFile(rel("old.txt")));
        sink.finish();

        sink.start_cycle(2);
        assert_eq!(sink.counts(), ProgressCounts::default());
        assert_eq!(sink.bar.message(), "cycle 2");
    }
}
