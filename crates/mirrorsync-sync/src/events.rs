//! Event sinks for sync cycles

use mirrorsync_types::{EntryError, Error, EventSink, RelativePath, SyncEvent, SyncOutcome};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

/// Forwards events to `tracing`
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingEventSink;

impl EventSink for TracingEventSink {
    fn emit(&self, event: &SyncEvent) {
        match event {
            SyncEvent::PhaseChanged(phase) => debug!(%phase, "Sync phase changed"),
            SyncEvent::CreatedDir(path) => info!(%path, "Created directory"),
            SyncEvent::Copied { path, bytes } => info!(%path, bytes, "Copied file"),
            SyncEvent::RemovedFile(path) => info!(%path, "Removed file"),
            SyncEvent::RemovedDir(path) => info!(%path, "Removed directory"),
            SyncEvent::Error(error) => warn!(
                path = %error.path,
                kind = %error.kind,
                "{}",
                error.message
            ),
        }
    }
}

/// Discards every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullEventSink;

impl EventSink for NullEventSink {
    fn emit(&self, _event: &SyncEvent) {}
}

/// Keeps every event in memory
#[derive(Debug, Default)]
pub struct CollectingEventSink {
    events: Mutex<Vec<SyncEvent>>,
}

impl CollectingEventSink {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the events received so far
    pub fn events(&self) -> Vec<SyncEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of events matching `predicate`
    pub fn count(&self, predicate: impl Fn(&SyncEvent) -> bool) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|event| predicate(event))
            .count()
    }

    /// Forget everything collected
    pub fn clear(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl EventSink for CollectingEventSink {
    fn emit(&self, event: &SyncEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event.clone());
    }
}

/// Sends each event to several sinks in order
#[derive(Default, Clone)]
pub struct FanOutSink {
    sinks: Vec<Arc<dyn EventSink>>,
}

impl FanOutSink {
    /// Create a sink with no targets
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a target
    pub fn with(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sinks.push(sink);
        self
    }
}

impl EventSink for FanOutSink {
    fn emit(&self, event: &SyncEvent) {
        for sink in &self.sinks {
            sink.emit(event);
        }
    }
}

impl std::fmt::Debug for FanOutSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FanOutSink")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

/// Record a per-entry failure in `outcome` and report it to `sink`
pub(crate) fn record_failure(
    outcome: &mut SyncOutcome,
    sink: &dyn EventSink,
    path: &RelativePath,
    error: &Error,
) {
    let entry_error = EntryError::from_error(path.clone(), error);
    sink.emit(&SyncEvent::Error(entry_error.clone()));
    outcome.record_error(entry_error);
}
