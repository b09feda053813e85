//! Ordered record of lifecycle transitions.

use std::sync::{Arc, Mutex};

/// A step of the shutdown sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The external shutdown signal won the race.
    ShutdownSignalled,
    /// The event loop ended on its own (exhausted or failed).
    LoopFinished,
    /// The event loop was asked to stop.
    CancellationRequested,
    /// The event loop task has ended.
    LoopStopped,
    ResourceReleased,
    ReleaseFailed,
    CoordinatorFinished,
}

/// Append-only, cloneable journal.
#[derive(Debug, Clone, Default)]
pub struct LifecycleJournal {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
}

impl LifecycleJournal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: LifecycleEvent) {
        tracing::debug!(event = ?event, "Lifecycle event");
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(event);
    }

    /// Snapshot of everything recorded so far.
    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    pub fn count(&self, event: LifecycleEvent) -> usize {
        self.events().iter().filter(|e| **e == event).count()
    }
}
