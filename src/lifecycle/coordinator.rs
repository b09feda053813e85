//! Shutdown coordination between the event loop and the shared resource.
//!
//! # Data Flow
//! ```text
//! run():
//!     spawn EventLoopRunner ──┐
//!                             ├─ select! ─┬─ signal first: cancel loop → await loop → teardown
//!     shutdown signal ────────┘           └─ loop first:   teardown → surface loop result
//!
//! teardown() (OnceCell, runs once):
//!     cancel loop → wait for LoopState::Stopped → record LoopStopped → release_graceful()
//! ```
//!
//! # Design Decisions
//! - The loop is always asked to stop, and has stopped, before the resource is released
//! - Every teardown caller awaits the same single release and sees its result
//! - A loop failure and a release failure are reported together

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use thiserror::Error;
use tokio::sync::{watch, OnceCell};
use tokio::task::{JoinError, JoinHandle};
use tokio_util::sync::CancellationToken;

use crate::handler::Handler;
use crate::lifecycle::journal::{LifecycleEvent, LifecycleJournal};
use crate::observability::metrics;
use crate::resource::{ResourceError, ResourceLifecycle};
use crate::runtime::runner::{EventLoopRunner, LoopReport, LoopState};
use crate::runtime::source::{EventSource, TransportError};

/// Coordinator state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoordinatorState {
    Running,
    ShuttingDown,
    Stopped,
}

/// What started the teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownTrigger {
    Signal,
    LoopFinished,
}

impl ShutdownTrigger {
    pub fn as_str(&self) -> &'static str {
        match self {
            ShutdownTrigger::Signal => "signal",
            ShutdownTrigger::LoopFinished => "loop_finished",
        }
    }
}

/// Abnormal end of the event loop task.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoopError {
    #[error("event loop transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("event loop panicked: {0}")]
    Panicked(String),

    #[error("event loop did not stop within {0:?} of cancellation")]
    DrainTimeout(Duration),
}

#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("{source}")]
    Loop {
        source: LoopError,
        /// Release failure during the teardown that followed, if any.
        release: Option<ResourceError>,
    },

    #[error("resource release failed: {0}")]
    Release(ResourceError),
}

impl CoordinatorError {
    /// True when the event loop itself terminated abnormally.
    pub fn is_loop_failure(&self) -> bool {
        matches!(self, CoordinatorError::Loop { .. })
    }
}

/// Outcome of a clean coordinator run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CoordinatorReport {
    pub trigger: ShutdownTrigger,
    pub loop_report: LoopReport,
}

enum Race {
    Loop(Result<Result<LoopReport, TransportError>, JoinError>),
    Signal,
}

/// Races the event loop against the shutdown signal and owns the ordered teardown.
pub struct ShutdownCoordinator {
    lifecycle: Arc<ResourceLifecycle>,
    journal: LifecycleJournal,
    loop_cancel: CancellationToken,
    cancel_requested: AtomicBool,
    loop_state: Mutex<Option<watch::Receiver<LoopState>>>,
    teardown: OnceCell<Result<(), ResourceError>>,
    state: watch::Sender<CoordinatorState>,
    drain_timeout: Option<Duration>,
}

impl ShutdownCoordinator {
    pub fn new(lifecycle: Arc<ResourceLifecycle>) -> Self {
        let (state, _) = watch::channel(CoordinatorState::Running);
        Self {
            lifecycle,
            journal: LifecycleJournal::new(),
            loop_cancel: CancellationToken::new(),
            cancel_requested: AtomicBool::new(false),
            loop_state: Mutex::new(None),
            teardown: OnceCell::new(),
            state,
            drain_timeout: None,
        }
    }

    /// Abort the loop if it has not stopped this long after cancellation.
    pub fn with_drain_timeout(mut self, drain_timeout: Option<Duration>) -> Self {
        self.drain_timeout = drain_timeout;
        self
    }

    pub fn with_journal(mut self, journal: LifecycleJournal) -> Self {
        self.journal = journal;
        self
    }

    pub fn journal(&self) -> &LifecycleJournal {
        &self.journal
    }

    pub fn lifecycle(&self) -> &Arc<ResourceLifecycle> {
        &self.lifecycle
    }

    pub fn subscribe_state(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    /// Register `runner` so a teardown that starts before [`run`](Self::run)
    /// still waits for it to stop.
    pub fn attach<S: EventSource, H: Handler>(&self, runner: &EventLoopRunner<S, H>) {
        *self.loop_state_slot() = Some(runner.subscribe_state());
    }

    /// Run `runner` until it ends or `signal` fires, then tear down.
    ///
    /// Does not return while the release is outstanding.
    pub async fn run<S, H>(
        &self,
        runner: EventLoopRunner<S, H>,
        signal: CancellationToken,
    ) -> Result<CoordinatorReport, CoordinatorError>
    where
        S: EventSource,
        H: Handler,
    {
        self.attach(&runner);
        let mut task = tokio::spawn(runner.run(self.loop_cancel.clone()));

        // Signal first: a loop that stopped because shutdown began counts as signalled.
        let race = tokio::select! {
            biased;
            _ = signal.cancelled() => Race::Signal,
            joined = &mut task => Race::Loop(joined),
        };

        let (trigger, loop_result) = match race {
            Race::Signal => {
                self.journal.record(LifecycleEvent::ShutdownSignalled);
                self.enter_shutdown();
                tracing::info!("Shutdown signal received, stopping event loop");
                self.request_loop_stop();
                (ShutdownTrigger::Signal, self.await_loop(task).await)
            }
            Race::Loop(joined) => {
                self.journal.record(LifecycleEvent::LoopFinished);
                self.enter_shutdown();
                tracing::info!("Event loop finished before shutdown signal");
                (ShutdownTrigger::LoopFinished, flatten(joined))
            }
        };

        let release = self.teardown().await;

        let outcome = match (loop_result, release) {
            (Ok(loop_report), Ok(())) => Ok(CoordinatorReport {
                trigger,
                loop_report,
            }),
            (Ok(_), Err(e)) => Err(CoordinatorError::Release(e)),
            (Err(source), release) => Err(CoordinatorError::Loop {
                source,
                release: release.err(),
            }),
        };

        if let Err(CoordinatorError::Loop { source, release }) = &outcome {
            tracing::error!(
                error = %source,
                release_error = release.as_ref().map(|e| e.to_string()),
                "Event loop terminated abnormally"
            );
        }

        self.journal.record(LifecycleEvent::CoordinatorFinished);
        self.state.send_replace(CoordinatorState::Stopped);
        metrics::record_shutdown(trigger.as_str());
        tracing::info!(trigger = trigger.as_str(), "Shutdown coordinator finished");
        outcome
    }

    /// Stop the loop (if any) and release the resource. Runs once; every caller
    /// awaits the same release and receives its result.
    pub async fn teardown(&self) -> Result<(), ResourceError> {
        self.teardown
            .get_or_init(|| async {
                self.enter_shutdown();
                self.request_loop_stop();
                if self.wait_loop_stopped().await {
                    self.journal.record(LifecycleEvent::LoopStopped);
                }

                let result = match self.lifecycle.release_graceful().await {
                    Err(e) if e.is_already_closed() => {
                        tracing::info!("Shared resource was already closed");
                        Ok(())
                    }
                    other => other,
                };
                match &result {
                    Ok(()) => self.journal.record(LifecycleEvent::ResourceReleased),
                    Err(e) => {
                        tracing::error!(error = %e, "Shared resource release failed");
                        self.journal.record(LifecycleEvent::ReleaseFailed);
                    }
                }
                result
            })
            .await
            .clone()
    }

    /// Immediate close for abrupt termination.
    pub fn force_release(&self) {
        self.request_loop_stop();
        match self.lifecycle.release_forced() {
            Ok(()) => tracing::warn!("Shared resource force-released"),
            Err(e) if e.is_already_closed() => {}
            Err(e) => tracing::error!(error = %e, "Forced release failed"),
        }
    }

    fn loop_state_slot(&self) -> std::sync::MutexGuard<'_, Option<watch::Receiver<LoopState>>> {
        self.loop_state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn enter_shutdown(&self) {
        self.state.send_if_modified(|state| {
            if *state == CoordinatorState::Running {
                *state = CoordinatorState::ShuttingDown;
                true
            } else {
                false
            }
        });
    }

    fn request_loop_stop(&self) {
        if !self.cancel_requested.swap(true, Ordering::AcqRel) {
            self.journal.record(LifecycleEvent::CancellationRequested);
            self.loop_cancel.cancel();
        }
    }

    /// Returns false when no loop was ever started.
    async fn wait_loop_stopped(&self) -> bool {
        let receiver = self.loop_state_slot().clone();
        let Some(mut receiver) = receiver else {
            return false;
        };
        // A dropped sender means the loop task is gone as well.
        let _ = receiver.wait_for(|state| *state == LoopState::Stopped).await;
        true
    }

    async fn await_loop(
        &self,
        task: JoinHandle<Result<LoopReport, TransportError>>,
    ) -> Result<LoopReport, LoopError> {
        let Some(limit) = self.drain_timeout else {
            return flatten(task.await);
        };
        let abort = task.abort_handle();
        match tokio::time::timeout(limit, task).await {
            Ok(joined) => flatten(joined),
            Err(_) => {
                abort.abort();
                tracing::warn!(timeout = ?limit, "Event loop did not drain in time, aborting");
                Err(LoopError::DrainTimeout(limit))
            }
        }
    }
}

fn flatten(joined: Result<Result<LoopReport, TransportError>, JoinError>) -> Result<LoopReport, LoopError> {
    match joined {
        Ok(result) => result.map_err(LoopError::from),
        Err(e) => Err(LoopError::Panicked(e.to_string())),
    }
}
