//! The receive → dispatch → reply loop.
//!
//! # States
//! ```text
//! Idle → Running → Stopped
//!             └──→ Draining → Stopped   (cancelled with an invocation in flight)
//! ```
//!
//! # Design Decisions
//! - Cancellation only wins at the "receive next" boundary; an in-flight
//!   dispatch always completes and its result is written back
//! - An invocation the source had already taken when cancellation won is
//!   dispatched and answered before the loop stops
//! - Transport errors end the loop; invocation errors become error replies
//! - `run` consumes the runner, so a stopped loop cannot be restarted

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;

use crate::handler::{Handler, HandlerAdapter};
use crate::observability::metrics;
use crate::runtime::source::{EventSource, TransportError};

/// Observable state of the event loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    Idle,
    Running,
    Draining,
    Stopped,
}

/// Why the loop ended without a transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopExit {
    Cancelled,
    Exhausted,
}

/// Summary of a finished loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    /// Invocations dispatched, including failed ones.
    pub processed: u64,
    /// Invocations answered with an error.
    pub failed: u64,
    pub exit: LoopExit,
}

/// Drives one event source through one handler adapter.
pub struct EventLoopRunner<S, H> {
    source: S,
    adapter: Arc<HandlerAdapter<H>>,
    state: watch::Sender<LoopState>,
}

impl<S: EventSource, H: Handler> EventLoopRunner<S, H> {
    pub fn new(source: S, adapter: Arc<HandlerAdapter<H>>) -> Self {
        let (state, _) = watch::channel(LoopState::Idle);
        Self {
            source,
            adapter,
            state,
        }
    }

    /// Subscribe to state transitions.
    pub fn subscribe_state(&self) -> watch::Receiver<LoopState> {
        self.state.subscribe()
    }

    /// Run until `cancel` fires, the source is exhausted, or a transport error occurs.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<LoopReport, TransportError> {
        self.state.send_replace(LoopState::Running);
        tracing::info!("Event loop started");

        let result = self.run_inner(&cancel).await;
        self.state.send_replace(LoopState::Stopped);

        match &result {
            Ok(report) => tracing::info!(
                processed = report.processed,
                failed = report.failed,
                exit = ?report.exit,
                "Event loop stopped"
            ),
            Err(e) => tracing::error!(error = %e, "Event loop failed"),
        }
        result
    }

    async fn run_inner(&mut self, cancel: &CancellationToken) -> Result<LoopReport, TransportError> {
        let mut processed = 0;
        let mut failed = 0;
        let report = |processed, failed, exit| LoopReport {
            processed,
            failed,
            exit,
        };

        loop {
            let received = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                next = self.source.next_invocation() => Some(next?),
            };
            let next = match received {
                Some(next) => next,
                // An invocation the source already took is still answered.
                None => match self.source.take_committed().await? {
                    Some(invocation) => Some(invocation),
                    None => return Ok(report(processed, failed, LoopExit::Cancelled)),
                },
            };

            let Some(invocation) = next else {
                return Ok(report(processed, failed, LoopExit::Exhausted));
            };

            let request_id = invocation.request_id().to_string();
            let span = tracing::info_span!(
                "invocation",
                request_id = %request_id,
                trace_id = invocation.metadata.trace_id.as_deref().unwrap_or("")
            );
            let started = Instant::now();

            let adapter = self.adapter.clone();
            let dispatch = adapter.dispatch(invocation).instrument(span.clone());
            tokio::pin!(dispatch);

            let mut draining = false;
            let outcome = tokio::select! {
                outcome = &mut dispatch => outcome,
                _ = cancel.cancelled() => {
                    draining = true;
                    self.state.send_replace(LoopState::Draining);
                    tracing::info!(request_id = %request_id, "Shutdown requested, draining in-flight invocation");
                    dispatch.await
                }
            };

            processed += 1;
            match outcome {
                Ok(response) => {
                    metrics::record_invocation("success", started.elapsed());
                    self.source.send_response(&request_id, response).await?;
                }
                Err(error) => {
                    failed += 1;
                    let outcome = if error.is_not_ready() { "not_ready" } else { "error" };
                    metrics::record_invocation(outcome, started.elapsed());
                    span.in_scope(|| {
                        tracing::warn!(error = %error, error_type = error.error_type(), "Invocation failed")
                    });
                    self.source.send_error(&request_id, &error).await?;
                }
            }

            if draining {
                return Ok(report(processed, failed, LoopExit::Cancelled));
            }
        }
    }
}
