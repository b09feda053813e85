//! Runs a set of long-lived services under one shutdown signal.
//!
//! # Responsibilities
//! - Start every service concurrently
//! - Tear the whole group down when the signal fires or any service ends
//! - Report the first failure, log the rest
//!
//! # Design Decisions
//! - Services get a group token derived from [`Shutdown`]; a service ending
//!   early cancels the group without firing the external signal
//! - Panics are caught per service so the name survives

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use thiserror::Error;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::config::SignalKind;
use crate::lifecycle::coordinator::CoordinatorError;
use crate::lifecycle::shutdown::Shutdown;
use crate::lifecycle::signals::spawn_signal_listener;
use crate::resource::ResourceError;

/// Failure of a single service.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error(transparent)]
    Coordinator(#[from] CoordinatorError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("service '{service}' failed: {source}")]
    ServiceFailed {
        service: &'static str,
        source: ServiceError,
    },

    #[error("service '{service}' panicked: {message}")]
    Panicked {
        service: &'static str,
        message: String,
    },

    #[error("failed to install signal handlers: {0}")]
    Signals(std::io::Error),
}

impl OrchestratorError {
    /// True when the event loop terminated abnormally, as opposed to a
    /// teardown-only failure.
    pub fn is_loop_failure(&self) -> bool {
        match self {
            OrchestratorError::ServiceFailed {
                source: ServiceError::Coordinator(e),
                ..
            } => e.is_loop_failure(),
            OrchestratorError::Panicked { .. } => true,
            _ => false,
        }
    }
}

/// A long-running unit of work owned by the orchestrator.
pub trait Service: Send + 'static {
    fn name(&self) -> &'static str;

    /// Run until `shutdown` is cancelled or the work ends on its own.
    fn run(self: Box<Self>, shutdown: CancellationToken) -> BoxFuture<'static, Result<(), ServiceError>>;
}

pub struct ServiceOrchestrator {
    shutdown: Shutdown,
    services: Vec<Box<dyn Service>>,
    signals: Vec<SignalKind>,
}

impl ServiceOrchestrator {
    pub fn new(shutdown: Shutdown) -> Self {
        Self {
            shutdown,
            services: Vec::new(),
            signals: Vec::new(),
        }
    }

    pub fn with_service<S: Service>(self, service: S) -> Self {
        self.with_boxed_service(Box::new(service))
    }

    pub fn with_boxed_service(mut self, service: Box<dyn Service>) -> Self {
        self.services.push(service);
        self
    }

    /// Translate these OS signals into a shutdown.
    pub fn with_signals(mut self, signals: Vec<SignalKind>) -> Self {
        self.signals = signals;
        self
    }

    pub async fn run(self) -> Result<(), OrchestratorError> {
        let group = self.shutdown.subscribe();
        let stop_signals = CancellationToken::new();

        let listener = if self.signals.is_empty() {
            None
        } else {
            let handle = spawn_signal_listener(&self.signals, self.shutdown.clone(), stop_signals.clone())
                .map_err(OrchestratorError::Signals)?;
            Some(handle)
        };

        let mut set = JoinSet::new();
        for service in self.services {
            let name = service.name();
            let token = group.clone();
            tracing::info!(service = name, "Starting service");
            set.spawn(async move {
                let outcome = AssertUnwindSafe(service.run(token)).catch_unwind().await;
                (name, outcome)
            });
        }

        let mut first_error = None;
        while let Some(joined) = set.join_next().await {
            let (name, error) = match joined {
                Ok((name, Ok(Ok(())))) => {
                    tracing::info!(service = name, "Service stopped");
                    (name, None)
                }
                Ok((name, Ok(Err(source)))) => (
                    name,
                    Some(OrchestratorError::ServiceFailed {
                        service: name,
                        source,
                    }),
                ),
                Ok((name, Err(panic))) => (
                    name,
                    Some(OrchestratorError::Panicked {
                        service: name,
                        message: panic_message(panic.as_ref()),
                    }),
                ),
                Err(e) => (
                    "unknown",
                    Some(OrchestratorError::Panicked {
                        service: "unknown",
                        message: e.to_string(),
                    }),
                ),
            };

            if !group.is_cancelled() {
                tracing::info!(service = name, "Service ended, stopping remaining services");
                group.cancel();
            }

            if let Some(error) = error {
                if first_error.is_none() {
                    tracing::error!(error = %error, "Service failed");
                    first_error = Some(error);
                } else {
                    tracing::warn!(error = %error, "Additional service failure during shutdown");
                }
            }
        }

        stop_signals.cancel();
        if let Some(listener) = listener {
            let _ = listener.await;
        }

        match first_error {
            Some(error) => Err(error),
            None => {
                tracing::info!("All services stopped");
                Ok(())
            }
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
