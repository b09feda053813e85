//! Startup orchestration.
//!
//! # Responsibilities
//! - Create the shared HTTP client before anything can use it
//! - Bind the handler to its context
//! - Pick the event source (Runtime API or local invoke server)
//! - Compose the services and run them until shutdown
//!
//! # Design Decisions
//! - Fail fast: a startup error is returned before any service starts
//! - The local listener is bound before services start, so a bad address
//!   fails startup instead of surfacing later
//! - On a failed run the client is force-released as a last resort

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::net::TcpListener;

use crate::config::HostConfig;
use crate::handler::{AlreadyBound, Handler, HandlerAdapter, HandlerContext};
use crate::lifecycle::coordinator::ShutdownCoordinator;
use crate::lifecycle::journal::LifecycleJournal;
use crate::lifecycle::orchestrator::{OrchestratorError, Service, ServiceOrchestrator};
use crate::lifecycle::services::{EventLoopService, LocalInvokeService, ResourceService};
use crate::lifecycle::shutdown::Shutdown;
use crate::resource::{ClientSettings, ResourceError, ResourceLifecycle};
use crate::runtime::api::RuntimeApiSource;
use crate::runtime::channel::channel;
use crate::runtime::local;
use crate::runtime::runner::EventLoopRunner;
use crate::runtime::source::{EventSource, TransportError};

#[derive(Debug, Error)]
pub enum HostError {
    #[error("no Runtime API endpoint configured and local server disabled")]
    MissingEndpoint,

    #[error("invalid Runtime API endpoint: {0}")]
    Endpoint(#[from] TransportError),

    #[error("failed to bind local invoke server: {0}")]
    Bind(#[from] std::io::Error),

    #[error("failed to create HTTP client: {0}")]
    Resource(#[from] ResourceError),

    #[error(transparent)]
    Context(#[from] AlreadyBound),

    #[error(transparent)]
    Service(#[from] OrchestratorError),
}

impl HostError {
    /// True when the host should exit with a failure status.
    ///
    /// Teardown-only failures after a clean stop are logged, not fatal.
    pub fn is_fatal(&self) -> bool {
        match self {
            HostError::Service(OrchestratorError::Signals(_)) => true,
            HostError::Service(e) => e.is_loop_failure(),
            _ => true,
        }
    }
}

/// A function host: one handler, one shared client, one event loop.
pub struct FunctionHost<H> {
    config: HostConfig,
    handler: H,
    shutdown: Shutdown,
    journal: LifecycleJournal,
}

impl<H: Handler> FunctionHost<H> {
    pub fn new(config: HostConfig, handler: H) -> Self {
        Self {
            config,
            handler,
            shutdown: Shutdown::new(),
            journal: LifecycleJournal::new(),
        }
    }

    /// Handle for triggering shutdown programmatically.
    pub fn shutdown_handle(&self) -> Shutdown {
        self.shutdown.clone()
    }

    pub fn journal(&self) -> LifecycleJournal {
        self.journal.clone()
    }

    /// Run with the configured event source and OS signal handling.
    pub async fn run(self) -> Result<(), HostError> {
        if self.config.local.enabled {
            let listener = TcpListener::bind(&self.config.local.bind_address).await?;
            let (sender, source) = channel(self.config.local.queue_capacity);
            let router = local::router(
                sender,
                Duration::from_secs(self.config.local.invocation_timeout_secs),
            );
            let server: Box<dyn Service> = Box::new(LocalInvokeService::new(listener, router));
            self.serve(source, vec![server], true).await
        } else {
            let endpoint = self
                .config
                .runtime
                .api_endpoint
                .as_deref()
                .ok_or(HostError::MissingEndpoint)?;
            let source = RuntimeApiSource::new(endpoint)?;
            self.serve(source, Vec::new(), true).await
        }
    }

    /// Run against a caller-supplied source. No OS signals are installed;
    /// stop it through [`shutdown_handle`](Self::shutdown_handle).
    pub async fn run_with_source<S: EventSource>(self, source: S) -> Result<(), HostError> {
        self.serve(source, Vec::new(), false).await
    }

    async fn serve<S: EventSource>(
        self,
        source: S,
        extra: Vec<Box<dyn Service>>,
        install_signals: bool,
    ) -> Result<(), HostError> {
        let lifecycle = Arc::new(ResourceLifecycle::new(ClientSettings::from(&self.config.client)));
        let coordinator = Arc::new(
            ShutdownCoordinator::new(lifecycle)
                .with_drain_timeout(self.config.shutdown.drain_timeout())
                .with_journal(self.journal.clone()),
        );

        let (resource_service, resource) = ResourceService::start(coordinator.clone())?;
        let adapter = Arc::new(HandlerAdapter::new(self.handler));
        adapter.bind(HandlerContext::bind(resource, self.config.runtime.handler.clone()))?;

        tracing::info!(
            name = %self.config.name,
            handler = self.config.runtime.handler.as_deref().unwrap_or("-"),
            local = self.config.local.enabled,
            "Function host starting"
        );

        let runner = EventLoopRunner::new(source, adapter);
        let mut orchestrator = ServiceOrchestrator::new(self.shutdown.clone())
            .with_service(EventLoopService::new(coordinator.clone(), runner))
            .with_service(resource_service);
        for service in extra {
            orchestrator = orchestrator.with_boxed_service(service);
        }
        if install_signals {
            orchestrator = orchestrator.with_signals(self.config.shutdown.signals.clone());
        }

        let result = orchestrator.run().await;
        if result.is_err() {
            coordinator.force_release();
        }
        result?;

        tracing::info!("Function host stopped");
        Ok(())
    }
}
