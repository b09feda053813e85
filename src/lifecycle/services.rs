//! The services a function host runs.

use std::sync::Arc;

use axum::Router;
use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;

use crate::handler::Handler;
use crate::lifecycle::coordinator::ShutdownCoordinator;
use crate::lifecycle::orchestrator::{Service, ServiceError};
use crate::resource::{ResourceError, SharedResource};
use crate::runtime::local;
use crate::runtime::runner::EventLoopRunner;
use crate::runtime::source::EventSource;

/// Runs the event loop under the shutdown coordinator.
pub struct EventLoopService<S, H> {
    coordinator: Arc<ShutdownCoordinator>,
    runner: EventLoopRunner<S, H>,
}

impl<S: EventSource, H: Handler> EventLoopService<S, H> {
    pub fn new(coordinator: Arc<ShutdownCoordinator>, runner: EventLoopRunner<S, H>) -> Self {
        coordinator.attach(&runner);
        Self { coordinator, runner }
    }
}

impl<S: EventSource, H: Handler> Service for EventLoopService<S, H> {
    fn name(&self) -> &'static str {
        "event-loop"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> BoxFuture<'static, Result<(), ServiceError>> {
        let Self { coordinator, runner } = *self;
        async move {
            coordinator.run(runner, shutdown).await?;
            Ok(())
        }
        .boxed()
    }
}

/// Owns the shared client for the lifetime of the group.
///
/// The client is created when the service is built, so it is live before any
/// other service starts. On shutdown the release goes through the
/// coordinator, which stops the loop first.
pub struct ResourceService {
    coordinator: Arc<ShutdownCoordinator>,
}

impl ResourceService {
    pub fn start(coordinator: Arc<ShutdownCoordinator>) -> Result<(Self, SharedResource), ResourceError> {
        let resource = coordinator.lifecycle().create()?;
        Ok((Self { coordinator }, resource))
    }
}

impl Service for ResourceService {
    fn name(&self) -> &'static str {
        "http-client"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> BoxFuture<'static, Result<(), ServiceError>> {
        async move {
            shutdown.cancelled().await;
            self.coordinator.teardown().await?;
            Ok(())
        }
        .boxed()
    }
}

/// Serves the local `/invoke` endpoint.
pub struct LocalInvokeService {
    listener: TcpListener,
    router: Router,
}

impl LocalInvokeService {
    pub fn new(listener: TcpListener, router: Router) -> Self {
        Self { listener, router }
    }
}

impl Service for LocalInvokeService {
    fn name(&self) -> &'static str {
        "local-invoke-server"
    }

    fn run(self: Box<Self>, shutdown: CancellationToken) -> BoxFuture<'static, Result<(), ServiceError>> {
        async move {
            local::serve(self.listener, self.router, shutdown).await?;
            Ok(())
        }
        .boxed()
    }
}
