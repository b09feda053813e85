//! Binding of a user handler to its lifecycle-scoped context.

use std::future::Future;
use std::sync::OnceLock;

use thiserror::Error;

use crate::handler::context::HandlerContext;
use crate::handler::types::{HandlerError, InvocationError};
use crate::resource::ResourceState;
use crate::runtime::event::{GatewayRequest, GatewayResponse, InvocationEnvelope, InvocationMetadata};

/// A single-operation request handler.
pub trait Handler: Send + Sync + 'static {
    fn handle(
        &self,
        context: &HandlerContext,
        request: GatewayRequest,
        metadata: &InvocationMetadata,
    ) -> impl Future<Output = Result<GatewayResponse, HandlerError>> + Send;
}

/// Handler built from an async closure. See [`handler_fn`].
#[derive(Clone)]
pub struct HandlerFn<F> {
    f: F,
}

/// Wrap an async closure taking owned arguments as a [`Handler`].
pub fn handler_fn<F, Fut>(f: F) -> HandlerFn<F>
where
    F: Fn(HandlerContext, GatewayRequest, InvocationMetadata) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<GatewayResponse, HandlerError>> + Send,
{
    HandlerFn { f }
}

impl<F, Fut> Handler for HandlerFn<F>
where
    F: Fn(HandlerContext, GatewayRequest, InvocationMetadata) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<GatewayResponse, HandlerError>> + Send,
{
    fn handle(
        &self,
        context: &HandlerContext,
        request: GatewayRequest,
        metadata: &InvocationMetadata,
    ) -> impl Future<Output = Result<GatewayResponse, HandlerError>> + Send {
        (self.f)(context.clone(), request, metadata.clone())
    }
}

/// Error raised when binding a context twice.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("handler context is already bound")]
pub struct AlreadyBound;

/// Wraps a [`Handler`] and the one context it runs with.
pub struct HandlerAdapter<H> {
    handler: H,
    context: OnceLock<HandlerContext>,
}

impl<H: Handler> HandlerAdapter<H> {
    /// An adapter with no context bound; dispatch fails until [`bind`](Self::bind).
    pub fn new(handler: H) -> Self {
        Self {
            handler,
            context: OnceLock::new(),
        }
    }

    /// Install the context. Exactly one context per adapter.
    pub fn bind(&self, context: HandlerContext) -> Result<(), AlreadyBound> {
        self.context.set(context).map_err(|_| AlreadyBound)
    }

    pub fn context(&self) -> Option<&HandlerContext> {
        self.context.get()
    }

    /// Run the handler for one invocation.
    ///
    /// The handler is only called while the bound resource is running; its result
    /// or error is returned unchanged.
    pub async fn dispatch(
        &self,
        invocation: InvocationEnvelope,
    ) -> Result<GatewayResponse, InvocationError> {
        let context = self.context.get().ok_or(InvocationError::HandlerNotReady)?;

        let state = context.resource().state();
        if state != ResourceState::Running {
            return Err(InvocationError::ResourceUnavailable(state));
        }

        self.handler
            .handle(context, invocation.request, &invocation.metadata)
            .await
            .map_err(InvocationError::Handler)
    }
}
