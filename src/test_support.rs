//! Shared fixtures for unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;

use crate::handler::{Handler, HandlerAdapter, HandlerContext, HandlerError, InvocationError};
use crate::resource::{ClientSettings, ResourceLifecycle};
use crate::runtime::event::{GatewayRequest, GatewayResponse, InvocationEnvelope, InvocationMetadata};
use crate::runtime::source::{EventSource, TransportError};

/// A running resource with an adapter bound to it.
pub fn bound_adapter<H: Handler>(handler: H) -> (Arc<ResourceLifecycle>, Arc<HandlerAdapter<H>>) {
    let lifecycle = Arc::new(ResourceLifecycle::new(ClientSettings::with_timeout(
        Duration::from_secs(30),
    )));
    let adapter = Arc::new(HandlerAdapter::new(handler));
    adapter
        .bind(HandlerContext::bind(lifecycle.create().unwrap(), None))
        .unwrap();
    (lifecycle, adapter)
}

pub fn invocation(request_id: &str, path: &str) -> InvocationEnvelope {
    InvocationEnvelope::new(
        InvocationMetadata::new(request_id).with_timeout(Duration::from_secs(30)),
        GatewayRequest {
            raw_path: path.to_string(),
            ..Default::default()
        },
    )
}

struct Gate {
    open: AtomicBool,
    started: Notify,
    release: Notify,
    calls: AtomicUsize,
}

/// Handler that borrows the shared client and, when closed, blocks until released.
#[derive(Clone)]
pub struct GatedHandler {
    gate: Arc<Gate>,
}

impl GatedHandler {
    fn new(open: bool) -> Self {
        Self {
            gate: Arc::new(Gate {
                open: AtomicBool::new(open),
                started: Notify::new(),
                release: Notify::new(),
                calls: AtomicUsize::new(0),
            }),
        }
    }

    /// Answers immediately.
    pub fn open() -> Self {
        Self::new(true)
    }

    /// Each call waits for [`release`](Self::release).
    pub fn closed() -> Self {
        Self::new(false)
    }

    pub async fn wait_started(&self) {
        self.gate.started.notified().await;
    }

    pub fn release(&self) {
        self.gate.release.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.gate.calls.load(Ordering::SeqCst)
    }
}

impl Handler for GatedHandler {
    async fn handle(
        &self,
        context: &HandlerContext,
        _request: GatewayRequest,
        _metadata: &InvocationMetadata,
    ) -> Result<GatewayResponse, HandlerError> {
        self.gate.calls.fetch_add(1, Ordering::SeqCst);
        let _client = context.http_client()?;
        self.gate.started.notify_one();
        if !self.gate.open.load(Ordering::SeqCst) {
            self.gate.release.notified().await;
        }
        Ok(GatewayResponse::new(200, "done"))
    }
}

/// Source whose receive always fails.
pub struct BrokenSource;

impl EventSource for BrokenSource {
    async fn next_invocation(&mut self) -> Result<Option<InvocationEnvelope>, TransportError> {
        Err(TransportError::Receive("connection refused".to_string()))
    }

    async fn send_response(&mut self, _: &str, _: GatewayResponse) -> Result<(), TransportError> {
        Ok(())
    }

    async fn send_error(&mut self, _: &str, _: &InvocationError) -> Result<(), TransportError> {
        Ok(())
    }
}
