//! Shared utilities for integration testing.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use std::convert::Infallible;

use axum::body::{Body, Bytes};
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::Notify;

use function_host::handler::{Handler, HandlerContext, HandlerError};
use function_host::runtime::{GatewayRequest, GatewayResponse, InvocationEnvelope, InvocationMetadata};

/// A reply the function posted back to the mock Runtime API.
#[derive(Debug, Clone)]
pub struct PostedReply {
    pub request_id: String,
    /// `response` or `error`.
    pub kind: String,
    pub error_type: Option<String>,
    pub body: Value,
}

struct MockState {
    pending: Mutex<VecDeque<(String, String)>>,
    replies: Mutex<Vec<PostedReply>>,
    posted: Notify,
    served: AtomicUsize,
    served_notify: Notify,
    /// Answer 410 once the queue is empty instead of holding the poll open.
    exhaust: bool,
    /// Hold each invocation body back this long after sending its headers.
    body_delay: Option<Duration>,
}

/// Minimal Runtime API: serves queued invocations and records replies.
pub struct MockRuntimeApi {
    pub addr: SocketAddr,
    state: Arc<MockState>,
}

impl MockRuntimeApi {
    /// Start with `(request_id, raw JSON payload)` pairs.
    pub async fn start(invocations: Vec<(&str, String)>, exhaust: bool) -> Self {
        Self::start_with(invocations, exhaust, None).await
    }

    /// Like [`start`](Self::start), but every body arrives `delay` after its
    /// headers. The poll stays open once the queue is empty.
    pub async fn start_with_body_delay(invocations: Vec<(&str, String)>, delay: Duration) -> Self {
        Self::start_with(invocations, false, Some(delay)).await
    }

    async fn start_with(
        invocations: Vec<(&str, String)>,
        exhaust: bool,
        body_delay: Option<Duration>,
    ) -> Self {
        let state = Arc::new(MockState {
            pending: Mutex::new(
                invocations
                    .into_iter()
                    .map(|(id, body)| (id.to_string(), body))
                    .collect(),
            ),
            replies: Mutex::new(Vec::new()),
            posted: Notify::new(),
            served: AtomicUsize::new(0),
            served_notify: Notify::new(),
            exhaust,
            body_delay,
        });

        let app = Router::new()
            .route("/2018-06-01/runtime/invocation/next", get(next))
            .route("/2018-06-01/runtime/invocation/{id}/{kind}", post(reply))
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });

        Self { addr, state }
    }

    /// Host and port, as `AWS_LAMBDA_RUNTIME_API` carries it.
    pub fn endpoint(&self) -> String {
        self.addr.to_string()
    }

    pub fn replies(&self) -> Vec<PostedReply> {
        self.state.replies.lock().unwrap().clone()
    }

    /// Wait until at least `count` replies were posted.
    pub async fn wait_for_replies(&self, count: usize) -> Vec<PostedReply> {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let posted = self.state.posted.notified();
                let replies = self.replies();
                if replies.len() >= count {
                    return replies;
                }
                posted.await;
            }
        })
        .await
        .expect("timed out waiting for replies")
    }

    /// Wait until at least `count` invocations were handed out.
    pub async fn wait_for_served(&self, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let served = self.state.served_notify.notified();
                if self.state.served.load(Ordering::SeqCst) >= count {
                    return;
                }
                served.await;
            }
        })
        .await
        .expect("timed out waiting for invocations to be served")
    }
}

async fn next(State(state): State<Arc<MockState>>) -> Response {
    let item = state.pending.lock().unwrap().pop_front();
    if item.is_some() {
        state.served.fetch_add(1, Ordering::SeqCst);
        state.served_notify.notify_waiters();
    }
    match item {
        Some((id, body)) => (
            StatusCode::OK,
            [
                ("lambda-runtime-aws-request-id", id),
                ("lambda-runtime-deadline-ms", "4102444800000".to_string()),
                ("lambda-runtime-trace-id", "Root=1-mock".to_string()),
                (
                    "lambda-runtime-invoked-function-arn",
                    "arn:aws:lambda:us-east-1:000000000000:function:mock".to_string(),
                ),
            ],
            delayed_body(body, state.body_delay),
        )
            .into_response(),
        None if state.exhaust => StatusCode::GONE.into_response(),
        None => std::future::pending().await,
    }
}

async fn reply(
    State(state): State<Arc<MockState>>,
    Path((request_id, kind)): Path<(String, String)>,
    headers: HeaderMap,
    body: Bytes,
) -> StatusCode {
    let error_type = headers
        .get("lambda-runtime-function-error-type")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);

    state.replies.lock().unwrap().push(PostedReply {
        request_id,
        kind,
        error_type,
        body,
    });
    state.posted.notify_waiters();
    StatusCode::ACCEPTED
}

fn delayed_body(body: String, delay: Option<Duration>) -> Body {
    match delay {
        None => Body::from(body),
        Some(delay) => Body::from_stream(futures_util::stream::once(async move {
            tokio::time::sleep(delay).await;
            Ok::<_, Infallible>(Bytes::from(body))
        })),
    }
}

/// An address nothing is listening on.
pub async fn unused_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
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

/// Echoes the path; `/fail` fails with `invalidRequest`.
pub struct EchoHandler;

impl Handler for EchoHandler {
    async fn handle(
        &self,
        context: &HandlerContext,
        request: GatewayRequest,
        _metadata: &InvocationMetadata,
    ) -> Result<GatewayResponse, HandlerError> {
        let _client = context.http_client()?;
        if request.raw_path == "/fail" {
            return Err(HandlerError::InvalidRequest);
        }
        Ok(GatewayResponse::new(200, request.raw_path))
    }
}

/// Blocks each invocation until [`release`](SlowHandler::release) is called.
#[derive(Clone, Default)]
pub struct SlowHandler {
    started: Arc<Notify>,
    release: Arc<Notify>,
    released: Arc<AtomicBool>,
    calls: Arc<AtomicUsize>,
}

impl SlowHandler {
    pub async fn wait_started(&self) {
        self.started.notified().await;
    }

    pub fn release(&self) {
        self.released.store(true, Ordering::SeqCst);
        self.release.notify_one();
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Handler for SlowHandler {
    async fn handle(
        &self,
        context: &HandlerContext,
        _request: GatewayRequest,
        _metadata: &InvocationMetadata,
    ) -> Result<GatewayResponse, HandlerError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let _client = context.http_client()?;
        self.started.notify_one();
        if !self.released.load(Ordering::SeqCst) {
            self.release.notified().await;
        }
        Ok(GatewayResponse::new(200, "slow done"))
    }
}
