//! Runtime API event source.
//!
//! # Responsibilities
//! - Long-poll `GET /2018-06-01/runtime/invocation/next`
//! - Extract correlation metadata from the `Lambda-Runtime-*` headers
//! - Post results to `/invocation/{id}/response` or `/invocation/{id}/error`
//!
//! # Design Decisions
//! - Own `reqwest::Client` without a request timeout (the poll blocks until work arrives)
//! - A receive in progress is kept on the source, so dropping `next_invocation`
//!   never loses an invocation the Runtime API already handed out
//! - A payload that fails to decode is reported as that invocation's error; the
//!   loop moves on to the next one
//! - Network failures and non-2xx statuses are transport errors

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::BoxFuture;
use futures_util::FutureExt;
use reqwest::header::HeaderMap;
use reqwest::StatusCode;
use url::Url;

use crate::handler::InvocationError;
use crate::runtime::event::{GatewayRequest, GatewayResponse, InvocationEnvelope, InvocationMetadata};
use crate::runtime::source::{ErrorReply, EventSource, TransportError};

const API_VERSION: &str = "2018-06-01";

pub const REQUEST_ID_HEADER: &str = "lambda-runtime-aws-request-id";
pub const DEADLINE_HEADER: &str = "lambda-runtime-deadline-ms";
pub const TRACE_ID_HEADER: &str = "lambda-runtime-trace-id";
pub const FUNCTION_ARN_HEADER: &str = "lambda-runtime-invoked-function-arn";
pub const ERROR_TYPE_HEADER: &str = "lambda-runtime-function-error-type";

/// Outcome of one `GET invocation/next`.
enum Received {
    Invocation(InvocationEnvelope),
    /// Undecodable payload, already answered with an error.
    Rejected,
    Exhausted,
}

/// A `GET invocation/next` that outlives the call that started it.
struct PendingReceive {
    future: BoxFuture<'static, Result<Received, TransportError>>,
    /// Set once the Runtime API has handed out an invocation.
    committed: Arc<AtomicBool>,
}

impl PendingReceive {
    fn start(client: reqwest::Client, base: Url) -> Self {
        let committed = Arc::new(AtomicBool::new(false));
        let future = receive_next(client, base, committed.clone()).boxed();
        Self { future, committed }
    }

    fn is_committed(&self) -> bool {
        self.committed.load(Ordering::Acquire)
    }
}

/// Event source talking to the Runtime API over HTTP.
pub struct RuntimeApiSource {
    client: reqwest::Client,
    base: Url,
    pending: Option<PendingReceive>,
}

impl RuntimeApiSource {
    /// Create a source for `endpoint` (host and port, as in `AWS_LAMBDA_RUNTIME_API`).
    pub fn new(endpoint: &str) -> Result<Self, TransportError> {
        let base = Url::parse(&format!("http://{}/{}/runtime/", endpoint.trim(), API_VERSION))
            .map_err(|e| TransportError::Malformed(format!("invalid Runtime API endpoint '{}': {}", endpoint, e)))?;
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| TransportError::Receive(e.to_string()))?;
        Ok(Self {
            client,
            base,
            pending: None,
        })
    }

    /// Resume the receive in progress, or start a new one.
    async fn receive(&mut self) -> Result<Received, TransportError> {
        let (client, base) = (self.client.clone(), self.base.clone());
        let pending = self
            .pending
            .get_or_insert_with(move || PendingReceive::start(client, base));
        let result = pending.future.as_mut().await;
        self.pending = None;
        result
    }
}

fn join(base: &Url, path: &str) -> Result<Url, TransportError> {
    base.join(path)
        .map_err(|e| TransportError::Malformed(format!("invalid Runtime API path '{}': {}", path, e)))
}

async fn post_result<T: serde::Serialize>(
    client: &reqwest::Client,
    base: &Url,
    request_id: &str,
    kind: &str,
    body: &T,
    error_type: Option<&str>,
) -> Result<(), TransportError> {
    let send_error = |reason: String| TransportError::Send {
        request_id: request_id.to_string(),
        reason,
    };

    let url = join(base, &format!("invocation/{}/{}", request_id, kind))?;
    let mut request = client.post(url).json(body);
    if let Some(error_type) = error_type {
        request = request.header(ERROR_TYPE_HEADER, error_type);
    }

    let response = request.send().await.map_err(|e| send_error(e.to_string()))?;
    let status = response.status();
    if !status.is_success() {
        return Err(send_error(format!("Runtime API returned status {}", status)));
    }
    Ok(())
}

async fn receive_next(
    client: reqwest::Client,
    base: Url,
    committed: Arc<AtomicBool>,
) -> Result<Received, TransportError> {
    let response = client
        .get(join(&base, "invocation/next")?)
        .send()
        .await
        .map_err(|e| TransportError::Receive(e.to_string()))?;

    let status = response.status();
    if status == StatusCode::GONE {
        // The runtime has no more work for this environment.
        return Ok(Received::Exhausted);
    }
    if !status.is_success() {
        return Err(TransportError::Receive(format!(
            "Runtime API returned status {}",
            status
        )));
    }

    let metadata = metadata_from_headers(response.headers())?;
    committed.store(true, Ordering::Release);
    let body = response
        .bytes()
        .await
        .map_err(|e| TransportError::Receive(e.to_string()))?;

    match serde_json::from_slice::<GatewayRequest>(&body) {
        Ok(request) => Ok(Received::Invocation(InvocationEnvelope::new(metadata, request))),
        Err(e) => {
            tracing::warn!(
                request_id = %metadata.request_id,
                error = %e,
                "Could not decode invocation payload"
            );
            let reply = ErrorReply {
                error_message: e.to_string(),
                error_type: "InvalidPayload".to_string(),
            };
            post_result(&client, &base, &metadata.request_id, "error", &reply, Some("InvalidPayload"))
                .await?;
            Ok(Received::Rejected)
        }
    }
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn metadata_from_headers(headers: &HeaderMap) -> Result<InvocationMetadata, TransportError> {
    let request_id = header_str(headers, REQUEST_ID_HEADER)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| TransportError::Malformed(format!("missing {} header", REQUEST_ID_HEADER)))?;

    Ok(InvocationMetadata {
        request_id: request_id.to_string(),
        deadline_ms: header_str(headers, DEADLINE_HEADER).and_then(|v| v.parse().ok()),
        trace_id: header_str(headers, TRACE_ID_HEADER).map(str::to_string),
        invoked_function_arn: header_str(headers, FUNCTION_ARN_HEADER).map(str::to_string),
    })
}

impl EventSource for RuntimeApiSource {
    async fn next_invocation(&mut self) -> Result<Option<InvocationEnvelope>, TransportError> {
        loop {
            match self.receive().await? {
                Received::Invocation(invocation) => return Ok(Some(invocation)),
                Received::Exhausted => return Ok(None),
                Received::Rejected => continue,
            }
        }
    }

    async fn take_committed(&mut self) -> Result<Option<InvocationEnvelope>, TransportError> {
        if !self.pending.as_ref().is_some_and(PendingReceive::is_committed) {
            // Nothing was handed out; abandon the idle long-poll.
            self.pending = None;
            return Ok(None);
        }
        match self.receive().await? {
            Received::Invocation(invocation) => {
                tracing::info!(
                    request_id = %invocation.request_id(),
                    "Finishing invocation received before shutdown"
                );
                Ok(Some(invocation))
            }
            Received::Rejected | Received::Exhausted => Ok(None),
        }
    }

    async fn send_response(
        &mut self,
        request_id: &str,
        response: GatewayResponse,
    ) -> Result<(), TransportError> {
        post_result(&self.client, &self.base, request_id, "response", &response, None).await
    }

    async fn send_error(
        &mut self,
        request_id: &str,
        error: &InvocationError,
    ) -> Result<(), TransportError> {
        let reply = ErrorReply::from(error);
        post_result(&self.client, &self.base, request_id, "error", &reply, Some(error.error_type()))
            .await
    }
}
