//! Event source boundary.

use std::future::Future;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::handler::InvocationError;
use crate::runtime::event::{GatewayResponse, InvocationEnvelope};

/// Receive/send failure against the event source. Fatal to the event loop.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("failed to receive next invocation: {0}")]
    Receive(String),

    #[error("failed to send result for invocation {request_id}: {reason}")]
    Send { request_id: String, reason: String },

    #[error("malformed invocation: {0}")]
    Malformed(String),

    #[error("no invocation in flight with id {0}")]
    UnknownRequest(String),
}

/// Error payload reported back for a failed invocation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorReply {
    pub error_message: String,
    pub error_type: String,
}

impl From<&InvocationError> for ErrorReply {
    fn from(error: &InvocationError) -> Self {
        Self {
            error_message: error.to_string(),
            error_type: error.error_type().to_string(),
        }
    }
}

/// Where invocations come from and where their results go.
///
/// `next_invocation` must be cancel-safe: the event loop drops it when a
/// shutdown wins the race. `Ok(None)` means the source is exhausted.
pub trait EventSource: Send + 'static {
    fn next_invocation(
        &mut self,
    ) -> impl Future<Output = Result<Option<InvocationEnvelope>, TransportError>> + Send;

    /// Called once the loop has been cancelled at the receive boundary. If a
    /// dropped `next_invocation` had already taken an invocation, finish
    /// receiving it so it can still be answered. `Ok(None)` when nothing was taken.
    fn take_committed(
        &mut self,
    ) -> impl Future<Output = Result<Option<InvocationEnvelope>, TransportError>> + Send {
        async { Ok(None) }
    }

    fn send_response(
        &mut self,
        request_id: &str,
        response: GatewayResponse,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;

    fn send_error(
        &mut self,
        request_id: &str,
        error: &InvocationError,
    ) -> impl Future<Output = Result<(), TransportError>> + Send;
}
