//! In-process event source backed by channels.
//!
//! Used by the local invoke server and by tests: callers push an envelope
//! through an [`InvocationSender`] and await the reply the event loop writes back.

use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

use crate::handler::InvocationError;
use crate::runtime::event::{GatewayResponse, InvocationEnvelope};
use crate::runtime::source::{ErrorReply, EventSource, TransportError};

/// What the caller of an invocation receives.
pub type InvocationReply = Result<GatewayResponse, ErrorReply>;

struct Pending {
    envelope: InvocationEnvelope,
    reply: oneshot::Sender<InvocationReply>,
}

/// Failure to deliver an invocation or receive its reply.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvokeError {
    /// The event loop is gone; nothing will pick the invocation up.
    #[error("event source is closed")]
    Closed,

    /// The invocation was taken but no reply was written.
    #[error("invocation was dropped without a reply")]
    Dropped,
}

/// Producer half: submits invocations.
#[derive(Clone)]
pub struct InvocationSender {
    tx: mpsc::Sender<Pending>,
}

impl InvocationSender {
    /// Submit an invocation and wait for its reply.
    pub async fn invoke(&self, envelope: InvocationEnvelope) -> Result<InvocationReply, InvokeError> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(Pending { envelope, reply })
            .await
            .map_err(|_| InvokeError::Closed)?;
        response.await.map_err(|_| InvokeError::Dropped)
    }
}

/// Consumer half: the [`EventSource`] handed to the event loop.
pub struct ChannelSource {
    rx: mpsc::Receiver<Pending>,
    in_flight: Option<(String, oneshot::Sender<InvocationReply>)>,
}

/// Create a bounded invocation channel.
pub fn channel(capacity: usize) -> (InvocationSender, ChannelSource) {
    let (tx, rx) = mpsc::channel(capacity);
    (
        InvocationSender { tx },
        ChannelSource {
            rx,
            in_flight: None,
        },
    )
}

impl ChannelSource {
    fn reply(&mut self, request_id: &str, reply: InvocationReply) -> Result<(), TransportError> {
        match self.in_flight.take() {
            Some((id, sender)) if id == request_id => {
                if sender.send(reply).is_err() {
                    tracing::debug!(request_id, "Caller went away before the reply was written");
                }
                Ok(())
            }
            other => {
                self.in_flight = other;
                Err(TransportError::UnknownRequest(request_id.to_string()))
            }
        }
    }
}

impl EventSource for ChannelSource {
    async fn next_invocation(&mut self) -> Result<Option<InvocationEnvelope>, TransportError> {
        match self.rx.recv().await {
            Some(Pending { envelope, reply }) => {
                self.in_flight = Some((envelope.request_id().to_string(), reply));
                Ok(Some(envelope))
            }
            None => Ok(None),
        }
    }

    async fn send_response(
        &mut self,
        request_id: &str,
        response: GatewayResponse,
    ) -> Result<(), TransportError> {
        self.reply(request_id, Ok(response))
    }

    async fn send_error(
        &mut self,
        request_id: &str,
        error: &InvocationError,
    ) -> Result<(), TransportError> {
        self.reply(request_id, Err(ErrorReply::from(error)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::event::{GatewayRequest, InvocationMetadata};

    fn envelope(id: &str) -> InvocationEnvelope {
        InvocationEnvelope::new(InvocationMetadata::new(id), GatewayRequest::default())
    }

    #[tokio::test]
    async fn test_round_trip_through_source() {
        let (sender, mut source) = channel(4);

        let caller = tokio::spawn(async move { sender.invoke(envelope("req1")).await });

        let received = source.next_invocation().await.unwrap().unwrap();
        assert_eq!(received.request_id(), "req1");
        source
            .send_response("req1", GatewayResponse::new(200, "ok"))
            .await
            .unwrap();

        let reply = caller.await.unwrap().unwrap().unwrap();
        assert_eq!(reply.body.as_deref(), Some("ok"));
    }

    #[tokio::test]
    async fn test_error_reply() {
        let (sender, mut source) = channel(4);
        let caller = tokio::spawn(async move { sender.invoke(envelope("req1")).await });

        source.next_invocation().await.unwrap().unwrap();
        source
            .send_error("req1", &InvocationError::HandlerNotReady)
            .await
            .unwrap();

        let reply = caller.await.unwrap().unwrap().unwrap_err();
        assert_eq!(reply.error_type, "HandlerNotReady");
    }

    #[tokio::test]
    async fn test_unknown_request() {
        let (_sender, mut source) = channel(1);
        let err = source
            .send_response("nope", GatewayResponse::new(200, ""))
            .await
            .unwrap_err();
        assert_eq!(err, TransportError::UnknownRequest("nope".to_string()));
    }

    #[tokio::test]
    async fn test_exhausted_when_senders_dropped() {
        let (sender, mut source) = channel(1);
        drop(sender);
        assert!(source.next_invocation().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invoke_after_source_dropped() {
        let (sender, source) = channel(1);
        drop(source);
        assert_eq!(sender.invoke(envelope("req1")).await.unwrap_err(), InvokeError::Closed);
    }

    #[tokio::test]
    async fn test_dropped_without_reply() {
        let (sender, mut source) = channel(1);
        let caller = tokio::spawn(async move { sender.invoke(envelope("req1")).await });
        source.next_invocation().await.unwrap().unwrap();
        drop(source);
        assert_eq!(caller.await.unwrap().unwrap_err(), InvokeError::Dropped);
    }
}
