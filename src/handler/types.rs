//! Handler and invocation error definitions.

use thiserror::Error;

use crate::resource::{ResourceError, ResourceState};

/// Business-logic failure raised by a handler for one invocation.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The request was malformed or missing required input.
    #[error("invalidRequest")]
    InvalidRequest,

    /// An outbound call through the shared client failed.
    #[error("upstream request failed: {0}")]
    Upstream(#[from] reqwest::Error),

    /// The shared client could not be borrowed.
    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    pub fn other(message: impl Into<String>) -> Self {
        HandlerError::Other(message.into())
    }
}

/// Invocation-scoped failure; reported as that invocation's error, never loop-fatal.
#[derive(Debug, Error)]
pub enum InvocationError {
    /// No handler context has been bound yet.
    #[error("handler is not ready: no context bound")]
    HandlerNotReady,

    /// The context is bound but the shared resource is not running.
    #[error("handler is not ready: shared resource is {0}")]
    ResourceUnavailable(ResourceState),

    /// The handler itself failed; passed through unchanged.
    #[error(transparent)]
    Handler(#[from] HandlerError),
}

impl InvocationError {
    /// True for the two lifecycle-related rejections.
    pub fn is_not_ready(&self) -> bool {
        matches!(
            self,
            InvocationError::HandlerNotReady | InvocationError::ResourceUnavailable(_)
        )
    }

    /// Short machine-readable classification, used as the Runtime API `errorType`.
    pub fn error_type(&self) -> &'static str {
        match self {
            InvocationError::HandlerNotReady => "HandlerNotReady",
            InvocationError::ResourceUnavailable(_) => "ResourceUnavailable",
            InvocationError::Handler(_) => "HandlerError",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification() {
        assert!(InvocationError::HandlerNotReady.is_not_ready());
        assert!(InvocationError::ResourceUnavailable(ResourceState::Closed).is_not_ready());

        let err = InvocationError::from(HandlerError::InvalidRequest);
        assert!(!err.is_not_ready());
        assert_eq!(err.error_type(), "HandlerError");
        assert_eq!(err.to_string(), "invalidRequest");
    }
}
