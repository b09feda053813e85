//! Function host library.
//!
//! Hosts a single request handler behind an invocation event loop and keeps
//! one shared outbound HTTP client alive for exactly as long as the host runs.

pub mod config;
pub mod handler;
pub mod lifecycle;
pub mod observability;
pub mod resource;
pub mod runtime;

#[cfg(test)]
mod test_support;

pub use config::HostConfig;
pub use handler::{handler_fn, Handler, HandlerContext, HandlerError};
pub use lifecycle::{FunctionHost, HostError, Shutdown};
pub use resource::{ResourceLifecycle, SharedResource};
pub use runtime::{GatewayRequest, GatewayResponse, InvocationMetadata};
