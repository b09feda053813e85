//! Handler subsystem.
//!
//! # Data Flow
//! ```text
//! SharedResource ──bind──▶ HandlerContext (immutable)
//!                               │
//! InvocationEnvelope ──▶ HandlerAdapter::dispatch ──▶ Handler::handle ──▶ GatewayResponse
//! ```
//!
//! # Design Decisions
//! - One context per adapter, installed once
//! - Dispatch refuses to run when unbound or when the resource is not running
//! - Handler errors pass through unchanged

pub mod adapter;
pub mod context;
pub mod types;

pub use adapter::{handler_fn, AlreadyBound, Handler, HandlerAdapter, HandlerFn};
pub use context::HandlerContext;
pub use types::{HandlerError, InvocationError};
