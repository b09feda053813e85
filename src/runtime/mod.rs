//! Invocation runtime.
//!
//! # Data Flow
//! ```text
//! EventSource (api.rs: Runtime API | channel.rs: in-process, fed by local.rs)
//!     → next_invocation → InvocationEnvelope
//!     → runner.rs: HandlerAdapter::dispatch
//!     → send_response / send_error
//! ```
//!
//! # Design Decisions
//! - Sources are swappable behind one trait
//! - Payloads are API Gateway v2 shaped (event.rs)

pub mod api;
pub mod channel;
pub mod event;
pub mod local;
pub mod runner;
pub mod source;

pub use api::RuntimeApiSource;
pub use channel::{channel, ChannelSource, InvocationReply, InvocationSender, InvokeError};
pub use event::{
    ErrorBody, GatewayRequest, GatewayResponse, InvocationEnvelope, InvocationMetadata,
};
pub use runner::{EventLoopRunner, LoopExit, LoopReport, LoopState};
pub use source::{ErrorReply, EventSource, TransportError};
