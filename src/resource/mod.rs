//! Shared resource subsystem.
//!
//! # Data Flow
//! ```text
//! ResourceLifecycle::create()
//!     → reqwest::Client (connect/read timeouts)
//!     → SharedResource handles (read-only) to handler contexts
//!
//! Teardown:
//!     release_graceful() ─┐
//!                         ├─ CAS latch → exactly one physical close
//!     release_forced()  ──┘
//! ```

pub mod lifecycle;
pub mod state;

pub use lifecycle::{ResourceLifecycle, SharedResource};
pub use state::{ClientSettings, ResourceError, ResourceResult, ResourceState};
