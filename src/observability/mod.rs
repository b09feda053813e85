//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Event loop, coordinator, resource lifecycle
//!     → logging.rs (tracing events, one span per invocation)
//!     → metrics.rs (invocation, release and shutdown counters)
//!
//! Consumers:
//!     → stdout (pretty or JSON lines)
//!     → Prometheus scrape endpoint (optional)
//! ```
//!
//! # Design Decisions
//! - Every invocation span carries the request id and trace id
//! - Recording metrics without an installed exporter is a no-op

pub mod logging;
pub mod metrics;
