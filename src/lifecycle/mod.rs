//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Create HTTP client → Bind handler context → Start services
//!
//! Services (services.rs, orchestrator.rs):
//!     event loop + HTTP client owner (+ local invoke server) under one Shutdown
//!
//! Shutdown (coordinator.rs):
//!     Signal received → Cancel event loop → Await in-flight invocation → Release client
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Shutdown::trigger (repeats absorbed)
//! ```
//!
//! # Design Decisions
//! - Ordered shutdown: the loop stops before the client is released
//! - Release happens exactly once no matter how many paths ask for it
//! - Transitions are recorded in a [`LifecycleJournal`]

pub mod coordinator;
pub mod journal;
pub mod orchestrator;
pub mod services;
pub mod shutdown;
pub mod signals;
pub mod startup;

pub use coordinator::{
    CoordinatorError, CoordinatorReport, CoordinatorState, LoopError, ShutdownCoordinator,
    ShutdownTrigger,
};
pub use journal::{LifecycleEvent, LifecycleJournal};
pub use orchestrator::{OrchestratorError, Service, ServiceError, ServiceOrchestrator};
pub use services::{EventLoopService, LocalInvokeService, ResourceService};
pub use shutdown::Shutdown;
pub use startup::{FunctionHost, HostError};
