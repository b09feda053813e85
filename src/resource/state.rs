//! Resource state machine and error definitions.

use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::ClientConfig;

/// Lifecycle state of the shared resource.
///
/// ```text
/// Uninitialized → Running → ShuttingDown → Closed
/// Uninitialized → Closed   (released before it was ever created)
/// ```
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceState {
    Uninitialized = 0,
    Running = 1,
    ShuttingDown = 2,
    Closed = 3,
}

impl From<u8> for ResourceState {
    fn from(val: u8) -> Self {
        match val {
            1 => ResourceState::Running,
            2 => ResourceState::ShuttingDown,
            3 => ResourceState::Closed,
            _ => ResourceState::Uninitialized,
        }
    }
}

impl fmt::Display for ResourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResourceState::Uninitialized => "uninitialized",
            ResourceState::Running => "running",
            ResourceState::ShuttingDown => "shutting down",
            ResourceState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Errors raised by the shared resource lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResourceError {
    /// `create` was called on a resource that already exists.
    #[error("shared resource was already created")]
    AlreadyCreated,

    /// A release (or create) hit a resource that is already released.
    #[error("shared resource is already closed")]
    AlreadyClosed,

    /// The resource is not in the `Running` state.
    #[error("shared resource is unavailable ({0})")]
    Unavailable(ResourceState),

    /// The HTTP client could not be constructed.
    #[error("failed to build HTTP client: {0}")]
    Build(String),

    /// Borrowed client handles were still outstanding when the drain deadline passed.
    #[error("drain timed out after {timeout:?} with {outstanding} client handle(s) outstanding")]
    DrainTimeout { timeout: Duration, outstanding: usize },
}

impl ResourceError {
    /// Redundant-release classification; callers doing cleanup treat this as non-fatal.
    pub fn is_already_closed(&self) -> bool {
        matches!(self, ResourceError::AlreadyClosed)
    }
}

/// Result type for resource operations.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// Settings the shared HTTP client is built with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClientSettings {
    pub connect_timeout: Duration,
    pub read_timeout: Duration,
    pub drain_timeout: Duration,
}

impl ClientSettings {
    /// Same connect and read timeout, as the hosted functions usually configure it.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            connect_timeout: timeout,
            read_timeout: timeout,
            drain_timeout: Duration::from_secs(5),
        }
    }
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self::from(&ClientConfig::default())
    }
}

impl From<&ClientConfig> for ClientSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(config.connect_timeout_secs),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
            drain_timeout: Duration::from_millis(config.drain_timeout_ms),
        }
    }
}
