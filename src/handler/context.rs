//! Lifecycle-scoped handler context.

use std::sync::Arc;

use crate::resource::{ResourceResult, SharedResource};

/// Immutable context shared by every invocation of a handler.
///
/// Valid exactly as long as the shared resource is running.
#[derive(Debug, Clone)]
pub struct HandlerContext {
    resource: SharedResource,
    handler_name: Option<String>,
}

impl HandlerContext {
    /// Bind a context to the shared resource. No I/O.
    pub fn bind(resource: SharedResource, handler_name: Option<String>) -> Self {
        Self {
            resource,
            handler_name,
        }
    }

    /// Borrow the shared HTTP client.
    pub fn http_client(&self) -> ResourceResult<Arc<reqwest::Client>> {
        self.resource.client()
    }

    /// Logical handler name (`_HANDLER`), if configured.
    pub fn handler_name(&self) -> Option<&str> {
        self.handler_name.as_deref()
    }

    pub fn resource(&self) -> &SharedResource {
        &self.resource
    }
}
