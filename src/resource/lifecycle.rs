//! Shared outbound HTTP client and its lifecycle.
//!
//! # Responsibilities
//! - Build the pooled `reqwest::Client` once, with the configured timeouts
//! - Hand out read-only client handles while the resource is running
//! - Close the client exactly once, on the graceful or the forced path
//!
//! # Design Decisions
//! - State lives in an `AtomicU8`; every transition is a compare-and-swap
//! - Whoever wins `Running → ShuttingDown` owns the physical close, the loser
//!   gets `AlreadyClosed`
//! - Graceful release drains borrowed handles (bounded), forced release does not wait

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tokio::time::Instant;

use crate::observability::metrics;
use crate::resource::state::{ClientSettings, ResourceError, ResourceResult, ResourceState};

const DRAIN_POLL_INTERVAL: Duration = Duration::from_millis(10);

struct Inner {
    settings: ClientSettings,
    state: AtomicU8,
    client: Mutex<Option<Arc<reqwest::Client>>>,
    closes: AtomicUsize,
}

/// Cheap-to-clone, read-only handle to the shared HTTP client.
///
/// Only [`ResourceLifecycle`] can change its state.
#[derive(Clone)]
pub struct SharedResource {
    inner: Arc<Inner>,
}

impl SharedResource {
    fn new(settings: ClientSettings) -> Self {
        Self {
            inner: Arc::new(Inner {
                settings,
                state: AtomicU8::new(ResourceState::Uninitialized as u8),
                client: Mutex::new(None),
                closes: AtomicUsize::new(0),
            }),
        }
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResourceState {
        ResourceState::from(self.inner.state.load(Ordering::Acquire))
    }

    /// Settings the client was (or will be) built with.
    pub fn settings(&self) -> &ClientSettings {
        &self.inner.settings
    }

    /// Borrow the HTTP client.
    ///
    /// Fails with [`ResourceError::Unavailable`] unless the resource is running.
    /// Holding the returned handle delays a graceful release until it is dropped.
    pub fn client(&self) -> ResourceResult<Arc<reqwest::Client>> {
        // State is read under the slot lock, so a release that has taken the
        // latch either sees this handle as outstanding or this call sees the latch.
        let slot = self.slot();
        let state = self.state();
        if state != ResourceState::Running {
            return Err(ResourceError::Unavailable(state));
        }
        slot.as_ref().cloned().ok_or(ResourceError::Unavailable(state))
    }

    /// Number of times the underlying client was physically closed (0 or 1).
    pub fn close_count(&self) -> usize {
        self.inner.closes.load(Ordering::Acquire)
    }

    fn slot(&self) -> MutexGuard<'_, Option<Arc<reqwest::Client>>> {
        self.inner
            .client
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn transition(&self, from: ResourceState, to: ResourceState) -> Result<(), ResourceState> {
        self.inner
            .state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .map(|_| ())
            .map_err(ResourceState::from)
    }

    fn outstanding(&self) -> usize {
        self.slot()
            .as_ref()
            .map_or(0, |client| Arc::strong_count(client).saturating_sub(1))
    }

    fn close_now(&self) {
        let client = self.slot().take();
        self.inner.closes.fetch_add(1, Ordering::AcqRel);
        self.inner
            .state
            .store(ResourceState::Closed as u8, Ordering::Release);
        drop(client);
    }
}

impl std::fmt::Debug for SharedResource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SharedResource")
            .field("state", &self.state())
            .field("settings", &self.inner.settings)
            .finish()
    }
}

/// Closes the resource if a graceful release is dropped mid-drain.
struct CloseGuard<'a> {
    resource: &'a SharedResource,
    armed: bool,
}

impl CloseGuard<'_> {
    fn close(mut self) {
        self.armed = false;
        self.resource.close_now();
    }
}

impl Drop for CloseGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            tracing::warn!("Graceful release cancelled mid-drain, closing HTTP client");
            self.resource.close_now();
        }
    }
}

/// Sole owner of the shared HTTP client.
pub struct ResourceLifecycle {
    resource: SharedResource,
}

impl ResourceLifecycle {
    /// Create an uninitialized lifecycle. No client is built yet.
    pub fn new(settings: ClientSettings) -> Self {
        Self {
            resource: SharedResource::new(settings),
        }
    }

    /// A read-only handle to the managed resource, valid in any state.
    pub fn resource(&self) -> SharedResource {
        self.resource.clone()
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ResourceState {
        self.resource.state()
    }

    /// Build the HTTP client and move to `Running`. Allowed once.
    pub fn create(&self) -> ResourceResult<SharedResource> {
        match self.resource.state() {
            ResourceState::Uninitialized => {}
            ResourceState::Closed => return Err(ResourceError::AlreadyClosed),
            _ => return Err(ResourceError::AlreadyCreated),
        }

        let settings = *self.resource.settings();
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .read_timeout(settings.read_timeout)
            .build()
            .map_err(|e| ResourceError::Build(e.to_string()))?;

        let mut slot = self.resource.slot();
        self.resource
            .transition(ResourceState::Uninitialized, ResourceState::Running)
            .map_err(|actual| match actual {
                ResourceState::Closed => ResourceError::AlreadyClosed,
                _ => ResourceError::AlreadyCreated,
            })?;
        *slot = Some(Arc::new(client));
        drop(slot);

        tracing::info!(
            connect_timeout = ?settings.connect_timeout,
            read_timeout = ?settings.read_timeout,
            "HTTP client created"
        );
        Ok(self.resource.clone())
    }

    /// Orderly release: drain borrowed handles (bounded by the drain timeout), then close.
    ///
    /// A second call reports [`ResourceError::AlreadyClosed`]. If the drain deadline
    /// passes the client is closed anyway and [`ResourceError::DrainTimeout`] is returned.
    pub async fn release_graceful(&self) -> ResourceResult<()> {
        let result = self.graceful_inner().await;
        metrics::record_resource_release("graceful", &result);
        result
    }

    async fn graceful_inner(&self) -> ResourceResult<()> {
        if !self.begin_release()? {
            tracing::info!("HTTP client released before creation");
            return Ok(());
        }

        tracing::info!("Stopping HTTP client...");
        let guard = CloseGuard {
            resource: &self.resource,
            armed: true,
        };

        let drain_timeout = self.resource.settings().drain_timeout;
        let deadline = Instant::now() + drain_timeout;
        let mut drain_error = None;
        loop {
            let outstanding = self.resource.outstanding();
            if outstanding == 0 {
                break;
            }
            if Instant::now() >= deadline {
                drain_error = Some(ResourceError::DrainTimeout {
                    timeout: drain_timeout,
                    outstanding,
                });
                break;
            }
            tokio::time::sleep(DRAIN_POLL_INTERVAL).await;
        }

        guard.close();
        match drain_error {
            None => {
                tracing::info!("HTTP client shutdown completed");
                Ok(())
            }
            Some(e) => {
                tracing::warn!(error = %e, "HTTP client closed with outstanding handles");
                Err(e)
            }
        }
    }

    /// Immediate, best-effort close for error and termination paths.
    ///
    /// Safe to race with [`release_graceful`](Self::release_graceful): only one of
    /// them performs the physical close.
    pub fn release_forced(&self) -> ResourceResult<()> {
        let result = self.forced_inner();
        metrics::record_resource_release("forced", &result);
        result
    }

    fn forced_inner(&self) -> ResourceResult<()> {
        if !self.begin_release()? {
            return Ok(());
        }
        let outstanding = self.resource.outstanding();
        self.resource.close_now();
        tracing::info!(outstanding, "HTTP client force-closed");
        Ok(())
    }

    /// Take the release latch. `Ok(true)` means the caller must close a live client,
    /// `Ok(false)` means there was never a client to close.
    fn begin_release(&self) -> ResourceResult<bool> {
        loop {
            match self
                .resource
                .transition(ResourceState::Running, ResourceState::ShuttingDown)
            {
                Ok(()) => return Ok(true),
                Err(ResourceState::Uninitialized) => {
                    if self
                        .resource
                        .transition(ResourceState::Uninitialized, ResourceState::Closed)
                        .is_ok()
                    {
                        return Ok(false);
                    }
                }
                Err(_) => return Err(ResourceError::AlreadyClosed),
            }
        }
    }
}

impl Drop for ResourceLifecycle {
    fn drop(&mut self) {
        match self.forced_inner() {
            Ok(()) => {}
            Err(e) if e.is_already_closed() => {}
            Err(e) => tracing::warn!(error = %e, "HTTP client release on drop failed"),
        }
    }
}
