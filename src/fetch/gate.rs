//! Concurrency gate for downloads.
//!
//! Bounds the number of in-flight fetches and spaces successive admissions
//! with a cool-down: a permit is held for the whole fetch and only returns to
//! the pool half a second after the fetch finishes, so bursts of short
//! requests cannot hammer the platform.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio::time::sleep;

/// Gate errors.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The gate's semaphore was closed
    #[error("failed to acquire download permit: {0}")]
    Acquire(String),
}

/// Admission gate shared by all download tasks.
#[derive(Clone)]
pub struct ConcurrencyGate {
    semaphore: Arc<Semaphore>,
    cool_down: Duration,
}

impl ConcurrencyGate {
    /// Create a gate admitting at most `permits` concurrent fetches, with
    /// `cool_down` held on each permit after its fetch completes.
    pub fn new(permits: usize, cool_down: Duration) -> Self {
        Self {
            semaphore: Arc::new(Semaphore::new(permits)),
            cool_down,
        }
    }

    /// Gate with the standard engine tuning.
    pub fn standard() -> Self {
        Self::new(crate::config::GATE_PERMITS, crate::config::GATE_COOL_DOWN)
    }

    /// Wait for admission. The returned guard must be held for the duration
    /// of the fetch; dropping it starts the cool-down, after which the slot
    /// becomes available again.
    pub async fn admit(&self) -> Result<GatePermit, GateError> {
        let permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| GateError::Acquire(e.to_string()))?;
        Ok(GatePermit {
            permit: Some(permit),
            cool_down: self.cool_down,
        })
    }

    /// Permits currently available, for introspection in logs.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }
}

/// Guard over one admitted fetch slot.
///
/// On drop the underlying permit is parked on a spawned timer for the
/// cool-down window before it returns to the pool.
pub struct GatePermit {
    permit: Option<OwnedSemaphorePermit>,
    cool_down: Duration,
}

impl Drop for GatePermit {
    fn drop(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        if self.cool_down.is_zero() {
            return;
        }
        // Outside a runtime (process teardown) the permit just drops; the
        // cool-down only matters while downloads are still running
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            let cool_down = self.cool_down;
            handle.spawn(async move {
                sleep(cool_down).await;
                drop(permit);
            });
        }
    }
}
