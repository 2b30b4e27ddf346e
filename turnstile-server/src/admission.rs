//! Admission gate bounding concurrent write-path work

use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Counting-semaphore gate over the write path.
///
/// Holds a fixed pool of permits; `try_admit` never blocks and never queues.
/// A request that cannot take a permit is rejected on the spot.
#[derive(Debug, Clone)]
pub struct AdmissionGate {
    permits: Arc<Semaphore>,
    capacity: usize,
}

/// Capacity held by one admitted request.
///
/// Releases its slot exactly once when dropped, whichever way the handler
/// exits.
#[derive(Debug)]
pub struct AdmissionPermit {
    _permit: OwnedSemaphorePermit,
}

impl AdmissionGate {
    pub fn new(capacity: usize) -> Self {
        Self {
            permits: Arc::new(Semaphore::new(capacity)),
            capacity,
        }
    }

    /// Attempt to admit one request. `None` means the gate is full.
    pub fn try_admit(&self) -> Option<AdmissionPermit> {
        Arc::clone(&self.permits)
            .try_acquire_owned()
            .ok()
            .map(|permit| AdmissionPermit { _permit: permit })
    }

    /// Configured capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Permits currently free
    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}
