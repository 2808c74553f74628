//! Outstanding-work registrations used for drain detection.

use crate::zone::Zone;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::trace;

/// One unit of outstanding asynchronous work owned by a zone.
///
/// Registering increments the zone's pending count. The count is decremented
/// exactly once, by whichever of [`PendingTask::complete`] or `Drop` runs
/// first, so a callback that fires and is later cancelled cannot skew it.
pub struct PendingTask {
    zone: Arc<Zone>,
    settled: AtomicBool,
}

impl PendingTask {
    pub fn register(zone: &Arc<Zone>) -> Self {
        let count = zone.increment_pending();
        trace!(zone = %zone.id(), pending = count, "pending task registered");
        Self {
            zone: Arc::clone(zone),
            settled: AtomicBool::new(false),
        }
    }

    /// Mark the work finished. Returns `false` if it was already settled.
    pub fn complete(&self) -> bool {
        if self.settled.swap(true, Ordering::AcqRel) {
            return false;
        }
        let count = self.zone.decrement_pending();
        trace!(zone = %self.zone.id(), pending = count, "pending task settled");
        true
    }

    pub fn is_settled(&self) -> bool {
        self.settled.load(Ordering::Acquire)
    }

    pub fn zone(&self) -> &Arc<Zone> {
        &self.zone
    }
}

impl Drop for PendingTask {
    fn drop(&mut self) {
        self.complete();
    }
}

impl fmt::Debug for PendingTask {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PendingTask")
            .field("zone", &self.zone.id())
            .field("settled", &self.is_settled())
            .finish()
    }
}
