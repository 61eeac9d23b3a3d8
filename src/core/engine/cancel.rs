//! Cooperative cancellation and the scan memory budget.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Cooperative cancellation token threaded through long-running
/// operations. Workers observe it between items, never mid-kernel.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Bounds the bytes of image files in flight during a scan. The
/// producer blocks while the budget is exhausted; a single file larger
/// than the whole budget is admitted alone rather than deadlocking.
pub struct MemoryBudget {
    limit: u64,
    used: Mutex<u64>,
    released: Condvar,
}

impl MemoryBudget {
    pub fn new(limit: u64) -> Self {
        Self {
            limit: limit.max(1),
            used: Mutex::new(0),
            released: Condvar::new(),
        }
    }

    /// Block until `bytes` fit under the cap, then reserve them
    pub fn acquire(&self, bytes: u64) {
        let mut used = match self.used.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while *used > 0 && *used + bytes > self.limit {
            used = match self.released.wait(used) {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
        }
        *used += bytes;
    }

    /// Return reserved bytes and wake the producer
    pub fn release(&self, bytes: u64) {
        let mut used = match self.used.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *used = used.saturating_sub(bytes);
        self.released.notify_all();
    }
}
