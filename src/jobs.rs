//! Bounds the number of concurrently executing external commands.
//!
//! Only command execution takes a slot; hashing, cache lookups, and other
//! filesystem work run unbounded.  Slots are granted in FIFO submission
//! order.

use tokio::sync::{Semaphore, SemaphorePermit};

/// One more than the CPU count, so a command blocked on I/O doesn't idle a
/// core.
pub fn default_jobs() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
        + 1
}

pub struct JobPool {
    slots: Semaphore,
    count: usize,
}

impl JobPool {
    pub fn new(count: usize) -> Self {
        JobPool {
            slots: Semaphore::new(count),
            count,
        }
    }

    pub fn count(&self) -> usize {
        self.count
    }

    /// Waits for a free slot.  Yields to the scheduler before acquiring so
    /// that a burst of submissions within one turn enqueues before any of
    /// them begins running.
    pub async fn slot(&self) -> SemaphorePermit<'_> {
        tokio::task::yield_now().await;
        // The semaphore is never closed.
        self.slots.acquire().await.unwrap()
    }
}
