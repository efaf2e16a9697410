//! Allocator backend that counts what it hands out.
//!
//! Used to prove that init/fini leave nothing outstanding, including when an
//! allocation in the middle of init is made to fail.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use corelib::{AllocError, Allocator, AllocatorBackend, BlockId};
use parking_lot::Mutex;

#[derive(Debug, Default)]
pub struct CountingAllocator {
    next: AtomicU64,
    attempts: AtomicUsize,
    /// Attempt number that will be refused; 0 means none.
    fail_on: AtomicUsize,
    live: Mutex<HashMap<BlockId, usize>>,
}

impl CountingAllocator {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// An [`Allocator`] backed by this counter.
    pub fn allocator(self: &Arc<Self>) -> Allocator {
        Allocator::new(Arc::clone(self) as Arc<dyn AllocatorBackend>)
    }

    /// Refuse the `n`-th allocation attempt from now (1-based). Allocate and
    /// reallocate both count as attempts.
    pub fn fail_at(&self, n: usize) {
        let target = self.attempts.load(Ordering::SeqCst) + n;
        self.fail_on.store(target, Ordering::SeqCst);
    }

    /// Blocks handed out and not yet released.
    pub fn outstanding(&self) -> usize {
        self.live.lock().len()
    }

    pub fn outstanding_bytes(&self) -> usize {
        self.live.lock().values().sum()
    }

    /// Allocation attempts so far, refused ones included.
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn admit(&self, size: usize) -> Result<(), AllocError> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst) + 1;
        if self
            .fail_on
            .compare_exchange(attempt, 0, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            tracing::debug!(attempt, size, "allocation refused");
            return Err(AllocError { requested: size });
        }
        Ok(())
    }
}

impl AllocatorBackend for CountingAllocator {
    fn allocate(&self, size: usize) -> Result<BlockId, AllocError> {
        self.admit(size)?;
        let id = BlockId(self.next.fetch_add(1, Ordering::SeqCst));
        self.live.lock().insert(id, size);
        Ok(id)
    }

    fn deallocate(&self, block: BlockId) {
        self.live.lock().remove(&block);
    }

    fn reallocate(&self, block: BlockId, size: usize) -> Result<BlockId, AllocError> {
        self.admit(size)?;
        self.live.lock().insert(block, size);
        Ok(block)
    }

    fn name(&self) -> &'static str {
        "CountingAllocator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counts_outstanding_blocks() {
        let counter = CountingAllocator::new();
        let allocator = counter.allocator();

        let a = allocator.allocate(8).unwrap();
        let mut b = allocator.allocate(16).unwrap();
        assert_eq!(counter.outstanding(), 2);
        assert_eq!(counter.outstanding_bytes(), 24);

        b.reallocate(32).unwrap();
        assert_eq!(counter.outstanding_bytes(), 40);
        assert_eq!(counter.attempts(), 3);

        drop(a);
        drop(b);
        assert_eq!(counter.outstanding(), 0);
    }

    #[test]
    fn test_fail_at_is_one_shot() {
        let counter = CountingAllocator::new();
        let allocator = counter.allocator();
        counter.fail_at(2);

        let first = allocator.allocate(1).unwrap();
        assert_eq!(allocator.allocate(2).unwrap_err(), AllocError { requested: 2 });
        let third = allocator.allocate(3).unwrap();

        assert_eq!(counter.attempts(), 3);
        assert_eq!(counter.outstanding(), 2);
        drop((first, third));
        assert_eq!(counter.outstanding(), 0);
    }
}
