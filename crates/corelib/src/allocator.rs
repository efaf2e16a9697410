//! Allocator capability injected into every node.
//!
//! Memory itself comes from the Rust global allocator; an [`Allocator`] is the
//! accounting and admission capability that decides whether a node may take
//! another block and tracks what it holds. Every internal allocation a node
//! makes is represented by a [`Block`] lease, which is returned to its
//! allocator when dropped, so an allocation can never outlive its owner.

use std::fmt;
use std::sync::{Arc, OnceLock};
use std::sync::atomic::{AtomicU64, Ordering};

/// Opaque identifier for a block handed out by an [`AllocatorBackend`].
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
pub struct BlockId(pub u64);

impl fmt::Display for BlockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "block#{}", self.0)
    }
}

/// An allocation request was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("allocation of {requested} bytes refused")]
pub struct AllocError {
    pub requested: usize,
}

/// Allocate / deallocate / reallocate primitives.
///
/// Implementations must be reentrant: one backend is shared by every node
/// (and every thread) it is injected into.
pub trait AllocatorBackend: Send + Sync + 'static {
    /// Reserve a block of `size` bytes.
    fn allocate(&self, size: usize) -> Result<BlockId, AllocError>;

    /// Release a block. Releasing an unknown block is a no-op.
    fn deallocate(&self, block: BlockId);

    /// Resize a block. On failure the original block stays valid.
    fn reallocate(&self, block: BlockId, size: usize) -> Result<BlockId, AllocError>;

    /// Backend name (for logging/debugging).
    fn name(&self) -> &'static str;
}

/// Process-default backend. Never refuses an allocation.
#[derive(Debug, Default)]
pub struct SystemAllocator {
    next: AtomicU64,
}

impl AllocatorBackend for SystemAllocator {
    fn allocate(&self, _size: usize) -> Result<BlockId, AllocError> {
        Ok(BlockId(self.next.fetch_add(1, Ordering::Relaxed)))
    }

    fn deallocate(&self, _block: BlockId) {}

    fn reallocate(&self, block: BlockId, _size: usize) -> Result<BlockId, AllocError> {
        Ok(block)
    }

    fn name(&self) -> &'static str {
        "SystemAllocator"
    }
}

/// Cloneable handle to a shared [`AllocatorBackend`].
///
/// Two allocators compare equal when they refer to the same backend.
#[derive(Clone)]
pub struct Allocator {
    backend: Arc<dyn AllocatorBackend>,
}

impl Allocator {
    /// Wrap a backend.
    pub fn new(backend: Arc<dyn AllocatorBackend>) -> Self {
        Self { backend }
    }

    /// The process-default allocator. Every call returns the same backend.
    pub fn system() -> Self {
        static SYSTEM: OnceLock<Allocator> = OnceLock::new();
        SYSTEM
            .get_or_init(|| Allocator::new(Arc::new(SystemAllocator::default())))
            .clone()
    }

    /// Take a block of `size` bytes from this allocator.
    pub fn allocate(&self, size: usize) -> Result<Block, AllocError> {
        let id = self.backend.allocate(size)?;
        tracing::trace!(allocator = self.backend.name(), %id, size, "allocated");
        Ok(Block {
            allocator: self.clone(),
            id,
            size,
        })
    }

    /// Backend name.
    pub fn name(&self) -> &'static str {
        self.backend.name()
    }
}

impl Default for Allocator {
    fn default() -> Self {
        Self::system()
    }
}

impl PartialEq for Allocator {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.backend, &other.backend)
    }
}

impl Eq for Allocator {}

impl fmt::Debug for Allocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Allocator").field(&self.backend.name()).finish()
    }
}

/// A lease on one block. Returned to its allocator on drop.
pub struct Block {
    allocator: Allocator,
    id: BlockId,
    size: usize,
}

impl Block {
    pub fn id(&self) -> BlockId {
        self.id
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Resize the block in place. On failure the block keeps its old size.
    pub fn reallocate(&mut self, size: usize) -> Result<(), AllocError> {
        self.id = self.allocator.backend.reallocate(self.id, size)?;
        tracing::trace!(allocator = self.allocator.name(), id = %self.id, size, "reallocated");
        self.size = size;
        Ok(())
    }
}

impl Drop for Block {
    fn drop(&mut self) {
        self.allocator.backend.deallocate(self.id);
        tracing::trace!(allocator = self.allocator.name(), id = %self.id, "deallocated");
    }
}

impl fmt::Debug for Block {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Block")
            .field("id", &self.id)
            .field("size", &self.size)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    /// Records every call; refuses anything above `limit` bytes.
    #[derive(Default)]
    struct Recording {
        limit: usize,
        next: AtomicU64,
        live: Mutex<Vec<BlockId>>,
    }

    impl AllocatorBackend for Recording {
        fn allocate(&self, size: usize) -> Result<BlockId, AllocError> {
            if size > self.limit {
                return Err(AllocError { requested: size });
            }
            let id = BlockId(self.next.fetch_add(1, Ordering::Relaxed));
            self.live.lock().unwrap().push(id);
            Ok(id)
        }

        fn deallocate(&self, block: BlockId) {
            self.live.lock().unwrap().retain(|b| *b != block);
        }

        fn reallocate(&self, block: BlockId, size: usize) -> Result<BlockId, AllocError> {
            if size > self.limit {
                return Err(AllocError { requested: size });
            }
            Ok(block)
        }

        fn name(&self) -> &'static str {
            "Recording"
        }
    }

    #[test]
    fn test_system_allocator_is_shared() {
        assert_eq!(Allocator::system(), Allocator::system());
        assert_eq!(Allocator::default(), Allocator::system());
        assert_eq!(Allocator::system().name(), "SystemAllocator");
    }

    #[test]
    fn test_distinct_backends_are_not_equal() {
        let a = Allocator::new(Arc::new(SystemAllocator::default()));
        let b = Allocator::new(Arc::new(SystemAllocator::default()));
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_block_released_on_drop() {
        let backend = Arc::new(Recording {
            limit: 64,
            ..Default::default()
        });
        let allocator = Allocator::new(backend.clone());

        let block = allocator.allocate(16).unwrap();
        assert_eq!(block.size(), 16);
        assert_eq!(backend.live.lock().unwrap().len(), 1);

        drop(block);
        assert!(backend.live.lock().unwrap().is_empty());
    }

    #[test]
    fn test_failed_reallocate_keeps_block() {
        let backend = Arc::new(Recording {
            limit: 32,
            ..Default::default()
        });
        let allocator = Allocator::new(backend.clone());

        let mut block = allocator.allocate(8).unwrap();
        assert_eq!(block.reallocate(128), Err(AllocError { requested: 128 }));
        assert_eq!(block.size(), 8);

        block.reallocate(32).unwrap();
        assert_eq!(block.size(), 32);
    }

    #[test]
    fn test_refused_allocation() {
        let allocator = Allocator::new(Arc::new(Recording::default()));
        let err = allocator.allocate(1).unwrap_err();
        assert_eq!(err.requested, 1);
    }
}
