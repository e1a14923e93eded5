//! The allocator capability set

use crate::allocation::Allocation;
use crate::error::Result;

/// A pool of items that can be claimed by owners and released.
///
/// Contention is never an error: a key held by someone else yields `false`
/// (or `None` from [`allocate_next`](Self::allocate_next) when nothing is
/// free), and releasing a free key yields `false`. Errors are reserved for
/// failures of the backing store.
///
/// Re-allocating a key its current owner already holds also yields `false`;
/// claims are not idempotent.
pub trait PoolAllocator: Send + Sync {
    /// Claim `key` for `owner`.
    fn allocate(&self, key: &str, owner: &str) -> Result<bool>;

    /// Claim any free key for `owner`, or `None` when the pool is exhausted.
    fn allocate_next(&self, owner: &str) -> Result<Option<String>>;

    /// Free `key`; `false` when it was not allocated.
    fn release(&self, key: &str) -> Result<bool>;

    /// The current allocation of `key`, if any.
    fn read_allocation(&self, key: &str) -> Result<Option<Allocation>>;

    /// Every allocation of the pool, for repair.
    ///
    /// Only meaningful for allocators with a remote source of truth; the
    /// in-memory allocator panics.
    fn list_allocations(&self) -> Result<Vec<Allocation>>;

    /// Release `allocation` only if owner and version still match, for
    /// repair.
    ///
    /// Only meaningful for allocators with a remote source of truth; the
    /// in-memory allocator panics.
    fn release_for_repair(&self, allocation: &Allocation) -> Result<bool>;
}

impl<T: PoolAllocator + ?Sized> PoolAllocator for Box<T> {
    fn allocate(&self, key: &str, owner: &str) -> Result<bool> {
        (**self).allocate(key, owner)
    }

    fn allocate_next(&self, owner: &str) -> Result<Option<String>> {
        (**self).allocate_next(owner)
    }

    fn release(&self, key: &str) -> Result<bool> {
        (**self).release(key)
    }

    fn read_allocation(&self, key: &str) -> Result<Option<Allocation>> {
        (**self).read_allocation(key)
    }

    fn list_allocations(&self) -> Result<Vec<Allocation>> {
        (**self).list_allocations()
    }

    fn release_for_repair(&self, allocation: &Allocation) -> Result<bool> {
        (**self).release_for_repair(allocation)
    }
}
