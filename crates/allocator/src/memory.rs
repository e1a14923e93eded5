//! Single-process pool allocator
//!
//! The allocation map is the source of truth and lives behind one lock, so
//! every operation is serialized and there is nothing to repair. Use
//! [`DistributedPoolAllocator`](crate::DistributedPoolAllocator) when more
//! than one process allocates from the same pool.

use std::collections::HashMap;
use std::fmt;

use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::StdRng;

use crate::allocation::Allocation;
use crate::allocator::PoolAllocator;
use crate::config::AllocatorConfig;
use crate::driver::PoolDriver;
use crate::error::Result;

struct State<R> {
    used: HashMap<String, Allocation>,
    rng: R,
}

impl<R> State<R> {
    fn claim(&mut self, key: String, owner: &str) -> Option<String> {
        if self.used.contains_key(&key) {
            tracing::trace!(key = %key, "collision");
            return None;
        }
        tracing::debug!(key = %key, owner, "allocated");
        self.used
            .insert(key.clone(), Allocation::new(key.as_str(), owner, 0));
        Some(key)
    }
}

/// Pool allocator backed by an in-memory map.
///
/// Cannot be shared between processes.
pub struct MemoryPoolAllocator<D, R = StdRng> {
    driver: D,
    random_attempts: usize,
    state: Mutex<State<R>>,
}

impl<D: PoolDriver> MemoryPoolAllocator<D> {
    /// Create an allocator with the default configuration
    pub fn new(driver: D) -> Self {
        Self::with_config(driver, &AllocatorConfig::default())
    }

    /// Create an allocator from `config`; the prefix is ignored
    pub fn with_config(driver: D, config: &AllocatorConfig) -> Self {
        Self::with_rng(driver, config.rng(), config.random_attempts)
    }
}

impl<D: PoolDriver, R: RngCore + Send> MemoryPoolAllocator<D, R> {
    /// Create an allocator with an explicit random source
    pub fn with_rng(driver: D, rng: R, random_attempts: usize) -> Self {
        Self {
            driver,
            random_attempts,
            state: Mutex::new(State {
                used: HashMap::new(),
                rng,
            }),
        }
    }

    /// Number of allocated keys
    pub fn len(&self) -> usize {
        self.state.lock().used.len()
    }

    /// Whether nothing is allocated
    pub fn is_empty(&self) -> bool {
        self.state.lock().used.is_empty()
    }
}

impl<D, R> fmt::Debug for MemoryPoolAllocator<D, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPoolAllocator")
            .field("random_attempts", &self.random_attempts)
            .finish_non_exhaustive()
    }
}

impl<D: PoolDriver, R: RngCore + Send> PoolAllocator for MemoryPoolAllocator<D, R> {
    fn allocate(&self, key: &str, owner: &str) -> Result<bool> {
        Ok(self.state.lock().claim(key.to_owned(), owner).is_some())
    }

    fn allocate_next(&self, owner: &str) -> Result<Option<String>> {
        let mut state = self.state.lock();

        for _ in 0..self.random_attempts {
            let key = self.driver.pick_random(&mut state.rng);
            if let Some(key) = state.claim(key, owner) {
                return Ok(Some(key));
            }
        }

        for key in self.driver.iter() {
            if let Some(key) = state.claim(key, owner) {
                return Ok(Some(key));
            }
        }

        tracing::debug!(owner, "pool exhausted");
        Ok(None)
    }

    fn release(&self, key: &str) -> Result<bool> {
        let released = self.state.lock().used.remove(key).is_some();
        if released {
            tracing::debug!(key, "released");
        }
        Ok(released)
    }

    fn read_allocation(&self, key: &str) -> Result<Option<Allocation>> {
        Ok(self.state.lock().used.get(key).cloned())
    }

    fn list_allocations(&self) -> Result<Vec<Allocation>> {
        panic!("list_allocations is a repair operation; MemoryPoolAllocator has nothing to repair")
    }

    fn release_for_repair(&self, _allocation: &Allocation) -> Result<bool> {
        panic!(
            "release_for_repair is a repair operation; MemoryPoolAllocator has nothing to repair"
        )
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::drivers::{ListDriver, RangeDriver};

    fn abc(random_attempts: usize) -> MemoryPoolAllocator<ListDriver> {
        MemoryPoolAllocator::with_rng(
            ListDriver::new(["a", "b", "c"]).unwrap(),
            StdRng::seed_from_u64(11),
            random_attempts,
        )
    }

    #[test]
    fn test_allocate_is_exclusive() {
        let pool = abc(0);
        assert!(pool.allocate("a", "owner1").unwrap());
        assert!(!pool.allocate("a", "owner2").unwrap());
        assert!(!pool.allocate("a", "owner1").unwrap());
        assert_eq!(
            pool.read_allocation("a").unwrap(),
            Some(Allocation::new("a", "owner1", 0))
        );
    }

    #[test]
    fn test_release_is_idempotent() {
        let pool = abc(0);
        assert!(!pool.release("a").unwrap());
        pool.allocate("a", "owner").unwrap();
        assert!(pool.release("a").unwrap());
        assert!(!pool.release("a").unwrap());
        assert_eq!(pool.read_allocation("a").unwrap(), None);
    }

    #[test]
    fn test_linear_scan_follows_driver_order() {
        let pool = abc(0);
        pool.allocate("a", "x").unwrap();
        assert_eq!(pool.allocate_next("o").unwrap().as_deref(), Some("b"));
        assert_eq!(pool.allocate_next("o").unwrap().as_deref(), Some("c"));
        assert_eq!(pool.allocate_next("o").unwrap(), None);
    }

    #[test]
    fn test_random_search_exhausts_pool() {
        let pool = MemoryPoolAllocator::with_rng(
            RangeDriver::new(1..=64).unwrap(),
            StdRng::seed_from_u64(5),
            10,
        );
        let mut keys: Vec<u64> = (0..64)
            .map(|_| pool.allocate_next("o").unwrap().unwrap().parse().unwrap())
            .collect();
        keys.sort_unstable();
        assert_eq!(keys, (1..=64).collect::<Vec<_>>());
        assert_eq!(pool.len(), 64);
        assert_eq!(pool.allocate_next("o").unwrap(), None);
    }

    #[test]
    fn test_with_config_honours_attempts() {
        let config = AllocatorConfig::default().without_random_allocation();
        let pool = MemoryPoolAllocator::with_config(ListDriver::new(["x", "y"]).unwrap(), &config);
        assert_eq!(pool.allocate_next("o").unwrap().as_deref(), Some("x"));
        assert!(!pool.is_empty());
    }

    #[test]
    #[should_panic(expected = "repair operation")]
    fn test_list_allocations_is_unsupported() {
        let _ = abc(0).list_allocations();
    }

    #[test]
    #[should_panic(expected = "repair operation")]
    fn test_release_for_repair_is_unsupported() {
        let _ = abc(0).release_for_repair(&Allocation::new("a", "o", 0));
    }
}
