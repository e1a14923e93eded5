//! Pool allocator shared between processes through a key-value store
//!
//! Every allocation is a store key `prefix + item` whose value is the owner.
//! Exclusion rests entirely on the store: claiming is create-if-absent,
//! releasing is delete, and repair is compare-and-delete on owner and
//! version. The local map only remembers which keys were last seen busy so
//! random search can skip them without a round trip. It is overwritten with
//! whatever the store reports after every call and is never trusted to prove
//! a key free.
//!
//! The local lock guards the cache and the random source and is never held
//! across a store call; concurrent operations from one process may have
//! several store calls in flight.

use std::collections::HashMap;
use std::fmt;

use nebula_storage::{KvStore, Node};
use parking_lot::Mutex;
use rand::RngCore;
use rand::rngs::StdRng;

use crate::allocation::Allocation;
use crate::allocator::PoolAllocator;
use crate::config::{AllocatorConfig, normalize_prefix, validate_item_key};
use crate::driver::PoolDriver;
use crate::error::{AllocatorError, Result};

struct State<R> {
    cache: HashMap<String, bool>,
    rng: R,
}

/// Pool allocator backed by a shared [`KvStore`].
pub struct DistributedPoolAllocator<S, D, R = StdRng> {
    driver: D,
    store: S,
    prefix: String,
    random_attempts: usize,
    state: Mutex<State<R>>,
}

impl<S: KvStore, D: PoolDriver> DistributedPoolAllocator<S, D> {
    /// Create an allocator over `prefix` with the default configuration
    pub fn new(driver: D, store: S, prefix: &str) -> Result<Self> {
        Self::with_config(driver, store, &AllocatorConfig::default().with_prefix(prefix))
    }

    /// Create an allocator from `config`
    pub fn with_config(driver: D, store: S, config: &AllocatorConfig) -> Result<Self> {
        Self::with_rng(
            driver,
            store,
            &config.prefix,
            config.rng(),
            config.random_attempts,
        )
    }
}

impl<S: KvStore, D: PoolDriver, R: RngCore + Send> DistributedPoolAllocator<S, D, R> {
    /// Create an allocator with an explicit random source
    pub fn with_rng(
        driver: D,
        store: S,
        prefix: &str,
        rng: R,
        random_attempts: usize,
    ) -> Result<Self> {
        AllocatorConfig::default().with_prefix(prefix).validate()?;
        Ok(Self {
            driver,
            store,
            prefix: normalize_prefix(prefix),
            random_attempts,
            state: Mutex::new(State {
                cache: HashMap::new(),
                rng,
            }),
        })
    }

    /// The store prefix, always ending in the separator
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    /// The backing store
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Last observed state of `key`: `Some(true)` busy, `Some(false)` free,
    /// `None` never observed. A hint only.
    pub fn cached(&self, key: &str) -> Option<bool> {
        self.state.lock().cache.get(key).copied()
    }

    fn store_key(&self, key: &str) -> Result<String> {
        validate_item_key(key)?;
        Ok(format!("{}{key}", self.prefix))
    }

    fn set_cached(&self, key: &str, busy: bool) {
        self.state.lock().cache.insert(key.to_owned(), busy);
    }

    fn pick_random(&self) -> String {
        let mut state = self.state.lock();
        self.driver.pick_random(&mut state.rng)
    }

    /// Try to claim `key`, consulting the cache first when `use_cache`.
    ///
    /// Whether or not the create wins, the key is busy afterwards, and the
    /// cache says so.
    fn try_lock(&self, key: &str, owner: &str, use_cache: bool) -> Result<bool> {
        if use_cache && self.cached(key) == Some(true) {
            tracing::trace!(key, "cached busy, skipping");
            return Ok(false);
        }

        let store_key = self.store_key(key)?;
        let created = match self.store.create(&store_key, owner, None) {
            Ok(node) => {
                tracing::debug!(key, owner, version = node.modified_index, "allocated");
                true
            }
            Err(e) if e.is_already_exists() => {
                tracing::trace!(key, "already allocated");
                false
            }
            Err(e) => return Err(AllocatorError::store("allocate", &store_key, e)),
        };

        self.set_cached(key, true);
        Ok(created)
    }

    fn allocation_from(&self, node: &Node) -> Option<Allocation> {
        let key = node.key.strip_prefix(&self.prefix)?;
        Some(Allocation::new(
            key,
            node.value.clone().unwrap_or_default(),
            node.modified_index,
        ))
    }
}

impl<S, D, R> fmt::Debug for DistributedPoolAllocator<S, D, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedPoolAllocator")
            .field("prefix", &self.prefix)
            .field("random_attempts", &self.random_attempts)
            .finish_non_exhaustive()
    }
}

impl<S: KvStore, D: PoolDriver, R: RngCore + Send> PoolAllocator
    for DistributedPoolAllocator<S, D, R>
{
    fn allocate(&self, key: &str, owner: &str) -> Result<bool> {
        // The caller wants exactly this key; a stale cache hit would refuse it
        // wrongly.
        self.try_lock(key, owner, false)
    }

    fn allocate_next(&self, owner: &str) -> Result<Option<String>> {
        // The cached pass is cheap but can only rule keys out; the uncached
        // pass and the scan are what prove a key free.
        for use_cache in [true, false] {
            for _ in 0..self.random_attempts {
                let key = self.pick_random();
                if self.try_lock(&key, owner, use_cache)? {
                    return Ok(Some(key));
                }
            }
        }

        for key in self.driver.iter() {
            if self.try_lock(&key, owner, false)? {
                return Ok(Some(key));
            }
        }

        tracing::debug!(owner, prefix = %self.prefix, "pool exhausted");
        Ok(None)
    }

    fn release(&self, key: &str) -> Result<bool> {
        let store_key = self.store_key(key)?;
        let deleted = match self.store.delete(&store_key, false) {
            Ok(_) => {
                tracing::debug!(key, "released");
                true
            }
            Err(e) if e.is_not_found() => false,
            Err(e) => return Err(AllocatorError::store("release", &store_key, e)),
        };

        self.set_cached(key, false);
        Ok(deleted)
    }

    fn read_allocation(&self, key: &str) -> Result<Option<Allocation>> {
        let store_key = self.store_key(key)?;
        match self.store.get(&store_key, false, false) {
            Ok(response) if !response.node.dir => {
                let allocation = Allocation::new(
                    key,
                    response.node.value.unwrap_or_default(),
                    response.node.modified_index,
                );
                self.set_cached(key, true);
                Ok(Some(allocation))
            }
            Ok(response) => {
                tracing::warn!(
                    key,
                    children = response.node.nodes.len(),
                    "directory found where an allocation was expected"
                );
                Ok(None)
            }
            Err(e) if e.is_not_found() => {
                self.set_cached(key, false);
                Ok(None)
            }
            Err(e) => Err(AllocatorError::store("read_allocation", &store_key, e)),
        }
    }

    fn list_allocations(&self) -> Result<Vec<Allocation>> {
        let allocations: Vec<Allocation> = match self.store.get(&self.prefix, true, true) {
            Ok(response) => response
                .node
                .leaves()
                .into_iter()
                .filter_map(|node| self.allocation_from(node))
                .collect(),
            Err(e) if e.is_not_found() => Vec::new(),
            Err(e) => return Err(AllocatorError::store("list_allocations", &self.prefix, e)),
        };

        {
            let mut state = self.state.lock();
            state.cache.values_mut().for_each(|busy| *busy = false);
            for allocation in &allocations {
                state.cache.insert(allocation.key.clone(), true);
            }
        }

        tracing::info!(
            prefix = %self.prefix,
            count = allocations.len(),
            "rebuilt allocation cache"
        );
        Ok(allocations)
    }

    fn release_for_repair(&self, allocation: &Allocation) -> Result<bool> {
        let store_key = self.store_key(&allocation.key)?;
        let (deleted, busy) = match self.store.compare_and_delete(
            &store_key,
            &allocation.owner,
            allocation.version,
        ) {
            Ok(_) => (true, false),
            Err(e) if e.is_not_found() => (false, false),
            Err(e) if e.is_compare_failed() => (false, true),
            Err(e) => return Err(AllocatorError::store("release_for_repair", &store_key, e)),
        };

        self.set_cached(&allocation.key, busy);
        tracing::info!(
            key = %allocation.key,
            owner = %allocation.owner,
            version = allocation.version,
            deleted,
            busy,
            "repair release"
        );
        Ok(deleted)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use nebula_storage::{MemoryStore, MockKvStore, StorageError};
    use pretty_assertions::assert_eq;
    use rand::SeedableRng;

    use super::*;
    use crate::drivers::ListDriver;

    const PREFIX: &str = "/registry/pool";

    fn pool<S: KvStore>(
        store: S,
        keys: &[&str],
        attempts: usize,
    ) -> DistributedPoolAllocator<S, ListDriver> {
        DistributedPoolAllocator::with_rng(
            ListDriver::new(keys.iter().copied()).unwrap(),
            store,
            PREFIX,
            StdRng::seed_from_u64(17),
            attempts,
        )
        .unwrap()
    }

    #[test]
    fn test_prefix_is_normalized_and_validated() {
        let allocator = pool(MemoryStore::new(), &["a"], 0);
        assert_eq!(allocator.prefix(), "/registry/pool/");

        let err = DistributedPoolAllocator::new(
            ListDriver::new(["a"]).unwrap(),
            MemoryStore::new(),
            "/",
        )
        .unwrap_err();
        assert!(matches!(err, AllocatorError::Configuration { .. }));
    }

    #[test]
    fn test_allocate_stores_owner_under_prefix() {
        let allocator = pool(MemoryStore::new(), &["a", "b"], 0);
        assert!(allocator.allocate("a", "owner1").unwrap());
        assert!(!allocator.allocate("a", "owner2").unwrap());

        let node = allocator.store().get("/registry/pool/a", false, false).unwrap().node;
        assert_eq!(node.value.as_deref(), Some("owner1"));
        assert_eq!(allocator.cached("a"), Some(true));
    }

    #[test]
    fn test_keys_that_collapse_in_store_never_reach_it() {
        // No expectations: any store call fails the test.
        let allocator = pool(MockKvStore::new(), &["a"], 0);

        for key in ["", "x/"] {
            assert!(matches!(
                allocator.allocate(key, "owner"),
                Err(AllocatorError::Configuration { .. })
            ));
            assert!(allocator.release(key).is_err());
            assert!(allocator.read_allocation(key).is_err());
            assert!(allocator.release_for_repair(&Allocation::new(key, "owner", 1)).is_err());
            assert_eq!(allocator.cached(key), None);
        }
    }

    #[test]
    fn test_trailing_separator_key_cannot_free_plain_key() {
        let allocator = pool(MemoryStore::new(), &["x", "y"], 0);
        assert!(allocator.allocate("x", "owner1").unwrap());

        assert!(allocator.release("x/").is_err());
        assert_eq!(
            allocator.read_allocation("x").unwrap(),
            Some(Allocation::new("x", "owner1", 1))
        );
        assert!(allocator.allocate("y", "owner2").unwrap());
    }

    #[test]
    fn test_allocate_ignores_stale_cache() {
        let store = Arc::new(MemoryStore::new());
        let first = pool(Arc::clone(&store), &["a"], 0);
        let second = pool(Arc::clone(&store), &["a"], 0);

        assert!(first.allocate("a", "owner1").unwrap());
        assert!(second.release("a").unwrap());

        // `first` still believes "a" is busy.
        assert_eq!(first.cached("a"), Some(true));
        assert!(first.allocate("a", "owner2").unwrap());
    }

    #[test]
    fn test_cached_pass_skips_known_busy_keys() {
        let mut store = MockKvStore::new();
        // 1 explicit allocate + 3 uncached random picks + 1 linear scan step;
        // the 3 cached random picks never reach the store.
        store
            .expect_create()
            .times(5)
            .returning(|key, _, _| Err(StorageError::AlreadyExists { key: key.into(), index: 1 }));

        let allocator = pool(store, &["a"], 3);
        assert!(!allocator.allocate("a", "owner1").unwrap());
        assert_eq!(allocator.allocate_next("owner2").unwrap(), None);
    }

    #[test]
    fn test_allocate_next_falls_back_to_scan_order() {
        let allocator = pool(MemoryStore::new(), &["a", "b", "c"], 0);
        allocator.allocate("b", "x").unwrap();
        assert_eq!(allocator.allocate_next("o").unwrap().as_deref(), Some("a"));
        assert_eq!(allocator.allocate_next("o").unwrap().as_deref(), Some("c"));
        assert_eq!(allocator.allocate_next("o").unwrap(), None);
    }

    #[test]
    fn test_transport_error_propagates_without_touching_cache() {
        let mut store = MockKvStore::new();
        store
            .expect_create()
            .times(1)
            .returning(|_, _, _| Err(StorageError::transport("connection refused")));

        let allocator = pool(store, &["a"], 0);
        let err = allocator.allocate("a", "owner").unwrap_err();
        assert!(matches!(
            err,
            AllocatorError::Store { operation: "allocate", ref key, .. }
                if key == "/registry/pool/a"
        ));
        assert_eq!(allocator.cached("a"), None);
    }

    #[test]
    fn test_allocate_next_stops_on_first_transport_error() {
        let mut store = MockKvStore::new();
        store
            .expect_create()
            .times(1)
            .returning(|_, _, _| Err(StorageError::transport("timeout")));

        let allocator = pool(store, &["a", "b"], 0);
        assert!(allocator.allocate_next("owner").unwrap_err().is_store());
    }

    #[test]
    fn test_release_marks_key_free() {
        let allocator = pool(MemoryStore::new(), &["a"], 0);
        allocator.allocate("a", "owner").unwrap();
        assert!(allocator.release("a").unwrap());
        assert_eq!(allocator.cached("a"), Some(false));
        assert!(!allocator.release("a").unwrap());
        assert_eq!(allocator.cached("a"), Some(false));
    }

    #[test]
    fn test_release_transport_error() {
        let mut store = MockKvStore::new();
        store
            .expect_delete()
            .returning(|_, _| Err(StorageError::transport("broken pipe")));
        let allocator = pool(store, &["a"], 0);
        assert!(allocator.release("a").unwrap_err().is_store());
    }

    #[test]
    fn test_read_allocation() {
        let allocator = pool(MemoryStore::new(), &["a", "b"], 0);
        allocator.allocate("b", "x").unwrap();
        allocator.allocate("a", "owner1").unwrap();

        assert_eq!(
            allocator.read_allocation("a").unwrap(),
            Some(Allocation::new("a", "owner1", 2))
        );
        assert_eq!(allocator.cached("a"), Some(true));

        allocator.release("b").unwrap();
        allocator.set_cached("b", true);
        assert_eq!(allocator.read_allocation("b").unwrap(), None);
        assert_eq!(allocator.cached("b"), Some(false));
    }

    #[test]
    fn test_read_allocation_leaves_directory_unresolved() {
        let store = MemoryStore::new();
        store.create("/registry/pool/a/nested", "x", None).unwrap();
        let allocator = pool(store, &["a"], 0);

        assert_eq!(allocator.read_allocation("a").unwrap(), None);
        assert_eq!(allocator.cached("a"), None);
    }

    #[test]
    fn test_list_allocations_resets_cache() {
        let store = MemoryStore::new();
        store.create("/registry/pool/a", "owner1", None).unwrap();
        store.create("/registry/pool/b", "owner2", None).unwrap();
        store.create("/registry/other/c", "owner3", None).unwrap();

        let allocator = pool(store, &["a", "b", "z"], 0);
        allocator.set_cached("z", true);

        let allocations = allocator.list_allocations().unwrap();
        assert_eq!(
            allocations,
            vec![
                Allocation::new("a", "owner1", 1),
                Allocation::new("b", "owner2", 2),
            ]
        );
        assert_eq!(allocator.cached("a"), Some(true));
        assert_eq!(allocator.cached("b"), Some(true));
        assert_eq!(allocator.cached("z"), Some(false));
    }

    #[test]
    fn test_list_allocations_of_empty_pool() {
        let allocator = pool(MemoryStore::new(), &["a"], 0);
        allocator.set_cached("a", true);
        assert!(allocator.list_allocations().unwrap().is_empty());
        assert_eq!(allocator.cached("a"), Some(false));
    }

    #[test]
    fn test_list_allocations_transport_error_keeps_cache() {
        let mut store = MockKvStore::new();
        store
            .expect_get()
            .returning(|_, _, _| Err(StorageError::transport("unavailable")));
        let allocator = pool(store, &["a"], 0);
        allocator.set_cached("a", true);

        assert!(allocator.list_allocations().unwrap_err().is_store());
        assert_eq!(allocator.cached("a"), Some(true));
    }

    #[test]
    fn test_release_for_repair_outcomes() {
        let allocator = pool(MemoryStore::new(), &["a"], 0);
        allocator.allocate("a", "owner1").unwrap();
        let stale = allocator.read_allocation("a").unwrap().unwrap();

        // Released and re-allocated since `stale` was read.
        allocator.release("a").unwrap();
        allocator.allocate("a", "owner1").unwrap();
        assert!(!allocator.release_for_repair(&stale).unwrap());
        assert_eq!(allocator.cached("a"), Some(true));
        assert!(allocator.read_allocation("a").unwrap().is_some());

        let current = allocator.read_allocation("a").unwrap().unwrap();
        assert!(allocator.release_for_repair(&current).unwrap());
        assert_eq!(allocator.cached("a"), Some(false));

        assert!(!allocator.release_for_repair(&current).unwrap());
        assert_eq!(allocator.cached("a"), Some(false));
    }

    #[test]
    fn test_release_for_repair_transport_error() {
        let mut store = MockKvStore::new();
        store
            .expect_compare_and_delete()
            .returning(|_, _, _| Err(StorageError::transport("reset")));
        let allocator = pool(store, &["a"], 0);

        let err = allocator
            .release_for_repair(&Allocation::new("a", "owner", 3))
            .unwrap_err();
        assert!(err.is_store());
        assert_eq!(allocator.cached("a"), None);
    }
}
