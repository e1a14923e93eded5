//! # Nebula Allocator
//!
//! Hands out unique items from a finite key space (IP addresses, node
//! ports, IDs) to owners, guaranteeing each item is held by at most one
//! owner at a time.
//!
//! Two implementations of [`PoolAllocator`] are provided:
//!
//! - [`MemoryPoolAllocator`]: single-process; the authoritative state is a
//!   local map behind one lock.
//! - [`DistributedPoolAllocator`]: many processes share one pool through a
//!   [`KvStore`](nebula_storage::KvStore). The store's create-if-absent and
//!   compare-and-delete are what enforce exclusion; the local map is only a
//!   hint of which keys are busy. Listing and version-checked release are
//!   available for repair.
//!
//! Which items exist is decided by a [`PoolDriver`]; [`drivers`] has the
//! usual ones.
//!
//! ```ignore
//! use nebula_allocator::{MemoryPoolAllocator, PoolAllocator, drivers::RangeDriver};
//!
//! let ports = MemoryPoolAllocator::new(RangeDriver::new(30000..=32767)?);
//! let port = ports.allocate_next("svc/default/web")?.expect("pool exhausted");
//! ports.release(&port)?;
//! ```

#![forbid(unsafe_code)]

pub mod allocation;
pub mod allocator;
pub mod config;
pub mod distributed;
pub mod driver;
pub mod drivers;
pub mod error;
pub mod memory;

pub use allocation::Allocation;
pub use allocator::PoolAllocator;
pub use config::{AllocatorConfig, DEFAULT_RANDOM_ATTEMPTS};
pub use distributed::DistributedPoolAllocator;
pub use driver::PoolDriver;
pub use error::{AllocatorError, Result};
pub use memory::MemoryPoolAllocator;
