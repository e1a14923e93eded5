//! # Nebula Storage
//!
//! The narrow key-value protocol the rest of Nebula coordinates through:
//! a hierarchical namespace with create-if-absent, unconditional delete,
//! compare-and-delete and listing. Every backend reports the expected
//! contention outcomes (`AlreadyExists`, `NotFound`, `CompareFailed`) as
//! distinct [`StorageError`] variants so callers can tell them apart from
//! transport failures.
//!
//! [`MemoryStore`] is the in-process reference backend.

#![forbid(unsafe_code)]

pub mod error;
pub mod memory;
pub mod node;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use memory::MemoryStore;
pub use node::{Node, Response};
#[cfg(any(test, feature = "testing"))]
pub use store::MockKvStore;
pub use store::{KvStore, SEPARATOR};
