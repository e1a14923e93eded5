//! The key-value store protocol

use std::sync::Arc;
use std::time::Duration;

use crate::error::StorageResult;
use crate::node::{Node, Response};

/// Path separator of the hierarchical namespace
pub const SEPARATOR: char = '/';

/// A strongly consistent, hierarchical key-value store.
///
/// Implementations must make `create` and `compare_and_delete` atomic with
/// respect to every other operation on the same key; callers build mutual
/// exclusion on top of exactly those two guarantees. Calls are blocking and
/// carry no timeout of their own.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
pub trait KvStore: Send + Sync {
    /// Create `key` with `value` if it does not exist yet.
    ///
    /// Fails with `AlreadyExists` when the key is present.
    fn create(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<Node>;

    /// Delete `key`.
    ///
    /// Fails with `NotFound` when the key is missing and with `NotAFile`
    /// when it is a directory and `recursive` is false.
    fn delete(&self, key: &str, recursive: bool) -> StorageResult<Node>;

    /// Delete `key` only if it still holds `prev_value` at `prev_version`.
    ///
    /// Fails with `NotFound` or `CompareFailed`.
    fn compare_and_delete(
        &self,
        key: &str,
        prev_value: &str,
        prev_version: u64,
    ) -> StorageResult<Node>;

    /// Read a leaf, or list a directory's children.
    fn get(&self, key: &str, sorted: bool, recursive: bool) -> StorageResult<Response>;
}

impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    fn create(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<Node> {
        (**self).create(key, value, ttl)
    }

    fn delete(&self, key: &str, recursive: bool) -> StorageResult<Node> {
        (**self).delete(key, recursive)
    }

    fn compare_and_delete(
        &self,
        key: &str,
        prev_value: &str,
        prev_version: u64,
    ) -> StorageResult<Node> {
        (**self).compare_and_delete(key, prev_value, prev_version)
    }

    fn get(&self, key: &str, sorted: bool, recursive: bool) -> StorageResult<Response> {
        (**self).get(key, sorted, recursive)
    }
}
