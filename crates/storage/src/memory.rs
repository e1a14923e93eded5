//! In-memory store backend
//!
//! Every operation runs under one `parking_lot` mutex, so create-if-absent
//! and compare-and-delete are trivially atomic. Directories are implicit: a
//! key is a directory while at least one leaf lives below it.

use std::collections::BTreeMap;
use std::time::Duration;

use parking_lot::Mutex;

use crate::error::{StorageError, StorageResult};
use crate::node::{Node, Response};
use crate::store::{KvStore, SEPARATOR};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    created_index: u64,
    modified_index: u64,
}

#[derive(Debug, Default)]
struct Inner {
    entries: BTreeMap<String, Entry>,
    index: u64,
}

/// A strongly consistent key-value store held in process memory.
///
/// Useful as the shared backend of several allocators inside one process,
/// and as the reference implementation of [`KvStore`] in tests.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

fn normalize(key: &str) -> &str {
    key.trim_end_matches(SEPARATOR)
}

fn dir_prefix(dir: &str) -> String {
    let mut prefix = dir.to_owned();
    prefix.push(SEPARATOR);
    prefix
}

impl Entry {
    fn to_node(&self, key: &str) -> Node {
        Node {
            key: key.to_owned(),
            value: Some(self.value.clone()),
            dir: false,
            created_index: self.created_index,
            modified_index: self.modified_index,
            nodes: Vec::new(),
        }
    }
}

impl Inner {
    fn under<'a>(&'a self, prefix: &'a str) -> impl Iterator<Item = (&'a String, &'a Entry)> + 'a {
        self.entries
            .range::<str, _>((std::ops::Bound::Included(prefix), std::ops::Bound::Unbounded))
            .take_while(move |(key, _)| key.starts_with(prefix))
    }

    fn is_dir(&self, key: &str) -> bool {
        self.under(&dir_prefix(key)).next().is_some()
    }

    /// First ancestor of `key` that is stored as a leaf.
    fn leaf_ancestor(&self, key: &str) -> Option<String> {
        key.char_indices()
            .filter(|&(i, c)| c == SEPARATOR && i > 0)
            .map(|(i, _)| &key[..i])
            .find(|ancestor| self.entries.contains_key(*ancestor))
            .map(str::to_owned)
    }

    fn children(&self, dir: &str, recursive: bool) -> Vec<Node> {
        let prefix = dir_prefix(dir);
        let mut nodes: Vec<Node> = Vec::new();
        for (key, entry) in self.under(&prefix) {
            let rest = &key[prefix.len()..];
            match rest.split_once(SEPARATOR) {
                None => nodes.push(entry.to_node(key)),
                Some((segment, _)) => {
                    let child = format!("{prefix}{segment}");
                    // Keys sharing a prefix are contiguous in the map.
                    if nodes.last().is_some_and(|n| n.dir && n.key == child) {
                        continue;
                    }
                    let grandchildren = if recursive {
                        self.children(&child, true)
                    } else {
                        Vec::new()
                    };
                    nodes.push(Node::directory(child, grandchildren));
                }
            }
        }
        nodes
    }

    fn not_found(&self, key: &str) -> StorageError {
        StorageError::NotFound {
            key: key.to_owned(),
            index: self.index,
        }
    }
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of leaves currently stored
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the store holds no leaves
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Current store-wide modification index
    pub fn index(&self) -> u64 {
        self.inner.lock().index
    }
}

impl KvStore for MemoryStore {
    fn create(&self, key: &str, value: &str, ttl: Option<Duration>) -> StorageResult<Node> {
        if let Some(ttl) = ttl {
            return Err(StorageError::Unsupported {
                operation: "create",
                reason: format!("ttl {ttl:?} requested but the memory store never expires keys"),
            });
        }

        let key = normalize(key);
        let mut inner = self.inner.lock();
        if key.is_empty() || inner.entries.contains_key(key) || inner.is_dir(key) {
            return Err(StorageError::AlreadyExists {
                key: key.to_owned(),
                index: inner.index,
            });
        }
        if let Some(ancestor) = inner.leaf_ancestor(key) {
            return Err(StorageError::NotADirectory { key: ancestor });
        }

        inner.index += 1;
        let index = inner.index;
        inner.entries.insert(
            key.to_owned(),
            Entry {
                value: value.to_owned(),
                created_index: index,
                modified_index: index,
            },
        );
        tracing::trace!(key, index, "created");
        Ok(Node::leaf(key, value, index))
    }

    fn delete(&self, key: &str, recursive: bool) -> StorageResult<Node> {
        let key = normalize(key);
        let mut inner = self.inner.lock();

        if let Some(entry) = inner.entries.remove(key) {
            inner.index += 1;
            tracing::trace!(key, index = inner.index, "deleted");
            return Ok(entry.to_node(key));
        }

        if !inner.is_dir(key) {
            return Err(inner.not_found(key));
        }
        if !recursive {
            return Err(StorageError::NotAFile { key: key.to_owned() });
        }

        let removed = Node::directory(key, inner.children(key, true));
        let prefix = dir_prefix(key);
        inner.entries.retain(|k, _| !k.starts_with(&prefix));
        inner.index += 1;
        tracing::trace!(key, index = inner.index, "deleted directory");
        Ok(removed)
    }

    fn compare_and_delete(
        &self,
        key: &str,
        prev_value: &str,
        prev_version: u64,
    ) -> StorageResult<Node> {
        let key = normalize(key);
        let mut inner = self.inner.lock();

        let Some(entry) = inner.entries.get(key) else {
            if inner.is_dir(key) {
                return Err(StorageError::NotAFile { key: key.to_owned() });
            }
            return Err(inner.not_found(key));
        };

        if entry.value != prev_value || entry.modified_index != prev_version {
            return Err(StorageError::CompareFailed {
                key: key.to_owned(),
                expected_value: prev_value.to_owned(),
                actual_value: entry.value.clone(),
                expected_version: prev_version,
                actual_version: entry.modified_index,
            });
        }

        let node = entry.to_node(key);
        inner.entries.remove(key);
        inner.index += 1;
        tracing::trace!(key, index = inner.index, "compare-and-deleted");
        Ok(node)
    }

    fn get(&self, key: &str, _sorted: bool, recursive: bool) -> StorageResult<Response> {
        let key = normalize(key);
        let inner = self.inner.lock();

        if let Some(entry) = inner.entries.get(key) {
            return Ok(Response {
                node: entry.to_node(key),
                index: inner.index,
            });
        }

        let nodes = inner.children(key, recursive);
        if nodes.is_empty() {
            return Err(inner.not_found(key));
        }
        Ok(Response {
            node: Node::directory(key, nodes),
            index: inner.index,
        })
    }
}
