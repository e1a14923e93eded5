//! Error types for store operations
use thiserror::Error;

/// Result type for store operations
pub type StorageResult<T> = std::result::Result<T, StorageError>;

/// Errors returned by a [`KvStore`](crate::KvStore).
///
/// The first three variants are the expected outcomes of contention and are
/// routinely handled by callers; everything else is a genuine failure.
#[derive(Error, Debug)]
pub enum StorageError {
    /// `create` found the key already present
    #[error("Key already exists: {key} (index {index})")]
    AlreadyExists {
        /// The key that was being created
        key: String,
        /// Store index at the time of the failure
        index: u64,
    },

    /// The key does not exist
    #[error("Key not found: {key} (index {index})")]
    NotFound {
        /// The key that was looked up
        key: String,
        /// Store index at the time of the failure
        index: u64,
    },

    /// `compare_and_delete` found a different value or version
    #[error(
        "Compare failed for '{key}': [{expected_value} != {actual_value}] [{expected_version} != {actual_version}]"
    )]
    CompareFailed {
        /// The key that was compared
        key: String,
        /// Value the caller expected
        expected_value: String,
        /// Value currently stored
        actual_value: String,
        /// Version the caller expected
        expected_version: u64,
        /// Version currently stored
        actual_version: u64,
    },

    /// A leaf operation was attempted on a directory
    #[error("Not a file: {key}")]
    NotAFile {
        /// The directory key
        key: String,
    },

    /// A path component that must be a directory is a leaf
    #[error("Not a directory: {key}")]
    NotADirectory {
        /// The leaf key in the way
        key: String,
    },

    /// The backend does not support the requested option
    #[error("Unsupported {operation}: {reason}")]
    Unsupported {
        /// Operation name
        operation: &'static str,
        /// Why it is unsupported
        reason: String,
    },

    /// Communication with the backend failed
    #[error("Transport error: {message}")]
    Transport {
        /// The error message
        message: String,
        /// The underlying error
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },
}

impl StorageError {
    /// Create a transport error without an underlying cause
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Whether a `create` lost to an existing key
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }

    /// Whether the key was missing
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Whether a compare-and-delete precondition did not hold
    #[must_use]
    pub fn is_compare_failed(&self) -> bool {
        matches!(self, Self::CompareFailed { .. })
    }
}
