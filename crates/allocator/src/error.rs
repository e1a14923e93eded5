//! Error types for allocator operations
use nebula_storage::StorageError;
use thiserror::Error;

/// Result type for allocator operations
pub type Result<T> = std::result::Result<T, AllocatorError>;

/// Errors surfaced by allocators.
///
/// Losing a race for a key, or releasing a key that is already free, is not
/// an error; those are reported as `false` / `None` by the operations.
#[derive(Error, Debug)]
pub enum AllocatorError {
    /// The backing store failed for a reason other than contention
    #[error("Error communicating with store during {operation} of '{key}': {source}")]
    Store {
        /// The allocator operation that failed
        operation: &'static str,
        /// The full store key involved
        key: String,
        /// The underlying store error
        #[source]
        source: StorageError,
    },

    /// Allocator or driver configuration is invalid
    #[error("Configuration error: {message}")]
    Configuration {
        /// The error message
        message: String,
    },
}

impl AllocatorError {
    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub(crate) fn store(operation: &'static str, key: &str, source: StorageError) -> Self {
        tracing::warn!(operation, key, error = %source, "store operation failed");
        Self::Store {
            operation,
            key: key.to_owned(),
            source,
        }
    }

    /// Whether the error came from the backing store
    #[must_use]
    pub fn is_store(&self) -> bool {
        matches!(self, Self::Store { .. })
    }
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn test_store_error_keeps_source() {
        let err = AllocatorError::store(
            "release",
            "/registry/pool/a",
            StorageError::transport("connection refused"),
        );
        assert!(err.is_store());
        assert_eq!(
            err.to_string(),
            concat!(
                "Error communicating with store during release of '/registry/pool/a': ",
                "Transport error: connection refused"
            )
        );
        assert!(err.source().is_some());
    }

    #[test]
    fn test_configuration_error() {
        let err = AllocatorError::configuration("prefix must not be empty");
        assert!(!err.is_store());
        assert_eq!(err.to_string(), "Configuration error: prefix must not be empty");
    }
}
