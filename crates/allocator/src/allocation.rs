//! The allocation record

use serde::{Deserialize, Serialize};

/// One claimed item of a pool.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Allocation {
    /// Item key, verbatim from the driver's key space
    pub key: String,
    /// Opaque identifier of the holder
    pub owner: String,
    /// Store modification stamp; always 0 for in-memory allocations
    #[serde(default)]
    pub version: u64,
}

impl Allocation {
    /// Create an allocation record
    pub fn new(key: impl Into<String>, owner: impl Into<String>, version: u64) -> Self {
        Self {
            key: key.into(),
            owner: owner.into(),
            version,
        }
    }
}
