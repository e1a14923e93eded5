//! Allocator configuration

use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};

use crate::error::{AllocatorError, Result};
use nebula_storage::SEPARATOR;

/// Random picks attempted before falling back to a linear scan
pub const DEFAULT_RANDOM_ATTEMPTS: usize = 1000;

/// Default store prefix for distributed pools
pub const DEFAULT_PREFIX: &str = "/registry/pool";

/// Configuration shared by both allocator variants
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocatorConfig {
    /// Random picks per pass before the linear scan; 0 makes `allocate_next`
    /// deterministic (driver iteration order)
    pub random_attempts: usize,

    /// Seed for the per-instance random source; `None` draws one from OS
    /// entropy, which differs between processes
    pub seed: Option<u64>,

    /// Store prefix under which a distributed pool keeps its allocations;
    /// ignored by the in-memory allocator
    pub prefix: String,
}

impl Default for AllocatorConfig {
    fn default() -> Self {
        Self {
            random_attempts: DEFAULT_RANDOM_ATTEMPTS,
            seed: None,
            prefix: DEFAULT_PREFIX.to_string(),
        }
    }
}

impl AllocatorConfig {
    /// Create configuration from environment variables
    ///
    /// Reads `NEBULA_POOL_RANDOM_ATTEMPTS`, `NEBULA_POOL_SEED` and
    /// `NEBULA_POOL_PREFIX`; unset variables keep their defaults.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();

        if let Ok(attempts) = std::env::var("NEBULA_POOL_RANDOM_ATTEMPTS") {
            config.random_attempts = attempts.trim().parse().map_err(|e| {
                AllocatorError::configuration(format!(
                    "NEBULA_POOL_RANDOM_ATTEMPTS='{attempts}': {e}"
                ))
            })?;
        }

        if let Ok(seed) = std::env::var("NEBULA_POOL_SEED") {
            config.seed = Some(seed.trim().parse().map_err(|e| {
                AllocatorError::configuration(format!("NEBULA_POOL_SEED='{seed}': {e}"))
            })?);
        }

        if let Ok(prefix) = std::env::var("NEBULA_POOL_PREFIX") {
            config.prefix = prefix;
        }

        config.validate()?;
        Ok(config)
    }

    /// Set the number of random attempts
    pub fn with_random_attempts(mut self, random_attempts: usize) -> Self {
        self.random_attempts = random_attempts;
        self
    }

    /// Only linear scans; for deterministic tests
    pub fn without_random_allocation(self) -> Self {
        self.with_random_attempts(0)
    }

    /// Seed the random source
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Set the store prefix
    pub fn with_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = prefix.into();
        self
    }

    /// Check the configuration
    pub fn validate(&self) -> Result<()> {
        if self.prefix.trim().trim_matches(SEPARATOR).is_empty() {
            return Err(AllocatorError::configuration(format!(
                "prefix '{}' must name a directory below the store root",
                self.prefix
            )));
        }
        Ok(())
    }

    /// Build the random source this configuration asks for
    pub fn rng(&self) -> StdRng {
        match self.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        }
    }
}

/// Append the separator to `prefix` unless it already ends with one
pub fn normalize_prefix(prefix: &str) -> String {
    let mut prefix = prefix.to_owned();
    if !prefix.ends_with(SEPARATOR) {
        prefix.push(SEPARATOR);
    }
    prefix
}

/// Check that `key` can be stored below a prefix as a leaf of its own
///
/// The store ignores trailing separators, so an empty key would land on the
/// prefix directory itself and `"x/"` would share a store key with `"x"`.
pub fn validate_item_key(key: &str) -> Result<()> {
    if key.is_empty() || key.ends_with(SEPARATOR) {
        return Err(AllocatorError::configuration(format!(
            "item key '{key}' must be non-empty and must not end with '{SEPARATOR}'"
        )));
    }
    Ok(())
}
