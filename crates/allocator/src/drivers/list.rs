use std::collections::HashSet;

use rand::{Rng, RngCore};

use crate::config::validate_item_key;
use crate::driver::PoolDriver;
use crate::error::{AllocatorError, Result};

/// A key space given as an explicit list.
///
/// Iteration follows the order the keys were supplied in; duplicates keep
/// their first position.
#[derive(Debug, Clone)]
pub struct ListDriver {
    keys: Vec<String>,
}

impl ListDriver {
    /// Build a driver over `keys`
    ///
    /// Every key must be usable as a store leaf; see
    /// [`validate_item_key`](crate::config::validate_item_key).
    pub fn new<I, S>(keys: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut seen = HashSet::new();
        let keys: Vec<String> = keys
            .into_iter()
            .map(Into::into)
            .filter(|key| seen.insert(key.clone()))
            .collect();

        keys.iter().try_for_each(|key| validate_item_key(key))?;
        if keys.is_empty() {
            return Err(AllocatorError::configuration("list driver needs at least one key"));
        }
        Ok(Self { keys })
    }

    /// Number of keys
    pub fn len(&self) -> usize {
        self.keys.len()
    }

    /// Always false; construction rejects empty lists
    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl PoolDriver for ListDriver {
    fn pick_random(&self, rng: &mut dyn RngCore) -> String {
        self.keys[rng.random_range(0..self.keys.len())].clone()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = String> + '_> {
        Box::new(self.keys.iter().cloned())
    }
}
