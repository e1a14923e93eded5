use std::ops::RangeInclusive;

use rand::{Rng, RngCore};

use crate::driver::PoolDriver;
use crate::error::{AllocatorError, Result};

/// An inclusive range of integers, keyed by their decimal form.
///
/// ```ignore
/// let node_ports = RangeDriver::new(30000..=32767)?;
/// ```
#[derive(Debug, Clone)]
pub struct RangeDriver {
    range: RangeInclusive<u64>,
}

impl RangeDriver {
    /// Build a driver over `range`
    pub fn new(range: RangeInclusive<u64>) -> Result<Self> {
        if range.is_empty() {
            return Err(AllocatorError::configuration(format!(
                "range {}..={} is empty",
                range.start(),
                range.end()
            )));
        }
        Ok(Self { range })
    }

    /// Number of keys in the range
    pub fn len(&self) -> u64 {
        (self.range.end() - self.range.start()).saturating_add(1)
    }

    /// Always false; construction rejects empty ranges
    pub fn is_empty(&self) -> bool {
        self.range.is_empty()
    }
}

impl PoolDriver for RangeDriver {
    fn pick_random(&self, rng: &mut dyn RngCore) -> String {
        rng.random_range(self.range.clone()).to_string()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = String> + '_> {
        Box::new(self.range.clone().map(|n| n.to_string()))
    }
}
