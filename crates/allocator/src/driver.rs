//! The key-space driver

use std::sync::Arc;

use rand::RngCore;

/// Enumerates the items a pool allocates from.
///
/// A driver knows which keys exist, never which are taken; allocation state
/// belongs to the allocator.
pub trait PoolDriver: Send + Sync {
    /// Draw one key from the whole key space using `rng`.
    fn pick_random(&self, rng: &mut dyn RngCore) -> String;

    /// Iterate over every key once, in a stable order.
    ///
    /// Each call starts a fresh pass.
    fn iter(&self) -> Box<dyn Iterator<Item = String> + '_>;
}

impl<T: PoolDriver + ?Sized> PoolDriver for Arc<T> {
    fn pick_random(&self, rng: &mut dyn RngCore) -> String {
        (**self).pick_random(rng)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = String> + '_> {
        (**self).iter()
    }
}

impl<T: PoolDriver + ?Sized> PoolDriver for Box<T> {
    fn pick_random(&self, rng: &mut dyn RngCore) -> String {
        (**self).pick_random(rng)
    }

    fn iter(&self) -> Box<dyn Iterator<Item = String> + '_> {
        (**self).iter()
    }
}
