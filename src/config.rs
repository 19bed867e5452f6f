//! Tuning constants and construction-time configuration.

use crate::error::ConfigError;
use core::cmp::Ordering;

/// Capacity used when the first insertion allocates a table that was never sized.
pub const DEFAULT_INITIAL_CAPACITY: usize = 1 << 4;

/// Largest bucket count the table grows to. Past this point the table stops
/// resizing and buckets simply get longer.
pub const MAXIMUM_CAPACITY: usize = 1 << 30;

pub const DEFAULT_LOAD_FACTOR: f32 = 0.75;

/// Chain length (not counting the node being appended) at which a bucket is
/// converted to a tree.
pub const TREEIFY_THRESHOLD: usize = 8;

/// A tree half produced by a resize split with this many nodes or fewer
/// reverts to a chain.
pub const UNTREEIFY_THRESHOLD: usize = 6;

/// Smallest table that may hold tree buckets. Below it an overfull chain
/// grows the table instead.
pub const MIN_TREEIFY_CAPACITY: usize = 64;

/// Optional total order on keys, consulted only to place hash-equal keys
/// inside a tree bucket.
pub type KeyOrder<K> = fn(&K, &K) -> Ordering;

/// Construction parameters for `TreeHashMap`. The key ordering is chosen
/// separately, by constructor, since it is part of the map's type.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct MapConfig {
    /// Requested number of buckets; rounded up to a power of two and clamped
    /// to `MAXIMUM_CAPACITY`. `None` defers to `DEFAULT_INITIAL_CAPACITY`.
    pub initial_capacity: Option<usize>,
    pub load_factor: f32,
}

impl MapConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.load_factor.is_nan() || self.load_factor <= 0.0 {
            return Err(ConfigError::InvalidLoadFactor(self.load_factor));
        }
        Ok(())
    }
}

impl Default for MapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: None,
            load_factor: DEFAULT_LOAD_FACTOR,
        }
    }
}
