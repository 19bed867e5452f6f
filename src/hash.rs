//! Hash folding and bucket indexing.
//!
//! `BuildHasher` produces 64 bits; the table works on 32-bit hashes so the
//! upper word is folded in first, then the upper half of the result is
//! spread into the low bits that actually select a bucket.

use crate::config::MAXIMUM_CAPACITY;
use core::hash::{BuildHasher, Hash};

/// Reduce a 64-bit hash to the 32-bit hash stored in every node.
#[inline]
pub fn fold(raw: u64) -> u32 {
    spread((raw ^ (raw >> 32)) as u32)
}

/// XOR a 32-bit hash with its own upper half. Small tables only look at the
/// low bits, so hashes that differ only in the high bits would otherwise
/// all collide.
#[inline]
pub fn spread(h: u32) -> u32 {
    h ^ (h >> 16)
}

#[inline]
pub(crate) fn make_hash<S, Q>(hasher: &S, q: &Q) -> u32
where
    S: BuildHasher,
    Q: ?Sized + Hash,
{
    fold(hasher.hash_one(q))
}

/// Bucket index for `hash`; `capacity` must be a power of two.
#[inline]
pub fn index_for(hash: u32, capacity: usize) -> usize {
    debug_assert!(capacity.is_power_of_two());
    (hash as usize) & (capacity - 1)
}

/// Smallest power of two `>= cap`, clamped to `[1, MAXIMUM_CAPACITY]`.
pub fn table_size_for(cap: usize) -> usize {
    if cap == 0 {
        return 1;
    }
    let mut n = cap - 1;
    n |= n >> 1;
    n |= n >> 2;
    n |= n >> 4;
    n |= n >> 8;
    n |= n >> 16;
    if n >= MAXIMUM_CAPACITY {
        MAXIMUM_CAPACITY
    } else {
        n + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn table_size_rounds_up_to_power_of_two() {
        assert_eq!(table_size_for(0), 1);
        assert_eq!(table_size_for(1), 1);
        assert_eq!(table_size_for(2), 2);
        assert_eq!(table_size_for(3), 4);
        assert_eq!(table_size_for(10), 16);
        assert_eq!(table_size_for(16), 16);
        assert_eq!(table_size_for(17), 32);
        assert_eq!(table_size_for(1000), 1024);
    }

    /// Invariant: requests above the ceiling clamp to `MAXIMUM_CAPACITY`.
    #[test]
    fn table_size_clamps_to_maximum() {
        assert_eq!(table_size_for(MAXIMUM_CAPACITY), MAXIMUM_CAPACITY);
        assert_eq!(table_size_for(MAXIMUM_CAPACITY + 1), MAXIMUM_CAPACITY);
        assert_eq!(table_size_for(usize::MAX >> 1), MAXIMUM_CAPACITY);
    }

    /// Invariant: hashes differing only in high bits land in different small buckets.
    #[test]
    fn spread_mixes_high_bits_into_index() {
        let a = 0x0001_0000u32;
        let b = 0x0002_0000u32;
        assert_eq!(index_for(a, 16), index_for(b, 16));
        assert_ne!(index_for(spread(a), 16), index_for(spread(b), 16));
        assert_eq!(spread(0x1234), 0x1234);
    }

    #[test]
    fn fold_keeps_small_values_intact() {
        assert_eq!(fold(0), 0);
        assert_eq!(fold(42), 42);
        assert_eq!(fold(0xffff), 0xffff);
        // Upper word participates.
        assert_ne!(fold(1 << 40), 0);
    }

    #[test]
    fn index_matches_modulo() {
        for h in [0u32, 1, 15, 16, 17, 1023, u32::MAX] {
            for cap in [1usize, 2, 16, 64, 1 << 20] {
                assert_eq!(index_for(h, cap), (h as usize) % cap);
            }
        }
    }
}
