//! Key ordering capabilities for tree buckets.
//!
//! An ordering is chosen when the map is built and only ever breaks hash
//! ties inside tree buckets. `KeyOrdering` supplies the stored-key order
//! used to place nodes; `QueryOrdering` compares a lookup key against stored
//! keys so `get`/`remove` can descend one side instead of searching both.
//! The two must agree: a query that equals a stored key compares `Equal`.

use crate::config::KeyOrder;
use core::borrow::Borrow;
use core::cmp::Ordering;

pub trait KeyOrdering<K> {
    /// Stored-key order, or `None` when this capability never decides.
    fn key_order(&self) -> Option<KeyOrder<K>>;
}

pub trait QueryOrdering<K, Q: ?Sized> {
    /// Direction of `query` relative to `stored`; `Equal` means undecided.
    fn compare(&self, query: &Q, stored: &K) -> Ordering;
}

/// No ordering: hash-equal keys are placed by insertion sequence and
/// lookups search both subtrees on ties.
#[derive(Copy, Clone, Debug, Default)]
pub struct Unordered;

impl<K> KeyOrdering<K> for Unordered {
    fn key_order(&self) -> Option<KeyOrder<K>> {
        None
    }
}

impl<K, Q: ?Sized> QueryOrdering<K, Q> for Unordered {
    #[inline]
    fn compare(&self, _query: &Q, _stored: &K) -> Ordering {
        Ordering::Equal
    }
}

/// Order by `K: Ord`; borrowed lookups use `Q: Ord`, which `Borrow`
/// requires to agree with `K`'s order.
#[derive(Copy, Clone, Debug, Default)]
pub struct ByOrd;

impl<K: Ord> KeyOrdering<K> for ByOrd {
    fn key_order(&self) -> Option<KeyOrder<K>> {
        Some(<K as Ord>::cmp)
    }
}

impl<K, Q> QueryOrdering<K, Q> for ByOrd
where
    K: Ord + Borrow<Q>,
    Q: ?Sized + Ord,
{
    #[inline]
    fn compare(&self, query: &Q, stored: &K) -> Ordering {
        query.cmp(stored.borrow())
    }
}

/// Order by a plain comparison function. It must be consistent with `Eq`.
/// Lookups through it take `&K`.
pub struct ByFn<K>(pub KeyOrder<K>);

impl<K> Clone for ByFn<K> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<K> Copy for ByFn<K> {}

impl<K> core::fmt::Debug for ByFn<K> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("ByFn")
    }
}

impl<K> KeyOrdering<K> for ByFn<K> {
    fn key_order(&self) -> Option<KeyOrder<K>> {
        Some(self.0)
    }
}

impl<K> QueryOrdering<K, K> for ByFn<K> {
    #[inline]
    fn compare(&self, query: &K, stored: &K) -> Ordering {
        (self.0)(query, stored)
    }
}
