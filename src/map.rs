//! TreeHashMap: public facade over the bucket table.

use crate::config::{KeyOrder, MapConfig, DEFAULT_LOAD_FACTOR};
use crate::error::{ConfigError, InvariantError};
use crate::hash::{index_for, make_hash};
use crate::node::{Node, NodeKey};
use crate::order::{ByFn, ByOrd, KeyOrdering, QueryOrdering, Unordered};
use crate::table::{Bucket, Put, Table};
use crate::tree_bin::Direction;
use core::borrow::Borrow;
use core::fmt;
use core::hash::{BuildHasher, Hash};
use hashbrown::hash_map::DefaultHashBuilder;

/// Representation of one bucket, for diagnostics and tests.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum BucketShape {
    Empty,
    /// Plain chain with this many nodes.
    Chain(usize),
    /// Red-black tree with this many nodes.
    Tree(usize),
}

/// Hash map with chained buckets that convert to red-black trees once they
/// grow past `TREEIFY_THRESHOLD` entries.
///
/// `O` orders hash-equal keys inside tree buckets. With `Unordered` a
/// lookup that meets a hash tie searches both subtrees; with `ByOrd` or
/// `ByFn` it descends one side, keeping collision lookups logarithmic.
pub struct TreeHashMap<K, V, S = DefaultHashBuilder, O = Unordered> {
    hasher: S,
    order: O,
    table: Table<K, V>,
}

/// Iterator over entries in unspecified order.
pub struct Iter<'a, K, V> {
    it: slotmap::basic::Iter<'a, NodeKey, Node<K, V>>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, n)| (&n.key, &n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

/// Iterator over entries with mutable values, in unspecified order.
pub struct IterMut<'a, K, V> {
    it: slotmap::basic::IterMut<'a, NodeKey, Node<K, V>>,
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);
    #[inline]
    fn next(&mut self) -> Option<Self::Item> {
        self.it.next().map(|(_, n)| (&n.key, &mut n.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.it.size_hint()
    }
}

impl<K, V> TreeHashMap<K, V>
where
    K: Eq + Hash,
{
    pub fn new() -> Self {
        Self::with_hasher(Default::default())
    }

    /// Pre-size the table; `capacity` is rounded up to a power of two and
    /// clamped to `MAXIMUM_CAPACITY`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self::from_parts(
            Some(capacity),
            DEFAULT_LOAD_FACTOR,
            Default::default(),
            Unordered,
        )
    }

    pub fn with_capacity_and_load_factor(
        capacity: usize,
        load_factor: f32,
    ) -> Result<Self, ConfigError> {
        let config = MapConfig {
            initial_capacity: Some(capacity),
            load_factor,
        };
        Self::with_config_and_hasher(config, Default::default())
    }
}

impl<K, V> TreeHashMap<K, V, DefaultHashBuilder, ByFn<K>>
where
    K: Eq + Hash,
{
    /// Use `order` to place hash-colliding keys inside tree buckets. It must
    /// agree with `Eq`; lookups through it take `&K`.
    pub fn with_key_order(order: KeyOrder<K>) -> Self {
        Self::from_parts(None, DEFAULT_LOAD_FACTOR, Default::default(), ByFn(order))
    }
}

impl<K, V> TreeHashMap<K, V, DefaultHashBuilder, ByOrd>
where
    K: Ord + Hash,
{
    /// Map that orders colliding keys in tree buckets by `K: Ord`.
    pub fn ordered() -> Self {
        Self::ordered_with_hasher(Default::default())
    }
}

impl<K, V, S> TreeHashMap<K, V, S, ByOrd>
where
    K: Ord + Hash,
    S: BuildHasher,
{
    pub fn ordered_with_hasher(hasher: S) -> Self {
        Self::from_parts(None, DEFAULT_LOAD_FACTOR, hasher, ByOrd)
    }
}

impl<K, V, S> TreeHashMap<K, V, S>
where
    K: Eq + Hash,
    S: BuildHasher,
{
    pub fn with_hasher(hasher: S) -> Self {
        Self::from_parts(None, DEFAULT_LOAD_FACTOR, hasher, Unordered)
    }

    pub fn with_config_and_hasher(config: MapConfig, hasher: S) -> Result<Self, ConfigError> {
        Self::with_config_hasher_and_order(config, hasher, Unordered)
    }
}

impl<K, V> Default for TreeHashMap<K, V>
where
    K: Eq + Hash,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V, S, O> TreeHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: KeyOrdering<K>,
{
    fn from_parts(initial_capacity: Option<usize>, load_factor: f32, hasher: S, order: O) -> Self {
        let key_order = order.key_order();
        Self {
            hasher,
            order,
            table: Table::new(initial_capacity, load_factor, key_order),
        }
    }

    pub fn with_config_hasher_and_order(
        config: MapConfig,
        hasher: S,
        order: O,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(
            config.initial_capacity,
            config.load_factor,
            hasher,
            order,
        ))
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.len() == 0
    }

    /// Number of buckets; 0 until the first insertion allocates the table.
    pub fn capacity(&self) -> usize {
        self.table.capacity()
    }

    pub fn load_factor(&self) -> f32 {
        self.table.load_factor
    }

    fn find<Q>(&self, hash: u32, key: &Q) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
        O: QueryOrdering<K, Q>,
    {
        let by_order = |stored: &K| self.order.compare(key, stored);
        let dir_of = self
            .table
            .key_order
            .map(|_| &by_order as Direction<'_, K>);
        self.table.get_node(hash, key, dir_of)
    }

    pub fn get<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: QueryOrdering<K, Q>,
    {
        let hash = make_hash(&self.hasher, key);
        self.find(hash, key).map(|n| &self.table.nodes[n].value)
    }

    pub fn get_mut<Q>(&mut self, key: &Q) -> Option<&mut V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: QueryOrdering<K, Q>,
    {
        let hash = make_hash(&self.hasher, key);
        let n = self.find(hash, key)?;
        Some(&mut self.table.nodes[n].value)
    }

    pub fn contains_key<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: QueryOrdering<K, Q>,
    {
        let hash = make_hash(&self.hasher, key);
        self.find(hash, key).is_some()
    }

    /// Insert or overwrite. Returns the previous value for `key`, if any; an
    /// existing entry keeps its original key.
    pub fn put(&mut self, key: K, value: V) -> Option<V> {
        let hash = make_hash(&self.hasher, &key);
        match self.table.put_val(hash, key, value, false) {
            Put::Replaced(old) => Some(old),
            Put::Inserted | Put::Kept(_) => None,
        }
    }

    /// Insert only when `key` is absent. When present, the stored value is
    /// left untouched, `value` is dropped, and the stored value is returned.
    pub fn put_if_absent(&mut self, key: K, value: V) -> Option<&V> {
        let hash = make_hash(&self.hasher, &key);
        match self.table.put_val(hash, key, value, true) {
            Put::Kept(n) => Some(&self.table.nodes[n].value),
            Put::Inserted | Put::Replaced(_) => None,
        }
    }

    pub fn remove<Q>(&mut self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: QueryOrdering<K, Q>,
    {
        self.remove_entry(key).map(|(_, v)| v)
    }

    pub fn remove_entry<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash + Eq,
        O: QueryOrdering<K, Q>,
    {
        let hash = make_hash(&self.hasher, key);
        let order = &self.order;
        let by_order = |stored: &K| order.compare(key, stored);
        let dir_of = self
            .table
            .key_order
            .map(|_| &by_order as Direction<'_, K>);
        self.table.remove_node(hash, key, dir_of)
    }

    /// Shape of the bucket `key` maps to.
    pub fn bucket_shape<Q>(&self, key: &Q) -> BucketShape
    where
        K: Borrow<Q>,
        Q: ?Sized + Hash,
    {
        let cap = self.table.capacity();
        if cap == 0 {
            return BucketShape::Empty;
        }
        let hash = make_hash(&self.hasher, key);
        match self.table.buckets[index_for(hash, cap)] {
            Bucket::Empty => BucketShape::Empty,
            Bucket::Chain(head) => BucketShape::Chain(self.table.chain_len(head)),
            Bucket::Tree(root) => BucketShape::Tree(self.table.chain_len(root)),
        }
    }

    /// Walk every bucket and verify placement, list/tree linkage, red-black
    /// coloring and the entry count.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        self.table.check_all()
    }

    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            it: self.table.nodes.iter(),
        }
    }

    pub fn iter_mut(&mut self) -> IterMut<'_, K, V> {
        IterMut {
            it: self.table.nodes.iter_mut(),
        }
    }
}

impl<K, V, S, O> fmt::Debug for TreeHashMap<K, V, S, O>
where
    K: fmt::Debug,
    V: fmt::Debug,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.table.nodes.values().map(|n| (&n.key, &n.value)))
            .finish()
    }
}

impl<K, V, S, O> Extend<(K, V)> for TreeHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: KeyOrdering<K>,
{
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (k, v) in iter {
            self.put(k, v);
        }
    }
}

impl<K, V, S, O> FromIterator<(K, V)> for TreeHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher + Default,
    O: KeyOrdering<K> + Default,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut m = Self::from_parts(None, DEFAULT_LOAD_FACTOR, S::default(), O::default());
        m.extend(iter);
        m
    }
}

impl<'a, K, V, S, O> IntoIterator for &'a TreeHashMap<K, V, S, O>
where
    K: Eq + Hash,
    S: BuildHasher,
    O: KeyOrdering<K>,
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TREEIFY_THRESHOLD;
    use std::collections::BTreeSet;
    use std::hash::Hasher;

    #[derive(Clone, Default)]
    struct ConstBuildHasher;
    struct ConstHasher;
    impl BuildHasher for ConstBuildHasher {
        type Hasher = ConstHasher;
        fn build_hasher(&self) -> Self::Hasher {
            ConstHasher
        }
    }
    impl Hasher for ConstHasher {
        fn write(&mut self, _bytes: &[u8]) {}
        fn finish(&self) -> u64 {
            0
        }
    }

    /// Invariant: `put` returns the displaced value and never double-counts.
    #[test]
    fn put_overwrites_and_returns_previous() {
        let mut m: TreeHashMap<String, i32> = TreeHashMap::new();
        assert_eq!(m.put("a".to_string(), 1), None);
        assert_eq!(m.put("a".to_string(), 2), Some(1));
        assert_eq!(m.len(), 1);
        assert_eq!(m.get("a"), Some(&2));
    }

    /// Invariant: borrowed lookups work (store `String`, query with `&str`).
    #[test]
    fn borrowed_lookup_with_str() {
        let mut m: TreeHashMap<String, i32> = TreeHashMap::new();
        m.put("hello".to_string(), 1);
        assert!(m.contains_key("hello"));
        assert!(!m.contains_key("world"));
        assert_eq!(m.remove("hello"), Some(1));
        assert!(m.is_empty());
    }

    /// Invariant: `put_if_absent` leaves a present value untouched.
    #[test]
    fn put_if_absent_semantics() {
        let mut m: TreeHashMap<&'static str, i32> = TreeHashMap::new();
        assert_eq!(m.put_if_absent("k", 1), None);
        assert_eq!(m.put_if_absent("k", 2), Some(&1));
        assert_eq!(m.get(&"k"), Some(&1));
        assert_eq!(m.len(), 1);
    }

    /// Invariant: `get_mut` edits in place without structural change.
    #[test]
    fn get_mut_updates_value() {
        let mut m: TreeHashMap<u32, u32> = TreeHashMap::new();
        m.put(1, 10);
        *m.get_mut(&1).unwrap() += 5;
        assert_eq!(m.get(&1), Some(&15));
        assert!(m.get_mut(&2).is_none());
        assert_eq!(m.len(), 1);
    }

    /// Invariant: lookups on a never-allocated map are misses, not panics.
    #[test]
    fn empty_map_operations() {
        let mut m: TreeHashMap<u32, u32> = TreeHashMap::new();
        assert_eq!(m.capacity(), 0);
        assert_eq!(m.get(&1), None);
        assert!(!m.contains_key(&1));
        assert_eq!(m.remove(&1), None);
        assert_eq!(m.bucket_shape(&1), BucketShape::Empty);
        assert_eq!(m.check_invariants(), Ok(()));
    }

    /// Invariant: a constant hasher forces one bucket; it becomes a tree once
    /// the table reaches `MIN_TREEIFY_CAPACITY`, and every key stays reachable.
    #[test]
    fn total_collision_treeifies() {
        let mut m: TreeHashMap<String, usize, ConstBuildHasher> =
            TreeHashMap::with_hasher(ConstBuildHasher);
        for i in 0..100 {
            m.put(format!("k{i}"), i);
            assert_eq!(m.check_invariants(), Ok(()));
        }
        assert_eq!(m.bucket_shape("k0"), BucketShape::Tree(100));
        for i in 0..100 {
            assert_eq!(m.get(format!("k{i}").as_str()), Some(&i));
        }
        for i in (0..100).step_by(2) {
            assert_eq!(m.remove(format!("k{i}").as_str()), Some(i));
            assert_eq!(m.check_invariants(), Ok(()));
        }
        assert_eq!(m.len(), 50);
        for i in 0..100 {
            assert_eq!(m.contains_key(format!("k{i}").as_str()), i % 2 == 1);
        }
    }

    /// Invariant: with a key order, colliding keys are still found and
    /// invariants hold.
    #[test]
    fn ordered_collisions() {
        let mut m: TreeHashMap<u32, u32, ConstBuildHasher, ByOrd> =
            TreeHashMap::ordered_with_hasher(ConstBuildHasher);
        for k in (0..200u32).rev() {
            m.put(k, k * 2);
        }
        assert_eq!(m.check_invariants(), Ok(()));
        assert!(matches!(m.bucket_shape(&0), BucketShape::Tree(200)));
        for k in 0..200u32 {
            assert_eq!(m.get(&k), Some(&(k * 2)));
        }
        assert_eq!(m.get(&500), None);
        assert_eq!(m.put(17, 0), Some(34));
        assert_eq!(m.len(), 200);
        for k in (0..200u32).step_by(3) {
            assert_eq!(m.remove(&k), Some(if k == 17 { 0 } else { k * 2 }));
            assert_eq!(m.check_invariants(), Ok(()));
        }
        for k in 0..200u32 {
            assert_eq!(m.contains_key(&k), k % 3 != 0);
        }
    }

    /// Invariant: an ordered map answers borrowed `&str` lookups through the
    /// `str` order, which agrees with the `String` order used for placement.
    #[test]
    fn ordered_borrowed_lookup() {
        let mut m: TreeHashMap<String, usize, ConstBuildHasher, ByOrd> =
            TreeHashMap::ordered_with_hasher(ConstBuildHasher);
        for i in 0..64 {
            m.put(format!("key{i:02}"), i);
        }
        for i in 0..64 {
            assert_eq!(m.get(format!("key{i:02}").as_str()), Some(&i));
        }
        assert!(!m.contains_key("key99"));
        assert_eq!(m.remove("key10"), Some(10));
        assert_eq!(m.get("key10"), None);
        assert_eq!(m.check_invariants(), Ok(()));
    }

    /// Invariant: a comparison-function order (here reversed) places and
    /// finds colliding keys.
    #[test]
    fn function_order_collisions() {
        let mut m: TreeHashMap<u32, u32, ConstBuildHasher, ByFn<u32>> =
            TreeHashMap::with_config_hasher_and_order(
                MapConfig::default(),
                ConstBuildHasher,
                ByFn::<u32>(|a, b| b.cmp(a)),
            )
            .unwrap();
        for k in 0..100u32 {
            m.put(k, k + 1);
        }
        assert_eq!(m.check_invariants(), Ok(()));
        for k in 0..100u32 {
            assert_eq!(m.get(&k), Some(&(k + 1)));
        }
        assert_eq!(m.remove(&40), Some(41));
        assert!(!m.contains_key(&40));
    }

    /// Invariant: a chain needs `TREEIFY_THRESHOLD` existing nodes before the
    /// append that converts it, and below capacity 64 the table grows instead.
    #[test]
    fn small_tables_grow_instead_of_treeifying() {
        let mut m: TreeHashMap<u32, u32, ConstBuildHasher> =
            TreeHashMap::with_hasher(ConstBuildHasher);
        for k in 0..TREEIFY_THRESHOLD as u32 {
            m.put(k, k);
        }
        assert_eq!(m.capacity(), 16);
        assert_eq!(m.bucket_shape(&0), BucketShape::Chain(8));
        m.put(8, 8);
        assert_eq!(m.capacity(), 32);
        assert_eq!(m.bucket_shape(&0), BucketShape::Chain(9));
        m.put(9, 9);
        assert_eq!(m.capacity(), 64);
        assert_eq!(m.bucket_shape(&0), BucketShape::Chain(10));
        m.put(10, 10);
        assert_eq!(m.capacity(), 64);
        assert_eq!(m.bucket_shape(&0), BucketShape::Tree(11));
    }

    #[test]
    fn invalid_load_factor_is_rejected() {
        assert_eq!(
            TreeHashMap::<u32, u32>::with_capacity_and_load_factor(16, 0.0).err(),
            Some(ConfigError::InvalidLoadFactor(0.0))
        );
        assert!(TreeHashMap::<u32, u32>::with_capacity_and_load_factor(16, f32::NAN).is_err());
        assert!(TreeHashMap::<u32, u32>::with_capacity_and_load_factor(16, 2.0).is_ok());
    }

    /// Invariant: iteration yields each live entry exactly once; `iter_mut`
    /// updates are visible to lookups.
    #[test]
    fn iteration_and_mutation() {
        let mut m: TreeHashMap<String, i32> = TreeHashMap::new();
        let keys = ["k1", "k2", "k3"];
        for (i, k) in keys.iter().enumerate() {
            m.put((*k).to_string(), i as i32);
        }
        let seen: BTreeSet<String> = m.iter().map(|(k, _)| k.clone()).collect();
        let expected: BTreeSet<String> = keys.iter().map(|s| (*s).to_string()).collect();
        assert_eq!(seen, expected);

        for (_k, v) in m.iter_mut() {
            *v += 10;
        }
        assert_eq!(m.get("k1"), Some(&10));
        assert_eq!(m.get("k2"), Some(&11));
        assert_eq!(m.get("k3"), Some(&12));
    }

    #[test]
    fn from_iterator_and_debug() {
        let m: TreeHashMap<u8, char> = [(1u8, 'a'), (2, 'b'), (1, 'c')].into_iter().collect();
        assert_eq!(m.len(), 2);
        assert_eq!(m.get(&1), Some(&'c'));
        let s = format!("{m:?}");
        assert!(s.contains("1: 'c'") && s.contains("2: 'b'"), "{s}");
    }

    /// Invariant: `remove_entry` hands back the originally stored key.
    #[test]
    fn remove_entry_returns_original_key() {
        let mut m: TreeHashMap<String, u8> = TreeHashMap::new();
        m.put("x".to_string(), 1);
        m.put("x".to_string(), 2);
        assert_eq!(m.remove_entry("x"), Some(("x".to_string(), 2)));
        assert_eq!(m.remove_entry("x"), None);
    }
}
