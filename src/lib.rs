//! tree-hashmap: a single-threaded hash map whose overfull buckets turn
//! into red-black trees. With an ordered map (`TreeHashMap::ordered`),
//! heavy hash collisions degrade lookups to O(log n) instead of O(n).
//!
//! Internal Design:
//!
//! Summary
//! - Goal: keep the common case a plain chained hash table and only pay
//!   for balanced-tree bookkeeping in buckets that actually collide.
//! - Layers:
//!   - `node`: one arena (`SlotMap`) owns every entry. Chain and tree
//!     links are `NodeKey`s into it, so converting a bucket never moves
//!     an entry.
//!   - `rbtree`: rotations and insert/delete rebalancing over the arena.
//!   - `table`: the bucket array, the resize policy and chain buckets.
//!   - `tree_bin`: tree buckets (treeify, untreeify, split on resize,
//!     insert and remove with successor swap).
//!   - `order`: the key ordering a map is built with (`Unordered`,
//!     `ByOrd`, `ByFn`).
//!   - `map`: the public `TreeHashMap` facade that owns the hasher and the
//!     ordering.
//!
//! Buckets
//! - Empty, a chain in insertion order, or a tree. A tree bucket keeps its
//!   nodes on a doubly linked list as well; the root is always the list
//!   head, so iteration and splitting never need to walk the tree.
//! - A chain is converted when an insertion appends to a chain that
//!   already holds `TREEIFY_THRESHOLD` nodes. While the table is smaller
//!   than `MIN_TREEIFY_CAPACITY` the table doubles instead.
//! - A tree reverts to a chain when a resize split leaves
//!   `UNTREEIFY_THRESHOLD` or fewer nodes in a half, or when removal
//!   leaves a tree too shallow to be worth keeping.
//!
//! Tree order
//! - Nodes are ordered by stored hash, then by the map's key ordering,
//!   then by insertion sequence. Keys are only required to be `Ord` for
//!   `ByOrd` maps.
//! - Lookups check hash and `Eq` at each candidate. On a hash tie an
//!   ordered map compares the query against the stored key and descends
//!   one side; `ByOrd` does this through `Q: Ord`, so borrowed lookups stay
//!   logarithmic too. An `Unordered` map searches both subtrees.
//!
//! Hasher and growth
//! - Each node stores its folded 32-bit hash; `K: Hash` never runs after
//!   insertion. Bucket index is `hash & (capacity - 1)` and capacity is
//!   always a power of two up to `MAXIMUM_CAPACITY`.
//! - The table allocates lazily on first insertion and doubles once the
//!   entry count exceeds `capacity * load_factor`.
//!
//! Notes and non-goals
//! - Single-threaded; no interior mutability, no concurrent access.
//! - No null keys; use `Option<K>` as the key type instead.
//! - No ordered iteration and no entry API.
//! - `check_invariants` is public so tests and debug tooling can validate
//!   the whole structure. Debug builds also validate every tree bucket
//!   after each mutation.

mod config;
mod error;
mod hash;
mod invariants;
mod map;
mod map_proptest;
mod node;
mod order;
mod rbtree;
mod table;
mod tree_bin;

// Public surface
pub use config::{
    KeyOrder, MapConfig, DEFAULT_INITIAL_CAPACITY, DEFAULT_LOAD_FACTOR, MAXIMUM_CAPACITY,
    MIN_TREEIFY_CAPACITY, TREEIFY_THRESHOLD, UNTREEIFY_THRESHOLD,
};
pub use error::{ConfigError, InvariantError};
pub use hash::{fold, index_for, spread, table_size_for};
pub use map::{BucketShape, Iter, IterMut, TreeHashMap};
pub use order::{ByFn, ByOrd, KeyOrdering, QueryOrdering, Unordered};
