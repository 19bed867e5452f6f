//! Bucket table: the bucket array, its growth policy, and the chain half of
//! lookup/insert/remove. Tree buckets are delegated to `tree_bin`.

use crate::config::{
    KeyOrder, DEFAULT_INITIAL_CAPACITY, MAXIMUM_CAPACITY, MIN_TREEIFY_CAPACITY, TREEIFY_THRESHOLD,
};
use crate::hash::{index_for, table_size_for};
use crate::node::{Node, NodeKey, Nodes, TreeLinks};
use crate::tree_bin::{Direction, TreeSlot};
use core::borrow::Borrow;
use slotmap::SlotMap;
use tracing::{debug, trace};

/// One slot of the bucket array. A tree bucket names its root, which is
/// also kept at the head of the bucket's node list.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub(crate) enum Bucket {
    #[default]
    Empty,
    Chain(NodeKey),
    Tree(NodeKey),
}

/// Outcome of `Table::put_val`.
pub(crate) enum Put<V> {
    Inserted,
    Replaced(V),
    /// `only_if_absent` found the key; the offered value was dropped.
    Kept(NodeKey),
}

/// Where an insertion lands, computed before the key is moved.
enum Slot {
    Vacant,
    Existing(NodeKey),
    ChainTail {
        tail: NodeKey,
        len: usize,
    },
    TreeLeaf {
        root: NodeKey,
        parent: NodeKey,
        go_left: bool,
    },
}

pub(crate) struct Table<K, V> {
    pub(crate) nodes: Nodes<K, V>,
    pub(crate) buckets: Vec<Bucket>,
    /// Size above which the table grows. Before the first allocation it
    /// holds the requested initial capacity, or 0 for the default.
    pub(crate) threshold: usize,
    pub(crate) load_factor: f32,
    pub(crate) key_order: Option<KeyOrder<K>>,
    /// Capacity past which the table stops growing; `MAXIMUM_CAPACITY`
    /// outside of tests.
    pub(crate) max_capacity: usize,
    next_seq: u64,
}

impl<K, V> Table<K, V> {
    pub(crate) fn new(
        initial_capacity: Option<usize>,
        load_factor: f32,
        key_order: Option<KeyOrder<K>>,
    ) -> Self {
        Self {
            nodes: SlotMap::with_key(),
            buckets: Vec::new(),
            threshold: initial_capacity.map_or(0, table_size_for),
            load_factor,
            key_order,
            max_capacity: MAXIMUM_CAPACITY,
            next_seq: 0,
        }
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.nodes.len()
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.buckets.len()
    }

    /// Sequence number the next allocated node will carry.
    #[inline]
    pub(crate) fn pending_seq(&self) -> u64 {
        self.next_seq
    }

    pub(crate) fn alloc(&mut self, hash: u32, key: K, value: V) -> NodeKey {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.nodes.insert(Node::new(hash, key, value, seq))
    }

    /// Grow to twice the capacity (or allocate the first table) and
    /// redistribute every bucket.
    pub(crate) fn resize(&mut self) {
        let old_cap = self.capacity();
        let old_thr = self.threshold;
        let mut new_thr = 0usize;
        let new_cap = if old_cap > 0 {
            if old_cap >= self.max_capacity {
                self.threshold = usize::MAX;
                debug!(capacity = old_cap, "bucket table at maximum capacity");
                return;
            }
            let doubled = old_cap << 1;
            if doubled < self.max_capacity && old_cap >= DEFAULT_INITIAL_CAPACITY {
                new_thr = old_thr.saturating_mul(2);
            }
            doubled
        } else if old_thr > 0 {
            old_thr
        } else {
            DEFAULT_INITIAL_CAPACITY
        };
        if new_thr == 0 {
            let ft = new_cap as f32 * self.load_factor;
            new_thr = if new_cap < self.max_capacity && ft < self.max_capacity as f32 {
                ft as usize
            } else {
                usize::MAX
            };
        }
        self.threshold = new_thr;

        let old = core::mem::replace(&mut self.buckets, vec![Bucket::Empty; new_cap]);
        debug!(
            old_capacity = old_cap,
            new_capacity = new_cap,
            threshold = new_thr,
            "resized bucket table"
        );
        for (j, bucket) in old.into_iter().enumerate() {
            match bucket {
                Bucket::Empty => {}
                Bucket::Chain(head) if self.nodes[head].next.is_none() => {
                    let hash = self.nodes[head].hash;
                    self.buckets[index_for(hash, new_cap)] = Bucket::Chain(head);
                }
                Bucket::Chain(head) => self.split_chain(head, j, old_cap),
                Bucket::Tree(root) => self.split_tree(root, j, old_cap),
            }
        }
    }

    /// Partition a chain by `hash & bit`, preserving relative order. Nodes
    /// with the bit clear stay at `index`, the rest move to `index + bit`.
    fn split_chain(&mut self, head: NodeKey, index: usize, bit: usize) {
        let (mut lo_head, mut lo_tail) = (None, None);
        let (mut hi_head, mut hi_tail) = (None, None);
        let mut e = Some(head);
        while let Some(n) = e {
            e = self.nodes[n].next;
            let (h, t) = if (self.nodes[n].hash as usize) & bit == 0 {
                (&mut lo_head, &mut lo_tail)
            } else {
                (&mut hi_head, &mut hi_tail)
            };
            match *t {
                None => *h = Some(n),
                Some(tail) => self.nodes[tail].next = Some(n),
            }
            *t = Some(n);
        }
        if let (Some(h), Some(t)) = (lo_head, lo_tail) {
            self.nodes[t].next = None;
            self.buckets[index] = Bucket::Chain(h);
        }
        if let (Some(h), Some(t)) = (hi_head, hi_tail) {
            self.nodes[t].next = None;
            self.buckets[index + bit] = Bucket::Chain(h);
        }
    }

    pub(crate) fn chain_len(&self, head: NodeKey) -> usize {
        let mut n = 0;
        let mut e = Some(head);
        while let Some(k) = e {
            n += 1;
            e = self.nodes[k].next;
        }
        n
    }
}

impl<K: Eq, V> Table<K, V> {
    #[inline]
    pub(crate) fn matches<Q>(&self, n: NodeKey, hash: u32, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let node = &self.nodes[n];
        node.hash == hash && node.key.borrow() == key
    }

    /// `dir_of` orders `key` against stored keys when the map has a key
    /// order; tree buckets then descend one side on hash ties.
    pub(crate) fn get_node<Q>(
        &self,
        hash: u32,
        key: &Q,
        dir_of: Option<Direction<'_, K>>,
    ) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let cap = self.capacity();
        if cap == 0 {
            return None;
        }
        match self.buckets[index_for(hash, cap)] {
            Bucket::Empty => None,
            Bucket::Tree(root) if self.matches(root, hash, key) => Some(root),
            Bucket::Tree(root) => self.find_in_tree(root, hash, key, dir_of),
            Bucket::Chain(head) => {
                let mut e = Some(head);
                while let Some(n) = e {
                    if self.matches(n, hash, key) {
                        return Some(n);
                    }
                    e = self.nodes[n].next;
                }
                None
            }
        }
    }

    fn locate(&self, index: usize, hash: u32, key: &K) -> Slot {
        match self.buckets[index] {
            Bucket::Empty => Slot::Vacant,
            Bucket::Tree(root) if self.matches(root, hash, key) => Slot::Existing(root),
            Bucket::Tree(root) => match self.probe_tree(root, hash, key) {
                TreeSlot::Found(n) => Slot::Existing(n),
                TreeSlot::Vacant { parent, go_left } => Slot::TreeLeaf {
                    root,
                    parent,
                    go_left,
                },
            },
            Bucket::Chain(head) => {
                let mut p = head;
                let mut len = 1;
                loop {
                    if self.matches(p, hash, key) {
                        return Slot::Existing(p);
                    }
                    match self.nodes[p].next {
                        Some(n) => {
                            p = n;
                            len += 1;
                        }
                        None => return Slot::ChainTail { tail: p, len },
                    }
                }
            }
        }
    }

    pub(crate) fn put_val(&mut self, hash: u32, key: K, value: V, only_if_absent: bool) -> Put<V> {
        if self.capacity() == 0 {
            self.resize();
        }
        let index = index_for(hash, self.capacity());
        match self.locate(index, hash, &key) {
            Slot::Existing(n) if only_if_absent => return Put::Kept(n),
            Slot::Existing(n) => {
                return Put::Replaced(core::mem::replace(&mut self.nodes[n].value, value));
            }
            Slot::Vacant => {
                let n = self.alloc(hash, key, value);
                self.buckets[index] = Bucket::Chain(n);
            }
            Slot::ChainTail { tail, len } => {
                let n = self.alloc(hash, key, value);
                self.nodes[tail].next = Some(n);
                if len >= TREEIFY_THRESHOLD {
                    self.treeify_bin(index);
                }
            }
            Slot::TreeLeaf {
                root,
                parent,
                go_left,
            } => {
                let n = self.alloc(hash, key, value);
                self.attach_tree_node(index, root, parent, go_left, n);
            }
        }
        if self.len() > self.threshold {
            self.resize();
        }
        Put::Inserted
    }

    pub(crate) fn remove_node<Q>(
        &mut self,
        hash: u32,
        key: &Q,
        dir_of: Option<Direction<'_, K>>,
    ) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let cap = self.capacity();
        if cap == 0 {
            return None;
        }
        let index = index_for(hash, cap);
        let target = match self.buckets[index] {
            Bucket::Empty => return None,
            Bucket::Tree(root) => {
                let n = if self.matches(root, hash, key) {
                    root
                } else {
                    self.find_in_tree(root, hash, key, dir_of)?
                };
                self.remove_tree_node(index, n);
                n
            }
            Bucket::Chain(head) => {
                let mut prev: Option<NodeKey> = None;
                let mut e = Some(head);
                let n = loop {
                    let n = e?;
                    if self.matches(n, hash, key) {
                        break n;
                    }
                    prev = Some(n);
                    e = self.nodes[n].next;
                };
                let next = self.nodes[n].next;
                match prev {
                    None => self.buckets[index] = next.map_or(Bucket::Empty, Bucket::Chain),
                    Some(p) => self.nodes[p].next = next,
                }
                n
            }
        };
        self.nodes.remove(target).map(|node| (node.key, node.value))
    }

    /// Convert the chain at `index` into a tree, or grow the table instead
    /// while it is below `MIN_TREEIFY_CAPACITY`.
    pub(crate) fn treeify_bin(&mut self, index: usize) {
        let cap = self.capacity();
        if cap < MIN_TREEIFY_CAPACITY {
            trace!(index, capacity = cap, "table too small to treeify; growing");
            self.resize();
            return;
        }
        let Bucket::Chain(head) = self.buckets[index] else {
            return;
        };
        let mut prev = None;
        let mut e = Some(head);
        let mut len = 0usize;
        while let Some(n) = e {
            self.nodes[n].tree = TreeLinks {
                prev,
                ..TreeLinks::detached()
            };
            prev = Some(n);
            e = self.nodes[n].next;
            len += 1;
        }
        trace!(index, len, "treeified bucket");
        self.treeify(index, head);
    }
}
