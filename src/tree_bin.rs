//! Tree buckets.
//!
//! A bucket that outgrows `TREEIFY_THRESHOLD` keeps its nodes on the same
//! doubly linked list (bucket order, `next`/`prev`) and overlays a red-black
//! tree on them. Nodes are ordered by hash, then by the optional key order,
//! then by insertion sequence. Lookups re-check real equality at every
//! candidate, so the last two only shape the tree.
//!
//! After every mutation the tree root is moved to the head of the list and
//! published in the bucket slot, so `Bucket::Tree(k)` names both.

use crate::config::UNTREEIFY_THRESHOLD;
use crate::node::{Color, NodeKey, TreeLinks};
use crate::rbtree::{balance_deletion, balance_insertion};
use crate::table::{Bucket, Table};
use core::borrow::Borrow;
use core::cmp::Ordering;
use tracing::trace;

/// Where `probe_tree` would put a key.
pub(crate) enum TreeSlot {
    Found(NodeKey),
    Vacant { parent: NodeKey, go_left: bool },
}

/// Direction of the probed key relative to a stored key, from the key order.
pub(crate) type Direction<'a, K> = &'a dyn Fn(&K) -> Ordering;

/// Deterministic last-resort order between two hash-equal keys that the
/// key order (if any) cannot separate.
#[inline]
fn tie_break(a_seq: u64, b_seq: u64) -> Ordering {
    if a_seq <= b_seq {
        Ordering::Less
    } else {
        Ordering::Greater
    }
}

impl<K, V> Table<K, V> {
    pub(crate) fn root_of(&self, mut n: NodeKey) -> NodeKey {
        while let Some(p) = self.nodes[n].tree.parent {
            n = p;
        }
        n
    }

    /// Put `root` at the head of the bucket list whose current head is
    /// `first`, and publish it as the bucket's tree.
    pub(crate) fn move_root_to_front(&mut self, index: usize, first: NodeKey, root: NodeKey) {
        if root != first {
            let rn = self.nodes[root].next;
            let rp = self.nodes[root].tree.prev;
            if let Some(rn) = rn {
                self.nodes[rn].tree.prev = rp;
            }
            if let Some(rp) = rp {
                self.nodes[rp].next = rn;
            }
            self.nodes[first].tree.prev = Some(root);
            self.nodes[root].next = Some(first);
            self.nodes[root].tree.prev = None;
        }
        self.buckets[index] = Bucket::Tree(root);
        debug_assert_eq!(self.check_tree(index, root).err(), None);
    }

    /// Build a tree over the list starting at `head`, whose `prev` links
    /// are already in place.
    pub(crate) fn treeify(&mut self, index: usize, head: NodeKey) {
        let order = self.key_order;
        let mut root: Option<NodeKey> = None;
        let mut x = Some(head);
        while let Some(xk) = x {
            x = self.nodes[xk].next;
            self.nodes[xk].tree.left = None;
            self.nodes[xk].tree.right = None;
            let Some(r) = root else {
                self.nodes[xk].tree.parent = None;
                self.nodes[xk].tree.color = Color::Black;
                root = Some(xk);
                continue;
            };
            let (h, seq) = (self.nodes[xk].hash, self.nodes[xk].seq);
            let mut p = r;
            loop {
                let pn = &self.nodes[p];
                let dir = match pn.hash.cmp(&h) {
                    Ordering::Greater => Ordering::Less,
                    Ordering::Less => Ordering::Greater,
                    Ordering::Equal => {
                        match order.map_or(Ordering::Equal, |o| o(&self.nodes[xk].key, &pn.key)) {
                            Ordering::Equal => tie_break(seq, pn.seq),
                            d => d,
                        }
                    }
                };
                let child = if dir == Ordering::Greater {
                    pn.tree.right
                } else {
                    pn.tree.left
                };
                match child {
                    Some(c) => p = c,
                    None => {
                        self.nodes[xk].tree.parent = Some(p);
                        if dir == Ordering::Greater {
                            self.nodes[p].tree.right = Some(xk);
                        } else {
                            self.nodes[p].tree.left = Some(xk);
                        }
                        root = Some(balance_insertion(&mut self.nodes, r, xk));
                        break;
                    }
                }
            }
        }
        if let Some(root) = root {
            self.move_root_to_front(index, head, root);
        }
    }

    /// Drop the tree overlay; the list order becomes the chain order.
    pub(crate) fn untreeify(&mut self, head: NodeKey) -> Bucket {
        let mut e = Some(head);
        while let Some(n) = e {
            self.nodes[n].tree = TreeLinks::detached();
            e = self.nodes[n].next;
        }
        Bucket::Chain(head)
    }

    /// Partition a tree bucket's list by `hash & bit` during a resize. Each
    /// half becomes a chain when small enough, otherwise a tree; a half that
    /// received every node keeps the existing tree as is.
    pub(crate) fn split_tree(&mut self, head: NodeKey, index: usize, bit: usize) {
        let (mut lo_head, mut lo_tail, mut lc) = (None, None, 0usize);
        let (mut hi_head, mut hi_tail, mut hc) = (None, None, 0usize);
        let mut e = Some(head);
        while let Some(n) = e {
            e = self.nodes[n].next;
            self.nodes[n].next = None;
            let (h, t, c) = if (self.nodes[n].hash as usize) & bit == 0 {
                (&mut lo_head, &mut lo_tail, &mut lc)
            } else {
                (&mut hi_head, &mut hi_tail, &mut hc)
            };
            self.nodes[n].tree.prev = *t;
            match *t {
                None => *h = Some(n),
                Some(tail) => self.nodes[tail].next = Some(n),
            }
            *t = Some(n);
            *c += 1;
        }

        for (half, count, at, other_empty) in [
            (lo_head, lc, index, hi_head.is_none()),
            (hi_head, hc, index + bit, lo_head.is_none()),
        ] {
            let Some(half) = half else { continue };
            if count <= UNTREEIFY_THRESHOLD {
                trace!(index = at, len = count, "untreeified bucket on split");
                self.buckets[at] = self.untreeify(half);
            } else if other_empty {
                self.buckets[at] = Bucket::Tree(half);
            } else {
                self.treeify(at, half);
            }
        }
    }
}

impl<K: Eq, V> Table<K, V> {
    /// Search the subtree at `start` for `key`. `dir_of` orders the key
    /// against stored keys when a key order is available; without it, or
    /// when it cannot decide, both subtrees are searched.
    pub(crate) fn find_in_tree<Q>(
        &self,
        start: NodeKey,
        hash: u32,
        key: &Q,
        dir_of: Option<Direction<'_, K>>,
    ) -> Option<NodeKey>
    where
        K: Borrow<Q>,
        Q: ?Sized + Eq,
    {
        let mut p = Some(start);
        while let Some(pk) = p {
            let node = &self.nodes[pk];
            let (pl, pr) = (node.tree.left, node.tree.right);
            if node.hash > hash {
                p = pl;
            } else if node.hash < hash {
                p = pr;
            } else if node.key.borrow() == key {
                return Some(pk);
            } else if pl.is_none() {
                p = pr;
            } else if pr.is_none() {
                p = pl;
            } else {
                match dir_of.map_or(Ordering::Equal, |d| d(&node.key)) {
                    Ordering::Less => p = pl,
                    Ordering::Greater => p = pr,
                    Ordering::Equal => {
                        if let Some(q) = pr.and_then(|r| self.find_in_tree(r, hash, key, dir_of)) {
                            return Some(q);
                        }
                        p = pl;
                    }
                }
            }
        }
        None
    }

    /// Find `key` in the tree rooted at `root`, or the leaf position a new
    /// node for it would take.
    pub(crate) fn probe_tree(&self, root: NodeKey, hash: u32, key: &K) -> TreeSlot {
        let order = self.key_order;
        let by_order = move |pk: &K| order.map_or(Ordering::Equal, |o| o(key, pk));
        let dir_of: Option<Direction<'_, K>> = order.map(|_| &by_order as Direction<'_, K>);
        let new_seq = self.pending_seq();
        let mut searched = false;
        let mut p = root;
        loop {
            let node = &self.nodes[p];
            let dir = match node.hash.cmp(&hash) {
                Ordering::Greater => Ordering::Less,
                Ordering::Less => Ordering::Greater,
                Ordering::Equal if node.key == *key => return TreeSlot::Found(p),
                Ordering::Equal => match dir_of.map_or(Ordering::Equal, |d| d(&node.key)) {
                    Ordering::Equal => {
                        // Hash-equal keys may sit on either side; look once
                        // before committing to the tie-break direction.
                        if !searched {
                            searched = true;
                            let hit = node
                                .tree
                                .left
                                .and_then(|l| self.find_in_tree(l, hash, key, dir_of))
                                .or_else(|| {
                                    node.tree
                                        .right
                                        .and_then(|r| self.find_in_tree(r, hash, key, dir_of))
                                });
                            if let Some(q) = hit {
                                return TreeSlot::Found(q);
                            }
                        }
                        tie_break(new_seq, node.seq)
                    }
                    d => d,
                },
            };
            let child = if dir == Ordering::Greater {
                node.tree.right
            } else {
                node.tree.left
            };
            match child {
                Some(c) => p = c,
                None => {
                    return TreeSlot::Vacant {
                        parent: p,
                        go_left: dir != Ordering::Greater,
                    }
                }
            }
        }
    }

    /// Link freshly allocated node `x` as a leaf under `parent` and right
    /// after `parent` in bucket order, then rebalance.
    pub(crate) fn attach_tree_node(
        &mut self,
        index: usize,
        root: NodeKey,
        parent: NodeKey,
        go_left: bool,
        x: NodeKey,
    ) {
        let xpn = self.nodes[parent].next;
        self.nodes[x].next = xpn;
        self.nodes[x].tree = TreeLinks {
            parent: Some(parent),
            prev: Some(parent),
            ..TreeLinks::detached()
        };
        if go_left {
            self.nodes[parent].tree.left = Some(x);
        } else {
            self.nodes[parent].tree.right = Some(x);
        }
        self.nodes[parent].next = Some(x);
        if let Some(n) = xpn {
            self.nodes[n].tree.prev = Some(x);
        }
        let new_root = balance_insertion(&mut self.nodes, root, x);
        self.move_root_to_front(index, root, new_root);
    }

    /// Unlink `p` from the list and the tree of bucket `index`. The node
    /// stays in the arena; the caller frees it.
    pub(crate) fn remove_tree_node(&mut self, index: usize, p: NodeKey) {
        let Bucket::Tree(head) = self.buckets[index] else {
            return;
        };
        let succ = self.nodes[p].next;
        let pred = self.nodes[p].tree.prev;
        let first = match pred {
            None => succ,
            Some(pr) => {
                self.nodes[pr].next = succ;
                Some(head)
            }
        };
        if let Some(s) = succ {
            self.nodes[s].tree.prev = pred;
        }
        let Some(first) = first else {
            self.buckets[index] = Bucket::Empty;
            return;
        };

        let mut root = self.root_of(head);
        // A root missing either child, or a left child without its own
        // left child, bounds the tree to a handful of nodes.
        let too_small = match (self.nodes[root].tree.left, self.nodes[root].tree.right) {
            (Some(rl), Some(_)) => self.nodes[rl].tree.left.is_none(),
            _ => true,
        };
        if too_small {
            trace!(index, "untreeified bucket on removal");
            self.buckets[index] = self.untreeify(first);
            return;
        }

        let (pl, pr) = (self.nodes[p].tree.left, self.nodes[p].tree.right);
        let replacement = match (pl, pr) {
            (Some(pl), Some(pr)) => {
                let mut s = pr;
                while let Some(sl) = self.nodes[s].tree.left {
                    s = sl;
                }
                let c = self.nodes[s].tree.color;
                self.nodes[s].tree.color = self.nodes[p].tree.color;
                self.nodes[p].tree.color = c;
                let sr = self.nodes[s].tree.right;
                let pp = self.nodes[p].tree.parent;
                if s == pr {
                    self.nodes[p].tree.parent = Some(s);
                    self.nodes[s].tree.right = Some(p);
                } else {
                    let sp = self.nodes[s].tree.parent;
                    self.nodes[p].tree.parent = sp;
                    if let Some(sp) = sp {
                        if self.nodes[sp].tree.left == Some(s) {
                            self.nodes[sp].tree.left = Some(p);
                        } else {
                            self.nodes[sp].tree.right = Some(p);
                        }
                    }
                    self.nodes[s].tree.right = Some(pr);
                    self.nodes[pr].tree.parent = Some(s);
                }
                self.nodes[p].tree.left = None;
                self.nodes[p].tree.right = sr;
                if let Some(sr) = sr {
                    self.nodes[sr].tree.parent = Some(p);
                }
                self.nodes[s].tree.left = Some(pl);
                self.nodes[pl].tree.parent = Some(s);
                self.nodes[s].tree.parent = pp;
                match pp {
                    None => root = s,
                    Some(pp) if self.nodes[pp].tree.left == Some(p) => {
                        self.nodes[pp].tree.left = Some(s)
                    }
                    Some(pp) => self.nodes[pp].tree.right = Some(s),
                }
                sr.unwrap_or(p)
            }
            (Some(pl), None) => pl,
            (None, Some(pr)) => pr,
            (None, None) => p,
        };

        if replacement != p {
            let pp = self.nodes[p].tree.parent;
            self.nodes[replacement].tree.parent = pp;
            match pp {
                None => root = replacement,
                Some(pp) if self.nodes[pp].tree.left == Some(p) => {
                    self.nodes[pp].tree.left = Some(replacement)
                }
                Some(pp) => self.nodes[pp].tree.right = Some(replacement),
            }
            let t = &mut self.nodes[p].tree;
            t.left = None;
            t.right = None;
            t.parent = None;
        }

        let r = if self.nodes[p].is_red() {
            root
        } else {
            balance_deletion(&mut self.nodes, root, replacement)
        };

        if replacement == p {
            if let Some(pp) = self.nodes[p].tree.parent.take() {
                if self.nodes[pp].tree.left == Some(p) {
                    self.nodes[pp].tree.left = None;
                } else if self.nodes[pp].tree.right == Some(p) {
                    self.nodes[pp].tree.right = None;
                }
            }
        }
        self.move_root_to_front(index, first, r);
    }
}
