//! Arena nodes shared by chain and tree buckets.
//!
//! Every entry lives in one `SlotMap` slot for its whole lifetime; chain and
//! tree links are plain `NodeKey`s into that arena, so converting a bucket
//! between chain and tree never moves an entry.

use slotmap::{new_key_type, SlotMap};

new_key_type! {
    /// Stable arena index of a node.
    pub(crate) struct NodeKey;
}

pub(crate) type Nodes<K, V> = SlotMap<NodeKey, Node<K, V>>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Color {
    Red,
    Black,
}

/// Links that only mean something while the node sits in a tree bucket.
/// `prev` completes the doubly linked bucket list whose forward half is
/// `Node::next`.
#[derive(Copy, Clone, Debug)]
pub(crate) struct TreeLinks {
    pub(crate) parent: Option<NodeKey>,
    pub(crate) left: Option<NodeKey>,
    pub(crate) right: Option<NodeKey>,
    pub(crate) prev: Option<NodeKey>,
    pub(crate) color: Color,
}

impl TreeLinks {
    pub(crate) const fn detached() -> Self {
        Self {
            parent: None,
            left: None,
            right: None,
            prev: None,
            color: Color::Black,
        }
    }
}

#[derive(Debug)]
pub(crate) struct Node<K, V> {
    pub(crate) hash: u32,
    pub(crate) key: K,
    pub(crate) value: V,
    /// Next node in bucket order, for chains and trees alike.
    pub(crate) next: Option<NodeKey>,
    /// Insertion sequence number; last-resort tie-break between hash-equal keys.
    pub(crate) seq: u64,
    pub(crate) tree: TreeLinks,
}

impl<K, V> Node<K, V> {
    pub(crate) fn new(hash: u32, key: K, value: V, seq: u64) -> Self {
        Self {
            hash,
            key,
            value,
            next: None,
            seq,
            tree: TreeLinks::detached(),
        }
    }

    #[inline]
    pub(crate) fn is_red(&self) -> bool {
        self.tree.color == Color::Red
    }
}

/// Color lookup treating an absent child as black.
#[inline]
pub(crate) fn is_red<K, V>(nodes: &Nodes<K, V>, n: Option<NodeKey>) -> bool {
    n.map_or(false, |n| nodes[n].is_red())
}
