//! Structural self-checks.
//!
//! `check_tree` validates one tree bucket and runs after every tree
//! mutation in debug builds. `check_all` walks the whole table and backs
//! `TreeHashMap::check_invariants`.

use crate::error::InvariantError;
use crate::hash::index_for;
use crate::node::{is_red, NodeKey};
use crate::table::{Bucket, Table};

impl<K, V> Table<K, V> {
    /// Validate the tree rooted at `root` in bucket `index` together with
    /// the bucket list hanging off it. Returns the node count.
    pub(crate) fn check_tree(&self, index: usize, root: NodeKey) -> Result<usize, InvariantError> {
        let r = &self.nodes[root].tree;
        if r.parent.is_some() {
            return Err(InvariantError::BrokenParentLink(index));
        }
        if r.prev.is_some() {
            return Err(InvariantError::RootNotFirst(index));
        }
        if self.nodes[root].is_red() {
            return Err(InvariantError::RedRoot(index));
        }

        // Forward walk of the list, bounded so a cycle cannot hang the check.
        let mut list = 0usize;
        let mut prev: Option<NodeKey> = None;
        let mut e = Some(root);
        while let Some(n) = e {
            if self.nodes[n].tree.prev != prev {
                return Err(InvariantError::BrokenListLink(index));
            }
            list += 1;
            if list > self.nodes.len() {
                return Err(InvariantError::BrokenListLink(index));
            }
            prev = Some(n);
            e = self.nodes[n].next;
        }

        let (tree, _) = self.check_subtree(index, root)?;
        if tree != list {
            return Err(InvariantError::MembershipMismatch {
                bucket: index,
                list,
                tree,
            });
        }
        Ok(tree)
    }

    /// Returns `(node count, black height)` of the subtree at `t`.
    fn check_subtree(&self, index: usize, t: NodeKey) -> Result<(usize, usize), InvariantError> {
        let node = &self.nodes[t];
        let (tl, tr) = (node.tree.left, node.tree.right);
        if let Some(l) = tl {
            if self.nodes[l].tree.parent != Some(t) {
                return Err(InvariantError::BrokenParentLink(index));
            }
            if self.nodes[l].hash > node.hash {
                return Err(InvariantError::HashOrder(index));
            }
        }
        if let Some(r) = tr {
            if self.nodes[r].tree.parent != Some(t) {
                return Err(InvariantError::BrokenParentLink(index));
            }
            if self.nodes[r].hash < node.hash {
                return Err(InvariantError::HashOrder(index));
            }
        }
        if node.is_red() && (is_red(&self.nodes, tl) || is_red(&self.nodes, tr)) {
            return Err(InvariantError::RedRed(index));
        }
        let (lc, lh) = match tl {
            Some(l) => self.check_subtree(index, l)?,
            None => (0, 1),
        };
        let (rc, rh) = match tr {
            Some(r) => self.check_subtree(index, r)?,
            None => (0, 1),
        };
        if lh != rh {
            return Err(InvariantError::BlackHeight(index));
        }
        Ok((lc + rc + 1, lh + usize::from(!node.is_red())))
    }

    pub(crate) fn check_all(&self) -> Result<(), InvariantError> {
        let cap = self.capacity();
        if cap != 0 && !cap.is_power_of_two() {
            return Err(InvariantError::CapacityNotPowerOfTwo(cap));
        }
        let mut counted = 0usize;
        for (i, bucket) in self.buckets.iter().enumerate() {
            let head = match *bucket {
                Bucket::Empty => continue,
                Bucket::Chain(head) => head,
                Bucket::Tree(root) => {
                    self.check_tree(i, root)?;
                    root
                }
            };
            let mut e = Some(head);
            while let Some(n) = e {
                let hash = self.nodes[n].hash;
                let expected = index_for(hash, cap);
                if expected != i {
                    return Err(InvariantError::MisplacedNode {
                        bucket: i,
                        hash,
                        expected,
                    });
                }
                counted += 1;
                if counted > self.nodes.len() {
                    return Err(InvariantError::BrokenListLink(i));
                }
                e = self.nodes[n].next;
            }
        }
        if counted != self.len() {
            return Err(InvariantError::SizeMismatch {
                reported: self.len(),
                counted,
            });
        }
        Ok(())
    }
}
