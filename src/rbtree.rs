//! Red-black rebalancing over arena nodes.
//!
//! These routines only touch `parent`/`left`/`right`/`color`. Each takes the
//! current root and returns the (possibly different) root afterwards; the
//! caller is responsible for publishing it in the bucket slot.

use crate::node::{is_red, Color, NodeKey, Nodes};

#[inline]
fn set_color<K, V>(nodes: &mut Nodes<K, V>, n: NodeKey, c: Color) {
    nodes[n].tree.color = c;
}

#[inline]
fn parent<K, V>(nodes: &Nodes<K, V>, n: NodeKey) -> Option<NodeKey> {
    nodes[n].tree.parent
}

#[inline]
fn left<K, V>(nodes: &Nodes<K, V>, n: NodeKey) -> Option<NodeKey> {
    nodes[n].tree.left
}

#[inline]
fn right<K, V>(nodes: &Nodes<K, V>, n: NodeKey) -> Option<NodeKey> {
    nodes[n].tree.right
}

pub(crate) fn rotate_left<K, V>(nodes: &mut Nodes<K, V>, mut root: NodeKey, p: NodeKey) -> NodeKey {
    let Some(r) = right(nodes, p) else {
        return root;
    };
    let rl = left(nodes, r);
    nodes[p].tree.right = rl;
    if let Some(rl) = rl {
        nodes[rl].tree.parent = Some(p);
    }
    let pp = parent(nodes, p);
    nodes[r].tree.parent = pp;
    match pp {
        None => {
            root = r;
            set_color(nodes, r, Color::Black);
        }
        Some(pp) if left(nodes, pp) == Some(p) => nodes[pp].tree.left = Some(r),
        Some(pp) => nodes[pp].tree.right = Some(r),
    }
    nodes[r].tree.left = Some(p);
    nodes[p].tree.parent = Some(r);
    root
}

pub(crate) fn rotate_right<K, V>(nodes: &mut Nodes<K, V>, mut root: NodeKey, p: NodeKey) -> NodeKey {
    let Some(l) = left(nodes, p) else {
        return root;
    };
    let lr = right(nodes, l);
    nodes[p].tree.left = lr;
    if let Some(lr) = lr {
        nodes[lr].tree.parent = Some(p);
    }
    let pp = parent(nodes, p);
    nodes[l].tree.parent = pp;
    match pp {
        None => {
            root = l;
            set_color(nodes, l, Color::Black);
        }
        Some(pp) if right(nodes, pp) == Some(p) => nodes[pp].tree.right = Some(l),
        Some(pp) => nodes[pp].tree.left = Some(l),
    }
    nodes[l].tree.right = Some(p);
    nodes[p].tree.parent = Some(l);
    root
}

/// Restore the red-black properties after `x` was attached as a leaf.
pub(crate) fn balance_insertion<K, V>(
    nodes: &mut Nodes<K, V>,
    mut root: NodeKey,
    mut x: NodeKey,
) -> NodeKey {
    set_color(nodes, x, Color::Red);
    loop {
        let Some(xp) = parent(nodes, x) else {
            set_color(nodes, x, Color::Black);
            return x;
        };
        if !nodes[xp].is_red() {
            return root;
        }
        let Some(xpp) = parent(nodes, xp) else {
            return root;
        };
        let xppl = left(nodes, xpp);
        if xppl == Some(xp) {
            let xppr = right(nodes, xpp);
            match xppr {
                Some(uncle) if nodes[uncle].is_red() => {
                    set_color(nodes, uncle, Color::Black);
                    set_color(nodes, xp, Color::Black);
                    set_color(nodes, xpp, Color::Red);
                    x = xpp;
                }
                _ => {
                    let inner = right(nodes, xp) == Some(x);
                    let (mut xp, mut xpp) = (Some(xp), Some(xpp));
                    if inner {
                        x = parent(nodes, x).unwrap_or(x);
                        root = rotate_left(nodes, root, x);
                        xp = parent(nodes, x);
                        xpp = xp.and_then(|xp| parent(nodes, xp));
                    }
                    if let Some(xp) = xp {
                        set_color(nodes, xp, Color::Black);
                        if let Some(xpp) = xpp {
                            set_color(nodes, xpp, Color::Red);
                            root = rotate_right(nodes, root, xpp);
                        }
                    }
                }
            }
        } else {
            match xppl {
                Some(uncle) if nodes[uncle].is_red() => {
                    set_color(nodes, uncle, Color::Black);
                    set_color(nodes, xp, Color::Black);
                    set_color(nodes, xpp, Color::Red);
                    x = xpp;
                }
                _ => {
                    let inner = left(nodes, xp) == Some(x);
                    let (mut xp, mut xpp) = (Some(xp), Some(xpp));
                    if inner {
                        x = parent(nodes, x).unwrap_or(x);
                        root = rotate_right(nodes, root, x);
                        xp = parent(nodes, x);
                        xpp = xp.and_then(|xp| parent(nodes, xp));
                    }
                    if let Some(xp) = xp {
                        set_color(nodes, xp, Color::Black);
                        if let Some(xpp) = xpp {
                            set_color(nodes, xpp, Color::Red);
                            root = rotate_left(nodes, root, xpp);
                        }
                    }
                }
            }
        }
    }
}

/// Restore the red-black properties after a black node was removed and `x`
/// took its place. `x` may still be the removed node itself when it had no
/// children; it is detached by the caller afterwards.
pub(crate) fn balance_deletion<K, V>(
    nodes: &mut Nodes<K, V>,
    mut root: NodeKey,
    x: NodeKey,
) -> NodeKey {
    let mut x = Some(x);
    loop {
        let Some(xk) = x else {
            return root;
        };
        if xk == root {
            return root;
        }
        let Some(xp0) = parent(nodes, xk) else {
            set_color(nodes, xk, Color::Black);
            return xk;
        };
        if nodes[xk].is_red() {
            set_color(nodes, xk, Color::Black);
            return root;
        }
        let mut xp = Some(xp0);
        if left(nodes, xp0) == Some(xk) {
            let mut xpr = right(nodes, xp0);
            if let Some(s) = xpr.filter(|&s| nodes[s].is_red()) {
                set_color(nodes, s, Color::Black);
                set_color(nodes, xp0, Color::Red);
                root = rotate_left(nodes, root, xp0);
                xp = parent(nodes, xk);
                xpr = xp.and_then(|xp| right(nodes, xp));
            }
            let Some(s) = xpr else {
                x = xp;
                continue;
            };
            let sl = left(nodes, s);
            let sr = right(nodes, s);
            if !is_red(nodes, sr) && !is_red(nodes, sl) {
                set_color(nodes, s, Color::Red);
                x = xp;
                continue;
            }
            let mut xpr = Some(s);
            if !is_red(nodes, sr) {
                if let Some(sl) = sl {
                    set_color(nodes, sl, Color::Black);
                }
                set_color(nodes, s, Color::Red);
                root = rotate_right(nodes, root, s);
                xp = parent(nodes, xk);
                xpr = xp.and_then(|xp| right(nodes, xp));
            }
            if let Some(s) = xpr {
                let c = match xp {
                    Some(xp) => nodes[xp].tree.color,
                    None => Color::Black,
                };
                set_color(nodes, s, c);
                if let Some(sr) = right(nodes, s) {
                    set_color(nodes, sr, Color::Black);
                }
            }
            if let Some(xp) = xp {
                set_color(nodes, xp, Color::Black);
                root = rotate_left(nodes, root, xp);
            }
            x = Some(root);
        } else {
            let mut xpl = left(nodes, xp0);
            if let Some(s) = xpl.filter(|&s| nodes[s].is_red()) {
                set_color(nodes, s, Color::Black);
                set_color(nodes, xp0, Color::Red);
                root = rotate_right(nodes, root, xp0);
                xp = parent(nodes, xk);
                xpl = xp.and_then(|xp| left(nodes, xp));
            }
            let Some(s) = xpl else {
                x = xp;
                continue;
            };
            let sl = left(nodes, s);
            let sr = right(nodes, s);
            if !is_red(nodes, sl) && !is_red(nodes, sr) {
                set_color(nodes, s, Color::Red);
                x = xp;
                continue;
            }
            let mut xpl = Some(s);
            if !is_red(nodes, sl) {
                if let Some(sr) = sr {
                    set_color(nodes, sr, Color::Black);
                }
                set_color(nodes, s, Color::Red);
                root = rotate_left(nodes, root, s);
                xp = parent(nodes, xk);
                xpl = xp.and_then(|xp| left(nodes, xp));
            }
            if let Some(s) = xpl {
                let c = match xp {
                    Some(xp) => nodes[xp].tree.color,
                    None => Color::Black,
                };
                set_color(nodes, s, c);
                if let Some(sl) = left(nodes, s) {
                    set_color(nodes, sl, Color::Black);
                }
            }
            if let Some(xp) = xp {
                set_color(nodes, xp, Color::Black);
                root = rotate_right(nodes, root, xp);
            }
            x = Some(root);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::Node;
    use slotmap::SlotMap;

    fn black_height(nodes: &Nodes<u32, ()>, n: Option<NodeKey>) -> usize {
        let Some(n) = n else { return 1 };
        let node = &nodes[n];
        if node.is_red() {
            assert!(!is_red(nodes, node.tree.left), "red node with red left child");
            assert!(!is_red(nodes, node.tree.right), "red node with red right child");
        }
        for c in [node.tree.left, node.tree.right].into_iter().flatten() {
            assert_eq!(nodes[c].tree.parent, Some(n), "broken parent link");
        }
        let l = black_height(nodes, node.tree.left);
        let r = black_height(nodes, node.tree.right);
        assert_eq!(l, r, "unequal black height");
        l + usize::from(!node.is_red())
    }

    fn in_order(nodes: &Nodes<u32, ()>, n: Option<NodeKey>, out: &mut Vec<u32>) {
        if let Some(n) = n {
            in_order(nodes, nodes[n].tree.left, out);
            out.push(nodes[n].hash);
            in_order(nodes, nodes[n].tree.right, out);
        }
    }

    /// Plain BST insert by hash followed by `balance_insertion`.
    fn insert(nodes: &mut Nodes<u32, ()>, root: Option<NodeKey>, h: u32) -> (NodeKey, NodeKey) {
        let x = nodes.insert(Node::new(h, h, (), h as u64));
        let Some(root) = root else {
            return (balance_insertion(nodes, x, x), x);
        };
        let mut p = root;
        loop {
            let go_left = h <= nodes[p].hash;
            let next = if go_left { nodes[p].tree.left } else { nodes[p].tree.right };
            match next {
                Some(n) => p = n,
                None => {
                    nodes[x].tree.parent = Some(p);
                    if go_left {
                        nodes[p].tree.left = Some(x);
                    } else {
                        nodes[p].tree.right = Some(x);
                    }
                    return (balance_insertion(nodes, root, x), x);
                }
            }
        }
    }

    /// Invariant: ascending, descending and zig-zag insertion orders all yield a
    /// valid red-black tree with a black root and sorted in-order traversal.
    #[test]
    fn insertion_keeps_red_black_shape() {
        let orders: Vec<Vec<u32>> = vec![
            (0..64).collect(),
            (0..64).rev().collect(),
            (0..32).flat_map(|i| [i, 63 - i]).collect(),
        ];
        for order in orders {
            let mut nodes: Nodes<u32, ()> = SlotMap::with_key();
            let mut root = None;
            for &h in &order {
                let (r, _) = insert(&mut nodes, root, h);
                root = Some(r);
                assert!(!nodes[r].is_red(), "root must be black");
                assert_eq!(nodes[r].tree.parent, None);
                black_height(&nodes, root);
            }
            let mut seen = Vec::new();
            in_order(&nodes, root, &mut seen);
            let mut expected = order.clone();
            expected.sort_unstable();
            assert_eq!(seen, expected);
        }
    }

    /// Invariant: rotations preserve in-order sequence and parent links; rotating
    /// at the root publishes the new root and paints it black.
    #[test]
    fn rotations_preserve_order() {
        let mut nodes: Nodes<u32, ()> = SlotMap::with_key();
        let mut root = None;
        for h in [4u32, 2, 6, 1, 3, 5, 7] {
            root = Some(insert(&mut nodes, root, h).0);
        }
        let r = root.unwrap();
        let mut before = Vec::new();
        in_order(&nodes, root, &mut before);

        let new_root = rotate_left(&mut nodes, r, r);
        assert_ne!(new_root, r);
        assert_eq!(nodes[new_root].tree.parent, None);
        assert!(!nodes[new_root].is_red());
        let mut after = Vec::new();
        in_order(&nodes, Some(new_root), &mut after);
        assert_eq!(before, after);

        let back = rotate_right(&mut nodes, new_root, new_root);
        assert_eq!(back, r);
        let mut again = Vec::new();
        in_order(&nodes, Some(back), &mut again);
        assert_eq!(before, again);
    }

    /// Invariant: rotating a node without the required child is a no-op.
    #[test]
    fn rotation_without_child_is_noop() {
        let mut nodes: Nodes<u32, ()> = SlotMap::with_key();
        let (root, _) = insert(&mut nodes, None, 1);
        assert_eq!(rotate_left(&mut nodes, root, root), root);
        assert_eq!(rotate_right(&mut nodes, root, root), root);
    }
}
