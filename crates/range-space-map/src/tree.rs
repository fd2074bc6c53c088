// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

//! The ordered range tree.
//!
//! A red-black tree of `(range, payload)` nodes stored in a slab arena.
//! Every node additionally carries:
//!
//! - `hull`: the hull of all ranges in its subtree, which turns point lookup
//!   into a pruned descent;
//! - `prev`/`next`: an in-order doubly-linked list threaded through the
//!   nodes, so the mutation algorithms get predecessor and successor in O(1)
//!   without parent walks.
//!
//! Insertion is positional (`insert_before`/`insert_after`/`prepend`/
//! `append`): the caller — not a key comparison — decides where a node goes,
//! because during a mutation the tree may transiently hold overlapping
//! ranges. Removal unlinks by pointer surgery only; a node's slot index
//! stays attached to the same entry for its whole life, across any number
//! of rebalances.

use crate::arena::Arena;
use range_space_core::{Metric, Range};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Side {
    Left,
    Right,
}

#[derive(Debug, Clone)]
struct Node<M, P> {
    range: Range<M>,
    hull: Range<M>,
    payload: P,
    color: Color,
    parent: Option<usize>,
    left: Option<usize>,
    right: Option<usize>,
    prev: Option<usize>,
    next: Option<usize>,
}

#[derive(Debug, Clone)]
pub(crate) struct Tree<M, P> {
    arena: Arena<Node<M, P>>,
    root: Option<usize>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl<M, P> Default for Tree<M, P> {
    fn default() -> Self {
        Self {
            arena: Arena::new(),
            root: None,
            head: None,
            tail: None,
        }
    }
}

impl<M: Metric, P> Tree<M, P> {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub(crate) fn len(&self) -> usize {
        self.arena.len()
    }

    #[inline]
    pub(crate) fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    #[inline]
    pub(crate) fn head(&self) -> Option<usize> {
        self.head
    }

    #[inline]
    pub(crate) fn tail(&self) -> Option<usize> {
        self.tail
    }

    #[inline]
    pub(crate) fn next(&self, index: usize) -> Option<usize> {
        self.node(index).next
    }

    #[inline]
    pub(crate) fn prev(&self, index: usize) -> Option<usize> {
        self.node(index).prev
    }

    #[inline]
    pub(crate) fn range(&self, index: usize) -> Range<M> {
        self.node(index).range
    }

    #[inline]
    pub(crate) fn payload(&self, index: usize) -> &P {
        &self.node(index).payload
    }

    #[inline]
    pub(crate) fn set_payload(&mut self, index: usize, payload: P) {
        self.node_mut(index).payload = payload;
    }

    /// Replaces the node's lower bound and reripples the hull.
    pub(crate) fn set_min(&mut self, index: usize, lo: M) {
        self.node_mut(index).range.assign_min(lo);
        self.ripple_hull(index);
    }

    /// Replaces the node's upper bound and reripples the hull.
    pub(crate) fn set_max(&mut self, index: usize, hi: M) {
        self.node_mut(index).range.assign_max(hi);
        self.ripple_hull(index);
    }

    /// Replaces the node's whole range and reripples the hull.
    pub(crate) fn set_range(&mut self, index: usize, range: Range<M>) {
        self.node_mut(index).range = range;
        self.ripple_hull(index);
    }

    /// The rightmost node with `lo <= target`, if any.
    pub(crate) fn lower_bound(&self, target: M) -> Option<usize> {
        let mut cursor = self.root;
        let mut best = None;
        while let Some(i) = cursor {
            let node = self.node(i);
            if target < node.range.lo() {
                cursor = node.left;
            } else {
                best = Some(i);
                if node.range.hi() < target {
                    cursor = node.right;
                } else {
                    break;
                }
            }
        }
        best
    }

    /// The node whose range contains `target`, located by hull-pruned
    /// descent.
    pub(crate) fn find(&self, target: M) -> Option<usize> {
        let mut cursor = self.root;
        while let Some(i) = cursor {
            let node = self.node(i);
            if target < node.range.lo() {
                if node.hull.contains(target) {
                    cursor = node.left;
                } else {
                    return None;
                }
            } else if node.range.hi() < target {
                if node.hull.contains(target) {
                    cursor = node.right;
                } else {
                    return None;
                }
            } else {
                return Some(i);
            }
        }
        None
    }

    /// Splices a new node immediately before `spot` in both tree and list.
    pub(crate) fn insert_before(&mut self, spot: usize, range: Range<M>, payload: P) -> usize {
        let index = self.alloc_node(range, payload);
        let (parent, side) = if self.node(spot).left.is_none() {
            (spot, Side::Left)
        } else {
            // The predecessor is the rightmost node of the left subtree and
            // has no right child.
            let pred = self.node(spot).prev.expect("left child implies a predecessor");
            (pred, Side::Right)
        };
        self.list_insert_before(spot, index);
        self.attach_leaf(parent, index, side);
        index
    }

    /// Splices a new node immediately after `spot` in both tree and list.
    pub(crate) fn insert_after(&mut self, spot: usize, range: Range<M>, payload: P) -> usize {
        let index = self.alloc_node(range, payload);
        let (parent, side) = if self.node(spot).right.is_none() {
            (spot, Side::Right)
        } else {
            // The successor is the leftmost node of the right subtree and
            // has no left child.
            let succ = self.node(spot).next.expect("right child implies a successor");
            (succ, Side::Left)
        };
        self.list_insert_after(spot, index);
        self.attach_leaf(parent, index, side);
        index
    }

    /// Inserts a new first node.
    pub(crate) fn prepend(&mut self, range: Range<M>, payload: P) -> usize {
        match self.head {
            None => self.insert_root(range, payload),
            Some(head) => {
                let index = self.alloc_node(range, payload);
                self.list_insert_before(head, index);
                // The first node never has a left child.
                self.attach_leaf(head, index, Side::Left);
                index
            }
        }
    }

    /// Inserts a new last node.
    pub(crate) fn append(&mut self, range: Range<M>, payload: P) -> usize {
        match self.tail {
            None => self.insert_root(range, payload),
            Some(tail) => {
                let index = self.alloc_node(range, payload);
                self.list_insert_after(tail, index);
                // The last node never has a right child.
                self.attach_leaf(tail, index, Side::Right);
                index
            }
        }
    }

    /// Unlinks a node from tree and list, drops its payload, and recycles
    /// its slot. Every other node keeps its slot index.
    pub(crate) fn remove(&mut self, z: usize) {
        let z_left = self.node(z).left;
        let z_right = self.node(z).right;

        let x;
        let x_parent;
        let removed_color;
        match (z_left, z_right) {
            (None, _) => {
                removed_color = self.node(z).color;
                x = z_right;
                x_parent = self.node(z).parent;
                self.transplant(z, z_right);
            }
            (_, None) => {
                removed_color = self.node(z).color;
                x = z_left;
                x_parent = self.node(z).parent;
                self.transplant(z, z_left);
            }
            (Some(zl), Some(zr)) => {
                // The in-order successor; with a right child present it is
                // the leftmost node of the right subtree and has no left
                // child. The list link hands it over in O(1).
                let y = self.node(z).next.expect("node with a right child has a successor");
                removed_color = self.node(y).color;
                x = self.node(y).right;
                if self.node(y).parent == Some(z) {
                    x_parent = Some(y);
                } else {
                    x_parent = self.node(y).parent;
                    self.transplant(y, x);
                    self.node_mut(y).right = Some(zr);
                    self.node_mut(zr).parent = Some(y);
                }
                self.transplant(z, Some(y));
                self.node_mut(y).left = Some(zl);
                self.node_mut(zl).parent = Some(y);
                let z_color = self.node(z).color;
                self.node_mut(y).color = z_color;
            }
        }

        // Several nodes along the spliced spine changed subtrees; recompute
        // every hull from the deepest change up.
        if let Some(p) = x_parent {
            self.refresh_hulls_to_root(p);
        }
        if removed_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }
        self.list_unlink(z);
        self.arena.release(z);
    }

    pub(crate) fn clear(&mut self) {
        self.arena.clear();
        self.root = None;
        self.head = None;
        self.tail = None;
    }

    // --- internals ---

    #[inline]
    fn node(&self, index: usize) -> &Node<M, P> {
        self.arena.get(index).expect("stale tree node index")
    }

    #[inline]
    fn node_mut(&mut self, index: usize) -> &mut Node<M, P> {
        self.arena.get_mut(index).expect("stale tree node index")
    }

    #[inline]
    fn color_of(&self, index: Option<usize>) -> Color {
        index.map_or(Color::Black, |i| self.node(i).color)
    }

    fn alloc_node(&mut self, range: Range<M>, payload: P) -> usize {
        self.arena.alloc(Node {
            range,
            hull: range,
            payload,
            color: Color::Red,
            parent: None,
            left: None,
            right: None,
            prev: None,
            next: None,
        })
    }

    fn insert_root(&mut self, range: Range<M>, payload: P) -> usize {
        let index = self.alloc_node(range, payload);
        self.node_mut(index).color = Color::Black;
        self.root = Some(index);
        self.head = Some(index);
        self.tail = Some(index);
        index
    }

    fn attach_leaf(&mut self, parent: usize, child: usize, side: Side) {
        match side {
            Side::Left => {
                debug_assert!(self.node(parent).left.is_none());
                self.node_mut(parent).left = Some(child);
            }
            Side::Right => {
                debug_assert!(self.node(parent).right.is_none());
                self.node_mut(parent).right = Some(child);
            }
        }
        self.node_mut(child).parent = Some(parent);
        self.ripple_hull(parent);
        self.insert_fixup(child);
    }

    /// Replaces the subtree rooted at `u` with the one rooted at `v` in
    /// `u`'s parent.
    fn transplant(&mut self, u: usize, v: Option<usize>) {
        let parent = self.node(u).parent;
        match parent {
            None => self.root = v,
            Some(p) => {
                if self.node(p).left == Some(u) {
                    self.node_mut(p).left = v;
                } else {
                    self.node_mut(p).right = v;
                }
            }
        }
        if let Some(v) = v {
            self.node_mut(v).parent = parent;
        }
    }

    fn rotate_left(&mut self, p: usize) {
        let r = self.node(p).right.expect("rotate_left requires a right child");
        let mid = self.node(r).left;
        let grandparent = self.node(p).parent;

        self.node_mut(p).right = mid;
        if let Some(mid) = mid {
            self.node_mut(mid).parent = Some(p);
        }
        self.node_mut(r).left = Some(p);
        self.node_mut(p).parent = Some(r);
        self.node_mut(r).parent = grandparent;
        match grandparent {
            None => self.root = Some(r),
            Some(g) => {
                if self.node(g).left == Some(p) {
                    self.node_mut(g).left = Some(r);
                } else {
                    self.node_mut(g).right = Some(r);
                }
            }
        }
        // The rotated pair covers the same set of ranges, so hulls above
        // are untouched; only these two need recomputing, lower one first.
        self.update_hull(p);
        self.update_hull(r);
    }

    fn rotate_right(&mut self, p: usize) {
        let l = self.node(p).left.expect("rotate_right requires a left child");
        let mid = self.node(l).right;
        let grandparent = self.node(p).parent;

        self.node_mut(p).left = mid;
        if let Some(mid) = mid {
            self.node_mut(mid).parent = Some(p);
        }
        self.node_mut(l).right = Some(p);
        self.node_mut(p).parent = Some(l);
        self.node_mut(l).parent = grandparent;
        match grandparent {
            None => self.root = Some(l),
            Some(g) => {
                if self.node(g).left == Some(p) {
                    self.node_mut(g).left = Some(l);
                } else {
                    self.node_mut(g).right = Some(l);
                }
            }
        }
        self.update_hull(p);
        self.update_hull(l);
    }

    fn insert_fixup(&mut self, mut z: usize) {
        loop {
            let Some(p) = self.node(z).parent else { break };
            if self.node(p).color == Color::Black {
                break;
            }
            // A red node always has a parent: the root is black.
            let g = self.node(p).parent.expect("red node has a parent");
            if self.node(g).left == Some(p) {
                let uncle = self.node(g).right;
                if self.color_of(uncle) == Color::Red {
                    let u = uncle.expect("red uncle exists");
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(u).color = Color::Black;
                    self.node_mut(g).color = Color::Red;
                    z = g;
                } else {
                    if self.node(p).right == Some(z) {
                        z = p;
                        self.rotate_left(z);
                    }
                    let p = self.node(z).parent.expect("rotated node keeps a parent");
                    let g = self.node(p).parent.expect("red node has a parent");
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(g).color = Color::Red;
                    self.rotate_right(g);
                }
            } else {
                let uncle = self.node(g).left;
                if self.color_of(uncle) == Color::Red {
                    let u = uncle.expect("red uncle exists");
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(u).color = Color::Black;
                    self.node_mut(g).color = Color::Red;
                    z = g;
                } else {
                    if self.node(p).left == Some(z) {
                        z = p;
                        self.rotate_right(z);
                    }
                    let p = self.node(z).parent.expect("rotated node keeps a parent");
                    let g = self.node(p).parent.expect("red node has a parent");
                    self.node_mut(p).color = Color::Black;
                    self.node_mut(g).color = Color::Red;
                    self.rotate_left(g);
                }
            }
        }
        let root = self.root.expect("non-empty tree has a root");
        self.node_mut(root).color = Color::Black;
    }

    fn delete_fixup(&mut self, mut x: Option<usize>, mut parent: Option<usize>) {
        while x != self.root && self.color_of(x) == Color::Black {
            let Some(p) = parent else { break };
            if self.node(p).left == x {
                let mut w = self
                    .node(p)
                    .right
                    .expect("black-height invariant guarantees a sibling");
                if self.node(w).color == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(p).color = Color::Red;
                    self.rotate_left(p);
                    w = self.node(p).right.expect("sibling exists after rotation");
                }
                if self.color_of(self.node(w).left) == Color::Black
                    && self.color_of(self.node(w).right) == Color::Black
                {
                    self.node_mut(w).color = Color::Red;
                    x = Some(p);
                    parent = self.node(p).parent;
                } else {
                    if self.color_of(self.node(w).right) == Color::Black {
                        if let Some(wl) = self.node(w).left {
                            self.node_mut(wl).color = Color::Black;
                        }
                        self.node_mut(w).color = Color::Red;
                        self.rotate_right(w);
                        w = self.node(p).right.expect("sibling exists after rotation");
                    }
                    let p_color = self.node(p).color;
                    self.node_mut(w).color = p_color;
                    self.node_mut(p).color = Color::Black;
                    if let Some(wr) = self.node(w).right {
                        self.node_mut(wr).color = Color::Black;
                    }
                    self.rotate_left(p);
                    x = self.root;
                    parent = None;
                }
            } else {
                let mut w = self
                    .node(p)
                    .left
                    .expect("black-height invariant guarantees a sibling");
                if self.node(w).color == Color::Red {
                    self.node_mut(w).color = Color::Black;
                    self.node_mut(p).color = Color::Red;
                    self.rotate_right(p);
                    w = self.node(p).left.expect("sibling exists after rotation");
                }
                if self.color_of(self.node(w).left) == Color::Black
                    && self.color_of(self.node(w).right) == Color::Black
                {
                    self.node_mut(w).color = Color::Red;
                    x = Some(p);
                    parent = self.node(p).parent;
                } else {
                    if self.color_of(self.node(w).left) == Color::Black {
                        if let Some(wr) = self.node(w).right {
                            self.node_mut(wr).color = Color::Black;
                        }
                        self.node_mut(w).color = Color::Red;
                        self.rotate_left(w);
                        w = self.node(p).left.expect("sibling exists after rotation");
                    }
                    let p_color = self.node(p).color;
                    self.node_mut(w).color = p_color;
                    self.node_mut(p).color = Color::Black;
                    if let Some(wl) = self.node(w).left {
                        self.node_mut(wl).color = Color::Black;
                    }
                    self.rotate_right(p);
                    x = self.root;
                    parent = None;
                }
            }
        }
        if let Some(x) = x {
            self.node_mut(x).color = Color::Black;
        }
    }

    /// Recomputes the node's hull from its range and children.
    /// Returns whether it changed.
    fn update_hull(&mut self, index: usize) -> bool {
        let (range, left, right) = {
            let node = self.node(index);
            (node.range, node.left, node.right)
        };
        let mut hull = range;
        if let Some(l) = left {
            hull = hull.hull(&self.node(l).hull);
        }
        if let Some(r) = right {
            hull = hull.hull(&self.node(r).hull);
        }
        let node = self.node_mut(index);
        if node.hull == hull {
            false
        } else {
            node.hull = hull;
            true
        }
    }

    /// Recomputes hulls from `index` toward the root, stopping at the first
    /// ancestor whose hull is unaffected. Valid when only `index`'s own
    /// range or children changed.
    fn ripple_hull(&mut self, mut index: usize) {
        loop {
            if !self.update_hull(index) {
                break;
            }
            match self.node(index).parent {
                Some(p) => index = p,
                None => break,
            }
        }
    }

    /// Recomputes every hull from `index` up to the root unconditionally —
    /// needed after removal surgery, where several nodes along the spine
    /// changed children at once.
    fn refresh_hulls_to_root(&mut self, mut index: usize) {
        loop {
            self.update_hull(index);
            match self.node(index).parent {
                Some(p) => index = p,
                None => break,
            }
        }
    }

    // --- list threading ---

    fn list_insert_before(&mut self, spot: usize, index: usize) {
        let prev = self.node(spot).prev;
        self.node_mut(index).prev = prev;
        self.node_mut(index).next = Some(spot);
        self.node_mut(spot).prev = Some(index);
        match prev {
            Some(p) => self.node_mut(p).next = Some(index),
            None => self.head = Some(index),
        }
    }

    fn list_insert_after(&mut self, spot: usize, index: usize) {
        let next = self.node(spot).next;
        self.node_mut(index).next = next;
        self.node_mut(index).prev = Some(spot);
        self.node_mut(spot).next = Some(index);
        match next {
            Some(n) => self.node_mut(n).prev = Some(index),
            None => self.tail = Some(index),
        }
    }

    fn list_unlink(&mut self, index: usize) {
        let prev = self.node(index).prev;
        let next = self.node(index).next;
        match prev {
            Some(p) => self.node_mut(p).next = next,
            None => self.head = next,
        }
        match next {
            Some(n) => self.node_mut(n).prev = prev,
            None => self.tail = prev,
        }
    }
}

impl<M: Metric, P: PartialEq> Tree<M, P> {
    /// Full structural audit: red-black shape, list/tree agreement, hull
    /// correctness, and the canonical-form rules over stored ranges.
    pub(crate) fn check_invariants(&self) -> bool {
        let Some(root) = self.root else {
            return self.head.is_none() && self.tail.is_none() && self.arena.is_empty();
        };
        if self.node(root).color != Color::Black {
            return false;
        }
        let mut inorder = Vec::new();
        if self.audit_subtree(root, None, &mut inorder).is_none() {
            return false;
        }
        if inorder.len() != self.arena.len() {
            return false;
        }
        if self.head != inorder.first().copied() || self.tail != inorder.last().copied() {
            return false;
        }
        // The list is exactly the in-order traversal, linked both ways.
        let mut cursor = self.head;
        let mut prev = None;
        for &expected in &inorder {
            let Some(i) = cursor else { return false };
            if i != expected || self.node(i).prev != prev {
                return false;
            }
            prev = Some(i);
            cursor = self.node(i).next;
        }
        if cursor.is_some() {
            return false;
        }
        // Stored ranges: non-empty, strictly ordered, disjoint, and never
        // adjacent with equal payloads.
        for &i in &inorder {
            if self.node(i).range.is_empty() {
                return false;
            }
        }
        for pair in inorder.windows(2) {
            let a = self.node(pair[0]);
            let b = self.node(pair[1]);
            if a.range.hi() >= b.range.lo() {
                return false;
            }
            if a.range.hi().successor() == b.range.lo() && a.payload == b.payload {
                return false;
            }
        }
        true
    }

    /// Returns the black height of the subtree, or `None` on any violation.
    fn audit_subtree(
        &self,
        index: usize,
        parent: Option<usize>,
        inorder: &mut Vec<usize>,
    ) -> Option<usize> {
        let node = self.arena.get(index)?;
        if node.parent != parent {
            return None;
        }
        if node.color == Color::Red && self.color_of(parent) == Color::Red {
            return None;
        }
        let left_height = match node.left {
            Some(l) => self.audit_subtree(l, Some(index), inorder)?,
            None => 1,
        };
        inorder.push(index);
        let right_height = match node.right {
            Some(r) => self.audit_subtree(r, Some(index), inorder)?,
            None => 1,
        };
        if left_height != right_height {
            return None;
        }
        let mut hull = node.range;
        if let Some(l) = node.left {
            hull = hull.hull(&self.node(l).hull);
        }
        if let Some(r) = node.right {
            hull = hull.hull(&self.node(r).hull);
        }
        if hull != node.hull {
            return None;
        }
        Some(left_height + usize::from(node.color == Color::Black))
    }
}
