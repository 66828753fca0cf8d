//! Weighted splay tree over an arena of nodes.
//!
//! The tree orders nodes by document position. Each node carries a weight,
//! the sum of the lengths of every node in its subtree, so a character offset
//! can be resolved by descending on weights and a node's offset recovered by
//! walking up to the root.
//!
//! The tree also owns the node arena. Nodes are addressed by `NodeIdx`, and
//! callers keep their own links (linked lists, other indexes) as indices into
//! the same arena, so one value can sit in several structures at once without
//! shared ownership.
//!
//! # Complexity
//!
//! - find / insert_after / splay / delete: O(log n) amortized
//! - index_of: O(depth), cheap right after the node was splayed
//! - cut_off_range: O(log n) amortized plus the size of the range
//!
//! A node's weight is only refreshed when it is rotated or explicitly
//! updated. After changing a value's length, call `update_weight` (or
//! `cut_off_range` for a whole range) before the next positional query.

/// A value that contributes weight to the tree.
pub trait Weighted {
    /// Weight of this value alone. Zero for tombstones.
    fn length(&self) -> usize;
}

/// Index of a node in the arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeIdx(u32);

#[derive(Clone, Debug)]
struct Slot<V> {
    value: V,
    /// Length of this node plus the lengths of its subtree.
    weight: usize,
    parent: Option<NodeIdx>,
    left: Option<NodeIdx>,
    right: Option<NodeIdx>,
}

/// A splay tree weighted by `V::length`.
#[derive(Clone, Debug)]
pub struct SplayTree<V> {
    slots: Vec<Option<Slot<V>>>,
    free: Vec<NodeIdx>,
    root: Option<NodeIdx>,
}

impl<V: Weighted> Default for SplayTree<V> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<V: Weighted> SplayTree<V> {
    pub fn new() -> SplayTree<V> {
        return SplayTree {
            slots: Vec::new(),
            free: Vec::new(),
            root: None,
        };
    }

    /// Allocate a detached node. It joins the tree through `insert_after`.
    pub fn alloc(&mut self, value: V) -> NodeIdx {
        let slot = Slot {
            weight: value.length(),
            value,
            parent: None,
            left: None,
            right: None,
        };
        if let Some(idx) = self.free.pop() {
            self.slots[idx.0 as usize] = Some(slot);
            return idx;
        }
        let idx = NodeIdx(u32::try_from(self.slots.len()).expect("node arena exceeds u32 slots"));
        self.slots.push(Some(slot));
        return idx;
    }

    #[inline]
    fn slot(&self, idx: NodeIdx) -> &Slot<V> {
        return self.slots[idx.0 as usize]
            .as_ref()
            .expect("node index refers to a freed slot");
    }

    #[inline]
    fn slot_mut(&mut self, idx: NodeIdx) -> &mut Slot<V> {
        return self.slots[idx.0 as usize]
            .as_mut()
            .expect("node index refers to a freed slot");
    }

    #[inline]
    pub fn get(&self, idx: NodeIdx) -> &V {
        return &self.slot(idx).value;
    }

    /// Mutable access to a value. Changing its length leaves cached weights
    /// stale until `update_weight` or `cut_off_range` runs.
    #[inline]
    pub fn get_mut(&mut self, idx: NodeIdx) -> &mut V {
        return &mut self.slot_mut(idx).value;
    }

    pub fn root(&self) -> Option<NodeIdx> {
        return self.root;
    }

    /// Total weight of the tree.
    pub fn len(&self) -> usize {
        return self.root.map_or(0, |root| self.slot(root).weight);
    }

    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Number of live nodes in the arena.
    pub fn node_count(&self) -> usize {
        return self.slots.len() - self.free.len();
    }

    #[inline]
    pub fn weight(&self, idx: NodeIdx) -> usize {
        return self.slot(idx).weight;
    }

    #[inline]
    pub fn left_weight(&self, idx: NodeIdx) -> usize {
        return self.slot(idx).left.map_or(0, |l| self.slot(l).weight);
    }

    #[inline]
    pub fn right_weight(&self, idx: NodeIdx) -> usize {
        return self.slot(idx).right.map_or(0, |r| self.slot(r).weight);
    }

    /// Recompute a node's weight from its own length and its children.
    #[inline]
    pub fn update_weight(&mut self, idx: NodeIdx) {
        let weight = self.get(idx).length() + self.left_weight(idx) + self.right_weight(idx);
        self.slot_mut(idx).weight = weight;
    }

    /// Recompute weights from `idx` up to the root.
    fn update_tree_weight(&mut self, idx: NodeIdx) {
        let mut current = Some(idx);
        while let Some(node) = current {
            self.update_weight(node);
            current = self.slot(node).parent;
        }
    }

    /// Replace `child` under `parent` (or at the root) with `replacement`.
    fn replace_child(&mut self, parent: Option<NodeIdx>, child: NodeIdx, replacement: NodeIdx) {
        match parent {
            None => self.root = Some(replacement),
            Some(parent) => {
                let slot = self.slot_mut(parent);
                if slot.left == Some(child) {
                    slot.left = Some(replacement);
                } else {
                    slot.right = Some(replacement);
                }
            }
        }
    }

    /// Right rotation at `idx`: its left child takes its place.
    fn rotate_right(&mut self, idx: NodeIdx) {
        let Some(left_idx) = self.slot(idx).left else {
            return;
        };
        let parent_idx = self.slot(idx).parent;

        // Get left's right child
        let left_right = self.slot(left_idx).right;

        self.slot_mut(left_idx).parent = parent_idx;
        self.slot_mut(left_idx).right = Some(idx);

        self.slot_mut(idx).parent = Some(left_idx);
        self.slot_mut(idx).left = left_right;

        if let Some(left_right) = left_right {
            self.slot_mut(left_right).parent = Some(idx);
        }

        self.replace_child(parent_idx, idx, left_idx);

        self.update_weight(idx);
        self.update_weight(left_idx);
    }

    /// Left rotation at `idx`: its right child takes its place.
    fn rotate_left(&mut self, idx: NodeIdx) {
        let Some(right_idx) = self.slot(idx).right else {
            return;
        };
        let parent_idx = self.slot(idx).parent;

        // Get right's left child
        let right_left = self.slot(right_idx).left;

        self.slot_mut(right_idx).parent = parent_idx;
        self.slot_mut(right_idx).left = Some(idx);

        self.slot_mut(idx).parent = Some(right_idx);
        self.slot_mut(idx).right = right_left;

        if let Some(right_left) = right_left {
            self.slot_mut(right_left).parent = Some(idx);
        }

        self.replace_child(parent_idx, idx, right_idx);

        self.update_weight(idx);
        self.update_weight(right_idx);
    }

    /// Bring `idx` to the root with zig, zig-zig and zig-zag steps.
    pub fn splay(&mut self, idx: NodeIdx) {
        // The node's own length may have changed since its last rotation.
        self.update_weight(idx);
        while let Some(parent_idx) = self.slot(idx).parent {
            let grandparent_idx = self.slot(parent_idx).parent;
            let is_left_child = self.slot(parent_idx).left == Some(idx);

            match grandparent_idx {
                None => {
                    // Zig step
                    if is_left_child {
                        self.rotate_right(parent_idx);
                    } else {
                        self.rotate_left(parent_idx);
                    }
                }
                Some(grandparent_idx) => {
                    let parent_is_left = self.slot(grandparent_idx).left == Some(parent_idx);

                    if is_left_child == parent_is_left {
                        // Zig-zig step
                        if is_left_child {
                            self.rotate_right(grandparent_idx);
                            self.rotate_right(parent_idx);
                        } else {
                            self.rotate_left(grandparent_idx);
                            self.rotate_left(parent_idx);
                        }
                    } else {
                        // Zig-zag step
                        if is_left_child {
                            self.rotate_right(parent_idx);
                            self.rotate_left(grandparent_idx);
                        } else {
                            self.rotate_left(parent_idx);
                            self.rotate_right(grandparent_idx);
                        }
                    }
                }
            }
        }
        self.root = Some(idx);
    }

    /// Insert the detached `node` right after `target` in position order.
    ///
    /// `target` is splayed to the root, then `node` becomes the new root with
    /// `target` as its left child and `target`'s old right subtree as its
    /// right subtree. With no target, `node` becomes the whole tree.
    pub fn insert_after(&mut self, target: Option<NodeIdx>, node: NodeIdx) {
        let Some(target) = target else {
            self.root = Some(node);
            self.update_weight(node);
            return;
        };
        self.splay(target);

        let target_right = self.slot_mut(target).right.take();
        if let Some(target_right) = target_right {
            self.slot_mut(target_right).parent = Some(node);
        }

        let slot = self.slot_mut(node);
        slot.parent = None;
        slot.left = Some(target);
        slot.right = target_right;
        self.slot_mut(target).parent = Some(node);
        self.root = Some(node);

        self.update_weight(target);
        self.update_weight(node);
    }

    /// Find the node covering weight offset `pos`.
    ///
    /// Returns the node and the offset inside it. An offset that falls on a
    /// boundary resolves to the end of the left node. `None` past the end.
    pub fn find(&mut self, pos: usize) -> Option<(NodeIdx, usize)> {
        let mut node = self.root?;
        let mut pos = pos;

        loop {
            let left_weight = self.left_weight(node);
            let slot = self.slot(node);
            let length = slot.value.length();

            if slot.left.is_some() && pos <= left_weight {
                node = slot.left?;
                continue;
            }
            match slot.right {
                Some(right) if left_weight + length < pos => {
                    pos -= left_weight + length;
                    node = right;
                }
                _ => {
                    pos -= left_weight;
                    break;
                }
            }
        }

        if pos > self.get(node).length() {
            return None;
        }
        self.splay(node);
        return Some((node, pos));
    }

    /// The weight offset at which `idx` starts.
    pub fn index_of(&self, idx: NodeIdx) -> usize {
        let mut index = 0;
        let mut current = Some(idx);
        let mut prev = None;

        while let Some(node) = current {
            let slot = self.slot(node);
            // Ascending from a right child: this node and its left subtree
            // come first.
            if prev.is_none() || slot.right == prev {
                index += slot.value.length() + self.left_weight(node);
            }
            prev = Some(node);
            current = slot.parent;
        }

        return index - self.get(idx).length();
    }

    /// Refresh the weights of every node strictly between `left` and `right`
    /// (or after `left` when `right` is `None`).
    ///
    /// The boundaries are splayed so the range becomes the right subtree of
    /// `left`, which is then re-weighed in one post-order pass. Used after a
    /// contiguous range of nodes was shortened together.
    pub fn cut_off_range(&mut self, left: NodeIdx, right: Option<NodeIdx>) {
        let Some(right) = right else {
            self.splay(left);
            self.cut_off_right(left);
            return;
        };

        self.splay(left);
        self.splay(right);
        if self.slot(right).left != Some(left) {
            // left ends up as the left child of right's left child
            if let Some(parent) = self.slot(left).parent {
                debug_assert_eq!(self.slot(parent).left, Some(left));
                self.rotate_right(parent);
            }
        }
        self.cut_off_right(left);
    }

    fn cut_off_right(&mut self, root: NodeIdx) {
        let mut stack: Vec<NodeIdx> = self.slot(root).right.into_iter().collect();
        let mut order = Vec::new();
        while let Some(node) = stack.pop() {
            order.push(node);
            let slot = self.slot(node);
            stack.extend(slot.left);
            stack.extend(slot.right);
        }
        // Reversed (node, right, left) pre-order visits children first.
        for &node in order.iter().rev() {
            self.update_weight(node);
        }
        self.update_tree_weight(root);
    }

    fn maximum(&self, idx: NodeIdx) -> NodeIdx {
        let mut node = idx;
        while let Some(right) = self.slot(node).right {
            node = right;
        }
        return node;
    }

    /// Unlink `idx` from the tree and free its slot, returning the value.
    pub fn delete(&mut self, idx: NodeIdx) -> V {
        self.splay(idx);

        let slot = self.slot_mut(idx);
        let left = slot.left.take();
        let right = slot.right.take();
        if let Some(left) = left {
            self.slot_mut(left).parent = None;
        }
        if let Some(right) = right {
            self.slot_mut(right).parent = None;
        }

        match left {
            Some(left) => {
                let max = self.maximum(left);
                self.splay(max);
                self.slot_mut(max).right = right;
                if let Some(right) = right {
                    self.slot_mut(right).parent = Some(max);
                }
                self.update_weight(max);
                self.root = Some(max);
            }
            None => self.root = right,
        }

        self.free.push(idx);
        let slot = self.slots[idx.0 as usize]
            .take()
            .expect("node index refers to a freed slot");
        return slot.value;
    }

    /// Nodes in position order.
    pub fn in_order(&self) -> Vec<NodeIdx> {
        let mut out = Vec::with_capacity(self.node_count());
        let mut stack = Vec::new();
        let mut current = self.root;
        loop {
            while let Some(node) = current {
                stack.push(node);
                current = self.slot(node).left;
            }
            let Some(node) = stack.pop() else {
                break;
            };
            out.push(node);
            current = self.slot(node).right;
        }
        return out;
    }

    /// Verify every cached weight and parent link.
    pub fn check_weight(&self) -> bool {
        for node in self.in_order() {
            let slot = self.slot(node);
            let expected = slot.value.length() + self.left_weight(node) + self.right_weight(node);
            if slot.weight != expected {
                return false;
            }
            for child in [slot.left, slot.right].into_iter().flatten() {
                if self.slot(child).parent != Some(node) {
                    return false;
                }
            }
        }
        return self.root.is_none_or(|root| self.slot(root).parent.is_none());
    }
}
