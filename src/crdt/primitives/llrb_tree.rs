//! Left-leaning red-black tree.
//!
//! An ordered map used to index runs by `NodeId`. Besides the usual
//! `put`/`get`/`remove` it answers floor queries (greatest key <= a query),
//! which is how an absolute character id is resolved to the run that
//! currently contains it.
//!
//! Complexity:
//! - put: O(log n)
//! - get / floor_entry: O(log n)
//! - remove: O(log n)
//!
//! Follows Sedgewick's 2-3 formulation: red links lean left, no node has two
//! red links, and every root-to-leaf path crosses the same number of black
//! links.

use std::cmp::Ordering;

type Link<K, V> = Option<Box<Node<K, V>>>;

struct Node<K, V> {
    key: K,
    value: V,
    red: bool,
    left: Link<K, V>,
    right: Link<K, V>,
}

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Node<K, V> {
        return Node { key, value, red: true, left: None, right: None };
    }
}

/// An ordered map from `K` to `V`.
pub struct LlrbTree<K, V> {
    root: Link<K, V>,
    len: usize,
}

impl<K: Ord, V> Default for LlrbTree<K, V> {
    fn default() -> Self {
        return Self::new();
    }
}

impl<K: Ord, V> LlrbTree<K, V> {
    pub fn new() -> LlrbTree<K, V> {
        return LlrbTree { root: None, len: 0 };
    }

    pub fn len(&self) -> usize {
        return self.len;
    }

    pub fn is_empty(&self) -> bool {
        return self.len == 0;
    }

    /// Insert `value` under `key`, overwriting any previous value.
    pub fn put(&mut self, key: K, value: V) {
        let mut inserted = false;
        let mut root = put(self.root.take(), key, value, &mut inserted);
        root.red = false;
        self.root = Some(root);
        if inserted {
            self.len += 1;
        }
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        let mut node = self.root.as_deref();
        while let Some(n) = node {
            match key.cmp(&n.key) {
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => node = n.right.as_deref(),
                Ordering::Equal => return Some(&n.value),
            }
        }
        return None;
    }

    pub fn contains_key(&self, key: &K) -> bool {
        return self.get(key).is_some();
    }

    /// The entry with the greatest key less than or equal to `key`.
    pub fn floor_entry(&self, key: &K) -> Option<(&K, &V)> {
        let mut node = self.root.as_deref();
        let mut floor = None;
        while let Some(n) = node {
            match key.cmp(&n.key) {
                Ordering::Less => node = n.left.as_deref(),
                Ordering::Greater => {
                    floor = Some(n);
                    node = n.right.as_deref();
                }
                Ordering::Equal => return Some((&n.key, &n.value)),
            }
        }
        return floor.map(|n| (&n.key, &n.value));
    }

    /// Remove `key`, returning its value if it was present.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        if !self.contains_key(key) {
            return None;
        }
        let mut root = self.root.take()?;
        if !is_red(&root.left) && !is_red(&root.right) {
            root.red = true;
        }
        let mut removed = None;
        self.root = remove(root, key, &mut removed);
        if let Some(root) = self.root.as_mut() {
            root.red = false;
        }
        self.len -= 1;
        return removed;
    }

    /// Entries in key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        let mut iter = Iter { stack: Vec::new() };
        iter.push_left(self.root.as_deref());
        return iter;
    }

    /// Check the red-black invariants; returns the black height if they hold.
    pub fn check_balance(&self) -> Option<usize> {
        return black_height(&self.root);
    }
}

pub struct Iter<'a, K, V> {
    stack: Vec<&'a Node<K, V>>,
}

impl<'a, K, V> Iter<'a, K, V> {
    fn push_left(&mut self, mut node: Option<&'a Node<K, V>>) {
        while let Some(n) = node {
            self.stack.push(n);
            node = n.left.as_deref();
        }
    }
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.push_left(node.right.as_deref());
        return Some((&node.key, &node.value));
    }
}

#[inline]
fn is_red<K, V>(link: &Link<K, V>) -> bool {
    return link.as_ref().is_some_and(|n| n.red);
}

#[inline]
fn is_left_left_red<K, V>(h: &Node<K, V>) -> bool {
    return h.left.as_ref().is_some_and(|l| is_red(&l.left));
}

#[inline]
fn is_right_left_red<K, V>(h: &Node<K, V>) -> bool {
    return h.right.as_ref().is_some_and(|r| is_red(&r.left));
}

fn rotate_left<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    let Some(mut x) = h.right.take() else {
        return h;
    };
    h.right = x.left.take();
    x.red = h.red;
    h.red = true;
    x.left = Some(h);
    return x;
}

fn rotate_right<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    let Some(mut x) = h.left.take() else {
        return h;
    };
    h.left = x.right.take();
    x.red = h.red;
    h.red = true;
    x.right = Some(h);
    return x;
}

fn flip_colors<K, V>(h: &mut Node<K, V>) {
    h.red = !h.red;
    if let Some(left) = h.left.as_mut() {
        left.red = !left.red;
    }
    if let Some(right) = h.right.as_mut() {
        right.red = !right.red;
    }
}

fn balance<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    if is_red(&h.right) && !is_red(&h.left) {
        h = rotate_left(h);
    }
    if is_red(&h.left) && is_left_left_red(&h) {
        h = rotate_right(h);
    }
    if is_red(&h.left) && is_red(&h.right) {
        flip_colors(&mut h);
    }
    return h;
}

fn put<K: Ord, V>(link: Link<K, V>, key: K, value: V, inserted: &mut bool) -> Box<Node<K, V>> {
    let Some(mut h) = link else {
        *inserted = true;
        return Box::new(Node::new(key, value));
    };
    match key.cmp(&h.key) {
        Ordering::Less => h.left = Some(put(h.left.take(), key, value, inserted)),
        Ordering::Greater => h.right = Some(put(h.right.take(), key, value, inserted)),
        Ordering::Equal => h.value = value,
    }
    return balance(h);
}

fn move_red_left<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    flip_colors(&mut h);
    if is_right_left_red(&h) {
        h.right = h.right.take().map(rotate_right);
        h = rotate_left(h);
        flip_colors(&mut h);
    }
    return h;
}

fn move_red_right<K, V>(mut h: Box<Node<K, V>>) -> Box<Node<K, V>> {
    flip_colors(&mut h);
    if is_left_left_red(&h) {
        h = rotate_right(h);
        flip_colors(&mut h);
    }
    return h;
}

/// Detach the minimum of the subtree. Returns the remaining subtree and the
/// detached node.
fn remove_min<K, V>(mut h: Box<Node<K, V>>) -> (Link<K, V>, Box<Node<K, V>>) {
    if h.left.is_none() {
        let right = h.right.take();
        return (right, h);
    }
    if !is_red(&h.left) && !is_left_left_red(&h) {
        h = move_red_left(h);
    }
    let Some(left) = h.left.take() else {
        let right = h.right.take();
        return (right, h);
    };
    let (rest, min) = remove_min(left);
    h.left = rest;
    return (Some(balance(h)), min);
}

/// Remove `key` from the subtree rooted at `h`. The key must be present.
fn remove<K: Ord, V>(mut h: Box<Node<K, V>>, key: &K, removed: &mut Option<V>) -> Link<K, V> {
    if *key < h.key {
        if !is_red(&h.left) && !is_left_left_red(&h) {
            h = move_red_left(h);
        }
        if let Some(left) = h.left.take() {
            h.left = remove(left, key, removed);
        }
    } else {
        if is_red(&h.left) {
            h = rotate_right(h);
        }
        if *key == h.key && h.right.is_none() {
            let node = *h;
            *removed = Some(node.value);
            return node.left;
        }
        if !is_red(&h.right) && !is_right_left_red(&h) {
            h = move_red_right(h);
        }
        if *key == h.key {
            if let Some(right) = h.right.take() {
                let (rest, min) = remove_min(right);
                let min = *min;
                h.right = rest;
                h.key = min.key;
                *removed = Some(std::mem::replace(&mut h.value, min.value));
            }
        } else if let Some(right) = h.right.take() {
            h.right = remove(right, key, removed);
        }
    }
    return Some(balance(h));
}

fn black_height<K: Ord, V>(link: &Link<K, V>) -> Option<usize> {
    let Some(node) = link else {
        return Some(1);
    };
    if is_red(&node.right) {
        return None;
    }
    if node.red && is_red(&node.left) {
        return None;
    }
    if node.left.as_ref().is_some_and(|l| l.key >= node.key) {
        return None;
    }
    if node.right.as_ref().is_some_and(|r| r.key <= node.key) {
        return None;
    }
    let left = black_height(&node.left)?;
    let right = black_height(&node.right)?;
    if left != right {
        return None;
    }
    return Some(left + usize::from(!node.red));
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn empty_tree() {
        let tree: LlrbTree<u32, &str> = LlrbTree::new();
        assert!(tree.is_empty());
        assert_eq!(tree.get(&1), None);
        assert_eq!(tree.floor_entry(&1), None);
    }

    #[test]
    fn put_overwrites() {
        let mut tree = LlrbTree::new();
        tree.put(5, "a");
        tree.put(5, "b");
        assert_eq!(tree.len(), 1);
        assert_eq!(tree.get(&5), Some(&"b"));
    }

    #[test]
    fn floor_entry_finds_greatest_lower_key() {
        let mut tree = LlrbTree::new();
        for key in [10, 20, 30, 40] {
            tree.put(key, key * 2);
        }
        assert_eq!(tree.floor_entry(&5), None);
        assert_eq!(tree.floor_entry(&10), Some((&10, &20)));
        assert_eq!(tree.floor_entry(&25), Some((&20, &40)));
        assert_eq!(tree.floor_entry(&99), Some((&40, &80)));
    }

    #[test]
    fn remove_keeps_order_and_balance() {
        let mut tree = LlrbTree::new();
        for key in 0..100 {
            tree.put(key, key);
        }
        for key in (0..100).step_by(3) {
            assert_eq!(tree.remove(&key), Some(key));
        }
        assert_eq!(tree.remove(&0), None);
        assert!(tree.check_balance().is_some());
        let keys: Vec<_> = tree.iter().map(|(k, _)| *k).collect();
        let expected: Vec<_> = (0..100).filter(|k| k % 3 != 0).collect();
        assert_eq!(keys, expected);
        assert_eq!(tree.len(), expected.len());
    }

    #[test]
    fn remove_everything() {
        let mut tree = LlrbTree::new();
        for key in [3, 1, 4, 1, 5, 9, 2, 6] {
            tree.put(key, ());
        }
        for key in [9, 1, 6, 3, 2, 5, 4] {
            assert!(tree.remove(&key).is_some());
            assert!(tree.check_balance().is_some());
        }
        assert!(tree.is_empty());
        assert_eq!(tree.iter().count(), 0);
    }

    proptest! {
        #[test]
        fn matches_btreemap(ops in prop::collection::vec((any::<bool>(), 0u16..64), 1..200)) {
            let mut tree = LlrbTree::new();
            let mut model = std::collections::BTreeMap::new();
            for (insert, key) in ops {
                if insert {
                    tree.put(key, key);
                    model.insert(key, key);
                } else {
                    prop_assert_eq!(tree.remove(&key), model.remove(&key));
                }
                prop_assert!(tree.check_balance().is_some());
            }
            prop_assert_eq!(tree.len(), model.len());
            for key in 0u16..70 {
                let expected = model.range(..=key).next_back();
                prop_assert_eq!(tree.floor_entry(&key), expected);
            }
        }
    }
}
