//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use generational_arena::{Arena, Index};

/// Ordered map backed by a height-balanced binary search tree.
///
/// Each node records the heights of its left and right subtrees separately,
/// and rebalancing after insertions and deletions walks the path back to the
/// root applying single or double rotations depending on the sign of
/// `r_height - l_height`. The left-most and right-most nodes are cached for
/// O(1) first/last access.
///
/// Nodes live in an arena and refer to each other by index, so parent links
/// do not create reference cycles.
#[derive(Debug)]
pub struct AvlTree<K, V> {
    arena: Arena<Node<K, V>>,
    root: Option<Index>,
    first: Option<Index>,
    last: Option<Index>,
}

#[derive(Debug)]
struct Node<K, V> {
    key: K,
    value: V,
    parent: Option<Index>,
    left: Option<Index>,
    right: Option<Index>,
    // Height of the left/right subtree (0 = empty).
    l_height: i16,
    r_height: i16,
}

// ===== impl AvlTree =====

impl<K, V> AvlTree<K, V>
where
    K: Copy + Ord,
{
    pub fn new() -> AvlTree<K, V> {
        AvlTree {
            arena: Arena::new(),
            root: None,
            first: None,
            last: None,
        }
    }

    pub fn len(&self) -> usize {
        self.arena.len()
    }

    pub fn is_empty(&self) -> bool {
        self.arena.is_empty()
    }

    /// Inserts a new entry, unless the key is already present.
    ///
    /// On a duplicate key no insertion takes place and a copy of the
    /// existing value is returned, allowing the caller to branch on the
    /// collision.
    pub fn insert_or_find(&mut self, key: K, value: V) -> Option<V>
    where
        V: Clone,
    {
        if self.root.is_none() {
            let node = self.arena.insert(Node::new(key, value));
            self.root = Some(node);
            self.first = Some(node);
            self.last = Some(node);
            return None;
        }

        // Scan down the tree looking for the insert point.
        let mut parent = self.root.unwrap();
        loop {
            let pnode = &self.arena[parent];
            match key.cmp(&pnode.key) {
                std::cmp::Ordering::Greater => match pnode.right {
                    Some(right) => parent = right,
                    None => {
                        let node = self.arena.insert(Node::new(key, value));
                        self.arena[node].parent = Some(parent);
                        self.arena[parent].right = Some(node);
                        self.arena[parent].r_height = 1;
                        if self.last == Some(parent) {
                            self.last = Some(node);
                        }
                        break;
                    }
                },
                std::cmp::Ordering::Less => match pnode.left {
                    Some(left) => parent = left,
                    None => {
                        let node = self.arena.insert(Node::new(key, value));
                        self.arena[node].parent = Some(parent);
                        self.arena[parent].left = Some(node);
                        self.arena[parent].l_height = 1;
                        if self.first == Some(parent) {
                            self.first = Some(node);
                        }
                        break;
                    }
                },
                std::cmp::Ordering::Equal => {
                    // Found a matching key, return the existing entry.
                    return Some(pnode.value.clone());
                }
            }
        }

        self.balance_tree(parent);
        None
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.find_node(key).map(|idx| &self.arena[idx].value)
    }

    pub fn get_mut(&mut self, key: &K) -> Option<&mut V> {
        self.find_node(key).map(|idx| &mut self.arena[idx].value)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.find_node(key).is_some()
    }

    /// Removes the entry with the given key, returning its value.
    pub fn remove(&mut self, key: &K) -> Option<V> {
        let node = self.find_node(key)?;
        Some(self.remove_node(node))
    }

    pub fn first(&self) -> Option<(K, &V)> {
        self.first.map(|idx| {
            let node = &self.arena[idx];
            (node.key, &node.value)
        })
    }

    pub fn last(&self) -> Option<(K, &V)> {
        self.last.map(|idx| {
            let node = &self.arena[idx];
            (node.key, &node.value)
        })
    }

    /// Returns the entry with the smallest key strictly greater than `key`.
    pub fn next(&self, key: &K) -> Option<(K, &V)> {
        self.find_or_next(key, true)
    }

    /// Returns the entry with the largest key strictly smaller than `key`.
    pub fn prev(&self, key: &K) -> Option<(K, &V)> {
        let mut node = self.root;
        let mut pred = None;
        while let Some(idx) = node {
            let n = &self.arena[idx];
            if *key > n.key {
                pred = Some(idx);
                node = n.right;
            } else {
                node = n.left;
            }
        }
        pred.map(|idx| {
            let node = &self.arena[idx];
            (node.key, &node.value)
        })
    }

    /// Returns the entry with the given key, or its in-order successor when
    /// absent. With `strict` set, an exact match is skipped over.
    pub fn find_or_next(&self, key: &K, strict: bool) -> Option<(K, &V)> {
        let mut node = self.root?;
        let found = loop {
            let n = &self.arena[node];
            match key.cmp(&n.key) {
                std::cmp::Ordering::Greater => match n.right {
                    Some(right) => node = right,
                    None => break self.next_node(node),
                },
                std::cmp::Ordering::Less => match n.left {
                    Some(left) => node = left,
                    None => break Some(node),
                },
                std::cmp::Ordering::Equal => {
                    break if strict { self.next_node(node) } else { Some(node) };
                }
            }
        };
        found.map(|idx| {
            let node = &self.arena[idx];
            (node.key, &node.value)
        })
    }

    /// Returns an iterator visiting all entries in ascending key order.
    pub fn iter(&self) -> Iter<'_, K, V> {
        Iter {
            tree: self,
            node: self.first,
        }
    }

    /// Returns all keys in ascending order.
    ///
    /// Handy when entries need to be mutated while walking the tree.
    pub fn keys(&self) -> Vec<K> {
        self.iter().map(|(key, _)| key).collect()
    }

    // ===== internal helpers =====

    fn find_node(&self, key: &K) -> Option<Index> {
        let mut node = self.root;
        while let Some(idx) = node {
            let n = &self.arena[idx];
            match key.cmp(&n.key) {
                std::cmp::Ordering::Greater => node = n.right,
                std::cmp::Ordering::Less => node = n.left,
                std::cmp::Ordering::Equal => return Some(idx),
            }
        }
        None
    }

    fn subtree_height(&self, node: Index) -> i16 {
        let n = &self.arena[node];
        1 + std::cmp::max(n.l_height, n.r_height)
    }

    // In-order successor, following parent links.
    fn next_node(&self, mut node: Index) -> Option<Index> {
        if let Some(mut right) = self.arena[node].right {
            while let Some(left) = self.arena[right].left {
                right = left;
            }
            return Some(right);
        }

        // No right son, so find a node of which we are in the left subtree.
        loop {
            match self.arena[node].parent {
                None => return None,
                Some(parent) => {
                    if self.arena[parent].left == Some(node) {
                        return Some(parent);
                    }
                    node = parent;
                }
            }
        }
    }

    fn remove_node(&mut self, node: Index) -> V {
        let (left, right) = {
            let n = &self.arena[node];
            (n.left, n.right)
        };

        let replace = match (left, right) {
            (None, None) => {
                // Barren node, just delete it.
                if self.first == Some(node) {
                    self.first = self.arena[node].parent;
                }
                if self.last == Some(node) {
                    self.last = self.arena[node].parent;
                }
                None
            }
            (None, Some(right)) => {
                // No left son, replace with right son.
                if self.first == Some(node) {
                    self.first = Some(right);
                }
                Some(right)
            }
            (Some(left), None) => {
                // No right son, replace with left son.
                if self.last == Some(node) {
                    self.last = Some(left);
                }
                Some(left)
            }
            (Some(left), Some(right)) => {
                let n = &self.arena[node];
                if n.r_height > n.l_height {
                    // Right subtree is higher than left subtree.
                    if self.arena[right].left.is_none() {
                        // Replace node with right son.
                        self.arena[right].left = Some(left);
                        self.arena[left].parent = Some(right);
                        self.arena[right].l_height = self.arena[node].l_height;
                        Some(right)
                    } else {
                        // Swap with left-most descendent of right subtree.
                        self.swap_left_most(right, node);
                        self.arena[node].right
                    }
                } else {
                    // Left subtree is higher (or subtrees are of same height).
                    if self.arena[left].right.is_none() {
                        // Replace node with left son.
                        self.arena[left].right = Some(right);
                        self.arena[right].parent = Some(left);
                        self.arena[left].r_height = self.arena[node].r_height;
                        Some(left)
                    } else {
                        // Swap with right-most descendent of left subtree.
                        self.swap_right_most(left, node);
                        self.arena[node].left
                    }
                }
            }
        };

        let parent = self.arena[node].parent;

        let new_height = match replace {
            Some(replace) => {
                self.arena[replace].parent = parent;
                self.subtree_height(replace)
            }
            None => 0,
        };

        match parent {
            Some(parent) => {
                if self.arena[parent].right == Some(node) {
                    self.arena[parent].right = replace;
                    self.arena[parent].r_height = new_height;
                } else {
                    self.arena[parent].left = replace;
                    self.arena[parent].l_height = new_height;
                }
                // Unlink before rebalancing so the removed node can't be
                // observed from the tree.
                let removed = self.arena.remove(node).unwrap();
                self.balance_tree(parent);
                removed.value
            }
            None => {
                // Replacement node is now root of tree.
                self.root = replace;
                self.arena.remove(node).unwrap().value
            }
        }
    }

    // Swap `node` with the left-most descendent of `subtree`.
    //
    // Only reachable when `node` has two sons, so the cached first/last
    // pointers cannot refer to it.
    fn swap_left_most(&mut self, subtree: Index, node: Index) {
        let mut swap = subtree;
        while let Some(left) = self.arena[swap].left {
            swap = left;
        }

        let swap_parent = self.arena[swap].parent;
        let swap_right = self.arena[swap].right;

        // Move the swap node into node's position.
        let (node_parent, node_left, node_right, node_lh, node_rh) = {
            let n = &self.arena[node];
            (n.parent, n.left, n.right, n.l_height, n.r_height)
        };
        {
            let s = &mut self.arena[swap];
            s.parent = node_parent;
            s.left = node_left;
            s.right = node_right;
            s.l_height = node_lh;
            s.r_height = node_rh;
        }
        self.arena[node_left.unwrap()].parent = Some(swap);
        self.arena[node_right.unwrap()].parent = Some(swap);
        match node_parent {
            None => self.root = Some(swap),
            Some(parent) => {
                if self.arena[parent].right == Some(node) {
                    self.arena[parent].right = Some(swap);
                } else {
                    self.arena[parent].left = Some(swap);
                }
            }
        }

        // Move node into the swap node's old position.
        {
            let n = &mut self.arena[node];
            n.parent = swap_parent;
            n.left = None;
            n.right = swap_right;
            n.l_height = 0;
            n.r_height = if swap_right.is_some() { 1 } else { 0 };
        }
        if let Some(right) = swap_right {
            self.arena[right].parent = Some(node);
        }
        self.arena[swap_parent.unwrap()].left = Some(node);
    }

    // Swap `node` with the right-most descendent of `subtree`.
    fn swap_right_most(&mut self, subtree: Index, node: Index) {
        let mut swap = subtree;
        while let Some(right) = self.arena[swap].right {
            swap = right;
        }

        let swap_parent = self.arena[swap].parent;
        let swap_left = self.arena[swap].left;

        // Move the swap node into node's position.
        let (node_parent, node_left, node_right, node_lh, node_rh) = {
            let n = &self.arena[node];
            (n.parent, n.left, n.right, n.l_height, n.r_height)
        };
        {
            let s = &mut self.arena[swap];
            s.parent = node_parent;
            s.left = node_left;
            s.right = node_right;
            s.l_height = node_lh;
            s.r_height = node_rh;
        }
        self.arena[node_left.unwrap()].parent = Some(swap);
        self.arena[node_right.unwrap()].parent = Some(swap);
        match node_parent {
            None => self.root = Some(swap),
            Some(parent) => {
                if self.arena[parent].right == Some(node) {
                    self.arena[parent].right = Some(swap);
                } else {
                    self.arena[parent].left = Some(swap);
                }
            }
        }

        // Move node into the swap node's old position.
        {
            let n = &mut self.arena[node];
            n.parent = swap_parent;
            n.left = swap_left;
            n.right = None;
            n.l_height = if swap_left.is_some() { 1 } else { 0 };
            n.r_height = 0;
        }
        if let Some(left) = swap_left {
            self.arena[left].parent = Some(node);
        }
        self.arena[swap_parent.unwrap()].right = Some(node);
    }

    // Rebalance the tree starting at the supplied node and ending at the
    // root.
    fn balance_tree(&mut self, mut node: Index) {
        while let Some(parent) = self.arena[node].parent {
            if self.arena[parent].right == Some(node) {
                let child = self.arena[parent].right.unwrap();
                let child = self.rebalance(child);
                self.arena[parent].right = Some(child);
                self.arena[child].parent = Some(parent);
                self.arena[parent].r_height = self.subtree_height(child);
            } else {
                let child = self.arena[parent].left.unwrap();
                let child = self.rebalance(child);
                self.arena[parent].left = Some(child);
                self.arena[child].parent = Some(parent);
                self.arena[parent].l_height = self.subtree_height(child);
            }
            node = parent;
        }

        // Rebalance the root node.
        let root = node;
        if self.arena[root].l_height != self.arena[root].r_height {
            let new_root = self.rebalance(root);
            self.root = Some(new_root);
            self.arena[new_root].parent = None;
        }
    }

    // Rebalance a subtree (if necessary), returning its new root.
    fn rebalance(&mut self, subtree: Index) -> Index {
        let moment = {
            let n = &self.arena[subtree];
            n.r_height - n.l_height
        };

        if moment > 1 {
            // Subtree is heavy on the right side.
            let right = self.arena[subtree].right.unwrap();
            if self.arena[right].l_height > self.arena[right].r_height {
                let right = self.rotate_right(right);
                self.arena[subtree].right = Some(right);
                self.arena[right].parent = Some(subtree);
            }
            self.rotate_left(subtree)
        } else if moment < -1 {
            // Subtree is heavy on the left side.
            let left = self.arena[subtree].left.unwrap();
            if self.arena[left].r_height > self.arena[left].l_height {
                let left = self.rotate_left(left);
                self.arena[subtree].left = Some(left);
                self.arena[left].parent = Some(subtree);
            }
            self.rotate_right(subtree)
        } else {
            subtree
        }
    }

    // Rotate a subtree left, returning its new root.
    fn rotate_left(&mut self, subtree: Index) -> Index {
        let right_son = self.arena[subtree].right.unwrap();

        let right_grandson = self.arena[right_son].left;
        self.arena[subtree].right = right_grandson;
        if let Some(right_grandson) = right_grandson {
            self.arena[right_grandson].parent = Some(subtree);
        }
        self.arena[subtree].r_height = self.arena[right_son].l_height;

        self.arena[right_son].parent = self.arena[subtree].parent;
        self.arena[right_son].left = Some(subtree);
        self.arena[right_son].l_height = self.subtree_height(subtree);
        self.arena[subtree].parent = Some(right_son);

        right_son
    }

    // Rotate a subtree right, returning its new root.
    fn rotate_right(&mut self, subtree: Index) -> Index {
        let left_son = self.arena[subtree].left.unwrap();

        let left_grandson = self.arena[left_son].right;
        self.arena[subtree].left = left_grandson;
        if let Some(left_grandson) = left_grandson {
            self.arena[left_grandson].parent = Some(subtree);
        }
        self.arena[subtree].l_height = self.arena[left_son].r_height;

        self.arena[left_son].parent = self.arena[subtree].parent;
        self.arena[left_son].right = Some(subtree);
        self.arena[left_son].r_height = self.subtree_height(subtree);
        self.arena[subtree].parent = Some(left_son);

        left_son
    }

    #[doc(hidden)]
    pub fn check_invariants(&self) -> bool {
        fn check<K: Copy + Ord, V>(
            tree: &AvlTree<K, V>,
            node: Option<Index>,
        ) -> Option<i16> {
            match node {
                None => Some(0),
                Some(idx) => {
                    let n = &tree.arena[idx];
                    let lh = check(tree, n.left)?;
                    let rh = check(tree, n.right)?;
                    if lh != n.l_height
                        || rh != n.r_height
                        || (lh - rh).abs() > 1
                    {
                        return None;
                    }
                    Some(1 + std::cmp::max(lh, rh))
                }
            }
        }
        check(self, self.root).is_some()
    }
}

impl<K, V> Default for AvlTree<K, V>
where
    K: Copy + Ord,
{
    fn default() -> AvlTree<K, V> {
        AvlTree::new()
    }
}

// ===== impl Iter =====

pub struct Iter<'a, K, V> {
    tree: &'a AvlTree<K, V>,
    node: Option<Index>,
}

impl<'a, K, V> Iterator for Iter<'a, K, V>
where
    K: Copy + Ord,
{
    type Item = (K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let idx = self.node?;
        let node = &self.tree.arena[idx];
        self.node = self.tree.next_node(idx);
        Some((node.key, &node.value))
    }
}

// ===== impl Node =====

impl<K, V> Node<K, V> {
    fn new(key: K, value: V) -> Node<K, V> {
        Node {
            key,
            value,
            parent: None,
            left: None,
            right: None,
            l_height: 0,
            r_height: 0,
        }
    }
}
