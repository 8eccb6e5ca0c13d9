//! Deletion: direct removal, same-parent sibling borrow, and merge, per the
//! data model's deletion algorithm. Merge recursion (`afterNodeMerge`) is
//! implemented once, uniformly, for both leaf-level and branch-level
//! underflow, since removing a child from a branch is the same operation
//! regardless of which level triggered it.

use crate::arena::{NodeId, NULL};

use super::types::{NodeRef, OrderedMap, PathEntry};

impl<K: Ord + Clone, V: Clone> OrderedMap<K, V> {
    /// Remove `key`. A no-op (and `false`) if absent — the tree is left
    /// untouched, including the recorded descent path.
    pub fn remove(&mut self, key: &K) -> bool {
        let (leaf_id, path) = self.descend(key);
        let pos = match self.leaves.get(leaf_id).keys.binary_search(key) {
            Ok(p) => p,
            Err(_) => return false,
        };
        {
            let leaf = self.leaves.get_mut(leaf_id);
            leaf.keys.remove(pos);
            leaf.vals.remove(pos);
        }
        self.len -= 1;

        if path.is_empty() {
            // root leaf: exempt from occupancy bounds, never merges.
            return true;
        }

        if pos == 0 {
            if let Some(new_min) = self.leaves.get(leaf_id).keys.first().cloned() {
                self.propagate_min_change(&path, 0, new_min);
            }
        }

        if self.leaves.get(leaf_id).keys.len() >= self.min_leaf_entries() {
            return true;
        }

        self.fix_leaf_underflow(leaf_id, path);
        true
    }

    fn fix_leaf_underflow(&mut self, leaf_id: NodeId, path: Vec<PathEntry>) {
        let (parent_id, child_idx) = *path.last().expect("non-root leaf always has a parent");
        let min_leaf = self.min_leaf_entries();

        if child_idx > 0 {
            if let NodeRef::Leaf(left_id) = self.branches.get(parent_id).children[child_idx - 1] {
                if self.leaves.get(left_id).keys.len() > min_leaf {
                    let (k, v) = {
                        let left = self.leaves.get_mut(left_id);
                        (left.keys.pop().unwrap(), left.vals.pop().unwrap())
                    };
                    {
                        let cur = self.leaves.get_mut(leaf_id);
                        cur.keys.insert(0, k.clone());
                        cur.vals.insert(0, v);
                    }
                    self.propagate_min_change(&path, 0, k);
                    return;
                }
            }
        }

        let siblings = self.branches.get(parent_id).children.len();
        if child_idx + 1 < siblings {
            if let NodeRef::Leaf(right_id) = self.branches.get(parent_id).children[child_idx + 1] {
                if self.leaves.get(right_id).keys.len() > min_leaf {
                    let (k, v) = {
                        let right = self.leaves.get_mut(right_id);
                        (right.keys.remove(0), right.vals.remove(0))
                    };
                    {
                        let cur = self.leaves.get_mut(leaf_id);
                        cur.keys.push(k);
                        cur.vals.push(v);
                    }
                    let new_right_min = self.leaves.get(right_id).keys[0].clone();
                    self.propagate_min_change(&path, 1, new_right_min);
                    return;
                }
            }
        }

        if child_idx > 0 {
            if let NodeRef::Leaf(left_id) = self.branches.get(parent_id).children[child_idx - 1] {
                self.merge_leaves(left_id, leaf_id, parent_id, child_idx, path);
                return;
            }
        }
        if child_idx + 1 < siblings {
            if let NodeRef::Leaf(right_id) = self.branches.get(parent_id).children[child_idx + 1] {
                self.merge_leaves(leaf_id, right_id, parent_id, child_idx + 1, path);
                return;
            }
        }
        unreachable!("a non-root leaf always has at least one sibling in its parent");
    }

    /// Absorb `right_id`'s entries into `left_id`, unlink `right_id` from
    /// the leaf sibling chain, and fix up `parent_id` (which loses the
    /// child at `removed_idx`).
    fn merge_leaves(&mut self, left_id: NodeId, right_id: NodeId, parent_id: NodeId, removed_idx: usize, mut path: Vec<PathEntry>) {
        let right = self.leaves.remove(right_id);
        {
            let left = self.leaves.get_mut(left_id);
            left.keys.extend(right.keys);
            left.vals.extend(right.vals);
            left.next = right.next;
        }
        if right.next != NULL {
            self.leaves.get_mut(right.next).prev = left_id;
        }

        path.pop(); // drop (parent_id, child_idx) — after_node_merge re-derives its own position from `path`.
        self.after_node_merge(parent_id, removed_idx, path);
    }

    /// Remove the child at `removed_idx` (and its associated separator)
    /// from `node_id`, then either propagate a min-change, return (node
    /// still within bounds), or fix `node_id`'s own underflow by borrowing
    /// from / merging with a same-parent sibling — recursing upward via the
    /// same path. `path` holds the ancestors strictly above `node_id`.
    fn after_node_merge(&mut self, node_id: NodeId, removed_idx: usize, path: Vec<PathEntry>) {
        let old_sep0 = self.branches.get(node_id).seps.first().cloned();
        {
            let node = self.branches.get_mut(node_id);
            node.children.remove(removed_idx);
            if removed_idx == 0 {
                node.seps.remove(0);
            } else {
                node.seps.remove(removed_idx - 1);
            }
        }
        let min_changed = if removed_idx == 0 { old_sep0 } else { None };

        let is_root = path.is_empty() && self.root == NodeRef::Branch(node_id);
        if is_root {
            let (children_len, only_child) = {
                let node = self.branches.get(node_id);
                (node.children.len(), node.children.first().copied())
            };
            if children_len == 1 {
                self.root = only_child.unwrap();
                self.branches.remove(node_id);
                self.depth -= 1;
            }
            return;
        }

        if let Some(nm) = min_changed {
            self.propagate_min_change(&path, 0, nm);
        }

        if self.branches.get(node_id).seps.len() >= self.min_keys() {
            return;
        }

        self.fix_branch_underflow(node_id, path);
    }

    fn fix_branch_underflow(&mut self, node_id: NodeId, path: Vec<PathEntry>) {
        let (parent_id, child_idx) = *path.last().expect("non-root branch always has a parent");
        let min_keys = self.min_keys();

        if child_idx > 0 {
            if let NodeRef::Branch(left_id) = self.branches.get(parent_id).children[child_idx - 1] {
                if self.branches.get(left_id).seps.len() > min_keys {
                    let (borrowed_child, borrowed_sep) = {
                        let left = self.branches.get_mut(left_id);
                        (left.children.pop().unwrap(), left.seps.pop().unwrap())
                    };
                    let old_min_of_node = self.branches.get(parent_id).seps[child_idx - 1].clone();
                    {
                        let node = self.branches.get_mut(node_id);
                        node.children.insert(0, borrowed_child);
                        node.seps.insert(0, old_min_of_node);
                    }
                    self.propagate_min_change(&path, 0, borrowed_sep);
                    return;
                }
            }
        }

        let siblings = self.branches.get(parent_id).children.len();
        if child_idx + 1 < siblings {
            if let NodeRef::Branch(right_id) = self.branches.get(parent_id).children[child_idx + 1] {
                if self.branches.get(right_id).seps.len() > min_keys {
                    let (borrowed_child, _) = {
                        let right = self.branches.get_mut(right_id);
                        (right.children.remove(0), ())
                    };
                    let bridging_sep = self.branches.get(parent_id).seps[child_idx].clone();
                    self.branches.get_mut(right_id).seps.remove(0);
                    {
                        let node = self.branches.get_mut(node_id);
                        node.children.push(borrowed_child);
                        node.seps.push(bridging_sep);
                    }
                    let new_right_min = self.leftmost_key(NodeRef::Branch(right_id));
                    self.propagate_min_change(&path, 1, new_right_min);
                    return;
                }
            }
        }

        if child_idx > 0 {
            if let NodeRef::Branch(left_id) = self.branches.get(parent_id).children[child_idx - 1] {
                self.merge_branches(left_id, node_id, parent_id, child_idx, path);
                return;
            }
        }
        if child_idx + 1 < siblings {
            if let NodeRef::Branch(right_id) = self.branches.get(parent_id).children[child_idx + 1] {
                self.merge_branches(node_id, right_id, parent_id, child_idx + 1, path);
                return;
            }
        }
        unreachable!("a non-root branch always has at least one sibling in its parent");
    }

    fn merge_branches(&mut self, left_id: NodeId, right_id: NodeId, parent_id: NodeId, removed_idx: usize, mut path: Vec<PathEntry>) {
        let bridging_sep = self.branches.get(parent_id).seps[removed_idx - 1].clone();
        let right = self.branches.remove(right_id);
        {
            let left = self.branches.get_mut(left_id);
            left.seps.push(bridging_sep);
            left.seps.extend(right.seps);
            left.children.extend(right.children);
            left.next = right.next;
        }
        if right.next != NULL {
            self.branches.get_mut(right.next).prev = left_id;
        }

        path.pop();
        self.after_node_merge(parent_id, removed_idx, path);
    }

    /// Descend via `children[0]`/`keys[0]` to find the smallest key stored
    /// under `node`. Used when a branch-level borrow needs the new minimum
    /// of a sibling whose own separator array is now empty.
    pub(super) fn leftmost_key(&self, node: NodeRef) -> K {
        let mut cur = node;
        loop {
            match cur {
                NodeRef::Leaf(id) => return self.leaves.get(id).keys[0].clone(),
                NodeRef::Branch(id) => cur = self.branches.get(id).children[0],
            }
        }
    }
}
