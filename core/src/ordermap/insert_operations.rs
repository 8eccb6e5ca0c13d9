//! Insertion: direct insert, same-parent sibling spill, and split, per the
//! data model's insertion algorithm.
//!
//! Branch (internal-node) promotion only ever does a direct insert or a
//! split — never a spill. Spilling a separator/child pair between two
//! branches would also require re-deriving the moved subtree's minimum key
//! by walking down to its leftmost leaf, which the data model's prose does
//! not actually require for correctness (no structural invariant depends on
//! branches being spilled rather than split); we keep that path simple and
//! auditable instead. See DESIGN.md.

use crate::arena::{NodeId, NULL};

use super::get_operations::is_unit_value;
use super::types::{Branch, Leaf, NodeRef, OrderedMap, PathEntry};

impl<K: Ord + Clone, V: Clone> OrderedMap<K, V> {
    /// Insert `key` -> `value`. Returns `false` without mutating the tree if
    /// `key` is already present.
    pub fn add(&mut self, key: K, value: V) -> bool {
        let (leaf_id, path) = self.descend(&key);
        if self.leaves.get(leaf_id).keys.binary_search(&key).is_ok() {
            return false;
        }
        self.insert_into_leaf(leaf_id, path, key, value);
        self.len += 1;
        true
    }

    /// Update the value for an existing key in place. `false` if absent, or
    /// if `V` is the unit type: a unit-valued map has nothing meaningful to
    /// overwrite, so callers modeling a set should use
    /// `contains`/`add`/`remove` instead.
    pub fn set(&mut self, key: &K, value: V) -> bool
    where
        V: 'static,
    {
        if is_unit_value::<V>() {
            return false;
        }
        let (leaf_id, _) = self.descend(key);
        let leaf = self.leaves.get_mut(leaf_id);
        match leaf.keys.binary_search(key) {
            Ok(pos) => {
                leaf.vals[pos] = value;
                true
            }
            Err(_) => false,
        }
    }

    fn insert_into_leaf(&mut self, leaf_id: NodeId, path: Vec<PathEntry>, key: K, value: V) {
        let cap = self.l;
        if self.leaves.get(leaf_id).keys.len() < cap {
            let leaf = self.leaves.get_mut(leaf_id);
            let pos = leaf.keys.partition_point(|k| k < &key);
            leaf.keys.insert(pos, key.clone());
            leaf.vals.insert(pos, value);
            if pos == 0 && !path.is_empty() {
                self.propagate_min_change(&path, 0, key);
            }
            return;
        }

        if let Some(&(parent_id, child_idx)) = path.last() {
            if child_idx > 0 {
                if let NodeRef::Leaf(left_id) = self.branches.get(parent_id).children[child_idx - 1] {
                    if self.leaves.get(left_id).keys.len() < cap {
                        self.spill_left(left_id, leaf_id, key, value, &path);
                        return;
                    }
                }
            }
            let siblings = self.branches.get(parent_id).children.len();
            if child_idx + 1 < siblings {
                if let NodeRef::Leaf(right_id) = self.branches.get(parent_id).children[child_idx + 1] {
                    if self.leaves.get(right_id).keys.len() < cap {
                        self.spill_right(leaf_id, right_id, key, value, &path);
                        return;
                    }
                }
            }
        }

        self.split_leaf(leaf_id, path, key, value);
    }

    /// Move the current leaf's smallest entry to a non-full left sibling,
    /// then insert `key`. The current leaf keeps its position in the
    /// parent, so only its own (new) minimum needs to propagate.
    fn spill_left(
        &mut self,
        left_id: NodeId,
        cur_id: NodeId,
        key: K,
        value: V,
        path: &[PathEntry],
    ) {
        let (k0, v0) = {
            let cur = self.leaves.get_mut(cur_id);
            (cur.keys.remove(0), cur.vals.remove(0))
        };
        {
            let left = self.leaves.get_mut(left_id);
            left.keys.push(k0);
            left.vals.push(v0);
        }
        let cur = self.leaves.get_mut(cur_id);
        let pos = cur.keys.partition_point(|k| k < &key);
        cur.keys.insert(pos, key);
        cur.vals.insert(pos, value);
        let new_min = cur.keys[0].clone();
        self.propagate_min_change(path, 0, new_min);
    }

    /// Place the larger of (current leaf's last entry, `key`) into a
    /// non-full right sibling; if `key` is the one kept in the current
    /// leaf, it is inserted in sorted order there instead.
    fn spill_right(
        &mut self,
        cur_id: NodeId,
        right_id: NodeId,
        key: K,
        value: V,
        path: &[PathEntry],
    ) {
        let cur_last = self.leaves.get(cur_id).keys.last().unwrap().clone();
        if key > cur_last {
            let right = self.leaves.get_mut(right_id);
            right.keys.insert(0, key.clone());
            right.vals.insert(0, value);
            self.propagate_min_change(path, 1, key);
        } else {
            let (k_last, v_last) = {
                let cur = self.leaves.get_mut(cur_id);
                (cur.keys.pop().unwrap(), cur.vals.pop().unwrap())
            };
            {
                let right = self.leaves.get_mut(right_id);
                right.keys.insert(0, k_last.clone());
                right.vals.insert(0, v_last);
            }
            let pos = {
                let cur = self.leaves.get_mut(cur_id);
                let pos = cur.keys.partition_point(|k| k < &key);
                cur.keys.insert(pos, key);
                cur.vals.insert(pos, value);
                pos
            };
            if pos == 0 {
                let new_min = self.leaves.get(cur_id).keys[0].clone();
                self.propagate_min_change(path, 0, new_min);
            }
            self.propagate_min_change(path, 1, k_last);
        }
    }

    fn split_leaf(&mut self, cur_id: NodeId, path: Vec<PathEntry>, key: K, value: V) {
        let (mut keys, mut vals) = {
            let cur = self.leaves.get(cur_id);
            (cur.keys.clone(), cur.vals.clone())
        };
        let pos = keys.partition_point(|k| k < &key);
        keys.insert(pos, key);
        vals.insert(pos, value);

        let left_count = self.min_leaf_entries();
        let right_keys = keys.split_off(left_count);
        let right_vals = vals.split_off(left_count);
        let new_min = right_keys[0].clone();

        let old_next = self.leaves.get(cur_id).next;
        {
            let cur = self.leaves.get_mut(cur_id);
            cur.keys = keys;
            cur.vals = vals;
        }
        let new_id = self.leaves.insert(Leaf {
            keys: right_keys,
            vals: right_vals,
            prev: cur_id,
            next: old_next,
        });
        self.leaves.get_mut(cur_id).next = new_id;
        if old_next != NULL {
            self.leaves.get_mut(old_next).prev = new_id;
        }

        self.promote(path, NodeRef::Leaf(new_id), new_min);
    }

    /// Insert a newly split-off sibling (with its separator key) into the
    /// parent recorded in `path`, direct-inserting if there's room and
    /// splitting the branch (recursing further up) otherwise. An empty path
    /// means the node that just split was the root; a new root is grown.
    pub(super) fn promote(&mut self, mut path: Vec<PathEntry>, new_child: NodeRef, sep_key: K) {
        let Some((parent_id, child_idx)) = path.pop() else {
            let new_branch = Branch {
                seps: vec![sep_key],
                children: vec![self.root, new_child],
                prev: NULL,
                next: NULL,
            };
            let id = self.branches.insert(new_branch);
            self.root = NodeRef::Branch(id);
            self.depth += 1;
            return;
        };

        if self.branches.get(parent_id).children.len() < self.d {
            let parent = self.branches.get_mut(parent_id);
            parent.children.insert(child_idx + 1, new_child);
            parent.seps.insert(child_idx, sep_key);
            return;
        }

        self.split_branch(path, parent_id, child_idx, new_child, sep_key);
    }

    fn split_branch(
        &mut self,
        path: Vec<PathEntry>,
        branch_id: NodeId,
        child_idx: usize,
        new_child: NodeRef,
        sep_key: K,
    ) {
        let (mut seps, mut children) = {
            let b = self.branches.get(branch_id);
            (b.seps.clone(), b.children.clone())
        };
        children.insert(child_idx + 1, new_child);
        seps.insert(child_idx, sep_key);

        let left_count = self.min_children();
        let right_children = children.split_off(left_count);
        let right_seps = seps.split_off(left_count);
        let promoted = seps.pop().expect("branch split always has a promoted key");

        let old_next = self.branches.get(branch_id).next;
        {
            let b = self.branches.get_mut(branch_id);
            b.seps = seps;
            b.children = children;
        }
        let new_id = self.branches.insert(Branch {
            seps: right_seps,
            children: right_children,
            prev: branch_id,
            next: old_next,
        });
        self.branches.get_mut(branch_id).next = new_id;
        if old_next != NULL {
            self.branches.get_mut(old_next).prev = new_id;
        }

        self.promote(path, NodeRef::Branch(new_id), promoted);
    }

    /// Rewrite the one separator whose subtree-minimum changed, walking up
    /// the recorded descent path. `local_offset` shifts the immediate
    /// parent's recorded child index: `0` when the node that changed is the
    /// one the path was recorded for, `1` when it's that node's right
    /// sibling (used by [`Self::spill_right`]). The global minimum has no
    /// separator anywhere and is silently skipped.
    pub(super) fn propagate_min_change(&mut self, path: &[PathEntry], local_offset: i64, new_min: K) {
        let mut offset = local_offset;
        let mut i = path.len();
        while i > 0 {
            i -= 1;
            let (parent_id, child_idx) = path[i];
            let effective = child_idx as i64 + offset;
            if effective == 0 {
                offset = 0;
                continue;
            }
            self.branches.get_mut(parent_id).seps[(effective - 1) as usize] = new_min;
            return;
        }
    }
}
