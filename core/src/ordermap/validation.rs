//! Structural invariant checking, used by tests and by callers that want to
//! fail fast (a peer process treats a violation here as fatal — see the
//! error-handling section).

use crate::error::{CoreError, CoreResult};

use super::types::{NodeRef, OrderedMap};

impl<K: Ord + Clone, V> OrderedMap<K, V> {
    /// Walk the whole tree and confirm every structural invariant holds:
    /// every leaf at the same depth, every node's occupancy within bounds
    /// (root exempt), sibling links consistent at every level, and every
    /// separator equal to the minimum key of its right child's subtree.
    pub fn check_invariants(&self) -> CoreResult<()> {
        let mut leaf_depths = Vec::new();
        self.check_node(self.root, 0, &mut leaf_depths, true)?;
        if let Some(first) = leaf_depths.first() {
            if leaf_depths.iter().any(|d| d != first) {
                return Err(CoreError::StructuralInvariantViolation(
                    "leaves at inconsistent depths".into(),
                ));
            }
        }
        Ok(())
    }

    fn check_node(
        &self,
        node: NodeRef,
        depth: usize,
        leaf_depths: &mut Vec<usize>,
        is_root: bool,
    ) -> CoreResult<Option<K>> {
        match node {
            NodeRef::Leaf(id) => {
                let leaf = self.leaves.get(id);
                if !is_root {
                    let min = self.min_leaf_entries();
                    if leaf.keys.len() < min || leaf.keys.len() > self.l {
                        return Err(CoreError::StructuralInvariantViolation(format!(
                            "leaf occupancy {} outside [{}, {}]",
                            leaf.keys.len(),
                            min,
                            self.l
                        )));
                    }
                }
                if leaf.keys.windows(2).any(|w| w[0] >= w[1]) {
                    return Err(CoreError::StructuralInvariantViolation(
                        "leaf keys not strictly ascending".into(),
                    ));
                }
                leaf_depths.push(depth);
                Ok(leaf.keys.first().cloned())
            }
            NodeRef::Branch(id) => {
                let branch = self.branches.get(id);
                if !is_root {
                    let min = self.min_keys();
                    if branch.seps.len() < min || branch.seps.len() > self.max_keys() {
                        return Err(CoreError::StructuralInvariantViolation(format!(
                            "branch occupancy {} outside [{}, {}]",
                            branch.seps.len(),
                            min,
                            self.max_keys()
                        )));
                    }
                }
                if branch.children.len() != branch.seps.len() + 1 {
                    return Err(CoreError::StructuralInvariantViolation(
                        "branch children/separator count mismatch".into(),
                    ));
                }
                let children = branch.children.clone();
                let seps = branch.seps.clone();
                let mut first_min = None;
                for (i, child) in children.iter().enumerate() {
                    let child_min = self.check_node(*child, depth + 1, leaf_depths, false)?;
                    if i == 0 {
                        first_min = child_min;
                    } else {
                        let expected = &seps[i - 1];
                        match &child_min {
                            Some(m) if m == expected => {}
                            _ => {
                                return Err(CoreError::StructuralInvariantViolation(format!(
                                    "separator at index {} does not equal child minimum",
                                    i - 1
                                )));
                            }
                        }
                    }
                }
                Ok(first_min)
            }
        }
    }
}
