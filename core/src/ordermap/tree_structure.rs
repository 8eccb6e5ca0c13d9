//! Structural introspection: node counts and a debug-formatted dump of the
//! tree shape, independent of key/value contents.

use super::types::{NodeRef, OrderedMap};

/// Counts of live nodes at each level, root-first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeCounts {
    pub leaves: usize,
    pub branches: usize,
}

impl<K: Ord, V> OrderedMap<K, V> {
    /// Count live leaves and branches by walking the whole tree.
    pub fn node_counts(&self) -> NodeCounts {
        let mut counts = NodeCounts {
            leaves: 0,
            branches: 0,
        };
        self.count_node(self.root, &mut counts);
        counts
    }

    fn count_node(&self, node: NodeRef, counts: &mut NodeCounts) {
        match node {
            NodeRef::Leaf(_) => counts.leaves += 1,
            NodeRef::Branch(id) => {
                counts.branches += 1;
                for child in &self.branches.get(id).children {
                    self.count_node(*child, counts);
                }
            }
        }
    }

    /// Whether the root itself is a leaf (tree fits in a single node).
    pub fn root_is_leaf(&self) -> bool {
        self.root.is_leaf()
    }
}
