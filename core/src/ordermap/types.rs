//! Core types for the B+ tree backing an [`OrderedMap`](super::OrderedMap).
//!
//! Nodes are stored in two arenas (leaves, branches) and addressed by
//! [`NodeId`]; see `crate::arena` for why. `OrderedMap<K, ()>` degenerates to
//! an ordered set for free: `Vec<()>` is zero-sized, so no value bytes are
//! ever stored.

use crate::arena::{Arena, NodeId, NULL};

/// Either a leaf or a branch, tagged so callers don't need two arenas in
/// scope to know which one to index into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeRef {
    Leaf(NodeId),
    Branch(NodeId),
}

impl NodeRef {
    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeRef::Leaf(_))
    }
}

/// A leaf: entries in ascending key order, plus links to its immediate
/// neighbors at the same level (doubly linked list, see the data model).
#[derive(Debug, Clone)]
pub struct Leaf<K, V> {
    pub keys: Vec<K>,
    pub vals: Vec<V>,
    pub prev: NodeId,
    pub next: NodeId,
}

impl<K, V> Leaf<K, V> {
    pub fn new() -> Self {
        Self {
            keys: Vec::new(),
            vals: Vec::new(),
            prev: NULL,
            next: NULL,
        }
    }
}

/// A branch (internal node): `children.len() == seps.len() + 1`.
/// `seps[i]` is the minimum key of `children[i + 1]`'s subtree; the global
/// minimum of the whole tree never appears as a separator anywhere.
#[derive(Debug, Clone)]
pub struct Branch<K> {
    pub seps: Vec<K>,
    pub children: Vec<NodeRef>,
    pub prev: NodeId,
    pub next: NodeId,
}

impl<K> Branch<K> {
    pub fn new() -> Self {
        Self {
            seps: Vec::new(),
            children: Vec::new(),
            prev: NULL,
            next: NULL,
        }
    }
}

/// An ordered map backed by a B+ tree, per the data model's structural
/// invariants. `d` (max children of an internal node) and `L` (max entries
/// of a leaf) are fixed for the tree's lifetime.
#[derive(Debug)]
pub struct OrderedMap<K, V> {
    pub(super) d: usize,
    pub(super) l: usize,
    pub(super) root: NodeRef,
    pub(super) depth: usize,
    pub(super) len: usize,
    pub(super) leaves: Arena<Leaf<K, V>>,
    pub(super) branches: Arena<Branch<K>>,
}

/// A step recorded while descending from the root: the branch visited and
/// the index of the child that descent continued into.
pub(super) type PathEntry = (NodeId, usize);
