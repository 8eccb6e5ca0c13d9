//! Index-based arena allocator for tree nodes.
//!
//! Nodes never hold owning references to siblings or children: every link is
//! a `NodeId`, an index into one of these arenas. This sidesteps the cyclic
//! ownership a doubly linked leaf chain would otherwise require.

use std::fmt::Debug;

/// Handle into an [`Arena`]. `NULL` marks the absence of a link (no parent,
/// no left/right sibling).
pub type NodeId = u32;

/// Sentinel for "no node".
pub const NULL: NodeId = u32::MAX;

/// A growable, slot-reusing store of `T`, addressed by [`NodeId`].
#[derive(Debug)]
pub struct Arena<T> {
    slots: Vec<Option<T>>,
    free: Vec<NodeId>,
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
        }
    }

    /// Allocate `item`, returning its new id.
    pub fn insert(&mut self, item: T) -> NodeId {
        if let Some(id) = self.free.pop() {
            self.slots[id as usize] = Some(item);
            id
        } else {
            let id = self.slots.len() as NodeId;
            self.slots.push(Some(item));
            id
        }
    }

    /// Remove and return the item at `id`. Panics on a stale or null id;
    /// callers only ever hold ids they allocated themselves.
    pub fn remove(&mut self, id: NodeId) -> T {
        let item = self.slots[id as usize]
            .take()
            .expect("arena: remove of vacant slot");
        self.free.push(id);
        item
    }

    pub fn get(&self, id: NodeId) -> &T {
        self.slots[id as usize]
            .as_ref()
            .expect("arena: get of vacant slot")
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut T {
        self.slots[id as usize]
            .as_mut()
            .expect("arena: get_mut of vacant slot")
    }

    pub fn len_live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self::new()
    }
}
