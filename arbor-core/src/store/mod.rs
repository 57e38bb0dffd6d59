//! Array-backed node storage with index links.
//!
//! # Design Principles
//!
//! Every node lives in one slot of a flat `Vec`. Links between nodes are slot
//! indices, not pointers, so the whole tree is one allocation and a
//! breadth-first layout turns sibling iteration into a sequential scan.
//!
//! # Layout Invariants
//!
//! - A slot is occupied, vacant (growth room left by the placer), or moved
//!   (a tombstone forwarding to the node's new slot)
//! - If a node has `child_count > 0`, the slots
//!   `[first_child, first_child + child_count)` are occupied and hold exactly
//!   its children, in order
//! - Every occupied slot is reachable from the root
//! - Forwarding always points to a higher index, so chains terminate
//! - Index links use `NIL` (`u32::MAX`) for "no parent" / "no children"
//!
//! # Handles
//!
//! A [`NodeId`] pairs a slot index with the store's epoch. Within an epoch a
//! handle stays usable even if the placer moves its node: lookups follow the
//! forwarding tombstone. Operations that renumber slots (re-layout, height
//! balancing, clear) bump the epoch, which turns every outstanding handle
//! stale. Stale handles are rejected rather than silently aliasing whatever
//! now occupies the slot; use the returned [`Remap`](crate::Remap) to carry
//! handles across.

mod placer;
mod traverse;

pub use placer::PLACEMENT_WINDOW;
pub use traverse::{BreadthFirst, Preorder};

use crate::error::{Result, TreeError, try_reserve};
use std::fmt;
use std::ops::Range;

/// Sentinel for an absent index link
pub(crate) const NIL: u32 = u32::MAX;

/// Largest number of slots a store can address (`NIL` is reserved)
pub const MAX_SLOTS: usize = NIL as usize;

/// Handle to a node: slot index plus the epoch it was issued in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId {
    index: u32,
    epoch: u32,
}

impl NodeId {
    #[inline]
    pub(crate) const fn new(index: u32, epoch: u32) -> Self {
        Self { index, epoch }
    }

    /// Physical slot index of the node
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    /// Epoch the handle was issued in
    #[inline]
    #[must_use]
    pub const fn epoch(self) -> u32 {
        self.epoch
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}@{}", self.index, self.epoch)
    }
}

/// One occupied slot: payload plus index links.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Node<T> {
    pub(crate) payload: T,
    pub(crate) parent: u32,
    pub(crate) first_child: u32,
    pub(crate) child_count: u32,
}

impl<T> Node<T> {
    #[inline]
    pub(crate) fn new(payload: T, parent: u32) -> Self {
        Self { payload, parent, first_child: NIL, child_count: 0 }
    }

    /// Payload stored in this node
    #[inline]
    pub fn payload(&self) -> &T {
        &self.payload
    }

    /// Slot index of the parent, `None` for the root
    #[inline]
    pub fn parent_index(&self) -> Option<usize> {
        (self.parent != NIL).then_some(self.parent as usize)
    }

    /// Slot index of the first child, `None` for a leaf
    #[inline]
    pub fn first_child_index(&self) -> Option<usize> {
        (self.first_child != NIL).then_some(self.first_child as usize)
    }

    /// Number of children
    #[inline]
    pub fn child_count(&self) -> usize {
        self.child_count as usize
    }

    /// Slot range holding the children (empty for a leaf)
    #[inline]
    pub(crate) fn children_range(&self) -> Range<usize> {
        if self.child_count == 0 {
            return 0..0;
        }
        let start = self.first_child as usize;
        start..start + self.child_count as usize
    }
}

/// One entry of the backing array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Slot<T> {
    /// Live node
    Occupied(Node<T>),
    /// Free slot reserved as growth room behind a relocated child block
    Vacant,
    /// Tombstone left by a relocation; forwards to the node's new slot
    Moved(u32),
}

impl<T> Slot<T> {
    /// Node held by the slot, if occupied
    #[inline]
    pub fn node(&self) -> Option<&Node<T>> {
        match self {
            Slot::Occupied(node) => Some(node),
            _ => None,
        }
    }

    #[inline]
    pub(crate) fn node_mut(&mut self) -> Option<&mut Node<T>> {
        match self {
            Slot::Occupied(node) => Some(node),
            _ => None,
        }
    }

    /// True for a live node
    #[inline]
    pub fn is_occupied(&self) -> bool {
        matches!(self, Slot::Occupied(_))
    }

    #[inline]
    pub(crate) fn into_node(self) -> Option<Node<T>> {
        match self {
            Slot::Occupied(node) => Some(node),
            _ => None,
        }
    }
}

/// Flat, growable node array with a designated root.
#[derive(Debug, Clone)]
pub struct NodeStore<T> {
    slots: Vec<Slot<T>>,
    root: u32,
    len: usize,
    epoch: u32,
    tombstones: usize,
}

impl<T> Default for NodeStore<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> NodeStore<T> {
    /// Creates an empty store
    pub fn new() -> Self {
        Self { slots: Vec::new(), root: NIL, len: 0, epoch: 0, tombstones: 0 }
    }

    /// Creates an empty store with room for `capacity` slots
    pub fn with_capacity(capacity: usize) -> Self {
        Self { slots: Vec::with_capacity(capacity), ..Self::new() }
    }

    /// Builds a store from slots already in a consistent layout.
    ///
    /// Callers (decode, rebalancing) guarantee the layout invariants; the
    /// store only recounts live nodes and tombstones.
    pub(crate) fn from_slots(slots: Vec<Slot<T>>, root: u32, epoch: u32) -> Self {
        let len = slots.iter().filter(|slot| slot.is_occupied()).count();
        let tombstones = slots.len() - len;
        Self { slots, root, len, epoch, tombstones }
    }

    /// Swaps in a freshly built slot array and starts a new epoch.
    pub(crate) fn install(&mut self, slots: Vec<Slot<T>>, root: u32) {
        let epoch = self.epoch.wrapping_add(1);
        *self = Self::from_slots(slots, root, epoch);
    }

    /// Moves the slot array out, leaving the store without slots until the
    /// caller installs a replacement.
    #[inline]
    pub(crate) fn take_slots(&mut self) -> Vec<Slot<T>> {
        std::mem::take(&mut self.slots)
    }

    /// Number of live nodes
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the store holds no nodes
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current epoch; handles from any other epoch are stale
    #[inline]
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// Handle of the root node
    #[inline]
    pub fn root(&self) -> Option<NodeId> {
        (self.root != NIL).then(|| NodeId::new(self.root, self.epoch))
    }

    /// Number of vacant or moved slots awaiting the next re-layout
    #[inline]
    pub fn tombstones(&self) -> usize {
        self.tombstones
    }

    /// Raw slot array in physical order
    #[inline]
    pub fn slots(&self) -> &[Slot<T>] {
        &self.slots
    }

    /// Allocated slot capacity of the backing array
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.capacity()
    }

    #[inline]
    pub(crate) fn id(&self, index: u32) -> NodeId {
        NodeId::new(index, self.epoch)
    }

    #[inline]
    pub(crate) fn node_at(&self, index: usize) -> Option<&Node<T>> {
        self.slots.get(index).and_then(Slot::node)
    }

    #[inline]
    pub(crate) fn node_at_mut(&mut self, index: usize) -> Option<&mut Node<T>> {
        self.slots.get_mut(index).and_then(Slot::node_mut)
    }

    /// Resolves a handle to a live slot index of the current epoch,
    /// following forwarding tombstones.
    #[inline]
    pub(crate) fn resolve(&self, id: NodeId) -> Option<usize> {
        self.resolve_parent(id).ok()
    }

    /// Like [`resolve`](Self::resolve), but explains the failure.
    pub(crate) fn resolve_parent(&self, id: NodeId) -> Result<usize> {
        if id.epoch != self.epoch {
            return Err(TreeError::InvalidParent(format!(
                "{id} is stale (store epoch is {})",
                self.epoch
            )));
        }
        let mut index = id.index();
        loop {
            match self.slots.get(index) {
                Some(Slot::Occupied(_)) => return Ok(index),
                Some(Slot::Moved(to)) => index = *to as usize,
                Some(Slot::Vacant) => {
                    return Err(TreeError::InvalidParent(format!("{id} names a vacant slot")));
                }
                None => {
                    return Err(TreeError::InvalidParent(format!(
                        "{id} is out of range ({} slots)",
                        self.slots.len()
                    )));
                }
            }
        }
    }

    /// True when `id` names a live node of the current epoch
    #[inline]
    pub fn is_valid(&self, id: NodeId) -> bool {
        self.resolve(id).is_some()
    }

    /// Borrowing view of a node
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_, T>> {
        let index = self.resolve(id)?;
        self.view(index)
    }

    #[inline]
    pub(crate) fn view(&self, index: usize) -> Option<NodeRef<'_, T>> {
        let node = self.node_at(index)?;
        Some(NodeRef { store: self, index, node })
    }

    /// Payload of a node
    #[inline]
    pub fn payload(&self, id: NodeId) -> Option<&T> {
        let index = self.resolve(id)?;
        self.node_at(index).map(Node::payload)
    }

    /// Mutable payload of a node
    #[inline]
    pub fn payload_mut(&mut self, id: NodeId) -> Option<&mut T> {
        let index = self.resolve(id)?;
        self.node_at_mut(index).map(|node| &mut node.payload)
    }

    /// Parent handle; `None` for the root or an invalid handle
    #[inline]
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        let index = self.resolve(id)?;
        let node = self.node_at(index)?;
        node.parent_index().map(|p| self.id(p as u32))
    }

    /// Number of children; `None` for an invalid handle
    #[inline]
    pub fn child_count(&self, id: NodeId) -> Option<usize> {
        let index = self.resolve(id)?;
        self.node_at(index).map(Node::child_count)
    }

    /// Handle of the `i`-th child
    #[inline]
    pub fn child_at(&self, id: NodeId, i: usize) -> Option<NodeId> {
        let index = self.resolve(id)?;
        let range = self.node_at(index)?.children_range();
        (i < range.len()).then(|| self.id((range.start + i) as u32))
    }

    /// Children of a node in order (empty for an invalid handle)
    pub fn children_of(&self, id: NodeId) -> Children<'_, T> {
        let range = self
            .resolve(id)
            .and_then(|index| self.node_at(index))
            .map_or(0..0, Node::children_range);
        Children { store: self, range }
    }

    /// Places the root of an empty store in slot 0.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the store already has a root, or
    /// `OutOfMemory` if slot 0 cannot be allocated.
    pub fn create_root(&mut self, payload: T) -> Result<NodeId> {
        if self.root != NIL {
            return Err(TreeError::invalid_argument("store already has a root"));
        }
        debug_assert!(self.slots.is_empty(), "rootless store must hold no slots");
        try_reserve(&mut self.slots, 1)?;
        self.slots.push(Slot::Occupied(Node::new(payload, NIL)));
        self.root = 0;
        self.len = 1;
        self.tombstones = 0;
        Ok(self.id(0))
    }

    /// Drops every node and starts a new epoch; capacity is retained.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.root = NIL;
        self.len = 0;
        self.tombstones = 0;
        self.epoch = self.epoch.wrapping_add(1);
    }
}

/// Borrowed view of one live node.
///
/// The view borrows the store, so it cannot be held across a mutation.
pub struct NodeRef<'a, T> {
    store: &'a NodeStore<T>,
    index: usize,
    node: &'a Node<T>,
}

impl<T> Clone for NodeRef<'_, T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for NodeRef<'_, T> {}

impl<'a, T> NodeRef<'a, T> {
    /// Handle of this node
    #[inline]
    pub fn id(&self) -> NodeId {
        self.store.id(self.index as u32)
    }

    /// Payload of this node
    #[inline]
    pub fn payload(&self) -> &'a T {
        &self.node.payload
    }

    /// Number of children
    #[inline]
    pub fn child_count(&self) -> usize {
        self.node.child_count()
    }

    /// True when the node has no children
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.node.child_count == 0
    }

    /// Parent view; `None` for the root
    pub fn parent(&self) -> Option<NodeRef<'a, T>> {
        self.store.view(self.node.parent_index()?)
    }

    /// View of the `i`-th child
    pub fn child(&self, i: usize) -> Option<NodeRef<'a, T>> {
        let range = self.node.children_range();
        if i >= range.len() {
            return None;
        }
        self.store.view(range.start + i)
    }

    /// Views of all children, in order
    pub fn children(&self) -> impl Iterator<Item = NodeRef<'a, T>> + 'a {
        let store = self.store;
        self.node.children_range().filter_map(move |index| store.view(index))
    }
}

impl<T: fmt::Debug> fmt::Debug for NodeRef<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeRef")
            .field("id", &self.id())
            .field("payload", self.payload())
            .field("child_count", &self.child_count())
            .finish()
    }
}

/// Iterator over the child handles of one node.
pub struct Children<'a, T> {
    store: &'a NodeStore<T>,
    range: Range<usize>,
}

impl<T> Iterator for Children<'_, T> {
    type Item = NodeId;

    #[inline]
    fn next(&mut self) -> Option<NodeId> {
        self.range.next().map(|index| self.store.id(index as u32))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.range.size_hint()
    }
}

impl<T> ExactSizeIterator for Children<'_, T> {}
