//! Read-only traversals.
//!
//! All walks are iterative with an explicit stack or queue, so a degenerate
//! chain of any depth is safe to visit.

use super::{NodeId, NodeRef, NodeStore, Slot};
use std::collections::VecDeque;

/// Depth-first, parent-before-children iterator.
pub struct Preorder<'a, T> {
    store: &'a NodeStore<T>,
    stack: Vec<usize>,
}

impl<'a, T> Iterator for Preorder<'a, T> {
    type Item = NodeRef<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.stack.pop()?;
        let view = self.store.view(index)?;
        // Reversed so the first child is popped next
        self.stack.extend(view.node.children_range().rev());
        Some(view)
    }
}

/// Level-order iterator.
pub struct BreadthFirst<'a, T> {
    store: &'a NodeStore<T>,
    queue: VecDeque<usize>,
}

impl<'a, T> Iterator for BreadthFirst<'a, T> {
    type Item = NodeRef<'a, T>;

    fn next(&mut self) -> Option<Self::Item> {
        let index = self.queue.pop_front()?;
        let view = self.store.view(index)?;
        self.queue.extend(view.node.children_range());
        Some(view)
    }
}

impl<T> NodeStore<T> {
    /// Preorder walk from the root
    pub fn preorder(&self) -> Preorder<'_, T> {
        let stack = self.root().map(NodeId::index).into_iter().collect();
        Preorder { store: self, stack }
    }

    /// Level-order walk from the root
    pub fn breadth_first(&self) -> BreadthFirst<'_, T> {
        let queue = self.root().map(NodeId::index).into_iter().collect();
        BreadthFirst { store: self, queue }
    }

    /// Visits every live node exactly once, in preorder.
    ///
    /// This is the hook binding layers use to release external references
    /// held in payloads before the tree is dropped or cleared.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(NodeId, &T),
    {
        for node in self.preorder() {
            f(node.id(), node.payload());
        }
    }

    /// Visits every live node exactly once, in level order.
    pub fn for_each_breadth_first<F>(&self, mut f: F)
    where
        F: FnMut(NodeId, &T),
    {
        for node in self.breadth_first() {
            f(node.id(), node.payload());
        }
    }

    /// Visits live slots in physical array order.
    ///
    /// After a re-layout this is level order with no pointer chasing at all.
    pub fn for_each_slot<F>(&self, mut f: F)
    where
        F: FnMut(NodeId, &T),
    {
        for (index, slot) in self.slots.iter().enumerate() {
            if let Slot::Occupied(node) = slot {
                f(self.id(index as u32), &node.payload);
            }
        }
    }

    /// First node in preorder whose payload matches `pred`.
    pub fn position<P>(&self, mut pred: P) -> Option<NodeId>
    where
        P: FnMut(&T) -> bool,
    {
        self.preorder().find(|node| pred(node.payload())).map(|node| node.id())
    }

    /// Slot indices of all live nodes, in preorder.
    pub(crate) fn preorder_indices(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.len);
        let mut stack: Vec<usize> = self.root().map(NodeId::index).into_iter().collect();
        while let Some(index) = stack.pop() {
            if let Some(node) = self.node_at(index) {
                order.push(index);
                stack.extend(node.children_range().rev());
            }
        }
        order
    }

    /// Removes every payload, returning them in preorder, and leaves the
    /// store empty in a new epoch.
    pub fn drain_payloads(&mut self) -> Vec<T> {
        let order = self.preorder_indices();
        let mut nodes: Vec<Option<_>> =
            std::mem::take(&mut self.slots).into_iter().map(Slot::into_node).collect();
        let payloads = order
            .into_iter()
            .filter_map(|index| nodes.get_mut(index).and_then(Option::take))
            .map(|node| node.payload)
            .collect();
        self.clear();
        payloads
    }
}
