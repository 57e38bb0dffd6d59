//! Child placement policy.
//!
//! A new child lands as close to its parent and siblings as the current
//! layout allows:
//!
//! - First child: scan forward from the parent over the occupied run that
//!   follows it and take the first vacant slot, appending at the end when the
//!   run reaches the end of the array or the scan window. In the common
//!   append-only case the parent is the last node written and its first child
//!   lands directly behind it.
//! - Further children: the slot right after the last sibling, when it is
//!   vacant or one past the end.
//! - Otherwise the whole child block moves to the end of the array, the new
//!   child is appended behind it, and as many vacant slots as the block holds
//!   are reserved after it. Blocks therefore grow geometrically and repeated
//!   sibling inserts cost amortized O(1).
//!
//! The slots a block leaves behind become forwarding tombstones. They are
//! never reused within an epoch, so a handle to a moved node keeps resolving
//! to that node until the next re-layout.
//!
//! Every allocation happens before the first write, so a failed insertion
//! leaves the store untouched.

use super::{MAX_SLOTS, Node, NodeId, NodeStore, Slot};
use crate::error::{Result, TreeError, try_reserve};
use tracing::{debug, trace};

/// Number of slots the first-child scan inspects before giving up and
/// appending at the end of the array.
pub const PLACEMENT_WINDOW: usize = 64;

impl<T> NodeStore<T> {
    /// Adds `payload` as the last child of `parent`.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `parent` is out of range, stale, or a vacant slot (`InvalidParent`)
    /// - the backing array cannot grow (`OutOfMemory`)
    pub fn add_child(&mut self, parent: NodeId, payload: T) -> Result<NodeId> {
        let parent_index = self.resolve_parent(parent)?;
        let (first_child, child_count) = match self.node_at(parent_index) {
            Some(node) => (node.first_child as usize, node.child_count as usize),
            None => return Err(TreeError::InvalidParent(format!("{parent} is not live"))),
        };
        if child_count >= u32::MAX as usize {
            return Err(TreeError::invalid_argument(format!("{parent} has the maximum child count")));
        }

        let index = if child_count == 0 {
            self.first_free_after(parent_index)
        } else if self.is_free(first_child + child_count) {
            first_child + child_count
        } else {
            self.relocate_children(parent_index, first_child, child_count)?
        };

        self.occupy(index, Node::new(payload, parent_index as u32))?;

        if let Some(node) = self.node_at_mut(parent_index) {
            if node.child_count == 0 {
                node.first_child = index as u32;
            }
            node.child_count += 1;
        }
        self.len += 1;

        trace!(parent = parent_index, slot = index, "placed child");
        Ok(self.id(index as u32))
    }

    /// True when `index` is vacant or one past the end.
    #[inline]
    fn is_free(&self, index: usize) -> bool {
        match self.slots.get(index) {
            Some(slot) => matches!(slot, Slot::Vacant),
            None => index == self.slots.len(),
        }
    }

    /// First vacant slot after the occupied run that follows `parent`.
    fn first_free_after(&self, parent: usize) -> usize {
        let end = self.slots.len();
        let mut index = parent + 1;
        while index < end && index <= parent + PLACEMENT_WINDOW {
            match self.slots[index] {
                Slot::Vacant => return index,
                Slot::Occupied(_) => index += 1,
                // A tombstone ends the run; the gap is not reusable
                Slot::Moved(_) => break,
            }
        }
        end
    }

    /// Writes `node` into a free slot, appending when `index` is the end.
    fn occupy(&mut self, index: usize, node: Node<T>) -> Result<()> {
        if index == self.slots.len() {
            if index >= MAX_SLOTS {
                return Err(TreeError::OutOfMemory { requested: 1 });
            }
            try_reserve(&mut self.slots, 1)?;
            self.slots.push(Slot::Occupied(node));
        } else {
            debug_assert!(matches!(self.slots[index], Slot::Vacant), "placing over a used slot");
            self.slots[index] = Slot::Occupied(node);
            self.tombstones -= 1;
        }
        Ok(())
    }

    /// Moves the child block of `parent` to the end of the array.
    ///
    /// Returns the slot right after the moved block, which is where the
    /// next child goes. That slot and the growth room behind it are vacant.
    fn relocate_children(&mut self, parent: usize, first: usize, count: usize) -> Result<usize> {
        // Block, the incoming child, then `count` slots of growth room
        let needed = 2 * count + 1;
        if self.slots.len() + needed > MAX_SLOTS {
            return Err(TreeError::OutOfMemory { requested: needed });
        }
        try_reserve(&mut self.slots, needed)?;

        let new_first = self.slots.len();
        for offset in 0..count {
            let new_index = new_first + offset;
            let moved = std::mem::replace(&mut self.slots[first + offset], Slot::Moved(new_index as u32));
            let grandchildren = moved.node().map_or(0..0, Node::children_range);
            self.slots.push(moved);
            for grandchild in grandchildren {
                if let Some(node) = self.node_at_mut(grandchild) {
                    node.parent = new_index as u32;
                }
            }
        }
        // The old block (now forwarding) plus the growth room
        self.slots.extend(std::iter::repeat_with(|| Slot::Vacant).take(count + 1));
        self.tombstones += 2 * count + 1;

        if let Some(node) = self.node_at_mut(parent) {
            node.first_child = new_first as u32;
        }

        debug!(parent, from = first, to = new_first, count, "relocated child block");
        Ok(new_first + count)
    }
}
