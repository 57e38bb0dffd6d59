//! Breadth-first re-layout.

use super::{Remap, build_table};
use crate::error::{Result, try_reserve};
use crate::store::{NIL, NodeStore, Slot};
use tracing::debug;

impl<T> NodeStore<T> {
    /// Rewrites the slot array into breadth-first order.
    ///
    /// The shape of the tree is unchanged. Afterwards there are no
    /// tombstones, slot order is level order, and each node's children sit
    /// directly behind the children of its left neighbour on the same level.
    /// Running it again on the result reproduces the same array.
    ///
    /// Starts a new epoch unless the store is empty.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the new array cannot be allocated; the store
    /// is left untouched.
    pub fn relayout(&mut self) -> Result<Remap> {
        if self.is_empty() {
            return Ok(Remap::identity(self.epoch()));
        }

        let order: Vec<usize> = self.breadth_first().map(|node| node.id().index()).collect();
        let table = build_table(self.slots(), &order)?;

        let mut fresh = Vec::new();
        try_reserve(&mut fresh, order.len())?;

        // Nothing below can fail
        let from_epoch = self.epoch();
        let dropped = self.tombstones();
        let mut old_slots = self.take_slots();
        for &old in &order {
            let slot = std::mem::replace(&mut old_slots[old], Slot::Vacant);
            if let Slot::Occupied(mut node) = slot {
                if node.parent != NIL {
                    node.parent = table[node.parent as usize];
                }
                if node.child_count > 0 {
                    node.first_child = table[node.first_child as usize];
                }
                fresh.push(Slot::Occupied(node));
            }
        }

        self.install(fresh, 0);
        debug!(nodes = order.len(), dropped, epoch = self.epoch(), "breadth-first re-layout");
        Ok(Remap::new(from_epoch, self.epoch(), table))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::NodeId;

    /// Tree whose placement left tombstones behind:
    /// r -> [a -> [a1, a2], b -> [b1], c]
    fn fragmented() -> (NodeStore<&'static str>, Vec<NodeId>) {
        let mut store = NodeStore::new();
        let r = store.create_root("r").unwrap();
        let a = store.add_child(r, "a").unwrap();
        let a1 = store.add_child(a, "a1").unwrap();
        let b = store.add_child(r, "b").unwrap();
        let b1 = store.add_child(b, "b1").unwrap();
        let a2 = store.add_child(a, "a2").unwrap();
        let c = store.add_child(r, "c").unwrap();
        (store, vec![r, a, a1, b, b1, a2, c])
    }

    fn payload_order<T: Copy>(store: &NodeStore<T>) -> Vec<T> {
        store.slots().iter().filter_map(|slot| slot.node().map(|n| *n.payload())).collect()
    }

    #[test]
    fn test_relayout_produces_level_order() {
        let (mut store, _) = fragmented();
        assert!(store.tombstones() > 0);

        store.relayout().unwrap();

        assert_eq!(store.tombstones(), 0);
        assert_eq!(store.slots().len(), 7);
        assert_eq!(payload_order(&store), vec!["r", "a", "b", "c", "a1", "a2", "b1"]);
        let root = store.root().unwrap();
        assert_eq!(root.index(), 0);
        let kids: Vec<_> = store.children_of(root).map(|id| id.index()).collect();
        assert_eq!(kids, vec![1, 2, 3]);
    }

    #[test]
    fn test_relayout_preserves_shape() {
        let (mut store, _) = fragmented();
        let before: Vec<_> = store.preorder().map(|n| (*n.payload(), n.child_count())).collect();

        store.relayout().unwrap();

        let after: Vec<_> = store.preorder().map(|n| (*n.payload(), n.child_count())).collect();
        assert_eq!(before, after);
        for node in store.preorder() {
            for child in node.children() {
                assert_eq!(child.parent().unwrap().id(), node.id());
            }
        }
    }

    #[test]
    fn test_relayout_is_idempotent() {
        let (mut store, _) = fragmented();
        store.relayout().unwrap();
        let once = store.slots().to_vec();
        store.relayout().unwrap();
        assert_eq!(store.slots(), once.as_slice());
    }

    #[test]
    fn test_remap_carries_every_handle() {
        let (mut store, ids) = fragmented();
        let names: Vec<_> = ids.iter().map(|&id| *store.payload(id).unwrap()).collect();

        let remap = store.relayout().unwrap();

        for (old, name) in ids.into_iter().zip(names) {
            assert!(!store.is_valid(old));
            let new = remap.resolve(old).unwrap();
            assert_eq!(store.payload(new), Some(&name));
        }
    }

    #[test]
    fn test_relayout_of_empty_store_is_noop() {
        let mut store: NodeStore<u8> = NodeStore::new();
        let remap = store.relayout().unwrap();
        assert!(remap.is_identity());
        assert_eq!(store.epoch(), 0);
    }
}
