//! Rebuilds of the slot array.
//!
//! Both rebuilds construct a fresh array and swap it in only once it is
//! complete, so a failed allocation leaves the tree as it was. A successful
//! rebuild starts a new epoch and hands back a [`Remap`] from old handles to
//! new ones.

mod balance;
mod layout;

use crate::error::{Result, try_reserve};
use crate::store::{NIL, NodeId, Slot};

/// Builds the old-slot to new-slot table for a rebuild that writes the nodes
/// listed in `order` to slots `0..order.len()`.
///
/// Forwarding tombstones map to wherever their node went, so handles that
/// were still being followed through a tombstone survive the rebuild.
fn build_table<T>(slots: &[Slot<T>], order: &[usize]) -> Result<Vec<u32>> {
    let mut table = Vec::new();
    try_reserve(&mut table, slots.len())?;
    table.resize(slots.len(), NIL);
    for (new, &old) in order.iter().enumerate() {
        table[old] = new as u32;
    }
    // Forwarding targets sit at higher indices, so a reverse pass sees every
    // target before the tombstone that points at it
    for index in (0..slots.len()).rev() {
        if let Slot::Moved(to) = slots[index] {
            table[index] = table.get(to as usize).copied().unwrap_or(NIL);
        }
    }
    Ok(table)
}

/// Old-epoch to new-epoch handle translation produced by a rebuild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Remap {
    from_epoch: u32,
    to_epoch: u32,
    /// New slot for every old slot index; `NIL` where the old slot held no
    /// live node
    table: Vec<u32>,
}

impl Remap {
    pub(crate) fn new(from_epoch: u32, to_epoch: u32, table: Vec<u32>) -> Self {
        Self { from_epoch, to_epoch, table }
    }

    /// Remap for a rebuild that changed nothing: handles of `epoch` map to
    /// themselves.
    pub(crate) fn identity(epoch: u32) -> Self {
        Self { from_epoch: epoch, to_epoch: epoch, table: Vec::new() }
    }

    /// Epoch whose handles this remap accepts
    #[inline]
    pub fn from_epoch(&self) -> u32 {
        self.from_epoch
    }

    /// Epoch of the handles this remap produces
    #[inline]
    pub fn to_epoch(&self) -> u32 {
        self.to_epoch
    }

    /// True when the rebuild kept every node in place
    #[inline]
    pub fn is_identity(&self) -> bool {
        self.from_epoch == self.to_epoch
    }

    /// Translates a handle issued before the rebuild.
    ///
    /// Returns `None` for handles of any other epoch and for handles that did
    /// not name a live node. A handle to a node the placer had moved resolves
    /// to that node, as it did before the rebuild.
    pub fn resolve(&self, old: NodeId) -> Option<NodeId> {
        if old.epoch() != self.from_epoch {
            return None;
        }
        if self.is_identity() {
            return Some(old);
        }
        match self.table.get(old.index()) {
            Some(&new) if new != NIL => Some(NodeId::new(new, self.to_epoch)),
            _ => None,
        }
    }
}
