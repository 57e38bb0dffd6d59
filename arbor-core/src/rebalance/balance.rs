//! Height balancing.
//!
//! The preorder payload sequence is redistributed into a complete, left-filled
//! k-ary tree stored in level order: slot `j` has children
//! `j*k + 1 ..= j*k + k` and parent `(j - 1) / k`. Depth drops to
//! `ceil(log_k n) + 1` at most, whatever the input shape was.

use super::{Remap, build_table};
use crate::error::{Result, TreeError, try_reserve};
use crate::store::{NIL, Node, NodeStore, Slot};
use tracing::debug;

impl<T> NodeStore<T> {
    /// Reshapes the tree into a complete `k`-ary tree over its preorder
    /// payload sequence.
    ///
    /// Node count and payloads are preserved; only the shape changes. Trees
    /// with fewer than two nodes are returned untouched with an identity
    /// remap.
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `k` is zero (`InvalidArgument`)
    /// - the rebuilt array cannot be allocated (`OutOfMemory`); the tree is
    ///   left as it was
    pub fn height_balance(&mut self, k: u32) -> Result<Remap> {
        if k == 0 {
            return Err(TreeError::invalid_argument("branching factor must be at least 1"));
        }
        if self.len() <= 1 {
            return Ok(Remap::identity(self.epoch()));
        }

        let depth_before = self.depth();
        let order = self.preorder_indices();
        let n = order.len() as u64;
        let table = build_table(self.slots(), &order)?;

        let mut fresh = Vec::new();
        try_reserve(&mut fresh, order.len())?;

        let from_epoch = self.epoch();
        let mut old_slots = self.take_slots();
        let k = u64::from(k);
        for (j, &old) in order.iter().enumerate() {
            let j = j as u64;
            if let Slot::Occupied(old_node) = std::mem::replace(&mut old_slots[old], Slot::Vacant) {
                let parent = if j == 0 { NIL } else { ((j - 1) / k) as u32 };
                let mut node = Node::new(old_node.payload, parent);
                let first = j * k + 1;
                if first < n {
                    node.first_child = first as u32;
                    node.child_count = k.min(n - first) as u32;
                }
                fresh.push(Slot::Occupied(node));
            }
        }

        self.install(fresh, 0);
        debug!(
            nodes = n,
            k,
            depth_before,
            depth_after = self.depth(),
            epoch = self.epoch(),
            "height balanced"
        );
        Ok(Remap::new(from_epoch, self.epoch(), table))
    }

    /// Cheap check for a tree whose depth is far from what `k`-ary branching
    /// would give.
    ///
    /// With `optimal = floor(log_k n) + 1` (`k` raised to at least 2), the
    /// tree qualifies when its depth exceeds `2 * optimal`, or when it
    /// exceeds `optimal + 1` while internal nodes average fewer than `k / 2`
    /// children. Trees of three nodes or fewer never qualify, and neither
    /// does any tree for `k < 2`: a factor-1 rebuild is a chain and cannot
    /// get shallower.
    pub fn needs_rebalancing(&self, k: u32) -> bool {
        let n = self.len();
        if n <= 3 || k < 2 {
            return false;
        }
        let optimal = floor_log(n, k as usize) + 1;
        let depth = self.depth();
        if depth > 2 * optimal {
            return true;
        }
        if depth <= optimal + 1 {
            return false;
        }
        let internal = self
            .slots()
            .iter()
            .filter_map(Slot::node)
            .filter(|node| node.child_count() > 0)
            .count();
        let mean_branching = (n - 1) as f64 / internal.max(1) as f64;
        mean_branching < f64::from(k) / 2.0
    }

    /// Runs [`height_balance`](Self::height_balance) only when
    /// [`needs_rebalancing`](Self::needs_rebalancing) says so.
    ///
    /// Returns `None` when the tree was left alone.
    ///
    /// # Errors
    ///
    /// Same as [`height_balance`](Self::height_balance).
    pub fn auto_balance_if_needed(&mut self, k: u32) -> Result<Option<Remap>> {
        if k == 0 {
            return Err(TreeError::invalid_argument("branching factor must be at least 1"));
        }
        if !self.needs_rebalancing(k) {
            return Ok(None);
        }
        self.height_balance(k).map(Some)
    }
}

/// Largest `d` with `base^d <= n`, for `n >= 1` and `base >= 2`.
fn floor_log(n: usize, base: usize) -> usize {
    let mut levels = 0;
    let mut reach = base;
    while reach <= n {
        levels += 1;
        match reach.checked_mul(base) {
            Some(next) => reach = next,
            None => break,
        }
    }
    levels
}
