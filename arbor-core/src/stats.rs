//! Read-only structural statistics.

use crate::store::{NodeStore, Slot};
use std::mem::size_of;

/// Shape summary of a tree.
///
/// Branching figures cover internal nodes only and are zero when there are
/// none.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TreeStats {
    /// Live nodes
    pub total_nodes: usize,
    /// Nodes without children
    pub leaf_nodes: usize,
    /// Nodes with at least one child
    pub internal_nodes: usize,
    /// Levels, 1 for a lone root
    pub max_depth: usize,
    /// Mean child count over internal nodes
    pub avg_children_per_node: f64,
    /// Smallest child count among internal nodes
    pub min_children: usize,
    /// Largest child count of any node
    pub max_children: usize,
}

/// Memory estimate for the slot array.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemoryStats {
    /// Bytes held by live slots
    pub node_memory_bytes: usize,
    /// Inline payload bytes of live nodes (heap owned by payloads excluded)
    pub data_memory_estimate: usize,
    /// Bytes held by the whole allocation
    pub total_estimated_bytes: usize,
    /// `total_estimated_bytes / total_nodes`, zero for an empty tree
    pub memory_per_node: f64,
    /// Bytes in tombstones and unused capacity
    pub fragmentation_bytes: usize,
    /// Vacant or moved slots awaiting re-layout
    pub tombstones: usize,
}

impl<T> NodeStore<T> {
    /// Number of levels: 0 for an empty tree, 1 for a lone root.
    pub fn depth(&self) -> usize {
        let Some(root) = self.root() else {
            return 0;
        };
        let mut deepest = 0;
        let mut stack = vec![(root.index(), 1usize)];
        while let Some((index, level)) = stack.pop() {
            deepest = deepest.max(level);
            if let Some(node) = self.slots().get(index).and_then(Slot::node) {
                stack.extend(node.children_range().map(|child| (child, level + 1)));
            }
        }
        deepest
    }

    /// Node counts, depth and branching figures in one pass.
    pub fn stats(&self) -> TreeStats {
        let mut stats = TreeStats { max_depth: self.depth(), ..TreeStats::default() };
        let mut child_sum = 0usize;
        let mut min_children = usize::MAX;

        for node in self.slots().iter().filter_map(Slot::node) {
            stats.total_nodes += 1;
            let count = node.child_count();
            if count == 0 {
                stats.leaf_nodes += 1;
                continue;
            }
            stats.internal_nodes += 1;
            child_sum += count;
            min_children = min_children.min(count);
            stats.max_children = stats.max_children.max(count);
        }

        if stats.internal_nodes > 0 {
            stats.avg_children_per_node = child_sum as f64 / stats.internal_nodes as f64;
            stats.min_children = min_children;
        }
        stats
    }

    /// How closely the physical layout follows the tree, in `[0, 1]`.
    ///
    /// Each internal node contributes one sample for the distance from its
    /// own slot to its first child, `1 / (1 + distance / 10)`, and one sample
    /// per further child: 1.0 when that child's slot is live and follows its
    /// predecessor, 0.5 otherwise. The score is the mean over all samples;
    /// trees with at most one node score 1.0.
    pub fn locality_score(&self) -> f64 {
        if self.len() <= 1 {
            return 1.0;
        }
        let slots = self.slots();
        let mut score = 0.0;
        let mut samples = 0usize;

        for (index, node) in slots.iter().enumerate().filter_map(|(i, s)| s.node().map(|n| (i, n))) {
            let Some(first) = node.first_child_index() else {
                continue;
            };
            let distance = first.abs_diff(index + 1) as f64;
            score += 1.0 / (1.0 + distance / 10.0);
            samples += 1;

            for child in first + 1..first + node.child_count() {
                score += if slots.get(child).is_some_and(Slot::is_occupied) { 1.0 } else { 0.5 };
                samples += 1;
            }
        }

        if samples == 0 { 1.0 } else { score / samples as f64 }
    }

    /// Estimated memory held by the slot array.
    pub fn memory_stats(&self) -> MemoryStats {
        let slot_size = size_of::<Slot<T>>();
        let live = self.len();
        let node_memory_bytes = live * slot_size;
        let fragmentation_bytes = self.capacity().saturating_sub(live) * slot_size;
        let total_estimated_bytes = node_memory_bytes + fragmentation_bytes;
        let memory_per_node =
            if live == 0 { 0.0 } else { total_estimated_bytes as f64 / live as f64 };

        MemoryStats {
            node_memory_bytes,
            data_memory_estimate: live * size_of::<T>(),
            total_estimated_bytes,
            memory_per_node,
            fragmentation_bytes,
            tombstones: self.tombstones(),
        }
    }
}
