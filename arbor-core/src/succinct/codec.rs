//! Balanced-parenthesis encoding of a whole tree.
//!
//! A preorder walk writes `1` when it enters a node and `0` when it leaves,
//! so `n` nodes cost exactly `2n` structure bits whatever the shape. Payloads
//! go into a separate array in the same preorder.

use super::BitSeq;
use crate::error::{Result, TreeError, try_reserve};
use crate::store::{NIL, Node, NodeStore, Slot};
use std::collections::VecDeque;
use std::mem::size_of;
use tracing::{debug, warn};

/// Structure bits plus preorder payloads.
///
/// `structure_bits.len() == 2 * node_count` and `data.len() == node_count`
/// for every encoding produced by [`NodeStore::encode`]. Encodings built with
/// [`from_parts`](Self::from_parts) are only checked when decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SuccinctEncoding<T> {
    structure_bits: BitSeq,
    data: Vec<T>,
    node_count: usize,
}

impl<T> Default for SuccinctEncoding<T> {
    fn default() -> Self {
        Self { structure_bits: BitSeq::new(), data: Vec::new(), node_count: 0 }
    }
}

impl<T> SuccinctEncoding<T> {
    /// Assembles an encoding from raw parts without validating them.
    pub fn from_parts(structure_bits: BitSeq, data: Vec<T>, node_count: usize) -> Self {
        Self { structure_bits, data, node_count }
    }

    /// Splits the encoding into bits, payloads and node count
    pub fn into_parts(self) -> (BitSeq, Vec<T>, usize) {
        (self.structure_bits, self.data, self.node_count)
    }

    /// Topology bits
    #[inline]
    pub fn structure_bits(&self) -> &BitSeq {
        &self.structure_bits
    }

    /// Payloads in preorder
    #[inline]
    pub fn data(&self) -> &[T] {
        &self.data
    }

    /// Declared number of nodes
    #[inline]
    pub fn node_count(&self) -> usize {
        self.node_count
    }

    /// True for the encoding of an empty tree
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_count == 0
    }

    /// Packed structure bytes plus inline payload bytes.
    pub fn memory_usage(&self) -> usize {
        self.structure_bits.len().div_ceil(8) + self.data.len() * size_of::<T>()
    }

    /// [`memory_usage`](Self::memory_usage) relative to the same nodes held
    /// in a slot array; 0.0 for an empty encoding.
    pub fn compression_ratio(&self) -> f64 {
        if self.node_count == 0 {
            return 0.0;
        }
        let resident = self.node_count * size_of::<Slot<T>>();
        self.memory_usage() as f64 / resident as f64
    }
}

impl<T> NodeStore<T> {
    /// Structure bits plus the slot index of every node in preorder.
    fn structure(&self) -> Result<(BitSeq, Vec<usize>)> {
        let mut bits = BitSeq::with_capacity(2 * self.len())?;
        let mut order = Vec::new();
        try_reserve(&mut order, self.len())?;

        // (slot, leaving): a node is pushed once to open and once to close
        let mut stack: Vec<(usize, bool)> = self.root().map(|r| (r.index(), false)).into_iter().collect();
        while let Some((index, leaving)) = stack.pop() {
            if leaving {
                bits.push(false)?;
                continue;
            }
            let Some(node) = self.slots().get(index).and_then(Slot::node) else {
                continue;
            };
            bits.push(true)?;
            order.push(index);
            stack.push((index, true));
            stack.extend(node.children_range().rev().map(|child| (child, false)));
        }
        Ok((bits, order))
    }

    /// Encodes a copy of the tree.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the bit or payload buffers cannot be
    /// allocated.
    pub fn encode(&self) -> Result<SuccinctEncoding<T>>
    where
        T: Clone,
    {
        let (structure_bits, order) = self.structure()?;
        let mut data = Vec::new();
        try_reserve(&mut data, order.len())?;
        data.extend(
            order
                .iter()
                .filter_map(|&index| self.slots().get(index).and_then(Slot::node))
                .map(|node| node.payload().clone()),
        );

        debug!(nodes = data.len(), bits = structure_bits.len(), "encoded tree");
        Ok(SuccinctEncoding { node_count: data.len(), structure_bits, data })
    }

    /// Encodes the tree by moving its payloads out; no `Clone` needed.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the buffers cannot be allocated. The tree is
    /// dropped only once they are.
    pub fn into_succinct(mut self) -> Result<SuccinctEncoding<T>> {
        let (structure_bits, order) = self.structure()?;
        let mut data = Vec::new();
        try_reserve(&mut data, order.len())?;

        let mut slots = self.take_slots();
        for index in order {
            if let Slot::Occupied(node) = std::mem::replace(&mut slots[index], Slot::Vacant) {
                data.push(node.payload);
            }
        }
        Ok(SuccinctEncoding { node_count: data.len(), structure_bits, data })
    }

    /// Rebuilds a tree from an encoding, laid out in breadth-first order.
    ///
    /// The bits are checked as they are scanned; the first malformed bit
    /// aborts the decode and nothing is returned.
    ///
    /// # Errors
    ///
    /// Returns `CorruptEncoding` if:
    /// - the bit count is not twice the node count
    /// - the payload count differs from the node count or from the number
    ///   of `1` bits
    /// - a `0` closes with no open node, a second root opens, a `1` has no
    ///   payload left, or nodes are still open at the end
    ///
    /// and `OutOfMemory` if the new tree cannot be allocated.
    pub fn decode(encoding: SuccinctEncoding<T>) -> Result<Self> {
        let SuccinctEncoding { structure_bits: bits, data, node_count } = encoding;

        if Some(bits.len()) != node_count.checked_mul(2) {
            return Err(reject(format!("{} structure bits for {node_count} nodes", bits.len())));
        }
        if data.len() != node_count {
            return Err(reject(format!("{} payloads for {node_count} nodes", data.len())));
        }
        let opens = bits.count_ones();
        if opens != data.len() {
            return Err(reject(format!("{opens} open bits for {} payloads", data.len())));
        }
        if node_count == 0 {
            return Ok(Self::new());
        }
        if node_count > crate::store::MAX_SLOTS {
            return Err(TreeError::OutOfMemory { requested: node_count });
        }

        // Parent of each node, by preorder rank
        let mut parents: Vec<u32> = Vec::new();
        try_reserve(&mut parents, node_count)?;
        let mut stack: Vec<u32> = Vec::new();
        for (position, bit) in bits.iter().enumerate() {
            if bit {
                let rank = parents.len();
                if rank >= node_count {
                    return Err(reject(format!("open bit at {position} has no payload left")));
                }
                let parent = match stack.last() {
                    Some(&top) => top,
                    None if rank == 0 => NIL,
                    None => return Err(reject(format!("second root opens at bit {position}"))),
                };
                parents.push(parent);
                stack.push(rank as u32);
            } else if stack.pop().is_none() {
                return Err(reject(format!("close bit at {position} with no open node")));
            }
        }
        if !stack.is_empty() {
            return Err(reject(format!("{} nodes left open", stack.len())));
        }

        let slots = breadth_first_slots(&parents, data)?;
        debug!(nodes = node_count, "decoded tree");
        Ok(Self::from_slots(slots, 0, 0))
    }
}

fn reject(msg: String) -> TreeError {
    warn!(reason = %msg, "rejected succinct encoding");
    TreeError::corrupt(msg)
}

/// Lays out nodes given by preorder rank in breadth-first slot order.
///
/// `parents[r]` is the rank of node `r`'s parent; ranks of siblings increase
/// left to right because they are preorder ranks.
fn breadth_first_slots<T>(parents: &[u32], data: Vec<T>) -> Result<Vec<Slot<T>>> {
    let n = parents.len();

    // Children grouped by parent rank (counting sort, order preserved)
    let mut child_count = vec_of(n, 0u32)?;
    for &parent in parents.iter().skip(1) {
        child_count[parent as usize] += 1;
    }
    let mut offsets = vec_of(n + 1, 0usize)?;
    for rank in 0..n {
        offsets[rank + 1] = offsets[rank] + child_count[rank] as usize;
    }
    let mut cursor = offsets.clone();
    let mut children = vec_of(n.saturating_sub(1), 0u32)?;
    for (rank, &parent) in parents.iter().enumerate().skip(1) {
        let at = &mut cursor[parent as usize];
        children[*at] = rank as u32;
        *at += 1;
    }

    // Level order: rank -> slot
    let mut slot_of = vec_of(n, NIL)?;
    let mut queue = VecDeque::new();
    queue.try_reserve(n).map_err(|_| TreeError::OutOfMemory { requested: n })?;
    queue.push_back(0u32);
    let mut next_slot = 0u32;
    while let Some(rank) = queue.pop_front() {
        slot_of[rank as usize] = next_slot;
        next_slot += 1;
        let r = rank as usize;
        queue.extend(children[offsets[r]..offsets[r + 1]].iter().copied());
    }

    let mut slots: Vec<Slot<T>> = Vec::new();
    try_reserve(&mut slots, n)?;
    slots.resize_with(n, || Slot::Vacant);
    for (rank, payload) in data.into_iter().enumerate() {
        let parent = parents[rank];
        let mut node = Node::new(payload, if parent == NIL { NIL } else { slot_of[parent as usize] });
        if child_count[rank] > 0 {
            node.first_child = slot_of[children[offsets[rank]] as usize];
            node.child_count = child_count[rank];
        }
        slots[slot_of[rank] as usize] = Slot::Occupied(node);
    }
    Ok(slots)
}

fn vec_of<E: Clone>(len: usize, value: E) -> Result<Vec<E>> {
    let mut vec = Vec::new();
    try_reserve(&mut vec, len)?;
    vec.resize(len, value);
    Ok(vec)
}
