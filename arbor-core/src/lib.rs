//! Arbor - cache-friendly N-ary tree with a succinct wire format
//!
//! Arbor keeps an arbitrary-shape tree in one flat array with index links,
//! placing children next to their parent and siblings as they are inserted,
//! and can flatten the whole tree to two bits of topology per node plus a
//! preorder payload array.
//!
//! # Features
//!
//! - Array-backed storage with locality-preserving child placement
//! - Periodic breadth-first re-layout (configurable, off with 0)
//! - Height balancing into a complete k-ary tree for degenerate shapes
//! - Balanced-parenthesis encoding with a lossless round trip
//! - Epoch-checked handles: renumbering never aliases a stale handle
//! - On-disk images with a fixed header and file locking
//!
//! # Example
//!
//! ```
//! use arbor_core::{NaryTree, TreeError};
//!
//! # fn main() -> Result<(), TreeError> {
//! let mut tree = NaryTree::with_root("/")?;
//! let root = tree.root().unwrap();
//! let etc = tree.insert(root, "etc")?;
//! tree.insert(etc, "hosts")?;
//! tree.insert(root, "usr")?;
//!
//! let encoding = tree.encode()?;
//! assert_eq!(encoding.structure_bits().len(), 8);
//!
//! let copy = NaryTree::decode(encoding)?;
//! assert_eq!(copy.len(), 4);
//! assert_eq!(copy.depth(), 3);
//! # Ok(())
//! # }
//! ```
//!
//! # Handles and Renumbering
//!
//! [`NodeId`] handles carry the epoch they were issued in. Re-layout, height
//! balancing and `clear` start a new epoch; old handles are then rejected
//! instead of pointing at whatever moved into their slot. Each renumbering
//! returns a [`Remap`] to translate old handles, and [`NaryTree::refresh`]
//! applies the one from the most recent automatic re-layout.
//!
//! # Design Philosophy
//!
//! The tree is a single-threaded in-memory structure. It does not aim to be:
//! - A concurrent or lock-free container
//! - A crash-safe database
//! - A replicated store
//!
//! Concurrent readers are best served from an immutable snapshot obtained
//! through [`NaryTree::encode`] and [`NaryTree::decode`].

mod error;
mod header;
mod rebalance;
pub mod scan;
pub mod stats;
pub mod succinct;

#[cfg(feature = "internals")]
pub mod store;
#[cfg(not(feature = "internals"))]
pub(crate) mod store;

#[cfg(feature = "internals")]
pub mod storage;
#[cfg(not(feature = "internals"))]
pub(crate) mod storage;

pub use error::{Result, TreeError};
pub use header::{HEADER_SIZE, Header, MAGIC, VERSION};
pub use rebalance::Remap;
pub use stats::{MemoryStats, TreeStats};
pub use storage::TreeFile;
pub use store::{
    BreadthFirst, Children, MAX_SLOTS, Node, NodeId, NodeRef, NodeStore, PLACEMENT_WINDOW,
    Preorder, Slot,
};
pub use succinct::{BitSeq, RecordPayload, SuccinctEncoding};

use std::path::Path;
use tracing::warn;

/// Configuration options for NaryTree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize), serde(default))]
pub struct TreeOptions {
    /// Insertions between automatic breadth-first re-layouts (0 disables)
    pub rebalance_every: u32,

    /// Branching factor used by [`NaryTree::auto_balance`]
    pub default_branching_factor: u32,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self { rebalance_every: 100, default_branching_factor: 3 }
    }
}

impl TreeOptions {
    /// Checks the options for values no tree can work with.
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if `default_branching_factor` is zero.
    pub fn validate(&self) -> Result<()> {
        if self.default_branching_factor == 0 {
            return Err(TreeError::InvalidArgument(
                "default_branching_factor must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// Public facade for an Arbor tree
///
/// Wraps a [`NodeStore`] and runs the breadth-first re-layout every
/// `rebalance_every` insertions. Everything else is a thin pass-through;
/// [`store`](Self::store) exposes the full read-only store API.
#[derive(Debug, Clone)]
pub struct NaryTree<T> {
    /// Node array and placement
    store: NodeStore<T>,

    /// Configuration options
    options: TreeOptions,

    /// Insertions since the last re-layout
    inserts_since_layout: u32,

    /// Remap of the most recent automatic re-layout
    last_remap: Option<Remap>,
}

impl<T> Default for NaryTree<T> {
    fn default() -> Self {
        Self::from_store(NodeStore::new(), TreeOptions::default())
    }
}

impl<T> NaryTree<T> {
    /// Creates an empty tree with default options
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty tree with the given options
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the options do not validate.
    pub fn with_options(options: TreeOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_store(NodeStore::new(), options))
    }

    /// Creates a tree holding only `payload` as its root
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the root slot cannot be allocated.
    pub fn with_root(payload: T) -> Result<Self> {
        let mut tree = Self::new();
        tree.set_root(payload)?;
        Ok(tree)
    }

    fn from_store(store: NodeStore<T>, options: TreeOptions) -> Self {
        Self { store, options, inserts_since_layout: 0, last_remap: None }
    }

    /// Places the root of an empty tree
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` if the tree already has a root.
    pub fn set_root(&mut self, payload: T) -> Result<NodeId> {
        self.store.create_root(payload)
    }

    /// Adds `payload` as the last child of `parent`
    ///
    /// Every `rebalance_every` insertions the tree is re-laid out in
    /// breadth-first order before returning. The returned handle is valid in
    /// the tree's epoch after the call; handles obtained earlier can be
    /// carried over with [`refresh`](Self::refresh).
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `parent` is out of range, stale, or names a tombstone (`InvalidParent`)
    /// - The node array cannot grow (`OutOfMemory`)
    pub fn insert(&mut self, parent: NodeId, payload: T) -> Result<NodeId> {
        let mut child = self.store.add_child(parent, payload)?;
        self.inserts_since_layout = self.inserts_since_layout.saturating_add(1);

        let every = self.options.rebalance_every;
        if every != 0 && self.inserts_since_layout >= every {
            // The insertion itself has succeeded; a failed re-layout only
            // leaves the layout as it is
            match self.store.relayout() {
                Ok(remap) => {
                    if let Some(moved) = remap.resolve(child) {
                        child = moved;
                    }
                    self.last_remap = Some(remap);
                    self.inserts_since_layout = 0;
                }
                Err(err) => warn!(error = %err, "automatic re-layout skipped"),
            }
        }
        Ok(child)
    }

    /// Carries a handle into the current epoch
    ///
    /// Handles of the current epoch are returned as they are. Handles from
    /// the epoch before the most recent automatic re-layout are translated.
    /// Anything older, or a handle to nothing, yields `None`.
    pub fn refresh(&self, id: NodeId) -> Option<NodeId> {
        if self.store.is_valid(id) {
            return Some(id);
        }
        self.last_remap
            .as_ref()
            .and_then(|remap| remap.resolve(id))
            .filter(|&new| self.store.is_valid(new))
    }

    /// Remap produced by the most recent automatic re-layout
    pub fn last_remap(&self) -> Option<&Remap> {
        self.last_remap.as_ref()
    }

    /// Read-only access to the underlying store
    pub fn store(&self) -> &NodeStore<T> {
        &self.store
    }

    /// Configuration options
    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Handle of the root node
    pub fn root(&self) -> Option<NodeId> {
        self.store.root()
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.store.len()
    }

    /// True when the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.store.is_empty()
    }

    /// True when `id` names a node of the current epoch
    pub fn is_valid(&self, id: NodeId) -> bool {
        self.store.is_valid(id)
    }

    /// Payload of a node
    pub fn payload(&self, id: NodeId) -> Option<&T> {
        self.store.payload(id)
    }

    /// Mutable payload of a node
    pub fn payload_mut(&mut self, id: NodeId) -> Option<&mut T> {
        self.store.payload_mut(id)
    }

    /// Parent handle; `None` for the root or an invalid handle
    pub fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        self.store.parent_of(id)
    }

    /// Number of children; `None` for an invalid handle
    pub fn child_count(&self, id: NodeId) -> Option<usize> {
        self.store.child_count(id)
    }

    /// Handle of the `i`-th child
    pub fn child_at(&self, id: NodeId, i: usize) -> Option<NodeId> {
        self.store.child_at(id, i)
    }

    /// Children of a node in order
    pub fn children_of(&self, id: NodeId) -> Children<'_, T> {
        self.store.children_of(id)
    }

    /// Borrowing view of a node
    pub fn node(&self, id: NodeId) -> Option<NodeRef<'_, T>> {
        self.store.node(id)
    }

    /// Number of levels (0 when empty)
    pub fn depth(&self) -> usize {
        self.store.depth()
    }

    /// Node counts, depth and branching figures
    pub fn stats(&self) -> TreeStats {
        self.store.stats()
    }

    /// Layout quality in `[0, 1]`
    pub fn locality_score(&self) -> f64 {
        self.store.locality_score()
    }

    /// Memory estimate for the node array
    pub fn memory_stats(&self) -> MemoryStats {
        self.store.memory_stats()
    }

    /// Preorder walk
    pub fn preorder(&self) -> Preorder<'_, T> {
        self.store.preorder()
    }

    /// Level-order walk
    pub fn breadth_first(&self) -> BreadthFirst<'_, T> {
        self.store.breadth_first()
    }

    /// Visits every node once, in preorder
    pub fn for_each<F: FnMut(NodeId, &T)>(&self, f: F) {
        self.store.for_each(f);
    }

    /// Visits every node once, in level order
    pub fn for_each_breadth_first<F: FnMut(NodeId, &T)>(&self, f: F) {
        self.store.for_each_breadth_first(f);
    }

    /// Visits every node once, in physical slot order
    pub fn for_each_slot<F: FnMut(NodeId, &T)>(&self, f: F) {
        self.store.for_each_slot(f);
    }

    /// First node in preorder whose payload matches `pred`
    pub fn position<P: FnMut(&T) -> bool>(&self, pred: P) -> Option<NodeId> {
        self.store.position(pred)
    }

    /// Rewrites the node array into breadth-first order
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the new array cannot be allocated.
    pub fn relayout(&mut self) -> Result<Remap> {
        let remap = self.store.relayout()?;
        self.inserts_since_layout = 0;
        Ok(remap)
    }

    /// Reshapes the tree into a complete `k`-ary tree
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for `k == 0` and `OutOfMemory` if the
    /// rebuild cannot be allocated.
    pub fn height_balance(&mut self, k: u32) -> Result<Remap> {
        let remap = self.store.height_balance(k)?;
        if !remap.is_identity() {
            self.inserts_since_layout = 0;
        }
        Ok(remap)
    }

    /// True when the tree is far deeper than `k`-ary branching would give
    pub fn needs_rebalancing(&self, k: u32) -> bool {
        self.store.needs_rebalancing(k)
    }

    /// Height-balances with factor `k` only when the heuristic fires
    ///
    /// # Errors
    ///
    /// Same as [`height_balance`](Self::height_balance).
    pub fn auto_balance_if_needed(&mut self, k: u32) -> Result<Option<Remap>> {
        let remap = self.store.auto_balance_if_needed(k)?;
        if remap.is_some() {
            self.inserts_since_layout = 0;
        }
        Ok(remap)
    }

    /// [`auto_balance_if_needed`](Self::auto_balance_if_needed) with the
    /// configured default branching factor
    ///
    /// # Errors
    ///
    /// Same as [`height_balance`](Self::height_balance).
    pub fn auto_balance(&mut self) -> Result<Option<Remap>> {
        self.auto_balance_if_needed(self.options.default_branching_factor)
    }

    /// Removes every payload, in preorder, leaving the tree empty
    pub fn drain_payloads(&mut self) -> Vec<T> {
        self.inserts_since_layout = 0;
        self.last_remap = None;
        self.store.drain_payloads()
    }

    /// Drops every node; all handles become stale
    pub fn clear(&mut self) {
        self.store.clear();
        self.inserts_since_layout = 0;
        self.last_remap = None;
    }

    /// Encodes a copy of the tree
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the buffers cannot be allocated.
    pub fn encode(&self) -> Result<SuccinctEncoding<T>>
    where
        T: Clone,
    {
        self.store.encode()
    }

    /// Encodes the tree by moving its payloads out
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the buffers cannot be allocated.
    pub fn into_succinct(self) -> Result<SuccinctEncoding<T>> {
        self.store.into_succinct()
    }

    /// Rebuilds a tree with default options
    ///
    /// # Errors
    ///
    /// Returns `CorruptEncoding` for a malformed encoding.
    pub fn decode(encoding: SuccinctEncoding<T>) -> Result<Self> {
        Self::decode_with(encoding, TreeOptions::default())
    }

    /// Rebuilds a tree with the given options
    ///
    /// # Errors
    ///
    /// Returns `InvalidArgument` for bad options and `CorruptEncoding` for a
    /// malformed encoding.
    pub fn decode_with(encoding: SuccinctEncoding<T>, options: TreeOptions) -> Result<Self> {
        options.validate()?;
        Ok(Self::from_store(NodeStore::decode(encoding)?, options))
    }

    /// Writes the tree to an on-disk image at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the tree cannot be encoded or the file cannot be
    /// locked, written or synced.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()>
    where
        T: Clone + RecordPayload,
    {
        let encoding = self.encode()?;
        TreeFile::new(path).save(&encoding)
    }

    /// Reads a tree from an on-disk image at `path`
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or its contents are not a
    /// valid tree image; corruption is a [`TreeError::CorruptEncoding`]
    /// reachable through `downcast_ref`.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self>
    where
        T: RecordPayload,
    {
        let encoding = TreeFile::new(path).load()?;
        Ok(Self::decode(encoding)?)
    }
}
