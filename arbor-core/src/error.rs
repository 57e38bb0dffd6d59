//! Error taxonomy for tree operations.
//!
//! Every variant is a local, recoverable condition. Operations that fail with
//! one of these leave the tree exactly as it was before the call.

use thiserror::Error;

/// Errors returned by tree mutation, rebalancing and decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TreeError {
    /// Handle is out of range, names a tombstone, or predates a renumbering.
    #[error("invalid parent handle: {0}")]
    InvalidParent(String),

    /// Argument outside its domain (e.g. branching factor 0).
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// Growth or rebuild buffer could not be allocated.
    #[error("out of memory: could not reserve {requested} node slots")]
    OutOfMemory {
        /// Number of slots that were requested
        requested: usize,
    },

    /// Structure bits and payload array do not describe a well-formed tree.
    #[error("corrupt encoding: {0}")]
    CorruptEncoding(String),
}

/// Result alias for tree operations.
pub type Result<T> = std::result::Result<T, TreeError>;

impl TreeError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        TreeError::CorruptEncoding(msg.into())
    }

    pub(crate) fn invalid_argument(msg: impl Into<String>) -> Self {
        TreeError::InvalidArgument(msg.into())
    }
}

/// Reserves room for `additional` more elements, mapping allocation failure
/// to [`TreeError::OutOfMemory`] without touching the vector's contents.
pub(crate) fn try_reserve<E>(vec: &mut Vec<E>, additional: usize) -> Result<()> {
    vec.try_reserve(additional).map_err(|_| TreeError::OutOfMemory { requested: additional })
}
