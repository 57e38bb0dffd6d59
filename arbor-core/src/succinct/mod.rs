//! Succinct tree encoding.
//!
//! # Format
//!
//! Topology is a balanced-parenthesis bit sequence (`1` = open, `0` = close)
//! written during a preorder walk, two bits per node. Payloads are stored
//! separately in the same preorder, so the encoding carries no slot indices
//! and is unaffected by tombstones or re-layouts.
//!
//! ```text
//! root -> [A, B]    bits: 1 1 0 1 0 0    data: [root, A, B]
//! ```
//!
//! [`record`] flattens an encoding into bytes for files and sockets.

mod bits;
mod codec;
pub mod record;

pub use bits::BitSeq;
pub use codec::SuccinctEncoding;
pub use record::RecordPayload;
