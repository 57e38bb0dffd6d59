//! Packed bit sequence, least significant bit first within each byte.

use crate::error::{Result, TreeError, try_reserve};
use std::fmt;

/// Growable sequence of bits packed eight to a byte.
///
/// Bit `i` lives in byte `i / 8` at position `i % 8` counted from the least
/// significant bit. Padding bits in the last byte are always zero.
#[derive(Clone, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "PackedBits", into = "PackedBits")
)]
pub struct BitSeq {
    bytes: Vec<u8>,
    len: usize,
}

impl BitSeq {
    /// Creates an empty sequence
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty sequence with room for `bits` bits.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the backing bytes cannot be allocated.
    pub fn with_capacity(bits: usize) -> Result<Self> {
        let mut bytes = Vec::new();
        try_reserve(&mut bytes, bits.div_ceil(8))?;
        Ok(Self { bytes, len: 0 })
    }

    /// Rebuilds a sequence from packed bytes.
    ///
    /// # Errors
    ///
    /// Returns `CorruptEncoding` if `bytes` is not exactly `ceil(len / 8)`
    /// long or a padding bit is set.
    pub fn from_bytes(bytes: Vec<u8>, len: usize) -> Result<Self> {
        if bytes.len() != len.div_ceil(8) {
            return Err(TreeError::corrupt(format!(
                "{} packed bytes cannot hold exactly {len} bits",
                bytes.len()
            )));
        }
        let used = len % 8;
        if used != 0 && bytes.last().is_some_and(|last| last >> used != 0) {
            return Err(TreeError::corrupt("padding bits are set"));
        }
        Ok(Self { bytes, len })
    }

    /// Number of bits
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// True when the sequence holds no bits
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Packed representation, `ceil(len / 8)` bytes
    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    /// Appends one bit.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if a new byte cannot be allocated.
    #[inline]
    pub fn push(&mut self, bit: bool) -> Result<()> {
        let offset = self.len % 8;
        if offset == 0 {
            try_reserve(&mut self.bytes, 1)?;
            self.bytes.push(0);
        }
        if bit {
            if let Some(last) = self.bytes.last_mut() {
                *last |= 1 << offset;
            }
        }
        self.len += 1;
        Ok(())
    }

    /// Bit at `index`, `None` past the end
    #[inline]
    pub fn get(&self, index: usize) -> Option<bool> {
        if index >= self.len {
            return None;
        }
        self.bytes.get(index / 8).map(|byte| byte >> (index % 8) & 1 == 1)
    }

    /// Number of set bits
    pub fn count_ones(&self) -> usize {
        self.bytes.iter().map(|byte| byte.count_ones() as usize).sum()
    }

    /// Bits in order
    pub fn iter(&self) -> impl Iterator<Item = bool> + '_ {
        (0..self.len)
            .map(move |i| self.bytes.get(i / 8).is_some_and(|byte| byte >> (i % 8) & 1 == 1))
    }
}

impl fmt::Debug for BitSeq {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BitSeq(")?;
        for bit in self.iter() {
            write!(f, "{}", u8::from(bit))?;
        }
        write!(f, ")")
    }
}

impl FromIterator<bool> for BitSeq {
    /// Collects bits; panics only if the allocator does.
    fn from_iter<I: IntoIterator<Item = bool>>(iter: I) -> Self {
        let mut seq = BitSeq::new();
        for bit in iter {
            let offset = seq.len % 8;
            if offset == 0 {
                seq.bytes.push(0);
            }
            if let Some(last) = seq.bytes.last_mut() {
                *last |= u8::from(bit) << offset;
            }
            seq.len += 1;
        }
        seq
    }
}

/// Wire form of a [`BitSeq`]; deserialized input goes through
/// [`BitSeq::from_bytes`] so length and padding are checked.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct PackedBits {
    bytes: Vec<u8>,
    len: usize,
}

#[cfg(feature = "serde")]
impl TryFrom<PackedBits> for BitSeq {
    type Error = TreeError;

    fn try_from(packed: PackedBits) -> Result<Self> {
        BitSeq::from_bytes(packed.bytes, packed.len)
    }
}

#[cfg(feature = "serde")]
impl From<BitSeq> for PackedBits {
    fn from(bits: BitSeq) -> Self {
        PackedBits { bytes: bits.bytes, len: bits.len }
    }
}
