//! Fixed header of an on-disk tree image.

use std::mem;

/// Magic bytes identifying a tree image
pub const MAGIC: &[u8; 8] = b"ARBORBP\0";

/// Current file format version
pub const VERSION: u32 = 1;

/// Flag bits understood by this version (none yet)
const KNOWN_FLAGS: u32 = 0;

/// Header of a tree image.
///
/// Stored little-endian in the first [`HEADER_SIZE`] bytes of the file, in
/// field order; the succinct record follows immediately.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(C, align(8))]
pub struct Header {
    /// Magic bytes for file type identification
    pub magic: [u8; 8],

    /// File format version
    pub version: u32,

    /// Feature flags, zero in version 1
    pub flags: u32,

    /// Number of tree nodes in the body
    pub node_count: u64,

    /// Length of the record that follows the header
    pub body_len: u64,

    /// Reserved space for future use (padding to 64 bytes)
    pub reserved: [u8; 32],
}

/// Size of the header in bytes
pub const HEADER_SIZE: usize = mem::size_of::<Header>();

impl Header {
    /// Creates a header for a body of `body_len` bytes holding `node_count`
    /// nodes
    pub fn new(node_count: u64, body_len: u64) -> Self {
        Self { magic: *MAGIC, version: VERSION, flags: 0, node_count, body_len, reserved: [0; 32] }
    }

    /// Validates the header for correctness and compatibility
    pub fn is_valid(&self) -> bool {
        self.magic == *MAGIC
            && self.version > 0
            && self.version <= VERSION
            && self.flags & !KNOWN_FLAGS == 0
    }

    /// Serialized form, little-endian
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..8].copy_from_slice(&self.magic);
        out[8..12].copy_from_slice(&self.version.to_le_bytes());
        out[12..16].copy_from_slice(&self.flags.to_le_bytes());
        out[16..24].copy_from_slice(&self.node_count.to_le_bytes());
        out[24..32].copy_from_slice(&self.body_len.to_le_bytes());
        out[32..64].copy_from_slice(&self.reserved);
        out
    }

    /// Parses a header from the first [`HEADER_SIZE`] bytes of `bytes`.
    ///
    /// Returns `None` when `bytes` is too short; the result still has to be
    /// checked with [`is_valid`](Self::is_valid).
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        let bytes: &[u8; HEADER_SIZE] = bytes.get(..HEADER_SIZE)?.try_into().ok()?;
        let u32_at = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let u64_at = |at: usize| {
            let mut word = [0u8; 8];
            word.copy_from_slice(&bytes[at..at + 8]);
            u64::from_le_bytes(word)
        };

        let mut magic = [0u8; 8];
        magic.copy_from_slice(&bytes[0..8]);
        let mut reserved = [0u8; 32];
        reserved.copy_from_slice(&bytes[32..64]);

        Some(Self {
            magic,
            version: u32_at(8),
            flags: u32_at(12),
            node_count: u64_at(16),
            body_len: u64_at(24),
            reserved,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_size() {
        assert_eq!(HEADER_SIZE, 64, "Header must be exactly 64 bytes");
    }

    #[test]
    fn test_new_header_is_valid() {
        let header = Header::new(3, 55);
        assert!(header.is_valid());
        assert_eq!(header.node_count, 3);
        assert_eq!(header.body_len, 55);
    }

    #[test]
    fn test_bytes_parse_back() {
        let header = Header::new(1 << 40, 12345);
        let bytes = header.to_bytes();
        assert_eq!(&bytes[..8], MAGIC);
        assert_eq!(Header::from_bytes(&bytes), Some(header));
        assert_eq!(Header::from_bytes(&bytes[..63]), None);
    }

    #[test]
    fn test_invalid_magic() {
        let mut header = Header::new(0, 0);
        header.magic = *b"INVALID\0";
        assert!(!header.is_valid());
    }

    #[test]
    fn test_unknown_version_or_flags() {
        let mut header = Header::new(0, 0);
        header.version = VERSION + 1;
        assert!(!header.is_valid());

        let mut header = Header::new(0, 0);
        header.flags = 1;
        assert!(!header.is_valid());
    }
}
