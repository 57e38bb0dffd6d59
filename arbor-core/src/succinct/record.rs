//! Flat byte record of an encoding.
//!
//! ```text
//! node_count : u64
//! bit_count  : u64
//! bits       : ceil(bit_count / 8) bytes, LSB-first
//! data_count : u64
//! data_count x { len : u64, bytes : [u8; len] }
//! ```
//!
//! All integers are little-endian.

use super::{BitSeq, SuccinctEncoding};
use crate::error::{Result, TreeError, try_reserve};

/// Payload that can cross the record boundary as a length-prefixed blob.
pub trait RecordPayload: Sized {
    /// Appends the payload's bytes (without length prefix) to `out`
    fn write_record(&self, out: &mut Vec<u8>);

    /// Parses a payload from exactly the bytes `write_record` produced.
    ///
    /// # Errors
    ///
    /// Returns `CorruptEncoding` if the bytes are not a valid payload.
    fn read_record(bytes: &[u8]) -> Result<Self>;
}

impl RecordPayload for Vec<u8> {
    fn write_record(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self);
    }

    fn read_record(bytes: &[u8]) -> Result<Self> {
        Ok(bytes.to_vec())
    }
}

impl RecordPayload for String {
    fn write_record(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(self.as_bytes());
    }

    fn read_record(bytes: &[u8]) -> Result<Self> {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| TreeError::corrupt(format!("payload is not UTF-8: {e}")))
    }
}

macro_rules! fixed_width_payload {
    ($($ty:ty),* $(,)?) => {$(
        impl RecordPayload for $ty {
            fn write_record(&self, out: &mut Vec<u8>) {
                out.extend_from_slice(&self.to_le_bytes());
            }

            fn read_record(bytes: &[u8]) -> Result<Self> {
                let raw = bytes.try_into().map_err(|_| {
                    TreeError::corrupt(format!(
                        "{} byte payload for {}",
                        bytes.len(),
                        stringify!($ty)
                    ))
                })?;
                Ok(<$ty>::from_le_bytes(raw))
            }
        }
    )*};
}

fixed_width_payload!(u8, u16, u32, u64, i8, i16, i32, i64);

impl<T: RecordPayload> SuccinctEncoding<T> {
    /// Serializes the encoding into the flat record layout.
    ///
    /// # Errors
    ///
    /// Returns `OutOfMemory` if the output buffer cannot be allocated.
    pub fn to_record_bytes(&self) -> Result<Vec<u8>> {
        let bits = self.structure_bits();
        let mut out = Vec::new();
        try_reserve(&mut out, 24 + bits.as_bytes().len() + self.data().len() * 8)?;

        out.extend_from_slice(&(self.node_count() as u64).to_le_bytes());
        out.extend_from_slice(&(bits.len() as u64).to_le_bytes());
        out.extend_from_slice(bits.as_bytes());
        out.extend_from_slice(&(self.data().len() as u64).to_le_bytes());

        let mut scratch = Vec::new();
        for payload in self.data() {
            scratch.clear();
            payload.write_record(&mut scratch);
            out.extend_from_slice(&(scratch.len() as u64).to_le_bytes());
            out.extend_from_slice(&scratch);
        }
        Ok(out)
    }

    /// Parses a flat record.
    ///
    /// Only the framing is checked here: every length must fit in the input
    /// and nothing may trail the last payload. Whether the bits describe a
    /// tree is checked by [`NodeStore::decode`](crate::NodeStore::decode).
    ///
    /// # Errors
    ///
    /// Returns `CorruptEncoding` for truncated or oversized input, or a
    /// payload `T` rejects.
    pub fn from_record_bytes(bytes: &[u8]) -> Result<Self> {
        let mut reader = Reader { bytes, pos: 0 };

        let node_count = reader.read_len("node count")?;
        let bit_count = reader.read_len("bit count")?;
        let packed = reader.take(bit_count.div_ceil(8), "structure bits")?;
        let structure_bits = BitSeq::from_bytes(packed.to_vec(), bit_count)?;

        let data_count = reader.read_len("data count")?;
        // Each record needs at least its 8 byte length prefix
        if data_count > reader.remaining() / 8 {
            return Err(TreeError::corrupt(format!(
                "{data_count} payloads cannot fit in {} bytes",
                reader.remaining()
            )));
        }
        let mut data = Vec::new();
        try_reserve(&mut data, data_count)?;
        for index in 0..data_count {
            let len = reader.read_len("payload length")?;
            let raw = reader.take(len, "payload")?;
            let payload = T::read_record(raw).map_err(|e| match e {
                TreeError::CorruptEncoding(msg) => TreeError::corrupt(format!("payload {index}: {msg}")),
                other => other,
            })?;
            data.push(payload);
        }

        if reader.remaining() != 0 {
            return Err(TreeError::corrupt(format!(
                "{} trailing bytes after the last payload",
                reader.remaining()
            )));
        }
        Ok(SuccinctEncoding::from_parts(structure_bits, data, node_count))
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.bytes.len() - self.pos
    }

    fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&end| end <= self.bytes.len()).ok_or_else(|| {
            TreeError::corrupt(format!(
                "{what} needs {len} bytes at offset {}, only {} left",
                self.pos,
                self.remaining()
            ))
        })?;
        let slice = &self.bytes[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_len(&mut self, what: &str) -> Result<usize> {
        let raw = self.take(8, what)?;
        let mut word = [0u8; 8];
        word.copy_from_slice(raw);
        usize::try_from(u64::from_le_bytes(word))
            .map_err(|_| TreeError::corrupt(format!("{what} does not fit in memory")))
    }
}
