//! Immutable byte sequences with unsigned lexicographic ordering.

use bytes::Bytes;

/// An immutable byte sequence.
///
/// Comparison, equality and hashing follow unsigned lexicographic byte
/// order, which is also the order the engine scans in. Cloning and slicing
/// are cheap; the underlying storage is shared and never mutated, so
/// buffers may be handed across threads freely.
#[derive(Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StaticBuffer(Bytes);

impl StaticBuffer {
    /// The empty buffer.
    pub fn empty() -> Self {
        StaticBuffer(Bytes::new())
    }

    /// Copies `bytes` into a new buffer.
    pub fn from_slice(bytes: &[u8]) -> Self {
        StaticBuffer(Bytes::copy_from_slice(bytes))
    }

    /// Length in bytes.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the buffer holds no bytes.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The byte at `index`. Panics when out of range, like indexing.
    pub fn byte_at(&self, index: usize) -> u8 {
        self.0[index]
    }

    /// The underlying bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.0
    }

    /// A zero-copy sub-buffer over `range`.
    pub fn slice(&self, range: impl std::ops::RangeBounds<usize>) -> StaticBuffer {
        StaticBuffer(self.0.slice(range))
    }

    /// Whether `prefix` is a prefix of this buffer.
    pub fn starts_with(&self, prefix: &StaticBuffer) -> bool {
        self.0.starts_with(prefix.as_slice())
    }

    /// This buffer followed by `other`, in a fresh allocation.
    pub fn concat(&self, other: &StaticBuffer) -> StaticBuffer {
        let mut joined = Vec::with_capacity(self.len() + other.len());
        joined.extend_from_slice(self.as_slice());
        joined.extend_from_slice(other.as_slice());
        StaticBuffer(Bytes::from(joined))
    }

    /// Copies the bytes out.
    pub fn to_vec(&self) -> Vec<u8> {
        self.0.to_vec()
    }
}

impl std::fmt::Debug for StaticBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(&self.0))
    }
}

impl AsRef<[u8]> for StaticBuffer {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

impl From<Vec<u8>> for StaticBuffer {
    fn from(bytes: Vec<u8>) -> Self {
        StaticBuffer(Bytes::from(bytes))
    }
}

impl From<Bytes> for StaticBuffer {
    fn from(bytes: Bytes) -> Self {
        StaticBuffer(bytes)
    }
}

impl From<&str> for StaticBuffer {
    fn from(text: &str) -> Self {
        StaticBuffer(Bytes::copy_from_slice(text.as_bytes()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_unsigned_lexicographic() {
        let low = StaticBuffer::from_slice(&[0x01]);
        let high = StaticBuffer::from_slice(&[0xff]);
        assert!(low < high);

        // A strict prefix sorts first.
        let short = StaticBuffer::from("ab");
        let long = StaticBuffer::from("abc");
        assert!(short < long);

        assert!(StaticBuffer::empty() < low);
    }

    #[test]
    fn concat_joins_in_order() {
        let joined = StaticBuffer::from("row").concat(&StaticBuffer::from(":1"));
        assert_eq!(joined.as_slice(), b"row:1");
        assert!(joined.starts_with(&StaticBuffer::from("row")));
    }

    #[test]
    fn slice_is_zero_copy_view() {
        let buf = StaticBuffer::from("columns");
        assert_eq!(buf.slice(0..3).as_slice(), b"col");
        assert_eq!(buf.slice(3..).as_slice(), b"umns");
        assert_eq!(buf.byte_at(0), b'c');
    }

    #[test]
    fn debug_renders_hex() {
        let buf = StaticBuffer::from_slice(&[0x00, 0x1f, 0xab]);
        assert_eq!(format!("{:?}", buf), "0x001fab");
    }
}
