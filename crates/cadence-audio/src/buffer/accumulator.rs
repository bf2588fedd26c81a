//! Byte buffer with separately tracked capacity and logical length.
//!
//! The backing storage only ever grows while a buffer is in use, so the
//! decode loop can repeatedly append and consume without reallocating once
//! the steady-state size is reached.

#![allow(clippy::unwrap_used)] // Tests use unwrap for brevity

use tracing::debug;

/// Growable byte sequence.
///
/// `capacity()` is the size of the zero-initialized backing storage and
/// `len()` the number of valid bytes at its front.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ByteBuffer {
    /// Backing storage; its length is the buffer capacity.
    data: Vec<u8>,
    /// Logical length, always `<= data.len()`.
    len: usize,
}

impl ByteBuffer {
    /// Create an empty buffer with no storage.
    pub const fn new() -> Self {
        Self {
            data: Vec::new(),
            len: 0,
        }
    }

    /// Create an empty buffer with `capacity` bytes of zeroed storage.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            data: vec![0; capacity],
            len: 0,
        }
    }

    /// Create a buffer holding a copy of `bytes`.
    pub fn from_slice(bytes: &[u8]) -> Self {
        Self {
            data: bytes.to_vec(),
            len: bytes.len(),
        }
    }

    /// Size of the backing storage.
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Number of valid bytes.
    pub const fn len(&self) -> usize {
        self.len
    }

    pub const fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Free space after the logical end.
    pub fn remaining(&self) -> usize {
        self.data.len() - self.len
    }

    /// The valid bytes.
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }

    /// The writable region after the logical end.
    pub fn spare_mut(&mut self) -> &mut [u8] {
        &mut self.data[self.len..]
    }

    /// Split into the valid bytes and the writable region after them.
    pub fn split_spare_mut(&mut self) -> (&[u8], &mut [u8]) {
        let (filled, spare) = self.data.split_at_mut(self.len);
        (filled, spare)
    }

    /// Mark `count` bytes of the spare region as valid.
    pub fn commit(&mut self, count: usize) {
        debug_assert!(count <= self.remaining());
        self.len = (self.len + count).min(self.data.len());
    }

    /// Grow the backing storage to at least `required` bytes.
    ///
    /// Never shrinks; existing bytes keep their offsets. Slices obtained
    /// before the call must be fetched again afterwards.
    pub fn ensure_capacity(&mut self, required: usize) {
        let current = self.data.len();
        if current < required {
            debug!(
                "Increasing filtered audio buffer size from {} to {}",
                current, required
            );
            self.data.resize(required, 0);
        }
    }

    /// Append bytes, growing the storage if needed.
    pub fn append(&mut self, bytes: &[u8]) {
        let end = self.len + bytes.len();
        self.ensure_capacity(end);
        self.data[self.len..end].copy_from_slice(bytes);
        self.len = end;
    }

    /// Shift the content right by `count` bytes and fill the gap with `fill`.
    pub fn prepend(&mut self, count: usize, fill: u8) {
        self.ensure_capacity(self.len + count);
        self.data.copy_within(0..self.len, count);
        self.data[..count].fill(fill);
        self.len += count;
    }

    /// Remove up to `count` bytes from the front; the capacity is kept.
    ///
    /// Returns the number of bytes removed.
    pub fn consume(&mut self, count: usize) -> usize {
        let count = count.min(self.len);
        self.data.copy_within(count..self.len, 0);
        self.len -= count;
        count
    }

    /// Shorten the logical length; has no effect if `len` is not smaller.
    pub fn truncate(&mut self, len: usize) {
        self.len = self.len.min(len);
    }

    /// Drop all valid bytes, keeping the storage.
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Free the backing storage.
    pub fn release(&mut self) {
        self.data = Vec::new();
        self.len = 0;
    }

    /// Copy out the valid bytes.
    pub fn to_vec(&self) -> Vec<u8> {
        self.as_slice().to_vec()
    }
}

/// Insert `count` copies of `fill` in front of the buffer content.
///
/// Used by callers that need leading silence, e.g. to realign audio with video.
pub fn pad_front(buffer: &mut ByteBuffer, count: usize, fill: u8) {
    buffer.prepend(count, fill);
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_ensure_capacity_grows_and_preserves() {
        let mut buffer = ByteBuffer::from_slice(&[1, 2, 3]);
        buffer.ensure_capacity(16);
        assert_eq!(buffer.capacity(), 16);
        assert_eq!(buffer.as_slice(), &[1, 2, 3]);

        buffer.ensure_capacity(4);
        assert_eq!(buffer.capacity(), 16);
    }

    #[test]
    fn test_append_and_consume() {
        let mut buffer = ByteBuffer::with_capacity(4);
        buffer.append(&[1, 2, 3]);
        buffer.append(&[4, 5, 6]);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4, 5, 6]);
        assert!(buffer.capacity() >= 6);

        let capacity = buffer.capacity();
        assert_eq!(buffer.consume(2), 2);
        assert_eq!(buffer.as_slice(), &[3, 4, 5, 6]);
        assert_eq!(buffer.capacity(), capacity);

        assert_eq!(buffer.consume(10), 4);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_prepend_fills_front() {
        let mut buffer = ByteBuffer::from_slice(&[7, 8]);
        pad_front(&mut buffer, 3, 0);
        assert_eq!(buffer.as_slice(), &[0, 0, 0, 7, 8]);
        assert_eq!(buffer.len(), 5);
    }

    #[test]
    fn test_spare_and_commit() {
        let mut buffer = ByteBuffer::with_capacity(8);
        buffer.append(&[1, 2]);
        {
            let spare = buffer.spare_mut();
            assert_eq!(spare.len(), 6);
            spare[..2].copy_from_slice(&[3, 4]);
        }
        buffer.commit(2);
        assert_eq!(buffer.as_slice(), &[1, 2, 3, 4]);
        assert_eq!(buffer.remaining(), 4);
    }

    #[test]
    fn test_release() {
        let mut buffer = ByteBuffer::from_slice(&[1, 2, 3]);
        buffer.release();
        assert_eq!(buffer.capacity(), 0);
        assert!(buffer.is_empty());
    }

    proptest! {
        #[test]
        fn prop_ensure_capacity_idempotent(
            content in proptest::collection::vec(any::<u8>(), 0..256),
            target in 0usize..1024,
            smaller in 0usize..1024,
        ) {
            let mut buffer = ByteBuffer::from_slice(&content);
            buffer.ensure_capacity(target);
            let capacity = buffer.capacity();
            let snapshot = buffer.clone();

            buffer.ensure_capacity(target);
            buffer.ensure_capacity(smaller.min(target));
            prop_assert_eq!(buffer.capacity(), capacity);
            prop_assert_eq!(&buffer, &snapshot);
            prop_assert!(buffer.capacity() >= target);
            prop_assert_eq!(buffer.as_slice(), content.as_slice());
        }

        #[test]
        fn prop_pad_then_consume_roundtrip(
            content in proptest::collection::vec(any::<u8>(), 0..256),
            count in 0usize..512,
        ) {
            let mut buffer = ByteBuffer::from_slice(&content);
            pad_front(&mut buffer, count, 0);
            prop_assert_eq!(buffer.len(), content.len() + count);
            prop_assert!(buffer.as_slice()[..count].iter().all(|&b| b == 0));

            buffer.consume(count);
            prop_assert_eq!(buffer.as_slice(), content.as_slice());
            prop_assert_eq!(buffer.len(), content.len());
        }
    }
}
