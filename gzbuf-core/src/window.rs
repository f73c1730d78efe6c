//! History window for inflate back-references.
//!
//! Output slices handed to the decoder may be much smaller than a match
//! distance, so the decoder keeps its own copy of the most recent bytes.

/// Circular history of recently produced bytes.
#[derive(Debug, Clone)]
pub struct Window {
    buffer: Vec<u8>,
    /// Next write position.
    position: usize,
    /// Bytes written, saturating at capacity.
    len: usize,
    mask: usize,
}

impl Window {
    /// Create a window holding `size` bytes. `size` is rounded up to a power
    /// of two.
    pub fn new(size: usize) -> Self {
        let capacity = size.max(1).next_power_of_two();
        Self {
            buffer: vec![0; capacity],
            position: 0,
            len: 0,
            mask: capacity - 1,
        }
    }

    /// Window capacity in bytes.
    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    /// Number of bytes of history available.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether no bytes have been written yet.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Append one byte.
    #[inline]
    pub fn push(&mut self, byte: u8) {
        self.buffer[self.position] = byte;
        self.position = (self.position + 1) & self.mask;
        if self.len < self.buffer.len() {
            self.len += 1;
        }
    }

    /// Append a run of bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        // Only the tail can survive.
        let tail = &bytes[bytes.len().saturating_sub(self.buffer.len())..];
        for &byte in tail {
            self.push(byte);
        }
        self.len = (self.len + (bytes.len() - tail.len())).min(self.buffer.len());
    }

    /// The byte written `distance` positions ago (1 = most recent).
    #[inline]
    pub fn byte_at(&self, distance: usize) -> Option<u8> {
        if distance == 0 || distance > self.len {
            return None;
        }
        Some(self.buffer[self.position.wrapping_sub(distance) & self.mask])
    }

    /// Forget all history.
    pub fn clear(&mut self) {
        self.position = 0;
        self.len = 0;
    }
}
