//! Bit-level I/O for the DEFLATE bit stream.
//!
//! DEFLATE packs bits LSB-first within bytes. This module provides:
//!
//! - [`BitReader`]: reads bits from a borrowed input slice. The reader is
//!   resumable: the partially consumed bit buffer is carried across calls in a
//!   [`BitState`], and a [`Checkpoint`] lets a decoder rewind to a symbol
//!   boundary when the input runs out in the middle of a code.
//! - [`BitWriter`]: accumulates bits into an owned byte queue that is drained
//!   into caller-provided output slices.
//!
//! # Example
//!
//! ```
//! use gzbuf_core::bitstream::{BitReader, BitState, BitWriter};
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0b101, 3);
//! writer.write_bits(0b1100, 4);
//! writer.align_to_byte();
//! let bytes = writer.take_all();
//!
//! let mut reader = BitReader::resume(&bytes, BitState::default());
//! assert_eq!(reader.read_bits(3), Some(0b101));
//! assert_eq!(reader.read_bits(4), Some(0b1100));
//! ```

/// Bits that were pulled from a previous input slice but not yet consumed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitState {
    buffer: u64,
    count: u8,
}

impl BitState {
    /// Number of buffered bits.
    pub fn bits(&self) -> u8 {
        self.count
    }
}

/// A saved reader position that can be restored with [`BitReader::rewind`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint {
    pos: usize,
    buffer: u64,
    count: u8,
}

/// Resumable LSB-first bit reader over a borrowed input slice.
///
/// Bytes are pulled from the slice one at a time and only when a read needs
/// them, so the number of consumed bytes stays close to what was decoded.
#[derive(Debug)]
pub struct BitReader<'a> {
    /// Input for the current call.
    input: &'a [u8],
    /// Next unread byte in `input`.
    pos: usize,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of valid bits in buffer.
    count: u8,
}

impl<'a> BitReader<'a> {
    /// Create a reader over `input`, continuing from bits carried in `state`.
    pub fn resume(input: &'a [u8], state: BitState) -> Self {
        Self {
            input,
            pos: 0,
            buffer: state.buffer,
            count: state.count,
        }
    }

    /// Save the buffered bits so a later call can resume with new input.
    pub fn suspend(&self) -> BitState {
        BitState {
            buffer: self.buffer,
            count: self.count,
        }
    }

    /// Number of bytes pulled from the current input slice.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    /// Capture the current position.
    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            pos: self.pos,
            buffer: self.buffer,
            count: self.count,
        }
    }

    /// Restore a position captured by [`checkpoint`](Self::checkpoint).
    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.pos;
        self.buffer = checkpoint.buffer;
        self.count = checkpoint.count;
    }

    /// Pull one byte into the bit buffer.
    #[inline]
    fn pull(&mut self) -> bool {
        match self.input.get(self.pos) {
            Some(&byte) if self.count <= 56 => {
                self.buffer |= (byte as u64) << self.count;
                self.count += 8;
                self.pos += 1;
                true
            }
            _ => false,
        }
    }

    /// Make at least `count` bits available. Returns `false` if the input is
    /// exhausted first.
    #[inline]
    pub fn ensure(&mut self, count: u8) -> bool {
        debug_assert!(count <= 56, "Cannot buffer more than 56 bits at once");
        while self.count < count {
            if !self.pull() {
                return false;
            }
        }
        true
    }

    /// Buffer up to `count` bits, stopping quietly at the end of input.
    #[inline]
    pub fn fill(&mut self, count: u8) {
        while self.count < count && self.pull() {}
    }

    /// Number of bits currently buffered.
    #[inline]
    pub fn available(&self) -> u8 {
        self.count
    }

    /// Look at the next `count` buffered bits without consuming them.
    #[inline]
    pub fn peek(&self, count: u8) -> u32 {
        debug_assert!(count <= 32 && count <= self.count);
        (self.buffer & ((1u64 << count) - 1)) as u32
    }

    /// Drop `count` buffered bits.
    #[inline]
    pub fn consume(&mut self, count: u8) {
        debug_assert!(count <= self.count);
        self.buffer >>= count;
        self.count -= count;
    }

    /// Read up to 32 bits, or `None` if the input runs out.
    #[inline]
    pub fn read_bits(&mut self, count: u8) -> Option<u32> {
        if count == 0 {
            return Some(0);
        }
        if !self.ensure(count) {
            return None;
        }
        let value = self.peek(count);
        self.consume(count);
        Some(value)
    }

    /// Read a single bit.
    pub fn read_bit(&mut self) -> Option<bool> {
        self.read_bits(1).map(|bit| bit != 0)
    }

    /// Discard bits up to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let remainder = self.count % 8;
        self.consume(remainder);
    }

    /// Number of whole bytes readable after alignment (buffered plus unread).
    pub fn bytes_available(&self) -> usize {
        (self.count / 8) as usize + (self.input.len() - self.pos)
    }

    /// Read one byte. The reader must be byte-aligned.
    pub fn read_byte(&mut self) -> Option<u8> {
        debug_assert!(self.count % 8 == 0, "read_byte requires alignment");
        if self.count >= 8 {
            let byte = (self.buffer & 0xFF) as u8;
            self.consume(8);
            Some(byte)
        } else {
            let byte = *self.input.get(self.pos)?;
            self.pos += 1;
            Some(byte)
        }
    }

    /// Take up to `max` bytes straight from the input slice.
    ///
    /// Only valid once the bit buffer is empty; buffered bytes must be read
    /// with [`read_byte`](Self::read_byte) first.
    pub fn take_bytes(&mut self, max: usize) -> &'a [u8] {
        debug_assert!(self.count == 0, "take_bytes requires an empty bit buffer");
        let input: &'a [u8] = self.input;
        let end = self.pos + max.min(input.len() - self.pos);
        let bytes = &input[self.pos..end];
        self.pos = end;
        bytes
    }

    /// Return whole buffered bytes to the input so that [`consumed`](Self::consumed)
    /// reports only what the decoder actually used.
    pub fn give_back(&mut self) {
        let whole = ((self.count / 8) as usize).min(self.pos);
        self.pos -= whole;
        self.count -= (whole * 8) as u8;
        self.buffer &= (1u64 << self.count).wrapping_sub(1);
    }
}

/// LSB-first bit writer that queues complete bytes for draining.
#[derive(Debug, Default)]
pub struct BitWriter {
    /// Completed bytes waiting to be drained.
    bytes: Vec<u8>,
    /// Bytes of `bytes` already handed out.
    drained: usize,
    /// Bit buffer (LSB-first).
    buffer: u64,
    /// Number of bits in buffer.
    count: u8,
    /// Total bits written.
    total_bits: u64,
}

impl BitWriter {
    /// Create an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of bits written so far.
    pub fn bit_position(&self) -> u64 {
        self.total_bits
    }

    #[inline]
    fn flush_bytes(&mut self) {
        while self.count >= 8 {
            self.bytes.push((self.buffer & 0xFF) as u8);
            self.buffer >>= 8;
            self.count -= 8;
        }
    }

    /// Write up to 32 bits (LSB-first).
    #[inline]
    pub fn write_bits(&mut self, value: u32, count: u8) {
        debug_assert!(count <= 32, "Cannot write more than 32 bits at once");
        if count == 0 {
            return;
        }
        let mask = (1u64 << count) - 1;
        self.buffer |= (value as u64 & mask) << self.count;
        self.count += count;
        self.total_bits += count as u64;
        self.flush_bytes();
    }

    /// Write a single bit.
    #[inline]
    pub fn write_bit(&mut self, bit: bool) {
        self.write_bits(bit as u32, 1);
    }

    /// Pad with zero bits to the next byte boundary.
    pub fn align_to_byte(&mut self) {
        let remainder = self.count % 8;
        if remainder != 0 {
            self.write_bits(0, 8 - remainder);
        }
    }

    /// Append raw bytes. The writer must be byte-aligned.
    pub fn write_bytes(&mut self, data: &[u8]) {
        debug_assert!(self.count == 0, "write_bytes requires alignment");
        self.bytes.extend_from_slice(data);
        self.total_bits += data.len() as u64 * 8;
    }

    /// Number of completed bytes not yet drained.
    pub fn pending(&self) -> usize {
        self.bytes.len() - self.drained
    }

    /// Whether any bits are still held back in the partial byte.
    pub fn has_partial_byte(&self) -> bool {
        self.count != 0
    }

    /// Copy as many completed bytes as fit into `dst`.
    pub fn drain(&mut self, dst: &mut [u8]) -> usize {
        let n = self.pending().min(dst.len());
        dst[..n].copy_from_slice(&self.bytes[self.drained..self.drained + n]);
        self.drained += n;
        if self.drained == self.bytes.len() {
            self.bytes.clear();
            self.drained = 0;
        }
        n
    }

    /// Take every completed byte. Bits of an unfinished byte stay buffered.
    pub fn take_all(&mut self) -> Vec<u8> {
        let mut bytes = std::mem::take(&mut self.bytes);
        bytes.drain(..self.drained);
        self.drained = 0;
        bytes
    }
}
