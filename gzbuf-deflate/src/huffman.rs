//! Huffman coding for DEFLATE.
//!
//! DEFLATE uses canonical Huffman codes: codes of the same length are
//! consecutive integers, assigned in symbol order. A code is fully described
//! by its list of code lengths.
//!
//! # Alphabets
//!
//! - **Literal/Length**: 0-285 (0-255 literals, 256 EOB, 257-285 lengths)
//! - **Distance**: 0-29
//! - **Code Length**: 0-18 (used to transmit the two trees above)
//!
//! Decoding ([`HuffmanTree`]) works on a resumable
//! [`BitReader`](gzbuf_core::BitReader): when the input runs out in the
//! middle of a code, `decode` reports `Ok(None)` without consuming anything.
//! Encoding uses [`HuffmanBuilder`] to derive length-limited code lengths from
//! symbol frequencies.

use gzbuf_core::BitReader;
use gzbuf_core::error::{CodecError, Result};
use std::cmp::Reverse;
use std::collections::BinaryHeap;

/// Maximum code length in DEFLATE (15 bits).
pub const MAX_CODE_LENGTH: usize = 15;

/// Maximum code length for the code length alphabet.
pub const MAX_CODELEN_LENGTH: usize = 7;

/// Size of the literal/length alphabet (0-285).
pub const LITLEN_ALPHABET_SIZE: usize = 286;

/// Size of the distance alphabet (0-29).
pub const DISTANCE_ALPHABET_SIZE: usize = 30;

/// Size of the code length alphabet (0-18).
pub const CODELEN_ALPHABET_SIZE: usize = 19;

/// End of block symbol.
pub const END_OF_BLOCK: u16 = 256;

/// Which alphabet a tree decodes. Controls validation and error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodeSet {
    /// Code length codes of a dynamic block header.
    CodeLengths,
    /// Literal/length codes.
    Literals,
    /// Distance codes.
    Distances,
}

impl CodeSet {
    fn name(self) -> &'static str {
        match self {
            Self::CodeLengths => "code lengths",
            Self::Literals => "literal/lengths",
            Self::Distances => "distances",
        }
    }

    fn symbol_name(self) -> &'static str {
        match self {
            Self::CodeLengths => "code lengths",
            Self::Literals => "literal/length",
            Self::Distances => "distance",
        }
    }
}

/// A canonical Huffman code prepared for decoding.
///
/// Codes up to `FAST_BITS` long resolve with one table lookup; longer codes
/// walk the per-length counts one bit at a time.
#[derive(Debug, Clone)]
pub struct HuffmanTree {
    /// Fast lookup indexed by the next `FAST_BITS` input bits.
    /// Entry is `symbol << 4 | length`, or 0 when the code is longer.
    fast_table: Vec<u16>,
    /// Number of codes of each length.
    counts: [u16; MAX_CODE_LENGTH + 1],
    /// Symbols ordered by (code length, symbol).
    symbols: Vec<u16>,
    /// Longest code length present.
    max_code_length: u8,
    set: CodeSet,
}

impl HuffmanTree {
    /// Number of bits for fast lookup table.
    const FAST_BITS: u8 = 9;

    /// Build a decoding tree from code lengths.
    ///
    /// Over-subscribed length sets are rejected. Incomplete sets are rejected
    /// too, except for a single one-bit code in the literal/length or distance
    /// alphabet. An all-zero set is accepted and fails when used.
    pub fn from_code_lengths(code_lengths: &[u8], set: CodeSet) -> Result<Self> {
        let mut counts = [0u16; MAX_CODE_LENGTH + 1];
        for &len in code_lengths {
            if len as usize > MAX_CODE_LENGTH {
                return Err(CodecError::data(format!("invalid {} set", set.name())));
            }
            counts[len as usize] += 1;
        }
        counts[0] = 0;

        let max_code_length = (1..=MAX_CODE_LENGTH)
            .rev()
            .find(|&len| counts[len] != 0)
            .unwrap_or(0) as u8;

        // Remaining code space after each length; negative means over-subscribed.
        let mut left: i32 = 1;
        for &count in &counts[1..] {
            left = (left << 1) - count as i32;
            if left < 0 {
                return Err(CodecError::data(format!("invalid {} set", set.name())));
            }
        }
        if left > 0
            && max_code_length != 0
            && (set == CodeSet::CodeLengths || max_code_length != 1)
        {
            return Err(CodecError::data(format!("invalid {} set", set.name())));
        }

        // Offsets into the symbol table for each length.
        let mut offsets = [0u16; MAX_CODE_LENGTH + 2];
        for len in 1..=MAX_CODE_LENGTH {
            offsets[len + 1] = offsets[len] + counts[len];
        }
        let mut symbols = vec![0u16; offsets[MAX_CODE_LENGTH + 1] as usize];
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len != 0 {
                symbols[offsets[len as usize] as usize] = symbol as u16;
                offsets[len as usize] += 1;
            }
        }

        let mut fast_table = vec![0u16; 1 << Self::FAST_BITS];
        let codes = canonical_codes(code_lengths);
        for (symbol, &len) in code_lengths.iter().enumerate() {
            if len == 0 || len > Self::FAST_BITS {
                continue;
            }
            let entry = ((symbol as u16) << 4) | len as u16;
            let mut index = codes[symbol] as usize;
            while index < fast_table.len() {
                fast_table[index] = entry;
                index += 1 << len;
            }
        }

        Ok(Self {
            fast_table,
            counts,
            symbols,
            max_code_length,
            set,
        })
    }

    /// Decode one symbol.
    ///
    /// Returns `Ok(None)` when the input ends before a full code is seen; no
    /// bits are consumed in that case.
    #[inline]
    pub fn decode(&self, reader: &mut BitReader<'_>) -> Result<Option<u16>> {
        if self.max_code_length == 0 {
            return Err(self.invalid_code());
        }
        reader.fill(MAX_CODE_LENGTH as u8);
        let available = reader.available();

        if available >= Self::FAST_BITS {
            let entry = self.fast_table[reader.peek(Self::FAST_BITS) as usize];
            if entry != 0 {
                reader.consume((entry & 0xF) as u8);
                return Ok(Some(entry >> 4));
            }
        }

        self.decode_slow(reader, available)
    }

    /// Canonical decode, one bit at a time.
    fn decode_slow(&self, reader: &mut BitReader<'_>, available: u8) -> Result<Option<u16>> {
        let mut code: i32 = 0;
        let mut first: i32 = 0;
        let mut index: i32 = 0;

        for len in 1..=MAX_CODE_LENGTH as u8 {
            if len > available {
                return Ok(None);
            }
            code |= ((reader.peek(len) >> (len - 1)) & 1) as i32;
            let count = self.counts[len as usize] as i32;
            if code - first < count {
                reader.consume(len);
                return Ok(Some(self.symbols[(index + code - first) as usize]));
            }
            index += count;
            first = (first + count) << 1;
            code <<= 1;
        }

        Err(self.invalid_code())
    }

    fn invalid_code(&self) -> CodecError {
        CodecError::data(format!("invalid {} code", self.set.symbol_name()))
    }
}

/// Bit-reversed canonical codes for a set of code lengths, ready to be
/// written LSB-first.
pub fn canonical_codes(code_lengths: &[u8]) -> Vec<u16> {
    let mut bl_count = [0u16; MAX_CODE_LENGTH + 1];
    for &len in code_lengths {
        bl_count[len as usize] += 1;
    }
    bl_count[0] = 0;

    let mut next_code = [0u16; MAX_CODE_LENGTH + 1];
    let mut code = 0u16;
    for bits in 1..=MAX_CODE_LENGTH {
        code = (code + bl_count[bits - 1]) << 1;
        next_code[bits] = code;
    }

    code_lengths
        .iter()
        .map(|&len| {
            if len == 0 {
                return 0;
            }
            let code = next_code[len as usize];
            next_code[len as usize] += 1;
            reverse_bits(code, len)
        })
        .collect()
}

/// Reverse the low `length` bits of `code`.
pub fn reverse_bits(code: u16, length: u8) -> u16 {
    code.reverse_bits() >> (16 - length as u32)
}

/// Builder for length-limited code lengths from symbol frequencies.
#[derive(Debug, Clone)]
pub struct HuffmanBuilder {
    frequencies: Vec<u32>,
    max_length: u8,
}

impl HuffmanBuilder {
    /// Create a new Huffman builder.
    pub fn new(alphabet_size: usize, max_length: u8) -> Self {
        debug_assert!((1..=MAX_CODE_LENGTH as u8).contains(&max_length));
        Self {
            frequencies: vec![0; alphabet_size],
            max_length,
        }
    }

    /// Build directly from an existing frequency table.
    pub fn from_frequencies(frequencies: &[u32], max_length: u8) -> Self {
        Self {
            frequencies: frequencies.to_vec(),
            max_length,
        }
    }

    /// Add a symbol occurrence.
    pub fn add(&mut self, symbol: u16) {
        self.add_count(symbol, 1);
    }

    /// Add multiple occurrences of a symbol.
    pub fn add_count(&mut self, symbol: u16, count: u32) {
        if let Some(freq) = self.frequencies.get_mut(symbol as usize) {
            *freq += count;
        }
    }

    /// Symbol frequencies.
    pub fn frequencies(&self) -> &[u32] {
        &self.frequencies
    }

    /// Build code lengths from frequencies.
    ///
    /// The result always describes a complete code with at least two symbols,
    /// so every DEFLATE decoder accepts it. Unused symbols get length 0 unless
    /// padding is needed to reach two codes.
    pub fn build_lengths(&self) -> Vec<u8> {
        let n = self.frequencies.len();
        let mut lengths = vec![0u8; n];

        let mut used: Vec<(u32, usize)> = self
            .frequencies
            .iter()
            .enumerate()
            .filter(|&(_, &f)| f > 0)
            .map(|(i, &f)| (f, i))
            .collect();

        if used.len() < 2 {
            let first = used.first().map_or(0, |&(_, s)| s);
            let second = if first == 0 { 1 } else { 0 };
            lengths[first] = 1;
            if second < n {
                lengths[second] = 1;
            }
            return lengths;
        }

        let depths = Self::tree_depths(&used);
        let max = self.max_length as usize;

        // Clamp to the limit, then repair the Kraft sum in units of 2^-max.
        let mut bl_count = [0u32; MAX_CODE_LENGTH + 1];
        for &depth in &depths {
            bl_count[depth.min(max)] += 1;
        }
        let mut kraft: u64 = (1..=max)
            .map(|len| (bl_count[len] as u64) << (max - len))
            .sum();
        while kraft > 1u64 << max {
            let mut bits = max - 1;
            while bl_count[bits] == 0 {
                bits -= 1;
            }
            bl_count[bits] -= 1;
            bl_count[bits + 1] += 2;
            bl_count[max] -= 1;
            kraft -= 1;
        }

        // Longest codes go to the least frequent symbols.
        used.sort_unstable();
        let mut symbols = used.iter();
        for len in (1..=max).rev() {
            for _ in 0..bl_count[len] {
                if let Some(&(_, symbol)) = symbols.next() {
                    lengths[symbol] = len as u8;
                }
            }
        }

        lengths
    }

    /// Depth of each leaf in an unrestricted Huffman tree, in input order.
    fn tree_depths(leaves: &[(u32, usize)]) -> Vec<usize> {
        let mut parent: Vec<usize> = vec![usize::MAX; leaves.len()];
        let mut heap: BinaryHeap<Reverse<(u64, usize)>> = leaves
            .iter()
            .enumerate()
            .map(|(node, &(freq, _))| Reverse((freq as u64, node)))
            .collect();

        while let (Some(Reverse((fa, a))), Some(Reverse((fb, b)))) = (heap.pop(), heap.pop()) {
            let node = parent.len();
            parent.push(usize::MAX);
            parent[a] = node;
            parent[b] = node;
            heap.push(Reverse((fa + fb, node)));
        }

        // Parents always have larger indices than their children.
        let mut depth = vec![0usize; parent.len()];
        for node in (0..parent.len()).rev() {
            if parent[node] != usize::MAX {
                depth[node] = depth[parent[node]] + 1;
            }
        }
        depth.truncate(leaves.len());
        depth
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gzbuf_core::{BitState, BitWriter};

    fn kraft_sum(lengths: &[u8]) -> f64 {
        lengths
            .iter()
            .filter(|&&l| l > 0)
            .map(|&l| 2f64.powi(-(l as i32)))
            .sum()
    }

    #[test]
    fn test_huffman_tree_simple() {
        // A=0, B=10, C=11; LSB-first stream for A B C A is 0 01 11 0.
        let lengths = [1u8, 2, 2];
        let tree = HuffmanTree::from_code_lengths(&lengths, CodeSet::Literals).unwrap();

        let data = [0b0001_1010u8];
        let mut reader = BitReader::resume(&data, BitState::default());

        assert_eq!(tree.decode(&mut reader).unwrap(), Some(0));
        assert_eq!(tree.decode(&mut reader).unwrap(), Some(1));
        assert_eq!(tree.decode(&mut reader).unwrap(), Some(2));
        assert_eq!(tree.decode(&mut reader).unwrap(), Some(0));
    }

    #[test]
    fn test_decode_needs_more_input() {
        // Four- and five-bit codes; one byte cannot hold two of them.
        let mut lengths = vec![4u8; 14];
        lengths.extend([5, 5, 5, 5]);
        let tree = HuffmanTree::from_code_lengths(&lengths, CodeSet::Literals).unwrap();
        let codes = canonical_codes(&lengths);

        let mut writer = BitWriter::new();
        writer.write_bits(codes[17] as u32, 5);
        writer.write_bits(codes[16] as u32, 5);
        writer.align_to_byte();
        let bytes = writer.take_all();

        let mut reader = BitReader::resume(&bytes[..1], BitState::default());
        assert_eq!(tree.decode(&mut reader).unwrap(), Some(17));
        let cp = reader.checkpoint();
        assert_eq!(tree.decode(&mut reader).unwrap(), None);
        assert_eq!(reader.checkpoint(), cp);

        let mut reader = BitReader::resume(&bytes[1..], reader.suspend());
        assert_eq!(tree.decode(&mut reader).unwrap(), Some(16));
    }

    #[test]
    fn test_long_codes_use_slow_path() {
        // Lengths 1..=14 plus two 15-bit codes form a complete code.
        let mut lengths: Vec<u8> = (1..=15).collect();
        lengths.push(15);
        let tree = HuffmanTree::from_code_lengths(&lengths, CodeSet::Literals).unwrap();
        let codes = canonical_codes(&lengths);

        let mut writer = BitWriter::new();
        for symbol in [15usize, 0, 12, 14] {
            writer.write_bits(codes[symbol] as u32, lengths[symbol]);
        }
        writer.align_to_byte();
        let bytes = writer.take_all();

        let mut reader = BitReader::resume(&bytes, BitState::default());
        for symbol in [15u16, 0, 12, 14] {
            assert_eq!(tree.decode(&mut reader).unwrap(), Some(symbol));
        }
    }

    #[test]
    fn test_oversubscribed_rejected() {
        let err = HuffmanTree::from_code_lengths(&[1, 1, 1], CodeSet::Literals).unwrap_err();
        assert_eq!(err.message, "invalid literal/lengths set");
    }

    #[test]
    fn test_incomplete_rules() {
        // A single one-bit code is allowed for literal and distance codes.
        assert!(HuffmanTree::from_code_lengths(&[0, 1, 0], CodeSet::Distances).is_ok());
        assert!(HuffmanTree::from_code_lengths(&[1, 0, 0], CodeSet::CodeLengths).is_err());
        assert!(HuffmanTree::from_code_lengths(&[1, 2, 0], CodeSet::Literals).is_err());
    }

    #[test]
    fn test_empty_tree_fails_on_use() {
        let tree = HuffmanTree::from_code_lengths(&[0, 0, 0, 0], CodeSet::Distances).unwrap();
        let data = [0u8; 4];
        let mut reader = BitReader::resume(&data, BitState::default());
        let err = tree.decode(&mut reader).unwrap_err();
        assert_eq!(err.message, "invalid distance code");
    }

    #[test]
    fn test_huffman_builder() {
        let mut builder = HuffmanBuilder::new(4, 15);
        builder.add_count(0, 100);
        builder.add_count(1, 50);
        builder.add_count(2, 25);
        builder.add_count(3, 25);

        let lengths = builder.build_lengths();
        assert_eq!(lengths, vec![1, 2, 3, 3]);
        assert_eq!(kraft_sum(&lengths), 1.0);
    }

    #[test]
    fn test_builder_respects_limit() {
        // Fibonacci frequencies produce a maximally skewed tree.
        let mut freqs = vec![1u32, 1];
        while freqs.len() < 30 {
            let next = freqs[freqs.len() - 1] + freqs[freqs.len() - 2];
            freqs.push(next);
        }
        for limit in [7u8, 9, 15] {
            let lengths = HuffmanBuilder::from_frequencies(&freqs, limit).build_lengths();
            assert!(lengths.iter().all(|&l| (1..=limit).contains(&l)));
            assert_eq!(kraft_sum(&lengths), 1.0, "limit {limit}");
            assert!(HuffmanTree::from_code_lengths(&lengths, CodeSet::Literals).is_ok());
        }
    }

    #[test]
    fn test_builder_pads_to_two_codes() {
        let lengths = HuffmanBuilder::new(30, 15).build_lengths();
        assert_eq!(&lengths[..3], &[1, 1, 0]);

        let mut builder = HuffmanBuilder::new(30, 15);
        builder.add(0);
        assert_eq!(&builder.build_lengths()[..2], &[1, 1]);

        let mut builder = HuffmanBuilder::new(30, 15);
        builder.add(7);
        let lengths = builder.build_lengths();
        assert_eq!((lengths[0], lengths[7]), (1, 1));
    }

    #[test]
    fn test_reverse_bits() {
        assert_eq!(reverse_bits(0b101, 3), 0b101);
        assert_eq!(reverse_bits(0b1100, 4), 0b0011);
        assert_eq!(reverse_bits(0b1010_1010, 8), 0b0101_0101);
    }
}
