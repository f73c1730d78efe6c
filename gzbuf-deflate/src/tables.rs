//! Static DEFLATE tables (RFC 1951 sections 3.2.5 and 3.2.6).

use crate::huffman::{CodeSet, HuffmanTree, canonical_codes};
use std::sync::OnceLock;

/// Number of literal/length symbols covered by the fixed code.
pub const FIXED_LITLEN_SYMBOLS: usize = 288;

/// Number of distance symbols covered by the fixed code.
pub const FIXED_DISTANCE_SYMBOLS: usize = 30;

/// Fixed literal/length code lengths.
///
/// - Symbols 0-143: 8 bits
/// - Symbols 144-255: 9 bits
/// - Symbols 256-279: 7 bits
/// - Symbols 280-287: 8 bits
pub const FIXED_LITLEN_LENGTHS: [u8; FIXED_LITLEN_SYMBOLS] = {
    let mut lengths = [8u8; FIXED_LITLEN_SYMBOLS];
    let mut i = 144;
    while i < 256 {
        lengths[i] = 9;
        i += 1;
    }
    while i < 280 {
        lengths[i] = 7;
        i += 1;
    }
    lengths
};

/// Fixed distance code lengths: every code is 5 bits.
pub const FIXED_DISTANCE_LENGTHS: [u8; FIXED_DISTANCE_SYMBOLS] = [5; FIXED_DISTANCE_SYMBOLS];

/// Length code base values for symbols 257-285.
pub const LENGTH_BASE: [u16; 29] = [
    3, 4, 5, 6, 7, 8, 9, 10, 11, 13, 15, 17, 19, 23, 27, 31, 35, 43, 51, 59, 67, 83, 99, 115, 131,
    163, 195, 227, 258,
];

/// Extra bits for length symbols 257-285.
pub const LENGTH_EXTRA_BITS: [u8; 29] = [
    0, 0, 0, 0, 0, 0, 0, 0, 1, 1, 1, 1, 2, 2, 2, 2, 3, 3, 3, 3, 4, 4, 4, 4, 5, 5, 5, 5, 0,
];

/// Distance code base values for symbols 0-29.
pub const DISTANCE_BASE: [u16; 30] = [
    1, 2, 3, 4, 5, 7, 9, 13, 17, 25, 33, 49, 65, 97, 129, 193, 257, 385, 513, 769, 1025, 1537,
    2049, 3073, 4097, 6145, 8193, 12289, 16385, 24577,
];

/// Extra bits for distance symbols 0-29.
pub const DISTANCE_EXTRA_BITS: [u8; 30] = [
    0, 0, 0, 0, 1, 1, 2, 2, 3, 3, 4, 4, 5, 5, 6, 6, 7, 7, 8, 8, 9, 9, 10, 10, 11, 11, 12, 12, 13,
    13,
];

/// Transmission order of code length code lengths in a dynamic block header.
pub const CODE_LENGTH_ORDER: [usize; 19] = [
    16, 17, 18, 0, 8, 7, 9, 6, 10, 5, 11, 4, 12, 3, 13, 2, 14, 1, 15,
];

/// Map a match length (3-258) to `(symbol, extra bit count, extra value)`.
#[inline]
pub fn length_code(length: u16) -> (u16, u8, u16) {
    debug_assert!((3..=258).contains(&length), "length out of range: {length}");
    // 258 has its own symbol even though 227 + 31 would also reach it.
    let index = if length == 258 {
        28
    } else {
        LENGTH_BASE[..28].partition_point(|&base| base <= length) - 1
    };
    (
        257 + index as u16,
        LENGTH_EXTRA_BITS[index],
        length - LENGTH_BASE[index],
    )
}

/// Map a match distance (1-32768) to `(symbol, extra bit count, extra value)`.
#[inline]
pub fn distance_code(distance: u16) -> (u16, u8, u16) {
    debug_assert!(distance >= 1, "distance out of range: {distance}");
    let index = DISTANCE_BASE.partition_point(|&base| base <= distance) - 1;
    (
        index as u16,
        DISTANCE_EXTRA_BITS[index],
        distance - DISTANCE_BASE[index],
    )
}

/// Decoding trees for the fixed code, built once.
///
/// The distance tree covers all 32 five-bit codes so that it is complete;
/// symbols 30 and 31 are rejected by the decoder.
pub fn fixed_trees() -> &'static (HuffmanTree, HuffmanTree) {
    static TREES: OnceLock<(HuffmanTree, HuffmanTree)> = OnceLock::new();
    TREES.get_or_init(|| {
        (
            HuffmanTree::from_code_lengths(&FIXED_LITLEN_LENGTHS, CodeSet::Literals)
                .expect("fixed literal/length code is complete"),
            HuffmanTree::from_code_lengths(&[5; 32], CodeSet::Distances)
                .expect("fixed distance code is valid"),
        )
    })
}

/// Bit-reversed codes for the fixed literal/length and distance alphabets.
pub fn fixed_codes() -> &'static (Vec<u16>, Vec<u16>) {
    static CODES: OnceLock<(Vec<u16>, Vec<u16>)> = OnceLock::new();
    CODES.get_or_init(|| {
        (
            canonical_codes(&FIXED_LITLEN_LENGTHS),
            canonical_codes(&FIXED_DISTANCE_LENGTHS),
        )
    })
}
