//! DEFLATE block encoding.
//!
//! Every block is costed exactly as stored, fixed-Huffman and
//! dynamic-Huffman, and the cheapest encoding is written. Since a block never
//! covers more than [`MAX_STORED_BLOCK`] input bytes, no block costs more than
//! its stored form; this is what keeps compressed output within
//! [`compress_bound`](crate::compress_bound).

use crate::huffman::{
    CODELEN_ALPHABET_SIZE, DISTANCE_ALPHABET_SIZE, END_OF_BLOCK, HuffmanBuilder,
    LITLEN_ALPHABET_SIZE, MAX_CODE_LENGTH, MAX_CODELEN_LENGTH, canonical_codes,
};
use crate::lz77::Lz77Token;
use crate::tables::{
    CODE_LENGTH_ORDER, FIXED_DISTANCE_LENGTHS, FIXED_LITLEN_LENGTHS, distance_code, fixed_codes,
    length_code,
};
use gzbuf_core::BitWriter;
use tracing::trace;

/// Largest payload of a single stored block.
pub const MAX_STORED_BLOCK: usize = 65535;

/// Encoding chosen for a block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    /// BTYPE 00.
    Stored,
    /// BTYPE 01.
    Fixed,
    /// BTYPE 10.
    Dynamic,
}

/// Which encodings a block may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BlockEncoder {
    /// Only stored blocks (level 0).
    pub store_only: bool,
    /// Dynamic trees are permitted.
    pub allow_dynamic: bool,
}

/// Dynamic Huffman code for one block, with its RLE-coded header.
#[derive(Debug)]
struct DynamicCode {
    litlen_lengths: Vec<u8>,
    dist_lengths: Vec<u8>,
    codelen_lengths: Vec<u8>,
    /// Number of literal/length codes sent (257..=286).
    hlit: usize,
    /// Number of distance codes sent (1..=30).
    hdist: usize,
    /// Number of code length codes sent (4..=19).
    hclen: usize,
    /// Run-length coded code lengths: (symbol, extra value).
    runs: Vec<(u8, u8)>,
}

impl DynamicCode {
    fn build(litlen_freq: &[u32], dist_freq: &[u32]) -> Self {
        let litlen_lengths =
            HuffmanBuilder::from_frequencies(litlen_freq, MAX_CODE_LENGTH as u8).build_lengths();
        let dist_lengths =
            HuffmanBuilder::from_frequencies(dist_freq, MAX_CODE_LENGTH as u8).build_lengths();

        let hlit = used_prefix(&litlen_lengths).max(257);
        let hdist = used_prefix(&dist_lengths).max(1);

        let mut all = Vec::with_capacity(hlit + hdist);
        all.extend_from_slice(&litlen_lengths[..hlit]);
        all.extend_from_slice(&dist_lengths[..hdist]);
        let runs = run_length_encode(&all);

        let mut codelen_freq = [0u32; CODELEN_ALPHABET_SIZE];
        for &(symbol, _) in &runs {
            codelen_freq[symbol as usize] += 1;
        }
        let codelen_lengths =
            HuffmanBuilder::from_frequencies(&codelen_freq, MAX_CODELEN_LENGTH as u8)
                .build_lengths();
        let hclen = CODE_LENGTH_ORDER
            .iter()
            .rposition(|&symbol| codelen_lengths[symbol] != 0)
            .map_or(0, |i| i + 1)
            .max(4);

        Self {
            litlen_lengths,
            dist_lengths,
            codelen_lengths,
            hlit,
            hdist,
            hclen,
            runs,
        }
    }

    /// Bits taken by HLIT/HDIST/HCLEN and the coded trees.
    fn header_bits(&self) -> u64 {
        let runs: u64 = self
            .runs
            .iter()
            .map(|&(symbol, _)| {
                self.codelen_lengths[symbol as usize] as u64 + run_extra_bits(symbol) as u64
            })
            .sum();
        5 + 5 + 4 + 3 * self.hclen as u64 + runs
    }

    fn write_header(&self, writer: &mut BitWriter) {
        writer.write_bits((self.hlit - 257) as u32, 5);
        writer.write_bits((self.hdist - 1) as u32, 5);
        writer.write_bits((self.hclen - 4) as u32, 4);
        for &symbol in &CODE_LENGTH_ORDER[..self.hclen] {
            writer.write_bits(self.codelen_lengths[symbol] as u32, 3);
        }

        let codes = canonical_codes(&self.codelen_lengths);
        for &(symbol, extra) in &self.runs {
            writer.write_bits(
                codes[symbol as usize] as u32,
                self.codelen_lengths[symbol as usize],
            );
            let extra_bits = run_extra_bits(symbol);
            if extra_bits > 0 {
                writer.write_bits(extra as u32, extra_bits);
            }
        }
    }
}

/// Length of `lengths` without trailing zeros.
fn used_prefix(lengths: &[u8]) -> usize {
    lengths.iter().rposition(|&l| l != 0).map_or(0, |i| i + 1)
}

fn run_extra_bits(symbol: u8) -> u8 {
    match symbol {
        16 => 2,
        17 => 3,
        18 => 7,
        _ => 0,
    }
}

/// Run-length code a sequence of code lengths with symbols 16, 17 and 18.
fn run_length_encode(lengths: &[u8]) -> Vec<(u8, u8)> {
    let mut runs = Vec::new();
    let mut i = 0;

    while i < lengths.len() {
        let len = lengths[i];
        let mut count = lengths[i..].iter().take_while(|&&l| l == len).count();
        i += count;

        if len == 0 {
            while count >= 11 {
                let run = count.min(138);
                runs.push((18, (run - 11) as u8));
                count -= run;
            }
            if count >= 3 {
                runs.push((17, (count - 3) as u8));
                count = 0;
            }
        } else {
            runs.push((len, 0));
            count -= 1;
            while count >= 3 {
                let run = count.min(6);
                runs.push((16, (run - 3) as u8));
                count -= run;
            }
        }
        runs.extend(std::iter::repeat_n((len, 0), count));
    }

    runs
}

/// Symbol frequencies for a block, including one end-of-block.
fn count_frequencies(
    tokens: &[Lz77Token],
) -> ([u32; LITLEN_ALPHABET_SIZE], [u32; DISTANCE_ALPHABET_SIZE]) {
    let mut litlen = [0u32; LITLEN_ALPHABET_SIZE];
    let mut dist = [0u32; DISTANCE_ALPHABET_SIZE];

    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => litlen[byte as usize] += 1,
            Lz77Token::Match { length, distance } => {
                litlen[length_code(length).0 as usize] += 1;
                dist[distance_code(distance).0 as usize] += 1;
            }
        }
    }
    litlen[END_OF_BLOCK as usize] += 1;

    (litlen, dist)
}

/// Bits needed to code `tokens` plus end-of-block with the given lengths.
fn data_bits(tokens: &[Lz77Token], litlen_lengths: &[u8], dist_lengths: &[u8]) -> u64 {
    let body: u64 = tokens
        .iter()
        .map(|token| match *token {
            Lz77Token::Literal(byte) => litlen_lengths[byte as usize] as u64,
            Lz77Token::Match { length, distance } => {
                let (lsym, lbits, _) = length_code(length);
                let (dsym, dbits, _) = distance_code(distance);
                litlen_lengths[lsym as usize] as u64
                    + lbits as u64
                    + dist_lengths[dsym as usize] as u64
                    + dbits as u64
            }
        })
        .sum();
    body + litlen_lengths[END_OF_BLOCK as usize] as u64
}

fn write_tokens(
    writer: &mut BitWriter,
    tokens: &[Lz77Token],
    litlen: (&[u16], &[u8]),
    dist: (&[u16], &[u8]),
) {
    let (litlen_codes, litlen_lengths) = litlen;
    let (dist_codes, dist_lengths) = dist;

    for token in tokens {
        match *token {
            Lz77Token::Literal(byte) => {
                let symbol = byte as usize;
                writer.write_bits(litlen_codes[symbol] as u32, litlen_lengths[symbol]);
            }
            Lz77Token::Match { length, distance } => {
                let (lsym, lbits, lextra) = length_code(length);
                let lsym = lsym as usize;
                writer.write_bits(litlen_codes[lsym] as u32, litlen_lengths[lsym]);
                writer.write_bits(lextra as u32, lbits);

                let (dsym, dbits, dextra) = distance_code(distance);
                let dsym = dsym as usize;
                writer.write_bits(dist_codes[dsym] as u32, dist_lengths[dsym]);
                writer.write_bits(dextra as u32, dbits);
            }
        }
    }

    let eob = END_OF_BLOCK as usize;
    writer.write_bits(litlen_codes[eob] as u32, litlen_lengths[eob]);
}

impl BlockEncoder {
    /// Encode one block.
    ///
    /// `raw` is the input covered by `tokens`; it is written verbatim if a
    /// stored block is cheapest.
    pub fn write_block(
        &self,
        writer: &mut BitWriter,
        tokens: &[Lz77Token],
        raw: &[u8],
        is_final: bool,
    ) -> BlockKind {
        debug_assert!(raw.len() <= MAX_STORED_BLOCK);
        let start = writer.bit_position();

        let kind = if self.store_only {
            write_stored(writer, raw, is_final);
            BlockKind::Stored
        } else {
            self.write_cheapest(writer, tokens, raw, is_final)
        };

        trace!(
            ?kind,
            input = raw.len(),
            bits = writer.bit_position() - start,
            is_final,
            "deflate block"
        );
        kind
    }

    fn write_cheapest(
        &self,
        writer: &mut BitWriter,
        tokens: &[Lz77Token],
        raw: &[u8],
        is_final: bool,
    ) -> BlockKind {
        let pad = (8 - (writer.bit_position() + 3) % 8) % 8;
        let stored_bits = 3 + pad + 32 + 8 * raw.len() as u64;
        let fixed_bits = 3 + data_bits(tokens, &FIXED_LITLEN_LENGTHS, &FIXED_DISTANCE_LENGTHS);

        let dynamic = self.allow_dynamic.then(|| {
            let (litlen_freq, dist_freq) = count_frequencies(tokens);
            let code = DynamicCode::build(&litlen_freq, &dist_freq);
            let bits = 3
                + code.header_bits()
                + data_bits(tokens, &code.litlen_lengths, &code.dist_lengths);
            (code, bits)
        });

        let best_huffman = dynamic
            .as_ref()
            .map_or(fixed_bits, |(_, bits)| (*bits).min(fixed_bits));
        if raw.len() <= MAX_STORED_BLOCK && stored_bits <= best_huffman {
            write_stored(writer, raw, is_final);
            return BlockKind::Stored;
        }

        match dynamic {
            Some((code, bits)) if bits < fixed_bits => {
                writer.write_bit(is_final);
                writer.write_bits(0b10, 2);
                code.write_header(writer);
                let litlen_codes = canonical_codes(&code.litlen_lengths);
                let dist_codes = canonical_codes(&code.dist_lengths);
                write_tokens(
                    writer,
                    tokens,
                    (&litlen_codes, &code.litlen_lengths),
                    (&dist_codes, &code.dist_lengths),
                );
                BlockKind::Dynamic
            }
            _ => {
                writer.write_bit(is_final);
                writer.write_bits(0b01, 2);
                let (litlen_codes, dist_codes) = fixed_codes();
                write_tokens(
                    writer,
                    tokens,
                    (litlen_codes, &FIXED_LITLEN_LENGTHS),
                    (dist_codes, &FIXED_DISTANCE_LENGTHS),
                );
                BlockKind::Fixed
            }
        }
    }
}

/// Write a stored block. An empty non-final one is the sync flush marker.
pub fn write_stored(writer: &mut BitWriter, raw: &[u8], is_final: bool) {
    writer.write_bit(is_final);
    writer.write_bits(0b00, 2);
    writer.align_to_byte();
    let len = raw.len() as u16;
    writer.write_bits(len as u32, 16);
    writer.write_bits(!len as u32, 16);
    writer.write_bytes(raw);
}
