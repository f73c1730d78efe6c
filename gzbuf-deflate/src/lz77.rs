//! LZ77 match finding for DEFLATE.
//!
//! The encoder keeps a sliding window of recent input and hash chains keyed
//! on three-byte prefixes. Input is appended with [`Lz77Encoder::push`] and
//! turned into tokens one block at a time with [`Lz77Encoder::tokenize`].
//!
//! # Algorithm
//!
//! - Positions are absolute stream offsets. `head` maps a hash to the most
//!   recent position (plus one, so zero means empty) and `prev` links each
//!   position to the previous one with the same hash.
//! - A chain is followed only while positions strictly decrease and stay
//!   within the window; slots reused by newer positions end the walk.
//! - Levels 4-9 use lazy evaluation: a match is deferred by one byte when the
//!   next position has a longer one.

/// Minimum match length.
pub const MIN_MATCH: usize = 3;

/// Maximum match length.
pub const MAX_MATCH: usize = 258;

/// Matches of minimum length farther back than this are not worth coding.
const TOO_FAR: usize = 4096;

/// A token produced by LZ77 matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lz77Token {
    /// A literal byte.
    Literal(u8),
    /// A back-reference to previously seen data.
    Match {
        /// Number of bytes to copy (3-258).
        length: u16,
        /// Distance back into the window (1-32768).
        distance: u16,
    },
}

/// Search effort for one compression level.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LevelParams {
    /// Hash chain links to follow per search.
    pub max_chain: usize,
    /// Stop searching once a match this long is found.
    pub nice_length: usize,
    /// Try the next position before committing to a match.
    pub lazy: bool,
}

impl LevelParams {
    /// Parameters for a level in 1..=9. Level 0 never searches.
    pub fn for_level(level: u8) -> Self {
        let (max_chain, nice_length, lazy) = match level {
            0 => (0, 0, false),
            1 => (4, 8, false),
            2 => (8, 16, false),
            3 => (32, 32, false),
            4 => (16, 16, true),
            5 => (32, 32, true),
            6 => (128, 128, true),
            7 => (256, 128, true),
            8 => (1024, MAX_MATCH, true),
            _ => (4096, MAX_MATCH, true),
        };
        Self {
            max_chain,
            nice_length,
            lazy,
        }
    }
}

/// Streaming LZ77 encoder.
#[derive(Debug)]
pub struct Lz77Encoder {
    params: LevelParams,
    /// History followed by unprocessed lookahead.
    window: Vec<u8>,
    /// Absolute position of `window[0]`.
    base: usize,
    /// Absolute position of the next byte to tokenize.
    pos: usize,
    /// Next absolute position to add to the hash chains.
    next_insert: usize,
    head: Vec<usize>,
    prev: Vec<usize>,
    hash_bits: u32,
    /// Window size in bytes (a power of two).
    w_size: usize,
}

impl Lz77Encoder {
    /// Create an encoder.
    ///
    /// `window_bits` sets the maximum match distance (`1 << window_bits`) and
    /// `hash_bits` the size of the hash table.
    pub fn new(params: LevelParams, window_bits: u8, hash_bits: u32) -> Self {
        let w_size = 1usize << window_bits;
        let searches = params.max_chain > 0;
        Self {
            params,
            window: Vec::new(),
            base: 0,
            pos: 0,
            next_insert: 0,
            head: if searches { vec![0; 1 << hash_bits] } else { Vec::new() },
            prev: if searches { vec![0; w_size] } else { Vec::new() },
            hash_bits,
            w_size,
        }
    }

    /// Number of buffered bytes not yet tokenized.
    pub fn pending(&self) -> usize {
        self.base + self.window.len() - self.pos
    }

    /// Append input.
    pub fn push(&mut self, data: &[u8]) {
        self.slide();
        self.window.extend_from_slice(data);
    }

    /// Drop history that can no longer be referenced.
    fn slide(&mut self) {
        let history = self.pos - self.base;
        if history >= 2 * self.w_size {
            let drop = history - self.w_size;
            self.window.drain(..drop);
            self.base += drop;
        }
    }

    /// Forget all history; later matches cannot reach back past this point.
    pub fn reset(&mut self) {
        let processed = self.pos - self.base;
        self.window.drain(..processed);
        self.base = self.pos;
        self.next_insert = self.pos;
        self.head.fill(0);
    }

    /// The next `len` unprocessed bytes.
    pub fn lookahead(&self, len: usize) -> &[u8] {
        let start = self.pos - self.base;
        &self.window[start..start + len]
    }

    /// The last `len` tokenized bytes.
    pub fn recent(&self, len: usize) -> &[u8] {
        let end = self.pos - self.base;
        &self.window[end - len..end]
    }

    #[inline]
    fn hash(&self, at: usize) -> usize {
        let i = at - self.base;
        let key = u32::from_le_bytes([self.window[i], self.window[i + 1], self.window[i + 2], 0]);
        (key.wrapping_mul(0x9E37_79B1) >> (32 - self.hash_bits)) as usize
    }

    /// Add positions before `upto` to the hash chains, as far as three bytes
    /// of data exist for them.
    fn insert_until(&mut self, upto: usize) {
        let end = self.base + self.window.len();
        while self.next_insert < upto && self.next_insert + MIN_MATCH <= end {
            let at = self.next_insert;
            let h = self.hash(at);
            self.prev[at & (self.w_size - 1)] = self.head[h];
            self.head[h] = at + 1;
            self.next_insert += 1;
        }
    }

    /// Longest match for `at` that does not extend past `limit`.
    fn find_match(&self, at: usize, limit: usize) -> Option<(usize, usize)> {
        let max_len = (limit - at).min(MAX_MATCH);
        if max_len < MIN_MATCH {
            return None;
        }

        let cur = &self.window[at - self.base..at - self.base + max_len];
        let mut best_len = MIN_MATCH - 1;
        let mut best_dist = 0;
        let mut candidate = self.head[self.hash(at)];
        let mut chain = self.params.max_chain;

        while candidate != 0 && chain > 0 {
            let cand = candidate - 1;
            if cand >= at || at - cand > self.w_size || cand < self.base {
                break;
            }
            let start = cand - self.base;
            let prior = &self.window[start..start + max_len];
            if prior[best_len] == cur[best_len] {
                let len = prior.iter().zip(cur).take_while(|(a, b)| a == b).count();
                if len > best_len {
                    best_len = len;
                    best_dist = at - cand;
                    if len >= self.params.nice_length || len == max_len {
                        break;
                    }
                }
            }

            let next = self.prev[cand & (self.w_size - 1)];
            if next == 0 || next - 1 >= cand {
                break;
            }
            candidate = next;
            chain -= 1;
        }

        if best_len < MIN_MATCH || (best_len == MIN_MATCH && best_dist > TOO_FAR) {
            None
        } else {
            Some((best_len, best_dist))
        }
    }

    /// Tokenize the next `len` pending bytes. Matches never cross the end of
    /// this run.
    pub fn tokenize(&mut self, len: usize, tokens: &mut Vec<Lz77Token>) {
        debug_assert!(len <= self.pending());
        let end = self.pos + len;

        if self.params.max_chain == 0 {
            tokens.extend(self.lookahead(len).iter().map(|&b| Lz77Token::Literal(b)));
            self.pos = end;
            return;
        }

        let mut carried: Option<(usize, usize)> = None;
        while self.pos < end {
            let at = self.pos;
            self.insert_until(at);
            let found = match carried.take() {
                Some(m) => Some(m),
                None => self.find_match(at, end),
            };

            let Some((length, distance)) = found else {
                tokens.push(Lz77Token::Literal(self.window[at - self.base]));
                self.pos += 1;
                continue;
            };

            if self.params.lazy && length < self.params.nice_length && at + 1 < end {
                self.insert_until(at + 1);
                if let Some(next) = self.find_match(at + 1, end) {
                    if next.0 > length {
                        tokens.push(Lz77Token::Literal(self.window[at - self.base]));
                        self.pos += 1;
                        carried = Some(next);
                        continue;
                    }
                }
            }

            tokens.push(Lz77Token::Match {
                length: length as u16,
                distance: distance as u16,
            });
            self.pos += length;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokenize_all(input: &[u8], level: u8) -> Vec<Lz77Token> {
        let mut encoder = Lz77Encoder::new(LevelParams::for_level(level), 15, 15);
        encoder.push(input);
        let mut tokens = Vec::new();
        encoder.tokenize(input.len(), &mut tokens);
        tokens
    }

    fn expand(tokens: &[Lz77Token]) -> Vec<u8> {
        let mut output = Vec::new();
        for token in tokens {
            match *token {
                Lz77Token::Literal(b) => output.push(b),
                Lz77Token::Match { length, distance } => {
                    for _ in 0..length {
                        output.push(output[output.len() - distance as usize]);
                    }
                }
            }
        }
        output
    }

    #[test]
    fn test_literals_only() {
        let tokens = tokenize_all(b"abcdefgh", 6);
        assert!(tokens.iter().all(|t| matches!(t, Lz77Token::Literal(_))));
        assert_eq!(tokens.len(), 8);
    }

    #[test]
    fn test_repeated_char() {
        let input = [b'a'; 100];
        let tokens = tokenize_all(&input, 6);
        assert_eq!(
            tokens,
            vec![
                Lz77Token::Literal(b'a'),
                Lz77Token::Match {
                    length: 99,
                    distance: 1
                }
            ]
        );
    }

    #[test]
    fn test_expand_matches_input() {
        let input = b"Hello, Hello, Hello! The quick brown fox, the quick brown dog.";
        for level in 1..=9 {
            let tokens = tokenize_all(input, level);
            assert_eq!(expand(&tokens), input, "level {level}");
        }
    }

    #[test]
    fn test_level_0_is_literal() {
        let tokens = tokenize_all(b"test data test data", 0);
        assert!(tokens.iter().all(|t| matches!(t, Lz77Token::Literal(_))));
    }

    #[test]
    fn test_matches_span_pushes() {
        let mut encoder = Lz77Encoder::new(LevelParams::for_level(6), 15, 15);
        let mut tokens = Vec::new();

        encoder.push(b"abcdefgh");
        encoder.tokenize(8, &mut tokens);
        encoder.push(b"abcdefgh");
        encoder.tokenize(8, &mut tokens);

        assert_eq!(
            tokens.last(),
            Some(&Lz77Token::Match {
                length: 8,
                distance: 8
            })
        );
        assert_eq!(expand(&tokens), b"abcdefghabcdefgh");
    }

    #[test]
    fn test_reset_forgets_history() {
        let mut encoder = Lz77Encoder::new(LevelParams::for_level(6), 15, 15);
        let mut tokens = Vec::new();

        encoder.push(b"abcdefgh");
        encoder.tokenize(8, &mut tokens);
        encoder.reset();
        tokens.clear();
        encoder.push(b"abcdefgh");
        encoder.tokenize(8, &mut tokens);

        assert!(tokens.iter().all(|t| matches!(t, Lz77Token::Literal(_))));
    }

    #[test]
    fn test_distance_limited_by_window() {
        // With a 512-byte window the repeat 600 bytes back is out of reach.
        let mut input: Vec<u8> = (0..600u32).map(|i| (i * 7 % 251) as u8).collect();
        input.extend_from_slice(&input[..50].to_vec());
        let mut encoder = Lz77Encoder::new(LevelParams::for_level(9), 9, 15);
        encoder.push(&input);
        let mut tokens = Vec::new();
        encoder.tokenize(input.len(), &mut tokens);

        for token in &tokens {
            if let Lz77Token::Match { distance, .. } = token {
                assert!(*distance as usize <= 512);
            }
        }
        assert_eq!(expand(&tokens), input);
    }

    #[test]
    fn test_long_input_slides() {
        let input: Vec<u8> = (0..200_000u32).map(|i| (i % 1000) as u8).collect();
        let mut encoder = Lz77Encoder::new(LevelParams::for_level(1), 15, 15);
        let mut tokens = Vec::new();
        for chunk in input.chunks(10_000) {
            encoder.push(chunk);
            encoder.tokenize(chunk.len(), &mut tokens);
        }
        assert_eq!(expand(&tokens), input);
        assert!(tokens.len() < input.len() / 10);
    }
}
