//! Resumable DEFLATE compression.
//!
//! [`DeflateStream`] accepts input in any number of calls and writes
//! compressed data into caller supplied output slices. Input is always taken
//! in full; compressed bytes that do not fit stay queued until the next call.
//!
//! Blocks are cut at [`MAX_STORED_BLOCK`] input bytes. With [`Flush::None`] a
//! block is emitted only once more than that is buffered, so small inputs are
//! held back until a flush.

use crate::block::{BlockEncoder, MAX_STORED_BLOCK, write_stored};
use crate::header::{Checksum, GzHeader, Wrapper, parse_window_bits, zlib_header};
use crate::lz77::{LevelParams, Lz77Encoder, Lz77Token};
use gzbuf_core::error::{CodecError, Result};
use gzbuf_core::{BitWriter, CompressionLevel, Flush, Status, Strategy};
use tracing::debug;

/// Smallest accepted memory level.
pub const MIN_MEM_LEVEL: i32 = 1;

/// Largest accepted memory level.
pub const MAX_MEM_LEVEL: i32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Nothing written yet; the gzip header may still be replaced.
    Init,
    Busy,
    /// [`Flush::Finish`] was requested but output ran out.
    Finishing,
    /// Trailer queued.
    Done,
}

/// A DEFLATE compression stream.
#[derive(Debug)]
pub struct DeflateStream {
    level: CompressionLevel,
    strategy: Strategy,
    wrapper: Wrapper,
    window_bits: u8,
    lz77: Lz77Encoder,
    blocks: BlockEncoder,
    writer: BitWriter,
    tokens: Vec<Lz77Token>,
    check: Checksum,
    header: GzHeader,
    phase: Phase,
    /// A flush marker ends the queued output and no input has arrived since.
    flushed: bool,
    total_in: u64,
    total_out: u64,
}

impl DeflateStream {
    /// Create a stream.
    ///
    /// - `level`: `-1` (default, 6) or `0..=9`
    /// - `window_bits`: `8..=15` zlib, `-15..=-8` raw, `24..=31` gzip
    /// - `mem_level`: `1..=9`; the hash table has `1 << (mem_level + 7)` slots
    pub fn new(level: i32, window_bits: i32, mem_level: i32, strategy: Strategy) -> Result<Self> {
        let level = CompressionLevel::try_from(level)?;
        if !(MIN_MEM_LEVEL..=MAX_MEM_LEVEL).contains(&mem_level) {
            return Err(CodecError::stream(format!("invalid memory level {mem_level}")));
        }
        let (wrapper, bits) = parse_window_bits(window_bits, false)?;

        let mut params = LevelParams::for_level(level.level());
        if strategy == Strategy::HuffmanOnly {
            params.max_chain = 0;
        }
        let hash_bits = mem_level as u32 + 7;

        debug!(
            level = level.level(),
            ?wrapper,
            window_bits = bits,
            mem_level,
            ?strategy,
            "deflate stream init"
        );

        Ok(Self {
            level,
            strategy,
            wrapper,
            window_bits: bits,
            lz77: Lz77Encoder::new(params, bits, hash_bits),
            blocks: BlockEncoder {
                store_only: level == CompressionLevel::NONE,
                allow_dynamic: strategy != Strategy::Fixed,
            },
            writer: BitWriter::new(),
            tokens: Vec::new(),
            check: Checksum::for_wrapper(wrapper),
            header: GzHeader::default(),
            phase: Phase::Init,
            flushed: false,
            total_in: 0,
            total_out: 0,
        })
    }

    /// Replace the gzip header. Only valid for gzip framing before the first
    /// call to [`deflate`](Self::deflate).
    pub fn set_header(&mut self, header: GzHeader) -> Result<()> {
        if self.wrapper != Wrapper::Gzip {
            return Err(CodecError::stream("header requires gzip framing"));
        }
        if self.phase != Phase::Init {
            return Err(CodecError::stream("header must be set before compressing"));
        }
        self.header = header;
        Ok(())
    }

    /// Compression level in effect.
    pub fn level(&self) -> CompressionLevel {
        self.level
    }

    /// Framing in effect.
    pub fn wrapper(&self) -> Wrapper {
        self.wrapper
    }

    /// Total uncompressed bytes accepted.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total compressed bytes written to output slices.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Compressed bytes queued but not yet handed out.
    pub fn pending_output(&self) -> usize {
        self.writer.pending()
    }

    /// Compress `input` into `output`.
    ///
    /// All of `input` is accepted. Returns [`Status::StreamEnd`] once the
    /// trailer has been fully written, [`Status::BufError`] when nothing could
    /// be done, and [`Status::Ok`] otherwise. A caller that asked for
    /// [`Flush::Finish`] must keep doing so until the stream ends.
    pub fn deflate(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Status> {
        match self.phase {
            Phase::Finishing if flush != Flush::Finish => {
                return Err(CodecError::stream("flush changed while finishing"));
            }
            Phase::Done if !input.is_empty() => {
                return Err(CodecError::stream("input after end of stream"));
            }
            Phase::Init => {
                self.write_header()?;
                self.phase = Phase::Busy;
            }
            _ => {}
        }
        if flush == Flush::Finish && self.phase == Phase::Busy {
            self.phase = Phase::Finishing;
        }

        if !input.is_empty() {
            self.check.update(input);
            self.lz77.push(input);
            self.total_in += input.len() as u64;
            self.flushed = false;
        }

        let mut written = 0;
        loop {
            written += self.writer.drain(&mut output[written..]);
            if self.writer.pending() > 0 || !self.encode_step(flush) {
                break;
            }
        }
        self.total_out += written as u64;

        if self.phase == Phase::Done && self.writer.pending() == 0 {
            Ok(Status::StreamEnd)
        } else if input.is_empty() && written == 0 {
            Ok(Status::BufError)
        } else {
            Ok(Status::Ok)
        }
    }

    /// Release the stream. Fails if compressed data was never finished or
    /// not fully collected.
    pub fn end(self) -> Result<()> {
        debug!(
            total_in = self.total_in,
            total_out = self.total_out,
            "deflate stream end"
        );
        match self.phase {
            Phase::Init => Ok(()),
            Phase::Done if self.writer.pending() == 0 => Ok(()),
            _ => Err(CodecError::data("stream ended before compression finished")),
        }
    }

    fn write_header(&mut self) -> Result<()> {
        match self.wrapper {
            Wrapper::Gzip => {
                let xfl = match self.level.level() {
                    9 => 2,
                    l if l < 2 || self.strategy == Strategy::HuffmanOnly => 4,
                    _ => 0,
                };
                let bytes = self.header.to_bytes(xfl)?;
                self.writer.write_bytes(&bytes);
            }
            Wrapper::Zlib => {
                let bytes = zlib_header(self.level.level(), self.window_bits);
                self.writer.write_bytes(&bytes);
            }
            Wrapper::Raw | Wrapper::Auto => {}
        }
        Ok(())
    }

    /// Queue more compressed output. Returns `false` when the flush mode
    /// asks for nothing more.
    fn encode_step(&mut self, flush: Flush) -> bool {
        if matches!(self.phase, Phase::Done) {
            return false;
        }
        let pending = self.lz77.pending();
        if pending > MAX_STORED_BLOCK {
            self.encode_block(MAX_STORED_BLOCK, false);
            return true;
        }

        match flush {
            Flush::None => false,
            Flush::Sync | Flush::Full => {
                if self.flushed {
                    return false;
                }
                if pending > 0 {
                    self.encode_block(pending, false);
                }
                write_stored(&mut self.writer, &[], false);
                if flush == Flush::Full {
                    self.lz77.reset();
                }
                self.flushed = true;
                true
            }
            Flush::Finish => {
                self.encode_block(pending, true);
                self.write_trailer();
                self.phase = Phase::Done;
                true
            }
        }
    }

    fn encode_block(&mut self, len: usize, is_final: bool) {
        self.tokens.clear();
        self.lz77.tokenize(len, &mut self.tokens);
        let raw = self.lz77.recent(len);
        self.blocks
            .write_block(&mut self.writer, &self.tokens, raw, is_final);
    }

    fn write_trailer(&mut self) {
        self.writer.align_to_byte();
        match self.wrapper {
            Wrapper::Gzip => {
                self.writer.write_bytes(&self.check.value().to_le_bytes());
                self.writer
                    .write_bytes(&(self.total_in as u32).to_le_bytes());
            }
            Wrapper::Zlib => {
                self.writer.write_bytes(&self.check.value().to_be_bytes());
            }
            Wrapper::Raw | Wrapper::Auto => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inflate::InflateStream;
    use gzbuf_core::ErrorCode;

    fn compress(data: &[u8], level: i32, window_bits: i32) -> Vec<u8> {
        let mut stream = DeflateStream::new(level, window_bits, 8, Strategy::Default).unwrap();
        let mut out = vec![0u8; crate::compress_bound(data.len()) + 32];
        let status = stream.deflate(data, &mut out, Flush::Finish).unwrap();
        assert_eq!(status, Status::StreamEnd);
        out.truncate(stream.total_out() as usize);
        stream.end().unwrap();
        out
    }

    fn decompress(data: &[u8], window_bits: i32, size: usize) -> Vec<u8> {
        let mut stream = InflateStream::new(window_bits).unwrap();
        let mut out = vec![0u8; size];
        let status = stream.inflate(data, &mut out, Flush::Finish).unwrap();
        assert_eq!(status, Status::StreamEnd);
        out.truncate(stream.total_out() as usize);
        out
    }

    #[test]
    fn test_raw_empty() {
        assert_eq!(compress(b"", 6, -15), [0x03, 0x00]);
    }

    #[test]
    fn test_gzip_header_bytes() {
        let out = compress(b"", 9, 31);
        assert_eq!(&out[..4], &[0x1F, 0x8B, 0x08, 0x00]);
        assert_eq!(out[8], 2);
        assert_eq!(out[9], 255);
        // Empty block, CRC-32 of nothing, zero length.
        assert_eq!(&out[10..], &[0x03, 0x00, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_zlib_header_bytes() {
        let out = compress(b"abc", 6, 15);
        assert_eq!(&out[..2], &[0x78, 0x9C]);
        assert_eq!(&out[out.len() - 4..], &0x024D_0127u32.to_be_bytes());
    }

    #[test]
    fn test_all_levels_round_trip() {
        let data: Vec<u8> = b"The quick brown fox jumps over the lazy dog. "
            .iter()
            .cycle()
            .take(20_000)
            .copied()
            .collect();
        for level in -1..=9 {
            for window_bits in [-15, 15, 31] {
                let packed = compress(&data, level, window_bits);
                assert!(packed.len() <= crate::compress_bound(data.len()) + 18);
                assert_eq!(decompress(&packed, window_bits, data.len()), data);
            }
        }
    }

    #[test]
    fn test_small_window() {
        let data: Vec<u8> = (0..5000u32).map(|i| (i % 300) as u8).collect();
        let packed = compress(&data, 9, 9);
        assert_eq!(decompress(&packed, 9, data.len()), data);
    }

    #[test]
    fn test_invalid_parameters() {
        let err = DeflateStream::new(10, 31, 8, Strategy::Default).unwrap_err();
        assert_eq!(err.code, ErrorCode::StreamError);
        assert!(DeflateStream::new(-2, 31, 8, Strategy::Default).is_err());
        assert!(DeflateStream::new(6, 31, 0, Strategy::Default).is_err());
        assert!(DeflateStream::new(6, 31, 10, Strategy::Default).is_err());
        assert!(DeflateStream::new(6, 7, 8, Strategy::Default).is_err());
        assert!(DeflateStream::new(6, 47, 8, Strategy::Default).is_err());
    }

    #[test]
    fn test_set_header() {
        let mut stream = DeflateStream::new(6, 31, 8, Strategy::Default).unwrap();
        stream.set_header(GzHeader::with_name("a.txt")).unwrap();
        let mut out = vec![0u8; 128];
        stream.deflate(b"hi", &mut out, Flush::Finish).unwrap();
        assert_eq!(out[3], 0x08);
        assert_eq!(&out[10..16], b"a.txt\0");
        assert!(stream.set_header(GzHeader::default()).is_err());

        let mut zlib = DeflateStream::new(6, 15, 8, Strategy::Default).unwrap();
        assert!(zlib.set_header(GzHeader::default()).is_err());
    }

    #[test]
    fn test_small_output_slices() {
        let data: Vec<u8> = (0..100_000u32).map(|i| (i * 31 % 97) as u8).collect();
        let mut stream = DeflateStream::new(6, 31, 8, Strategy::Default).unwrap();
        let mut packed = Vec::new();
        let mut chunk = [0u8; 7];
        let mut input: &[u8] = &data;
        loop {
            let status = stream.deflate(input, &mut chunk, Flush::Finish).unwrap();
            input = &[];
            let n = stream.total_out() as usize - packed.len();
            packed.extend_from_slice(&chunk[..n]);
            if status == Status::StreamEnd {
                break;
            }
        }
        stream.end().unwrap();
        assert_eq!(decompress(&packed, 31, data.len()), data);
    }

    #[test]
    fn test_sync_flush_emits_marker() {
        let mut stream = DeflateStream::new(6, -15, 8, Strategy::Default).unwrap();
        let mut out = vec![0u8; 256];
        stream.deflate(b"hello", &mut out, Flush::Sync).unwrap();
        let n = stream.total_out() as usize;
        assert_eq!(&out[n - 4..n], &[0x00, 0x00, 0xFF, 0xFF]);

        // Nothing new to flush.
        let status = stream.deflate(&[], &mut out, Flush::Sync).unwrap();
        assert_eq!(status, Status::BufError);

        let mut inflater = InflateStream::new(-15).unwrap();
        let mut plain = [0u8; 16];
        inflater.inflate(&out[..n], &mut plain, Flush::None).unwrap();
        assert_eq!(&plain[..inflater.total_out() as usize], b"hello");
    }

    #[test]
    fn test_full_flush_resets_history() {
        let mut stream = DeflateStream::new(6, -15, 8, Strategy::Default).unwrap();
        let mut out = vec![0u8; 1024];
        stream.deflate(b"abcdefghij", &mut out, Flush::Full).unwrap();
        let used = stream.total_out() as usize;
        stream
            .deflate(b"abcdefghij", &mut out[used..], Flush::Finish)
            .unwrap();
        let n = stream.total_out() as usize;
        assert_eq!(decompress(&out[..n], -15, 64), b"abcdefghijabcdefghij");
    }

    #[test]
    fn test_finish_cannot_be_abandoned() {
        let data = vec![7u8; 1000];
        let mut stream = DeflateStream::new(0, 31, 8, Strategy::Default).unwrap();
        let mut out = [0u8; 4];
        stream.deflate(&data, &mut out, Flush::Finish).unwrap();
        let err = stream.deflate(&[], &mut out, Flush::None).unwrap_err();
        assert_eq!(err.code, ErrorCode::StreamError);
    }

    #[test]
    fn test_end_before_finish_is_data_error() {
        let mut stream = DeflateStream::new(6, 31, 8, Strategy::Default).unwrap();
        let mut out = [0u8; 64];
        stream.deflate(b"partial", &mut out, Flush::None).unwrap();
        let err = stream.end().unwrap_err();
        assert_eq!(err.code, ErrorCode::DataError);
    }

    #[test]
    fn test_strategies_round_trip() {
        let data = b"strategy strategy strategy strategy".repeat(50);
        for strategy in [Strategy::Default, Strategy::HuffmanOnly, Strategy::Fixed] {
            let mut stream = DeflateStream::new(6, 31, 8, strategy).unwrap();
            let mut out = vec![0u8; data.len() + 64];
            assert_eq!(
                stream.deflate(&data, &mut out, Flush::Finish).unwrap(),
                Status::StreamEnd
            );
            out.truncate(stream.total_out() as usize);
            assert_eq!(decompress(&out, 31, data.len()), data);
        }
    }
}
