//! Resumable DEFLATE decompression.
//!
//! [`InflateStream`] decodes raw, zlib or gzip framed data from caller
//! supplied input slices into caller supplied output slices. Either side may
//! run out at any point: the stream remembers where it stopped (mid-header,
//! mid-block, even in the middle of a back-reference copy) and continues on
//! the next call.
//!
//! Progress is reported through [`total_in`](InflateStream::total_in) and
//! [`total_out`](InflateStream::total_out); the return value says whether
//! the stream ended, progressed, or could not move.

use crate::header::{Checksum, GzHeader, HeaderParser, Wrapper, parse_window_bits};
use crate::huffman::{CodeSet, END_OF_BLOCK, HuffmanTree};
use crate::tables::{
    CODE_LENGTH_ORDER, DISTANCE_BASE, DISTANCE_EXTRA_BITS, LENGTH_BASE, LENGTH_EXTRA_BITS,
    fixed_trees,
};
use gzbuf_core::error::{CodecError, Result};
use gzbuf_core::{BitReader, BitState, Flush, Status, Window};
use tracing::debug;

/// Bits in a length code, its extra bits, a distance code and its extra bits.
const MAX_SYMBOL_BITS: u8 = 15 + 5 + 15 + 13;

/// Bits in a code length code plus the longest repeat count.
const MAX_CODELEN_SYMBOL_BITS: u8 = 7 + 7;

/// Where decoding stands.
#[derive(Debug)]
enum Phase {
    /// Reading the zlib/gzip header.
    Header,
    /// Reading the three-bit block header.
    BlockHeader,
    /// Reading LEN/NLEN of a stored block.
    StoredHeader,
    /// Copying stored bytes.
    Stored { remaining: usize },
    /// Reading the code trees of a dynamic block.
    DynamicHeader(Box<DynamicHeader>),
    /// Decoding Huffman coded data.
    Codes,
    /// Reading the check value after the last block.
    Trailer,
    /// Stream complete.
    Done,
}

#[derive(Debug, Default)]
enum DynamicStage {
    #[default]
    Counts,
    CodeLengths {
        read: usize,
    },
    Lengths {
        tree: HuffmanTree,
    },
}

/// Partly read dynamic block header.
#[derive(Debug, Default)]
struct DynamicHeader {
    stage: DynamicStage,
    hlit: usize,
    hdist: usize,
    hclen: usize,
    codelen_lengths: [u8; 19],
    lengths: Vec<u8>,
}

#[derive(Debug)]
enum Tables {
    Fixed,
    Dynamic(Box<(HuffmanTree, HuffmanTree)>),
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Progress {
    NeedInput,
    NeedOutput,
    Finished,
}

/// Output slice plus write position and checksum mark.
struct Sink<'a> {
    buf: &'a mut [u8],
    pos: usize,
    /// Bytes before this index are already in the running checksum.
    checked: usize,
}

impl Sink<'_> {
    fn space(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn push(&mut self, byte: u8) {
        self.buf[self.pos] = byte;
        self.pos += 1;
    }

    fn extend(&mut self, bytes: &[u8]) {
        self.buf[self.pos..self.pos + bytes.len()].copy_from_slice(bytes);
        self.pos += bytes.len();
    }
}

/// A DEFLATE decompression stream.
#[derive(Debug)]
pub struct InflateStream {
    parser: Option<HeaderParser>,
    phase: Phase,
    bits: BitState,
    window: Window,
    tables: Tables,
    /// Back-reference still being copied: (length left, distance).
    pending: Option<(usize, usize)>,
    last_block: bool,
    check: Checksum,
    trailer: [u8; 8],
    trailer_len: usize,
    total_in: u64,
    total_out: u64,
    /// First error seen; the stream refuses further work after it.
    error: Option<CodecError>,
}

impl InflateStream {
    /// Create a stream.
    ///
    /// `window_bits` selects the framing: `8..=15` zlib, `-15..=-8` raw,
    /// `24..=31` gzip, `40..=47` zlib or gzip by auto-detection.
    pub fn new(window_bits: i32) -> Result<Self> {
        let (wrapper, bits) = parse_window_bits(window_bits, true)?;
        debug!(?wrapper, window_bits = bits, "inflate stream init");

        let (parser, phase) = match wrapper {
            Wrapper::Raw => (None, Phase::BlockHeader),
            _ => (Some(HeaderParser::new(wrapper, bits)), Phase::Header),
        };

        Ok(Self {
            parser,
            phase,
            bits: BitState::default(),
            window: Window::new(1 << bits),
            tables: Tables::Fixed,
            pending: None,
            last_block: false,
            check: Checksum::None,
            trailer: [0; 8],
            trailer_len: 0,
            total_in: 0,
            total_out: 0,
            error: None,
        })
    }

    /// Total compressed bytes consumed.
    pub fn total_in(&self) -> u64 {
        self.total_in
    }

    /// Total uncompressed bytes produced.
    pub fn total_out(&self) -> u64 {
        self.total_out
    }

    /// Whether the end of the stream has been reached.
    pub fn is_finished(&self) -> bool {
        matches!(self.phase, Phase::Done)
    }

    /// The gzip header, once it has been read completely.
    pub fn header(&self) -> Option<&GzHeader> {
        self.parser
            .as_ref()
            .filter(|p| p.is_done() && p.wrapper() == Wrapper::Gzip)
            .map(HeaderParser::header)
    }

    /// Decompress from `input` into `output`.
    ///
    /// Returns [`Status::StreamEnd`] once the trailer has been verified,
    /// [`Status::Ok`] after progress, and [`Status::BufError`] when nothing
    /// could be done or when `flush` is [`Flush::Finish`] and the stream is not
    /// complete. Corrupt data is reported as a data error, after which the
    /// stream stays failed.
    pub fn inflate(&mut self, input: &[u8], output: &mut [u8], flush: Flush) -> Result<Status> {
        if let Some(err) = &self.error {
            return Err(err.clone());
        }
        if self.is_finished() {
            return Ok(Status::StreamEnd);
        }

        let mut reader = BitReader::resume(input, self.bits);
        let mut sink = Sink {
            buf: output,
            pos: 0,
            checked: 0,
        };

        let result = self.run(&mut reader, &mut sink);
        self.update_check(&mut sink);
        if result == Ok(Progress::Finished) {
            reader.give_back();
        }

        self.bits = reader.suspend();
        let consumed = reader.consumed();
        let produced = sink.pos;
        self.total_in += consumed as u64;
        self.total_out += produced as u64;

        match result {
            Err(err) => {
                debug!(error = %err, total_in = self.total_in, "inflate failed");
                self.error = Some(err.clone());
                Err(err)
            }
            Ok(Progress::Finished) => Ok(Status::StreamEnd),
            Ok(_) if flush == Flush::Finish => Ok(Status::BufError),
            Ok(_) if consumed == 0 && produced == 0 => Ok(Status::BufError),
            Ok(_) => Ok(Status::Ok),
        }
    }

    /// Release the stream.
    pub fn end(self) -> Result<()> {
        debug!(
            total_in = self.total_in,
            total_out = self.total_out,
            finished = self.is_finished(),
            "inflate stream end"
        );
        Ok(())
    }

    fn update_check(&mut self, sink: &mut Sink<'_>) {
        self.check.update(&sink.buf[sink.checked..sink.pos]);
        sink.checked = sink.pos;
    }

    fn run(&mut self, reader: &mut BitReader<'_>, sink: &mut Sink<'_>) -> Result<Progress> {
        loop {
            match self.phase {
                Phase::Header => {
                    let Some(parser) = self.parser.as_mut() else {
                        self.phase = Phase::BlockHeader;
                        continue;
                    };
                    while !parser.is_done() {
                        let Some(byte) = reader.read_byte() else {
                            return Ok(Progress::NeedInput);
                        };
                        parser.feed(byte)?;
                    }
                    self.check = Checksum::for_wrapper(parser.wrapper());
                    self.phase = Phase::BlockHeader;
                }
                Phase::BlockHeader => {
                    let Some(header) = reader.read_bits(3) else {
                        return Ok(Progress::NeedInput);
                    };
                    self.last_block = header & 1 != 0;
                    self.phase = match header >> 1 {
                        0 => {
                            reader.align_to_byte();
                            Phase::StoredHeader
                        }
                        1 => {
                            self.tables = Tables::Fixed;
                            Phase::Codes
                        }
                        2 => Phase::DynamicHeader(Box::default()),
                        _ => return Err(CodecError::data("invalid block type")),
                    };
                }
                Phase::StoredHeader => {
                    let Some(lens) = reader.read_bits(32) else {
                        return Ok(Progress::NeedInput);
                    };
                    let len = lens & 0xFFFF;
                    if len != !(lens >> 16) & 0xFFFF {
                        return Err(CodecError::data("invalid stored block lengths"));
                    }
                    self.phase = Phase::Stored {
                        remaining: len as usize,
                    };
                }
                Phase::Stored { remaining } => {
                    let left = self.copy_stored(reader, sink, remaining);
                    if left > 0 {
                        self.phase = Phase::Stored { remaining: left };
                        return Ok(if sink.space() == 0 {
                            Progress::NeedOutput
                        } else {
                            Progress::NeedInput
                        });
                    }
                    self.end_block(reader);
                }
                Phase::DynamicHeader(ref mut header) => match read_dynamic_header(header, reader)? {
                    Some(trees) => {
                        self.tables = Tables::Dynamic(Box::new(trees));
                        self.phase = Phase::Codes;
                    }
                    None => return Ok(Progress::NeedInput),
                },
                Phase::Codes => {
                    if let Some(progress) = self.decode_codes(reader, sink)? {
                        return Ok(progress);
                    }
                    self.end_block(reader);
                }
                Phase::Trailer => {
                    let need = match self.check {
                        Checksum::Crc32(_) => 8,
                        _ => 4,
                    };
                    while self.trailer_len < need {
                        let Some(byte) = reader.read_byte() else {
                            return Ok(Progress::NeedInput);
                        };
                        self.trailer[self.trailer_len] = byte;
                        self.trailer_len += 1;
                    }
                    self.update_check(sink);
                    self.verify_trailer(self.total_out + sink.pos as u64)?;
                    self.phase = Phase::Done;
                }
                Phase::Done => return Ok(Progress::Finished),
            }
        }
    }

    /// Copy up to `remaining` stored bytes. Returns how many are still left.
    fn copy_stored(
        &mut self,
        reader: &mut BitReader<'_>,
        sink: &mut Sink<'_>,
        mut remaining: usize,
    ) -> usize {
        // Whole bytes may still sit in the bit buffer.
        while remaining > 0 && sink.space() > 0 && reader.available() >= 8 {
            if let Some(byte) = reader.read_byte() {
                sink.push(byte);
                self.window.push(byte);
                remaining -= 1;
            }
        }
        if reader.available() == 0 {
            let chunk = reader.take_bytes(remaining.min(sink.space()));
            sink.extend(chunk);
            self.window.extend(chunk);
            remaining -= chunk.len();
        }
        remaining
    }

    fn end_block(&mut self, reader: &mut BitReader<'_>) {
        self.phase = if !self.last_block {
            Phase::BlockHeader
        } else if self.parser.is_some() {
            reader.align_to_byte();
            Phase::Trailer
        } else {
            Phase::Done
        };
    }

    fn verify_trailer(&self, total_out: u64) -> Result<()> {
        let t = self.trailer;
        match self.check {
            Checksum::Crc32(_) => {
                if u32::from_le_bytes([t[0], t[1], t[2], t[3]]) != self.check.value() {
                    return Err(CodecError::data("incorrect data check"));
                }
                if u32::from_le_bytes([t[4], t[5], t[6], t[7]]) != total_out as u32 {
                    return Err(CodecError::data("incorrect length check"));
                }
            }
            Checksum::Adler32(_) => {
                if u32::from_be_bytes([t[0], t[1], t[2], t[3]]) != self.check.value() {
                    return Err(CodecError::data("incorrect data check"));
                }
            }
            Checksum::None => {}
        }
        Ok(())
    }

    /// Decode symbols until end-of-block (`None`) or until input or output
    /// runs out.
    fn decode_codes(
        &mut self,
        reader: &mut BitReader<'_>,
        sink: &mut Sink<'_>,
    ) -> Result<Option<Progress>> {
        let (litlen, dist) = match &self.tables {
            Tables::Fixed => {
                let trees = fixed_trees();
                (&trees.0, &trees.1)
            }
            Tables::Dynamic(trees) => (&trees.0, &trees.1),
        };

        loop {
            if let Some((length, distance)) = self.pending {
                let n = length.min(sink.space());
                for _ in 0..n {
                    let byte = self
                        .window
                        .byte_at(distance)
                        .ok_or_else(|| CodecError::data("invalid distance too far back"))?;
                    sink.push(byte);
                    self.window.push(byte);
                }
                if n < length {
                    self.pending = Some((length - n, distance));
                    return Ok(Some(Progress::NeedOutput));
                }
                self.pending = None;
            }

            // Buffer enough for the longest symbol with its distance, so a
            // rewind never hands input bytes back.
            reader.fill(MAX_SYMBOL_BITS);
            let checkpoint = reader.checkpoint();
            let Some(symbol) = litlen.decode(reader)? else {
                return Ok(Some(Progress::NeedInput));
            };

            match symbol {
                0..=255 => {
                    if sink.space() == 0 {
                        reader.rewind(checkpoint);
                        return Ok(Some(Progress::NeedOutput));
                    }
                    sink.push(symbol as u8);
                    self.window.push(symbol as u8);
                }
                END_OF_BLOCK => return Ok(None),
                257..=285 => {
                    let index = (symbol - 257) as usize;
                    let Some(extra) = reader.read_bits(LENGTH_EXTRA_BITS[index]) else {
                        reader.rewind(checkpoint);
                        return Ok(Some(Progress::NeedInput));
                    };
                    let length = LENGTH_BASE[index] as usize + extra as usize;

                    let Some(dsym) = dist.decode(reader)? else {
                        reader.rewind(checkpoint);
                        return Ok(Some(Progress::NeedInput));
                    };
                    let dsym = dsym as usize;
                    if dsym >= DISTANCE_BASE.len() {
                        return Err(CodecError::data("invalid distance code"));
                    }
                    let Some(extra) = reader.read_bits(DISTANCE_EXTRA_BITS[dsym]) else {
                        reader.rewind(checkpoint);
                        return Ok(Some(Progress::NeedInput));
                    };
                    let distance = DISTANCE_BASE[dsym] as usize + extra as usize;
                    if distance > self.window.len() {
                        return Err(CodecError::data("invalid distance too far back"));
                    }
                    self.pending = Some((length, distance));
                }
                _ => return Err(CodecError::data("invalid literal/length code")),
            }
        }
    }
}

/// Continue reading a dynamic block header. Returns the literal/length and
/// distance trees once complete, or `None` if more input is needed.
fn read_dynamic_header(
    header: &mut DynamicHeader,
    reader: &mut BitReader<'_>,
) -> Result<Option<(HuffmanTree, HuffmanTree)>> {
    if let DynamicStage::Counts = header.stage {
        let Some(counts) = reader.read_bits(14) else {
            return Ok(None);
        };
        header.hlit = (counts & 0x1F) as usize + 257;
        header.hdist = ((counts >> 5) & 0x1F) as usize + 1;
        header.hclen = (counts >> 10) as usize + 4;
        if header.hlit > 286 || header.hdist > 30 {
            return Err(CodecError::data("too many length or distance symbols"));
        }
        header.stage = DynamicStage::CodeLengths { read: 0 };
    }

    if let DynamicStage::CodeLengths { mut read } = header.stage {
        while read < header.hclen {
            let Some(len) = reader.read_bits(3) else {
                header.stage = DynamicStage::CodeLengths { read };
                return Ok(None);
            };
            header.codelen_lengths[CODE_LENGTH_ORDER[read]] = len as u8;
            read += 1;
        }
        let tree = HuffmanTree::from_code_lengths(&header.codelen_lengths, CodeSet::CodeLengths)?;
        header.lengths = Vec::with_capacity(header.hlit + header.hdist);
        header.stage = DynamicStage::Lengths { tree };
    }

    let DynamicStage::Lengths { tree } = &header.stage else {
        return Ok(None);
    };
    let total = header.hlit + header.hdist;
    while header.lengths.len() < total {
        reader.fill(MAX_CODELEN_SYMBOL_BITS);
        let checkpoint = reader.checkpoint();
        let Some(symbol) = tree.decode(reader)? else {
            return Ok(None);
        };
        let (extra_bits, base) = match symbol {
            0..=15 => {
                header.lengths.push(symbol as u8);
                continue;
            }
            16 => (2, 3),
            17 => (3, 3),
            _ => (7, 11),
        };
        let Some(extra) = reader.read_bits(extra_bits) else {
            reader.rewind(checkpoint);
            return Ok(None);
        };
        let value = if symbol == 16 {
            *header
                .lengths
                .last()
                .ok_or_else(|| CodecError::data("invalid bit length repeat"))?
        } else {
            0
        };
        let repeat = base + extra as usize;
        if header.lengths.len() + repeat > total {
            return Err(CodecError::data("invalid bit length repeat"));
        }
        let filled = header.lengths.len() + repeat;
        header.lengths.resize(filled, value);
    }

    let (litlen, dist) = header.lengths.split_at(header.hlit);
    if litlen[END_OF_BLOCK as usize] == 0 {
        return Err(CodecError::data("invalid code -- missing end-of-block"));
    }
    Ok(Some((
        HuffmanTree::from_code_lengths(litlen, CodeSet::Literals)?,
        HuffmanTree::from_code_lengths(dist, CodeSet::Distances)?,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::block::write_stored;
    use gzbuf_core::{BitWriter, ErrorCode};

    /// Inflate raw data in one call with plenty of output space.
    fn inflate_raw(data: &[u8]) -> Result<Vec<u8>> {
        let mut stream = InflateStream::new(-15)?;
        let mut out = vec![0u8; 1 << 16];
        match stream.inflate(data, &mut out, Flush::Finish)? {
            Status::StreamEnd => {
                out.truncate(stream.total_out() as usize);
                Ok(out)
            }
            status => Err(CodecError::stream(format!("unexpected {status:?}"))),
        }
    }

    #[test]
    fn test_stored_block() {
        let mut writer = BitWriter::new();
        write_stored(&mut writer, b"Hello", true);
        let data = writer.take_all();
        assert_eq!(inflate_raw(&data).unwrap(), b"Hello");
    }

    #[test]
    fn test_fixed_block() {
        // "a" then end-of-block with the fixed code; from zlib output of "a".
        let data = [0x4B, 0x04, 0x00];
        assert_eq!(inflate_raw(&data).unwrap(), b"a");
    }

    #[test]
    fn test_fixed_block_with_match() {
        // "abc" then <length 6, distance 3>.
        let (litlen, dist) = crate::tables::fixed_codes();
        let mut writer = BitWriter::new();
        writer.write_bits(0b011, 3);
        for &b in b"abc" {
            writer.write_bits(litlen[b as usize] as u32, 8);
        }
        writer.write_bits(litlen[260] as u32, 7);
        writer.write_bits(dist[2] as u32, 5);
        writer.write_bits(litlen[256] as u32, 7);
        writer.align_to_byte();
        assert_eq!(inflate_raw(&writer.take_all()).unwrap(), b"abcabcabc");
    }

    #[test]
    fn test_invalid_block_type() {
        let err = inflate_raw(&[0x07]).unwrap_err();
        assert_eq!(err.code, ErrorCode::DataError);
        assert_eq!(err.message, "invalid block type");
    }

    #[test]
    fn test_invalid_stored_lengths() {
        let err = inflate_raw(&[0x01, 0x05, 0x00, 0x00, 0x00]).unwrap_err();
        assert_eq!(err.message, "invalid stored block lengths");
    }

    #[test]
    fn test_distance_too_far_back() {
        // Fixed block whose first symbol is a match.
        let mut writer = BitWriter::new();
        writer.write_bits(1, 1);
        writer.write_bits(1, 2);
        let (litlen, dist) = crate::tables::fixed_codes();
        writer.write_bits(litlen[257] as u32, 7);
        writer.write_bits(dist[0] as u32, 5);
        writer.align_to_byte();
        let err = inflate_raw(&writer.take_all()).unwrap_err();
        assert_eq!(err.message, "invalid distance too far back");
    }

    #[test]
    fn test_error_is_sticky() {
        let mut stream = InflateStream::new(-15).unwrap();
        let mut out = [0u8; 16];
        assert!(stream.inflate(&[0x07], &mut out, Flush::None).is_err());
        let err = stream.inflate(&[0x03, 0x00], &mut out, Flush::None).unwrap_err();
        assert_eq!(err.message, "invalid block type");
    }

    #[test]
    fn test_byte_at_a_time_input_and_output() {
        let mut writer = BitWriter::new();
        write_stored(&mut writer, b"xyz", false);
        writer.write_bits(1, 1);
        writer.write_bits(1, 2);
        let (litlen, dist) = crate::tables::fixed_codes();
        // <length 4, distance 3> then end-of-block.
        writer.write_bits(litlen[258] as u32, 7);
        writer.write_bits(dist[2] as u32, 5);
        writer.write_bits(litlen[256] as u32, 7);
        writer.align_to_byte();
        let data = writer.take_all();

        let mut stream = InflateStream::new(-15).unwrap();
        let mut result = Vec::new();
        let mut fed = 0;
        loop {
            let mut byte = [0u8; 1];
            let end = (fed + 1).min(data.len());
            let before_in = stream.total_in();
            let status = stream.inflate(&data[fed..end], &mut byte, Flush::None).unwrap();
            fed += (stream.total_in() - before_in) as usize;
            if stream.total_out() as usize > result.len() {
                result.push(byte[0]);
            }
            if status == Status::StreamEnd {
                break;
            }
            if status == Status::BufError && fed == data.len() {
                panic!("stalled");
            }
        }
        assert_eq!(result, b"xyzxyzx");
        assert_eq!(stream.total_in() as usize, data.len());
    }

    #[test]
    fn test_buf_error_without_progress() {
        let mut stream = InflateStream::new(31).unwrap();
        let mut out = [0u8; 4];
        assert_eq!(stream.inflate(&[], &mut out, Flush::None).unwrap(), Status::BufError);
        assert_eq!(
            stream.inflate(&[0x1F], &mut out, Flush::Finish).unwrap(),
            Status::BufError
        );
        assert_eq!(stream.total_in(), 1);
    }
}
