//! Stream wrappers: gzip (RFC 1952) and zlib (RFC 1950) headers, and the
//! window-bits convention that selects between them.
//!
//! ```text
//! gzip:  |ID1|ID2|CM|FLG|  MTIME  |XFL|OS| [extra] [name] [comment] [hcrc] ... |CRC32|ISIZE|
//! zlib:  |CMF|FLG| ... |ADLER32|
//! ```
//!
//! Headers are parsed one byte at a time by [`HeaderParser`] so that the
//! inflater can resume when its input is split at any point.

use gzbuf_core::checksum::{Adler32, Crc32};
use gzbuf_core::error::{CodecError, Result};

/// gzip magic bytes.
pub const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];

/// Compression method: DEFLATE.
pub const CM_DEFLATE: u8 = 8;

/// gzip header flags.
pub mod flags {
    /// Probably text.
    pub const FTEXT: u8 = 0x01;
    /// Header CRC present.
    pub const FHCRC: u8 = 0x02;
    /// Extra field present.
    pub const FEXTRA: u8 = 0x04;
    /// Original file name present.
    pub const FNAME: u8 = 0x08;
    /// Comment present.
    pub const FCOMMENT: u8 = 0x10;
    /// Bits that must be zero.
    pub const RESERVED: u8 = 0xE0;
}

/// OS byte meaning "unknown".
pub const OS_UNKNOWN: u8 = 255;

/// Framing around the DEFLATE data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wrapper {
    /// Bare DEFLATE data.
    Raw,
    /// zlib header and Adler-32 trailer.
    Zlib,
    /// gzip header and CRC-32/ISIZE trailer.
    Gzip,
    /// zlib or gzip, decided by the first bytes (inflate only).
    Auto,
}

/// Split a window-bits value into its wrapper and window size.
///
/// - `8..=15`: zlib
/// - `-15..=-8`: raw
/// - `24..=31` (`16 + 8..=15`): gzip
/// - `40..=47` (`32 + 8..=15`): auto-detect, inflate only
pub fn parse_window_bits(window_bits: i32, allow_auto: bool) -> Result<(Wrapper, u8)> {
    let (wrapper, bits) = match window_bits {
        -15..=-8 => (Wrapper::Raw, -window_bits),
        8..=15 => (Wrapper::Zlib, window_bits),
        24..=31 => (Wrapper::Gzip, window_bits - 16),
        40..=47 if allow_auto => (Wrapper::Auto, window_bits - 32),
        _ => {
            return Err(CodecError::stream(format!(
                "invalid window bits {window_bits}"
            )));
        }
    };
    Ok((wrapper, bits as u8))
}

/// Running checksum of uncompressed data for the trailer.
#[derive(Debug, Clone)]
pub enum Checksum {
    /// Raw streams carry no check value.
    None,
    /// gzip.
    Crc32(Crc32),
    /// zlib.
    Adler32(Adler32),
}

impl Checksum {
    /// Checksum used by `wrapper`.
    pub fn for_wrapper(wrapper: Wrapper) -> Self {
        match wrapper {
            Wrapper::Gzip => Self::Crc32(Crc32::new()),
            Wrapper::Zlib => Self::Adler32(Adler32::new()),
            Wrapper::Raw | Wrapper::Auto => Self::None,
        }
    }

    /// Add uncompressed bytes.
    pub fn update(&mut self, data: &[u8]) {
        match self {
            Self::None => {}
            Self::Crc32(crc) => crc.update(data),
            Self::Adler32(adler) => adler.update(data),
        }
    }

    /// Current value.
    pub fn value(&self) -> u32 {
        match self {
            Self::None => 0,
            Self::Crc32(crc) => crc.value(),
            Self::Adler32(adler) => adler.value(),
        }
    }
}

/// gzip header fields.
///
/// Byte strings are kept raw; gzip does not define an encoding for names or
/// comments (ISO 8859-1 by convention).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzHeader {
    /// FTEXT flag.
    pub text: bool,
    /// Modification time (Unix seconds, 0 = unknown).
    pub mtime: u32,
    /// Extra flags. Ignored when writing; the deflater derives it from the level.
    pub xfl: u8,
    /// Operating system.
    pub os: u8,
    /// Extra field payload.
    pub extra: Option<Vec<u8>>,
    /// Original file name, without the terminating zero.
    pub name: Option<Vec<u8>>,
    /// Comment, without the terminating zero.
    pub comment: Option<Vec<u8>>,
    /// Whether a header CRC is present.
    pub hcrc: bool,
}

impl Default for GzHeader {
    fn default() -> Self {
        Self {
            text: false,
            mtime: 0,
            xfl: 0,
            os: OS_UNKNOWN,
            extra: None,
            name: None,
            comment: None,
            hcrc: false,
        }
    }
}

impl GzHeader {
    /// Header with a file name.
    pub fn with_name(name: impl Into<Vec<u8>>) -> Self {
        Self {
            name: Some(name.into()),
            ..Self::default()
        }
    }

    fn flag_byte(&self) -> u8 {
        let mut flg = 0;
        if self.text {
            flg |= flags::FTEXT;
        }
        if self.hcrc {
            flg |= flags::FHCRC;
        }
        if self.extra.is_some() {
            flg |= flags::FEXTRA;
        }
        if self.name.is_some() {
            flg |= flags::FNAME;
        }
        if self.comment.is_some() {
            flg |= flags::FCOMMENT;
        }
        flg
    }

    /// Serialize the header with the given XFL byte.
    pub fn to_bytes(&self, xfl: u8) -> Result<Vec<u8>> {
        let mut out = Vec::with_capacity(10);
        out.extend_from_slice(&GZIP_MAGIC);
        out.push(CM_DEFLATE);
        out.push(self.flag_byte());
        out.extend_from_slice(&self.mtime.to_le_bytes());
        out.push(xfl);
        out.push(self.os);

        if let Some(extra) = &self.extra {
            let xlen = u16::try_from(extra.len())
                .map_err(|_| CodecError::stream("gzip extra field longer than 65535 bytes"))?;
            out.extend_from_slice(&xlen.to_le_bytes());
            out.extend_from_slice(extra);
        }
        for field in [&self.name, &self.comment].into_iter().flatten() {
            if field.contains(&0) {
                return Err(CodecError::stream("gzip header string contains a zero byte"));
            }
            out.extend_from_slice(field);
            out.push(0);
        }
        if self.hcrc {
            let crc = Crc32::compute(&out) as u16;
            out.extend_from_slice(&crc.to_le_bytes());
        }

        Ok(out)
    }
}

/// zlib header for a compression level and window size.
pub fn zlib_header(level: u8, window_bits: u8) -> [u8; 2] {
    let cmf = ((window_bits - 8) << 4) | CM_DEFLATE;
    let flevel = match level {
        0 | 1 => 0,
        2..=5 => 1,
        6 => 2,
        _ => 3,
    };
    let flg = flevel << 6;
    let check = (31 - (cmf as u16 * 256 + flg as u16) % 31) % 31;
    [cmf, flg | check as u8]
}

/// Parser progress.
#[derive(Debug, Clone, PartialEq, Eq)]
enum State {
    /// Deciding between zlib and gzip from the first byte.
    Detect,
    Zlib { cmf: u8 },
    /// First `got` bytes of the fixed ten-byte gzip header.
    Fixed { got: usize },
    ExtraLen { got: usize },
    Extra { remaining: usize },
    Name,
    Comment,
    HeaderCrc { got: usize },
    Done,
}

/// Incremental gzip/zlib header parser.
#[derive(Debug, Clone)]
pub struct HeaderParser {
    state: State,
    /// Raw bytes of fixed fields and lengths seen so far.
    scratch: [u8; 10],
    flags: u8,
    header: GzHeader,
    crc: Crc32,
    window_bits: u8,
    detected: Wrapper,
}

impl HeaderParser {
    /// Parser for `wrapper` (must not be [`Wrapper::Raw`]) with a window of
    /// `window_bits`.
    pub fn new(wrapper: Wrapper, window_bits: u8) -> Self {
        let state = match wrapper {
            Wrapper::Gzip => State::Fixed { got: 0 },
            _ => State::Detect,
        };
        Self {
            state,
            scratch: [0; 10],
            flags: 0,
            header: GzHeader::default(),
            crc: Crc32::new(),
            window_bits,
            detected: wrapper,
        }
    }

    /// Whether the whole header has been read.
    pub fn is_done(&self) -> bool {
        self.state == State::Done
    }

    /// Framing found in the stream (zlib or gzip).
    pub fn wrapper(&self) -> Wrapper {
        self.detected
    }

    /// The parsed gzip header. Fields fill in as parsing proceeds.
    pub fn header(&self) -> &GzHeader {
        &self.header
    }

    /// Consume one byte. Returns `true` once the header is complete.
    pub fn feed(&mut self, byte: u8) -> Result<bool> {
        if !matches!(self.state, State::HeaderCrc { .. } | State::Detect | State::Zlib { .. }) {
            self.crc.update(&[byte]);
        }

        self.state = match std::mem::replace(&mut self.state, State::Done) {
            State::Detect => {
                if self.detected == Wrapper::Auto && byte == GZIP_MAGIC[0] {
                    self.detected = Wrapper::Gzip;
                    self.crc.update(&[byte]);
                    self.scratch[0] = byte;
                    State::Fixed { got: 1 }
                } else {
                    self.detected = Wrapper::Zlib;
                    State::Zlib { cmf: byte }
                }
            }
            State::Zlib { cmf } => {
                self.check_zlib(cmf, byte)?;
                State::Done
            }
            State::Fixed { got } => {
                self.scratch[got] = byte;
                if got + 1 < 10 {
                    State::Fixed { got: got + 1 }
                } else {
                    self.check_fixed()?;
                    self.next_optional(flags::FEXTRA)
                }
            }
            State::ExtraLen { got } => {
                self.scratch[got] = byte;
                if got == 0 {
                    State::ExtraLen { got: 1 }
                } else {
                    let xlen = u16::from_le_bytes([self.scratch[0], self.scratch[1]]) as usize;
                    self.header.extra = Some(Vec::with_capacity(xlen));
                    if xlen == 0 {
                        self.next_optional(flags::FNAME)
                    } else {
                        State::Extra { remaining: xlen }
                    }
                }
            }
            State::Extra { remaining } => {
                if let Some(extra) = self.header.extra.as_mut() {
                    extra.push(byte);
                }
                if remaining > 1 {
                    State::Extra {
                        remaining: remaining - 1,
                    }
                } else {
                    self.next_optional(flags::FNAME)
                }
            }
            State::Name => {
                if byte == 0 {
                    self.next_optional(flags::FCOMMENT)
                } else {
                    self.header.name.get_or_insert_with(Vec::new).push(byte);
                    State::Name
                }
            }
            State::Comment => {
                if byte == 0 {
                    self.next_optional(flags::FHCRC)
                } else {
                    self.header.comment.get_or_insert_with(Vec::new).push(byte);
                    State::Comment
                }
            }
            State::HeaderCrc { got } => {
                self.scratch[got] = byte;
                if got == 0 {
                    State::HeaderCrc { got: 1 }
                } else {
                    let stored = u16::from_le_bytes([self.scratch[0], self.scratch[1]]);
                    if stored != self.crc.value() as u16 {
                        return Err(CodecError::data("header crc mismatch"));
                    }
                    State::Done
                }
            }
            State::Done => State::Done,
        };

        Ok(self.state == State::Done)
    }

    fn check_zlib(&self, cmf: u8, flg: u8) -> Result<()> {
        if (cmf as u16 * 256 + flg as u16) % 31 != 0 {
            return Err(CodecError::data("incorrect header check"));
        }
        if cmf & 0x0F != CM_DEFLATE {
            return Err(CodecError::data("unknown compression method"));
        }
        if (cmf >> 4) + 8 > self.window_bits {
            return Err(CodecError::data("invalid window size"));
        }
        if flg & 0x20 != 0 {
            return Err(CodecError::data("preset dictionary not supported"));
        }
        Ok(())
    }

    fn check_fixed(&mut self) -> Result<()> {
        let b = self.scratch;
        if b[..2] != GZIP_MAGIC {
            return Err(CodecError::data("incorrect header check"));
        }
        if b[2] != CM_DEFLATE {
            return Err(CodecError::data("unknown compression method"));
        }
        if b[3] & flags::RESERVED != 0 {
            return Err(CodecError::data("unknown header flags set"));
        }
        self.flags = b[3];
        self.header.text = b[3] & flags::FTEXT != 0;
        self.header.hcrc = b[3] & flags::FHCRC != 0;
        self.header.mtime = u32::from_le_bytes([b[4], b[5], b[6], b[7]]);
        self.header.xfl = b[8];
        self.header.os = b[9];
        Ok(())
    }

    /// The first optional section at or after `from` whose flag is set.
    fn next_optional(&mut self, from: u8) -> State {
        let order = [flags::FEXTRA, flags::FNAME, flags::FCOMMENT, flags::FHCRC];
        for flag in order.into_iter().skip_while(|&f| f != from) {
            if self.flags & flag == 0 {
                continue;
            }
            return match flag {
                flags::FEXTRA => State::ExtraLen { got: 0 },
                flags::FNAME => {
                    self.header.name = Some(Vec::new());
                    State::Name
                }
                flags::FCOMMENT => {
                    self.header.comment = Some(Vec::new());
                    State::Comment
                }
                _ => State::HeaderCrc { got: 0 },
            };
        }
        State::Done
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gzbuf_core::ErrorCode;

    fn parse(bytes: &[u8], wrapper: Wrapper) -> Result<(HeaderParser, usize)> {
        let mut parser = HeaderParser::new(wrapper, 15);
        for (i, &byte) in bytes.iter().enumerate() {
            if parser.feed(byte)? {
                return Ok((parser, i + 1));
            }
        }
        Ok((parser, bytes.len()))
    }

    #[test]
    fn test_window_bits() {
        assert_eq!(parse_window_bits(31, false).unwrap(), (Wrapper::Gzip, 15));
        assert_eq!(parse_window_bits(15, false).unwrap(), (Wrapper::Zlib, 15));
        assert_eq!(parse_window_bits(-9, false).unwrap(), (Wrapper::Raw, 9));
        assert_eq!(parse_window_bits(47, true).unwrap(), (Wrapper::Auto, 15));
        for bad in [0, 7, 16, 23, 32, 47, -16, -7] {
            let err = parse_window_bits(bad, false).unwrap_err();
            assert_eq!(err.code, ErrorCode::StreamError, "window bits {bad}");
        }
    }

    #[test]
    fn test_default_header_bytes() {
        let bytes = GzHeader::default().to_bytes(0).unwrap();
        assert_eq!(bytes, vec![0x1F, 0x8B, 8, 0, 0, 0, 0, 0, 0, 255]);
    }

    #[test]
    fn test_full_header_roundtrip() {
        let header = GzHeader {
            text: true,
            mtime: 0x5F00_0000,
            xfl: 2,
            os: 3,
            extra: Some(b"AB\x02\x00hi".to_vec()),
            name: Some(b"file.txt".to_vec()),
            comment: Some(b"a comment".to_vec()),
            hcrc: true,
        };
        let mut bytes = header.to_bytes(2).unwrap();
        let header_len = bytes.len();
        bytes.extend_from_slice(b"trailing");

        let (parser, used) = parse(&bytes, Wrapper::Gzip).unwrap();
        assert!(parser.is_done());
        assert_eq!(used, header_len);
        assert_eq!(parser.header(), &header);
    }

    #[test]
    fn test_header_crc_mismatch() {
        let header = GzHeader {
            hcrc: true,
            ..GzHeader::default()
        };
        let mut bytes = header.to_bytes(0).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0xFF;
        let err = parse(&bytes, Wrapper::Gzip).unwrap_err();
        assert_eq!(err.message, "header crc mismatch");
    }

    #[test]
    fn test_bad_magic_and_flags() {
        let err = parse(&[0x1F, 0x8C, 8, 0, 0, 0, 0, 0, 0, 0], Wrapper::Gzip).unwrap_err();
        assert_eq!(err.code, ErrorCode::DataError);

        let err = parse(&[0x1F, 0x8B, 8, 0x20, 0, 0, 0, 0, 0, 0], Wrapper::Gzip).unwrap_err();
        assert_eq!(err.message, "unknown header flags set");

        let err = parse(&[0x1F, 0x8B, 7, 0, 0, 0, 0, 0, 0, 0], Wrapper::Gzip).unwrap_err();
        assert_eq!(err.message, "unknown compression method");
    }

    #[test]
    fn test_zlib_header() {
        for level in 0..=9 {
            let bytes = zlib_header(level, 15);
            let (parser, used) = parse(&bytes, Wrapper::Zlib).unwrap();
            assert!(parser.is_done());
            assert_eq!(used, 2);
            assert_eq!(parser.wrapper(), Wrapper::Zlib);
        }
        assert_eq!(zlib_header(6, 15), [0x78, 0x9C]);
    }

    #[test]
    fn test_zlib_rejections() {
        let err = parse(&[0x78, 0x9D], Wrapper::Zlib).unwrap_err();
        assert_eq!(err.message, "incorrect header check");

        // FDICT set, check bits adjusted to stay valid.
        let err = parse(&[0x78, 0xBB], Wrapper::Zlib).unwrap_err();
        assert_eq!(err.message, "preset dictionary not supported");

        let mut parser = HeaderParser::new(Wrapper::Zlib, 9);
        parser.feed(0x78).unwrap();
        let err = parser.feed(0x9C).unwrap_err();
        assert_eq!(err.message, "invalid window size");
    }

    #[test]
    fn test_auto_detect() {
        let gzip = GzHeader::with_name("x").to_bytes(0).unwrap();
        let (parser, _) = parse(&gzip, Wrapper::Auto).unwrap();
        assert_eq!(parser.wrapper(), Wrapper::Gzip);
        assert_eq!(parser.header().name.as_deref(), Some(&b"x"[..]));

        let (parser, _) = parse(&zlib_header(6, 15), Wrapper::Auto).unwrap();
        assert_eq!(parser.wrapper(), Wrapper::Zlib);
    }
}
