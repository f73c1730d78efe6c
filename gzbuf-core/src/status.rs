//! Engine status codes and stream parameters.

use crate::error::CodecError;

/// Outcome of a successful engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Status {
    /// Progress was made; more calls may be needed.
    Ok,
    /// The stream is complete.
    StreamEnd,
    /// No progress was possible. Supply more input or more output space.
    BufError,
}

impl Status {
    /// The zlib-compatible numeric value.
    pub fn code(self) -> i32 {
        match self {
            Self::Ok => 0,
            Self::StreamEnd => 1,
            Self::BufError => -5,
        }
    }
}

/// Flush mode passed to each engine call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Flush {
    /// Let the engine decide how much to buffer.
    #[default]
    None,
    /// Emit all pending output, ending on a byte boundary.
    Sync,
    /// Like [`Flush::Sync`], and forget history so decoding can restart here.
    Full,
    /// No more input follows; complete the stream.
    Finish,
}

/// Compression strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Strategy {
    /// LZ77 matching with the best block encoding.
    #[default]
    Default,
    /// Literals only; no string matching.
    HuffmanOnly,
    /// Never use dynamic Huffman trees.
    Fixed,
}

/// A validated compression level, 0 (store) through 9 (best).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompressionLevel(u8);

impl CompressionLevel {
    /// The "use the default" sentinel accepted by [`TryFrom<i32>`].
    pub const DEFAULT_SENTINEL: i32 = -1;
    /// Level used when the caller asks for the default.
    pub const DEFAULT: Self = Self(6);
    /// No compression.
    pub const NONE: Self = Self(0);

    /// Numeric level.
    pub fn level(self) -> u8 {
        self.0
    }
}

impl Default for CompressionLevel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

impl TryFrom<i32> for CompressionLevel {
    type Error = CodecError;

    fn try_from(level: i32) -> Result<Self, Self::Error> {
        match level {
            Self::DEFAULT_SENTINEL => Ok(Self::DEFAULT),
            0..=9 => Ok(Self(level as u8)),
            _ => Err(CodecError::stream(format!(
                "invalid compression level {level}"
            ))),
        }
    }
}
