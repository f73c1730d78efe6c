//! # gzbuf Core
//!
//! Core components shared by the gzbuf codec engine and the gzip layer.
//!
//! - [`bitstream`]: resumable LSB-first bit reader over borrowed input, and a bit writer
//!   that accumulates pending output
//! - [`checksum`]: CRC-32 (gzip trailer, header CRC) and Adler-32 (zlib trailer)
//! - [`window`]: sliding history window for back-references during inflate
//! - [`status`]: engine status, flush modes, strategies, compression levels
//! - [`error`]: engine error codes
//!
//! ## Architecture
//!
//! gzbuf is layered like a small protocol stack:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │ L4: Host surface                                        │
//! │     gzbuf CLI                                           │
//! ├─────────────────────────────────────────────────────────┤
//! │ L3: Whole-buffer gzip                                   │
//! │     compress / decompress, buffer sizing and growth     │
//! ├─────────────────────────────────────────────────────────┤
//! │ L2: Codec engine                                        │
//! │     DeflateStream / InflateStream, LZ77 + Huffman       │
//! ├─────────────────────────────────────────────────────────┤
//! │ L1: Core (this crate)                                   │
//! │     BitReader/BitWriter, Window, CRC-32, Adler-32       │
//! └─────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Example
//!
//! ```rust
//! use gzbuf_core::bitstream::{BitReader, BitState, BitWriter};
//! use gzbuf_core::checksum::Crc32;
//!
//! let mut writer = BitWriter::new();
//! writer.write_bits(0b101, 3);
//! writer.write_bits(0xAB, 8);
//! writer.align_to_byte();
//! let bytes = writer.take_all();
//!
//! let mut reader = BitReader::resume(&bytes, BitState::default());
//! assert_eq!(reader.read_bits(3), Some(0b101));
//! assert_eq!(reader.read_bits(8), Some(0xAB));
//!
//! assert_eq!(Crc32::compute(b"Hello, World!"), 0xEC4AC3D0);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod bitstream;
pub mod checksum;
pub mod error;
pub mod status;
pub mod window;

// Re-exports for convenience
pub use bitstream::{BitReader, BitState, BitWriter, Checkpoint};
pub use checksum::{Adler32, Crc32};
pub use error::{CodecError, ErrorCode, Result};
pub use status::{CompressionLevel, Flush, Status, Strategy};
pub use window::Window;
