//! # gzbuf Deflate
//!
//! Pure Rust DEFLATE engine (RFC 1951) driven through resumable stream
//! contexts, with raw, zlib (RFC 1950) and gzip (RFC 1952) framing.
//!
//! ## Features
//!
//! - **Decompression** ([`InflateStream`]): all block types, any split of
//!   input and output across calls, trailer verification, gzip header parsing
//!   and zlib/gzip auto-detection
//! - **Compression** ([`DeflateStream`]): LZ77 with hash chains and lazy
//!   matching, fixed or dynamic Huffman codes, stored fallback
//!   - Levels 0-9 (`-1` selects the default, 6)
//!   - `Sync` and `Full` flushes
//!   - Output never exceeds [`compress_bound`] plus the framing overhead
//!
//! ## Framing
//!
//! Both streams pick their framing from a window-bits value the way zlib does:
//!
//! | window bits | framing |
//! |-------------|---------|
//! | `8..=15`    | zlib    |
//! | `-15..=-8`  | raw     |
//! | `24..=31`   | gzip    |
//! | `40..=47`   | zlib or gzip, detected (inflate only) |
//!
//! ## Example
//!
//! ```rust
//! use gzbuf_deflate::{DeflateStream, Flush, InflateStream, Status, Strategy, compress_bound};
//!
//! let original = b"Hello, World! Hello, World!";
//!
//! let mut deflater = DeflateStream::new(6, 31, 8, Strategy::Default).unwrap();
//! let mut packed = vec![0u8; compress_bound(original.len()) + 18];
//! assert_eq!(deflater.deflate(original, &mut packed, Flush::Finish).unwrap(), Status::StreamEnd);
//! packed.truncate(deflater.total_out() as usize);
//! deflater.end().unwrap();
//!
//! let mut inflater = InflateStream::new(31).unwrap();
//! let mut plain = vec![0u8; 64];
//! assert_eq!(inflater.inflate(&packed, &mut plain, Flush::Finish).unwrap(), Status::StreamEnd);
//! plain.truncate(inflater.total_out() as usize);
//! assert_eq!(plain, original);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod block;
pub mod deflate;
pub mod header;
pub mod huffman;
pub mod inflate;
pub mod lz77;
pub mod tables;

// Re-exports
pub use deflate::DeflateStream;
pub use gzbuf_core::{CodecError, CompressionLevel, ErrorCode, Flush, Status, Strategy};
pub use header::{GzHeader, Wrapper};
pub use inflate::InflateStream;

/// Upper bound on the DEFLATE data produced for `source_len` input bytes,
/// excluding zlib or gzip framing.
pub fn compress_bound(source_len: usize) -> usize {
    source_len
        .saturating_add(source_len >> 12)
        .saturating_add(source_len >> 14)
        .saturating_add(source_len >> 25)
        .saturating_add(13)
}
