//! # gzbuf
//!
//! Whole-buffer gzip (RFC 1952) compression and decompression.
//!
//! Two functions make up the surface: [`compress`] turns a byte slice into
//! one gzip member, and [`decompress`] turns a gzip member back into the
//! original bytes. Each call owns its engine stream from start to finish, so
//! calls are independent and may run on any thread.
//!
//! ## Example
//!
//! ```rust
//! let data = b"Hello, World! Hello, World!";
//!
//! let packed = gzbuf::compress(data, None).unwrap();
//! assert_eq!(&packed[..2], &[0x1F, 0x8B]);
//!
//! let plain = gzbuf::decompress(&packed).unwrap();
//! assert_eq!(plain, data);
//! ```
//!
//! ## Output sizing
//!
//! - Compression allocates `compress_bound(len) + HEADER_BOUND` bytes once;
//!   the engine never produces more than that.
//! - Decompression starts at `len * GROWTH_MULTIPLIER` bytes and doubles
//!   whenever the engine runs out of room with input left over.
//!
//! ## Errors
//!
//! Every failure is a [`GzipError`]: allocation, codec initialization,
//! insufficient buffer, codec runtime, or codec finalization.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![allow(clippy::module_name_repetitions)]

pub mod buffer;
pub mod compress;
pub mod decompress;
pub mod error;

// Re-exports
pub use compress::compress;
pub use decompress::decompress;
pub use error::{GzipError, Result};
pub use gzbuf_deflate::compress_bound;

/// Room reserved on top of [`compress_bound`] for the gzip header and trailer.
pub const HEADER_BOUND: usize = 16;

/// Factor applied to the decompression buffer on each growth step, and to
/// the input length for its initial size.
pub const GROWTH_MULTIPLIER: usize = 2;

/// Window bits selecting a 32 KiB window with gzip framing.
pub const GZIP_WBITS: i32 = 15 + 16;

/// Memory level used for compression.
pub const DEF_MEM_LEVEL: i32 = 8;
