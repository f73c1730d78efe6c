//! One-shot gzip compression.

use crate::buffer;
use crate::error::{GzipError, Result};
use crate::{DEF_MEM_LEVEL, GZIP_WBITS, HEADER_BOUND};
use gzbuf_core::{CompressionLevel, Flush, Status, Strategy};
use gzbuf_deflate::{DeflateStream, GzHeader, compress_bound};
use tracing::debug;

const OPERATION: &str = "compress";

/// Compress `data` into a single gzip member.
///
/// `level` is `0..=9`, or `-1`/`None` for the default (6). Levels are checked
/// by the engine; an invalid one fails with [`GzipError::CodecInit`].
pub fn compress(data: &[u8], level: Option<i32>) -> Result<Vec<u8>> {
    compress_into(data, level, output_capacity(data.len())?)
}

/// Output size that always holds a gzip member for `len` input bytes.
fn output_capacity(len: usize) -> Result<usize> {
    compress_bound(len)
        .checked_add(HEADER_BOUND)
        .ok_or_else(|| GzipError::allocation(OPERATION, usize::MAX))
}

fn compress_into(data: &[u8], level: Option<i32>, capacity: usize) -> Result<Vec<u8>> {
    let level = level.unwrap_or(CompressionLevel::DEFAULT_SENTINEL);
    let mut output = buffer::allocate(capacity, OPERATION)?;

    let mut stream = DeflateStream::new(level, GZIP_WBITS, DEF_MEM_LEVEL, Strategy::Default)
        .map_err(|e| GzipError::init(OPERATION, &e))?;
    stream
        .set_header(GzHeader::default())
        .map_err(|e| GzipError::init(OPERATION, &e))?;

    match stream.deflate(data, &mut output, Flush::Finish) {
        Ok(Status::StreamEnd) => {}
        Ok(Status::Ok) => return Err(GzipError::insufficient_buffer(OPERATION, capacity)),
        Ok(status) => return Err(GzipError::unexpected_status(OPERATION, status)),
        Err(e) => return Err(GzipError::runtime(OPERATION, &e)),
    }

    let total_out = finish(stream)?;
    output.truncate(total_out);

    debug!(input = data.len(), output = total_out, level, "compressed");
    Ok(output)
}

/// Release the engine, returning how many bytes it produced.
fn finish(stream: DeflateStream) -> Result<usize> {
    let total_out = stream.total_out() as usize;
    stream
        .end()
        .map_err(|e| GzipError::finalize(OPERATION, &e))?;
    Ok(total_out)
}
