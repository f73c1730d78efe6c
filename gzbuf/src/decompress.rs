//! One-shot gzip decompression with a growing output buffer.

use crate::buffer;
use crate::error::{GzipError, Result};
use crate::{GROWTH_MULTIPLIER, GZIP_WBITS};
use gzbuf_core::{Flush, Status};
use gzbuf_deflate::InflateStream;
use tracing::debug;

const OPERATION: &str = "decompress";

/// Decompress one gzip member.
///
/// Bytes after the end of the first member are ignored. Corrupt, truncated
/// or non-gzip input fails with [`GzipError::CodecRuntime`].
pub fn decompress(data: &[u8]) -> Result<Vec<u8>> {
    let capacity = data
        .len()
        .checked_mul(GROWTH_MULTIPLIER)
        .ok_or_else(|| GzipError::allocation(OPERATION, usize::MAX))?;
    let mut output = buffer::allocate(capacity, OPERATION)?;

    let mut stream = InflateStream::new(GZIP_WBITS).map_err(|e| GzipError::init(OPERATION, &e))?;

    loop {
        let total_in = stream.total_in() as usize;
        let total_out = stream.total_out() as usize;
        match stream.inflate(&data[total_in..], &mut output[total_out..], Flush::Finish) {
            Ok(Status::StreamEnd) => break,
            Ok(Status::BufError) if (stream.total_in() as usize) < data.len() => {
                buffer::grow(&mut output, OPERATION)?;
            }
            Ok(status) => return Err(GzipError::unexpected_status(OPERATION, status)),
            Err(e) => return Err(GzipError::runtime(OPERATION, &e)),
        }
    }

    let total_out = stream.total_out() as usize;
    stream
        .end()
        .map_err(|e| GzipError::finalize(OPERATION, &e))?;
    output.truncate(total_out);

    debug!(input = data.len(), output = total_out, "decompressed");
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compress;

    #[test]
    fn test_round_trip() {
        let data = b"round trip through the whole-buffer surface";
        assert_eq!(decompress(&compress(data, None).unwrap()).unwrap(), data);
    }

    #[test]
    fn test_grows_for_compressible_data() {
        let data = vec![b'z'; 100_000];
        let packed = compress(&data, Some(9)).unwrap();
        assert!(packed.len() * GROWTH_MULTIPLIER < data.len());
        assert_eq!(decompress(&packed).unwrap(), data);
    }

    #[test]
    fn test_empty_input_is_runtime_error() {
        match decompress(b"") {
            Err(GzipError::CodecRuntime { code, .. }) => assert_eq!(code, Status::BufError.code()),
            other => panic!("{other:?}"),
        }
    }

    #[test]
    fn test_not_gzip() {
        let err = decompress(b"plain text, not a gzip stream").unwrap_err();
        assert!(matches!(err, GzipError::CodecRuntime { code: -3, .. }));
    }
}
