//! Output buffer sizing and growth.
//!
//! Buffers are plain `Vec<u8>` whose length is the capacity handed to the
//! engine. Allocation goes through `try_reserve_exact` so that running out of
//! memory surfaces as [`GzipError::Allocation`] instead of aborting.

use crate::GROWTH_MULTIPLIER;
use crate::error::{GzipError, Result};
use tracing::debug;

/// Allocate a zeroed buffer of `size` bytes.
pub fn allocate(size: usize, operation: &'static str) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| GzipError::allocation(operation, size))?;
    buffer.resize(size, 0);
    Ok(buffer)
}

/// Multiply the buffer length by [`GROWTH_MULTIPLIER`], keeping its contents.
///
/// On failure the buffer is left at its previous size.
pub fn grow(buffer: &mut Vec<u8>, operation: &'static str) -> Result<()> {
    let current = buffer.len();
    let target = current
        .max(1)
        .checked_mul(GROWTH_MULTIPLIER)
        .ok_or_else(|| GzipError::allocation(operation, usize::MAX))?;
    buffer
        .try_reserve_exact(target - current)
        .map_err(|_| GzipError::allocation(operation, target))?;
    buffer.resize(target, 0);
    debug!(operation, from = current, to = target, "output buffer grown");
    Ok(())
}
