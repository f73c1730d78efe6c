//! Error taxonomy for whole-buffer gzip operations.
//!
//! Every engine failure is mapped into one of five classes. Variants carry
//! the operation that failed (`"compress"` or `"decompress"`) and, where an
//! engine status was involved, its zlib-compatible numeric code.

use gzbuf_core::{CodecError, Status};
use thiserror::Error;

/// Errors returned by [`compress`](crate::compress) and
/// [`decompress`](crate::decompress).
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GzipError {
    /// Output storage could not be allocated or grown.
    #[error("{operation}: failed to allocate {requested} bytes")]
    Allocation {
        /// Failing operation.
        operation: &'static str,
        /// Requested buffer size in bytes.
        requested: usize,
    },

    /// The engine rejected its parameters or the gzip header.
    #[error("{operation}: codec initialization failed ({code}): {detail}")]
    CodecInit {
        /// Failing operation.
        operation: &'static str,
        /// Engine status code.
        code: i32,
        /// Engine message.
        detail: String,
    },

    /// Compressed output did not fit the precomputed bound.
    #[error("{operation}: output did not fit in {capacity} bytes")]
    InsufficientBuffer {
        /// Failing operation.
        operation: &'static str,
        /// Output capacity that was exhausted.
        capacity: usize,
    },

    /// The engine failed while processing data.
    #[error("{operation}: codec failed ({code}): {detail}")]
    CodecRuntime {
        /// Failing operation.
        operation: &'static str,
        /// Engine status code.
        code: i32,
        /// Engine message.
        detail: String,
    },

    /// The engine reported a failure while shutting down.
    #[error("{operation}: codec finalization failed ({code}): {detail}")]
    CodecFinalize {
        /// Failing operation.
        operation: &'static str,
        /// Engine status code.
        code: i32,
        /// Engine message.
        detail: String,
    },
}

/// Result type alias for gzip operations.
pub type Result<T> = std::result::Result<T, GzipError>;

impl GzipError {
    /// Create an allocation error.
    pub fn allocation(operation: &'static str, requested: usize) -> Self {
        Self::Allocation {
            operation,
            requested,
        }
    }

    /// Create an initialization error from an engine error.
    pub fn init(operation: &'static str, err: &CodecError) -> Self {
        Self::CodecInit {
            operation,
            code: err.value(),
            detail: err.message.clone(),
        }
    }

    /// Create an insufficient buffer error.
    pub fn insufficient_buffer(operation: &'static str, capacity: usize) -> Self {
        Self::InsufficientBuffer {
            operation,
            capacity,
        }
    }

    /// Create a runtime error from an engine error.
    pub fn runtime(operation: &'static str, err: &CodecError) -> Self {
        Self::CodecRuntime {
            operation,
            code: err.value(),
            detail: err.message.clone(),
        }
    }

    /// Create a runtime error from an unexpected engine status.
    pub fn unexpected_status(operation: &'static str, status: Status) -> Self {
        let detail = match status {
            Status::BufError => "no progress possible",
            Status::Ok => "stream did not end",
            Status::StreamEnd => "stream ended unexpectedly",
        };
        Self::CodecRuntime {
            operation,
            code: status.code(),
            detail: detail.to_string(),
        }
    }

    /// Create a finalization error from an engine error.
    pub fn finalize(operation: &'static str, err: &CodecError) -> Self {
        Self::CodecFinalize {
            operation,
            code: err.value(),
            detail: err.message.clone(),
        }
    }

    /// The operation that failed.
    pub fn operation(&self) -> &'static str {
        match self {
            Self::Allocation { operation, .. }
            | Self::CodecInit { operation, .. }
            | Self::InsufficientBuffer { operation, .. }
            | Self::CodecRuntime { operation, .. }
            | Self::CodecFinalize { operation, .. } => operation,
        }
    }

    /// Engine status code, for the classes that carry one.
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::CodecInit { code, .. }
            | Self::CodecRuntime { code, .. }
            | Self::CodecFinalize { code, .. } => Some(*code),
            Self::Allocation { .. } | Self::InsufficientBuffer { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = GzipError::allocation("decompress", 1 << 20);
        assert_eq!(err.to_string(), "decompress: failed to allocate 1048576 bytes");

        let err = GzipError::runtime("decompress", &CodecError::data("invalid block type"));
        assert!(err.to_string().contains("(-3)"));
        assert!(err.to_string().contains("invalid block type"));
    }

    #[test]
    fn test_codes() {
        let err = GzipError::init("compress", &CodecError::stream("invalid compression level 10"));
        assert_eq!(err.code(), Some(-2));
        assert_eq!(err.operation(), "compress");

        assert_eq!(
            GzipError::unexpected_status("decompress", Status::BufError).code(),
            Some(-5)
        );
        assert_eq!(GzipError::insufficient_buffer("compress", 10).code(), None);
    }
}
