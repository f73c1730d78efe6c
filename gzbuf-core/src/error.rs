//! Error types for the codec engine.
//!
//! The engine reports failures as a [`CodecError`]: a numeric [`ErrorCode`]
//! compatible with the classic zlib return codes, plus a short message
//! describing what went wrong (for example `"invalid block type"`).

use thiserror::Error;

/// Engine error codes.
///
/// The numeric values match the zlib convention so they can be logged and
/// compared against other gzip tooling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    /// Invalid parameter or inconsistent stream state.
    StreamError,
    /// Input data is corrupt or not in the expected format.
    DataError,
    /// Internal allocation failed.
    MemError,
}

impl ErrorCode {
    /// The zlib-compatible numeric value.
    pub fn value(self) -> i32 {
        match self {
            Self::StreamError => -2,
            Self::DataError => -3,
            Self::MemError => -4,
        }
    }

    /// Short name as used in diagnostics.
    pub fn name(self) -> &'static str {
        match self {
            Self::StreamError => "stream error",
            Self::DataError => "data error",
            Self::MemError => "insufficient memory",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.name(), self.value())
    }
}

/// An error reported by the codec engine.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{code}: {message}")]
pub struct CodecError {
    /// Error class.
    pub code: ErrorCode,
    /// Human-readable detail.
    pub message: String,
}

/// Result type alias for engine operations.
pub type Result<T> = std::result::Result<T, CodecError>;

impl CodecError {
    /// Create an error with an explicit code.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Create a stream (parameter/state) error.
    pub fn stream(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::StreamError, message)
    }

    /// Create a data (corrupt input) error.
    pub fn data(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::DataError, message)
    }

    /// Create a memory error.
    pub fn mem(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::MemError, message)
    }

    /// Numeric error code.
    pub fn value(&self) -> i32 {
        self.code.value()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::StreamError.value(), -2);
        assert_eq!(ErrorCode::DataError.value(), -3);
        assert_eq!(ErrorCode::MemError.value(), -4);
    }

    #[test]
    fn test_error_display() {
        let err = CodecError::data("invalid block type");
        assert_eq!(err.to_string(), "data error (-3): invalid block type");
        assert_eq!(err.value(), -3);
    }

    #[test]
    fn test_helpers() {
        assert_eq!(CodecError::stream("x").code, ErrorCode::StreamError);
        assert_eq!(CodecError::mem("x").code, ErrorCode::MemError);
    }
}
