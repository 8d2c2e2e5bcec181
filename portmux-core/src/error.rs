//! Error types for portmux codec operations.

use thiserror::Error;

/// Core error type for decoding operations.
#[derive(Debug, Error)]
pub enum Error {
    /// IO error surfaced through a `tokio_util` codec.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A frame declared a payload larger than the configured maximum.
    #[error("frame too large: {size} bytes exceeds maximum {max} bytes")]
    FrameTooLarge {
        /// Declared payload size.
        size: u64,
        /// Maximum allowed payload size.
        max: usize,
    },

    /// A 64-bit extended length that does not fit the platform `usize`,
    /// or that has its most significant bit set.
    #[error("frame length {length} is not representable")]
    LengthOverflow {
        /// Declared payload length.
        length: u64,
    },

    /// A text frame whose payload is not UTF-8.
    #[error("invalid UTF-8 in text payload at offset {offset}")]
    InvalidUtf8 {
        /// Byte offset where decoding failed.
        offset: usize,
    },

    /// The request head grew past the configured limit without a
    /// terminating blank line.
    #[error("request head too large: {size} bytes exceeds maximum {max} bytes")]
    RequestHeadTooLarge {
        /// Buffered size.
        size: usize,
        /// Maximum allowed head size.
        max: usize,
    },
}

impl Error {
    /// Creates a frame too large error.
    pub fn frame_too_large(size: u64, max: usize) -> Self {
        Self::FrameTooLarge { size, max }
    }

    /// Creates a request head too large error.
    pub fn request_head_too_large(size: usize, max: usize) -> Self {
        Self::RequestHeadTooLarge { size, max }
    }
}

/// Result type alias for portmux codec operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_too_large_display() {
        let err = Error::frame_too_large(70_000, 65_536);
        assert_eq!(
            err.to_string(),
            "frame too large: 70000 bytes exceeds maximum 65536 bytes"
        );
    }

    #[test]
    fn test_io_from() {
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "eof");
        let err: Error = io.into();
        assert!(matches!(err, Error::Io(_)));
    }
}
