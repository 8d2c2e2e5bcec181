//! Error types for server operations.

use thiserror::Error;

/// Error type for server operations.
#[derive(Debug, Error)]
pub enum ServerError {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Codec error while reading or writing a connection.
    #[error("codec error: {0}")]
    Codec(#[from] portmux_core::Error),
}
