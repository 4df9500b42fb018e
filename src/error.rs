//! Error types for the stxframe library.
//!
//! Framing violations are not errors in the `Result` sense: they are reported
//! through [`crate::protocol::PacketSink::on_error`] and the decoder carries on.
//! [`Error`] covers the remaining failures (bad construction parameters, I/O on
//! the link, malformed hex on the command line).

use thiserror::Error;

/// Errors raised outside the per-byte decode path.
#[derive(Debug, Error)]
pub enum Error {
    /// Decoder capacity outside the representable range.
    #[error("invalid decoder capacity {requested}: must be between {min} and {max}")]
    Capacity {
        requested: usize,
        min: usize,
        max: usize,
    },

    /// Wrapper around IO errors from the byte source.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Hex text could not be parsed into bytes.
    #[error("invalid hex at offset {offset}: {reason}")]
    Hex { offset: usize, reason: &'static str },

    /// Configuration values failed validation.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type alias using [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
