//! Protocol error types.

use thiserror::Error;

/// Errors from encoding or decoding frames.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// Declared or actual payload exceeds [`crate::MAX_PAYLOAD_SIZE`].
    #[error("frame too large: {size} bytes (max {max})")]
    FrameTooLarge {
        /// Payload size in bytes.
        size: usize,
        /// Maximum allowed payload size.
        max: usize,
    },

    /// Payload could not be serialized.
    #[error("encode failed: {0}")]
    Encode(String),

    /// Payload is not a valid CBOR message of the expected type.
    #[error("decode failed: {0}")]
    Decode(String),
}
